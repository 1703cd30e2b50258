/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// Unwrapping for bootstrap code: the failure is routed through `tracing` before panicking,
/// so it reaches the configured log sink rather than only stderr.
pub trait ResultExt<T, E> {
    fn unwrap_or_log(self) -> T
    where
        E: fmt::Debug;

    fn expect_or_log(self, msg: &str) -> T
    where
        E: fmt::Debug;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    #[inline]
    #[track_caller]
    fn unwrap_or_log(self) -> T
    where
        E: fmt::Debug,
    {
        match self {
            Ok(t) => t,
            Err(e) => failed_with("called `Result::unwrap_or_log()` on an `Err` value", &e),
        }
    }

    #[inline]
    #[track_caller]
    fn expect_or_log(self, msg: &str) -> T
    where
        E: fmt::Debug,
    {
        match self {
            Ok(t) => t,
            Err(e) => failed_with(msg, &e),
        }
    }
}

#[inline(never)]
#[cold]
#[track_caller]
fn failed_with(msg: &str, value: &dyn fmt::Debug) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(unwrap.filepath = location.file(), unwrap.lineno = location.line(), "{}: {:?}", msg, &value);
    panic!("{}: {:?}", msg, &value);
}

#[cfg(test)]
mod tests {
    use super::ResultExt;

    #[test]
    fn ok_values_pass_through() {
        let result: Result<u32, String> = Ok(7);
        assert_eq!(result.expect_or_log("unused"), 7);
    }

    #[test]
    #[should_panic(expected = "config missing")]
    fn err_values_panic_with_message() {
        let result: Result<u32, String> = Err("no file".to_owned());
        result.expect_or_log("config missing");
    }
}
