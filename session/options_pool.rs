/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use moka::sync::Cache;
use options::SessionOptions;

use crate::session_id::SessionId;

/// Process-wide record of the options each session was created with.
///
/// Only the process that minted a session knows its options; every other process (and this one,
/// after eviction) answers with the defaults.
#[derive(Clone, Debug)]
pub struct SessionOptionsPool {
    options: Cache<SessionId, SessionOptions>,
}

impl SessionOptionsPool {
    pub fn new(capacity: u64) -> Self {
        Self { options: Cache::new(capacity) }
    }

    pub fn new_session_id(&self, options: SessionOptions) -> SessionId {
        let session_id = SessionId::new_random();
        self.options.insert(session_id, options);
        session_id
    }

    pub fn options_for(&self, session_id: &SessionId) -> SessionOptions {
        self.options.get(session_id).unwrap_or_default()
    }

    pub fn forget(&self, session_id: &SessionId) {
        self.options.invalidate(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_sessions_remember_their_options() {
        let pool = SessionOptionsPool::new(16);
        let session_id = pool.new_session_id(SessionOptions::new(false));
        assert!(!pool.options_for(&session_id).causally_consistent);
    }

    #[test]
    fn unknown_sessions_get_defaults() {
        let pool = SessionOptionsPool::new(16);
        assert_eq!(pool.options_for(&SessionId::new_random()), SessionOptions::default());
    }

    #[test]
    fn forgotten_sessions_fall_back_to_defaults() {
        let pool = SessionOptionsPool::new(16);
        let session_id = pool.new_session_id(SessionOptions::new(false));
        pool.forget(&session_id);
        assert!(pool.options_for(&session_id).causally_consistent);
    }
}
