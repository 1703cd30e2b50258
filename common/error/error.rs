/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{error::Error, fmt};

pub trait DocwayError {
    fn variant_name(&self) -> &'static str;

    fn component(&self) -> &'static str;

    fn code(&self) -> &'static str;

    fn code_prefix(&self) -> &'static str;

    fn code_number(&self) -> usize;

    fn format_description(&self) -> String;

    fn source(&self) -> Option<&(dyn Error + Sync)>;

    fn source_docway_error(&self) -> Option<&(dyn DocwayError + Sync)>;

    fn root_source_docway_error(&self) -> &(dyn DocwayError + Sync)
    where
        Self: Sized + Sync,
    {
        let mut error: &(dyn DocwayError + Sync) = self;
        while let Some(source) = error.source_docway_error() {
            error = source;
        }
        error
    }

    fn format_code_and_description(&self) -> String {
        format!("[{}] {}", self.code(), self.format_description())
    }

    /// Descriptions of this error and every chained cause, outermost first.
    fn stack_trace(&self) -> Vec<String>
    where
        Self: Sized + Sync,
    {
        let mut stack_trace = Vec::with_capacity(4);
        let mut error: &(dyn DocwayError + Sync) = self;
        stack_trace.push(error.format_code_and_description());
        while let Some(source) = error.source_docway_error() {
            error = source;
            stack_trace.push(error.format_code_and_description());
        }
        if let Some(source) = error.source() {
            stack_trace.push(source.to_string());
        }
        stack_trace
    }
}

impl PartialEq for dyn DocwayError {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for dyn DocwayError {}

impl fmt::Debug for dyn DocwayError + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for dyn DocwayError + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = self.source_docway_error() {
            write!(f, "[{}] {}\nCause: \n\t {:?}", self.code(), self.format_description(), source as &dyn DocwayError)
        } else if let Some(source) = self.source() {
            write!(f, "[{}] {}\nCause: \n\t {:?}", self.code(), self.format_description(), source)
        } else {
            write!(f, "{}", self.format_code_and_description())
        }
    }
}

// Give a variant at most one of `( source: .. )` and `( docway_source: .. )`. When both are set, only the
// `DocwayError` cause is reported.
#[macro_export]
macro_rules! docway_error {
    ( $vis: vis $name:ident(component = $component: literal, prefix = $prefix: literal) { $(
        $variant: ident (
            $number: literal,
            $description: literal
            $(, $payload_name: ident : $payload_type: ty )*
            $(, ( source : $source: ty ) )?
            $(, ( docway_source : $docway_source: ty ) )?
        ),
    )*}) => {
        #[derive(Clone)]
        $vis enum $name {
            $(
                $variant { $(source: $source, )? $(docway_source: $docway_source, )? $($payload_name: $payload_type, )* },
            )*

        }

        impl $name {
            const _VALIDATE_NUMBERS: () = {
                #[deny(unreachable_patterns)] // fail to compile if any Numbers are the same
                match 0 {
                    $(
                        $number => (),
                    )*
                    _ => (),
               }
           };
        }

        impl $crate::DocwayError for $name {
            fn variant_name(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant { .. } => &stringify!($variant),
                    )*
                }
            }

            fn component(&self) -> &'static str {
                &$component
            }

            fn code(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant { .. } => & concat!($prefix, stringify!($number)),
                    )*
                }
            }

            fn code_prefix(&self) -> &'static str {
                $prefix
            }

            fn code_number(&self) -> usize {
                match self {
                    $(
                        Self::$variant { .. } => $number,
                    )*
                }
            }

            fn format_description(&self) -> String {
                match self {
                    $(
                        Self::$variant { $( $payload_name, )* .. } => format!($description),
                    )*
                }
            }

            fn source(&self) -> Option<&(dyn ::std::error::Error + Sync + 'static)> {
                let error = match self {
                    $(
                        $(Self::$variant { source, .. } => {
                            let source: &$source = source;
                            Some(source as &(dyn ::std::error::Error + Sync))
                        })?
                    )*
                    _ => None
                };
                error
            }

            fn source_docway_error(&self) -> Option<&(dyn $crate::DocwayError + Sync + 'static)> {
                let error = match self {
                    $(
                        $(Self::$variant { docway_source, .. } => {
                            let docway_source: &$docway_source = docway_source;
                            Some(docway_source as &(dyn $crate::DocwayError + Sync))
                        })?
                    )*
                    _ => None
                };
                error
            }
        }

        impl ::std::fmt::Debug for $name {
           fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(self as &dyn $crate::DocwayError, f)
            }
        }

        impl ::std::fmt::Display for $name {
           fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self as &dyn $crate::DocwayError, f)
            }
        }
    };
}
