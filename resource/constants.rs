/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod server {
    pub const DEFAULT_HTTP_ADDRESS: &str = "0.0.0.0:8080";
    pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.yml";
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

pub mod database {
    pub const DEFAULT_URI: &str = "mongodb://127.0.0.1:27017/?replicaSet=rs0";
    pub const ADMIN_DATABASE: &str = "admin";
    pub const DEFAULT_CONNECT_TIMEOUT_MILLIS: u64 = 10_000;

    /// Server error codes the gateway interprets. Anything else propagates untouched.
    pub mod error_code {
        pub const UNAUTHORIZED: i32 = 13;
        pub const ILLEGAL_OPERATION: i32 = 20;
        pub const TRANSACTION_TOO_OLD: i32 = 225;
        pub const NO_SUCH_TRANSACTION: i32 = 251;
        pub const TRANSACTION_COMMITTED: i32 = 256;
    }
}

pub mod session {
    pub const DEFAULT_CAUSALLY_CONSISTENT: bool = true;

    pub const FIRST_TXN_NUMBER: i64 = 1;
    pub const UNSUPPORTED_TXN_NUMBER: i64 = -1;

    pub const DEFAULT_PROBE_DATABASE: &str = "foo";
    pub const DEFAULT_PROBE_COLLECTION: &str = "bar";

    pub const DEFAULT_OPTIONS_CACHE_CAPACITY: u64 = 100_000;
}

pub mod http {
    pub const SESSIONS_SEGMENT: &str = "_sessions";
    pub const TRANSACTIONS_SEGMENT: &str = "_txns";

    pub const SESSION_ID_QUERY_PARAM: &str = "sid";
    pub const TRANSACTION_ID_QUERY_PARAM: &str = "txn";
}
