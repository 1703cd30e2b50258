/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use resource::constants::session::DEFAULT_CAUSALLY_CONSISTENT;
use serde::{Deserialize, Serialize};

/// Options fixed when a session is created and looked up again on every later request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    #[serde(default = "default_causally_consistent")]
    pub causally_consistent: bool,
}

fn default_causally_consistent() -> bool {
    DEFAULT_CAUSALLY_CONSISTENT
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { causally_consistent: DEFAULT_CAUSALLY_CONSISTENT }
    }
}

impl SessionOptions {
    pub fn new(causally_consistent: bool) -> Self {
        Self { causally_consistent }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConcernLevel {
    Local,
    Available,
    Majority,
    Linearizable,
    Snapshot,
}

impl ReadConcernLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadConcernLevel::Local => "local",
            ReadConcernLevel::Available => "available",
            ReadConcernLevel::Majority => "majority",
            ReadConcernLevel::Linearizable => "linearizable",
            ReadConcernLevel::Snapshot => "snapshot",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ReadConcern {
    pub level: ReadConcernLevel,
}

impl ReadConcern {
    pub fn new(level: ReadConcernLevel) -> Self {
        Self { level }
    }
}

/// The `w` field of a write concern.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Acknowledgment {
    Nodes(u32),
    Named(String),
}

impl Acknowledgment {
    pub const MAJORITY: &'static str = "majority";

    pub fn majority() -> Self {
        Acknowledgment::Named(Self::MAJORITY.to_owned())
    }
}

impl fmt::Display for Acknowledgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acknowledgment::Nodes(nodes) => write!(f, "{nodes}"),
            Acknowledgment::Named(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for Acknowledgment {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.parse::<u32>() {
            Ok(nodes) => Acknowledgment::Nodes(nodes),
            Err(_) => Acknowledgment::Named(value.to_owned()),
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WriteConcern {
    #[serde(default)]
    pub w: Option<Acknowledgment>,
    #[serde(default)]
    pub journal: Option<bool>,
    #[serde(default)]
    pub wtimeout_millis: Option<u64>,
}

impl WriteConcern {
    pub fn majority() -> Self {
        Self { w: Some(Acknowledgment::majority()), journal: None, wtimeout_millis: None }
    }

    pub fn unacknowledged() -> Self {
        Self { w: Some(Acknowledgment::Nodes(0)), journal: None, wtimeout_millis: None }
    }

    pub fn nodes(nodes: u32) -> Self {
        Self { w: Some(Acknowledgment::Nodes(nodes)), journal: None, wtimeout_millis: None }
    }

    /// `w: 0` without journaling asks the server for no reply at all.
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self.w, Some(Acknowledgment::Nodes(0))) || self.journal == Some(true)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPreference {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreference {
    pub fn mode(&self) -> &'static str {
        match self {
            ReadPreference::Primary => "primary",
            ReadPreference::PrimaryPreferred => "primaryPreferred",
            ReadPreference::Secondary => "secondary",
            ReadPreference::SecondaryPreferred => "secondaryPreferred",
            ReadPreference::Nearest => "nearest",
        }
    }
}

/// Per-transaction overrides; unset fields fall back to the connection defaults on `merge`.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct TransactionOptions {
    pub read_concern: Option<ReadConcern>,
    pub write_concern: Option<WriteConcern>,
    pub read_preference: Option<ReadPreference>,
}

impl TransactionOptions {
    pub fn new(
        read_concern: Option<ReadConcern>,
        write_concern: Option<WriteConcern>,
        read_preference: Option<ReadPreference>,
    ) -> Self {
        Self { read_concern, write_concern, read_preference }
    }

    pub fn merge(self, defaults: &TransactionOptions) -> TransactionOptions {
        TransactionOptions {
            read_concern: self.read_concern.or(defaults.read_concern),
            write_concern: self.write_concern.or_else(|| defaults.write_concern.clone()),
            read_preference: self.read_preference.or(defaults.read_preference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_options_default_to_causal_consistency() {
        assert!(SessionOptions::default().causally_consistent);
        let parsed: SessionOptions = serde_json::from_str("{}").unwrap();
        assert!(parsed.causally_consistent);
        let parsed: SessionOptions = serde_json::from_str(r#"{"causallyConsistent": false}"#).unwrap();
        assert!(!parsed.causally_consistent);
    }

    #[test]
    fn unacknowledged_write_concern_is_detected() {
        assert!(!WriteConcern::unacknowledged().is_acknowledged());
        assert!(WriteConcern::majority().is_acknowledged());
        assert!(WriteConcern::nodes(1).is_acknowledged());
        assert!(WriteConcern::default().is_acknowledged());
        let journaled = WriteConcern { journal: Some(true), ..WriteConcern::unacknowledged() };
        assert!(journaled.is_acknowledged());
    }

    #[test]
    fn merge_prefers_explicit_values() {
        let defaults = TransactionOptions::new(
            Some(ReadConcern::new(ReadConcernLevel::Majority)),
            Some(WriteConcern::majority()),
            Some(ReadPreference::Primary),
        );
        let merged = TransactionOptions::new(None, Some(WriteConcern::nodes(2)), None).merge(&defaults);
        assert_eq!(merged.read_concern, Some(ReadConcern::new(ReadConcernLevel::Majority)));
        assert_eq!(merged.write_concern, Some(WriteConcern::nodes(2)));
        assert_eq!(merged.read_preference, Some(ReadPreference::Primary));
    }

    #[test]
    fn acknowledgment_parses_numbers_and_names() {
        assert_eq!("3".parse::<Acknowledgment>().unwrap(), Acknowledgment::Nodes(3));
        assert_eq!("majority".parse::<Acknowledgment>().unwrap(), Acknowledgment::majority());
    }
}
