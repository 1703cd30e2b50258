/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use options::{Acknowledgment, ReadConcern, ReadConcernLevel, ReadPreference, TransactionOptions, WriteConcern};
use resource::constants::{
    database::DEFAULT_URI,
    server::{DEFAULT_CONFIG_FILE_NAME, DEFAULT_HTTP_ADDRESS, DEFAULT_LOG_LEVEL},
    session::{DEFAULT_OPTIONS_CACHE_CAPACITY, DEFAULT_PROBE_COLLECTION, DEFAULT_PROBE_DATABASE},
};
use serde::Deserialize;
use session::gateway::ProbeNamespace;

use crate::parameters::{cli::CLIArgs, ConfigError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// The file named by `--config`, else `config.yml` beside the executable if present, else the
    /// defaults; then the command line overrides on top.
    pub fn load(cli: &CLIArgs) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ErrorReadingConfigFile {
            path: path.display().to_string(),
            source: Arc::new(source),
        })?;
        Self::from_yaml(&contents, path)
    }

    fn from_yaml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents)
            .map_err(|source| ConfigError::ErrorParsingYaml { path: path.display().to_string(), source: Arc::new(source) })
    }

    fn default_config_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE_NAME)
    }

    fn apply_overrides(&mut self, cli: &CLIArgs) {
        if let Some(address) = &cli.server_address {
            self.server.address = address.clone();
        }
        if let Some(uri) = &cli.database_uri {
            self.database.uri = uri.clone();
        }
        if let Some(w) = &cli.database_write_concern {
            self.database.write_concern.w = Some(w.clone());
        }
        if let Some(level) = &cli.logging_level {
            self.logging.level = level.clone();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.trim().is_empty() {
            return Err(ConfigError::ValidationError { message: "server.address must not be empty".to_owned() });
        }
        if self.database.uri.trim().is_empty() {
            return Err(ConfigError::ValidationError { message: "database.uri must not be empty".to_owned() });
        }
        if !self.database.write_concern.is_acknowledged() {
            return Err(ConfigError::ValidationError {
                message: "database.write-concern must be acknowledged: transactions cannot commit with w: 0".to_owned(),
            });
        }
        if let Some(Acknowledgment::Nodes(nodes)) = &self.database.write_concern.w {
            if i32::try_from(*nodes).is_err() {
                return Err(ConfigError::ValidationError {
                    message: format!("database.write-concern.w must be at most {}, got {nodes}", i32::MAX),
                });
            }
        }
        if self.sessions.options_cache_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "sessions.options-cache-capacity must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_http_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_http_address() }
    }
}

fn default_http_address() -> String {
    DEFAULT_HTTP_ADDRESS.to_owned()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default)]
    pub read_concern: Option<ReadConcernLevel>,
    #[serde(default = "WriteConcern::majority")]
    pub write_concern: WriteConcern,
    #[serde(default)]
    pub read_preference: ReadPreference,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            read_concern: None,
            write_concern: WriteConcern::majority(),
            read_preference: ReadPreference::default(),
        }
    }
}

impl DatabaseConfig {
    /// Connection-level defaults every transaction starts from.
    pub fn transaction_defaults(&self) -> TransactionOptions {
        TransactionOptions::new(
            self.read_concern.map(ReadConcern::new),
            Some(self.write_concern.clone()),
            Some(self.read_preference),
        )
    }
}

fn default_uri() -> String {
    DEFAULT_URI.to_owned()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SessionsConfig {
    #[serde(default)]
    pub probe_namespace: ProbeNamespaceConfig,
    #[serde(default = "default_options_cache_capacity")]
    pub options_cache_capacity: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { probe_namespace: ProbeNamespaceConfig::default(), options_cache_capacity: DEFAULT_OPTIONS_CACHE_CAPACITY }
    }
}

fn default_options_cache_capacity() -> u64 {
    DEFAULT_OPTIONS_CACHE_CAPACITY
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProbeNamespaceConfig {
    pub database: String,
    pub collection: String,
}

impl Default for ProbeNamespaceConfig {
    fn default() -> Self {
        Self { database: DEFAULT_PROBE_DATABASE.to_owned(), collection: DEFAULT_PROBE_COLLECTION.to_owned() }
    }
}

impl From<&ProbeNamespaceConfig> for ProbeNamespace {
    fn from(config: &ProbeNamespaceConfig) -> Self {
        ProbeNamespace::new(config.database.clone(), config.collection.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config, ConfigError> {
        Config::from_yaml(yaml, Path::new("test.yml"))
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse("{}").unwrap();
        assert_eq!(config.server.address, DEFAULT_HTTP_ADDRESS);
        assert_eq!(config.database.uri, DEFAULT_URI);
        assert_eq!(config.database.write_concern, WriteConcern::majority());
        assert_eq!(config.sessions.probe_namespace.database, DEFAULT_PROBE_DATABASE);
        assert_eq!(config.sessions.options_cache_capacity, DEFAULT_OPTIONS_CACHE_CAPACITY);
        assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn every_section_is_read() {
        let config = parse(
            r#"
server:
  address: 127.0.0.1:9000
database:
  uri: mongodb://db:27017/?replicaSet=main
  read-concern: snapshot
  write-concern:
    w: 2
    journal: true
  read-preference: primaryPreferred
sessions:
  probe-namespace:
    database: scratch
    collection: probes
  options-cache-capacity: 10
logging:
  level: debug
"#,
        )
        .unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.database.read_concern, Some(ReadConcernLevel::Snapshot));
        assert_eq!(config.database.write_concern.w, Some(Acknowledgment::Nodes(2)));
        assert_eq!(config.database.read_preference, ReadPreference::PrimaryPreferred);
        assert_eq!(ProbeNamespace::from(&config.sessions.probe_namespace), ProbeNamespace::new("scratch", "probes"));
        assert_eq!(config.logging.level, "debug");

        let defaults = config.database.transaction_defaults();
        assert_eq!(defaults.read_concern, Some(ReadConcern::new(ReadConcernLevel::Snapshot)));
        assert_eq!(defaults.read_preference, Some(ReadPreference::PrimaryPreferred));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(parse("server:\n  port: 1"), Err(ConfigError::ErrorParsingYaml { .. })));
    }

    #[test]
    fn command_line_overrides_the_file() {
        let mut config = parse("database:\n  uri: mongodb://file\n").unwrap();
        let cli = CLIArgs {
            database_uri: Some("mongodb://cli".to_owned()),
            database_write_concern: Some(Acknowledgment::Nodes(3)),
            ..CLIArgs::default()
        };
        config.apply_overrides(&cli);
        assert_eq!(config.database.uri, "mongodb://cli");
        assert_eq!(config.database.write_concern.w, Some(Acknowledgment::Nodes(3)));
    }

    #[test]
    fn unacknowledged_write_concern_is_invalid() {
        let config = parse("database:\n  write-concern:\n    w: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn node_counts_beyond_i32_are_invalid() {
        let config = parse("database:\n  write-concern:\n    w: 2147483648\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError { .. })));
        let config = parse("database:\n  write-concern:\n    w: 2147483647\n").unwrap();
        assert!(config.validate().is_ok());
    }
}
