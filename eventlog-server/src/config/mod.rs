//! Configuration module for eventlog-server.
//!
//! Handles loading configuration from the TOML file and CLI overrides, and
//! builds the immutable event schema.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{DatabaseConfig, ServerConfig};
use eventlog_core::schema::EventSchema;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub schema: EventSchema,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file (a missing file means all defaults)
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = ?self.config_path,
                    "Config file not found, using defaults"
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        Ok(self.build_loaded_config(file_config))
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.server.outbound_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "server.outbound_buffer must be greater than zero".into(),
            ));
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than zero".into(),
            ));
        }

        let Some(event_types) = &config.event_types else {
            return Ok(());
        };
        if event_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "event_types is present but defines no event types".into(),
            ));
        }
        for (name, fields) in event_types {
            if name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "event type names must not be empty".into(),
                ));
            }
            if fields.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "event type {name} has no required fields"
                )));
            }
            let mut seen = HashSet::new();
            for field in fields {
                if !seen.insert(field) {
                    return Err(ConfigError::ValidationError(format!(
                        "event type {name} lists field {field} twice"
                    )));
                }
            }
        }
        Ok(())
    }

    fn build_loaded_config(&self, file_config: FileConfig) -> LoadedConfig {
        let schema = match file_config.event_types {
            Some(event_types) => EventSchema::from_definitions(event_types),
            None => EventSchema::builtin(),
        };

        LoadedConfig {
            server: ServerConfig {
                listen: file_config.server.listen,
                idle_timeout: file_config
                    .server
                    .idle_timeout_secs
                    .map(Duration::from_secs),
                outbound_buffer: file_config.server.outbound_buffer,
            },
            database: DatabaseConfig {
                max_connections: file_config.database.max_connections,
            },
            schema,
        }
    }
}
