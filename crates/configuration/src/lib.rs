use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    Config, DatabaseSettings, IsolationLevel, LoggingSettings, ServerSettings, StorageBackend,
    StorageSettings,
};

/// The configuration file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads the application configuration.
///
/// Sources, lowest priority first: built-in defaults, the TOML file at `path`
/// (or `config.toml`; a missing file is not an error), then environment
/// variables prefixed with `APP`, using `__` between sections
/// (e.g. `APP__SERVER__PORT=9000`).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        // An explicitly requested file must exist.
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;

    tracing::debug!(?config, "Configuration loaded.");
    Ok(config)
}

/// Rejects settings that would leave the service unable to work.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port must be non-zero".to_string(),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "server.request_timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "database.max_connections must be at least 1".to_string(),
        ));
    }
    Ok(())
}
