//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Deployment default stamp, as set by the hosting platform.
pub const ENV_DEFAULT_STAMP: &str = "WEBSITE_DEFAULT_STAMP";
pub const ENV_BASIC_AUTH_USERNAME: &str = "GEOPROXY_BASIC_AUTH_USERNAME";
pub const ENV_BASIC_AUTH_PASSWORD: &str = "GEOPROXY_BASIC_AUTH_PASSWORD";
pub const ENV_IDENTITY_ENDPOINT: &str = "GEOPROXY_IDENTITY_ENDPOINT";
pub const ENV_IDENTITY_SECRET: &str = "GEOPROXY_IDENTITY_SECRET";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finish(config)
}

/// Build the configuration from defaults and the environment only.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default())
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay secrets and the default stamp from the environment.
///
/// Empty variables are ignored so a blank app setting never wipes a file value.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(stamp) = get(ENV_DEFAULT_STAMP) {
        config.routing.default_stamp = stamp;
    }
    if let Some(username) = get(ENV_BASIC_AUTH_USERNAME) {
        config.basic_auth.username = username;
    }
    if let Some(password) = get(ENV_BASIC_AUTH_PASSWORD) {
        config.basic_auth.password = password;
    }
    if let Some(endpoint) = get(ENV_IDENTITY_ENDPOINT) {
        config.identity.endpoint = endpoint;
    }
    if let Some(secret) = get(ENV_IDENTITY_SECRET) {
        config.identity.secret = secret;
    }
}
