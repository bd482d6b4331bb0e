//! Configuration management.
//!
//! This module provides configuration loading, validation, and access through
//! a singleton. Configuration is read from a settings document under the
//! "restflow" key and merged with defaults.

pub mod schema;

pub use schema::{ConfigError, RestflowConfig};

use log::warn;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::RwLock;

/// Key of the settings section read by [`load_config`].
pub const SETTINGS_KEY: &str = "restflow";

/// Global configuration instance.
static CONFIG: Lazy<RwLock<RestflowConfig>> =
    Lazy::new(|| RwLock::new(RestflowConfig::default()));

/// Loads configuration from a settings JSON value.
///
/// Settings that cannot be deserialized are ignored with a warning and the
/// defaults are used instead. A configuration that deserializes but fails
/// validation is an error and leaves the global configuration unchanged.
///
/// # Arguments
///
/// * `settings_json` - Optional JSON value containing user settings under the "restflow" key
///
/// # Example
///
/// ```no_run
/// use restflow::config::load_config;
/// use serde_json::json;
///
/// let settings = json!({
///     "restflow": {
///         "strictValidation": true,
///         "maxResolutionPasses": 20
///     }
/// });
///
/// let config = load_config(Some(settings)).unwrap();
/// assert!(config.strict_validation);
/// ```
pub fn load_config(settings_json: Option<Value>) -> Result<RestflowConfig, ConfigError> {
    let mut config = RestflowConfig::default();

    if let Some(user_settings) = settings_json.as_ref().and_then(|s| s.get(SETTINGS_KEY)) {
        match serde_json::from_value::<RestflowConfig>(user_settings.clone()) {
            Ok(user_config) => config = config.merge(&user_config),
            Err(e) => warn!(
                "Failed to parse {} settings: {}. Using defaults.",
                SETTINGS_KEY, e
            ),
        }
    }

    config.validate()?;

    if let Ok(mut global_config) = CONFIG.write() {
        *global_config = config.clone();
    }

    Ok(config)
}

/// Gets a copy of the current global configuration.
///
/// Returns the defaults if nothing has been loaded yet.
pub fn get_config() -> RestflowConfig {
    CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_else(|_| RestflowConfig::default())
}

/// Resets the configuration to defaults.
pub fn reset_config() {
    if let Ok(mut config) = CONFIG.write() {
        *config = RestflowConfig::default();
    }
}
