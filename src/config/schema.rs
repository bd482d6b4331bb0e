//! Configuration schema.
//!
//! This module defines the configuration structure and validation logic for
//! every user-configurable setting.

use crate::environment::LoaderConfig;
use crate::variables::ResolveOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest accepted value for `maxResolutionPasses`.
pub const MAX_RESOLUTION_PASSES_LIMIT: usize = 64;

/// Errors raised by [`RestflowConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid setting '{setting}': {message}")]
    Invalid { setting: String, message: String },
}

/// Main configuration structure.
///
/// All settings can be supplied under the "restflow" key of a settings
/// document. Missing settings fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestflowConfig {
    /// Public environment document, relative to the workspace root.
    ///
    /// Defaults to "http-client.env.json".
    #[serde(default = "default_environment_file")]
    pub environment_file: String,

    /// Private environment document, relative to the workspace root.
    ///
    /// Values here override the public document. Defaults to
    /// "http-client.private.env.json".
    #[serde(default = "default_private_environment_file")]
    pub private_environment_file: String,

    /// Whether references no environment defines may be read from process
    /// variables. Defaults to true.
    #[serde(default = "default_system_variables")]
    pub system_variables: bool,

    /// When set, only process variables starting with this prefix are
    /// visible during resolution.
    #[serde(default)]
    pub system_variable_prefix: Option<String>,

    /// Upper bound on resolution passes. Defaults to 10.
    ///
    /// Must be between 1 and 64.
    #[serde(default = "default_max_resolution_passes")]
    pub max_resolution_passes: usize,

    /// Whether the validator runs its strict checks. Defaults to false.
    #[serde(default = "default_strict_validation")]
    pub strict_validation: bool,
}

impl Default for RestflowConfig {
    fn default() -> Self {
        Self {
            environment_file: default_environment_file(),
            private_environment_file: default_private_environment_file(),
            system_variables: default_system_variables(),
            system_variable_prefix: None,
            max_resolution_passes: default_max_resolution_passes(),
            strict_validation: default_strict_validation(),
        }
    }
}

impl RestflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RESOLUTION_PASSES_LIMIT).contains(&self.max_resolution_passes) {
            return Err(ConfigError::Invalid {
                setting: "maxResolutionPasses".to_string(),
                message: format!("must be between 1 and {}", MAX_RESOLUTION_PASSES_LIMIT),
            });
        }

        if self.environment_file.trim().is_empty() {
            return Err(ConfigError::Invalid {
                setting: "environmentFile".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.private_environment_file.trim().is_empty() {
            return Err(ConfigError::Invalid {
                setting: "privateEnvironmentFile".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self
            .system_variable_prefix
            .as_deref()
            .is_some_and(|prefix| prefix.is_empty())
        {
            return Err(ConfigError::Invalid {
                setting: "systemVariablePrefix".to_string(),
                message: "must not be empty when set".to_string(),
            });
        }

        Ok(())
    }

    /// Environment document locations inside `workspace`.
    pub fn loader_config(&self, workspace: &Path) -> LoaderConfig {
        LoaderConfig::new(
            workspace.join(&self.environment_file),
            workspace.join(&self.private_environment_file),
        )
    }

    /// Resolution options matching these settings.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            system_variables: self.system_variables,
            system_prefix: self.system_variable_prefix.clone(),
            max_passes: self.max_resolution_passes,
        }
    }

    pub fn merge(&self, other: &RestflowConfig) -> Self {
        Self {
            environment_file: other.environment_file.clone(),
            private_environment_file: other.private_environment_file.clone(),
            system_variables: other.system_variables,
            system_variable_prefix: other
                .system_variable_prefix
                .clone()
                .or_else(|| self.system_variable_prefix.clone()),
            max_resolution_passes: other.max_resolution_passes,
            strict_validation: other.strict_validation,
        }
    }
}

// Default value functions for serde

fn default_environment_file() -> String {
    "http-client.env.json".to_string()
}

fn default_private_environment_file() -> String {
    "http-client.private.env.json".to_string()
}

fn default_system_variables() -> bool {
    true
}

fn default_max_resolution_passes() -> usize {
    crate::variables::DEFAULT_MAX_PASSES
}

fn default_strict_validation() -> bool {
    false
}
