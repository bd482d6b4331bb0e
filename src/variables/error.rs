//! Errors raised while resolving environments.

use crate::environment::EnvError;
use thiserror::Error;

/// Errors that abort resolution of one environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The requested environment is defined in neither document.
    #[error("Environment '{name}' not found. Available environments: {}", format_available(.available))]
    EnvironmentNotFound {
        name: String,
        available: Vec<String>,
    },

    /// Variables that keep referring to each other. `cycle` starts and ends
    /// with the same name.
    #[error("Circular variable reference detected: {}", .cycle.join(" -> "))]
    CircularReference { cycle: Vec<String> },

    /// A reference that nothing defines, found after resolution.
    #[error("Variable '{key}' references undefined variable '{reference}'")]
    UnresolvedVariable { key: String, reference: String },

    #[error(transparent)]
    Load(#[from] EnvError),
}

fn format_available(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
