//! Environment file loader.
//!
//! This module reads the public and private environment documents. Both are
//! JSON objects mapping environment names to flat variable tables, with `//`
//! and `/* */` comments allowed outside string literals. A missing document
//! is treated as an empty table; a malformed one is an error.

use super::models::{Environment, EnvironmentFile, SHARED_ENVIRONMENT};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during environment loading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// The file exists but could not be read
    #[error("Failed to read environment file {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// The file is not valid JSON once comments are removed
    #[error(
        "Failed to parse environment file {} at line {line}, column {column}: {message}",
        path.display()
    )]
    Parse {
        path: PathBuf,
        message: String,
        line: usize,
        column: usize,
    },

    /// Valid JSON with the wrong shape
    #[error("Invalid environment format in {}: {message}", path.display())]
    InvalidFormat { path: PathBuf, message: String },
}

/// Public environment file names in order of preference
pub const PUBLIC_ENV_FILE_NAMES: &[&str] = &["http-client.env.json", ".http-client-env.json"];

/// Private environment file names in order of preference
pub const PRIVATE_ENV_FILE_NAMES: &[&str] = &[
    "http-client.private.env.json",
    ".http-client-private-env.json",
];

/// Maximum number of parent directories to search
const MAX_PARENT_SEARCH_DEPTH: usize = 3;

/// Locations of the two environment documents.
///
/// `None`, or a path that does not exist, loads as an empty table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    pub public_file: Option<PathBuf>,
    pub private_file: Option<PathBuf>,
}

impl LoaderConfig {
    pub fn new(public_file: impl Into<PathBuf>, private_file: impl Into<PathBuf>) -> Self {
        Self {
            public_file: Some(public_file.into()),
            private_file: Some(private_file.into()),
        }
    }
}

/// Finds the environment documents for a workspace.
///
/// Searches the workspace directory and up to 3 parent directories for each
/// document independently.
pub fn discover(workspace_path: &Path) -> LoaderConfig {
    let public_file = find_file(workspace_path, PUBLIC_ENV_FILE_NAMES);
    let private_file = find_file(workspace_path, PRIVATE_ENV_FILE_NAMES);
    debug!(
        "environment discovery in {}: public={:?} private={:?}",
        workspace_path.display(),
        public_file,
        private_file
    );
    LoaderConfig {
        public_file,
        private_file,
    }
}

/// Searches `start` and its parents for the first existing file in `names`.
fn find_file(start: &Path, names: &[&str]) -> Option<PathBuf> {
    let mut current_path = start.to_path_buf();

    for _ in 0..=MAX_PARENT_SEARCH_DEPTH {
        for filename in names {
            let candidate = current_path.join(filename);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        match current_path.parent() {
            Some(parent) => current_path = parent.to_path_buf(),
            None => break,
        }
    }

    None
}

/// Loads the public and private environment documents.
///
/// # Returns
///
/// * `Ok((public, private))` - Either table is empty when its file is absent
/// * `Err(EnvError)` - If a file exists but cannot be read or parsed
pub fn load_environments(
    config: &LoaderConfig,
) -> Result<(EnvironmentFile, EnvironmentFile), EnvError> {
    let public = load_optional(config.public_file.as_deref())?;
    let private = load_optional(config.private_file.as_deref())?;
    Ok((public, private))
}

fn load_optional(path: Option<&Path>) -> Result<EnvironmentFile, EnvError> {
    match path {
        Some(path) if path.exists() => load_environment_file(path),
        Some(path) => {
            debug!("environment file {} not found, using empty table", path.display());
            Ok(EnvironmentFile::new())
        }
        None => Ok(EnvironmentFile::new()),
    }
}

/// Reads and parses one environment document.
pub fn load_environment_file(path: &Path) -> Result<EnvironmentFile, EnvError> {
    let content = fs::read_to_string(path).map_err(|err| EnvError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let file = parse_environment_document(&content, path)?;
    debug!(
        "loaded {} environments from {}",
        file.len(),
        path.display()
    );
    Ok(file)
}

/// Parses environment document text. `path` is only used in errors.
pub fn parse_environment_document(content: &str, path: &Path) -> Result<EnvironmentFile, EnvError> {
    let stripped = strip_comments(content);
    let raw: Value = serde_json::from_str(&stripped).map_err(|err| EnvError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
        line: err.line(),
        column: err.column(),
    })?;

    let invalid = |message: String| EnvError::InvalidFormat {
        path: path.to_path_buf(),
        message,
    };

    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("Root must be a JSON object".to_string()))?;

    let mut file = EnvironmentFile::new();
    for (env_name, value) in obj {
        if env_name.starts_with('$') && env_name != SHARED_ENVIRONMENT {
            return Err(invalid(format!(
                "Environment name '{}' is reserved. Only '{}' may start with '$'",
                env_name, SHARED_ENVIRONMENT
            )));
        }
        let variables = parse_variable_map(value, env_name).map_err(invalid)?;
        file.add_environment(Environment::with_variables(env_name.clone(), variables));
    }

    Ok(file)
}

/// Parses one environment object, rejecting nested values.
fn parse_variable_map(value: &Value, context: &str) -> Result<IndexMap<String, Value>, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("Environment '{}' must be a JSON object", context))?;

    let mut map = IndexMap::new();
    for (key, val) in obj {
        match val {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {
                map.insert(key.clone(), val.clone());
            }
            _ => {
                return Err(format!(
                    "Variable '{}' in '{}' has invalid type (must be string, number, boolean or null)",
                    key, context
                ));
            }
        }
    }

    Ok(map)
}

/// Removes `//` and `/* */` comments that appear outside string literals.
///
/// Newlines inside comments are kept so that parse errors still point at the
/// right line. An unterminated block comment runs to the end of the input.
pub fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}
