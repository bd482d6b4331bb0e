//! Environment data models.
//!
//! An environment document maps environment names (e.g. "dev", "staging") to
//! a table of variables. Values are kept as JSON scalars so that numbers and
//! booleans keep their type through resolution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the environment whose variables apply to every other environment.
pub const SHARED_ENVIRONMENT: &str = "$shared";

/// A single unresolved environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    /// Environment name (e.g., "dev", "staging", "production")
    pub name: String,

    /// Variables in document order. Every value is a string, number, boolean
    /// or null.
    #[serde(default)]
    pub variables: IndexMap<String, Value>,
}

impl Environment {
    /// Creates a new environment with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
        }
    }

    /// Creates a new environment with name and variables
    pub fn with_variables(name: impl Into<String>, variables: IndexMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            variables,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Sets a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Variable names in document order.
    pub fn keys(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// All environments from one document, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentFile {
    pub environments: IndexMap<String, Environment>,
}

impl EnvironmentFile {
    /// Creates a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an environment, replacing any with the same name
    pub fn add_environment(&mut self, env: Environment) {
        self.environments.insert(env.name.clone(), env);
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    /// The `$shared` environment, if the document defines one.
    pub fn shared(&self) -> Option<&Environment> {
        self.environments.get(SHARED_ENVIRONMENT)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    /// Names of selectable environments in document order, without `$shared`.
    pub fn names(&self) -> Vec<String> {
        self.environments
            .keys()
            .filter(|name| !name.starts_with('$'))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
