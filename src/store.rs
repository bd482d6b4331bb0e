//! Global variables shared across a request sequence.
//!
//! Response handlers publish values (tokens, ids) that later requests in the
//! same run reference as ordinary `{{name}}` placeholders. The store is
//! cloneable and every clone shares the same table.

use crate::variables::{ResolvedEnvironment, VariableSource};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Name given to the environment returned by [`GlobalStore::as_environment`].
pub const GLOBALS_ENVIRONMENT: &str = "globals";

/// Thread-safe table of global variables.
///
/// # Examples
///
/// ```
/// use restflow::store::GlobalStore;
/// use serde_json::json;
///
/// let store = GlobalStore::new();
/// let handle = store.clone();
/// handle.set("token", json!("abc"));
///
/// assert_eq!(store.get("token"), Some(json!("abc")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GlobalStore {
    variables: Arc<RwLock<IndexMap<String, Value>>>,
}

impl GlobalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a copy of a variable's value.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.variables
            .read()
            .ok()
            .and_then(|vars| vars.get(name).cloned())
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        if let Ok(mut vars) = self.variables.write() {
            vars.insert(name.into(), value);
        }
    }

    /// Sets several variables at once under a single lock.
    pub fn extend(&self, values: impl IntoIterator<Item = (String, Value)>) {
        if let Ok(mut vars) = self.variables.write() {
            vars.extend(values);
        }
    }

    /// Removes a variable, returning its value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.variables
            .write()
            .ok()
            .and_then(|mut vars| vars.shift_remove(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables
            .read()
            .ok()
            .is_some_and(|vars| vars.contains_key(name))
    }

    pub fn clear(&self) {
        if let Ok(mut vars) = self.variables.write() {
            vars.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.variables.read().ok().map_or(0, |vars| vars.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all variables in insertion order.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.variables
            .read()
            .ok()
            .map(|vars| vars.clone())
            .unwrap_or_default()
    }

    /// The globals as a resolved environment, ready to be layered over
    /// another one with [`crate::variables::merge`].
    pub fn as_environment(&self) -> ResolvedEnvironment {
        let mut env = ResolvedEnvironment::new(GLOBALS_ENVIRONMENT);
        for (name, value) in self.snapshot() {
            env.insert(name, value, VariableSource::Global);
        }
        env
    }
}
