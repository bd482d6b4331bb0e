//! Combining and comparing resolved environments.
//!
//! These helpers back environment listing and comparison commands. They work
//! on already-resolved environments, or resolve them on demand.

use super::error::ResolveError;
use super::resolver::{resolve_with, ResolveOptions, ResolvedEnvironment, VariableSource};
use super::system::{ProcessEnv, SystemVariables};
use crate::environment::EnvironmentFile;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Merges resolved environments. Later environments override earlier ones on
/// key collisions, sources included; the name joins all input names with `+`.
///
/// # Examples
///
/// ```
/// use restflow::variables::{merge, ResolvedEnvironment, VariableSource};
/// use serde_json::json;
///
/// let mut base = ResolvedEnvironment::new("dev");
/// base.insert("host", json!("a"), VariableSource::Public);
/// let mut globals = ResolvedEnvironment::new("globals");
/// globals.insert("host", json!("b"), VariableSource::Global);
///
/// let merged = merge(&[&base, &globals]);
/// assert_eq!(merged.name, "dev+globals");
/// assert_eq!(merged.get("host"), Some(&json!("b")));
/// ```
pub fn merge(environments: &[&ResolvedEnvironment]) -> ResolvedEnvironment {
    let name = environments
        .iter()
        .map(|env| env.name.as_str())
        .collect::<Vec<_>>()
        .join("+");

    let mut merged = ResolvedEnvironment::new(name);
    for env in environments {
        for (key, value) in &env.variables {
            let source = env.source_of(key).unwrap_or(VariableSource::Public);
            merged.insert(key.clone(), value.clone(), source);
        }
    }
    merged
}

/// Key listing for one environment name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Keys the public document defines for this environment.
    pub public_keys: Vec<String>,
    /// Keys the private document defines for this environment.
    pub private_keys: Vec<String>,
    /// Number of distinct keys across both.
    pub total_unique: usize,
}

/// Lists every environment defined by either document with its keys.
///
/// Environments appear in public document order, followed by those only the
/// private document defines. `$shared` is not listed.
pub fn environment_info(
    public: &EnvironmentFile,
    private: &EnvironmentFile,
) -> IndexMap<String, EnvironmentInfo> {
    let mut names = public.names();
    for name in private.names() {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    names
        .into_iter()
        .map(|name| {
            let public_keys = public.get(&name).map(|e| e.keys()).unwrap_or_default();
            let private_keys = private.get(&name).map(|e| e.keys()).unwrap_or_default();
            let total_unique = public_keys.len()
                + private_keys
                    .iter()
                    .filter(|key| !public_keys.contains(key))
                    .count();
            let info = EnvironmentInfo {
                public_keys,
                private_keys,
                total_unique,
            };
            (name, info)
        })
        .collect()
}

/// A variable whose resolved value differs between two environments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDifference {
    pub name: String,
    pub value_a: Value,
    pub value_b: Value,
}

/// Variable-by-variable comparison of two resolved environments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDiff {
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
    pub same: Vec<String>,
    pub different: Vec<ValueDifference>,
}

impl EnvironmentDiff {
    /// Whether both environments resolve to identical variable sets.
    pub fn is_identical(&self) -> bool {
        self.only_in_a.is_empty() && self.only_in_b.is_empty() && self.different.is_empty()
    }
}

/// Resolves `env_a` and `env_b` independently and compares the results.
pub fn diff(
    public: &EnvironmentFile,
    private: &EnvironmentFile,
    env_a: &str,
    env_b: &str,
) -> Result<EnvironmentDiff, ResolveError> {
    diff_with(
        public,
        private,
        env_a,
        env_b,
        &ResolveOptions::default(),
        &ProcessEnv,
    )
}

/// [`diff`] with explicit resolution options.
pub fn diff_with(
    public: &EnvironmentFile,
    private: &EnvironmentFile,
    env_a: &str,
    env_b: &str,
    options: &ResolveOptions,
    system: &dyn SystemVariables,
) -> Result<EnvironmentDiff, ResolveError> {
    let a = resolve_with(public, private, env_a, options, system)?;
    let b = resolve_with(public, private, env_b, options, system)?;
    Ok(compare(&a, &b))
}

/// Compares two resolved environments.
pub fn compare(a: &ResolvedEnvironment, b: &ResolvedEnvironment) -> EnvironmentDiff {
    let mut diff = EnvironmentDiff::default();

    for (name, value_a) in &a.variables {
        match b.get(name) {
            None => diff.only_in_a.push(name.clone()),
            Some(value_b) if value_b == value_a => diff.same.push(name.clone()),
            Some(value_b) => diff.different.push(ValueDifference {
                name: name.clone(),
                value_a: value_a.clone(),
                value_b: value_b.clone(),
            }),
        }
    }
    for name in b.variables.keys() {
        if !a.contains(name) {
            diff.only_in_b.push(name.clone());
        }
    }

    diff
}
