//! Environment resolution.
//!
//! Resolution merges one named environment from the public and private
//! documents and then expands `{{name}}` references between its variables.
//!
//! Merge order, lowest precedence first:
//!
//! 1. public `$shared`
//! 2. private `$shared`
//! 3. public environment
//! 4. private environment
//!
//! Expansion runs in passes over the merged table. Each pass substitutes every
//! reference it can, looking first in the table and then, optionally, at
//! process variables. A value that is exactly one reference takes the
//! referenced value with its original type, so `"{{timeout}}"` can resolve to
//! the number `30000`. References that are still resolvable once the passes
//! stop indicate a cycle.

use super::error::ResolveError;
use super::substitution::{single_reference, value_to_text, VARIABLE_REGEX};
use super::system::{ProcessEnv, SystemVariables};
use crate::environment::{Environment, EnvironmentFile};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default number of expansion passes.
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Where a resolved variable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableSource {
    Public,
    Private,
    System,
    /// Set by a response handler during a run.
    Global,
}

impl VariableSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableSource::Public => "public",
            VariableSource::Private => "private",
            VariableSource::System => "system",
            VariableSource::Global => "global",
        }
    }
}

impl fmt::Display for VariableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The merged, expanded variable set of one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEnvironment {
    pub name: String,
    pub variables: IndexMap<String, Value>,
    pub source: IndexMap<String, VariableSource>,
}

impl ResolvedEnvironment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
            source: IndexMap::new(),
        }
    }

    /// Sets a variable and records its source, replacing any previous entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Value, source: VariableSource) {
        let key = key.into();
        self.source.insert(key.clone(), source);
        self.variables.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Textual value of a variable, as it would be substituted.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.variables.get(key).map(value_to_text)
    }

    pub fn source_of(&self, key: &str) -> Option<VariableSource> {
        self.source.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Variable names in resolution order.
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

/// Tuning for [`resolve_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Whether undefined references may fall back to process variables.
    pub system_variables: bool,
    /// When set, only process variables whose name starts with this prefix
    /// are visible. The reference uses the full name, prefix included.
    pub system_prefix: Option<String>,
    /// Upper bound on expansion passes.
    pub max_passes: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            system_variables: true,
            system_prefix: None,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl ResolveOptions {
    fn allows_system(&self, name: &str) -> bool {
        self.system_variables
            && self
                .system_prefix
                .as_deref()
                .map_or(true, |prefix| name.starts_with(prefix))
    }
}

/// Resolves `env_name` with default options, consulting the process
/// environment for references no document defines.
///
/// # Errors
///
/// * [`ResolveError::EnvironmentNotFound`] if neither document defines it
/// * [`ResolveError::CircularReference`] if variables refer to each other
///
/// # Examples
///
/// ```
/// use restflow::environment::{Environment, EnvironmentFile};
/// use restflow::variables::{resolve, VariableSource};
/// use serde_json::json;
///
/// let mut dev = Environment::new("dev");
/// dev.set("timeout", 30000);
/// dev.set("t2", "{{timeout}}");
/// let mut public = EnvironmentFile::new();
/// public.add_environment(dev);
///
/// let resolved = resolve(&public, &EnvironmentFile::new(), "dev").unwrap();
/// assert_eq!(resolved.get("t2"), Some(&json!(30000)));
/// assert_eq!(resolved.source_of("t2"), Some(VariableSource::Public));
/// ```
pub fn resolve(
    public: &EnvironmentFile,
    private: &EnvironmentFile,
    env_name: &str,
) -> Result<ResolvedEnvironment, ResolveError> {
    resolve_with(public, private, env_name, &ResolveOptions::default(), &ProcessEnv)
}

/// Resolves `env_name` with explicit options and process variable source.
pub fn resolve_with(
    public: &EnvironmentFile,
    private: &EnvironmentFile,
    env_name: &str,
    options: &ResolveOptions,
    system: &dyn SystemVariables,
) -> Result<ResolvedEnvironment, ResolveError> {
    let merged = merge_sources(public, private, env_name)?;
    let original = merged.variables.clone();
    let mut resolved = merged;

    let max_passes = options.max_passes.max(1);
    let mut passes = 0;
    loop {
        passes += 1;
        let changed = expand_pass(&mut resolved, options, system);
        if !changed || passes >= max_passes {
            break;
        }
    }
    trace!(
        "environment '{}' expanded in {} passes",
        env_name,
        passes
    );

    if let Some(key) = first_pending(&resolved) {
        let cycle = find_cycle(&original, &key).unwrap_or_else(|| vec![key.clone()]);
        warn!(
            "circular variable reference in environment '{}': {}",
            env_name,
            cycle.join(" -> ")
        );
        return Err(ResolveError::CircularReference { cycle });
    }

    Ok(resolved)
}

/// Layers `$shared` and the named environment from both documents.
fn merge_sources(
    public: &EnvironmentFile,
    private: &EnvironmentFile,
    env_name: &str,
) -> Result<ResolvedEnvironment, ResolveError> {
    let public_env = public.get(env_name);
    let private_env = private.get(env_name);

    if env_name.starts_with('$') || (public_env.is_none() && private_env.is_none()) {
        let mut available = public.names();
        for name in private.names() {
            if !available.contains(&name) {
                available.push(name);
            }
        }
        return Err(ResolveError::EnvironmentNotFound {
            name: env_name.to_string(),
            available,
        });
    }

    let layers: [(Option<&Environment>, VariableSource); 4] = [
        (public.shared(), VariableSource::Public),
        (private.shared(), VariableSource::Private),
        (public_env, VariableSource::Public),
        (private_env, VariableSource::Private),
    ];

    let mut resolved = ResolvedEnvironment::new(env_name);
    for (env, source) in layers {
        if let Some(env) = env {
            for (key, value) in &env.variables {
                resolved.insert(key.clone(), value.clone(), source);
            }
        }
    }
    debug!(
        "merged environment '{}' with {} variables",
        env_name,
        resolved.len()
    );
    Ok(resolved)
}

/// Runs one substitution pass in place. Returns whether anything changed.
fn expand_pass(
    resolved: &mut ResolvedEnvironment,
    options: &ResolveOptions,
    system: &dyn SystemVariables,
) -> bool {
    let mut changed = false;
    let keys = resolved.keys();

    for key in keys {
        let text = match resolved.variables.get(&key) {
            Some(Value::String(text)) if text.contains("{{") => text.clone(),
            _ => continue,
        };

        let new_value = if let Some(reference) = single_reference(&text) {
            match lookup(resolved, reference, options, system) {
                Some(value) => value,
                None => continue,
            }
        } else {
            let mut names = Vec::new();
            for caps in VARIABLE_REGEX.captures_iter(&text) {
                names.push(caps[1].trim().to_string());
            }
            let mut values = IndexMap::new();
            for name in names {
                if let Some(value) = lookup(resolved, &name, options, system) {
                    values.insert(name, value_to_text(&value));
                }
            }
            let replaced = VARIABLE_REGEX.replace_all(&text, |caps: &regex::Captures| {
                match values.get(caps[1].trim()) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            });
            Value::String(replaced.into_owned())
        };

        if new_value != Value::String(text) {
            if let Some(slot) = resolved.variables.get_mut(&key) {
                *slot = new_value;
                changed = true;
            }
        }
    }

    changed
}

/// Looks `name` up in the table, then among process variables. A process
/// variable found here is added to the table with source `system`.
fn lookup(
    resolved: &mut ResolvedEnvironment,
    name: &str,
    options: &ResolveOptions,
    system: &dyn SystemVariables,
) -> Option<Value> {
    if let Some(value) = resolved.get(name) {
        return Some(value.clone());
    }
    if !options.allows_system(name) {
        return None;
    }
    let value = Value::String(system.get(name)?);
    debug!("resolved '{}' from process variables", name);
    resolved.insert(name, value.clone(), VariableSource::System);
    Some(value)
}

/// First variable whose value still holds a reference the table defines.
fn first_pending(resolved: &ResolvedEnvironment) -> Option<String> {
    resolved.variables.iter().find_map(|(key, value)| {
        let text = value.as_str()?;
        VARIABLE_REGEX
            .captures_iter(text)
            .any(|caps| resolved.contains(caps[1].trim()))
            .then(|| key.clone())
    })
}

/// Follows references in the unexpanded table from `start` and returns the
/// first cycle reached, closed with its starting name.
fn find_cycle(table: &IndexMap<String, Value>, start: &str) -> Option<Vec<String>> {
    fn references<'a>(table: &'a IndexMap<String, Value>, key: &str) -> Vec<&'a str> {
        let Some(text) = table.get(key).and_then(Value::as_str) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for caps in VARIABLE_REGEX.captures_iter(text) {
            if let Some((name, _)) = table.get_key_value(caps[1].trim()) {
                names.push(name.as_str());
            }
        }
        names
    }

    fn visit<'a>(
        table: &'a IndexMap<String, Value>,
        key: &'a str,
        path: &mut IndexSet<&'a str>,
        done: &mut IndexSet<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(index) = path.get_index_of(key) {
            let mut cycle: Vec<String> = path
                .iter()
                .skip(index)
                .map(|name| name.to_string())
                .collect();
            cycle.push(key.to_string());
            return Some(cycle);
        }
        if done.contains(key) {
            return None;
        }

        path.insert(key);
        for next in references(table, key) {
            if let Some(cycle) = visit(table, next, path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(key);
        None
    }

    let (start, _) = table.get_key_value(start)?;
    visit(table, start.as_str(), &mut IndexSet::new(), &mut IndexSet::new())
}

/// Reports every reference left in a resolved environment.
///
/// Resolution leaves references to undefined variables in place; this pass
/// turns each into a [`ResolveError::UnresolvedVariable`].
pub fn validate_resolution(resolved: &ResolvedEnvironment) -> Vec<ResolveError> {
    let mut errors = Vec::new();
    for (key, value) in &resolved.variables {
        let Some(text) = value.as_str() else {
            continue;
        };
        for caps in VARIABLE_REGEX.captures_iter(text) {
            errors.push(ResolveError::UnresolvedVariable {
                key: key.clone(),
                reference: caps[1].trim().to_string(),
            });
        }
    }
    errors
}
