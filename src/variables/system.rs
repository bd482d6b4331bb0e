//! Process-level variables.
//!
//! During resolution a `{{name}}` reference that no environment defines may
//! fall back to a variable of the running process. The lookup goes through
//! [`SystemVariables`] so tests and embedders can supply their own table.

use std::collections::HashMap;
use std::env;

/// Source of process-level variables.
pub trait SystemVariables {
    /// Returns the value of `name`, or `None` if it is not set.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads variables from the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SystemVariables for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        // Such names can never be set on a process.
        if name.is_empty() || name.contains(['=', '\0']) {
            return None;
        }
        env::var(name).ok()
    }
}

/// No process variables at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSystemVariables;

impl SystemVariables for NoSystemVariables {
    fn get(&self, _name: &str) -> Option<String> {
        None
    }
}

impl SystemVariables for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

impl<T: SystemVariables + ?Sized> SystemVariables for &T {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}
