//! Variables module.
//!
//! Resolution of environments into flat variable sets, and expansion of
//! `{{name}}` placeholders in request text.
//!
//! - [`resolver`] merges public and private environments and expands
//!   references between their variables.
//! - [`merger`] layers resolved environments and compares them.
//! - [`substitution`] expands placeholders in request text against a
//!   resolved environment.
//! - [`system`] supplies process-level variables to the resolver.

pub mod error;
pub mod merger;
pub mod resolver;
pub mod substitution;
pub mod system;

pub use error::ResolveError;
pub use merger::{
    compare, diff, diff_with, environment_info, merge, EnvironmentDiff, EnvironmentInfo,
    ValueDifference,
};
pub use resolver::{
    resolve, resolve_with, validate_resolution, ResolveOptions, ResolvedEnvironment,
    VariableSource, DEFAULT_MAX_PASSES,
};
pub use substitution::{
    expand_request, expand_string, extract_variables, single_reference, value_to_text,
    ExpandedRequest,
};
pub use system::{NoSystemVariables, ProcessEnv, SystemVariables};
