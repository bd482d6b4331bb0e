//! Environment documents.
//!
//! This module loads the public (`http-client.env.json`) and private
//! (`http-client.private.env.json`) environment documents into unresolved
//! [`EnvironmentFile`] tables. Resolution of `{{name}}` references between
//! variables happens in [`crate::variables`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use restflow::environment::{discover, load_environments};
//!
//! let workspace = Path::new("/path/to/workspace");
//! let (public, private) = load_environments(&discover(workspace)).unwrap();
//!
//! for name in public.names() {
//!     println!("environment: {}", name);
//! }
//! # let _ = private;
//! ```

pub mod loader;
pub mod models;

pub use loader::{
    discover, load_environment_file, load_environments, parse_environment_document,
    strip_comments, EnvError, LoaderConfig,
};
pub use models::{Environment, EnvironmentFile, SHARED_ENVIRONMENT};
