//! Request files, environments and variable resolution for `.http` request
//! sequences.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - **parser**: Tokenizes and parses `.http`/`.rest` text into requests
//! - **validator**: Reports structural defects in parsed requests
//! - **environment**: Loads public and private environment documents
//! - **variables**: Resolves environments and expands `{{name}}` placeholders
//! - **store**: Global variables shared by response handlers during a run
//! - **runtime**: Collaborator traits and the sequential request runner
//! - **config**: User-configurable settings
//! - **models**: Core data structures for requests and responses
//!
//! # Pipeline
//!
//! ```
//! use restflow::environment::{parse_environment_document, EnvironmentFile};
//! use restflow::variables::{expand_request, resolve_with, NoSystemVariables, ResolveOptions};
//! use restflow::{parse_file, validate};
//! use std::path::Path;
//!
//! let text = "### Users\nGET {{baseUrl}}/users\nAccept: application/json\n";
//! let file = parse_file("users.http", text).unwrap();
//! assert!(validate(&file, false, Path::new(".")).is_empty());
//!
//! let public = parse_environment_document(
//!     r#"{ "dev": { "host": "localhost", "baseUrl": "http://{{host}}:3000" } }"#,
//!     Path::new("http-client.env.json"),
//! )
//! .unwrap();
//! let resolved = resolve_with(
//!     &public,
//!     &EnvironmentFile::new(),
//!     "dev",
//!     &ResolveOptions::default(),
//!     &NoSystemVariables,
//! )
//! .unwrap();
//!
//! let request = expand_request(&file.requests[0], &resolved);
//! assert_eq!(request.url, "http://localhost:3000/users");
//! ```

pub mod config;
pub mod environment;
pub mod models;
pub mod parser;
pub mod runtime;
pub mod store;
pub mod validator;
pub mod variables;

pub use environment::{load_environments, EnvironmentFile, LoaderConfig};
pub use models::{Request, RequestsFile};
pub use parser::error::{LexError, ParseError};
pub use parser::parse_file;
pub use store::GlobalStore;
pub use validator::{validate, ValidationError};
pub use variables::{expand_string, resolve, ResolveError, ResolvedEnvironment};
