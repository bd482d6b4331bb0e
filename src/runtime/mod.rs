//! Sequential execution of request files.
//!
//! The library does not send HTTP requests or run scripts itself. Callers
//! plug in a [`Transport`], and optionally a [`ScriptEngine`] and a
//! [`ResponseStorage`], and the [`Runner`] drives them through a file one
//! request at a time:
//!
//! 1. layer the global store over the resolved environment
//! 2. expand the request
//! 3. execute it through the transport
//! 4. save the response when storage is configured
//! 5. run the response handler and write its globals back to the store
//!
//! A transport or storage failure stops the run. A handler failure is
//! recorded in that request's outcome and the run continues.

pub mod error;
pub mod storage;

pub use error::{RunError, StorageError, TransportError};
pub use storage::DirectoryStorage;

use crate::environment::EnvironmentFile;
use crate::models::{HttpResponse, Request, RequestsFile, ResponseHandler, StoredResponse};
use crate::parser::parse_file;
use crate::store::GlobalStore;
use crate::variables::{
    expand_request, expand_string, merge, resolve_with, ExpandedRequest, ProcessEnv,
    ResolveOptions, ResolvedEnvironment,
};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Sends expanded requests.
pub trait Transport {
    fn execute(&self, request: &ExpandedRequest) -> Result<HttpResponse, TransportError>;
}

/// Runs response handler scripts.
///
/// Script failures are reported through [`HandlerOutcome::error`], not as a
/// `Result`, so that tests and logs gathered before the failure survive.
pub trait ScriptEngine {
    fn run_handler(&self, script: &str, context: &HandlerContext<'_>) -> HandlerOutcome;
}

/// Persists responses so `<> path` links can refer to them later.
pub trait ResponseStorage {
    /// Saves a response and returns where it was written.
    fn save(&self, response: &StoredResponse) -> Result<PathBuf, StorageError>;

    fn load(&self, path: &Path) -> Result<StoredResponse, StorageError>;
}

/// Everything a handler script can see.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub request: &'a ExpandedRequest,
    pub response: &'a HttpResponse,
    /// Environment the request was expanded with, globals included.
    pub environment: &'a ResolvedEnvironment,
    pub globals: &'a GlobalStore,
}

/// Result of one named test or assertion inside a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// What a handler produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutcome {
    pub tests: Vec<TestResult>,
    pub assertions: Vec<TestResult>,
    pub logs: Vec<String>,
    /// Globals to publish for later requests.
    pub globals: IndexMap<String, Value>,
    pub error: Option<String>,
}

impl HandlerOutcome {
    /// An outcome carrying only an error.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// No error and every test and assertion passed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self.tests.iter().all(|t| t.passed)
            && self.assertions.iter().all(|a| a.passed)
    }
}

/// Result of running one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub index: usize,
    pub label: String,
    pub request: ExpandedRequest,
    pub response: HttpResponse,
    /// Where the response was saved, when storage is configured.
    pub saved_to: Option<PathBuf>,
    /// Present when the request has a handler and a script engine ran it.
    pub handler: Option<HandlerOutcome>,
}

/// Outcomes of a run, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub outcomes: Vec<RequestOutcome>,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether every handler that ran succeeded.
    pub fn handlers_succeeded(&self) -> bool {
        self.outcomes
            .iter()
            .filter_map(|o| o.handler.as_ref())
            .all(HandlerOutcome::is_success)
    }

    /// Handler errors as `(request index, message)` pairs.
    pub fn handler_errors(&self) -> Vec<(usize, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.handler
                    .as_ref()
                    .and_then(|h| h.error.as_deref())
                    .map(|e| (o.index, e))
            })
            .collect()
    }
}

/// Executes the requests of a file in order.
///
/// # Examples
///
/// ```
/// use restflow::models::HttpResponse;
/// use restflow::parser::parse_file;
/// use restflow::runtime::{Runner, Transport, TransportError};
/// use restflow::variables::{ExpandedRequest, ResolvedEnvironment};
///
/// struct Echo;
///
/// impl Transport for Echo {
///     fn execute(&self, request: &ExpandedRequest) -> Result<HttpResponse, TransportError> {
///         Ok(HttpResponse::new(200).with_body(request.url.clone()))
///     }
/// }
///
/// let file = parse_file("api.http", "GET https://api.example.com/health").unwrap();
/// let report = Runner::new(&Echo)
///     .run(&file, &ResolvedEnvironment::new("dev"))
///     .unwrap();
/// assert_eq!(report.outcomes[0].response.body_text(), "https://api.example.com/health");
/// ```
pub struct Runner<'a> {
    transport: &'a dyn Transport,
    scripts: Option<&'a dyn ScriptEngine>,
    storage: Option<&'a dyn ResponseStorage>,
    globals: GlobalStore,
    base_dir: PathBuf,
    options: ResolveOptions,
}

impl<'a> Runner<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            scripts: None,
            storage: None,
            globals: GlobalStore::new(),
            base_dir: PathBuf::from("."),
            options: ResolveOptions::default(),
        }
    }

    pub fn with_script_engine(mut self, engine: &'a dyn ScriptEngine) -> Self {
        self.scripts = Some(engine);
        self
    }

    pub fn with_storage(mut self, storage: &'a dyn ResponseStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Uses an existing store, e.g. to carry globals across files.
    pub fn with_globals(mut self, globals: GlobalStore) -> Self {
        self.globals = globals;
        self
    }

    /// Directory of the request file. Handler script paths resolve
    /// against it.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Options for [`Runner::run_in_environment`].
    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn globals(&self) -> &GlobalStore {
        &self.globals
    }

    /// Parses `text` and runs it.
    pub fn run_text(
        &self,
        name: &str,
        text: &str,
        environment: &ResolvedEnvironment,
    ) -> Result<RunReport, RunError> {
        let file = parse_file(name, text)?;
        self.run(&file, environment)
    }

    /// Resolves `env_name` from the given documents and runs `file` in it.
    pub fn run_in_environment(
        &self,
        file: &RequestsFile,
        public: &EnvironmentFile,
        private: &EnvironmentFile,
        env_name: &str,
    ) -> Result<RunReport, RunError> {
        let environment = resolve_with(public, private, env_name, &self.options, &ProcessEnv)?;
        self.run(file, &environment)
    }

    /// Runs every request of `file` in order.
    pub fn run(
        &self,
        file: &RequestsFile,
        environment: &ResolvedEnvironment,
    ) -> Result<RunReport, RunError> {
        debug!("running {} requests from {}", file.len(), file.name);
        let mut report = RunReport::default();
        for (index, request) in file.requests.iter().enumerate() {
            report
                .outcomes
                .push(self.run_request(index, request, environment)?);
        }
        Ok(report)
    }

    /// Runs a single request. `index` is only used for reporting.
    pub fn run_request(
        &self,
        index: usize,
        request: &Request,
        environment: &ResolvedEnvironment,
    ) -> Result<RequestOutcome, RunError> {
        let label = request.label();
        debug!("request {} ({}): starting", index, label);

        let globals = self.globals.as_environment();
        let layered = merge(&[environment, &globals]);
        let expanded = expand_request(request, &layered);

        let unresolved = expanded.unresolved();
        if !unresolved.is_empty() {
            debug!(
                "request {} ({}): unresolved variables {}",
                index,
                label,
                unresolved.join(", ")
            );
        }

        let response = self
            .transport
            .execute(&expanded)
            .map_err(|source| RunError::Transport {
                index,
                label: label.clone(),
                source,
            })?;

        let saved_to = match self.storage {
            Some(storage) => {
                let stored = StoredResponse::capture(
                    expanded.name.clone(),
                    expanded.method.clone(),
                    expanded.url.clone(),
                    &response,
                );
                Some(storage.save(&stored)?)
            }
            None => None,
        };

        let handler = self.run_handler(&label, request, &expanded, &response, &layered);

        debug!(
            "request {} ({}): finished with status {}",
            index, label, response.status_code
        );

        Ok(RequestOutcome {
            index,
            label,
            request: expanded,
            response,
            saved_to,
            handler,
        })
    }

    fn run_handler(
        &self,
        label: &str,
        request: &Request,
        expanded: &ExpandedRequest,
        response: &HttpResponse,
        environment: &ResolvedEnvironment,
    ) -> Option<HandlerOutcome> {
        let handler = request.response_handler.as_ref()?;
        let Some(engine) = self.scripts else {
            debug!("{}: no script engine, skipping response handler", label);
            return None;
        };

        let script = match handler {
            ResponseHandler::Inline { script } => script.clone(),
            ResponseHandler::File { path } => {
                let path = self.base_dir.join(expand_string(path, environment));
                match fs::read_to_string(&path) {
                    Ok(script) => script,
                    Err(e) => {
                        let message =
                            format!("Failed to read handler script {}: {}", path.display(), e);
                        warn!("{}: {}", label, message);
                        return Some(HandlerOutcome::failed(message));
                    }
                }
            }
        };

        let context = HandlerContext {
            request: expanded,
            response,
            environment,
            globals: &self.globals,
        };
        let outcome = engine.run_handler(&script, &context);

        self.globals.extend(outcome.globals.clone());
        if let Some(error) = &outcome.error {
            warn!("{}: response handler failed: {}", label, error);
        }

        Some(outcome)
    }
}
