//! Request validation.
//!
//! Walks parsed requests and reports every structural defect found. Checks
//! are independent of each other and never stop early, so a caller can show
//! all findings in one pass. Some checks only run in strict mode.

use crate::models::{HttpMethod, Request, RequestBody, RequestsFile, ResponseHandler};
use crate::parser::lexer::QuoteState;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

static HTTP_VERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^HTTP/\d+\.\d+$").expect("Invalid HTTP version regex"));

static HEADER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("Invalid header name regex"));

static VARIABLE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid variable name regex"));

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationErrorKind {
    InvalidMethod,
    EmptyUrl,
    InvalidUrl,
    /// Origin-form URL without a `Host` header (strict)
    MissingHost,
    InvalidHttpVersion,
    InvalidHeaderName,
    /// Same header name twice, ignoring case (strict)
    DuplicateHeader,
    EmptyMultipart,
    UnnamedMultipartField,
    /// Multipart body without a `Content-Type` header (strict)
    MissingContentType,
    /// Referenced body file does not exist (strict)
    FileNotFound,
    /// Referenced body file resolves outside the working directory (strict)
    FileOutsideWorkingDir,
    /// GET, HEAD or DELETE with a non-empty body (strict)
    BodyNotAllowed,
    EmptyHandlerScript,
    UnbalancedHandlerScript,
    EmptyHandlerPath,
    EmptyResponseRef,
    InvalidVariableName,
    DuplicateRequestName,
}

impl ValidationErrorKind {
    /// Machine-readable code, e.g. `invalid-method`.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationErrorKind::InvalidMethod => "invalid-method",
            ValidationErrorKind::EmptyUrl => "empty-url",
            ValidationErrorKind::InvalidUrl => "invalid-url",
            ValidationErrorKind::MissingHost => "missing-host",
            ValidationErrorKind::InvalidHttpVersion => "invalid-http-version",
            ValidationErrorKind::InvalidHeaderName => "invalid-header-name",
            ValidationErrorKind::DuplicateHeader => "duplicate-header",
            ValidationErrorKind::EmptyMultipart => "empty-multipart",
            ValidationErrorKind::UnnamedMultipartField => "unnamed-multipart-field",
            ValidationErrorKind::MissingContentType => "missing-content-type",
            ValidationErrorKind::FileNotFound => "file-not-found",
            ValidationErrorKind::FileOutsideWorkingDir => "file-outside-working-dir",
            ValidationErrorKind::BodyNotAllowed => "body-not-allowed",
            ValidationErrorKind::EmptyHandlerScript => "empty-handler-script",
            ValidationErrorKind::UnbalancedHandlerScript => "unbalanced-handler-script",
            ValidationErrorKind::EmptyHandlerPath => "empty-handler-path",
            ValidationErrorKind::EmptyResponseRef => "empty-response-ref",
            ValidationErrorKind::InvalidVariableName => "invalid-variable-name",
            ValidationErrorKind::DuplicateRequestName => "duplicate-request-name",
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// 1-based line of the request line.
    pub line: usize,
    /// Position of the request in the file.
    pub request_index: usize,
    pub request_name: Option<String>,
    pub message: String,
    /// Optional hint for fixing the issue
    pub suggestion: Option<String>,
}

impl ValidationError {
    fn new(
        kind: ValidationErrorKind,
        index: usize,
        request: &Request,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line: request.line_number,
            request_index: index,
            request_name: request.name.clone(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Sets a suggestion for fixing the issue
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} [{}]", self.line, self.message, self.code())?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

/// Validates every request in `file`.
///
/// # Arguments
///
/// * `file` - Parsed requests
/// * `strict` - Also run the strict checks
/// * `working_dir` - Directory that relative file references resolve against
///
/// # Returns
///
/// All findings, in request order. An empty list means the file is valid.
///
/// # Examples
///
/// ```
/// use restflow::parser::parse_file;
/// use restflow::validator::validate;
/// use std::path::Path;
///
/// let file = parse_file("api.http", "FETCH https://api.example.com").unwrap();
/// let errors = validate(&file, false, Path::new("."));
/// assert_eq!(errors[0].code(), "invalid-method");
/// ```
pub fn validate(file: &RequestsFile, strict: bool, working_dir: &Path) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen_names: HashSet<&str> = HashSet::new();

    for (index, request) in file.requests.iter().enumerate() {
        check_method(index, request, &mut errors);
        check_url(index, request, strict, &mut errors);
        check_http_version(index, request, &mut errors);
        check_headers(index, request, strict, &mut errors);
        check_body(index, request, strict, working_dir, &mut errors);
        check_handler(index, request, &mut errors);
        check_variables(index, request, &mut errors);

        if let Some(name) = request.name.as_deref() {
            if !seen_names.insert(name) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DuplicateRequestName,
                    index,
                    request,
                    format!("Request name '{}' is used more than once", name),
                ));
            }
        }
    }

    debug!(
        "validated {} requests in {}: {} findings",
        file.len(),
        file.name,
        errors.len()
    );
    errors
}

fn check_method(index: usize, request: &Request, errors: &mut Vec<ValidationError>) {
    if request.http_method().is_none() {
        let expected: Vec<&str> = HttpMethod::ALL.iter().map(|m| m.as_str()).collect();
        errors.push(
            ValidationError::new(
                ValidationErrorKind::InvalidMethod,
                index,
                request,
                format!("Invalid HTTP method '{}'", request.method),
            )
            .with_suggestion(format!("Expected one of: {}", expected.join(", "))),
        );
    }
}

fn check_url(index: usize, request: &Request, strict: bool, errors: &mut Vec<ValidationError>) {
    let raw = request.url.raw().trim();
    if raw.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyUrl,
            index,
            request,
            "Request URL is empty",
        ));
        return;
    }
    if request.url.is_template() || raw == "*" {
        return;
    }

    if raw.starts_with('/') {
        if strict && request.header("host").is_none() {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::MissingHost,
                    index,
                    request,
                    format!("Relative URL '{}' requires a Host header", raw),
                )
                .with_suggestion("Add a 'Host: example.com' header or use an absolute URL"),
            );
        }
        return;
    }

    let valid = match url::Url::parse(raw) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    };
    if !valid {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::InvalidUrl,
                index,
                request,
                format!("Invalid URL format '{}'", raw),
            )
            .with_suggestion("URL must start with http:// or https://, or with '/'"),
        );
    }
}

fn check_http_version(index: usize, request: &Request, errors: &mut Vec<ValidationError>) {
    if let Some(version) = &request.http_version {
        if !HTTP_VERSION_REGEX.is_match(version) {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::InvalidHttpVersion,
                    index,
                    request,
                    format!("Invalid HTTP version '{}'", version),
                )
                .with_suggestion("Use HTTP/1.1 or HTTP/2.0"),
            );
        }
    }
}

fn check_headers(
    index: usize,
    request: &Request,
    strict: bool,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen: HashSet<String> = HashSet::new();
    for header in &request.headers {
        if !HEADER_NAME_REGEX.is_match(header.name()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidHeaderName,
                index,
                request,
                format!(
                    "Invalid header name '{}'. Only letters, digits and '-' are allowed",
                    header.name()
                ),
            ));
        }
        if strict && !seen.insert(header.name().to_ascii_lowercase()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateHeader,
                index,
                request,
                format!("Duplicate header '{}'", header.name()),
            ));
        }
    }
}

fn check_body(
    index: usize,
    request: &Request,
    strict: bool,
    working_dir: &Path,
    errors: &mut Vec<ValidationError>,
) {
    let Some(body) = &request.body else {
        return;
    };

    if strict && request.has_body() {
        if let Some(method) = request.http_method().filter(|m| m.discourages_body()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::BodyNotAllowed,
                index,
                request,
                format!("{} requests should not carry a body", method),
            ));
        }
    }

    match body {
        RequestBody::Inline { .. } => {}
        RequestBody::File { path } => {
            if strict {
                check_file_reference(index, request, path, working_dir, errors);
            }
        }
        RequestBody::Multipart { fields } => {
            if fields.is_empty() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::EmptyMultipart,
                    index,
                    request,
                    "Multipart body has no fields",
                ));
            }
            for (position, field) in fields.iter().enumerate() {
                if field.name.as_deref().map_or(true, str::is_empty) {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::UnnamedMultipartField,
                            index,
                            request,
                            format!("Multipart field {} has no name", position + 1),
                        )
                        .with_suggestion(
                            "Add 'Content-Disposition: form-data; name=\"field\"' to the field",
                        ),
                    );
                }
                for header in &field.headers {
                    if !HEADER_NAME_REGEX.is_match(header.name()) {
                        errors.push(ValidationError::new(
                            ValidationErrorKind::InvalidHeaderName,
                            index,
                            request,
                            format!("Invalid multipart header name '{}'", header.name()),
                        ));
                    }
                }
                if strict {
                    if let Some(path) = &field.file_path {
                        check_file_reference(index, request, path, working_dir, errors);
                    }
                }
            }
            if strict && request.content_type().is_none() {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::MissingContentType,
                        index,
                        request,
                        "Multipart body without a Content-Type header",
                    )
                    .with_suggestion("Add 'Content-Type: multipart/form-data; boundary=...'"),
                );
            }
        }
    }
}

/// Checks that a referenced file exists inside `working_dir`.
///
/// Paths containing placeholders are skipped since they are only known after
/// expansion.
fn check_file_reference(
    index: usize,
    request: &Request,
    path: &str,
    working_dir: &Path,
    errors: &mut Vec<ValidationError>,
) {
    if path.contains("{{") {
        return;
    }

    let candidate = working_dir.join(path);
    let resolved = match candidate.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => {
            errors.push(ValidationError::new(
                ValidationErrorKind::FileNotFound,
                index,
                request,
                format!("Referenced file '{}' does not exist", path),
            ));
            return;
        }
    };

    let root = working_dir
        .canonicalize()
        .unwrap_or_else(|_| working_dir.to_path_buf());
    if !resolved.starts_with(&root) {
        errors.push(ValidationError::new(
            ValidationErrorKind::FileOutsideWorkingDir,
            index,
            request,
            format!(
                "Referenced file '{}' is outside the working directory",
                path
            ),
        ));
    }
}

fn check_handler(index: usize, request: &Request, errors: &mut Vec<ValidationError>) {
    match &request.response_handler {
        Some(ResponseHandler::Inline { script }) => {
            if script.trim().is_empty() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::EmptyHandlerScript,
                    index,
                    request,
                    "Response handler script is empty",
                ));
            } else if !is_balanced(script) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnbalancedHandlerScript,
                    index,
                    request,
                    "Response handler script has unbalanced brackets",
                ));
            }
        }
        Some(ResponseHandler::File { path }) if path.trim().is_empty() => {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyHandlerPath,
                index,
                request,
                "Response handler file path is empty",
            ));
        }
        _ => {}
    }

    if let Some(reference) = &request.response_ref {
        if reference.path.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyResponseRef,
                index,
                request,
                "Response reference path is empty",
            ));
        }
    }
}

/// Best-effort bracket matching for handler scripts. Brackets inside string
/// literals are ignored.
fn is_balanced(script: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut quotes = QuoteState::default();

    for c in script.chars() {
        if !quotes.is_code(c) {
            continue;
        }

        match c {
            '{' | '[' | '(' => stack.push(c),
            '}' | ']' | ')' => {
                let expected = match c {
                    '}' => '{',
                    ']' => '[',
                    _ => '(',
                };
                if stack.pop() != Some(expected) {
                    return false;
                }
            }
            _ => {}
        }
    }

    stack.is_empty()
}

fn check_variables(index: usize, request: &Request, errors: &mut Vec<ValidationError>) {
    for name in request.variables() {
        if !VARIABLE_NAME_REGEX.is_match(&name) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidVariableName,
                index,
                request,
                format!(
                    "Invalid variable name '{}'. Names start with a letter or '_' and contain letters, digits, '_' or '-'",
                    name
                ),
            ));
        }
    }
}
