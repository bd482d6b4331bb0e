//! `{{name}}` placeholder handling.
//!
//! This module finds placeholder references in text and replaces them with
//! values from an already-resolved environment. Substitution here is one-shot:
//! a substituted value is never scanned again, and references that the
//! environment does not define are left in place.

use super::resolver::ResolvedEnvironment;
use crate::models::{Header, MultipartField, Request, RequestBody};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cached regex pattern for matching {{variableName}} with optional whitespace.
pub(crate) static VARIABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("Failed to compile variable regex"));

/// A value that is exactly one reference and nothing else.
static SINGLE_REFERENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{([^}]+)\}\}$").expect("Failed to compile reference regex"));

/// Distinct variable names referenced in `text`, in order of first
/// occurrence. Surrounding whitespace inside the braces is ignored.
///
/// # Examples
///
/// ```
/// use restflow::variables::extract_variables;
///
/// let names = extract_variables("{{baseUrl}}/users/{{ id }}?again={{baseUrl}}");
/// assert_eq!(names, vec!["baseUrl", "id"]);
/// ```
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in VARIABLE_REGEX.captures_iter(text) {
        let name = caps[1].trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// If `text` is a single `{{name}}` reference, returns the trimmed name.
pub fn single_reference(text: &str) -> Option<&str> {
    SINGLE_REFERENCE_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
}

/// Textual form of a scalar value as it appears after substitution.
///
/// Strings are inserted without quotes and `null` becomes the empty string.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replaces every `{{name}}` in `text` that `resolved` defines.
///
/// Unknown references are left verbatim, and inserted values are not
/// scanned again.
///
/// # Examples
///
/// ```
/// use restflow::variables::{expand_string, ResolvedEnvironment, VariableSource};
/// use serde_json::json;
///
/// let mut env = ResolvedEnvironment::new("dev");
/// env.insert("host", json!("api.example.com"), VariableSource::Public);
/// env.insert("port", json!(8080), VariableSource::Public);
///
/// assert_eq!(
///     expand_string("https://{{host}}:{{port}}/{{missing}}", &env),
///     "https://api.example.com:8080/{{missing}}"
/// );
/// ```
pub fn expand_string(text: &str, resolved: &ResolvedEnvironment) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    VARIABLE_REGEX
        .replace_all(text, |caps: &regex::Captures| {
            let name = caps[1].trim();
            match resolved.get(name) {
                Some(value) => value_to_text(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// A request with every placeholder expanded, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRequest {
    pub name: Option<String>,
    pub method: String,
    pub url: String,
    pub http_version: Option<String>,
    pub headers: Vec<Header>,
    pub body: Option<RequestBody>,
}

impl ExpandedRequest {
    /// First header with the given name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// Placeholders that survived expansion.
    pub fn unresolved(&self) -> Vec<String> {
        let mut names = extract_variables(&self.url);
        for header in &self.headers {
            for name in header.variables() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        if let Some(body) = &self.body {
            for name in body.variables() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Expands the URL, header values and body of `request`.
///
/// Header names, the method and the response handler are not expanded.
/// File references are expanded as paths but not read.
pub fn expand_request(request: &Request, resolved: &ResolvedEnvironment) -> ExpandedRequest {
    let headers = expand_headers(&request.headers, resolved);

    let body = request.body.as_ref().map(|body| match body {
        RequestBody::Inline {
            content,
            content_type,
        } => RequestBody::Inline {
            content: expand_string(content, resolved),
            content_type: content_type.clone(),
        },
        RequestBody::File { path } => RequestBody::File {
            path: expand_string(path, resolved),
        },
        RequestBody::Multipart { fields } => RequestBody::Multipart {
            fields: fields
                .iter()
                .map(|field| MultipartField {
                    name: field.name.clone(),
                    headers: expand_headers(&field.headers, resolved),
                    content: field.content.as_deref().map(|c| expand_string(c, resolved)),
                    file_path: field.file_path.as_deref().map(|p| expand_string(p, resolved)),
                    boundary: field.boundary.clone(),
                })
                .collect(),
        },
    });

    ExpandedRequest {
        name: request.name.clone(),
        method: request.method.clone(),
        url: expand_string(request.url.raw(), resolved),
        http_version: request.http_version.clone(),
        headers,
        body,
    }
}

fn expand_headers(headers: &[Header], resolved: &ResolvedEnvironment) -> Vec<Header> {
    headers
        .iter()
        .map(|h| Header::new(h.name(), expand_string(h.value(), resolved)))
        .collect()
}
