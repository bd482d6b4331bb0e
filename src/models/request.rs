//! HTTP request data models.
//!
//! This module defines the structured form of a request file: the request
//! method, URL, headers, body variants, response handlers and response
//! references, plus the ordered [`RequestsFile`] container.

use crate::variables::substitution::extract_variables;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// HTTP request method.
///
/// Represents all standard HTTP methods as defined in RFC 7231 and RFC 5789.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// HTTP GET method - retrieve a resource
    GET,
    /// HTTP POST method - submit data to create a resource
    POST,
    /// HTTP PUT method - replace a resource
    PUT,
    /// HTTP DELETE method - remove a resource
    DELETE,
    /// HTTP PATCH method - partially modify a resource
    PATCH,
    /// HTTP OPTIONS method - describe communication options
    OPTIONS,
    /// HTTP HEAD method - retrieve headers only
    HEAD,
    /// HTTP TRACE method - perform a message loop-back test
    TRACE,
    /// HTTP CONNECT method - establish a tunnel to the server
    CONNECT,
}

impl HttpMethod {
    /// All recognized methods, in the order they are listed in error messages.
    pub const ALL: [HttpMethod; 9] = [
        HttpMethod::GET,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::DELETE,
        HttpMethod::PATCH,
        HttpMethod::OPTIONS,
        HttpMethod::HEAD,
        HttpMethod::TRACE,
        HttpMethod::CONNECT,
    ];

    /// Returns the string representation of the HTTP method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::TRACE => "TRACE",
            HttpMethod::CONNECT => "CONNECT",
        }
    }

    /// Parses a method name, ignoring ASCII case.
    ///
    /// Returns `None` when the name is not one of the nine recognized verbs.
    pub fn parse(s: &str) -> Option<Self> {
        HttpMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
    }

    /// Methods whose requests are not expected to carry a body.
    pub fn discourages_body(&self) -> bool {
        matches!(self, HttpMethod::GET | HttpMethod::HEAD | HttpMethod::DELETE)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Components of a URL, derived on first access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UrlParts {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    query: IndexMap<String, String>,
    fragment: Option<String>,
}

/// Target URL of a request, kept verbatim as written in the file.
///
/// The raw text may contain `{{name}}` placeholders. Components and the
/// variable list are computed lazily and cached, so a `Url` can be shared
/// between threads without further synchronization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Url {
    raw: String,
    parts: OnceCell<UrlParts>,
    variables: OnceCell<Vec<String>>,
}

impl Url {
    /// Creates a URL from its raw text.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parts: OnceCell::new(),
            variables: OnceCell::new(),
        }
    }

    /// The URL exactly as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the URL still contains `{{...}}` placeholders.
    pub fn is_template(&self) -> bool {
        self.raw.contains("{{")
    }

    /// Distinct variable names referenced by the URL, in order of first occurrence.
    pub fn variables(&self) -> &[String] {
        self.variables.get_or_init(|| extract_variables(&self.raw))
    }

    pub fn scheme(&self) -> Option<&str> {
        self.parts().scheme.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.parts().host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.parts().port
    }

    pub fn path(&self) -> Option<&str> {
        self.parts().path.as_deref()
    }

    /// Decoded query parameters in order of appearance.
    ///
    /// A repeated key keeps its last value.
    pub fn query(&self) -> &IndexMap<String, String> {
        &self.parts().query
    }

    pub fn fragment(&self) -> Option<&str> {
        self.parts().fragment.as_deref()
    }

    fn parts(&self) -> &UrlParts {
        self.parts.get_or_init(|| parse_url_parts(&self.raw))
    }
}

impl PartialEq for Url {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Url {}

impl From<String> for Url {
    fn from(raw: String) -> Self {
        Url::new(raw)
    }
}

impl From<Url> for String {
    fn from(url: Url) -> Self {
        url.raw
    }
}

impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_url_parts(raw: &str) -> UrlParts {
    if !raw.contains("{{") {
        if let Ok(parsed) = url::Url::parse(raw) {
            if parsed.has_host() {
                return UrlParts {
                    scheme: Some(parsed.scheme().to_string()),
                    host: parsed.host_str().map(str::to_string),
                    port: parsed.port(),
                    path: Some(parsed.path().to_string()),
                    query: parsed.query_pairs().into_owned().collect(),
                    fragment: parsed.fragment().map(str::to_string),
                };
            }
        }
    }

    // Origin-form, asterisk-form and template URLs are split by hand.
    let (rest, fragment) = match raw.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment.to_string())),
        None => (raw, None),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((rest, query)) => (
            rest,
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (rest, IndexMap::new()),
    };

    let mut parts = UrlParts {
        query,
        fragment,
        ..UrlParts::default()
    };

    let path = match rest.split_once("://") {
        Some((scheme, after)) => {
            parts.scheme = Some(scheme.to_string());
            let (authority, path) = match after.find('/') {
                Some(idx) => (&after[..idx], &after[idx..]),
                None => (after, ""),
            };
            match authority.rsplit_once(':') {
                Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                    parts.host = Some(host.to_string());
                    parts.port = port.parse().ok();
                }
                _ => parts.host = Some(authority.to_string()),
            }
            path
        }
        None => rest,
    };

    if !path.is_empty() {
        parts.path = Some(path.to_string());
    }
    parts
}

/// A single request header.
///
/// The value is stored verbatim, including interior whitespace and any
/// `{{name}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    name: String,
    value: String,
    #[serde(skip)]
    variables: OnceCell<Vec<String>>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            variables: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Distinct variable names referenced by the value, in order of first occurrence.
    pub fn variables(&self) -> &[String] {
        self.variables.get_or_init(|| extract_variables(&self.value))
    }

    /// Case-insensitive header name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for Header {}

/// Content type of an inline body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    Xml,
    PlainText,
    /// Any other explicit media type, kept as written.
    Other(String),
}

impl ContentType {
    /// Infers the content type from the first non-whitespace character.
    pub fn infer(content: &str) -> Self {
        match content.trim_start().chars().next() {
            Some('{') | Some('[') => ContentType::Json,
            Some('<') => ContentType::Xml,
            _ => ContentType::PlainText,
        }
    }

    /// Maps an explicit `Content-Type` header value.
    pub fn from_header(value: &str) -> Self {
        let media = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if media == "application/json" || media.ends_with("+json") {
            ContentType::Json
        } else if media == "application/xml" || media == "text/xml" || media.ends_with("+xml") {
            ContentType::Xml
        } else if media == "text/plain" {
            ContentType::PlainText
        } else {
            ContentType::Other(value.trim().to_string())
        }
    }

    /// Media type string for this content type.
    pub fn mime(&self) -> &str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::PlainText => "text/plain",
            ContentType::Other(value) => value,
        }
    }
}

/// One named part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartField {
    /// Taken from the `name="..."` parameter of `Content-Disposition`.
    pub name: Option<String>,
    pub headers: Vec<Header>,
    pub content: Option<String>,
    pub file_path: Option<String>,
    /// Boundary text following the `--` marker.
    pub boundary: String,
}

impl MultipartField {
    /// Looks up a field header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequestBody {
    /// Body text written directly in the request file.
    Inline {
        content: String,
        content_type: ContentType,
    },
    /// `< path` whole-body file reference.
    File { path: String },
    /// `--boundary` delimited parts.
    Multipart { fields: Vec<MultipartField> },
}

impl RequestBody {
    /// Whether the body carries anything at all.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Inline { content, .. } => content.trim().is_empty(),
            RequestBody::File { path } => path.trim().is_empty(),
            RequestBody::Multipart { fields } => fields.is_empty(),
        }
    }

    /// Distinct variable names referenced anywhere in the body.
    pub fn variables(&self) -> Vec<String> {
        match self {
            RequestBody::Inline { content, .. } => extract_variables(content),
            RequestBody::File { path } => extract_variables(path),
            RequestBody::Multipart { fields } => {
                let mut names = Vec::new();
                for field in fields {
                    let texts = field
                        .headers
                        .iter()
                        .map(|h| h.value())
                        .chain(field.content.as_deref())
                        .chain(field.file_path.as_deref());
                    for text in texts {
                        push_distinct(&mut names, extract_variables(text));
                    }
                }
                names
            }
        }
    }
}

/// Script run after the response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResponseHandler {
    /// `> {% ... %}` script embedded in the request file.
    Inline { script: String },
    /// `> path` script stored in its own file.
    File { path: String },
}

/// `<> path` link to a previously saved response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRef {
    pub path: String,
}

/// Represents one request parsed from a request file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Name from a `###` separator or a preceding comment.
    pub name: Option<String>,

    /// Upper-cased method text. Unrecognized methods survive parsing and are
    /// reported by the validator.
    pub method: String,

    pub url: Url,

    /// Optional HTTP version, e.g. "HTTP/1.1".
    pub http_version: Option<String>,

    /// Headers in file order. Duplicates are kept.
    pub headers: Vec<Header>,

    pub body: Option<RequestBody>,

    pub response_handler: Option<ResponseHandler>,

    pub response_ref: Option<ResponseRef>,

    /// Line number (1-based) of the request line.
    pub line_number: usize,
}

impl Request {
    /// Creates a request with no headers, body or handler.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: None,
            method: method.into().to_ascii_uppercase(),
            url: Url::new(url),
            http_version: None,
            headers: Vec::new(),
            body: None,
            response_handler: None,
            response_ref: None,
            line_number: 0,
        }
    }

    /// The method as a recognized verb, if it is one.
    pub fn http_method(&self) -> Option<HttpMethod> {
        HttpMethod::parse(&self.method)
    }

    /// First header with the given name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// Gets the Content-Type header value if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type").map(|h| h.value())
    }

    /// Checks if the request has a non-empty body.
    pub fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Label used in logs and messages: the name, or `METHOD url`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.method, self.url),
        }
    }

    /// Distinct variables referenced by the URL, headers and body.
    pub fn variables(&self) -> Vec<String> {
        let mut names = self.url.variables().to_vec();
        for header in &self.headers {
            push_distinct(&mut names, header.variables().iter().cloned());
        }
        if let Some(body) = &self.body {
            push_distinct(&mut names, body.variables());
        }
        names
    }
}

fn push_distinct(into: &mut Vec<String>, names: impl IntoIterator<Item = String>) {
    for name in names {
        if !into.contains(&name) {
            into.push(name);
        }
    }
}

/// Ordered requests of one file. Order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestsFile {
    /// File name the requests were parsed from.
    pub name: String,
    pub requests: Vec<Request>,
}

impl RequestsFile {
    pub fn new(name: impl Into<String>, requests: Vec<Request>) -> Self {
        Self {
            name: name.into(),
            requests,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Request> {
        self.requests.iter()
    }

    /// Finds a request by exact name.
    pub fn find(&self, name: &str) -> Option<&Request> {
        self.requests
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
    }
}

impl<'a> IntoIterator for &'a RequestsFile {
    type Item = &'a Request;
    type IntoIter = std::slice::Iter<'a, Request>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.iter()
    }
}
