//! HTTP response data models.
//!
//! Responses are produced by a [`Transport`](crate::runtime::Transport)
//! implementation and consumed by response handlers and response storage.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Represents an HTTP response received from a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 404, 500).
    pub status_code: u16,

    /// Response headers in the order the server sent them.
    pub headers: IndexMap<String, String>,

    /// Response body as raw bytes.
    ///
    /// Binary responses (images, PDFs) are kept as-is; use
    /// [`HttpResponse::body_text`] for textual content.
    pub body: Vec<u8>,

    /// Total request duration from start to completion.
    pub duration: Duration,
}

impl HttpResponse {
    /// Creates a new response with the given status code and no body.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: IndexMap::new(),
            body: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Builder-style helper to set a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builder-style helper to set a textual body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Checks if the response status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Looks up a header value, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response persisted for later reference by `<> path` links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResponse {
    /// Name of the request that produced the response, if it had one.
    pub request_name: Option<String>,
    pub method: String,
    /// Expanded URL the request was sent to.
    pub url: String,
    pub status_code: u16,
    pub headers: IndexMap<String, String>,
    pub body: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Captures a response together with the request that produced it.
    pub fn capture(
        request_name: Option<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        response: &HttpResponse,
    ) -> Self {
        Self {
            request_name,
            method: method.into(),
            url: url.into(),
            status_code: response.status_code,
            headers: response.headers.clone(),
            body: response.body_text(),
            saved_at: Utc::now(),
        }
    }
}
