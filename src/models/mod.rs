//! Data models for request files and responses.
//!
//! This module contains the structured request model produced by the parser
//! and the response models exchanged with transport and storage collaborators.

pub mod request;
pub mod response;

pub use request::{
    ContentType, Header, HttpMethod, MultipartField, Request, RequestBody, RequestsFile,
    ResponseHandler, ResponseRef, Url,
};
pub use response::{HttpResponse, StoredResponse};
