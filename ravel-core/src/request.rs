//! Outgoing HTTP request descriptor.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, IF_NONE_MATCH};
use http::{HeaderMap, Method};
use serde::Serialize;

use crate::error::CommandError;

/// A request produced by a command for one server node.
///
/// The URL is fully resolved (base URL, database segment, path and query),
/// which is what the [`CacheKey`](crate::CacheKey) derivation relies on.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Resolved URL including the query string.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<Bytes>,
    /// Advisory timeout, applied by the transport.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Shorthand for a `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds (or replaces) a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets the content type.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, CommandError> {
        let body = serde_json::to_vec(value).map_err(|err| CommandError::Request(err.to_string()))?;
        self.body = Some(Bytes::from(body));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Sets the advisory timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches `If-None-Match: "<change-vector>"`.
    pub fn set_if_none_match(&mut self, change_vector: &str) -> Result<(), CommandError> {
        let value = HeaderValue::try_from(format_if_none_match(change_vector))
            .map_err(|err| CommandError::Request(err.to_string()))?;
        self.headers.insert(IF_NONE_MATCH, value);
        Ok(())
    }

    /// Returns `true` if a conditional header is attached.
    pub fn is_conditional(&self) -> bool {
        self.headers.contains_key(IF_NONE_MATCH)
    }
}

/// Formats a change vector as an `If-None-Match` value: `"<change-vector>"`.
pub fn format_if_none_match(change_vector: &str) -> String {
    format!("\"{change_vector}\"")
}
