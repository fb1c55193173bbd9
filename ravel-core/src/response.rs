//! Incoming HTTP response and change-vector helpers.

use std::fmt;

use http::header::{CONTENT_LENGTH, ETAG};
use http::{HeaderMap, StatusCode};

use crate::body::BodyStream;

/// A response returned by the transport: status line, headers and a body stream.
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body chunks. Not yet consumed.
    pub body: BodyStream,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// The change vector announced in the `ETag` header, unquoted.
    pub fn change_vector(&self) -> Option<String> {
        self.headers
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_change_vector)
    }

    /// The declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Splits the response into its head and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, BodyStream) {
        (self.status, self.headers, self.body)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &"...")
            .finish()
    }
}

/// Extracts a change vector from an `ETag` value.
///
/// Surrounding quotes and whitespace are removed; an empty value means the
/// server did not version the resource.
///
/// ```
/// use ravel_core::parse_change_vector;
///
/// assert_eq!(parse_change_vector("\"A:1-abc\"").as_deref(), Some("A:1-abc"));
/// assert_eq!(parse_change_vector("A:2-def").as_deref(), Some("A:2-def"));
/// assert_eq!(parse_change_vector("\"\""), None);
/// ```
pub fn parse_change_vector(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_owned())
    }
}
