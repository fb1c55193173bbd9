//! Transport seam.
//!
//! The executor hands a fully built [`HttpRequest`] to an [`HttpTransport`]
//! and gets back the status, headers and an unconsumed body stream. Node
//! selection, retries and authentication live behind this trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Sends requests to a server node.
///
/// # Examples
///
/// ```rust,ignore
/// use ravel_core::{HttpRequest, HttpResponse, HttpTransport, TransportError, body};
///
/// struct Offline;
///
/// #[async_trait::async_trait]
/// impl HttpTransport for Offline {
///     async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
///         Err(TransportError::aborted("offline"))
///     }
/// }
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request`, resolving once the response headers arrived.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T> HttpTransport for Arc<T>
where
    T: HttpTransport + ?Sized,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T> HttpTransport for Box<T>
where
    T: HttpTransport + ?Sized,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
