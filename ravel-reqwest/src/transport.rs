//! reqwest implementation of [`HttpTransport`].

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use http_body_util::BodyExt;
use ravel_core::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use reqwest_middleware::ClientWithMiddleware;
use tracing::debug;

/// Sends ravel requests through a `reqwest` client.
///
/// Wraps a [`ClientWithMiddleware`]; a plain [`reqwest::Client`] converts
/// into one without middleware.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ClientWithMiddleware,
}

impl ReqwestTransport {
    /// Creates a transport over `client`.
    pub fn new(client: impl Into<ClientWithMiddleware>) -> Self {
        Self {
            client: client.into(),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &ClientWithMiddleware {
        &self.client
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self::new(client)
    }
}

impl From<ClientWithMiddleware> for ReqwestTransport {
    fn from(client: ClientWithMiddleware) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        debug!(%method, %url, "sending request");

        let mut builder = self.client.request(method, url.as_str()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(TransportError::connection)?;
        let response: http::Response<reqwest::Body> = response.into();
        let (parts, body) = response.into_parts();
        debug!(status = %parts.status, "response headers received");

        let body = body
            .into_data_stream()
            .map_err(|err| TransportError::aborted(err.to_string()))
            .boxed();
        Ok(HttpResponse::new(parts.status, parts.headers, body))
    }
}
