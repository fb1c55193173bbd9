//! Multi-get batching.
//!
//! A [`BatchCommand`] sends N logical GET sub-requests in one POST to the
//! `multi_get` endpoint:
//!
//! ```json
//! {"Requests": [{"Url": "/docs", "Query": "?id=users/1", "Method": "GET", "Headers": {}, "Content": null}]}
//! ```
//!
//! and receives `{"Results": [{"StatusCode": 200, "Headers": {...}, "Result": {...}}]}`,
//! positionally aligned with the submitted requests. Every sub-request has its
//! own cache key, `"{method} {database_url}{url}{query}"`, so its change vector
//! travels inside the batch payload and a 304 sub-response is filled from that
//! sub-request's own cache entry.
//!
//! The outer POST itself is never cached. When an invocation runs without the
//! cache, no change vectors are sent and no sub-response is stored.

use std::collections::BTreeMap;

use async_trait::async_trait;
use http::header::ETAG;
use http::{Method, StatusCode};
use ravel_cache::{ReleaseHandle, ResponseCache};
use ravel_core::request::format_if_none_match;
use ravel_core::{
    AggressiveCacheOptions, BodyStream, CacheKey, Command, CommandError, HttpRequest,
    InvalidResponse, NotFoundPolicy, ResultSlot, ServerNode, parse_change_vector,
};
use ravel_pipeline::{Accumulate, PathFilter, PipelineBuilder, ResponsePipeline};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::executor::is_fresh;

/// One logical request inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the database URL, e.g. `/docs`.
    pub url: String,
    /// Query string including the leading `?`, or empty.
    pub query: String,
    /// Extra headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body. Sub-requests with a body are never cached.
    pub content: Option<Value>,
    /// Whether a fresh cached entry may answer without the network.
    pub can_cache_aggressively: bool,
}

impl SubRequest {
    /// A GET sub-request for `url` and `query`.
    pub fn get(url: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: query.into(),
            headers: BTreeMap::new(),
            content: None,
            can_cache_aggressively: true,
        }
    }

    /// A POST sub-request carrying `content`.
    pub fn post(url: impl Into<String>, query: impl Into<String>, content: Value) -> Self {
        Self {
            method: Method::POST,
            content: Some(content),
            ..Self::get(url, query)
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets whether a fresh cached entry may answer without the network.
    pub fn can_cache_aggressively(mut self, allowed: bool) -> Self {
        self.can_cache_aggressively = allowed;
        self
    }

    /// Whether the sub-response may be stored in the cache.
    pub fn is_cacheable(&self) -> bool {
        self.content.is_none()
    }

    /// Cache key of this sub-request on the database at `database_url`.
    pub fn cache_key(&self, database_url: &str) -> CacheKey {
        CacheKey::new(
            &self.method,
            &format!("{database_url}{}{}", self.url, self.query),
        )
    }
}

/// One result of a batch, aligned with its [`SubRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubResponse {
    /// Status of the sub-request. 304 when served from the cache.
    pub status: StatusCode,
    /// Headers of the sub-response.
    pub headers: BTreeMap<String, String>,
    /// Raw JSON body; `None` when there was none.
    pub result: Option<String>,
    /// Whether `result` was taken from the cache.
    pub from_cache: bool,
}

impl SubResponse {
    /// Parses [`result`](Self::result) as JSON.
    pub fn json(&self) -> Result<Option<Value>, serde_json::Error> {
        self.result.as_deref().map(serde_json::from_str).transpose()
    }

    fn cached(handle: &ReleaseHandle) -> Self {
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers: BTreeMap::new(),
            result: handle.payload().map(str::to_owned),
            from_cache: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireBatch<'a> {
    requests: Vec<WireRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireRequest<'a> {
    url: &'a str,
    query: &'a str,
    method: &'a str,
    headers: BTreeMap<&'a str, String>,
    content: Option<&'a Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResult {
    status_code: u16,
    #[serde(default)]
    headers: Value,
    #[serde(default)]
    result: Option<Value>,
}

/// Sub-response validated but not yet applied to the cache.
struct Parsed {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    result: Option<String>,
}

/// A batch of sub-requests sent as one `multi_get` call.
pub struct BatchCommand {
    cache: ResponseCache,
    requests: Vec<SubRequest>,
    keys: Vec<CacheKey>,
    handles: Vec<Option<ReleaseHandle>>,
    use_cache: bool,
    pipeline: ResponsePipeline<Accumulate>,
    result: ResultSlot<Vec<SubResponse>>,
}

impl BatchCommand {
    /// Creates a batch over `requests` backed by `cache`.
    pub fn new(cache: ResponseCache, requests: Vec<SubRequest>) -> Self {
        let pipeline = PipelineBuilder::new()
            .parse_json_incremental([PathFilter::pick("Results.[]")])
            .build();
        Self {
            cache,
            requests,
            keys: Vec::new(),
            handles: Vec::new(),
            use_cache: true,
            pipeline,
            result: ResultSlot::new(),
        }
    }

    /// The submitted sub-requests.
    pub fn requests(&self) -> &[SubRequest] {
        &self.requests
    }

    fn parse_result(&self, index: usize, value: Value) -> Result<Parsed, CommandError> {
        let wire: WireResult = serde_json::from_value(value)
            .map_err(|err| InvalidResponse::Body(Box::new(err)))?;
        let status = StatusCode::from_u16(wire.status_code).map_err(|_| {
            InvalidResponse::Malformed(format!(
                "sub-response {index} has invalid status {}",
                wire.status_code
            ))
        })?;

        let result = if status == StatusCode::NOT_MODIFIED {
            let handle = self.handles[index]
                .as_ref()
                .filter(|handle| !handle.is_empty() && !handle.is_not_found())
                .ok_or(InvalidResponse::UnexpectedNotModified)?;
            handle.payload().map(str::to_owned)
        } else {
            wire.result
                .filter(|value| !value.is_null())
                .map(|value| value.to_string())
        };

        Ok(Parsed {
            status,
            headers: string_headers(wire.headers),
            result,
        })
    }

    /// Applies a validated sub-response to the cache.
    fn apply(&self, index: usize, parsed: Parsed) -> SubResponse {
        let request = &self.requests[index];
        let key = &self.keys[index];

        if parsed.status == StatusCode::NOT_MODIFIED {
            if let Some(handle) = self.handles[index].as_ref() {
                handle.not_modified();
            }
            return SubResponse {
                status: parsed.status,
                headers: parsed.headers,
                result: parsed.result,
                from_cache: true,
            };
        }

        if self.use_cache && request.is_cacheable() {
            match parsed.result.as_deref() {
                None if parsed.status.is_success() || parsed.status == StatusCode::NOT_FOUND => {
                    self.cache.set_not_found(key, false);
                }
                Some(result) if parsed.status.is_success() => {
                    match etag(&parsed.headers).and_then(parse_change_vector) {
                        Some(change_vector) => self.cache.set(key, &change_vector, result),
                        None => debug!(%key, "sub-response carries no change vector"),
                    }
                }
                _ => {}
            }
        }

        SubResponse {
            status: parsed.status,
            headers: parsed.headers,
            result: parsed.result,
            from_cache: false,
        }
    }
}

impl std::fmt::Debug for BatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCommand")
            .field("requests", &self.requests)
            .field("keys", &self.keys)
            .finish()
    }
}

/// Keeps the headers whose value is a string.
fn string_headers(headers: Value) -> BTreeMap<String, String> {
    let Value::Object(headers) = headers else {
        return BTreeMap::new();
    };
    headers
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(value) => Some((name, value)),
            other => {
                debug!(%name, value = %other, "ignoring non-string sub-response header");
                None
            }
        })
        .collect()
}

fn etag(headers: &BTreeMap<String, String>) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(ETAG.as_str()))
        .map(|(_, value)| value.as_str())
}

#[async_trait]
impl Command for BatchCommand {
    type Output = Vec<SubResponse>;

    fn name(&self) -> &str {
        "multi_get"
    }

    fn create_request(&mut self, node: &ServerNode) -> Result<HttpRequest, CommandError> {
        self.result.reset();
        let database_url = node.database_url();
        self.keys = self
            .requests
            .iter()
            .map(|request| request.cache_key(&database_url))
            .collect();
        self.handles = self
            .requests
            .iter()
            .zip(&self.keys)
            .map(|(request, key)| {
                (self.use_cache && request.is_cacheable()).then(|| self.cache.get(key))
            })
            .collect();

        let requests = self
            .requests
            .iter()
            .zip(&self.handles)
            .map(|(request, handle)| {
                let mut headers: BTreeMap<&str, String> = request
                    .headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.clone()))
                    .collect();
                if let Some(change_vector) = handle
                    .as_ref()
                    .filter(|handle| !handle.is_not_found())
                    .and_then(ReleaseHandle::change_vector)
                {
                    headers.insert("If-None-Match", format_if_none_match(change_vector));
                }
                WireRequest {
                    url: &request.url,
                    query: &request.query,
                    method: request.method.as_str(),
                    headers,
                    content: request.content.as_ref(),
                }
            })
            .collect();

        HttpRequest::post(format!("{database_url}/multi_get")).with_json(&WireBatch { requests })
    }

    fn is_read_request(&self) -> bool {
        true
    }

    fn can_cache(&self) -> bool {
        false
    }

    fn can_cache_aggressively(&self) -> bool {
        self.requests
            .iter()
            .all(|request| request.can_cache_aggressively && request.is_cacheable())
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::Fail
    }

    fn use_cache(&mut self, enabled: bool) {
        self.use_cache = enabled;
    }

    fn serve_locally(&mut self, options: &AggressiveCacheOptions) -> Result<bool, CommandError> {
        let all_fresh = self
            .handles
            .iter()
            .all(|handle| handle.as_ref().is_some_and(|handle| is_fresh(handle, options)));
        if self.requests.is_empty() || !all_fresh {
            return Ok(false);
        }
        debug!(requests = self.requests.len(), "batch answered from cache");
        let responses = self.handles.iter().flatten().map(SubResponse::cached).collect();
        self.result.fill(Some(responses))?;
        Ok(true)
    }

    async fn set_response(
        &mut self,
        body: Option<BodyStream>,
        _from_cache: bool,
    ) -> Result<Option<String>, CommandError> {
        let Some(body) = body else {
            return Err(InvalidResponse::Malformed("multi-get response has no body".into()).into());
        };
        let collected = self.pipeline.process(body).await?;

        let expected = self.requests.len();
        let actual = collected.result.len();
        if expected != actual {
            warn!(expected, actual, "multi-get response is misaligned");
            return Err(InvalidResponse::Misaligned { expected, actual }.into());
        }

        let parsed = collected
            .result
            .into_iter()
            .enumerate()
            .map(|(index, value)| self.parse_result(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        let responses = parsed
            .into_iter()
            .enumerate()
            .map(|(index, parsed)| self.apply(index, parsed))
            .collect();
        self.result.fill(Some(responses))?;
        Ok(None)
    }

    fn result(&self) -> Option<&Self::Output> {
        self.result.get()
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        self.result.take()
    }
}
