//! Ready-made commands for each response shape.
//!
//! - [`JsonCommand`] runs an `Object` body through a [`ResponsePipeline`]
//! - [`RawCommand`] hands the live response to the caller
//! - [`VoidCommand`] expects no body at all
//!
//! Request paths are appended to the node's database URL.

use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use ravel_core::{
    BodyStream, Command, CommandError, HttpRequest, HttpResponse, NotFoundPolicy, ResponseShape,
    ResultSlot, ServerNode,
};
use ravel_pipeline::{Reducer, ResponsePipeline};
use serde_json::Value;

/// Request settings shared by the commands in this module.
#[derive(Debug, Clone)]
struct Target {
    name: String,
    method: Method,
    path: String,
    body: Option<Value>,
    timeout: Option<Duration>,
}

impl Target {
    fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            body: None,
            timeout: None,
        }
    }

    fn request(&self, node: &ServerNode) -> Result<HttpRequest, CommandError> {
        let url = format!("{}{}", node.database_url(), self.path);
        let request = HttpRequest::new(self.method.clone(), url).with_timeout(self.timeout);
        match &self.body {
            Some(body) => request.with_json(body),
            None => Ok(request),
        }
    }
}

/// A command with a JSON response.
///
/// The result type is the output of the pipeline's reducer. To be cached, the
/// pipeline must collect the body
/// ([`PipelineBuilder::collect_body`](ravel_pipeline::PipelineBuilder::collect_body)).
///
/// ```
/// use ravel::JsonCommand;
/// use ravel_pipeline::{KeyCaseProfile, PipelineBuilder};
///
/// let pipeline = PipelineBuilder::new()
///     .parse_json()
///     .key_case(KeyCaseProfile::DocumentLoad)
///     .collect_body()
///     .build();
/// let command = JsonCommand::get("get_document", "/docs?id=users/1", pipeline);
/// ```
pub struct JsonCommand<R: Reducer> {
    target: Target,
    read: bool,
    can_cache: bool,
    can_cache_aggressively: bool,
    not_found: Option<NotFoundPolicy>,
    pipeline: ResponsePipeline<R>,
    result: ResultSlot<R::Output>,
}

impl<R: Reducer> JsonCommand<R> {
    /// A cacheable read.
    pub fn get(name: impl Into<String>, path: impl Into<String>, pipeline: ResponsePipeline<R>) -> Self {
        Self {
            target: Target::new(name, Method::GET, path),
            read: true,
            can_cache: true,
            can_cache_aggressively: true,
            not_found: None,
            pipeline,
            result: ResultSlot::new(),
        }
    }

    /// A mutation carrying a JSON body. Not cached.
    pub fn post(
        name: impl Into<String>,
        path: impl Into<String>,
        body: Value,
        pipeline: ResponsePipeline<R>,
    ) -> Self {
        let mut command = Self::get(name, path, pipeline);
        command.target.method = Method::POST;
        command.target.body = Some(body);
        command.read = false;
        command.can_cache = false;
        command.can_cache_aggressively = false;
        command
    }

    /// Marks the command as a read (e.g. a query sent with POST).
    pub fn read_request(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Sets whether responses may be cached.
    pub fn can_cache(mut self, allowed: bool) -> Self {
        self.can_cache = allowed;
        self
    }

    /// Sets whether cached responses may be served without a round trip.
    pub fn can_cache_aggressively(mut self, allowed: bool) -> Self {
        self.can_cache_aggressively = allowed;
        self
    }

    /// Overrides the 404 policy.
    pub fn not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = Some(policy);
        self
    }

    /// Sets the advisory timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.target.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<R: Reducer> Command for JsonCommand<R> {
    type Output = R::Output;

    fn name(&self) -> &str {
        &self.target.name
    }

    fn create_request(&mut self, node: &ServerNode) -> Result<HttpRequest, CommandError> {
        self.result.reset();
        self.target.request(node)
    }

    fn is_read_request(&self) -> bool {
        self.read
    }

    fn can_cache(&self) -> bool {
        self.can_cache
    }

    fn can_cache_aggressively(&self) -> bool {
        self.can_cache_aggressively
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        match self.not_found {
            Some(policy) => policy,
            None if self.read => NotFoundPolicy::CacheAbsent,
            None => NotFoundPolicy::Fail,
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.target.timeout
    }

    async fn set_response(
        &mut self,
        body: Option<BodyStream>,
        _from_cache: bool,
    ) -> Result<Option<String>, CommandError> {
        let Some(body) = body else {
            self.result.fill(None)?;
            return Ok(None);
        };
        let collected = self.pipeline.process(body).await?;
        self.result.fill(Some(collected.result))?;
        Ok(collected.body)
    }

    fn result(&self) -> Option<&Self::Output> {
        self.result.get()
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        self.result.take()
    }
}

/// A command whose response body is handed over untouched.
///
/// The result is the live [`HttpResponse`]; the caller owns its body stream
/// and must drain or drop it.
#[derive(Debug)]
pub struct RawCommand {
    target: Target,
    result: ResultSlot<HttpResponse>,
}

impl RawCommand {
    /// A GET whose body is streamed to the caller.
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            target: Target::new(name, Method::GET, path),
            result: ResultSlot::new(),
        }
    }
}

#[async_trait]
impl Command for RawCommand {
    type Output = HttpResponse;

    fn name(&self) -> &str {
        &self.target.name
    }

    fn create_request(&mut self, node: &ServerNode) -> Result<HttpRequest, CommandError> {
        self.result.reset();
        self.target.request(node)
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Raw
    }

    fn is_read_request(&self) -> bool {
        true
    }

    fn can_cache(&self) -> bool {
        false
    }

    fn can_cache_aggressively(&self) -> bool {
        false
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::Absent
    }

    async fn set_response(
        &mut self,
        _body: Option<BodyStream>,
        _from_cache: bool,
    ) -> Result<Option<String>, CommandError> {
        Err(CommandError::UnsupportedShape(ResponseShape::Object))
    }

    async fn set_response_raw(&mut self, response: HttpResponse) -> Result<(), CommandError> {
        self.result.fill(Some(response))
    }

    fn result(&self) -> Option<&Self::Output> {
        self.result.get()
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        self.result.take()
    }
}

/// A mutation without a response body, such as a delete.
#[derive(Debug)]
pub struct VoidCommand {
    target: Target,
}

impl VoidCommand {
    /// A command sending `method` to `path`.
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            target: Target::new(name, method, path),
        }
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.target.body = Some(body);
        self
    }
}

#[async_trait]
impl Command for VoidCommand {
    type Output = ();

    fn name(&self) -> &str {
        &self.target.name
    }

    fn create_request(&mut self, node: &ServerNode) -> Result<HttpRequest, CommandError> {
        self.target.request(node)
    }

    fn response_shape(&self) -> ResponseShape {
        ResponseShape::Empty
    }

    fn is_read_request(&self) -> bool {
        false
    }

    fn can_cache(&self) -> bool {
        false
    }

    async fn set_response(
        &mut self,
        _body: Option<BodyStream>,
        _from_cache: bool,
    ) -> Result<Option<String>, CommandError> {
        Ok(None)
    }

    fn result(&self) -> Option<&Self::Output> {
        None
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        None
    }
}
