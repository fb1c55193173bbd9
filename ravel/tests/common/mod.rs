#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use http::header::{CONTENT_LENGTH, ETAG, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use ravel::JsonCommand;
use ravel_core::{
    CacheKey, HttpRequest, HttpResponse, HttpTransport, ServerNode, TransportError,
};
use ravel_pipeline::{PipelineBuilder, SingleValue};

pub const DATABASE_URL: &str = "http://node/databases/db";

pub fn node() -> ServerNode {
    ServerNode::new("http://node", "db")
}

pub fn document_key(id: &str) -> CacheKey {
    CacheKey::new(&Method::GET, &format!("{DATABASE_URL}/docs?id={id}"))
}

pub fn load_document(id: &str) -> JsonCommand<SingleValue> {
    let pipeline = PipelineBuilder::new().parse_json().collect_body().build();
    JsonCommand::get("get_document", format!("/docs?id={id}"), pipeline)
}

struct Scripted {
    status: StatusCode,
    headers: HeaderMap,
    /// `Err` fails the send; inner errors fail the body stream.
    body: Result<Vec<Result<Bytes, String>>, String>,
}

/// Answers requests from a queue of canned responses and records them.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, etag: Option<&str>, body: &str) {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            headers.insert(ETAG, HeaderValue::from_str(&format!("\"{etag}\"")).unwrap());
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.responses.lock().unwrap().push_back(Scripted {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Ok(vec![Ok(Bytes::copy_from_slice(body.as_bytes()))]),
        });
    }

    /// Sends `chunks` and then breaks the body stream with `error`.
    pub fn respond_then_fail(&self, status: u16, etag: Option<&str>, chunks: &[&str], error: &str) {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            headers.insert(ETAG, HeaderValue::from_str(&format!("\"{etag}\"")).unwrap());
        }
        let mut body: Vec<_> = chunks
            .iter()
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk.as_bytes())))
            .collect();
        body.push(Err(error.to_owned()));
        self.responses.lock().unwrap().push_back(Scripted {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Ok(body),
        });
    }

    pub fn fail_connection(&self) {
        self.responses.lock().unwrap().push_back(Scripted {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Err("connection refused".to_owned()),
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::aborted("no scripted response left"))?;
        let chunks = scripted.body.map_err(TransportError::aborted)?;
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| chunk.map_err(TransportError::aborted)),
        )
        .boxed();
        Ok(HttpResponse::new(scripted.status, scripted.headers, body))
    }
}
