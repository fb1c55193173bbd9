//! Integration tests for ReqwestTransport using wiremock.

use std::time::Duration;

use http::Method;
use pretty_assertions::assert_eq;
use ravel::{CacheStatus, CommandExecutor, JsonCommand, RawCommand, VoidCommand};
use ravel_core::{Command, HttpRequest, HttpTransport, ServerNode, body};
use ravel_pipeline::{KeyCaseProfile, PipelineBuilder, SingleValue};
use ravel_reqwest::ReqwestTransport;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_document(id: &str) -> JsonCommand<SingleValue> {
    let pipeline = PipelineBuilder::new()
        .parse_json()
        .key_case(KeyCaseProfile::DocumentLoad)
        .collect_body()
        .build();
    JsonCommand::get("get_document", format!("/docs?id={id}"), pipeline)
}

/// Test 1: 200 then 304 over a real connection
#[tokio::test]
async fn test_conditional_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/databases/db/docs"))
        .and(header("If-None-Match", "\"A:1-abc\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/databases/db/docs"))
        .and(query_param("id", "dogs/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"A:1-abc\"")
                .set_body_json(json!({"Name": "Arava", "@metadata": {"@id": "dogs/1"}})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let executor = CommandExecutor::new(ReqwestTransport::default());
    let node = ServerNode::new(mock_server.uri(), "db");

    let mut first = load_document("dogs/1");
    let ctx = executor.execute(&node, &mut first).await.unwrap();
    assert_eq!(ctx.status, CacheStatus::Miss);

    let mut second = load_document("dogs/1");
    let ctx = executor.execute(&node, &mut second).await.unwrap();
    assert_eq!(ctx.status, CacheStatus::NotModified);

    let expected = json!({"name": "Arava", "@metadata": {"@id": "dogs/1"}});
    assert_eq!(first.take_result(), Some(Some(expected.clone())));
    assert_eq!(second.take_result(), Some(Some(expected)));
}

/// Test 2: method, headers and JSON body are forwarded
#[tokio::test]
async fn test_request_is_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/databases/db/docs"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"Name": "Oscar"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let executor = CommandExecutor::new(ReqwestTransport::default());
    let node = ServerNode::new(mock_server.uri(), "db");

    let mut command = VoidCommand::new("put_document", Method::PUT, "/docs?id=dogs/2")
        .with_body(json!({"Name": "Oscar"}));
    let ctx = executor.execute(&node, &mut command).await.unwrap();
    assert_eq!(ctx.http_status.map(|s| s.as_u16()), Some(201));
}

/// Test 3: the advisory timeout is enforced by the client
#[tokio::test]
async fn test_timeout_is_applied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::from(reqwest::Client::new());
    let request = HttpRequest::get(format!("{}/slow", mock_server.uri()))
        .with_timeout(Some(Duration::from_millis(50)));

    assert!(transport.send(request).await.is_err());
}

/// Test 4: raw bodies are streamed to the caller untouched
#[tokio::test]
async fn test_raw_body_is_streamed() {
    let mock_server = MockServer::start().await;
    let payload = "x".repeat(64 * 1024);

    Mock::given(method("GET"))
        .and(path("/databases/db/attachments"))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload.clone()))
        .mount(&mock_server)
        .await;

    let executor = CommandExecutor::new(ReqwestTransport::default());
    let node = ServerNode::new(mock_server.uri(), "db");

    let mut command = RawCommand::get("get_attachment", "/attachments?id=dogs/1&name=photo");
    executor.execute(&node, &mut command).await.unwrap();

    let response = command.take_result().unwrap();
    assert_eq!(response.content_length(), Some(payload.len() as u64));
    assert_eq!(body::drain(response.body).await.unwrap(), payload.len() as u64);
}

/// Test 5: server errors surface with their message
#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("database is offline"))
        .mount(&mock_server)
        .await;

    let executor = CommandExecutor::new(ReqwestTransport::default());
    let node = ServerNode::new(mock_server.uri(), "db");

    let error = executor
        .execute(&node, &mut load_document("dogs/1"))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("database is offline"));
}
