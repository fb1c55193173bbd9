mod common;

use std::time::Duration;

use http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use ravel::{BatchCommand, CacheStatus, CommandExecutor, ExecuteOptions, SubRequest};
use ravel_core::{Command, CommandError, InvalidResponse};
use serde_json::{Value, json};

use common::{DATABASE_URL, ScriptedTransport, node};

fn dogs() -> Vec<SubRequest> {
    vec![
        SubRequest::get("/docs", "?id=dogs/1"),
        SubRequest::get("/docs", "?id=dogs/2"),
        SubRequest::get("/docs", "?id=dogs/3"),
    ]
}

fn sent_body(transport: &ScriptedTransport) -> Value {
    let request = transport.last_request();
    serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap()
}

#[tokio::test]
async fn test_results_align_with_sub_requests() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[
            {"StatusCode":200,"Headers":{"ETag":"\"A:1\""},"Result":{"Name":"Arava"}},
            {"StatusCode":304,"Headers":{},"Result":null},
            {"StatusCode":200,"Headers":{"etag":"\"C:3\""},"Result":{"Name":"Pluto"}}
        ]}"#,
    );
    let executor = CommandExecutor::new(transport.clone());
    let cache = executor.cache().clone();

    let requests = dogs();
    let keys: Vec<_> = requests.iter().map(|r| r.cache_key(DATABASE_URL)).collect();
    cache.set(&keys[1], "B:2", r#"{"Name":"Oscar"}"#);

    let mut batch = BatchCommand::new(cache.clone(), requests);
    let ctx = executor.execute(&node(), &mut batch).await.unwrap();
    assert_eq!(ctx.status, CacheStatus::Bypass);

    let request = transport.last_request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, format!("{DATABASE_URL}/multi_get"));
    let sent = sent_body(&transport);
    assert_eq!(sent["Requests"][0]["Headers"], json!({}));
    assert_eq!(sent["Requests"][1]["Headers"], json!({"If-None-Match": "\"B:2\""}));
    assert_eq!(sent["Requests"][1]["Url"], json!("/docs"));
    assert_eq!(sent["Requests"][1]["Query"], json!("?id=dogs/2"));
    assert_eq!(sent["Requests"][1]["Method"], json!("GET"));

    let results = batch.take_result().unwrap();
    let summary: Vec<_> = results
        .iter()
        .map(|r| (r.status.as_u16(), r.result.as_deref(), r.from_cache))
        .collect();
    assert_eq!(
        summary,
        vec![
            (200, Some(r#"{"Name":"Arava"}"#), false),
            (304, Some(r#"{"Name":"Oscar"}"#), true),
            (200, Some(r#"{"Name":"Pluto"}"#), false),
        ]
    );

    assert_eq!(cache.get(&keys[0]).change_vector(), Some("A:1"));
    assert_eq!(cache.get(&keys[1]).change_vector(), Some("B:2"));
    assert_eq!(cache.get(&keys[1]).payload(), Some(r#"{"Name":"Oscar"}"#));
    assert_eq!(cache.get(&keys[2]).change_vector(), Some("C:3"));
}

#[tokio::test]
async fn test_misaligned_response_is_fatal() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[{"StatusCode":200,"Headers":{"ETag":"\"A:1\""},"Result":{"Name":"Arava"}}]}"#,
    );
    let executor = CommandExecutor::new(transport);
    let cache = executor.cache().clone();

    let mut batch = BatchCommand::new(cache.clone(), dogs());
    let error = executor.execute(&node(), &mut batch).await.unwrap_err();

    assert!(matches!(
        error.source,
        CommandError::InvalidResponse(InvalidResponse::Misaligned {
            expected: 3,
            actual: 1
        })
    ));
    assert!(batch.result().is_none());
    assert_eq!(cache.entry_count(), 0);
}

#[tokio::test]
async fn test_unbacked_not_modified_writes_nothing() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[
            {"StatusCode":200,"Headers":{"ETag":"\"A:1\""},"Result":{"Name":"Arava"}},
            {"StatusCode":304,"Headers":{},"Result":null}
        ]}"#,
    );
    let executor = CommandExecutor::new(transport);
    let cache = executor.cache().clone();

    let requests = dogs().into_iter().take(2).collect();
    let mut batch = BatchCommand::new(cache.clone(), requests);
    let error = executor.execute(&node(), &mut batch).await.unwrap_err();

    assert!(matches!(
        error.source,
        CommandError::InvalidResponse(InvalidResponse::UnexpectedNotModified)
    ));
    assert_eq!(cache.entry_count(), 0);
}

#[tokio::test]
async fn test_missing_documents_are_negatively_cached() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[
            {"StatusCode":200,"Headers":{},"Result":null},
            {"StatusCode":404,"Headers":{}}
        ]}"#,
    );
    let executor = CommandExecutor::new(transport);
    let cache = executor.cache().clone();

    let requests: Vec<_> = dogs().into_iter().take(2).collect();
    let keys: Vec<_> = requests.iter().map(|r| r.cache_key(DATABASE_URL)).collect();
    let mut batch = BatchCommand::new(cache.clone(), requests);
    executor.execute(&node(), &mut batch).await.unwrap();

    let results = batch.take_result().unwrap();
    assert_eq!(results[0].result, None);
    assert_eq!(results[1].status, StatusCode::NOT_FOUND);
    assert!(cache.get(&keys[0]).is_not_found());
    assert!(cache.get(&keys[1]).is_not_found());
}

#[tokio::test]
async fn test_sub_requests_with_content_are_not_cached() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[{"StatusCode":200,"Headers":{"ETag":"\"Q:1\""},"Result":{"Results":[]}}]}"#,
    );
    let executor = CommandExecutor::new(transport.clone());
    let cache = executor.cache().clone();

    let query = SubRequest::post("/queries", "", json!({"Query": "from Dogs"}));
    let key = query.cache_key(DATABASE_URL);
    let mut batch = BatchCommand::new(cache.clone(), vec![query]);
    assert!(!batch.can_cache_aggressively());
    executor.execute(&node(), &mut batch).await.unwrap();

    assert_eq!(sent_body(&transport)["Requests"][0]["Content"], json!({"Query": "from Dogs"}));
    assert!(!cache.contains(&key));
    assert_eq!(
        batch.take_result().unwrap()[0].json().unwrap(),
        Some(json!({"Results": []}))
    );
}

#[tokio::test]
async fn test_fully_cached_batch_skips_the_network() {
    let transport = ScriptedTransport::new();
    let executor = CommandExecutor::new(transport.clone());
    let cache = executor.cache().clone();

    let requests: Vec<_> = dogs().into_iter().take(2).collect();
    for (index, request) in requests.iter().enumerate() {
        cache.set(
            &request.cache_key(DATABASE_URL),
            &format!("A:{index}"),
            &format!(r#"{{"Index":{index}}}"#),
        );
    }

    let aggressive = ExecuteOptions::default().aggressively_cache_for(Duration::from_secs(60));
    let mut batch = BatchCommand::new(cache.clone(), requests);
    let ctx = executor.execute_with(&node(), &mut batch, &aggressive).await.unwrap();

    assert_eq!(ctx.status, CacheStatus::AggressiveHit);
    assert_eq!(transport.sent(), 0);
    let results = batch.take_result().unwrap();
    assert!(results.iter().all(|r| r.status == StatusCode::NOT_MODIFIED && r.from_cache));
    assert_eq!(results[1].result.as_deref(), Some(r#"{"Index":1}"#));
}

#[tokio::test]
async fn test_partially_cached_batch_goes_to_the_server() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[
            {"StatusCode":304,"Headers":{},"Result":null},
            {"StatusCode":200,"Headers":{"ETag":"\"B:1\""},"Result":{"Name":"Oscar"}}
        ]}"#,
    );
    let executor = CommandExecutor::new(transport.clone());
    let cache = executor.cache().clone();

    let requests: Vec<_> = dogs().into_iter().take(2).collect();
    cache.set(&requests[0].cache_key(DATABASE_URL), "A:1", r#"{"Name":"Arava"}"#);

    let aggressive = ExecuteOptions::default().aggressively_cache_for(Duration::from_secs(60));
    let mut batch = BatchCommand::new(cache.clone(), requests);
    executor.execute_with(&node(), &mut batch, &aggressive).await.unwrap();

    assert_eq!(transport.sent(), 1);
    let results = batch.take_result().unwrap();
    assert_eq!(results[0].result.as_deref(), Some(r#"{"Name":"Arava"}"#));
    assert_eq!(results[1].result.as_deref(), Some(r#"{"Name":"Oscar"}"#));
}

#[tokio::test]
async fn test_batch_without_cache_neither_reads_nor_writes() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[{"StatusCode":200,"Headers":{"ETag":"\"A:2\""},"Result":{"Name":"Arava"}}]}"#,
    );
    let executor = CommandExecutor::new(transport.clone());
    let cache = executor.cache().clone();

    let requests: Vec<_> = dogs().into_iter().take(1).collect();
    let key = requests[0].cache_key(DATABASE_URL);
    cache.set(&key, "A:1", r#"{"Name":"Old"}"#);

    let mut batch = BatchCommand::new(cache.clone(), requests);
    executor
        .execute_with(&node(), &mut batch, &ExecuteOptions::no_cache())
        .await
        .unwrap();

    assert_eq!(sent_body(&transport)["Requests"][0]["Headers"], json!({}));
    assert_eq!(cache.get(&key).change_vector(), Some("A:1"));
    assert_eq!(cache.get(&key).payload(), Some(r#"{"Name":"Old"}"#));
    let results = batch.take_result().unwrap();
    assert_eq!(results[0].result.as_deref(), Some(r#"{"Name":"Arava"}"#));
    assert!(!results[0].from_cache);
}

#[tokio::test]
async fn test_non_string_headers_are_ignored() {
    let transport = ScriptedTransport::new();
    transport.respond(
        200,
        None,
        r#"{"Results":[
            {"StatusCode":200,"Headers":{"ETag":"\"A:1\"","Content-Length":17,"Flags":null},"Result":{"Name":"Arava"}},
            {"StatusCode":404,"Headers":null}
        ]}"#,
    );
    let executor = CommandExecutor::new(transport);
    let cache = executor.cache().clone();

    let requests: Vec<_> = dogs().into_iter().take(2).collect();
    let keys: Vec<_> = requests.iter().map(|r| r.cache_key(DATABASE_URL)).collect();
    let mut batch = BatchCommand::new(cache.clone(), requests);
    executor.execute(&node(), &mut batch).await.unwrap();

    let results = batch.take_result().unwrap();
    assert_eq!(
        results[0].headers.keys().collect::<Vec<_>>(),
        vec!["ETag"]
    );
    assert!(results[1].headers.is_empty());
    assert_eq!(cache.get(&keys[0]).change_vector(), Some("A:1"));
    assert!(cache.get(&keys[1]).is_not_found());
}
