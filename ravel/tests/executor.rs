mod common;

use std::time::Duration;

use http::Method;
use http::header::IF_NONE_MATCH;
use pretty_assertions::assert_eq;
use ravel::{
    AggressiveCacheMode, CacheStatus, CommandExecutor, ExecuteOptions, ExecutorConfig,
    JsonCommand, LifecycleState, RawCommand, VoidCommand,
};
use ravel_core::{BodyDisposal, Command, CommandError, InvalidResponse, NotFoundPolicy, body};
use ravel_pipeline::PipelineBuilder;
use serde_json::json;

use common::{ScriptedTransport, document_key, load_document, node};

const ARAVA: &str = r#"{"Name":"Arava","@metadata":{"@id":"dogs/1"}}"#;

#[tokio::test]
async fn test_first_fetch_is_cached() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    let executor = CommandExecutor::new(transport.clone());

    let mut command = load_document("dogs/1");
    let ctx = executor.execute(&node(), &mut command).await.unwrap();

    assert_eq!(ctx.status, CacheStatus::Miss);
    assert_eq!(
        ctx.states,
        vec![
            LifecycleState::Building,
            LifecycleState::AwaitingResponse,
            LifecycleState::Parsing,
            LifecycleState::Cached,
            LifecycleState::Done,
        ]
    );
    assert_eq!(ctx.cache_key, Some(document_key("dogs/1")));
    assert!(!transport.last_request().is_conditional());

    let handle = executor.cache().get(&document_key("dogs/1"));
    assert_eq!(handle.change_vector(), Some("A:1-abc"));
    assert_eq!(handle.payload(), Some(ARAVA));
    assert_eq!(command.take_result(), Some(Some(serde_json::from_str(ARAVA).unwrap())));
}

#[tokio::test]
async fn test_not_modified_reuses_cached_body() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    transport.respond(304, None, "");
    let executor = CommandExecutor::new(transport.clone());

    let mut first = load_document("dogs/1");
    executor.execute(&node(), &mut first).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(executor.cache().get(&document_key("dogs/1")).age() >= Duration::from_millis(150));

    let mut second = load_document("dogs/1");
    let ctx = executor.execute(&node(), &mut second).await.unwrap();

    assert_eq!(ctx.status, CacheStatus::NotModified);
    assert!(ctx.visited(LifecycleState::NotModified));
    assert!(!ctx.visited(LifecycleState::Parsing));
    assert_eq!(
        transport.last_request().headers.get(IF_NONE_MATCH).unwrap(),
        "\"A:1-abc\""
    );
    assert_eq!(first.take_result(), second.take_result());
    assert!(executor.cache().get(&document_key("dogs/1")).age() < Duration::from_millis(100));
}

#[tokio::test]
async fn test_malformed_body_is_fatal_and_not_cached() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), "{not-json");
    let executor = CommandExecutor::new(transport);

    let mut command = load_document("dogs/1");
    let error = executor.execute(&node(), &mut command).await.unwrap_err();

    assert_eq!(error.command, "get_document");
    assert!(error.is_invalid_response());
    assert!(command.result().is_none());
    assert!(!executor.cache().contains(&document_key("dogs/1")));
}

#[tokio::test]
async fn test_not_found_is_negatively_cached_for_lookups() {
    let transport = ScriptedTransport::new();
    transport.respond(404, None, "");
    let executor = CommandExecutor::new(transport);

    let mut command = load_document("dogs/404");
    let ctx = executor.execute(&node(), &mut command).await.unwrap();

    assert!(ctx.visited(LifecycleState::Empty));
    assert!(ctx.visited(LifecycleState::Cached));
    assert_eq!(command.take_result(), None);
    assert!(executor.cache().get(&document_key("dogs/404")).is_not_found());
}

#[tokio::test]
async fn test_not_found_absent_leaves_cache_alone() {
    let transport = ScriptedTransport::new();
    transport.respond(404, None, "");
    let executor = CommandExecutor::new(transport);

    let mut command = load_document("dogs/404").not_found(NotFoundPolicy::Absent);
    let ctx = executor.execute(&node(), &mut command).await.unwrap();

    assert!(!ctx.visited(LifecycleState::Cached));
    assert_eq!(command.take_result(), None);
    assert!(!executor.cache().contains(&document_key("dogs/404")));
}

#[tokio::test]
async fn test_not_found_fails_mutations() {
    let transport = ScriptedTransport::new();
    transport.respond(404, None, "");
    let executor = CommandExecutor::new(transport);

    let pipeline = PipelineBuilder::new().parse_json().build();
    let mut command = JsonCommand::post("patch", "/docs?id=dogs/404", json!({"Age": 5}), pipeline);
    assert_eq!(command.not_found_policy(), NotFoundPolicy::Fail);

    let error = executor.execute(&node(), &mut command).await.unwrap_err();
    assert!(matches!(error.source, CommandError::NotFound));
}

#[tokio::test]
async fn test_aggressive_caching_skips_the_network() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    let executor = CommandExecutor::new(transport.clone());
    let aggressive = ExecuteOptions::default().aggressively_cache_for(Duration::from_secs(60));

    let mut first = load_document("dogs/1");
    executor.execute_with(&node(), &mut first, &aggressive).await.unwrap();

    let mut second = load_document("dogs/1");
    let ctx = executor.execute_with(&node(), &mut second, &aggressive).await.unwrap();

    assert_eq!(transport.sent(), 1);
    assert_eq!(ctx.status, CacheStatus::AggressiveHit);
    assert!(!ctx.hit_network());
    assert_eq!(first.take_result(), second.take_result());
}

#[tokio::test]
async fn test_generation_bump_forces_revalidation() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    transport.respond(304, None, "");
    let executor = CommandExecutor::new(transport.clone());
    let tracking = ExecuteOptions::default().aggressively_cache_for(Duration::from_secs(60));
    let untracked = tracking.tracking(AggressiveCacheMode::DoNotTrackChanges);

    executor
        .execute_with(&node(), &mut load_document("dogs/1"), &tracking)
        .await
        .unwrap();
    executor.cache().bump_generation();

    let ctx = executor
        .execute_with(&node(), &mut load_document("dogs/1"), &untracked)
        .await
        .unwrap();
    assert_eq!(ctx.status, CacheStatus::AggressiveHit);
    assert_eq!(transport.sent(), 1);

    let ctx = executor
        .execute_with(&node(), &mut load_document("dogs/1"), &tracking)
        .await
        .unwrap();
    assert_eq!(ctx.status, CacheStatus::NotModified);
    assert_eq!(transport.sent(), 2);

    // The 304 confirmed the entry in the current generation.
    let ctx = executor
        .execute_with(&node(), &mut load_document("dogs/1"), &tracking)
        .await
        .unwrap();
    assert_eq!(ctx.status, CacheStatus::AggressiveHit);
    assert_eq!(transport.sent(), 2);
}

#[tokio::test]
async fn test_aggressively_cached_not_found() {
    let transport = ScriptedTransport::new();
    transport.respond(404, None, "");
    let executor = CommandExecutor::new(transport.clone());
    let aggressive = ExecuteOptions::default().aggressively_cache_for(Duration::from_secs(60));

    executor
        .execute_with(&node(), &mut load_document("dogs/404"), &aggressive)
        .await
        .unwrap();

    let mut command = load_document("dogs/404");
    let ctx = executor.execute_with(&node(), &mut command, &aggressive).await.unwrap();
    assert_eq!(ctx.status, CacheStatus::NotFoundCached);
    assert_eq!(transport.sent(), 1);
    assert_eq!(command.take_result(), None);
}

#[tokio::test]
async fn test_not_found_marker_is_not_sent_as_change_vector() {
    let transport = ScriptedTransport::new();
    transport.respond(404, None, "");
    transport.respond(200, Some("A:2-def"), ARAVA);
    let executor = CommandExecutor::new(transport.clone());

    executor.execute(&node(), &mut load_document("dogs/1")).await.unwrap();
    let mut command = load_document("dogs/1");
    executor.execute(&node(), &mut command).await.unwrap();

    assert!(!transport.last_request().is_conditional());
    assert!(command.result().is_some());
    assert_eq!(executor.cache().get(&document_key("dogs/1")).change_vector(), Some("A:2-def"));
}

#[tokio::test]
async fn test_unexpected_not_modified() {
    let transport = ScriptedTransport::new();
    transport.respond(304, None, "");
    let executor = CommandExecutor::new(transport);

    let error = executor
        .execute(&node(), &mut load_document("dogs/1"))
        .await
        .unwrap_err();
    assert!(matches!(
        error.source,
        CommandError::InvalidResponse(InvalidResponse::UnexpectedNotModified)
    ));
}

#[tokio::test]
async fn test_empty_bodies_yield_absent_results() {
    let transport = ScriptedTransport::new();
    transport.respond(204, None, "");
    transport.respond(200, Some("A:1-abc"), "");
    let executor = CommandExecutor::new(transport);

    for _ in 0..2 {
        let mut command = load_document("dogs/1");
        let ctx = executor.execute(&node(), &mut command).await.unwrap();
        assert!(ctx.visited(LifecycleState::Empty));
        assert!(!ctx.visited(LifecycleState::Parsing));
        assert_eq!(command.take_result(), None);
    }
    assert!(!executor.cache().contains(&document_key("dogs/1")));
}

#[tokio::test]
async fn test_server_error_carries_body() {
    let transport = ScriptedTransport::new();
    transport.respond(500, None, "index is corrupted");
    let executor = CommandExecutor::new(transport);

    let error = executor
        .execute(&node(), &mut load_document("dogs/1"))
        .await
        .unwrap_err();
    match error.source {
        CommandError::Server { status, message } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "index is corrupted");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_failure() {
    let transport = ScriptedTransport::new();
    transport.fail_connection();
    let executor = CommandExecutor::new(transport);

    let error = executor
        .execute(&node(), &mut load_document("dogs/1"))
        .await
        .unwrap_err();
    assert!(error.is_transport());
}

#[tokio::test]
async fn test_broken_body_keeps_stale_entry() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    transport.respond_then_fail(200, Some("A:2-def"), &[r#"{"Name":"Ar"#], "connection reset");
    transport.respond(304, None, "");
    let executor = CommandExecutor::new(transport.clone());

    executor.execute(&node(), &mut load_document("dogs/1")).await.unwrap();

    let mut broken = load_document("dogs/1");
    let error = executor.execute(&node(), &mut broken).await.unwrap_err();
    assert!(error.is_transport());
    assert!(broken.result().is_none());

    let handle = executor.cache().get(&document_key("dogs/1"));
    assert_eq!(handle.change_vector(), Some("A:1-abc"));
    assert_eq!(handle.payload(), Some(ARAVA));

    let mut retry = load_document("dogs/1");
    let ctx = executor.execute(&node(), &mut retry).await.unwrap();
    assert_eq!(ctx.status, CacheStatus::NotModified);
    assert_eq!(
        transport.last_request().headers.get(IF_NONE_MATCH).unwrap(),
        "\"A:1-abc\""
    );
    assert_eq!(retry.take_result(), Some(Some(serde_json::from_str(ARAVA).unwrap())));
}

#[tokio::test]
async fn test_not_modified_survives_broken_body() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    transport.respond_then_fail(304, None, &[], "connection reset");
    let executor = CommandExecutor::new(transport);

    executor.execute(&node(), &mut load_document("dogs/1")).await.unwrap();

    let mut command = load_document("dogs/1");
    let ctx = executor.execute(&node(), &mut command).await.unwrap();
    assert_eq!(ctx.status, CacheStatus::NotModified);
    assert_eq!(command.take_result(), Some(Some(serde_json::from_str(ARAVA).unwrap())));
}

#[tokio::test]
async fn test_uncollected_body_is_not_cached() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    let executor = CommandExecutor::new(transport);

    let pipeline = PipelineBuilder::new().parse_json().build();
    let mut command = JsonCommand::get("get_document", "/docs?id=dogs/1", pipeline);
    let ctx = executor.execute(&node(), &mut command).await.unwrap();

    assert!(ctx.visited(LifecycleState::Parsing));
    assert!(!ctx.visited(LifecycleState::Cached));
    assert!(command.result().is_some());
}

#[tokio::test]
async fn test_cache_disabled_bypasses_everything() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    transport.respond(200, Some("A:1-abc"), ARAVA);
    let executor = CommandExecutor::new(transport.clone()).with_options(ExecuteOptions::no_cache());

    for _ in 0..2 {
        let ctx = executor.execute(&node(), &mut load_document("dogs/1")).await.unwrap();
        assert_eq!(ctx.status, CacheStatus::Bypass);
        assert_eq!(ctx.cache_key, None);
    }
    assert!(!transport.last_request().is_conditional());
    assert_eq!(executor.cache().entry_count(), 0);
}

#[tokio::test]
async fn test_disposed_cache_always_fetches() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    transport.respond(200, Some("A:1-abc"), ARAVA);
    let executor = CommandExecutor::new(transport.clone());

    executor.execute(&node(), &mut load_document("dogs/1")).await.unwrap();
    executor.dispose();
    let ctx = executor.execute(&node(), &mut load_document("dogs/1")).await.unwrap();

    assert_eq!(ctx.status, CacheStatus::Miss);
    assert!(!transport.last_request().is_conditional());
    assert!(executor.cache().get(&document_key("dogs/1")).is_empty());
}

#[tokio::test]
async fn test_raw_response_is_handed_over() {
    let transport = ScriptedTransport::new();
    transport.respond(200, None, "attachment bytes");
    let executor = CommandExecutor::new(transport);

    let mut command = RawCommand::get("get_attachment", "/attachments?id=dogs/1&name=photo");
    let ctx = executor.execute(&node(), &mut command).await.unwrap();

    assert_eq!(ctx.disposal, BodyDisposal::Manually);
    assert_eq!(ctx.status, CacheStatus::Bypass);
    let response = command.take_result().unwrap();
    assert_eq!(
        body::read_text(response.body, 1024).await.unwrap(),
        "attachment bytes"
    );
}

#[tokio::test]
async fn test_empty_shape_drains_body() {
    let transport = ScriptedTransport::new();
    transport.respond(200, None, r#"{"ignored":true}"#);
    let executor = CommandExecutor::new(transport.clone());

    let mut command = VoidCommand::new("delete_document", Method::DELETE, "/docs?id=dogs/1");
    let ctx = executor.execute(&node(), &mut command).await.unwrap();

    assert_eq!(ctx.disposal, BodyDisposal::Automatic);
    assert!(ctx.visited(LifecycleState::Empty));
    assert_eq!(transport.last_request().method, Method::DELETE);
}

#[tokio::test]
async fn test_command_timeout_travels_on_request() {
    let transport = ScriptedTransport::new();
    transport.respond(200, Some("A:1-abc"), ARAVA);
    let executor = CommandExecutor::new(transport.clone());

    let mut command = load_document("dogs/1").timeout(Duration::from_secs(5));
    executor.execute(&node(), &mut command).await.unwrap();

    assert_eq!(transport.last_request().timeout, Some(Duration::from_secs(5)));
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
cache:
  max_entries: 64
aggressive_caching:
  duration: 30s
  mode: DoNotTrackChanges
"#;
    let config: ExecutorConfig = serde_saphyr::from_str(yaml).unwrap();
    assert_eq!(config.cache.max_entries, 64);
    assert!(config.use_cache);

    let options = config.execute_options();
    let aggressive = options.aggressive.unwrap();
    assert_eq!(aggressive.duration, Duration::from_secs(30));
    assert_eq!(aggressive.mode, AggressiveCacheMode::DoNotTrackChanges);

    let executor = CommandExecutor::from_config(ScriptedTransport::new(), &config);
    assert_eq!(executor.cache().max_entries(), 64);
    assert_eq!(executor.options(), &options);
}
