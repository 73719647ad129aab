//! Dispatch against a stubbed remote execution backend.

mod common;

use mockito::Matcher;
use std::sync::Arc;

use cadence::adapters::execution::HttpExecutionBackend;
use cadence::adapters::memory::InMemoryTaskRepository;
use cadence::domain::models::{ExecutionConfig, PrState, StreamEventKind, TaskStatus};
use common::{dispatcher_with, drain_events};

fn backend(url: &str) -> Arc<HttpExecutionBackend> {
    Arc::new(HttpExecutionBackend::new(url, "test-key", &ExecutionConfig::default()).unwrap())
}

const PR_STREAM: &str = concat!(
    "data: {\"type\":\"event\",\"event\":{\"type\":\"tool_use\",\"tool\":\"read_file\"}}\n\n",
    "data: {\"type\":\"event\",\"event\":{\"type\":\"file_edit\",\"path\":\"src/login.ts\"}}\n\n",
    "data: {\"type\":\"result\",\"success\":true,\"output\":\"Fixed the login redirect\",",
    "\"prUrl\":\"https://github.com/acme/web/pull/42\",\"prNumber\":42,\"prBranch\":\"fix/login\"}\n\n",
);

#[tokio::test]
async fn test_streamed_pull_request_then_merge() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/task/stream")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJsonString(r#"{"task":"fix login bug"}"#.to_string()))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(PR_STREAM)
        .create_async()
        .await;

    let dispatcher = dispatcher_with(Arc::new(InMemoryTaskRepository::new()), backend(&server.url()), true);
    let streams = dispatcher.streams();
    let task = dispatcher.store().create("fix login bug", None, None).await.unwrap();
    let (conn, mut rx) = streams.connect().await;
    streams.subscribe(conn, task.id).await;

    dispatcher.dispatch(task.clone()).await.unwrap();
    mock.assert_async().await;

    let types: Vec<_> = drain_events(&mut rx).iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["task_started", "tool_use", "file_edit", "task_completed"]);

    let opened = dispatcher.store().get(task.id).await.unwrap();
    assert_eq!(opened.status, TaskStatus::PrOpen);
    assert_eq!(opened.pr_number, Some(42));
    assert_eq!(opened.output.as_deref(), Some("Fixed the login redirect"));
    assert!(opened.completed_at.is_none());

    let merged = dispatcher.apply_pr_state(task.id, PrState::Merged).await.unwrap();
    assert_eq!(merged.status, TaskStatus::Completed);
    assert!(merged.completed_at.is_some());
}

#[tokio::test]
async fn test_backend_failure_marks_task_failed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/task")
        .with_status(500)
        .with_body("agent crashed")
        .create_async()
        .await;

    let dispatcher = dispatcher_with(Arc::new(InMemoryTaskRepository::new()), backend(&server.url()), false);
    let streams = dispatcher.streams();
    let task = dispatcher.store().create("break things", None, None).await.unwrap();
    let (conn, mut rx) = streams.connect().await;
    streams.subscribe(conn, task.id).await;

    dispatcher.dispatch(task.clone()).await.unwrap();

    let failed = dispatcher.store().get(task.id).await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.unwrap().contains("agent crashed"));

    let events = drain_events(&mut rx);
    let last_two: Vec<_> = events[events.len() - 2..].iter().map(|e| e.kind.clone()).collect();
    assert!(matches!(last_two[0], StreamEventKind::Error { recoverable: false, .. }));
    assert!(matches!(last_two[1], StreamEventKind::TaskCompleted { success: false, .. }));
}

#[tokio::test]
async fn test_unreachable_backend_fails_without_panicking() {
    // Nothing listens on this port.
    let dispatcher = dispatcher_with(
        Arc::new(InMemoryTaskRepository::new()),
        backend("http://127.0.0.1:9"),
        true,
    );
    let task = dispatcher.store().create("nowhere to go", None, None).await.unwrap();
    dispatcher.dispatch(task.clone()).await.unwrap();

    assert_eq!(dispatcher.store().get(task.id).await.unwrap().status, TaskStatus::Failed);
}
