// tests/dependencies.rs

use taskgraph::errors::{ErrorKind, TaskGraphError};
use taskgraph::model::{FilterState, TaskStatus};
use taskgraph_test_utils::fixtures::TestEngine;
use taskgraph_test_utils::init_tracing;

async fn snapshot(t: &TestEngine) -> Vec<(uuid::Uuid, TaskStatus)> {
    t.queue()
        .list_filtered(&FilterState::all())
        .await
        .unwrap()
        .into_iter()
        .map(|x| (x.id, x.status))
        .collect()
}

#[tokio::test]
async fn test_cycle_is_rejected_and_graph_unchanged() {
    init_tracing();
    let t = TestEngine::new().await;
    let chain = t.chain(3).await;
    let before_counts = t.queue().counts().await.unwrap();
    let before = snapshot(&t).await;

    let err = t
        .queue()
        .add_dependency(chain[0].id, chain[2].id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
    match err {
        TaskGraphError::DependencyCycle {
            dependent,
            prerequisite,
        } => {
            assert_eq!(dependent, chain[0].id);
            assert_eq!(prerequisite, chain[2].id);
        }
        other => panic!("Expected DependencyCycle, got: {other:?}"),
    }

    assert_eq!(t.queue().counts().await.unwrap(), before_counts);
    assert_eq!(snapshot(&t).await, before);
}

#[tokio::test]
async fn test_self_dependency_is_rejected() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let err = t.queue().add_dependency(a.id, a.id).await.unwrap_err();
    assert!(matches!(err, TaskGraphError::SelfDependency(id) if id == a.id));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(t.queue().counts().await.unwrap().dependencies, 0);
}

#[tokio::test]
async fn test_duplicate_edge_is_rejected() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let b = t.add_after("B", &[a.id]).await;
    let err = t.queue().add_dependency(b.id, a.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(t.queue().counts().await.unwrap().dependencies, 1);
}

#[tokio::test]
async fn test_adding_unfinished_prerequisite_demotes_ready_task() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let b = t.add("B").await;

    let b = t.queue().add_dependency(b.id, a.id).await.unwrap();
    assert_eq!(b.status, TaskStatus::Pending);

    t.finish(a.id).await;
    assert_eq!(t.status(b.id).await, TaskStatus::Ready);
}

#[tokio::test]
async fn test_adding_failed_prerequisite_blocks_downstream() {
    let t = TestEngine::new().await;
    let broken = t.add("broken").await;
    t.break_task(broken.id, "bad").await;

    let b = t.add("B").await;
    let c = t.add_after("C", &[b.id]).await;

    let b = t.queue().add_dependency(b.id, broken.id).await.unwrap();
    assert_eq!(b.status, TaskStatus::Blocked);
    assert_eq!(t.status(c.id).await, TaskStatus::Blocked);
}

#[tokio::test]
async fn test_running_and_terminal_tasks_refuse_new_edges() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let b = t.add("B").await;
    t.queue().start(b.id).await.unwrap();

    let err = t.queue().add_dependency(b.id, a.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    t.queue().complete(b.id).await.unwrap();
    let err = t.queue().add_dependency(b.id, a.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_blocked_task_is_not_promoted_automatically() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let p = t.add("P").await;
    let b = t.add_after("B", &[a.id, p.id]).await;

    t.break_task(a.id, "boom").await;
    assert_eq!(t.status(b.id).await, TaskStatus::Blocked);

    // The other prerequisite finishing does not help.
    t.finish(p.id).await;
    assert_eq!(t.status(b.id).await, TaskStatus::Blocked);

    // Neither does a replacement for the failed work, until it is wired in.
    let retry = t.add("A again").await;
    t.finish(retry.id).await;
    assert_eq!(t.status(b.id).await, TaskStatus::Blocked);

    let b = t
        .queue()
        .replace_dependency(b.id, a.id, retry.id)
        .await
        .unwrap();
    assert_eq!(b.status, TaskStatus::Ready);
}

#[tokio::test]
async fn test_removing_blocking_edge_reclassifies() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let p = t.add("P").await;
    let b = t.add_after("B", &[a.id, p.id]).await;

    t.break_task(a.id, "boom").await;
    assert_eq!(t.status(b.id).await, TaskStatus::Blocked);

    let b = t.queue().remove_dependency(b.id, a.id).await.unwrap();
    assert_eq!(b.status, TaskStatus::Pending);

    t.finish(p.id).await;
    assert_eq!(t.status(b.id).await, TaskStatus::Ready);

    let err = t.queue().remove_dependency(b.id, a.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_unblock_requires_clear_prerequisites() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let b = t.add_after("B", &[a.id]).await;
    let c = t.add_after("C", &[b.id]).await;

    t.break_task(a.id, "boom").await;
    assert_eq!(t.status(b.id).await, TaskStatus::Blocked);
    assert_eq!(t.status(c.id).await, TaskStatus::Blocked);

    let err = t.queue().unblock(b.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let fresh = t.add("A2").await;
    let b = t
        .queue()
        .replace_dependency(b.id, a.id, fresh.id)
        .await
        .unwrap();
    assert_eq!(b.status, TaskStatus::Pending);

    // C stays blocked until an operator steps in.
    assert_eq!(t.status(c.id).await, TaskStatus::Blocked);
    let c = t.queue().unblock(c.id).await.unwrap();
    assert_eq!(c.status, TaskStatus::Pending);

    let err = t.queue().unblock(c.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    t.finish(fresh.id).await;
    t.finish(b.id).await;
    assert_eq!(t.status(c.id).await, TaskStatus::Ready);
}

#[tokio::test]
async fn test_blocked_task_cannot_be_cancelled() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let b = t.add_after("B", &[a.id]).await;
    t.break_task(a.id, "boom").await;

    let err = t.queue().cancel(b.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(t.status(b.id).await, TaskStatus::Blocked);
}

#[tokio::test]
async fn test_replace_with_cycle_keeps_old_edge() {
    let t = TestEngine::new().await;
    let a = t.add("A").await;
    let b = t.add_after("B", &[a.id]).await;
    let c = t.add_after("C", &[b.id]).await;
    let before = snapshot(&t).await;

    let err = t
        .queue()
        .replace_dependency(b.id, a.id, c.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);

    let ancestors = t.traversal().ancestors(b.id, None).await.unwrap();
    let ids: Vec<_> = ancestors.iter().map(|r| r.task.id).collect();
    assert_eq!(ids, vec![a.id]);
    assert_eq!(snapshot(&t).await, before);
}
