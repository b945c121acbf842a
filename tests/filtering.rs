// tests/filtering.rs

use chrono::Utc;
use taskgraph::errors::ErrorKind;
use taskgraph::model::{FilterState, Task, TaskStatus};
use taskgraph_test_utils::builders::new_task;
use taskgraph_test_utils::fixtures::TestEngine;
use uuid::Uuid;

fn task(status: TaskStatus, agent_type: &str) -> Task {
    Task {
        id: Uuid::new_v4(),
        description: "Wire up the billing endpoint".to_string(),
        summary: Some("Billing API".to_string()),
        status,
        agent_type: agent_type.to_string(),
        source: "test".to_string(),
        feature_branch: Some("feature/Billing-v2".to_string()),
        estimated_duration_ms: None,
        priority: 0,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
    }
}

#[test]
fn test_status_and_agent_type_filter() {
    let filter = FilterState::builder()
        .status(TaskStatus::Running)
        .agent_type("backend")
        .build();

    let mut t = task(TaskStatus::Running, "python-backend-specialist");
    assert!(filter.matches(&t));

    t.status = TaskStatus::Completed;
    assert!(!filter.matches(&t));
}

#[test]
fn test_status_set_is_or_and_criteria_are_and() {
    let filter = FilterState::builder()
        .statuses([TaskStatus::Completed, TaskStatus::Failed])
        .feature_branch("BILLING")
        .build();

    assert!(filter.matches(&task(TaskStatus::Completed, "x")));
    assert!(filter.matches(&task(TaskStatus::Failed, "x")));
    assert!(!filter.matches(&task(TaskStatus::Ready, "x")));

    let mut no_branch = task(TaskStatus::Completed, "x");
    no_branch.feature_branch = None;
    assert!(!filter.matches(&no_branch));
}

#[test]
fn test_search_covers_description_and_summary() {
    let t = task(TaskStatus::Ready, "x");
    assert!(FilterState::builder().search("ENDPOINT").build().matches(&t));
    assert!(FilterState::builder().search("billing api").build().matches(&t));
    assert!(!FilterState::builder().search("frontend").build().matches(&t));

    let mut no_summary = t.clone();
    no_summary.summary = None;
    assert!(!FilterState::builder().search("api").build().matches(&no_summary));
}

#[test]
fn test_blank_input_leaves_criteria_unset() {
    let filter = FilterState::builder()
        .agent_type("  ")
        .feature_branch("")
        .search(" ")
        .statuses_from_str(" , ")
        .unwrap()
        .build();
    assert!(filter.is_empty());
    assert_eq!(filter, FilterState::all());
    assert!(filter.matches(&task(TaskStatus::Blocked, "anything")));
}

#[test]
fn test_statuses_from_str() {
    let filter = FilterState::builder()
        .statuses_from_str("running, Completed")
        .unwrap()
        .build();
    let statuses = filter.statuses().unwrap();
    assert!(statuses.contains(&TaskStatus::Running));
    assert!(statuses.contains(&TaskStatus::Completed));
    assert_eq!(statuses.len(), 2);

    let err = FilterState::builder()
        .statuses_from_str("running,sleeping")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_list_filtered_against_store() {
    let t = TestEngine::new().await;
    let q = t.queue();

    let api = q
        .enqueue(
            taskgraph::model::NewTask::new("Build API", "rust-backend", "plan")
                .feature_branch("feat/api"),
        )
        .await
        .unwrap();
    let ui = q
        .enqueue(taskgraph::model::NewTask::new("Build UI", "frontend", "plan"))
        .await
        .unwrap();
    let docs = q.enqueue(new_task("Write docs").summary("API reference")).await.unwrap();
    t.queue().start(api.id).await.unwrap();

    let running = q
        .list_filtered(&FilterState::builder().status(TaskStatus::Running).build())
        .await
        .unwrap();
    assert_eq!(running.iter().map(|x| x.id).collect::<Vec<_>>(), vec![api.id]);

    let api_related = q
        .list_filtered(&FilterState::builder().search("api").build())
        .await
        .unwrap();
    assert_eq!(
        api_related.iter().map(|x| x.id).collect::<Vec<_>>(),
        vec![api.id, docs.id]
    );

    let on_branch = q
        .list_filtered(&FilterState::builder().feature_branch("API").build())
        .await
        .unwrap();
    assert_eq!(on_branch.len(), 1);

    let everything = q.list_filtered(&FilterState::all()).await.unwrap();
    assert_eq!(
        everything.iter().map(|x| x.id).collect::<Vec<_>>(),
        vec![api.id, ui.id, docs.id]
    );
}
