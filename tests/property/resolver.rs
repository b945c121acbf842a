use std::collections::HashSet;

use proptest::prelude::*;
use taskgraph::dag::{DagGraph, Resolver};
use taskgraph::errors::ErrorKind;
use taskgraph::model::{FilterState, TaskStatus};
use taskgraph::types::TaskId;
use taskgraph_test_utils::builders::new_task_after;
use taskgraph_test_utils::fixtures::TestEngine;
use uuid::Uuid;

fn id(i: usize) -> TaskId {
    Uuid::from_u128(i as u128 + 1)
}

// Strategy to generate a random DAG as a list of prerequisite lists.
// Acyclicity is guaranteed by only letting task N depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut deps: Vec<usize> = potential
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|d| d % i.max(1))
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .collect();
                    deps.sort();
                    deps
                })
                .collect()
        })
    })
}

/// Build a fresh graph where every task is classified from scratch.
fn build(deps: &[Vec<usize>]) -> DagGraph {
    let mut graph = DagGraph::new();
    for (i, prereqs) in deps.iter().enumerate() {
        let status = if prereqs.is_empty() {
            TaskStatus::Ready
        } else {
            TaskStatus::Pending
        };
        graph.insert_task(id(i), status, 1);
    }
    for (i, prereqs) in deps.iter().enumerate() {
        for &p in prereqs {
            graph.add_edge(id(i), id(p));
        }
    }
    graph
}

fn assert_readiness(graph: &DagGraph) -> Result<(), TestCaseError> {
    for task in graph.tasks() {
        let status = graph.status(task).unwrap();
        if matches!(status, TaskStatus::Completed | TaskStatus::Running) {
            continue;
        }
        let all_done = graph
            .dependencies_of(task)
            .iter()
            .all(|p| graph.status(*p) == Some(TaskStatus::Completed));
        prop_assert_eq!(
            status == TaskStatus::Ready,
            all_done,
            "task {} is {} with all_done={}",
            task,
            status,
            all_done
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_completion_keeps_ready_iff_prerequisites_done(
        deps in dag_strategy(12),
        picks in proptest::collection::vec(any::<usize>(), 12),
    ) {
        let mut graph = build(&deps);
        assert_readiness(&graph)?;

        let mut completed = 0;
        for pick in picks.iter().cycle().take(deps.len()) {
            let ready: Vec<TaskId> = graph
                .tasks()
                .filter(|t| graph.status(*t) == Some(TaskStatus::Ready))
                .collect();
            prop_assert!(!ready.is_empty(), "no ready task while {} remain", deps.len() - completed);

            let chosen = ready[pick % ready.len()];
            graph.set_status(chosen, TaskStatus::Completed);
            let cascade = Resolver::on_task_completed(&graph, chosen).unwrap();
            for change in &cascade.changes {
                prop_assert_eq!(change.from, TaskStatus::Pending);
                prop_assert_eq!(change.to, TaskStatus::Ready);
            }
            graph.apply(&cascade);
            completed += 1;

            // Re-running the same completion changes nothing.
            prop_assert!(Resolver::on_task_completed(&graph, chosen).unwrap().is_empty());
            assert_readiness(&graph)?;
        }

        prop_assert!(graph.tasks().all(|t| graph.status(t) == Some(TaskStatus::Completed)));
    }

    #[test]
    fn test_new_edge_rejected_iff_it_closes_a_cycle(
        deps in dag_strategy(10),
        x in any::<usize>(),
        y in any::<usize>(),
    ) {
        let graph = build(&deps);
        let n = deps.len();
        let (x, y) = (id(x % n), id(y % n));

        let ancestors_of_y: HashSet<TaskId> =
            graph.ancestors(y, None).into_iter().map(|(t, _)| t).collect();
        let should_fail = x == y || ancestors_of_y.contains(&x);

        match Resolver::check_new_edge(&graph, x, y) {
            Ok(()) => prop_assert!(!should_fail, "accepted cycle-closing edge {} -> {}", x, y),
            Err(e) => {
                prop_assert!(should_fail, "rejected harmless edge {} -> {}: {}", x, y, e);
                let expected = if x == y { ErrorKind::Validation } else { ErrorKind::Cycle };
                prop_assert_eq!(e.kind(), expected);
            }
        }
    }

    #[test]
    fn test_failure_blocks_every_waiting_descendant(
        deps in dag_strategy(12),
        victim in any::<usize>(),
    ) {
        let mut graph = build(&deps);
        let before = graph.clone();
        let victim = id(victim % deps.len());

        graph.set_status(victim, TaskStatus::Failed);
        let cascade = Resolver::on_task_failed(&graph, victim).unwrap();
        graph.apply(&cascade);

        let downstream: HashSet<TaskId> =
            graph.descendants(victim, None).into_iter().map(|(t, _)| t).collect();
        for task in graph.tasks() {
            if task == victim {
                continue;
            }
            if downstream.contains(&task) {
                prop_assert_eq!(graph.status(task), Some(TaskStatus::Blocked));
            } else {
                prop_assert_eq!(graph.status(task), before.status(task));
            }
        }
        prop_assert_eq!(cascade.len(), downstream.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_stored_completion_keeps_ready_iff_prerequisites_done(
        deps in dag_strategy(12),
        picks in proptest::collection::vec(any::<usize>(), 12),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let t = TestEngine::new().await;
            let q = t.queue();
            let mut ids: Vec<TaskId> = Vec::with_capacity(deps.len());
            for (i, prereqs) in deps.iter().enumerate() {
                let after: Vec<TaskId> = prereqs.iter().map(|p| ids[*p]).collect();
                ids.push(q.enqueue(new_task_after(&format!("t{i}"), &after)).await.unwrap().id);
            }

            for pick in picks.iter().cycle().take(deps.len()) {
                let stored = q.list_filtered(&FilterState::all()).await.unwrap();
                let status_of = |id: TaskId| {
                    stored
                        .iter()
                        .find(|task| task.id == id)
                        .map(|task| task.status)
                };

                for (i, prereqs) in deps.iter().enumerate() {
                    let status = status_of(ids[i]).unwrap();
                    if status == TaskStatus::Completed {
                        continue;
                    }
                    let all_done = prereqs
                        .iter()
                        .all(|p| status_of(ids[*p]) == Some(TaskStatus::Completed));
                    assert_eq!(
                        status == TaskStatus::Ready,
                        all_done,
                        "task t{i} is {status} with all_done={all_done}"
                    );
                }

                let ready: Vec<TaskId> = stored
                    .iter()
                    .filter(|task| task.status == TaskStatus::Ready)
                    .map(|task| task.id)
                    .collect();
                assert!(!ready.is_empty());
                let chosen = ready[pick % ready.len()];
                q.start(chosen).await.unwrap();
                q.complete(chosen).await.unwrap();
            }

            let stored = q.list_filtered(&FilterState::all()).await.unwrap();
            assert!(stored.iter().all(|task| task.status == TaskStatus::Completed));
        });
    }
}
