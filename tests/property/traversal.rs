use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use taskgraph::dag::DagGraph;
use taskgraph::model::TaskStatus;
use taskgraph::types::TaskId;
use taskgraph_test_utils::builders::new_task_after;
use taskgraph_test_utils::fixtures::TestEngine;
use uuid::Uuid;

fn id(i: usize) -> TaskId {
    Uuid::from_u128(i as u128 + 1)
}

// Random DAG where task N may only depend on tasks 0..N-1, plus a duration
// per task.
fn weighted_dag_strategy(max_tasks: usize) -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<u64>)> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        (
            proptest::collection::vec(
                proptest::collection::vec(any::<usize>(), 0..4),
                num_tasks,
            ),
            proptest::collection::vec(0..20u64, num_tasks),
        )
            .prop_map(|(raw, durations)| {
                let deps = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        let mut deps: Vec<usize> = potential
                            .into_iter()
                            .map(|d| d % i)
                            .collect::<HashSet<_>>()
                            .into_iter()
                            .collect();
                        deps.sort();
                        deps
                    })
                    .collect();
                (deps, durations)
            })
    })
}

fn build(deps: &[Vec<usize>], durations: &[u64]) -> DagGraph {
    let mut graph = DagGraph::new();
    for (i, secs) in durations.iter().enumerate() {
        graph.insert_task(id(i), TaskStatus::Pending, *secs);
    }
    for (i, prereqs) in deps.iter().enumerate() {
        for &p in prereqs {
            graph.add_edge(id(i), id(p));
        }
    }
    graph
}

/// Exhaustive longest path from `node` down to any leaf.
fn brute_force_longest(graph: &DagGraph, durations: &HashMap<TaskId, u64>, node: TaskId) -> u64 {
    let own = durations[&node];
    graph
        .dependents_of(node)
        .iter()
        .map(|child| brute_force_longest(graph, durations, *child))
        .max()
        .map_or(own, |best| own + best)
}

proptest! {
    #[test]
    fn test_closures_are_deduplicated_and_symmetric(
        (deps, durations) in weighted_dag_strategy(12),
    ) {
        let graph = build(&deps, &durations);
        let mut ancestor_sets: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();

        for task in graph.tasks() {
            let ancestors = graph.ancestors(task, None);
            let set: HashSet<TaskId> = ancestors.iter().map(|(t, _)| *t).collect();
            prop_assert_eq!(set.len(), ancestors.len(), "duplicate ancestor of {}", task);
            prop_assert!(!set.contains(&task), "{} is its own ancestor", task);
            prop_assert!(ancestors.iter().all(|(_, d)| *d >= 1));
            ancestor_sets.insert(task, set);
        }

        for x in graph.tasks() {
            let descendants: HashSet<TaskId> =
                graph.descendants(x, None).into_iter().map(|(t, _)| t).collect();
            for y in graph.tasks() {
                prop_assert_eq!(
                    descendants.contains(&y),
                    ancestor_sets[&y].contains(&x),
                    "asymmetry between {} and {}",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_depth_bound_is_a_prefix_of_the_full_closure(
        (deps, durations) in weighted_dag_strategy(12),
        root in any::<usize>(),
        bound in 1..5u32,
    ) {
        let graph = build(&deps, &durations);
        let root = id(root % deps.len());

        let full: HashMap<TaskId, u32> = graph.ancestors(root, None).into_iter().collect();
        let bounded: HashMap<TaskId, u32> =
            graph.ancestors(root, Some(bound)).into_iter().collect();
        let expected: HashMap<TaskId, u32> =
            full.into_iter().filter(|(_, d)| *d <= bound).collect();
        prop_assert_eq!(bounded, expected);
    }

    #[test]
    fn test_critical_path_matches_brute_force(
        (deps, durations) in weighted_dag_strategy(10),
        root in any::<usize>(),
    ) {
        let graph = build(&deps, &durations);
        let weights: HashMap<TaskId, u64> =
            durations.iter().enumerate().map(|(i, d)| (id(i), *d)).collect();
        let root = id(root % deps.len());

        let path = graph.critical_path(root).unwrap();
        prop_assert_eq!(path.total_ms, brute_force_longest(&graph, &weights, root));
        prop_assert_eq!(path.tasks[0], root);

        let summed: u64 = path.tasks.iter().map(|t| weights[t]).sum();
        prop_assert_eq!(summed, path.total_ms);
        for pair in path.tasks.windows(2) {
            prop_assert!(graph.dependents_of(pair[0]).contains(&pair[1]));
        }
        let last = *path.tasks.last().unwrap();
        prop_assert!(graph.dependents_of(last).is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_stored_closures_match_in_memory_graph(
        (deps, durations) in weighted_dag_strategy(10),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let t = TestEngine::new().await;
            let mut ids: Vec<TaskId> = Vec::with_capacity(deps.len());
            for (i, prereqs) in deps.iter().enumerate() {
                let after: Vec<TaskId> = prereqs.iter().map(|p| ids[*p]).collect();
                let task = t.queue().enqueue(new_task_after(&format!("t{i}"), &after)).await.unwrap();
                ids.push(task.id);
            }

            let mut graph = DagGraph::new();
            for (i, real) in ids.iter().enumerate() {
                graph.insert_task(*real, TaskStatus::Pending, durations[i]);
            }
            for (i, prereqs) in deps.iter().enumerate() {
                for &p in prereqs {
                    graph.add_edge(ids[i], ids[p]);
                }
            }

            for real in &ids {
                let stored: HashMap<TaskId, u32> = t
                    .traversal()
                    .ancestors(*real, None)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| (r.task.id, r.depth))
                    .collect();
                let expected: HashMap<TaskId, u32> = graph.ancestors(*real, None).into_iter().collect();
                assert_eq!(stored, expected);

                let stored: HashMap<TaskId, u32> = t
                    .traversal()
                    .descendants(*real, Some(2))
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| (r.task.id, r.depth))
                    .collect();
                let expected: HashMap<TaskId, u32> =
                    graph.descendants(*real, Some(2)).into_iter().collect();
                assert_eq!(stored, expected);
            }
        });
    }
}
