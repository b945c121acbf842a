// src/dag/tree.rs

//! Depth-first text rendering of a descendant subgraph.
//!
//! A task with several parents is rendered under each of them; the output
//! is a display aid, not an isomorphic picture of the DAG, and can be far
//! larger than the graph itself; a node budget caps it. Rendering uses an
//! explicit stack so deep graphs cannot exhaust the call stack.

use crate::dag::DagGraph;
use crate::types::TaskId;

enum Line {
    Node {
        id: TaskId,
        depth: u32,
        prefix: String,
        last: bool,
    },
    Truncated {
        prefix: String,
        hidden: usize,
    },
}

/// Marker printed in place of dependents beyond `max_depth`, and in place of
/// everything left once the node budget is spent.
pub const TRUNCATION_MARKER: &str = "...";

/// Bounds on a rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLimits {
    /// `None` renders every level.
    pub max_depth: Option<u32>,
    /// Node lines to emit, root included, before cutting the output short.
    pub max_nodes: usize,
}

/// Render `root` and its dependents, one line per node.
///
/// Nodes at `max_depth` that still have dependents get a truncation line
/// instead of their children. Once `max_nodes` lines are out, a single
/// truncation line replaces the rest.
pub fn render_tree<F>(graph: &DagGraph, root: TaskId, limits: TreeLimits, label: F) -> String
where
    F: Fn(TaskId) -> String,
{
    let TreeLimits {
        max_depth,
        max_nodes,
    } = limits;

    let mut out = String::new();
    out.push_str(&label(root));
    out.push('\n');
    let mut rendered = 1usize;

    let mut stack: Vec<Line> = Vec::new();
    push_children(&mut stack, graph, root, 0, "", max_depth);

    while let Some(line) = stack.pop() {
        match line {
            Line::Node { .. } if rendered >= max_nodes => {
                out.push_str(&format!(
                    "{TRUNCATION_MARKER} (output limited to {max_nodes} nodes)\n"
                ));
                break;
            }
            Line::Node {
                id,
                depth,
                prefix,
                last,
            } => {
                let connector = if last { "└── " } else { "├── " };
                out.push_str(&format!("{prefix}{connector}{}\n", label(id)));
                rendered += 1;

                let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
                push_children(&mut stack, graph, id, depth, &child_prefix, max_depth);
            }
            Line::Truncated { prefix, hidden } => {
                out.push_str(&format!(
                    "{prefix}└── {TRUNCATION_MARKER} ({hidden} dependent(s) beyond max depth)\n"
                ));
            }
        }
    }

    out
}

fn push_children(
    stack: &mut Vec<Line>,
    graph: &DagGraph,
    id: TaskId,
    depth: u32,
    prefix: &str,
    max_depth: Option<u32>,
) {
    let children = graph.children_ordered(id);
    if children.is_empty() {
        return;
    }

    if max_depth.is_some_and(|max| depth >= max) {
        stack.push(Line::Truncated {
            prefix: prefix.to_string(),
            hidden: children.len(),
        });
        return;
    }

    // Reverse so the first child is popped first.
    let count = children.len();
    for (idx, child) in children.into_iter().enumerate().rev() {
        stack.push(Line::Node {
            id: child,
            depth: depth + 1,
            prefix: prefix.to_string(),
            last: idx + 1 == count,
        });
    }
}
