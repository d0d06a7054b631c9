//! Three-colour iterative depth-first search over the dependency graph.
//!
//! White nodes are unvisited, gray nodes sit on the current DFS path and black nodes are
//! finished. Reaching a gray node means a back-edge, hence a cycle. Roots and successors are
//! visited in ascending task id so the reported cycle is reproducible.

use super::DependencyGraph;
use crate::task::TaskId;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleCheck {
    Acyclic,
    /// Task ids along the cycle; the last one has an edge back to the first.
    CycleFound(Vec<TaskId>),
}

impl CycleCheck {
    pub fn is_acyclic(&self) -> bool {
        matches!(self, CycleCheck::Acyclic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Successor lists per node index, sorted by task id and deduplicated.
fn sorted_adjacency(dag: &DependencyGraph) -> Vec<Vec<NodeIndex>> {
    let graph = dag.inner();
    graph
        .node_indices()
        .map(|ix| {
            let mut succs: Vec<NodeIndex> = graph.neighbors(ix).collect();
            succs.sort_by_key(|s| graph[*s].id);
            succs.dedup();
            succs
        })
        .collect()
}

/// Prove the whole edge set acyclic or return one cycle.
pub fn check(dag: &DependencyGraph) -> CycleCheck {
    let graph = dag.inner();
    let adjacency = sorted_adjacency(dag);
    let mut colors = vec![Color::White; graph.node_count()];

    let mut roots: Vec<NodeIndex> = graph.node_indices().collect();
    roots.sort_by_key(|ix| graph[*ix].id);

    for root in roots {
        if colors[root.index()] != Color::White {
            continue;
        }
        colors[root.index()] = Color::Gray;
        let mut stack: Vec<(NodeIndex, usize)> = vec![(root, 0)];

        while let Some(&(node, pos)) = stack.last() {
            let Some(&next) = adjacency[node.index()].get(pos) else {
                colors[node.index()] = Color::Black;
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            match colors[next.index()] {
                Color::White => {
                    colors[next.index()] = Color::Gray;
                    stack.push((next, 0));
                }
                Color::Gray => {
                    let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let path = stack[start..].iter().map(|(n, _)| graph[*n].id).collect();
                    return CycleCheck::CycleFound(path);
                }
                Color::Black => {}
            }
        }
    }
    CycleCheck::Acyclic
}

/// Existing path `from -> ... -> to`, if any.
///
/// Used before committing an edge `to -> from`: a path means the new edge closes a cycle, and
/// the returned ids are that cycle in order.
pub fn path_between(dag: &DependencyGraph, from: TaskId, to: TaskId) -> Option<Vec<TaskId>> {
    let graph = dag.inner();
    let start = dag.index_of(from)?;
    let target = dag.index_of(to)?;
    if start == target {
        return Some(vec![from]);
    }

    let adjacency = sorted_adjacency(dag);
    let mut colors = vec![Color::White; graph.node_count()];
    colors[start.index()] = Color::Gray;
    let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];

    while let Some(&(node, pos)) = stack.last() {
        let Some(&next) = adjacency[node.index()].get(pos) else {
            colors[node.index()] = Color::Black;
            stack.pop();
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }
        if next == target {
            let mut path: Vec<TaskId> = stack.iter().map(|(n, _)| graph[*n].id).collect();
            path.push(to);
            return Some(path);
        }
        if colors[next.index()] == Color::White {
            colors[next.index()] = Color::Gray;
            stack.push((next, 0));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WorkCalendar;
    use crate::dependency::DependencyEdge;
    use crate::task::TaskRecord;

    fn loaded(ids: &[i64], edges: &[(i64, i64)]) -> DependencyGraph {
        let tasks: Vec<TaskRecord> = ids.iter().map(|&id| TaskRecord::new(id, 1, "")).collect();
        let edges: Vec<DependencyEdge> = edges
            .iter()
            .map(|&(p, s)| DependencyEdge::finish_to_start(p, s))
            .collect();
        DependencyGraph::from_snapshot(&tasks, &edges, &WorkCalendar::default()).unwrap()
    }

    #[test]
    fn diamond_is_acyclic() {
        let g = loaded(&[1, 2, 3, 4], &[(1, 2), (1, 3), (2, 4), (3, 4)]);
        assert_eq!(check(&g), CycleCheck::Acyclic);
    }

    #[test]
    fn reports_cycle_in_dfs_order() {
        let g = loaded(&[1, 2, 3, 4], &[(1, 2), (2, 3), (3, 4), (4, 2)]);
        assert_eq!(
            check(&g),
            CycleCheck::CycleFound(vec![TaskId(2), TaskId(3), TaskId(4)])
        );
    }

    #[test]
    fn self_loop_from_storage_is_a_cycle() {
        let g = loaded(&[1], &[(1, 1)]);
        assert_eq!(check(&g), CycleCheck::CycleFound(vec![TaskId(1)]));
    }

    #[test]
    fn path_between_follows_transitive_edges() {
        let g = loaded(&[1, 2, 3], &[(1, 2), (2, 3)]);
        assert_eq!(
            path_between(&g, TaskId(1), TaskId(3)),
            Some(vec![TaskId(1), TaskId(2), TaskId(3)])
        );
        assert_eq!(path_between(&g, TaskId(3), TaskId(1)), None);
    }
}
