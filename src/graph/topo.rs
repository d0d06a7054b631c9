//! Kahn's algorithm with a deterministic tie-break.

use super::DependencyGraph;
use crate::error::ScheduleError;
use crate::task::TaskId;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::error;

/// Order tasks so every predecessor precedes its successors.
///
/// Among tasks that become ready together, lower `display_order` goes first, then lower id.
pub fn sequence(dag: &DependencyGraph) -> Result<Vec<TaskId>, ScheduleError> {
    let graph = dag.inner();
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|ix| graph.edges_directed(ix, Direction::Incoming).count())
        .collect();

    let key = |ix: NodeIndex| {
        let node = &graph[ix];
        Reverse((node.display_order, node.id, ix.index()))
    };

    let mut ready: BinaryHeap<Reverse<(i64, TaskId, usize)>> = graph
        .node_indices()
        .filter(|ix| in_degree[ix.index()] == 0)
        .map(key)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, id, raw))) = ready.pop() {
        order.push(id);
        let ix = NodeIndex::new(raw);
        for edge in graph.edges_directed(ix, Direction::Outgoing) {
            let succ = edge.target();
            in_degree[succ.index()] -= 1;
            if in_degree[succ.index()] == 0 {
                ready.push(key(succ));
            }
        }
    }

    if order.len() < graph.node_count() {
        error!(
            emitted = order.len(),
            total = graph.node_count(),
            "topological sequencing left tasks unordered; cycle validation was bypassed"
        );
        return Err(ScheduleError::NotADag {
            emitted: order.len(),
            total: graph.node_count(),
        });
    }
    Ok(order)
}
