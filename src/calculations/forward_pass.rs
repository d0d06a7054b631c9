use crate::dependency::DependencyType;
use crate::graph::DependencyGraph;
use crate::task::TaskId;
use std::collections::HashMap;

/// Earliest start/finish offsets in working days from the project origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarlyTimes {
    pub start: i64,
    pub finish: i64,
}

pub struct ForwardPass<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> ForwardPass<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// `order` must be a topological order of the graph.
    pub fn execute(&self, order: &[TaskId]) -> HashMap<TaskId, EarlyTimes> {
        let mut early: HashMap<TaskId, EarlyTimes> = HashMap::with_capacity(order.len());

        for &task_id in order {
            let duration = self.graph.task(task_id).map_or(0, |node| node.duration);

            // Nothing starts before the project origin
            let mut start = 0;
            for edge in self.graph.incoming(task_id) {
                let Some(pred) = early.get(&edge.predecessor_id) else {
                    continue;
                };
                let candidate = match edge.dependency_type {
                    DependencyType::FinishToStart => pred.finish + edge.lag,
                    DependencyType::StartToStart => pred.start + edge.lag,
                    DependencyType::FinishToFinish => pred.finish + edge.lag - duration,
                    DependencyType::StartToFinish => pred.start + edge.lag - duration,
                };
                start = start.max(candidate);
            }

            early.insert(
                task_id,
                EarlyTimes {
                    start,
                    finish: start + duration,
                },
            );
        }
        early
    }
}
