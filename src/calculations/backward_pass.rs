use crate::dependency::DependencyType;
use crate::graph::DependencyGraph;
use crate::task::TaskId;
use std::collections::HashMap;

/// Latest start/finish offsets in working days from the project origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateTimes {
    pub start: i64,
    pub finish: i64,
}

pub struct BackwardPass<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> BackwardPass<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Walk `order` in reverse; every latest finish is capped at `project_finish`.
    pub fn execute(&self, order: &[TaskId], project_finish: i64) -> HashMap<TaskId, LateTimes> {
        let mut late: HashMap<TaskId, LateTimes> = HashMap::with_capacity(order.len());

        for &task_id in order.iter().rev() {
            let duration = self.graph.task(task_id).map_or(0, |node| node.duration);

            let mut finish = project_finish;
            for edge in self.graph.outgoing(task_id) {
                let Some(succ) = late.get(&edge.successor_id) else {
                    continue;
                };
                let candidate = match edge.dependency_type {
                    DependencyType::FinishToStart => succ.start - edge.lag,
                    DependencyType::StartToStart => succ.start - edge.lag + duration,
                    DependencyType::FinishToFinish => succ.finish - edge.lag,
                    DependencyType::StartToFinish => succ.finish - edge.lag + duration,
                };
                finish = finish.min(candidate);
            }

            late.insert(
                task_id,
                LateTimes {
                    start: finish - duration,
                    finish,
                },
            );
        }
        late
    }
}
