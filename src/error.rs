use crate::calendar::CalendarError;
use crate::dependency::DependencyType;
use crate::hierarchy::HierarchyError;
use crate::task::{ProjectId, TaskId};
use crate::task_validation::TaskValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dependency cycle; every id has an edge to the next, and the last one back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("dependency cycle detected: {}", format_cycle(.path))]
pub struct CycleError {
    pub path: Vec<TaskId>,
}

fn format_cycle(path: &[TaskId]) -> String {
    path.iter()
        .chain(path.first())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Reasons a single dependency edge is refused at insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeError {
    #[error("task {task} cannot depend on itself")]
    SelfDependency { task: TaskId },
    #[error("task {task} is not part of this scheduling graph")]
    UnknownTask { task: TaskId },
    #[error(
        "task {predecessor} (project {predecessor_project}) and task {successor} (project {successor_project}) belong to different projects"
    )]
    CrossProject {
        predecessor: TaskId,
        predecessor_project: ProjectId,
        successor: TaskId,
        successor_project: ProjectId,
    },
    #[error("task {parent} is the parent of task {child}; a dependency between them is not allowed")]
    HierarchyConflict { parent: TaskId, child: TaskId },
    #[error("dependency {predecessor} -> {successor} ({dependency_type}) already exists")]
    DuplicateEdge {
        predecessor: TaskId,
        successor: TaskId,
        dependency_type: DependencyType,
    },
    #[error(transparent)]
    CycleDetected(#[from] CycleError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Edge(#[from] EdgeError),
    #[error(transparent)]
    CycleDetected(#[from] CycleError),
    /// Internal invariant violation: the sequencer could not order every task.
    #[error("topological sort emitted {emitted} of {total} tasks; graph is not a DAG")]
    NotADag { emitted: usize, total: usize },
    #[error(transparent)]
    InvalidTask(#[from] TaskValidationError),
    #[error("no project start supplied and no task carries a start date")]
    MissingProjectStart,
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

impl ScheduleError {
    /// The offending cycle, whether it was caught per edge or over the whole graph.
    pub fn cycle_path(&self) -> Option<&[TaskId]> {
        match self {
            ScheduleError::CycleDetected(cycle)
            | ScheduleError::Edge(EdgeError::CycleDetected(cycle)) => Some(&cycle.path),
            _ => None,
        }
    }
}
