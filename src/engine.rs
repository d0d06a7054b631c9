//! Stateless entry points over a captured task/edge snapshot.
//!
//! Every function builds a fresh [`DependencyGraph`] from its inputs and returns new values;
//! persisting them is up to the caller.

use crate::auto_schedule::{AutoScheduleOutcome, AutoScheduler, ScheduleMode};
use crate::calculations::{CpmEngine, CriticalPathReport};
use crate::calendar::WorkCalendar;
use crate::dependency::DependencyEdge;
use crate::error::ScheduleError;
use crate::graph::DependencyGraph;
use crate::hierarchy;
use crate::project::ProjectSnapshot;
use crate::task::{ProjectId, TaskRecord};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Proof that a task/edge set forms a DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acyclic {
    pub task_count: usize,
    pub edge_count: usize,
}

pub fn validate_graph(
    tasks: &[TaskRecord],
    edges: &[DependencyEdge],
) -> Result<Acyclic, ScheduleError> {
    // durations play no part in acyclicity
    let graph = DependencyGraph::from_snapshot(tasks, edges, &WorkCalendar::default())?;
    graph.ensure_acyclic()?;
    Ok(Acyclic {
        task_count: graph.node_count(),
        edge_count: graph.edge_count(),
    })
}

pub fn compute_critical_path(
    tasks: &[TaskRecord],
    edges: &[DependencyEdge],
    calendar: &WorkCalendar,
    project_start: NaiveDate,
) -> Result<CriticalPathReport, ScheduleError> {
    let graph = DependencyGraph::from_snapshot(tasks, edges, calendar)?;
    CpmEngine::new(&graph, calendar).execute(project_start)
}

/// Auto-schedule from the earliest stored task start; see [`AutoScheduler`] for an explicit
/// project start or a deadline.
pub fn auto_schedule(
    tasks: &[TaskRecord],
    edges: &[DependencyEdge],
    calendar: &WorkCalendar,
    mode: ScheduleMode,
) -> Result<AutoScheduleOutcome, ScheduleError> {
    AutoScheduler::new(calendar, mode).run(tasks, edges)
}

pub fn aggregate_progress(task: &TaskRecord, children: &[TaskRecord]) -> u8 {
    hierarchy::aggregate_progress(task, children)
}

/// Critical paths for independent projects, computed in parallel.
pub fn compute_critical_paths(
    projects: &[ProjectSnapshot],
) -> Vec<(ProjectId, Result<CriticalPathReport, ScheduleError>)> {
    projects
        .par_iter()
        .map(|project| (project.project_id(), project.critical_path()))
        .collect()
}

/// Auto-schedule independent projects in parallel.
pub fn auto_schedule_projects(
    projects: &[ProjectSnapshot],
    mode: ScheduleMode,
) -> Vec<(ProjectId, Result<AutoScheduleOutcome, ScheduleError>)> {
    projects
        .par_iter()
        .map(|project| (project.project_id(), project.auto_schedule(mode)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CycleError;
    use crate::project::ProjectMetadata;
    use crate::task::TaskId;

    #[test]
    fn validate_graph_counts_tasks_and_edges() {
        let tasks = vec![TaskRecord::new(1, 1, "A"), TaskRecord::new(2, 1, "B")];
        let edges = vec![DependencyEdge::finish_to_start(1, 2)];
        assert_eq!(
            validate_graph(&tasks, &edges),
            Ok(Acyclic {
                task_count: 2,
                edge_count: 1
            })
        );
    }

    #[test]
    fn validate_graph_reports_stored_cycle() {
        let tasks = vec![TaskRecord::new(1, 1, "A"), TaskRecord::new(2, 1, "B")];
        let edges = vec![
            DependencyEdge::finish_to_start(1, 2),
            DependencyEdge::finish_to_start(2, 1),
        ];
        assert_eq!(
            validate_graph(&tasks, &edges),
            Err(ScheduleError::CycleDetected(CycleError {
                path: vec![TaskId(1), TaskId(2)]
            }))
        );
    }

    #[test]
    fn parallel_runs_keep_project_order() {
        let projects: Vec<ProjectSnapshot> = (1..=4)
            .map(|id| {
                let mut metadata = ProjectMetadata::new(id, format!("P{id}"));
                metadata.project_start = NaiveDate::from_ymd_opt(2025, 1, 6);
                let mut snapshot = ProjectSnapshot::new(metadata);
                snapshot.tasks.push(TaskRecord::new(1, id, "only").with_duration(id));
                snapshot
            })
            .collect();
        let results = compute_critical_paths(&projects);
        let durations: Vec<(ProjectId, i64)> = results
            .into_iter()
            .map(|(id, report)| (id, report.unwrap().total_duration))
            .collect();
        assert_eq!(
            durations,
            vec![
                (ProjectId(1), 1),
                (ProjectId(2), 2),
                (ProjectId(3), 3),
                (ProjectId(4), 4)
            ]
        );
    }
}
