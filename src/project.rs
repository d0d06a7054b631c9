//! One project's persisted state: metadata, calendar, tasks and dependency edges.

use crate::auto_schedule::{AutoScheduleOutcome, AutoScheduler, Change, ScheduleMode, resolve_project_start};
use crate::calculations::{CpmEngine, CriticalPathReport};
use crate::calendar::{CalendarError, WorkCalendar, WorkCalendarConfig};
use crate::dependency::DependencyEdge;
use crate::error::ScheduleError;
use crate::graph::DependencyGraph;
use crate::hierarchy::{HierarchyError, ProgressTree, ProgressUpdate};
use crate::task::{ProjectId, TaskId, TaskRecord};
use crate::task_validation::{self, TaskValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit project start; when absent the earliest task start is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_start: Option<NaiveDate>,
    /// Anchors the backward pass instead of the earliest project finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

impl ProjectMetadata {
    pub fn new(project_id: impl Into<ProjectId>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            description: None,
            project_start: None,
            deadline: None,
        }
    }
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        ProjectMetadata::new(1, "Untitled project")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub calendar: WorkCalendarConfig,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,
}

impl ProjectSnapshot {
    pub fn new(metadata: ProjectMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.metadata.project_id
    }

    pub fn calendar(&self) -> Result<WorkCalendar, CalendarError> {
        WorkCalendar::try_from_config(&self.calendar)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn validate_tasks(&self) -> Result<(), TaskValidationError> {
        task_validation::validate_task_collection(&self.tasks)
    }

    /// Add a task, rejecting duplicates and invalid field values.
    pub fn add_task(&mut self, task: TaskRecord) -> Result<(), TaskValidationError> {
        if self.task(task.id).is_some() {
            return Err(TaskValidationError::DuplicateId(task.id));
        }
        task_validation::validate_task(&task)?;
        self.tasks.push(task);
        Ok(())
    }

    pub fn graph(&self) -> Result<DependencyGraph, ScheduleError> {
        let calendar = self.calendar()?;
        DependencyGraph::from_snapshot(&self.tasks, &self.edges, &calendar)
    }

    pub fn project_start(&self) -> Result<NaiveDate, ScheduleError> {
        resolve_project_start(self.metadata.project_start, &self.tasks)
    }

    pub fn critical_path(&self) -> Result<CriticalPathReport, ScheduleError> {
        let calendar = self.calendar()?;
        let graph = DependencyGraph::from_snapshot(&self.tasks, &self.edges, &calendar)?;
        CpmEngine::new(&graph, &calendar)
            .with_deadline(self.metadata.deadline)
            .execute(self.project_start()?)
    }

    pub fn auto_schedule(&self, mode: ScheduleMode) -> Result<AutoScheduleOutcome, ScheduleError> {
        let calendar = self.calendar()?;
        AutoScheduler::new(&calendar, mode)
            .with_project_start(self.metadata.project_start)
            .with_deadline(self.metadata.deadline)
            .run(&self.tasks, &self.edges)
    }

    /// Write new dates onto the stored tasks; returns how many tasks were updated.
    pub fn apply_changes(&mut self, changes: &[Change]) -> usize {
        let mut applied = 0;
        for change in changes {
            if let Some(task) = self.tasks.iter_mut().find(|t| t.id == change.task_id) {
                change.apply_to(task);
                applied += 1;
            }
        }
        debug!(project = %self.project_id(), applied, "schedule changes applied");
        applied
    }

    /// Insert one dependency after running it through every structural check.
    ///
    /// The stored edge set is validated as a whole first, so a snapshot that was already
    /// cyclic cannot accept further edges.
    pub fn add_dependency(&mut self, edge: DependencyEdge) -> Result<(), ScheduleError> {
        let mut graph = self.graph()?;
        graph.ensure_acyclic()?;
        graph.add_edge(edge.clone())?;
        self.edges.push(edge);
        Ok(())
    }

    pub fn progress_tree(&self) -> Result<ProgressTree, HierarchyError> {
        ProgressTree::from_tasks(&self.tasks)
    }

    /// Set a leaf task's progress and roll the change up to the root.
    pub fn set_progress(
        &mut self,
        id: TaskId,
        percentage: u8,
    ) -> Result<Vec<ProgressUpdate>, HierarchyError> {
        let mut tree = self.progress_tree()?;
        let updates = tree.set_leaf_progress(id, percentage)?;
        tree.apply_to(&mut self.tasks);
        Ok(updates)
    }

    /// Recompute every summary task's progress from its children.
    pub fn rollup_progress(&mut self) -> Result<Vec<ProgressUpdate>, HierarchyError> {
        let mut tree = self.progress_tree()?;
        let updates = tree.rollup();
        tree.apply_to(&mut self.tasks);
        Ok(updates)
    }
}
