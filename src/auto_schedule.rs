//! Turns CPM offsets into concrete task dates and reports what moved.

use crate::calculations::{CpmEngine, ScheduleWarning};
use crate::calendar::WorkCalendar;
use crate::dependency::DependencyEdge;
use crate::error::ScheduleError;
use crate::graph::DependencyGraph;
use crate::task::{TaskId, TaskRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleMode {
    /// Every task on its earliest start and finish.
    #[default]
    AsapForward,
    /// Every task on its latest start and finish.
    AlapBackward,
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleMode::AsapForward => f.write_str("asapForward"),
            ScheduleMode::AlapBackward => f.write_str("alapBackward"),
        }
    }
}

impl FromStr for ScheduleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "asap" | "asapforward" => Ok(ScheduleMode::AsapForward),
            "alap" | "alapbackward" => Ok(ScheduleMode::AlapBackward),
            other => Err(format!("unknown schedule mode '{other}'")),
        }
    }
}

/// A task whose dates differ from the stored ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub task_id: TaskId,
    pub old_start: Option<NaiveDate>,
    pub old_end: Option<NaiveDate>,
    pub new_start: NaiveDate,
    pub new_end: NaiveDate,
    /// Working days the schedule used for the task.
    pub duration: i64,
}

impl Change {
    /// Write the new dates onto `task`.
    ///
    /// A task without an estimate also takes the scheduled duration, so a milestone stored as a
    /// same-day span is not re-read as a one-day task on the next run.
    pub fn apply_to(&self, task: &mut TaskRecord) {
        task.start_date = Some(self.new_start);
        task.due_date = Some(self.new_end);
        if task.estimated_duration.is_none() {
            task.estimated_duration = Some(self.duration);
        }
    }
}

/// Two tasks of the same assignee overlapping on `[overlap_start, overlap_end]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConflict {
    pub task_a: TaskId,
    pub task_b: TaskId,
    pub assignee_id: String,
    pub overlap_start: NaiveDate,
    pub overlap_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_id: TaskId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_critical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScheduleOutcome {
    pub mode: ScheduleMode,
    /// Origin used for the run; `None` when there was nothing to schedule.
    pub project_start: Option<NaiveDate>,
    pub scheduled: Vec<ScheduledTask>,
    pub changes: Vec<Change>,
    pub conflicts: Vec<ResourceConflict>,
    #[serde(default)]
    pub warnings: Vec<ScheduleWarning>,
}

impl AutoScheduleOutcome {
    fn empty(mode: ScheduleMode) -> Self {
        Self {
            mode,
            project_start: None,
            scheduled: Vec::new(),
            changes: Vec::new(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// The explicit start, else the earliest stored task start.
pub fn resolve_project_start(
    explicit: Option<NaiveDate>,
    tasks: &[TaskRecord],
) -> Result<NaiveDate, ScheduleError> {
    explicit
        .or_else(|| tasks.iter().filter_map(|t| t.start_date).min())
        .ok_or(ScheduleError::MissingProjectStart)
}

pub struct AutoScheduler<'a> {
    calendar: &'a WorkCalendar,
    mode: ScheduleMode,
    project_start: Option<NaiveDate>,
    deadline: Option<NaiveDate>,
}

impl<'a> AutoScheduler<'a> {
    pub fn new(calendar: &'a WorkCalendar, mode: ScheduleMode) -> Self {
        Self {
            calendar,
            mode,
            project_start: None,
            deadline: None,
        }
    }

    pub fn with_project_start(mut self, start: Option<NaiveDate>) -> Self {
        self.project_start = start;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<NaiveDate>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Compute new dates for `tasks`. Nothing is mutated; callers apply the returned changes.
    pub fn run(
        &self,
        tasks: &[TaskRecord],
        edges: &[DependencyEdge],
    ) -> Result<AutoScheduleOutcome, ScheduleError> {
        if tasks.is_empty() {
            return Ok(AutoScheduleOutcome::empty(self.mode));
        }

        let graph = DependencyGraph::from_snapshot(tasks, edges, self.calendar)?;
        let start = resolve_project_start(self.project_start, tasks)?;
        let report = CpmEngine::new(&graph, self.calendar)
            .with_deadline(self.deadline)
            .execute(start)?;

        let records: HashMap<TaskId, &TaskRecord> = tasks.iter().map(|t| (t.id, t)).collect();
        let mut scheduled = Vec::with_capacity(report.order.len());
        let mut changes = Vec::new();
        for task_id in &report.order {
            let Some(timing) = report.timing(*task_id) else {
                continue;
            };
            let (new_start, new_end) = match self.mode {
                ScheduleMode::AsapForward => (timing.earliest_start, timing.earliest_finish),
                ScheduleMode::AlapBackward => (timing.latest_start, timing.latest_finish),
            };
            scheduled.push(ScheduledTask {
                task_id: *task_id,
                start: new_start,
                end: new_end,
                is_critical: timing.is_critical,
            });

            let (old_start, old_end) = records
                .get(task_id)
                .map_or((None, None), |r| (r.start_date, r.due_date));
            if old_start != Some(new_start) || old_end != Some(new_end) {
                changes.push(Change {
                    task_id: *task_id,
                    old_start,
                    old_end,
                    new_start,
                    new_end,
                    duration: timing.duration,
                });
            }
        }

        let conflicts = detect_conflicts(&graph, &scheduled);
        info!(
            mode = %self.mode,
            tasks = scheduled.len(),
            changes = changes.len(),
            conflicts = conflicts.len(),
            "auto-schedule computed"
        );

        Ok(AutoScheduleOutcome {
            mode: self.mode,
            project_start: Some(report.project_start),
            scheduled,
            changes,
            conflicts,
            warnings: report.warnings,
        })
    }
}

/// Pairwise overlap check within each assignee; summary tasks never conflict with their own
/// descendants.
fn detect_conflicts(graph: &DependencyGraph, scheduled: &[ScheduledTask]) -> Vec<ResourceConflict> {
    let mut by_assignee: BTreeMap<&str, Vec<&ScheduledTask>> = BTreeMap::new();
    for task in scheduled {
        if let Some(assignee) = graph.task(task.task_id).and_then(|n| n.assignee_id.as_deref()) {
            by_assignee.entry(assignee).or_default().push(task);
        }
    }

    let mut conflicts = Vec::new();
    for (assignee, mut tasks) in by_assignee {
        tasks.sort_by_key(|t| (t.start, t.task_id));
        for (i, a) in tasks.iter().enumerate() {
            for b in &tasks[i + 1..] {
                // sorted by start, so no later task can overlap `a`
                if b.start > a.end {
                    break;
                }
                if graph.is_ancestor(a.task_id, b.task_id) || graph.is_ancestor(b.task_id, a.task_id) {
                    continue;
                }
                conflicts.push(ResourceConflict {
                    task_a: a.task_id,
                    task_b: b.task_id,
                    assignee_id: assignee.to_string(),
                    overlap_start: b.start,
                    overlap_end: a.end.min(b.end),
                });
            }
        }
    }
    if !conflicts.is_empty() {
        debug!(count = conflicts.len(), "resource conflicts detected");
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn mode_parses_short_and_long_names() {
        assert_eq!("asap".parse::<ScheduleMode>(), Ok(ScheduleMode::AsapForward));
        assert_eq!("asapForward".parse::<ScheduleMode>(), Ok(ScheduleMode::AsapForward));
        assert_eq!("alap-backward".parse::<ScheduleMode>(), Ok(ScheduleMode::AlapBackward));
        assert!("level".parse::<ScheduleMode>().is_err());
    }

    #[test]
    fn no_tasks_yields_empty_outcome() {
        let cal = WorkCalendar::default();
        let outcome = AutoScheduler::new(&cal, ScheduleMode::AsapForward)
            .run(&[], &[])
            .unwrap();
        assert!(outcome.project_start.is_none());
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn missing_start_is_an_error() {
        let cal = WorkCalendar::default();
        let tasks = vec![TaskRecord::new(1, 1, "A").with_duration(2)];
        assert_eq!(
            AutoScheduler::new(&cal, ScheduleMode::AsapForward).run(&tasks, &[]),
            Err(ScheduleError::MissingProjectStart)
        );
    }

    #[test]
    fn alap_pushes_slack_tasks_late() {
        let cal = WorkCalendar::default();
        let tasks = vec![
            TaskRecord::new(1, 1, "long").with_duration(5),
            TaskRecord::new(2, 1, "short").with_duration(2),
            TaskRecord::new(3, 1, "end").with_duration(1),
        ];
        let edges = vec![
            DependencyEdge::finish_to_start(1, 3),
            DependencyEdge::finish_to_start(2, 3),
        ];
        let outcome = AutoScheduler::new(&cal, ScheduleMode::AlapBackward)
            .with_project_start(Some(d(2025, 1, 6)))
            .run(&tasks, &edges)
            .unwrap();
        let short = outcome
            .scheduled
            .iter()
            .find(|t| t.task_id == TaskId(2))
            .unwrap();
        assert_eq!((short.start, short.end), (d(2025, 1, 9), d(2025, 1, 10)));
    }

    #[test]
    fn summary_task_does_not_conflict_with_its_child() {
        let cal = WorkCalendar::default();
        let tasks = vec![
            TaskRecord::new(1, 1, "summary").with_duration(5).with_assignee("ana"),
            TaskRecord::new(2, 1, "child")
                .with_duration(2)
                .with_parent(1)
                .with_assignee("ana"),
        ];
        let outcome = AutoScheduler::new(&cal, ScheduleMode::AsapForward)
            .with_project_start(Some(d(2025, 1, 6)))
            .run(&tasks, &[])
            .unwrap();
        assert!(outcome.conflicts.is_empty());
    }
}
