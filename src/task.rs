use crate::calendar::WorkCalendar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        TaskId(value)
    }
}

impl From<i64> for ProjectId {
    fn from(value: i64) -> Self {
        ProjectId(value)
    }
}

/// A task as the persistence layer hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Estimated duration in working days; wins over the stored dates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub progress_percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub display_order: i64,
}

impl TaskRecord {
    pub fn new(id: impl Into<TaskId>, project_id: impl Into<ProjectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            parent_id: None,
            start_date: None,
            due_date: None,
            estimated_duration: None,
            progress_percentage: 0,
            assignee_id: None,
            display_order: 0,
        }
    }

    pub fn with_duration(mut self, days: i64) -> Self {
        self.estimated_duration = Some(days);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<TaskId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_dates(mut self, start: NaiveDate, due: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.due_date = Some(due);
        self
    }

    pub fn with_progress(mut self, percentage: u8) -> Self {
        self.progress_percentage = percentage;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee_id = Some(assignee.into());
        self
    }

    pub fn with_display_order(mut self, order: i64) -> Self {
        self.display_order = order;
        self
    }

    /// Working-day duration: the estimate, else the span of the stored dates, else zero.
    pub fn duration_days(&self, calendar: &WorkCalendar) -> i64 {
        if let Some(estimate) = self.estimated_duration {
            return estimate;
        }
        match (self.start_date, self.due_date) {
            (Some(start), Some(due)) => calendar.working_days_between(start, due),
            _ => 0,
        }
    }
}

/// Scheduling view of a task inside one dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub duration: i64,
    pub parent_id: Option<TaskId>,
    pub progress_percentage: u8,
    pub assignee_id: Option<String>,
    pub display_order: i64,
}

impl TaskNode {
    pub fn new(id: impl Into<TaskId>, project_id: impl Into<ProjectId>, duration: i64) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            duration,
            parent_id: None,
            progress_percentage: 0,
            assignee_id: None,
            display_order: 0,
        }
    }

    pub fn from_record(record: &TaskRecord, calendar: &WorkCalendar) -> Self {
        Self {
            id: record.id,
            project_id: record.project_id,
            duration: record.duration_days(calendar),
            parent_id: record.parent_id,
            progress_percentage: record.progress_percentage,
            assignee_id: record.assignee_id.clone(),
            display_order: record.display_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn estimate_wins_over_dates() {
        let cal = WorkCalendar::default();
        let record = TaskRecord::new(1, 1, "A")
            .with_dates(d(2025, 1, 6), d(2025, 1, 10))
            .with_duration(2);
        assert_eq!(record.duration_days(&cal), 2);
    }

    #[test]
    fn duration_falls_back_to_working_days_in_dates() {
        let cal = WorkCalendar::default();
        // Friday through Tuesday spans a weekend
        let record = TaskRecord::new(1, 1, "A").with_dates(d(2025, 1, 3), d(2025, 1, 7));
        assert_eq!(record.duration_days(&cal), 3);
        assert_eq!(TaskRecord::new(2, 1, "B").duration_days(&cal), 0);
    }

    #[test]
    fn task_record_deserializes_with_defaults() {
        let record: TaskRecord =
            serde_json::from_str(r#"{"id": 7, "project_id": 3, "estimated_duration": 4}"#).unwrap();
        assert_eq!(record.id, TaskId(7));
        assert_eq!(record.progress_percentage, 0);
        assert_eq!(record.display_order, 0);
        assert!(record.parent_id.is_none());
    }
}
