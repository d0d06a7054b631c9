use crate::task::{TaskId, TaskRecord};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    #[error("duplicate task id {0}")]
    DuplicateId(TaskId),
    #[error("task {task} has negative duration {duration}")]
    NegativeDuration { task: TaskId, duration: i64 },
    #[error("task {task} has progress_percentage {value} (must be between 0 and 100)")]
    ProgressOutOfRange { task: TaskId, value: u8 },
    #[error("task {task} has due date {due} before start date {start}")]
    DueBeforeStart {
        task: TaskId,
        start: chrono::NaiveDate,
        due: chrono::NaiveDate,
    },
    #[error("task {0} cannot be its own parent")]
    SelfParent(TaskId),
    #[error("task {0} has an empty assignee_id")]
    EmptyAssignee(TaskId),
}

pub fn validate_task(task: &TaskRecord) -> Result<(), TaskValidationError> {
    if let Some(duration) = task.estimated_duration {
        if duration < 0 {
            return Err(TaskValidationError::NegativeDuration {
                task: task.id,
                duration,
            });
        }
    }

    if task.progress_percentage > 100 {
        return Err(TaskValidationError::ProgressOutOfRange {
            task: task.id,
            value: task.progress_percentage,
        });
    }

    if let (Some(start), Some(due)) = (task.start_date, task.due_date) {
        if due < start {
            return Err(TaskValidationError::DueBeforeStart {
                task: task.id,
                start,
                due,
            });
        }
    }

    if task.parent_id == Some(task.id) {
        return Err(TaskValidationError::SelfParent(task.id));
    }

    if let Some(assignee) = &task.assignee_id {
        if assignee.trim().is_empty() {
            return Err(TaskValidationError::EmptyAssignee(task.id));
        }
    }

    Ok(())
}

pub fn validate_task_collection(tasks: &[TaskRecord]) -> Result<(), TaskValidationError> {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen_ids.insert(task.id) {
            return Err(TaskValidationError::DuplicateId(task.id));
        }
        validate_task(task)?;
    }
    Ok(())
}
