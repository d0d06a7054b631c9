use crate::auto_schedule::Change;
use crate::calendar::CalendarError;
use crate::dependency::DependencyEdge;
use crate::error::ScheduleError;
use crate::project::ProjectSnapshot;
use crate::task::ProjectId;
use crate::task_validation::TaskValidationError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid task: {0}")]
    InvalidTask(#[from] TaskValidationError),
    #[error("invalid calendar: {0}")]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("project {0} is not stored")]
    NotFound(ProjectId),
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Storage of whole project snapshots.
///
/// The provided `apply_changes` and `add_dependency` are load-modify-save; stores that can do
/// better (a transaction, a row update) override them.
pub trait SnapshotStore {
    fn save_snapshot(&self, snapshot: &ProjectSnapshot) -> PersistenceResult<()>;
    fn load_snapshot(&self, project_id: ProjectId) -> PersistenceResult<Option<ProjectSnapshot>>;
    fn list_projects(&self) -> PersistenceResult<Vec<ProjectId>>;

    fn apply_changes(&self, project_id: ProjectId, changes: &[Change]) -> PersistenceResult<usize> {
        let mut snapshot = self
            .load_snapshot(project_id)?
            .ok_or(PersistenceError::NotFound(project_id))?;
        let applied = snapshot.apply_changes(changes);
        self.save_snapshot(&snapshot)?;
        Ok(applied)
    }

    fn add_dependency(&self, project_id: ProjectId, edge: DependencyEdge) -> PersistenceResult<()> {
        let mut snapshot = self
            .load_snapshot(project_id)?
            .ok_or(PersistenceError::NotFound(project_id))?;
        snapshot.add_dependency(edge)?;
        self.save_snapshot(&snapshot)
    }
}

/// Checks every snapshot passes before it is written or handed out.
pub fn validate_snapshot(snapshot: &ProjectSnapshot) -> PersistenceResult<()> {
    snapshot.validate_tasks()?;
    snapshot.calendar()?;
    if let Some(task) = snapshot
        .tasks
        .iter()
        .find(|t| t.project_id != snapshot.project_id())
    {
        return Err(PersistenceError::InvalidData(format!(
            "task {} belongs to project {}, not {}",
            task.id,
            task.project_id,
            snapshot.project_id()
        )));
    }
    Ok(())
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_snapshot_from_csv, load_snapshot_from_json, save_snapshot_to_csv, save_snapshot_to_json,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSnapshotStore;
