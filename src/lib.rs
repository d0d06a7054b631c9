//! Dependency-aware scheduling: dependency graphs, cycle validation, Critical Path Method,
//! auto-scheduling onto a working-day calendar and hierarchical progress roll-up.

pub mod auto_schedule;
pub mod calculations;
pub mod calendar;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hierarchy;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod logging;
pub mod persistence;
pub mod project;
pub mod report;
pub mod task;
pub mod task_validation;

pub use auto_schedule::{
    AutoScheduleOutcome, AutoScheduler, Change, ResourceConflict, ScheduleMode, ScheduledTask,
};
pub use calculations::{CpmEngine, CriticalPathReport, ScheduleWarning, TaskTiming};
pub use calendar::{CalendarError, WorkCalendar, WorkCalendarConfig};
pub use dependency::{DependencyEdge, DependencyType};
pub use engine::Acyclic;
pub use error::{CycleError, EdgeError, ScheduleError};
pub use graph::{CycleCheck, DependencyGraph};
pub use hierarchy::{HierarchyError, ProgressTree, ProgressUpdate};
pub use project::{ProjectMetadata, ProjectSnapshot};
pub use task::{ProjectId, TaskId, TaskNode, TaskRecord};
pub use task_validation::TaskValidationError;
