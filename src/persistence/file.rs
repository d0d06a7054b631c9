use super::{PersistenceError, PersistenceResult, validate_snapshot};
use crate::calendar::WorkCalendarConfig;
use crate::dependency::{DependencyEdge, DependencyType};
use crate::project::{ProjectMetadata, ProjectSnapshot};
use crate::task::{TaskId, TaskRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &ProjectSnapshot,
    path: P,
) -> PersistenceResult<()> {
    validate_snapshot(snapshot)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<ProjectSnapshot> {
    let file = File::open(path)?;
    let snapshot: ProjectSnapshot = serde_json::from_reader(file)?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

const PROJECT_ROW: &str = "project";
const TASK_ROW: &str = "task";
const EDGE_ROW: &str = "edge";

/// One CSV row; `record_type` decides which columns are meaningful.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotCsvRecord {
    record_type: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    due_date: String,
    #[serde(default)]
    estimated_duration: String,
    #[serde(default)]
    progress_percentage: String,
    #[serde(default)]
    assignee_id: String,
    #[serde(default)]
    display_order: String,
    #[serde(default)]
    predecessor_id: String,
    #[serde(default)]
    successor_id: String,
    #[serde(default, rename = "type")]
    dependency_type: String,
    #[serde(default)]
    lag_days: String,
    #[serde(default)]
    metadata_json: String,
    #[serde(default)]
    calendar_json: String,
}

impl SnapshotCsvRecord {
    fn project_row(snapshot: &ProjectSnapshot) -> PersistenceResult<Self> {
        Ok(Self {
            record_type: PROJECT_ROW.to_string(),
            id: snapshot.project_id().to_string(),
            name: snapshot.metadata.name.clone(),
            metadata_json: serde_json::to_string(&snapshot.metadata)?,
            calendar_json: serde_json::to_string(&snapshot.calendar)?,
            ..Self::default()
        })
    }

    fn task_row(task: &TaskRecord) -> Self {
        Self {
            record_type: TASK_ROW.to_string(),
            id: task.id.to_string(),
            name: task.name.clone(),
            parent_id: format_option(task.parent_id),
            start_date: format_date(task.start_date),
            due_date: format_date(task.due_date),
            estimated_duration: format_option(task.estimated_duration),
            progress_percentage: task.progress_percentage.to_string(),
            assignee_id: task.assignee_id.clone().unwrap_or_default(),
            display_order: task.display_order.to_string(),
            ..Self::default()
        }
    }

    fn edge_row(edge: &DependencyEdge) -> Self {
        Self {
            record_type: EDGE_ROW.to_string(),
            predecessor_id: edge.predecessor_id.to_string(),
            successor_id: edge.successor_id.to_string(),
            dependency_type: edge.dependency_type.to_string(),
            lag_days: edge.lag.to_string(),
            ..Self::default()
        }
    }

    fn into_task(self, metadata: &ProjectMetadata) -> PersistenceResult<TaskRecord> {
        let id = parse_i64(&self.id)?
            .ok_or_else(|| PersistenceError::InvalidData("task row without id".into()))?;
        let mut task = TaskRecord::new(id, metadata.project_id, self.name);
        task.parent_id = parse_i64(&self.parent_id)?.map(TaskId);
        task.start_date = parse_date(&self.start_date)?;
        task.due_date = parse_date(&self.due_date)?;
        task.estimated_duration = parse_i64(&self.estimated_duration)?;
        task.progress_percentage = match self.progress_percentage.trim() {
            "" => 0,
            raw => raw.parse::<u8>().map_err(|e| {
                PersistenceError::InvalidData(format!("invalid progress '{raw}': {e}"))
            })?,
        };
        task.assignee_id = parse_string_option(self.assignee_id);
        task.display_order = parse_i64(&self.display_order)?.unwrap_or(0);
        Ok(task)
    }

    fn into_edge(self) -> PersistenceResult<DependencyEdge> {
        let predecessor = parse_i64(&self.predecessor_id)?
            .ok_or_else(|| PersistenceError::InvalidData("edge row without predecessor".into()))?;
        let successor = parse_i64(&self.successor_id)?
            .ok_or_else(|| PersistenceError::InvalidData("edge row without successor".into()))?;
        let dependency_type = if self.dependency_type.trim().is_empty() {
            DependencyType::default()
        } else {
            self.dependency_type
                .parse::<DependencyType>()
                .map_err(PersistenceError::InvalidData)?
        };
        let lag = parse_i64(&self.lag_days)?.unwrap_or(0);
        Ok(DependencyEdge::new(predecessor, successor, dependency_type, lag))
    }
}

pub fn save_snapshot_to_csv<P: AsRef<Path>>(
    snapshot: &ProjectSnapshot,
    path: P,
) -> PersistenceResult<()> {
    validate_snapshot(snapshot)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.serialize(SnapshotCsvRecord::project_row(snapshot)?)?;
    for task in &snapshot.tasks {
        writer.serialize(SnapshotCsvRecord::task_row(task))?;
    }
    for edge in &snapshot.edges {
        writer.serialize(SnapshotCsvRecord::edge_row(edge))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_snapshot_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<ProjectSnapshot> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut metadata: Option<ProjectMetadata> = None;
    let mut calendar: Option<WorkCalendarConfig> = None;
    let mut task_rows = Vec::new();
    let mut edges = Vec::new();
    for record in reader.deserialize::<SnapshotCsvRecord>() {
        let record = record?;
        match record.record_type.trim() {
            PROJECT_ROW => {
                if metadata.is_some() {
                    return Err(PersistenceError::InvalidData(
                        "CSV file contained multiple project rows".into(),
                    ));
                }
                metadata = Some(serde_json::from_str(&record.metadata_json).map_err(|err| {
                    PersistenceError::InvalidData(format!("invalid metadata json: {err}"))
                })?);
                if !record.calendar_json.trim().is_empty() {
                    calendar = Some(serde_json::from_str(&record.calendar_json).map_err(|err| {
                        PersistenceError::InvalidData(format!("invalid calendar json: {err}"))
                    })?);
                }
            }
            TASK_ROW => task_rows.push(record),
            EDGE_ROW => edges.push(record.into_edge()?),
            other => {
                return Err(PersistenceError::InvalidData(format!(
                    "unknown record_type '{other}'"
                )));
            }
        }
    }

    let metadata = metadata.ok_or_else(|| {
        PersistenceError::InvalidData("CSV file contained no project row".into())
    })?;
    let tasks = task_rows
        .into_iter()
        .map(|row| row.into_task(&metadata))
        .collect::<PersistenceResult<Vec<_>>>()?;

    let snapshot = ProjectSnapshot {
        metadata,
        calendar: calendar.unwrap_or_default(),
        tasks,
        edges,
    };
    validate_snapshot(&snapshot)?;
    debug!(
        project = %snapshot.project_id(),
        tasks = snapshot.tasks.len(),
        edges = snapshot.edges.len(),
        "snapshot loaded from csv"
    );
    Ok(snapshot)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(input: &str) -> PersistenceResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn format_option<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_i64(input: &str) -> PersistenceResult<Option<i64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid integer '{input}': {e}")))
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
