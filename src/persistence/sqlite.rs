use super::{PersistenceError, PersistenceResult, SnapshotStore, validate_snapshot};
use crate::auto_schedule::Change;
use crate::calendar::WorkCalendarConfig;
use crate::dependency::{DependencyEdge, DependencyType};
use crate::project::{ProjectMetadata, ProjectSnapshot};
use crate::task::{ProjectId, TaskRecord};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Snapshot store over one SQLite database holding any number of projects.
pub struct SqliteSnapshotStore {
    connection: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                metadata_json TEXT NOT NULL,
                calendar_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                id INTEGER NOT NULL,
                task_json TEXT NOT NULL,
                PRIMARY KEY (project_id, id)
            );
            CREATE TABLE IF NOT EXISTS dependencies (
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                seq INTEGER NOT NULL,
                predecessor_id INTEGER NOT NULL,
                successor_id INTEGER NOT NULL,
                dependency_type TEXT NOT NULL,
                lag_days INTEGER NOT NULL,
                PRIMARY KEY (project_id, seq)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)
    }

    fn write_snapshot(tx: &Transaction, snapshot: &ProjectSnapshot) -> PersistenceResult<()> {
        let project_id = snapshot.project_id().0;
        tx.execute("DELETE FROM dependencies WHERE project_id = ?1", params![project_id])?;
        tx.execute("DELETE FROM tasks WHERE project_id = ?1", params![project_id])?;
        tx.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        tx.execute(
            "INSERT INTO projects (id, metadata_json, calendar_json) VALUES (?1, ?2, ?3)",
            params![
                project_id,
                serde_json::to_string(&snapshot.metadata)?,
                serde_json::to_string(&snapshot.calendar)?
            ],
        )?;

        let mut stmt =
            tx.prepare("INSERT INTO tasks (project_id, id, task_json) VALUES (?1, ?2, ?3)")?;
        for task in &snapshot.tasks {
            stmt.execute(params![project_id, task.id.0, serde_json::to_string(task)?])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO dependencies (project_id, seq, predecessor_id, successor_id, dependency_type, lag_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (seq, edge) in snapshot.edges.iter().enumerate() {
            stmt.execute(params![
                project_id,
                seq as i64,
                edge.predecessor_id.0,
                edge.successor_id.0,
                edge.dependency_type.as_str(),
                edge.lag
            ])?;
        }
        Ok(())
    }

    fn read_snapshot(
        conn: &Connection,
        project_id: ProjectId,
    ) -> PersistenceResult<Option<ProjectSnapshot>> {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT metadata_json, calendar_json FROM projects WHERE id = ?1",
                params![project_id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((metadata_json, calendar_json)) = row else {
            return Ok(None);
        };
        let metadata: ProjectMetadata = serde_json::from_str(&metadata_json)?;
        let calendar: WorkCalendarConfig = serde_json::from_str(&calendar_json)?;

        let mut stmt =
            conn.prepare("SELECT task_json FROM tasks WHERE project_id = ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![project_id.0], |row| row.get::<_, String>(0))?;
        let mut tasks = Vec::new();
        for json in rows {
            let task: TaskRecord = serde_json::from_str(&json?)?;
            tasks.push(task);
        }

        let mut stmt = conn.prepare(
            "SELECT predecessor_id, successor_id, dependency_type, lag_days
             FROM dependencies WHERE project_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![project_id.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (pred, succ, kind, lag) = row?;
            let kind = kind
                .parse::<DependencyType>()
                .map_err(PersistenceError::InvalidData)?;
            edges.push(DependencyEdge::new(pred, succ, kind, lag));
        }

        let snapshot = ProjectSnapshot {
            metadata,
            calendar,
            tasks,
            edges,
        };
        validate_snapshot(&snapshot)?;
        Ok(Some(snapshot))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save_snapshot(&self, snapshot: &ProjectSnapshot) -> PersistenceResult<()> {
        validate_snapshot(snapshot)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::write_snapshot(&tx, snapshot)?;
        tx.commit()?;
        debug!(project = %snapshot.project_id(), "snapshot saved to sqlite");
        Ok(())
    }

    fn load_snapshot(&self, project_id: ProjectId) -> PersistenceResult<Option<ProjectSnapshot>> {
        let conn = self.lock()?;
        Self::read_snapshot(&conn, project_id)
    }

    fn list_projects(&self) -> PersistenceResult<Vec<ProjectId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM projects ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(ProjectId(id?));
        }
        Ok(ids)
    }

    /// All changes land in one transaction, or none do.
    fn apply_changes(&self, project_id: ProjectId, changes: &[Change]) -> PersistenceResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut applied = 0;
        {
            let mut select =
                tx.prepare("SELECT task_json FROM tasks WHERE project_id = ?1 AND id = ?2")?;
            let mut update =
                tx.prepare("UPDATE tasks SET task_json = ?3 WHERE project_id = ?1 AND id = ?2")?;
            for change in changes {
                let json: Option<String> = select
                    .query_row(params![project_id.0, change.task_id.0], |row| row.get(0))
                    .optional()?;
                let Some(json) = json else {
                    continue;
                };
                let mut task: TaskRecord = serde_json::from_str(&json)?;
                change.apply_to(&mut task);
                update.execute(params![
                    project_id.0,
                    change.task_id.0,
                    serde_json::to_string(&task)?
                ])?;
                applied += 1;
            }
        }
        tx.commit()?;
        info!(project = %project_id, applied, "schedule changes persisted");
        Ok(applied)
    }

    /// Validates the edge against the stored graph and appends it in the same transaction.
    fn add_dependency(&self, project_id: ProjectId, edge: DependencyEdge) -> PersistenceResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut snapshot =
            Self::read_snapshot(&tx, project_id)?.ok_or(PersistenceError::NotFound(project_id))?;
        snapshot.add_dependency(edge.clone())?;
        tx.execute(
            "INSERT INTO dependencies (project_id, seq, predecessor_id, successor_id, dependency_type, lag_days)
             VALUES (?1, (SELECT COALESCE(MAX(seq), -1) + 1 FROM dependencies WHERE project_id = ?1), ?2, ?3, ?4, ?5)",
            params![
                project_id.0,
                edge.predecessor_id.0,
                edge.successor_id.0,
                edge.dependency_type.as_str(),
                edge.lag
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}
