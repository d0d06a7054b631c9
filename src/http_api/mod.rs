use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{
    Acyclic, AutoScheduleOutcome, AutoScheduler, CalendarError, CpmEngine, CriticalPathReport,
    DependencyEdge, DependencyGraph, HierarchyError, ProgressUpdate, ProjectId, ProjectSnapshot, ScheduleError,
    ScheduleMode, TaskId, TaskRecord, WorkCalendar, WorkCalendarConfig, engine,
    persistence::{self, PersistenceError},
};

type SharedProject = Arc<Mutex<ProjectSnapshot>>;

/// Projects held in memory. Each project has its own lock so that "snapshot, compute,
/// persist" never interleaves for one project while different projects proceed in parallel.
#[derive(Clone, Default)]
pub struct AppState {
    projects: Arc<RwLock<HashMap<ProjectId, SharedProject>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: impl IntoIterator<Item = ProjectSnapshot>) -> Self {
        let state = Self::new();
        {
            let mut map = state.projects.write();
            for project in projects {
                map.insert(project.project_id(), Arc::new(Mutex::new(project)));
            }
        }
        state
    }

    fn project(&self, id: ProjectId) -> Result<SharedProject, ApiError> {
        self.projects
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("project {id} not found")))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<Vec<TaskId>>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    /// The request would break the dependency graph; carries the cycle when there is one.
    Conflict(String, Option<Vec<TaskId>>),
    Unprocessable(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<ScheduleError> for ApiError {
    fn from(value: ScheduleError) -> Self {
        if let Some(path) = value.cycle_path() {
            return ApiError::Conflict(value.to_string(), Some(path.to_vec()));
        }
        match value {
            ScheduleError::NotADag { .. } => {
                error!(error = %value, "scheduling invariant violated");
                ApiError::Internal("internal scheduling error".into())
            }
            other => ApiError::Unprocessable(other.to_string()),
        }
    }
}

impl From<HierarchyError> for ApiError {
    fn from(value: HierarchyError) -> Self {
        match value {
            HierarchyError::UnknownTask(_) => ApiError::NotFound(value.to_string()),
            other => ApiError::Unprocessable(other.to_string()),
        }
    }
}

impl From<CalendarError> for ApiError {
    fn from(value: CalendarError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::Schedule(err) => err.into(),
            other => ApiError::Unprocessable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, cycle) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message, None),
            ApiError::Conflict(message, cycle) => {
                (StatusCode::CONFLICT, "dependency_conflict", message, cycle)
            }
            ApiError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable",
                message,
                None,
            ),
            ApiError::Invalid(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message, None)
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                None,
            ),
        };
        let body = Json(ErrorBody {
            error,
            message,
            cycle,
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct GraphPayload {
    tasks: Vec<TaskRecord>,
    #[serde(default)]
    edges: Vec<DependencyEdge>,
}

#[derive(Debug, Deserialize)]
struct CriticalPathPayload {
    tasks: Vec<TaskRecord>,
    #[serde(default)]
    edges: Vec<DependencyEdge>,
    #[serde(default)]
    calendar: WorkCalendarConfig,
    project_start: NaiveDate,
    #[serde(default)]
    deadline: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct AutoSchedulePayload {
    tasks: Vec<TaskRecord>,
    #[serde(default)]
    edges: Vec<DependencyEdge>,
    #[serde(default)]
    calendar: WorkCalendarConfig,
    #[serde(default)]
    mode: ScheduleMode,
    #[serde(default)]
    project_start: Option<NaiveDate>,
    #[serde(default)]
    deadline: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct AggregatePayload {
    task: TaskRecord,
    #[serde(default)]
    children: Vec<TaskRecord>,
}

#[derive(Debug, Deserialize)]
struct ProjectSchedulePayload {
    #[serde(default)]
    mode: ScheduleMode,
}

#[derive(Debug, Deserialize)]
struct SetProgressPayload {
    task_id: TaskId,
    progress_percentage: u8,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/validate", post(validate))
        .route("/critical-path", post(critical_path))
        .route("/auto-schedule", post(auto_schedule))
        .route("/progress", post(aggregate_progress))
        .route("/projects/:id", get(get_project).put(put_project))
        .route("/projects/:id/dependencies", post(add_dependency))
        .route("/projects/:id/critical-path", get(project_critical_path))
        .route("/projects/:id/auto-schedule", post(project_auto_schedule))
        .route("/projects/:id/progress", post(project_set_progress))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "schedule engine HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn validate(Json(payload): Json<GraphPayload>) -> Result<Json<Acyclic>, ApiError> {
    Ok(Json(engine::validate_graph(&payload.tasks, &payload.edges)?))
}

async fn critical_path(
    Json(payload): Json<CriticalPathPayload>,
) -> Result<Json<CriticalPathReport>, ApiError> {
    let calendar = WorkCalendar::try_from_config(&payload.calendar)?;
    let graph = DependencyGraph::from_snapshot(&payload.tasks, &payload.edges, &calendar)?;
    let report = CpmEngine::new(&graph, &calendar)
        .with_deadline(payload.deadline)
        .execute(payload.project_start)?;
    Ok(Json(report))
}

async fn auto_schedule(
    Json(payload): Json<AutoSchedulePayload>,
) -> Result<Json<AutoScheduleOutcome>, ApiError> {
    let calendar = WorkCalendar::try_from_config(&payload.calendar)?;
    let outcome = AutoScheduler::new(&calendar, payload.mode)
        .with_project_start(payload.project_start)
        .with_deadline(payload.deadline)
        .run(&payload.tasks, &payload.edges)?;
    Ok(Json(outcome))
}

async fn aggregate_progress(Json(payload): Json<AggregatePayload>) -> impl IntoResponse {
    let progress = engine::aggregate_progress(&payload.task, &payload.children);
    Json(json!({ "task_id": payload.task.id, "progress_percentage": progress }))
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectSnapshot>, ApiError> {
    let project = state.project(ProjectId(id))?;
    let snapshot = project.lock().clone();
    Ok(Json(snapshot))
}

async fn put_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(snapshot): Json<ProjectSnapshot>,
) -> Result<Json<ProjectSnapshot>, ApiError> {
    if snapshot.project_id() != ProjectId(id) {
        return Err(ApiError::invalid(
            "project id in payload does not match path parameter",
        ));
    }
    persistence::validate_snapshot(&snapshot)?;

    let existing = state.projects.read().get(&ProjectId(id)).cloned();
    match existing {
        Some(project) => *project.lock() = snapshot.clone(),
        None => {
            state
                .projects
                .write()
                .entry(ProjectId(id))
                .or_insert_with(|| Arc::new(Mutex::new(snapshot.clone())));
        }
    }
    Ok(Json(snapshot))
}

async fn add_dependency(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(edge): Json<DependencyEdge>,
) -> Result<(StatusCode, Json<DependencyEdge>), ApiError> {
    let project = state.project(ProjectId(id))?;
    project.lock().add_dependency(edge.clone())?;
    Ok((StatusCode::CREATED, Json(edge)))
}

async fn project_critical_path(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CriticalPathReport>, ApiError> {
    let project = state.project(ProjectId(id))?;
    let report = project.lock().critical_path()?;
    Ok(Json(report))
}

/// Compute and apply under the project's lock.
async fn project_auto_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Option<Json<ProjectSchedulePayload>>,
) -> Result<Json<AutoScheduleOutcome>, ApiError> {
    let mode = payload.map(|Json(p)| p.mode).unwrap_or_default();
    let project = state.project(ProjectId(id))?;
    let outcome = {
        let mut guard = project.lock();
        let outcome = guard.auto_schedule(mode)?;
        guard.apply_changes(&outcome.changes);
        outcome
    };
    Ok(Json(outcome))
}

async fn project_set_progress(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SetProgressPayload>,
) -> Result<Json<Vec<ProgressUpdate>>, ApiError> {
    let project = state.project(ProjectId(id))?;
    let updates = project
        .lock()
        .set_progress(payload.task_id, payload.progress_percentage)?;
    Ok(Json(updates))
}
