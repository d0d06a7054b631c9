#![cfg(feature = "http_api")]

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use schedule_engine::{
    DependencyEdge, ProjectMetadata, ProjectSnapshot, TaskRecord, http_api,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_project() -> ProjectSnapshot {
    let mut metadata = ProjectMetadata::new(1, "HTTP Demo");
    metadata.project_start = Some(d(2025, 1, 6));
    let mut project = ProjectSnapshot::new(metadata);
    project
        .add_task(TaskRecord::new(1, 1, "Design").with_duration(5))
        .unwrap();
    project
        .add_task(TaskRecord::new(2, 1, "Build").with_duration(3))
        .unwrap();
    project
        .add_task(TaskRecord::new(3, 1, "Phase").with_duration(2))
        .unwrap();
    project
        .add_task(TaskRecord::new(4, 1, "Sub").with_parent(3).with_progress(20))
        .unwrap();
    project
        .add_dependency(DependencyEdge::finish_to_start(1, 2))
        .unwrap();
    project
}

fn new_router() -> axum::Router {
    http_api::router(http_api::AppState::with_projects([sample_project()]))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(&new_router(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn validate_accepts_dag_and_reports_cycles() {
    let app = new_router();
    let tasks = json!([
        {"id": 1, "project_id": 1},
        {"id": 2, "project_id": 1},
        {"id": 3, "project_id": 1}
    ]);

    let (status, body) = send(
        &app,
        "POST",
        "/validate",
        Some(json!({
            "tasks": tasks,
            "edges": [{"predecessor_id": 1, "successor_id": 2}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"task_count": 3, "edge_count": 1}));

    let (status, body) = send(
        &app,
        "POST",
        "/validate",
        Some(json!({
            "tasks": tasks,
            "edges": [
                {"predecessor_id": 1, "successor_id": 2},
                {"predecessor_id": 2, "successor_id": 3, "type": "START_TO_START"},
                {"predecessor_id": 3, "successor_id": 1}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "dependency_conflict");
    assert_eq!(body["cycle"], json!([1, 2, 3]));
}

#[tokio::test]
async fn critical_path_endpoint_computes_dates() {
    let (status, body) = send(
        &new_router(),
        "POST",
        "/critical-path",
        Some(json!({
            "tasks": [
                {"id": 1, "project_id": 1, "estimated_duration": 5},
                {"id": 2, "project_id": 1, "estimated_duration": 3},
                {"id": 3, "project_id": 1, "estimated_duration": 2}
            ],
            "edges": [
                {"predecessor_id": 1, "successor_id": 2},
                {"predecessor_id": 2, "successor_id": 3}
            ],
            "project_start": "2025-01-06"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_finish"], "2025-01-17");
    assert_eq!(body["total_duration"], 10);
    assert_eq!(body["critical_task_ids"], json!([1, 2, 3]));
    assert_eq!(body["per_task"]["2"]["earliest_start"], "2025-01-13");
}

#[tokio::test]
async fn auto_schedule_without_start_is_unprocessable() {
    let (status, body) = send(
        &new_router(),
        "POST",
        "/auto-schedule",
        Some(json!({
            "tasks": [{"id": 1, "project_id": 1, "estimated_duration": 2}],
            "mode": "asapForward"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unprocessable");
}

#[tokio::test]
async fn progress_endpoint_averages_children() {
    let (status, body) = send(
        &new_router(),
        "POST",
        "/progress",
        Some(json!({
            "task": {"id": 1, "project_id": 1},
            "children": [
                {"id": 2, "project_id": 1, "progress_percentage": 40},
                {"id": 3, "project_id": 1, "progress_percentage": 60}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"task_id": 1, "progress_percentage": 50}));
}

#[tokio::test]
async fn cyclic_dependency_is_rejected_with_conflict() {
    let app = new_router();
    let (status, body) = send(
        &app,
        "POST",
        "/projects/1/dependencies",
        Some(json!({"predecessor_id": 2, "successor_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["cycle"], json!([1, 2]));

    // the stored project keeps its single edge
    let (_, project) = send(&app, "GET", "/projects/1", None).await;
    assert_eq!(project["edges"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/projects/1/dependencies",
        Some(json!({"predecessor_id": 2, "successor_id": 3, "type": "FINISH_TO_FINISH", "lag_days": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "FINISH_TO_FINISH");

    let (status, body) = send(
        &app,
        "POST",
        "/projects/1/dependencies",
        Some(json!({"predecessor_id": 3, "successor_id": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.get("cycle").is_none());
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let app = new_router();
    let (status, body) = send(&app, "GET", "/projects/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(&app, "GET", "/projects/99/critical-path", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_auto_schedule_applies_changes() {
    let app = new_router();
    let (status, body) = send(&app, "POST", "/projects/1/auto-schedule", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "asapForward");
    assert_eq!(body["changes"].as_array().unwrap().len(), 4);

    let (_, project) = send(&app, "GET", "/projects/1", None).await;
    let build = project["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == 2)
        .unwrap();
    assert_eq!(build["start_date"], "2025-01-13");
    assert_eq!(build["due_date"], "2025-01-15");

    let (status, body) = send(
        &app,
        "POST",
        "/projects/1/auto-schedule",
        Some(json!({"mode": "asapForward"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], json!([]));
}

#[tokio::test]
async fn project_progress_rolls_up() {
    let app = new_router();
    let (status, body) = send(
        &app,
        "POST",
        "/projects/1/progress",
        Some(json!({"task_id": 4, "progress_percentage": 90})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"task_id": 4, "old": 20, "new": 90},
            {"task_id": 3, "old": 0, "new": 90}
        ])
    );

    let (status, body) = send(
        &app,
        "POST",
        "/projects/1/progress",
        Some(json!({"task_id": 3, "progress_percentage": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unprocessable");

    let (status, _) = send(
        &app,
        "POST",
        "/projects/1/progress",
        Some(json!({"task_id": 8, "progress_percentage": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_project_rejects_mismatched_id() {
    let app = new_router();
    let snapshot = ProjectSnapshot::new(ProjectMetadata::new(5, "Other"));
    let (status, body) = send(
        &app,
        "PUT",
        "/projects/6",
        Some(serde_json::to_value(&snapshot).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = send(
        &app,
        "PUT",
        "/projects/5",
        Some(serde_json::to_value(&snapshot).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", "/projects/5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["name"], "Other");
}
