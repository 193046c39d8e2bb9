use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use shared::{domain::Task, protocol::BulkParams};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;
use crate::{bulk::DELETE, test_support::ids, BulkExecutor};

type Rows = Arc<Mutex<Vec<Value>>>;

fn seed() -> Vec<Value> {
    (1..=3)
        .map(|n| {
            json!({
                "id": format!("t{n}"),
                "title": format!("Task {n}"),
                "status": "todo",
                "priority": "medium",
                "created_at": "2024-01-01T09:00:00Z",
            })
        })
        .collect()
}

fn missing(id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::not_found(format!("task {id} not found"))),
    )
}

async fn list(State(rows): State<Rows>) -> Json<Vec<Value>> {
    Json(rows.lock().await.clone())
}

async fn update(
    State(rows): State<Rows>,
    Path(id): Path<String>,
    Json(patch): Json<Patch>,
) -> Result<Json<Value>, (StatusCode, Json<ApiError>)> {
    let mut rows = rows.lock().await;
    let row = rows
        .iter_mut()
        .find(|row| row["id"] == id.as_str())
        .ok_or_else(|| missing(&id))?;
    if let Value::Object(fields) = row {
        fields.extend(patch);
    }
    Ok(Json(row.clone()))
}

async fn delete(
    State(rows): State<Rows>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let mut rows = rows.lock().await;
    let before = rows.len();
    rows.retain(|row| row["id"] != id.as_str());
    if rows.len() == before {
        return Err(missing(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn spawn_stub() -> (String, Rows) {
    let rows: Rows = Arc::new(Mutex::new(seed()));
    let app = Router::new()
        .route("/api/tasks", get(list))
        .route("/api/tasks/:id", axum::routing::patch(update).delete(delete))
        .with_state(rows.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    (format!("http://{addr}"), rows)
}

#[tokio::test]
async fn lists_and_updates_over_http() {
    let (url, rows) = spawn_stub().await;
    let service = HttpRecordService::<Task>::new(&url).expect("service");

    let tasks = service.list().await.expect("list");
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].title, "Task 1");

    let mut patch = Patch::new();
    patch.insert("status".into(), json!("completed"));
    let updated = service
        .update(&RecordId::from("t2"), patch)
        .await
        .expect("update");
    assert_eq!(updated.status, shared::domain::TaskStatus::Completed);
    assert_eq!(rows.lock().await[1]["status"], "completed");
}

#[tokio::test]
async fn error_envelope_becomes_api_exception() {
    let (url, _) = spawn_stub().await;
    let service = HttpRecordService::<Task>::new(&url).expect("service");

    let err = service
        .delete(&RecordId::from("ghost"))
        .await
        .expect_err("missing record");
    let exception = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(exception.code, ErrorCode::NotFound);
    assert_eq!(exception.message, "task ghost not found");
}

#[tokio::test]
async fn unknown_route_falls_back_to_status_code() {
    let (url, _) = spawn_stub().await;
    let service = HttpRecordService::<shared::domain::User>::new(&url).expect("service");

    let err = service.list().await.expect_err("no users route");
    let exception = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(exception.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn role_assignment_is_refused_for_tasks_without_a_request() {
    let service = HttpRecordService::<Task>::new("http://127.0.0.1:9").expect("service");
    let err = service
        .assign_role(&RecordId::from("t1"), Role::Admin)
        .await
        .expect_err("tasks have no roles");
    assert!(err.to_string().contains("role assignment"));
}

#[test]
fn rejects_unusable_server_urls() {
    assert!(HttpRecordService::<Task>::new("not a url").is_err());
    assert!(HttpRecordService::<Task>::new("mailto:ops@example.com").is_err());
}

#[tokio::test]
async fn bulk_delete_reports_partial_failure_end_to_end() {
    let (url, rows) = spawn_stub().await;
    let service = Arc::new(HttpRecordService::<Task>::new(&url).expect("service"));
    let executor = BulkExecutor::new(service);

    let result = executor
        .execute(DELETE, &ids(&["t1", "ghost", "t3"]), &BulkParams::new())
        .await
        .expect("bulk delete");

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_ids, ids(&["ghost"]));
    let remaining: Vec<Value> = rows.lock().await.clone();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "t2");
}
