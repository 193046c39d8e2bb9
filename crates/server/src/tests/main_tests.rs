use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::json;
use tower::ServiceExt;

async fn test_app() -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    build_router(Arc::new(AppState {
        api: ApiContext { storage },
    }))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn create_list_update_delete_round_trip() {
    let app = test_app().await;

    let create = json_request(
        "POST",
        "/api/tasks",
        json!({ "id": "t1", "title": "Ship release", "status": "todo", "priority": "high" }),
    );
    let response = app.clone().oneshot(create).await.expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    let update = json_request("PATCH", "/api/tasks/t1", json!({ "status": "completed" }));
    let response = app.clone().oneshot(update).await.expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], json!("completed"));

    let list = Request::get("/api/tasks").body(Body::empty()).expect("request");
    let response = app.clone().oneshot(list).await.expect("list");
    assert_eq!(response.status(), StatusCode::OK);
    let tasks = json_body(response).await;
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));

    let delete = Request::delete("/api/tasks/t1")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(delete).await.expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let delete_again = Request::delete("/api/tasks/t1")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(delete_again).await.expect("delete again");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = serde_json::from_value(json_body(response).await).expect("api error");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn unknown_kind_is_not_found() {
    let app = test_app().await;
    let request = Request::get("/api/widgets")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_route_maps_validation_and_conflict_statuses() {
    let app = test_app().await;
    let user = json!({
        "id": "u1",
        "name": "ada",
        "email": "ada@example.com",
        "role": "employee",
        "status": "active",
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/users", user.clone()))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/users", user))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/users/u1/role", json!({ "role": "admin" })))
        .await
        .expect("assign");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["role"], json!("admin"));

    let response = app
        .oneshot(json_request("PUT", "/api/teams/u1/role", json!({ "role": "admin" })))
        .await
        .expect("teams");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
