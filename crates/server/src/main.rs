use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use serde_json::Value;
use server_api::{
    assign_role, create_record, delete_record, list_records, update_record, ApiContext,
};
use shared::{
    domain::{EntityKind, RecordId},
    error::{ApiError, ErrorCode},
    protocol::{Patch, RoleAssignment},
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/:kind", get(http_list).post(http_create))
        .route("/api/:kind/:id", patch(http_update).delete(http_delete))
        .route("/api/:kind/:id/role", put(http_assign_role))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        error!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn http_list(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Value>>, HttpError> {
    let kind = parse_kind(&kind)?;
    let records = list_records(&state.api, kind).await.map_err(reject)?;
    Ok(Json(records))
}

async fn http_create(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), HttpError> {
    let kind = parse_kind(&kind)?;
    let record = create_record(&state.api, kind, body)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn http_update(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Json(patch): Json<Patch>,
) -> Result<Json<Value>, HttpError> {
    let kind = parse_kind(&kind)?;
    let record = update_record(&state.api, kind, &RecordId(id), patch)
        .await
        .map_err(reject)?;
    Ok(Json(record))
}

async fn http_delete(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, HttpError> {
    let kind = parse_kind(&kind)?;
    delete_record(&state.api, kind, &RecordId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_assign_role(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Json(req): Json<RoleAssignment>,
) -> Result<Json<Value>, HttpError> {
    let kind = parse_kind(&kind)?;
    let record = assign_role(&state.api, kind, &RecordId(id), req.role)
        .await
        .map_err(reject)?;
    Ok(Json(record))
}

fn parse_kind(raw: &str) -> Result<EntityKind, HttpError> {
    raw.parse::<EntityKind>()
        .map_err(|e| reject(ApiError::not_found(e.to_string())))
}

fn reject(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
