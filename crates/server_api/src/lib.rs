use chrono::Utc;
use serde_json::Value;
use shared::{
    domain::{EntityKind, RecordId, Role},
    error::{ApiError, ErrorCode},
    protocol::Patch,
};
use storage::Storage;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_records(ctx: &ApiContext, kind: EntityKind) -> Result<Vec<Value>, ApiError> {
    let records = ctx.storage.list_records(kind).await.map_err(internal)?;
    Ok(records.into_iter().map(|record| record.body).collect())
}

pub async fn create_record(
    ctx: &ApiContext,
    kind: EntityKind,
    body: Value,
) -> Result<Value, ApiError> {
    let Value::Object(mut fields) = body else {
        return Err(ApiError::validation("record body must be a JSON object"));
    };

    let id = match fields.get("id") {
        None | Some(Value::Null) => RecordId::generate(),
        Some(Value::String(id)) if !id.trim().is_empty() => RecordId::new(id.trim()),
        Some(_) => return Err(ApiError::validation("id must be a non-empty string")),
    };
    fields.insert("id".into(), Value::String(id.0.clone()));
    if matches!(fields.get("created_at"), None | Some(Value::Null)) {
        fields.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    }

    let normalized = normalize(kind, Value::Object(fields))?;
    let inserted = ctx
        .storage
        .insert_record(kind, &id, &normalized)
        .await
        .map_err(internal)?;
    if !inserted {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            format!("{kind}/{id} already exists"),
        ));
    }

    info!(%kind, %id, "record created");
    Ok(normalized)
}

pub async fn update_record(
    ctx: &ApiContext,
    kind: EntityKind,
    id: &RecordId,
    patch: Patch,
) -> Result<Value, ApiError> {
    if let Some(patched_id) = patch.get("id") {
        if patched_id.as_str() != Some(id.as_str()) {
            return Err(ApiError::validation("id is immutable"));
        }
    }

    let stored = ctx
        .storage
        .get_record(kind, id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(kind, id))?;

    let Value::Object(mut fields) = stored.body else {
        return Err(internal(anyhow::anyhow!(
            "stored {kind}/{id} is not a JSON object"
        )));
    };
    fields.extend(patch);

    let normalized = normalize(kind, Value::Object(fields))?;
    let replaced = ctx
        .storage
        .replace_record(kind, id, &normalized)
        .await
        .map_err(internal)?;
    if !replaced {
        return Err(not_found(kind, id));
    }
    Ok(normalized)
}

pub async fn delete_record(ctx: &ApiContext, kind: EntityKind, id: &RecordId) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .delete_record(kind, id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found(kind, id));
    }
    info!(%kind, %id, "record deleted");
    Ok(())
}

pub async fn assign_role(
    ctx: &ApiContext,
    kind: EntityKind,
    id: &RecordId,
    role: Role,
) -> Result<Value, ApiError> {
    if !kind.supports_roles() {
        return Err(ApiError::validation(format!("{kind} do not carry roles")));
    }
    let mut patch = Patch::new();
    patch.insert("role".into(), Value::String(role.as_str().to_string()));
    update_record(ctx, kind, id, patch).await
}

fn normalize(kind: EntityKind, value: Value) -> Result<Value, ApiError> {
    kind.normalize(value)
        .map_err(|e| ApiError::validation(format!("invalid {kind} record: {e}")))
}

fn not_found(kind: EntityKind, id: &RecordId) -> ApiError {
    ApiError::not_found(format!("{kind}/{id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "storage failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
