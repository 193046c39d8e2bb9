use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use shared::{
    domain::{ActivityStatus, RecordId, Role, UnknownKey},
    protocol::{BulkActionResult, BulkParams, Patch},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{error::BulkError, service::RecordService};

pub const DELETE: &str = "delete";
pub const ACTIVATE: &str = "activate";
pub const DEACTIVATE: &str = "deactivate";
pub const ROLE_CHANGE: &str = "role_change";
pub const REASSIGN: &str = "reassign";
pub const SET_STATUS: &str = "set_status";

/// One entry of the bulk dispatch table: how a single record is handled.
#[async_trait]
pub trait BulkHandler<S: RecordService + ?Sized>: Send + Sync {
    /// Checked once before any record is touched.
    fn validate(&self, _action: &str, _params: &BulkParams) -> Result<(), BulkError> {
        Ok(())
    }

    /// Destructive actions must be confirmed by the caller.
    fn is_destructive(&self) -> bool {
        false
    }

    async fn apply(&self, service: &S, id: &RecordId, params: &BulkParams) -> anyhow::Result<()>;
}

pub struct DeleteRecords;

#[async_trait]
impl<S: RecordService + ?Sized> BulkHandler<S> for DeleteRecords {
    fn is_destructive(&self) -> bool {
        true
    }

    async fn apply(&self, service: &S, id: &RecordId, _params: &BulkParams) -> anyhow::Result<()> {
        service.delete(id).await
    }
}

/// Writes a fixed `status` value, e.g. `activate` / `deactivate`.
pub struct SetFixedStatus(pub &'static str);

#[async_trait]
impl<S: RecordService + ?Sized> BulkHandler<S> for SetFixedStatus {
    async fn apply(&self, service: &S, id: &RecordId, _params: &BulkParams) -> anyhow::Result<()> {
        service
            .update(id, field_patch("status", Value::from(self.0)))
            .await
            .map(|_| ())
    }
}

/// Writes the `status` parameter.
pub struct SetStatusParam;

#[async_trait]
impl<S: RecordService + ?Sized> BulkHandler<S> for SetStatusParam {
    fn validate(&self, action: &str, params: &BulkParams) -> Result<(), BulkError> {
        required_str(action, params, "status").map(|_| ())
    }

    async fn apply(&self, service: &S, id: &RecordId, params: &BulkParams) -> anyhow::Result<()> {
        let status = params
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("missing status"))?;
        service
            .update(id, field_patch("status", Value::from(status)))
            .await
            .map(|_| ())
    }
}

pub struct ChangeRole;

#[async_trait]
impl<S: RecordService + ?Sized> BulkHandler<S> for ChangeRole {
    fn validate(&self, action: &str, params: &BulkParams) -> Result<(), BulkError> {
        parse_role(action, params).map(|_| ())
    }

    async fn apply(&self, service: &S, id: &RecordId, params: &BulkParams) -> anyhow::Result<()> {
        let role = parse_role(ROLE_CHANGE, params)?;
        service.assign_role(id, role).await
    }
}

/// Moves records to the `assignee_id` parameter.
pub struct Reassign;

#[async_trait]
impl<S: RecordService + ?Sized> BulkHandler<S> for Reassign {
    fn validate(&self, action: &str, params: &BulkParams) -> Result<(), BulkError> {
        required_str(action, params, "assignee_id").map(|_| ())
    }

    async fn apply(&self, service: &S, id: &RecordId, params: &BulkParams) -> anyhow::Result<()> {
        let assignee = params
            .get("assignee_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("missing assignee_id"))?;
        service
            .update(id, field_patch("assignee_id", Value::from(assignee)))
            .await
            .map(|_| ())
    }
}

fn field_patch(field: &str, value: Value) -> Patch {
    let mut patch = Patch::new();
    patch.insert(field.to_string(), value);
    patch
}

fn required_str<'p>(
    action: &str,
    params: &'p BulkParams,
    param: &'static str,
) -> Result<&'p str, BulkError> {
    match params.get(param) {
        None | Some(Value::Null) => Err(BulkError::MissingParam {
            action: action.to_string(),
            param,
        }),
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(BulkError::InvalidParam {
            action: action.to_string(),
            param,
            reason: "expected a non-empty string".into(),
        }),
    }
}

fn parse_role(action: &str, params: &BulkParams) -> Result<Role, BulkError> {
    required_str(action, params, "role")?
        .parse()
        .map_err(|e: UnknownKey| BulkError::InvalidParam {
            action: action.to_string(),
            param: "role",
            reason: e.to_string(),
        })
}

/// Fans an action out to every id through a per-record dispatch table.
///
/// Records are independent: each call runs concurrently, one failure never
/// aborts the others, and nothing is rolled back. The result is produced
/// only once every call has settled. At most one action runs at a time.
pub struct BulkExecutor<S: RecordService> {
    service: Arc<S>,
    handlers: HashMap<String, Arc<dyn BulkHandler<S>>>,
    running: Mutex<()>,
}

impl<S: RecordService + 'static> BulkExecutor<S> {
    /// Executor with the standard actions registered.
    pub fn new(service: Arc<S>) -> Self {
        let mut executor = Self::empty(service);
        executor
            .register(DELETE, DeleteRecords)
            .register(ACTIVATE, SetFixedStatus(ActivityStatus::Active.as_str()))
            .register(DEACTIVATE, SetFixedStatus(ActivityStatus::Inactive.as_str()))
            .register(ROLE_CHANGE, ChangeRole)
            .register(REASSIGN, Reassign)
            .register(SET_STATUS, SetStatusParam);
        executor
    }

    pub fn empty(service: Arc<S>) -> Self {
        Self {
            service,
            handlers: HashMap::new(),
            running: Mutex::new(()),
        }
    }

    /// Adds or replaces the handler for `action`.
    pub fn register(
        &mut self,
        action: impl Into<String>,
        handler: impl BulkHandler<S> + 'static,
    ) -> &mut Self {
        self.handlers.insert(action.into(), Arc::new(handler));
        self
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    pub fn is_destructive(&self, action: &str) -> Result<bool, BulkError> {
        self.handler(action).map(|handler| handler.is_destructive())
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    fn handler(&self, action: &str) -> Result<&Arc<dyn BulkHandler<S>>, BulkError> {
        self.handlers
            .get(action)
            .ok_or_else(|| BulkError::UnknownAction(action.to_string()))
    }

    pub async fn execute(
        &self,
        action: &str,
        ids: &[RecordId],
        params: &BulkParams,
    ) -> Result<BulkActionResult, BulkError> {
        let _running = self.running.try_lock().map_err(|_| BulkError::InFlight)?;
        let handler = self.handler(action)?;
        if ids.is_empty() {
            return Err(BulkError::EmptySelection);
        }
        handler.validate(action, params)?;

        info!(action, count = ids.len(), "bulk action started");
        let service = self.service.as_ref();
        let settled = join_all(ids.iter().map(|id| async move {
            let outcome = handler.apply(service, id, params).await;
            (id, outcome)
        }))
        .await;

        let mut result = BulkActionResult::default();
        for (id, outcome) in settled {
            match outcome {
                Ok(()) => result.success_count += 1,
                Err(error) => {
                    warn!(action, %id, %error, "bulk action failed for record");
                    result.failure_count += 1;
                    result.failed_ids.push(id.clone());
                }
            }
        }
        info!(
            action,
            succeeded = result.success_count,
            failed = result.failure_count,
            "bulk action finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
#[path = "tests/bulk_tests.rs"]
mod tests;
