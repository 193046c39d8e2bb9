use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, Role};

/// Top-level fields to replace on a stored record.
pub type Patch = serde_json::Map<String, serde_json::Value>;

/// Free-form parameters handed to a bulk action (`role`, `assignee_id`, `status`).
pub type BulkParams = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
}

/// Aggregate outcome of one bulk invocation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkActionResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub failed_ids: Vec<RecordId>,
}

impl BulkActionResult {
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0
    }

    pub fn is_total_failure(&self) -> bool {
        self.success_count == 0 && self.failure_count > 0
    }
}
