use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use shared::{
    domain::{ActivityStatus, Priority, Record, RecordId, Role, Selectable, Task, TaskStatus, User},
    protocol::Patch,
};
use tokio::sync::{Mutex, Notify};

use crate::service::RecordService;

fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::days(offset)
}

pub(crate) fn task(id: &str, title: &str, status: TaskStatus) -> Task {
    Task {
        id: RecordId::from(id),
        title: title.to_string(),
        description: String::new(),
        status,
        priority: Priority::Medium,
        assignee_id: None,
        due_date: None,
        created_at: day(0),
    }
}

/// `t1`..`tN`, titled "Task 1".."Task N", created one day apart.
pub(crate) fn numbered_tasks(count: usize) -> Vec<Task> {
    (1..=count)
        .map(|n| {
            let mut task = task(&format!("t{n}"), &format!("Task {n}"), TaskStatus::Todo);
            task.created_at = day(n as i64);
            task
        })
        .collect()
}

pub(crate) fn user(id: &str, name: &str, role: Role) -> User {
    User {
        id: RecordId::from(id),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
        status: ActivityStatus::Active,
        team_id: None,
        created_at: day(0),
    }
}

pub(crate) fn ids(raw: &[&str]) -> Vec<RecordId> {
    raw.iter().map(|id| RecordId::from(*id)).collect()
}

/// In-memory [`RecordService`] with scripted failures.
pub(crate) struct FakeService<R> {
    records: Mutex<Vec<R>>,
    failing: HashSet<RecordId>,
    list_down: AtomicBool,
    hold: Option<Arc<Notify>>,
    calls: Mutex<Vec<RecordId>>,
}

impl<R: Record> FakeService<R> {
    pub(crate) fn new(records: Vec<R>) -> Self {
        Self {
            records: Mutex::new(records),
            failing: HashSet::new(),
            list_down: AtomicBool::new(false),
            hold: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Per-record calls for these ids fail with "not found".
    pub(crate) fn failing_on(mut self, raw: &[&str]) -> Self {
        self.failing = ids(raw).into_iter().collect();
        self
    }

    /// Per-record calls wait for a permit on `gate` first.
    pub(crate) fn held_by(mut self, gate: Arc<Notify>) -> Self {
        self.hold = Some(gate);
        self
    }

    pub(crate) fn set_list_down(&self, down: bool) {
        self.list_down.store(down, Ordering::SeqCst);
    }

    pub(crate) async fn snapshot(&self) -> Vec<R> {
        self.records.lock().await.clone()
    }

    pub(crate) async fn calls(&self) -> Vec<RecordId> {
        self.calls.lock().await.clone()
    }

    async fn touch(&self, id: &RecordId) -> Result<()> {
        self.calls.lock().await.push(id.clone());
        if let Some(gate) = &self.hold {
            gate.notified().await;
        }
        if self.failing.contains(id) {
            bail!("{id} not found");
        }
        Ok(())
    }

    async fn apply_patch(&self, id: &RecordId, patch: Patch) -> Result<R> {
        let mut records = self.records.lock().await;
        let index = records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| anyhow!("{id} not found"))?;
        let mut value = serde_json::to_value(&records[index])?;
        if let Value::Object(fields) = &mut value {
            fields.extend(patch);
        }
        let updated: R = serde_json::from_value(value)?;
        records[index] = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl<R: Record> RecordService for FakeService<R> {
    type Record = R;

    async fn list(&self) -> Result<Vec<R>> {
        if self.list_down.load(Ordering::SeqCst) {
            bail!("network unreachable");
        }
        Ok(self.records.lock().await.clone())
    }

    async fn create(&self, input: Value) -> Result<R> {
        let record: R = serde_json::from_value(input)?;
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, patch: Patch) -> Result<R> {
        self.touch(id).await?;
        self.apply_patch(id, patch).await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.touch(id).await?;
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| record.id() != id);
        if records.len() == before {
            bail!("{id} not found");
        }
        Ok(())
    }

    async fn assign_role(&self, id: &RecordId, role: Role) -> Result<()> {
        if !R::KIND.supports_roles() {
            bail!("{} do not support role assignment", R::KIND);
        }
        self.touch(id).await?;
        let mut patch = Patch::new();
        patch.insert("role".into(), Value::from(role.as_str()));
        self.apply_patch(id, patch).await.map(|_| ())
    }
}
