use std::sync::Arc;

use anyhow::anyhow;
use shared::{
    domain::{EntityKind, Record, RecordId, Selectable},
    protocol::{BulkActionResult, BulkParams, Patch},
};
use tracing::warn;

use crate::{
    bulk::{self, BulkExecutor},
    error::BulkError,
    listing::{apply_query, clamp_page, filter_records, FilterQuery, Listable, Page, SortOrder, StatusFilter},
    optimistic::apply_optimistic,
    selection::SelectionStore,
    service::RecordService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// The single user-facing message produced per bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub result: BulkActionResult,
    pub notification: Notification,
}

fn past_tense(action: &str) -> &'static str {
    match action {
        bulk::DELETE => "Deleted",
        bulk::ACTIVATE => "Activated",
        bulk::DEACTIVATE => "Deactivated",
        bulk::REASSIGN => "Reassigned",
        _ => "Updated",
    }
}

fn present_tense(action: &str) -> &'static str {
    match action {
        bulk::DELETE => "delete",
        bulk::ACTIVATE => "activate",
        bulk::DEACTIVATE => "deactivate",
        bulk::REASSIGN => "reassign",
        _ => "update",
    }
}

/// "Deleted 5 tasks", "Deleted 4 tasks, 1 failed", "Failed to delete 1 task".
pub fn summarize(action: &str, kind: EntityKind, result: &BulkActionResult) -> Notification {
    if result.is_total_failure() {
        let count = result.failure_count;
        return Notification {
            level: NotificationLevel::Error,
            message: format!(
                "Failed to {} {count} {}",
                present_tense(action),
                kind.noun_for(count)
            ),
        };
    }

    let count = result.success_count;
    let done = format!("{} {count} {}", past_tense(action), kind.noun_for(count));
    if result.is_complete_success() {
        Notification {
            level: NotificationLevel::Success,
            message: done,
        }
    } else {
        Notification {
            level: NotificationLevel::Warning,
            message: format!("{done}, {} failed", result.failure_count),
        }
    }
}

/// State behind one admin list screen: the loaded collection, its query,
/// the selection over the filtered view, and the bulk executor.
pub struct ListScreen<S: RecordService> {
    executor: BulkExecutor<S>,
    records: Vec<S::Record>,
    query: FilterQuery,
    page_size: usize,
    selection: SelectionStore,
}

impl<S> ListScreen<S>
where
    S: RecordService + 'static,
    S::Record: Listable,
{
    pub fn new(service: Arc<S>, page_size: usize) -> Self {
        Self::with_executor(BulkExecutor::new(service), page_size)
    }

    pub fn with_executor(executor: BulkExecutor<S>, page_size: usize) -> Self {
        Self {
            executor,
            records: Vec::new(),
            query: FilterQuery::default(),
            page_size: page_size.max(1),
            selection: SelectionStore::new(),
        }
    }

    pub fn records(&self) -> &[S::Record] {
        &self.records
    }

    pub fn query(&self) -> &FilterQuery {
        &self.query
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn executor(&self) -> &BulkExecutor<S> {
        &self.executor
    }

    /// Replaces the collection with a fresh fetch. On failure nothing changes.
    pub async fn reload(&mut self) -> anyhow::Result<()> {
        let records = self.executor.service().list().await?;
        self.records = records;
        self.refresh();
        Ok(())
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.query.set_search_term(term);
        self.refresh();
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.query.set_status_filter(status);
        self.refresh();
    }

    pub fn set_sort(&mut self, field: impl Into<String>, order: SortOrder) {
        self.query.set_sort(field, order);
    }

    pub fn set_page(&mut self, page: usize) {
        self.query.set_page(page);
        self.refresh();
    }

    /// Re-derives the filtered view: prunes the selection and pulls the page
    /// back into range.
    fn refresh(&mut self) {
        let filtered = filter_records(&self.records, &self.query);
        let total = filtered.len();
        self.selection
            .sync_visible(filtered.into_iter().map(|record| record.id()));
        self.query.page = clamp_page(self.query.page, total, self.page_size);
    }

    pub fn filtered(&self) -> Vec<&S::Record> {
        filter_records(&self.records, &self.query)
    }

    pub fn visible_page(&self) -> Page<&S::Record> {
        apply_query(&self.records, &self.query, self.page_size)
    }

    pub fn toggle_selection(&mut self, id: &RecordId) -> bool {
        self.selection.toggle_selection(id)
    }

    pub fn toggle_all(&mut self) {
        self.selection.toggle_all();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }

    /// Selects each id in the current view, leaving already selected ids
    /// alone so repeats cannot deselect. Returns the ids not in the view.
    pub fn select_ids<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) -> Vec<RecordId> {
        let mut missing = Vec::new();
        for id in ids {
            if self.selection.is_selected(id) {
                continue;
            }
            if !self.selection.toggle_selection(id) && !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        missing
    }

    /// Runs `action` over the current selection. Destructive actions need
    /// `confirmed`. Afterwards the selection is cleared and the collection
    /// reloaded; a failed reload is logged, not reported.
    pub async fn run_bulk_action(
        &mut self,
        action: &str,
        params: &BulkParams,
        confirmed: bool,
    ) -> Result<BulkOutcome, BulkError> {
        if self.executor.is_destructive(action)? && !confirmed {
            return Err(BulkError::ConfirmationRequired(action.to_string()));
        }

        let ids = self.selection.selected_ids();
        let result = self.executor.execute(action, &ids, params).await?;

        self.selection.clear_selection();
        if let Err(error) = self.reload().await {
            warn!(action, %error, "reload after bulk action failed");
        }

        let notification = summarize(action, <S::Record as Record>::KIND, &result);
        Ok(BulkOutcome {
            result,
            notification,
        })
    }

    /// Applies `apply` locally, then sends `patch`. The local record is
    /// restored if the service rejects it, or replaced with the service's
    /// copy if it accepts.
    pub async fn update_optimistic(
        &mut self,
        id: &RecordId,
        patch: Patch,
        apply: impl FnOnce(&mut S::Record),
    ) -> anyhow::Result<()> {
        let index = self
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| anyhow!("record {id} is not loaded"))?;
        let service = Arc::clone(self.executor.service());

        let confirmed =
            apply_optimistic(&mut self.records[index], apply, service.update(id, patch)).await?;
        self.records[index] = confirmed;
        self.refresh();
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/screen_tests.rs"]
mod tests;
