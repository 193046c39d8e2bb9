use std::collections::HashSet;

use shared::domain::RecordId;

/// Which records of the current filtered view are checked.
///
/// The store only ever holds ids that are present in the last view passed
/// to [`SelectionStore::sync_visible`]. Pagination does not affect it: the
/// view is the whole filtered list, not the visible page.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    visible: Vec<RecordId>,
    selected: HashSet<RecordId>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the filtered view and prunes selected ids that left it.
    /// Returns how many ids were dropped.
    pub fn sync_visible<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) -> usize {
        self.visible = ids.into_iter().cloned().collect();
        let live: HashSet<&RecordId> = self.visible.iter().collect();
        let before = self.selected.len();
        self.selected.retain(|id| live.contains(id));
        before - self.selected.len()
    }

    /// Flips membership of `id`. Ids outside the current view are ignored.
    /// Returns whether `id` is selected afterwards.
    pub fn toggle_selection(&mut self, id: &RecordId) -> bool {
        if !self.visible.contains(id) {
            return false;
        }
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.clone());
            true
        }
    }

    /// Clears when everything visible is selected, otherwise selects exactly
    /// the visible ids.
    pub fn toggle_all(&mut self) {
        if self.is_all_selected() {
            self.selected.clear();
        } else {
            self.selected = self.visible.iter().cloned().collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selected.contains(id)
    }

    pub fn is_all_selected(&self) -> bool {
        !self.visible.is_empty() && self.visible.iter().all(|id| self.selected.contains(id))
    }

    /// Drives the indeterminate checkbox state.
    pub fn is_some_selected(&self) -> bool {
        !self.selected.is_empty() && !self.is_all_selected()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Selected ids in view order.
    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.visible
            .iter()
            .filter(|id| self.selected.contains(*id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
