//! Client-side list management for the opsdesk admin screens: selection over
//! a filtered view, filter/sort/paginate, and bulk actions fanned out to the
//! record services.

pub mod bulk;
pub mod error;
pub mod listing;
pub mod optimistic;
pub mod screen;
pub mod selection;
pub mod service;

pub use bulk::{BulkExecutor, BulkHandler};
pub use error::BulkError;
pub use listing::{FilterQuery, Listable, Page, SortOrder, StatusFilter};
pub use screen::{BulkOutcome, ListScreen, Notification, NotificationLevel};
pub use selection::SelectionStore;
pub use service::{HttpRecordService, RecordService};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
