use thiserror::Error;

/// Failures that stop a bulk action before any record is touched.
///
/// Per-record failures never surface here; they are tallied into
/// [`shared::protocol::BulkActionResult`].
#[derive(Debug, Error)]
pub enum BulkError {
    #[error("no records selected")]
    EmptySelection,
    #[error("unknown bulk action '{0}'")]
    UnknownAction(String),
    #[error("bulk action '{action}' requires parameter '{param}'")]
    MissingParam { action: String, param: &'static str },
    #[error("bulk action '{action}' got an invalid '{param}': {reason}")]
    InvalidParam {
        action: String,
        param: &'static str,
        reason: String,
    },
    #[error("another bulk action is still running")]
    InFlight,
    #[error("bulk action '{0}' is destructive and was not confirmed")]
    ConfirmationRequired(String),
}
