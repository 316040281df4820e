use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to the caller of a load run.
///
/// Failures of the action under test are never reported through this type;
/// they are recorded as failed outcomes and show up in the
/// [`LoadResult`](crate::report::LoadResult) counters instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VolleyError {
    /// A setting is out of range. Raised before any work is scheduled.
    #[error("invalid setting '{parameter}': {message}")]
    InvalidSettings {
        parameter: &'static str,
        message: String,
    },

    /// The collector did not answer a result request in time.
    #[error("result collector did not respond within {timeout:?}")]
    CollectorUnavailable { timeout: Duration },

    /// The collector task has already shut down.
    #[error("result collector is no longer running")]
    CollectorClosed,
}

impl VolleyError {
    pub(crate) fn invalid(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            parameter,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VolleyError>;
