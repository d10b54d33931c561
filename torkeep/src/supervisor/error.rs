//! Errors that end a supervisor's run.

use thiserror::Error;

use crate::engine::EngineError;

/// Why a supervisor stopped abnormally.
///
/// None of these propagate beyond the supervisor that hit them; they are
/// carried in its [`SupervisorReport`](super::SupervisorReport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// The engine refused the submission.
    #[error("failed to submit download: {0}")]
    Submit(#[source] EngineError),

    /// The engine reported a fatal condition for this download.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// An event arrived that is impossible before handle confirmation.
    #[error("engine reported {event} before confirming a handle")]
    Consistency { event: &'static str },

    /// A checkpoint could not be requested.
    #[error("checkpoint request failed: {0}")]
    Checkpoint(#[source] EngineError),

    /// The supervisor task panicked or was aborted.
    #[error("supervisor task ended abnormally: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_display() {
        let err = SupervisorError::Consistency {
            event: "transfer-finished",
        };
        assert_eq!(
            err.to_string(),
            "engine reported transfer-finished before confirming a handle"
        );
    }
}
