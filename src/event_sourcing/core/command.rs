use serde::{Deserialize, Serialize};

use crate::utils::IsTransient;

// ============================================================================
// Command Results
// ============================================================================

/// Successful command reply. Carries no data: a no-op and an applied
/// transition look the same to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack;

/// Failure of a command sent to an aggregate.
///
/// `Rejected` is a business-rule rejection and is never retried.
/// `Infrastructure` covers mailbox, store and concurrency failures; those are
/// retryable.
#[derive(Debug, thiserror::Error)]
pub enum CommandError<E> {
    #[error("{0}")]
    Rejected(E),

    #[error("Infrastructure failure: {0}")]
    Infrastructure(#[from] anyhow::Error),
}

impl<E> CommandError<E> {
    pub fn rejection(&self) -> Option<&E> {
        match self {
            CommandError::Rejected(e) => Some(e),
            CommandError::Infrastructure(_) => None,
        }
    }
}

impl<E> IsTransient for CommandError<E> {
    fn is_transient(&self) -> bool {
        matches!(self, CommandError::Infrastructure(_))
    }
}
