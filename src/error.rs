use thiserror::Error;

use crate::batch::{BatchStatus, Operation};

/// Failures reported by lifecycle commands.
///
/// A command that returns one of these has not written anything: the batch
/// record and the published snapshot are exactly as they were before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MesError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot {operation} on batch {batch_number} while it is {status}")]
    InvalidTransition {
        batch_number: String,
        operation: Operation,
        status: BatchStatus,
    },
}

impl MesError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        MesError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short machine-readable tag, handy for UI bindings and log fields.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MesError::InvalidInput(_) => ErrorKind::InvalidInput,
            MesError::NotFound { .. } => ErrorKind::NotFound,
            MesError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }
}

/// The three failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InvalidTransition,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "InvalidInput"),
            ErrorKind::NotFound => write!(f, "NotFound"),
            ErrorKind::InvalidTransition => write!(f, "InvalidTransition"),
        }
    }
}
