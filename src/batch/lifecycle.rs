use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{BatchStatus, QcResult};

/// A lifecycle command a caller can issue against a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    StartBlending,
    CompleteBlending,
    RecordQc(QcResult),
    StartFilling,
    CompleteFilling,
}

impl Operation {
    /// Every distinct command, with each QC outcome listed separately.
    pub const ALL: [Operation; 7] = [
        Operation::StartBlending,
        Operation::CompleteBlending,
        Operation::RecordQc(QcResult::Pass),
        Operation::RecordQc(QcResult::Hold),
        Operation::RecordQc(QcResult::Fail),
        Operation::StartFilling,
        Operation::CompleteFilling,
    ];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::StartBlending => write!(f, "start blending"),
            Operation::CompleteBlending => write!(f, "complete blending"),
            Operation::RecordQc(result) => write!(f, "record QC ({result})"),
            Operation::StartFilling => write!(f, "start filling"),
            Operation::CompleteFilling => write!(f, "complete filling"),
        }
    }
}

/// The batch state machine.
///
/// PLANNED → IN_PROGRESS → READY_FOR_QC → READY_FOR_FILLING → FILLING → DISPATCHED,
/// with QC HOLD staying at READY_FOR_QC and QC FAIL sending the batch back to
/// PLANNED for rework.
pub struct Lifecycle;

impl Lifecycle {
    /// The status `op` leads to from `status`, or `None` if the table does
    /// not allow it.
    pub fn next(status: BatchStatus, op: Operation) -> Option<BatchStatus> {
        use BatchStatus::*;

        match (status, op) {
            (Planned, Operation::StartBlending) => Some(InProgress),
            (InProgress, Operation::CompleteBlending) => Some(ReadyForQc),
            (ReadyForQc, Operation::RecordQc(QcResult::Pass)) => Some(ReadyForFilling),
            (ReadyForQc, Operation::RecordQc(QcResult::Hold)) => Some(ReadyForQc),
            (ReadyForQc, Operation::RecordQc(QcResult::Fail)) => Some(Planned),
            (ReadyForFilling, Operation::StartFilling) => Some(Filling),
            (Filling, Operation::CompleteFilling) => Some(Dispatched),
            _ => None,
        }
    }

    /// Commands currently permitted for a batch in `status`; drives which
    /// actions a workflow screen offers.
    pub fn allowed(status: BatchStatus) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|&op| Self::next(status, op).is_some())
            .collect()
    }
}
