use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Batch, BatchStatus};
use crate::catalog::ReferenceCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Created,
    Blending,
    QcTesting,
    Filling,
    Dispatched,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Created => write!(f, "Created"),
            Stage::Blending => write!(f, "Blending"),
            Stage::QcTesting => write!(f, "QC Testing"),
            Stage::Filling => write!(f, "Filling"),
            Stage::Dispatched => write!(f, "Dispatched"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageState {
    Complete,
    InProgress,
    Pending,
}

/// One row of a batch's traceability view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub state: StageState,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub detail: Option<String>,
}

impl Batch {
    /// Stage-by-stage history, resolving operator, engineer and line names
    /// through `catalog` where it knows them.
    pub fn timeline(&self, catalog: &dyn ReferenceCatalog) -> Vec<StageRecord> {
        let user_name = |id: &str| {
            catalog
                .user(id)
                .map(|u| u.name.clone())
                .unwrap_or_else(|| id.to_string())
        };

        let span_state = |start: Option<_>, end: Option<_>| match (start, end) {
            (Some(_), Some(_)) => StageState::Complete,
            (Some(_), None) => StageState::InProgress,
            _ => StageState::Pending,
        };

        let blending_detail = match self.rework_history.len() {
            0 => None,
            1 => Some("re-blended after 1 failed QC".to_string()),
            n => Some(format!("re-blended after {n} failed QCs")),
        };

        let qc_state = if self.status >= BatchStatus::ReadyForFilling {
            StageState::Complete
        } else if self.status == BatchStatus::ReadyForQc {
            StageState::InProgress
        } else {
            StageState::Pending
        };
        let qc_detail = match (self.qc_result, self.qc_engineer_id.as_deref()) {
            (Some(result), Some(engineer)) => Some(format!("{result} by {}", user_name(engineer))),
            (Some(result), None) => Some(result.to_string()),
            _ => None,
        };

        let line_detail = self.filling_line_id.as_deref().map(|id| {
            catalog
                .filling_line(id)
                .map(|l| l.name.clone())
                .unwrap_or_else(|| id.to_string())
        });

        vec![
            StageRecord {
                stage: Stage::Created,
                state: StageState::Complete,
                started: Some(self.created_at),
                ended: None,
                detail: Some(format!("by {}", user_name(&self.operator_id))),
            },
            StageRecord {
                stage: Stage::Blending,
                state: span_state(self.blending_start, self.blending_end),
                started: self.blending_start,
                ended: self.blending_end,
                detail: blending_detail,
            },
            StageRecord {
                stage: Stage::QcTesting,
                state: qc_state,
                started: self.qc_date,
                ended: None,
                detail: qc_detail,
            },
            StageRecord {
                stage: Stage::Filling,
                state: span_state(self.filling_start, self.filling_end),
                started: self.filling_start,
                ended: self.filling_end,
                detail: line_detail,
            },
            StageRecord {
                stage: Stage::Dispatched,
                state: if self.status == BatchStatus::Dispatched {
                    StageState::Complete
                } else {
                    StageState::Pending
                },
                started: self.dispatched_at,
                ended: None,
                detail: None,
            },
        ]
    }
}
