use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Shift;

/// Where a batch sits in the blending → QC → filling → dispatch flow.
///
/// Variants are declared in lifecycle order, so `Ord` compares progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Planned,
    InProgress,
    ReadyForQc,
    ReadyForFilling,
    Filling,
    Dispatched,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 6] = [
        BatchStatus::Planned,
        BatchStatus::InProgress,
        BatchStatus::ReadyForQc,
        BatchStatus::ReadyForFilling,
        BatchStatus::Filling,
        BatchStatus::Dispatched,
    ];

    pub fn is_terminal(self) -> bool {
        self == BatchStatus::Dispatched
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Planned => write!(f, "PLANNED"),
            BatchStatus::InProgress => write!(f, "IN_PROGRESS"),
            BatchStatus::ReadyForQc => write!(f, "READY_FOR_QC"),
            BatchStatus::ReadyForFilling => write!(f, "READY_FOR_FILLING"),
            BatchStatus::Filling => write!(f, "FILLING"),
            BatchStatus::Dispatched => write!(f, "DISPATCHED"),
        }
    }
}

/// QC engineer's decision on a blended batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcResult {
    Pass,
    Hold,
    Fail,
}

impl fmt::Display for QcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QcResult::Pass => write!(f, "PASS"),
            QcResult::Hold => write!(f, "HOLD"),
            QcResult::Fail => write!(f, "FAIL"),
        }
    }
}

/// One accepted lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: BatchStatus,
    pub to: BatchStatus,
    pub at: DateTime<Utc>,
}

/// A blending run that QC rejected, kept when the batch goes back for rework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendAttempt {
    pub blending_start: DateTime<Utc>,
    pub blending_end: DateTime<Utc>,
    pub provisional_qty_kl: f64,
    pub failed_at: DateTime<Utc>,
    pub engineer_id: String,
}

/// A single production run of one product, tracked from planning to dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub batch_number: String,
    pub product_id: String,
    pub shift: Shift,
    pub operator_id: String,
    pub planned_qty_kl: f64,
    pub actual_qty_kl: f64,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blending_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blending_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_result: Option<QcResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_engineer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filling_line_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filling_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filling_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rework_history: Vec<BlendAttempt>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl Batch {
    pub fn new(
        id: String,
        batch_number: String,
        product_id: String,
        planned_qty_kl: f64,
        operator_id: String,
        shift: Shift,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            batch_number,
            product_id,
            shift,
            operator_id,
            planned_qty_kl,
            actual_qty_kl: 0.0,
            status: BatchStatus::Planned,
            created_at,
            blending_start: None,
            blending_end: None,
            qc_result: None,
            qc_engineer_id: None,
            qc_date: None,
            filling_line_id: None,
            filling_start: None,
            filling_end: None,
            dispatched_at: None,
            rework_history: Vec::new(),
            history: Vec::new(),
        }
    }

    /// The latest timestamp recorded on this batch.
    pub fn latest_stamp(&self) -> DateTime<Utc> {
        [
            self.blending_start,
            self.blending_end,
            self.qc_date,
            self.filling_start,
            self.filling_end,
            self.dispatched_at,
        ]
        .into_iter()
        .flatten()
        .fold(self.created_at, |latest, stamp| latest.max(stamp))
    }

    /// Blending start to dispatch, for dispatched batches.
    pub fn cycle_time(&self) -> Option<Duration> {
        Some(self.dispatched_at? - self.blending_start?)
    }

    /// Moves the current blending run into `rework_history` and clears it,
    /// so the batch can be re-blended from scratch.
    pub(crate) fn begin_rework(&mut self, failed_at: DateTime<Utc>, engineer_id: &str) {
        if let (Some(start), Some(end)) = (self.blending_start.take(), self.blending_end.take()) {
            self.rework_history.push(BlendAttempt {
                blending_start: start,
                blending_end: end,
                provisional_qty_kl: self.actual_qty_kl,
                failed_at,
                engineer_id: engineer_id.to_string(),
            });
        }
        self.actual_qty_kl = 0.0;
    }

    /// Checks that the populated fields agree with `status` and that stamps
    /// never go backwards. Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        use BatchStatus::*;

        let s = self.status;

        if !(self.planned_qty_kl.is_finite() && self.planned_qty_kl > 0.0) {
            return Err(format!("planned quantity {} is not positive", self.planned_qty_kl));
        }

        let expected = [
            ("blending start", self.blending_start.is_some(), s >= InProgress),
            ("blending end", self.blending_end.is_some(), s >= ReadyForQc),
            ("filling line", self.filling_line_id.is_some(), s >= Filling),
            ("filling start", self.filling_start.is_some(), s >= Filling),
            ("filling end", self.filling_end.is_some(), s == Dispatched),
            ("dispatch time", self.dispatched_at.is_some(), s == Dispatched),
        ];
        for (field, present, wanted) in expected {
            if present != wanted {
                let state = if present { "set" } else { "missing" };
                return Err(format!("{field} is {state} while status is {s}"));
            }
        }

        let qc_fields = [
            self.qc_result.is_some(),
            self.qc_engineer_id.is_some(),
            self.qc_date.is_some(),
        ];
        if qc_fields.iter().any(|&f| f != qc_fields[0]) {
            return Err("QC result, engineer and date must be recorded together".into());
        }

        let qc_ok = match (s, self.qc_result) {
            (ReadyForFilling | Filling | Dispatched, result) => result == Some(QcResult::Pass),
            (ReadyForQc, result) => result != Some(QcResult::Pass),
            (Planned | InProgress, result) => matches!(result, None | Some(QcResult::Fail)),
        };
        if !qc_ok {
            return Err(format!("QC result {:?} is inconsistent with status {s}", self.qc_result));
        }

        let provisional_ok = match s {
            Planned | InProgress => self.actual_qty_kl == 0.0,
            ReadyForQc | ReadyForFilling | Filling => self.actual_qty_kl == self.planned_qty_kl,
            Dispatched => self.actual_qty_kl.is_finite() && self.actual_qty_kl >= 0.0,
        };
        if !provisional_ok {
            return Err(format!("actual quantity {} is inconsistent with status {s}", self.actual_qty_kl));
        }

        let stages = [
            Some(self.created_at),
            self.blending_start,
            self.blending_end,
            self.filling_start,
            self.filling_end,
        ];
        let ordered: Vec<DateTime<Utc>> = stages.into_iter().flatten().collect();
        if ordered.windows(2).any(|w| w[0] > w[1]) {
            return Err("stage timestamps are out of order".into());
        }

        if let Some(qc_date) = self.qc_date {
            if qc_date < self.created_at {
                return Err("QC date precedes creation".into());
            }
            // A FAIL belongs to an archived attempt; anything else judges the current one.
            let in_order = if self.qc_result == Some(QcResult::Fail) {
                self.blending_start.is_none_or(|start| qc_date <= start)
            } else {
                self.blending_end.is_some_and(|end| qc_date >= end)
                    && self.filling_start.is_none_or(|start| start >= qc_date)
            };
            if !in_order {
                return Err("QC date is out of order with blending/filling".into());
            }
        }

        if self.filling_end != self.dispatched_at {
            return Err("filling end and dispatch time must match".into());
        }

        if let Some(last) = self.history.last()
            && last.to != s
        {
            return Err(format!("history ends at {} but status is {s}", last.to));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap() + Duration::minutes(minutes)
    }

    fn planned() -> Batch {
        Batch::new(
            "batch_x".into(),
            "B-2026-002501".into(),
            "prod_1".into(),
            10.0,
            "user_2".into(),
            Shift::A,
            t(0),
        )
    }

    fn dispatched() -> Batch {
        let mut b = planned();
        b.status = BatchStatus::Dispatched;
        b.blending_start = Some(t(10));
        b.blending_end = Some(t(70));
        b.qc_result = Some(QcResult::Pass);
        b.qc_engineer_id = Some("user_3".into());
        b.qc_date = Some(t(90));
        b.filling_line_id = Some("line_1".into());
        b.filling_start = Some(t(120));
        b.filling_end = Some(t(190));
        b.dispatched_at = Some(t(190));
        b.actual_qty_kl = 9.5;
        b
    }

    #[test]
    fn new_batch_is_planned_and_empty() {
        let b = planned();
        assert_eq!(b.status, BatchStatus::Planned);
        assert_eq!(b.actual_qty_kl, 0.0);
        assert!(b.history.is_empty());
        assert!(b.check_invariants().is_ok());
        assert_eq!(b.latest_stamp(), t(0));
    }

    #[test]
    fn dispatched_batch_passes_invariants() {
        let b = dispatched();
        assert!(b.check_invariants().is_ok());
        assert_eq!(b.latest_stamp(), t(190));
        assert_eq!(b.cycle_time(), Some(Duration::minutes(180)));
    }

    #[test]
    fn filling_batch_must_not_have_filling_end() {
        let mut b = dispatched();
        b.status = BatchStatus::Filling;
        b.actual_qty_kl = b.planned_qty_kl;
        let err = b.check_invariants().unwrap_err();
        assert!(err.contains("filling end"), "{err}");
    }

    #[test]
    fn out_of_order_stamps_are_rejected() {
        let mut b = dispatched();
        b.blending_end = Some(t(5));
        assert!(b.check_invariants().is_err());
    }

    #[test]
    fn filling_requires_a_pass() {
        let mut b = dispatched();
        b.qc_result = Some(QcResult::Hold);
        assert!(b.check_invariants().is_err());
    }

    #[test]
    fn rework_archives_the_failed_run() {
        let mut b = planned();
        b.status = BatchStatus::ReadyForQc;
        b.blending_start = Some(t(10));
        b.blending_end = Some(t(70));
        b.actual_qty_kl = 10.0;

        b.qc_result = Some(QcResult::Fail);
        b.qc_engineer_id = Some("user_3".into());
        b.qc_date = Some(t(80));
        b.begin_rework(t(80), "user_3");
        b.status = BatchStatus::Planned;

        assert!(b.blending_start.is_none());
        assert!(b.blending_end.is_none());
        assert_eq!(b.actual_qty_kl, 0.0);
        assert_eq!(b.rework_history.len(), 1);
        assert_eq!(b.rework_history[0].provisional_qty_kl, 10.0);
        assert_eq!(b.rework_history[0].blending_start, t(10));
        assert!(b.check_invariants().is_ok());
    }

    #[test]
    fn status_order_follows_lifecycle() {
        assert!(BatchStatus::Planned < BatchStatus::InProgress);
        assert!(BatchStatus::Filling < BatchStatus::Dispatched);
        assert!(BatchStatus::Dispatched.is_terminal());
        assert!(!BatchStatus::ReadyForQc.is_terminal());
    }

    #[test]
    fn status_display_and_serde_agree() {
        for status in BatchStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        assert_eq!(QcResult::Hold.to_string(), "HOLD");
    }
}
