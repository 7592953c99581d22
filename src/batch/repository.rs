use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::lifecycle::{Lifecycle, Operation};
use super::model::{Batch, BatchStatus, QcResult, StatusChange};
use crate::catalog::{ReferenceCatalog, Shift};
use crate::clock::{Clock, SystemClock};
use crate::error::MesError;
use crate::simulator::{BlendReading, ProcessSimulator};

/// Immutable view of every batch, newest first.
pub type Snapshot = Arc<Vec<Batch>>;

/// Values applied to batches created without an explicit operator or shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDefaults {
    pub operator_id: String,
    pub shift: Shift,
    /// First sequence number handed out in `B-<year>-<seq>` batch numbers.
    pub first_sequence: u64,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            operator_id: "user_2".to_string(),
            shift: Shift::A,
            first_sequence: 2501,
        }
    }
}

/// Parameters for a new batch when the caller picks operator and shift.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBatch {
    pub product_id: String,
    pub planned_qty_kl: f64,
    pub operator_id: String,
    pub shift: Shift,
}

/// Optional criteria for [`BatchRepository::query`]; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFilter {
    pub status: Option<BatchStatus>,
    pub product_id: Option<String>,
    pub shift: Option<Shift>,
}

impl BatchFilter {
    pub fn status(mut self, status: BatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn shift(mut self, shift: Shift) -> Self {
        self.shift = Some(shift);
        self
    }

    pub fn matches(&self, batch: &Batch) -> bool {
        self.status.is_none_or(|s| batch.status == s)
            && self.product_id.as_deref().is_none_or(|p| batch.product_id == p)
            && self.shift.is_none_or(|s| batch.shift == s)
    }
}

/// Sole owner of batch records.
///
/// Queries hand out shared, copy-on-write snapshots. Lifecycle commands are
/// the only way to change a batch: each one either applies completely and
/// publishes a new snapshot, or fails and leaves everything untouched.
pub struct BatchRepository {
    batches: Snapshot,
    catalog: Arc<dyn ReferenceCatalog>,
    clock: Arc<dyn Clock>,
    defaults: BatchDefaults,
    next_sequence: u64,
    published: watch::Sender<Snapshot>,
}

impl BatchRepository {
    pub fn new(catalog: Arc<dyn ReferenceCatalog>) -> Self {
        let defaults = BatchDefaults::default();
        let batches: Snapshot = Arc::new(Vec::new());
        let (published, _) = watch::channel(Arc::clone(&batches));
        Self {
            batches,
            catalog,
            clock: Arc::new(SystemClock),
            next_sequence: defaults.first_sequence,
            defaults,
            published,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_defaults(mut self, defaults: BatchDefaults) -> Self {
        self.next_sequence = self.next_sequence.max(defaults.first_sequence);
        self.defaults = defaults;
        self
    }

    /// Seeds the repository with existing records (fixtures, imports).
    ///
    /// Every batch must satisfy [`Batch::check_invariants`] and ids and batch
    /// numbers must be unique; otherwise nothing is loaded.
    pub fn with_batches(mut self, seed: Vec<Batch>) -> Result<Self, MesError> {
        let mut ids: HashSet<&str> = self.batches.iter().map(|b| b.id.as_str()).collect();
        let mut numbers: HashSet<&str> =
            self.batches.iter().map(|b| b.batch_number.as_str()).collect();

        for batch in &seed {
            batch.check_invariants().map_err(|violation| {
                MesError::InvalidInput(format!("batch {}: {violation}", batch.batch_number))
            })?;
            if !ids.insert(&batch.id) {
                return Err(MesError::InvalidInput(format!("duplicate batch id {}", batch.id)));
            }
            if !numbers.insert(&batch.batch_number) {
                return Err(MesError::InvalidInput(format!(
                    "duplicate batch number {}",
                    batch.batch_number
                )));
            }
        }

        let highest = seed.iter().filter_map(|b| sequence_of(&b.batch_number)).max();
        if let Some(highest) = highest {
            let following = highest.checked_add(1).ok_or_else(sequence_exhausted)?;
            self.next_sequence = self.next_sequence.max(following);
        }

        let batches = Arc::make_mut(&mut self.batches);
        batches.extend(seed);
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.publish();
        Ok(self)
    }

    pub fn catalog(&self) -> &dyn ReferenceCatalog {
        self.catalog.as_ref()
    }

    pub fn shared_catalog(&self) -> Arc<dyn ReferenceCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Current collection, newest first. Later commands never alter it.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.batches)
    }

    /// A receiver that sees every snapshot published after a successful command.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.published.subscribe()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get(&self, batch_id: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == batch_id)
    }

    pub fn find_by_number(&self, batch_number: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.batch_number == batch_number)
    }

    pub fn query(&self, filter: &BatchFilter) -> Vec<Batch> {
        self.batches
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect()
    }

    /// Simulated live readings for a blending batch; rest readings otherwise.
    pub fn blending_progress<R: Rng>(
        &self,
        batch_id: &str,
        simulator: &ProcessSimulator,
        rng: &mut R,
    ) -> BlendReading {
        crate::simulator::blending_progress(
            &self.batches,
            self.catalog.as_ref(),
            batch_id,
            simulator,
            self.clock.now(),
            rng,
        )
    }

    /// Plans a batch with the default operator and shift.
    pub fn create_batch(&mut self, product_id: &str, planned_qty_kl: f64) -> Result<Batch, MesError> {
        self.create_batch_with(NewBatch {
            product_id: product_id.to_string(),
            planned_qty_kl,
            operator_id: self.defaults.operator_id.clone(),
            shift: self.defaults.shift,
        })
    }

    pub fn create_batch_with(&mut self, new: NewBatch) -> Result<Batch, MesError> {
        if !(new.planned_qty_kl.is_finite() && new.planned_qty_kl > 0.0) {
            return Err(rejected_creation(MesError::InvalidInput(format!(
                "planned quantity must be greater than 0 KL, got {}",
                new.planned_qty_kl
            ))));
        }
        if self.catalog.product(&new.product_id).is_none() {
            return Err(rejected_creation(MesError::InvalidInput(format!(
                "unknown product {}",
                new.product_id
            ))));
        }
        if self.catalog.user(&new.operator_id).is_none() {
            return Err(rejected_creation(MesError::InvalidInput(format!(
                "unknown operator {}",
                new.operator_id
            ))));
        }

        // Never older than the newest batch, so the snapshot stays newest first.
        let created_at = match self.batches.first() {
            Some(newest) => self.clock.now().max(newest.created_at),
            None => self.clock.now(),
        };
        let batch_number = self.next_batch_number(created_at).map_err(rejected_creation)?;
        let batch = Batch::new(
            Uuid::new_v4().to_string(),
            batch_number,
            new.product_id,
            new.planned_qty_kl,
            new.operator_id,
            new.shift,
            created_at,
        );

        Arc::make_mut(&mut self.batches).insert(0, batch.clone());
        self.publish();
        info!(
            batch = %batch.batch_number,
            product = %batch.product_id,
            planned_kl = batch.planned_qty_kl,
            "batch planned"
        );
        Ok(batch)
    }

    pub fn start_blending(&mut self, batch_id: &str) -> Result<Batch, MesError> {
        let op = Operation::StartBlending;
        let (index, next) = self.locate(batch_id, op)?;
        Ok(self.commit(index, op, next, |batch, at| {
            batch.blending_start = Some(at);
        }))
    }

    /// Ends blending; the planned volume becomes the provisional actual volume.
    pub fn complete_blending(&mut self, batch_id: &str) -> Result<Batch, MesError> {
        let op = Operation::CompleteBlending;
        let (index, next) = self.locate(batch_id, op)?;
        Ok(self.commit(index, op, next, |batch, at| {
            batch.blending_end = Some(at);
            batch.actual_qty_kl = batch.planned_qty_kl;
        }))
    }

    /// Records a QC decision. PASS releases the batch to filling, HOLD keeps
    /// it waiting for a re-test, FAIL archives the blend and sends it back to
    /// PLANNED.
    pub fn record_qc(
        &mut self,
        batch_id: &str,
        result: QcResult,
        engineer_id: &str,
    ) -> Result<Batch, MesError> {
        let op = Operation::RecordQc(result);
        let (index, next) = self.locate(batch_id, op)?;
        if self.catalog.user(engineer_id).is_none() {
            return Err(rejected(op, batch_id, MesError::not_found("User", engineer_id)));
        }

        Ok(self.commit(index, op, next, |batch, at| {
            batch.qc_result = Some(result);
            batch.qc_engineer_id = Some(engineer_id.to_string());
            batch.qc_date = Some(at);
            if result == QcResult::Fail {
                batch.begin_rework(at, engineer_id);
            }
        }))
    }

    /// Puts the batch on a filling line. Lines under maintenance are accepted
    /// (with a warning); keeping them off the menu is up to the caller.
    pub fn start_filling(&mut self, batch_id: &str, line_id: &str) -> Result<Batch, MesError> {
        let op = Operation::StartFilling;
        let (index, next) = self.locate(batch_id, op)?;
        let Some(line) = self.catalog.filling_line(line_id) else {
            return Err(rejected(op, batch_id, MesError::not_found("Filling line", line_id)));
        };
        if !line.is_available() {
            warn!(line = line_id, status = %line.status, "filling started on an unavailable line");
        }

        Ok(self.commit(index, op, next, |batch, at| {
            batch.filling_line_id = Some(line_id.to_string());
            batch.filling_start = Some(at);
        }))
    }

    /// Finishes filling and dispatches the batch with the measured volume.
    pub fn complete_filling(&mut self, batch_id: &str, actual_qty_kl: f64) -> Result<Batch, MesError> {
        let op = Operation::CompleteFilling;
        let (index, next) = self.locate(batch_id, op)?;
        if !(actual_qty_kl.is_finite() && actual_qty_kl >= 0.0) {
            return Err(rejected(
                op,
                batch_id,
                MesError::InvalidInput(format!("actual quantity must be 0 KL or more, got {actual_qty_kl}")),
            ));
        }

        Ok(self.commit(index, op, next, |batch, at| {
            batch.actual_qty_kl = actual_qty_kl;
            batch.filling_end = Some(at);
            batch.dispatched_at = Some(at);
        }))
    }

    fn locate(&self, batch_id: &str, op: Operation) -> Result<(usize, BatchStatus), MesError> {
        let Some(index) = self.batches.iter().position(|b| b.id == batch_id) else {
            return Err(rejected(op, batch_id, MesError::not_found("Batch", batch_id)));
        };
        let batch = &self.batches[index];
        match Lifecycle::next(batch.status, op) {
            Some(next) => Ok((index, next)),
            None => Err(rejected(
                op,
                batch_id,
                MesError::InvalidTransition {
                    batch_number: batch.batch_number.clone(),
                    operation: op,
                    status: batch.status,
                },
            )),
        }
    }

    // Applies `apply` to a copy of the batch, then swaps the copy in. Stamps
    // never precede anything already on the batch.
    fn commit(
        &mut self,
        index: usize,
        op: Operation,
        next: BatchStatus,
        apply: impl FnOnce(&mut Batch, DateTime<Utc>),
    ) -> Batch {
        let current = &self.batches[index];
        let at = self.clock.now().max(current.latest_stamp());

        let mut updated = current.clone();
        apply(&mut updated, at);
        let from = updated.status;
        updated.status = next;
        updated.history.push(StatusChange { from, to: next, at });

        Arc::make_mut(&mut self.batches)[index] = updated.clone();
        self.publish();

        info!(
            batch = %updated.batch_number,
            operation = %op,
            %from,
            to = %next,
            "batch transition"
        );
        updated
    }

    fn publish(&self) {
        self.published.send_replace(Arc::clone(&self.batches));
        debug!(batches = self.batches.len(), "snapshot published");
    }

    // The sequence only advances once a free number is found.
    fn next_batch_number(&mut self, created_at: DateTime<Utc>) -> Result<String, MesError> {
        let mut seq = self.next_sequence;
        loop {
            let candidate = format!("B-{}-{:06}", created_at.year(), seq);
            let following = seq.checked_add(1).ok_or_else(sequence_exhausted)?;
            if self.find_by_number(&candidate).is_none() {
                self.next_sequence = following;
                return Ok(candidate);
            }
            seq = following;
        }
    }
}

fn sequence_exhausted() -> MesError {
    MesError::InvalidInput("batch number sequence exhausted".into())
}

fn sequence_of(batch_number: &str) -> Option<u64> {
    batch_number.rsplit('-').next()?.parse().ok()
}

fn rejected(op: Operation, batch_id: &str, err: MesError) -> MesError {
    warn!(batch_id, operation = %op, kind = %err.kind(), "command rejected: {err}");
    err
}

fn rejected_creation(err: MesError) -> MesError {
    warn!(kind = %err.kind(), "batch creation rejected: {err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::simulator::Jitter;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap() // 2026-01-01T00:00:00Z
    }

    fn setup() -> (BatchRepository, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let repo = BatchRepository::new(Arc::new(StaticCatalog::demo())).with_clock(clock.clone());
        (repo, clock)
    }

    fn ready_for_qc(repo: &mut BatchRepository, clock: &ManualClock) -> String {
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        clock.advance(Duration::minutes(5));
        repo.start_blending(&id).unwrap();
        clock.advance(Duration::minutes(60));
        repo.complete_blending(&id).unwrap();
        clock.advance(Duration::minutes(10));
        id
    }

    #[test]
    fn create_batch_defaults() {
        let (mut repo, _) = setup();
        let batch = repo.create_batch("prod_1", 10.0).unwrap();
        assert_eq!(batch.status, BatchStatus::Planned);
        assert_eq!(batch.actual_qty_kl, 0.0);
        assert_eq!(batch.operator_id, "user_2");
        assert_eq!(batch.shift, Shift::A);
        assert_eq!(batch.created_at, t0());
        assert_eq!(batch.batch_number, "B-2026-002501");
        assert!(batch.check_invariants().is_ok());
    }

    #[test]
    fn created_batches_have_unique_ids_and_numbers() {
        let (mut repo, _) = setup();
        let mut ids = HashSet::new();
        let mut numbers = HashSet::new();
        for qty in [1.0, 2.5, 10.0, 0.1, 99.0] {
            let b = repo.create_batch("prod_2", qty).unwrap();
            assert!(ids.insert(b.id));
            assert!(numbers.insert(b.batch_number));
        }
        assert_eq!(repo.len(), 5);
    }

    #[test]
    fn snapshot_is_newest_first() {
        let (mut repo, clock) = setup();
        let first = repo.create_batch("prod_1", 1.0).unwrap();
        clock.advance(Duration::seconds(1));
        let second = repo.create_batch("prod_1", 2.0).unwrap();
        let snap = repo.snapshot();
        assert_eq!(snap[0].id, second.id);
        assert_eq!(snap[1].id, first.id);
    }

    #[test]
    fn create_rejects_non_positive_quantity() {
        let (mut repo, _) = setup();
        for qty in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let err = repo.create_batch("prod_1", qty).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert!(repo.is_empty());
    }

    #[test]
    fn create_rejects_unknown_product_as_invalid_input() {
        let (mut repo, _) = setup();
        let err = repo.create_batch("prod_404", 5.0).unwrap_err();
        assert_eq!(err, MesError::InvalidInput("unknown product prod_404".into()));
        assert!(repo.is_empty());
    }

    #[test]
    fn create_with_explicit_operator_and_shift() {
        let (mut repo, _) = setup();
        let batch = repo
            .create_batch_with(NewBatch {
                product_id: "prod_3".into(),
                planned_qty_kl: 4.0,
                operator_id: "user_1".into(),
                shift: Shift::C,
            })
            .unwrap();
        assert_eq!(batch.shift, Shift::C);
        assert_eq!(batch.operator_id, "user_1");

        let err = repo
            .create_batch_with(NewBatch {
                product_id: "prod_3".into(),
                planned_qty_kl: 4.0,
                operator_id: "ghost".into(),
                shift: Shift::B,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn start_blending_twice_is_rejected_and_keeps_first_stamp() {
        let (mut repo, clock) = setup();
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        clock.advance(Duration::minutes(1));
        let started = repo.start_blending(&id).unwrap();
        let first_stamp = started.blending_start.unwrap();

        clock.advance(Duration::minutes(1));
        let err = repo.start_blending(&id).unwrap_err();
        assert!(matches!(
            err,
            MesError::InvalidTransition {
                operation: Operation::StartBlending,
                status: BatchStatus::InProgress,
                ..
            }
        ));
        assert_eq!(repo.get(&id).unwrap().blending_start, Some(first_stamp));
    }

    #[test]
    fn unknown_batch_is_not_found() {
        let (mut repo, _) = setup();
        let err = repo.start_blending("missing").unwrap_err();
        assert_eq!(err, MesError::not_found("Batch", "missing"));
        let err = repo.complete_filling("missing", 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn complete_blending_sets_provisional_quantity() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        let batch = repo.get(&id).unwrap();
        assert_eq!(batch.status, BatchStatus::ReadyForQc);
        assert_eq!(batch.actual_qty_kl, 10.0);
        assert!(batch.blending_end.unwrap() >= batch.blending_start.unwrap());
    }

    #[test]
    fn qc_pass_releases_to_filling() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        let b = repo.record_qc(&id, QcResult::Pass, "user_3").unwrap();
        assert_eq!(b.status, BatchStatus::ReadyForFilling);
        assert_eq!(b.qc_result, Some(QcResult::Pass));
        assert_eq!(b.qc_engineer_id.as_deref(), Some("user_3"));
        assert!(b.qc_date.is_some());
    }

    #[test]
    fn qc_hold_stays_testable() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        let held = repo.record_qc(&id, QcResult::Hold, "user_3").unwrap();
        assert_eq!(held.status, BatchStatus::ReadyForQc);
        assert_eq!(held.qc_result, Some(QcResult::Hold));
        assert_eq!(held.qc_engineer_id.as_deref(), Some("user_3"));
        assert!(held.qc_date.is_some());

        clock.advance(Duration::minutes(30));
        let passed = repo.record_qc(&id, QcResult::Pass, "user_3").unwrap();
        assert_eq!(passed.status, BatchStatus::ReadyForFilling);
        assert!(passed.qc_date > held.qc_date);
    }

    #[test]
    fn qc_fail_sends_batch_back_for_rework() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        let failed = repo.record_qc(&id, QcResult::Fail, "user_3").unwrap();
        assert_eq!(failed.status, BatchStatus::Planned);
        assert_eq!(failed.qc_result, Some(QcResult::Fail));
        assert_eq!(failed.qc_engineer_id.as_deref(), Some("user_3"));
        assert!(failed.qc_date.is_some());
        assert_eq!(failed.actual_qty_kl, 0.0);
        assert!(failed.blending_start.is_none());
        assert_eq!(failed.rework_history.len(), 1);
        assert!(failed.check_invariants().is_ok());

        clock.advance(Duration::minutes(5));
        let reblend = repo.start_blending(&id).unwrap();
        assert!(reblend.blending_start.unwrap() >= failed.qc_date.unwrap());
        assert!(reblend.check_invariants().is_ok());
    }

    #[test]
    fn qc_with_unknown_engineer_changes_nothing() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        let before = repo.get(&id).unwrap().clone();
        let err = repo.record_qc(&id, QcResult::Pass, "nobody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(repo.get(&id).unwrap(), &before);
    }

    #[test]
    fn qc_before_blending_is_invalid_transition() {
        let (mut repo, _) = setup();
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        let err = repo.record_qc(&id, QcResult::Pass, "user_3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(repo.get(&id).unwrap().qc_result.is_none());
    }

    #[test]
    fn start_filling_validates_line() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        repo.record_qc(&id, QcResult::Pass, "user_3").unwrap();

        let err = repo.start_filling(&id, "line_404").unwrap_err();
        assert_eq!(err, MesError::not_found("Filling line", "line_404"));
        assert_eq!(repo.get(&id).unwrap().status, BatchStatus::ReadyForFilling);

        // Maintenance is the caller's concern; the engine still accepts it.
        let b = repo.start_filling(&id, "line_3").unwrap();
        assert_eq!(b.status, BatchStatus::Filling);
        assert_eq!(b.filling_line_id.as_deref(), Some("line_3"));
    }

    #[test]
    fn complete_filling_rejects_negative_quantity() {
        let (mut repo, clock) = setup();
        let id = ready_for_qc(&mut repo, &clock);
        repo.record_qc(&id, QcResult::Pass, "user_3").unwrap();
        repo.start_filling(&id, "line_1").unwrap();
        let before = repo.get(&id).unwrap().clone();

        let err = repo.complete_filling(&id, -0.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(repo.get(&id).unwrap(), &before);

        let done = repo.complete_filling(&id, 0.0).unwrap();
        assert_eq!(done.status, BatchStatus::Dispatched);
        assert_eq!(done.actual_qty_kl, 0.0);
    }

    #[test]
    fn end_to_end_dispatch() {
        let (mut repo, clock) = setup();
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        for step in 0..5 {
            clock.advance(Duration::minutes(15));
            match step {
                0 => repo.start_blending(&id),
                1 => repo.complete_blending(&id),
                2 => repo.record_qc(&id, QcResult::Pass, "user_3"),
                3 => repo.start_filling(&id, "line_1"),
                _ => repo.complete_filling(&id, 9.5),
            }
            .unwrap();
            assert!(repo.get(&id).unwrap().check_invariants().is_ok());
        }

        let b = repo.get(&id).unwrap();
        assert_eq!(b.status, BatchStatus::Dispatched);
        assert_eq!(b.actual_qty_kl, 9.5);
        let stamps = [
            b.blending_start.unwrap(),
            b.blending_end.unwrap(),
            b.qc_date.unwrap(),
            b.filling_start.unwrap(),
            b.filling_end.unwrap(),
            b.dispatched_at.unwrap(),
        ];
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(b.filling_end, b.dispatched_at);
        assert_eq!(b.cycle_time(), Some(Duration::minutes(60)));
        assert_eq!(
            b.history.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![
                BatchStatus::InProgress,
                BatchStatus::ReadyForQc,
                BatchStatus::ReadyForFilling,
                BatchStatus::Filling,
                BatchStatus::Dispatched,
            ]
        );

        let err = repo.complete_filling(&id, 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn stamps_never_go_backwards_when_clock_does() {
        let (mut repo, clock) = setup();
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        clock.advance(Duration::minutes(10));
        let started = repo.start_blending(&id).unwrap();
        clock.set(t0() - Duration::hours(1));
        let ended = repo.complete_blending(&id).unwrap();
        assert_eq!(ended.blending_end, started.blending_start);
        assert!(ended.check_invariants().is_ok());
    }

    #[test]
    fn held_snapshots_do_not_change() {
        let (mut repo, _) = setup();
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        let before = repo.snapshot();
        repo.start_blending(&id).unwrap();
        assert_eq!(before[0].status, BatchStatus::Planned);
        assert_eq!(repo.snapshot()[0].status, BatchStatus::InProgress);
    }

    #[test]
    fn subscribers_see_accepted_commands_only() {
        let (mut repo, _) = setup();
        let mut rx = repo.subscribe();
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        repo.complete_blending(&id).unwrap_err();
        assert!(!rx.has_changed().unwrap());

        repo.start_blending(&id).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update()[0].status, BatchStatus::InProgress);
    }

    #[test]
    fn query_filters_by_status_product_and_shift() {
        let (mut repo, _) = setup();
        let a = repo.create_batch("prod_1", 1.0).unwrap();
        repo.create_batch("prod_2", 1.0).unwrap();
        repo.create_batch_with(NewBatch {
            product_id: "prod_1".into(),
            planned_qty_kl: 3.0,
            operator_id: "user_2".into(),
            shift: Shift::B,
        })
        .unwrap();
        repo.start_blending(&a.id).unwrap();

        assert_eq!(repo.query(&BatchFilter::default()).len(), 3);
        assert_eq!(repo.query(&BatchFilter::default().product("prod_1")).len(), 2);
        assert_eq!(repo.query(&BatchFilter::default().shift(Shift::B)).len(), 1);
        let blending = repo.query(&BatchFilter::default().status(BatchStatus::InProgress));
        assert_eq!(blending.len(), 1);
        assert_eq!(blending[0].id, a.id);
        assert!(
            repo.query(&BatchFilter::default().product("prod_2").status(BatchStatus::InProgress))
                .is_empty()
        );
    }

    #[test]
    fn seeded_batches_are_validated() {
        let (repo, _) = setup();
        let mut bad = Batch::new(
            "x".into(),
            "B-2026-009000".into(),
            "prod_1".into(),
            5.0,
            "user_2".into(),
            Shift::A,
            t0(),
        );
        bad.status = BatchStatus::Filling;
        let err = repo.with_batches(vec![bad]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn seeded_numbers_advance_the_sequence() {
        let (repo, _) = setup();
        let seed = Batch::new(
            "old".into(),
            "B-2026-002600".into(),
            "prod_1".into(),
            5.0,
            "user_2".into(),
            Shift::A,
            t0() - Duration::days(1),
        );
        let mut repo = repo.with_batches(vec![seed]).unwrap();
        let fresh = repo.create_batch("prod_1", 1.0).unwrap();
        assert_eq!(fresh.batch_number, "B-2026-002601");
        assert_eq!(repo.snapshot()[0].id, fresh.id);
    }

    #[test]
    fn seeding_the_last_sequence_number_is_rejected() {
        let (repo, _) = setup();
        let seed = Batch::new(
            "last".into(),
            format!("B-2026-{}", u64::MAX),
            "prod_1".into(),
            5.0,
            "user_2".into(),
            Shift::A,
            t0(),
        );
        let err = repo.with_batches(vec![seed]).err().unwrap();
        assert_eq!(err, MesError::InvalidInput("batch number sequence exhausted".into()));
    }

    #[test]
    fn exhausted_sequence_rejects_creation() {
        let (repo, _) = setup();
        let mut repo = repo.with_defaults(BatchDefaults {
            first_sequence: u64::MAX,
            ..BatchDefaults::default()
        });
        let mut rx = repo.subscribe();
        let err = repo.create_batch("prod_1", 5.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(repo.is_empty());
        assert!(!rx.has_changed().unwrap());

        // One below the limit still hands out its number, then stops.
        let (repo, _) = setup();
        let mut repo = repo.with_defaults(BatchDefaults {
            first_sequence: u64::MAX - 1,
            ..BatchDefaults::default()
        });
        let b = repo.create_batch("prod_1", 5.0).unwrap();
        assert_eq!(b.batch_number, format!("B-2026-{}", u64::MAX - 1));
        assert_eq!(repo.create_batch("prod_1", 5.0).unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn creation_time_never_precedes_newest_batch() {
        let (mut repo, clock) = setup();
        let first = repo.create_batch("prod_1", 1.0).unwrap();
        clock.set(t0() - Duration::hours(1));
        let second = repo.create_batch("prod_1", 2.0).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.batch_number, "B-2026-002502");
        let snap = repo.snapshot();
        assert_eq!(snap[0].id, second.id);
        assert!(snap.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn blending_progress_follows_status() {
        let (mut repo, clock) = setup();
        let sim = ProcessSimulator::new(std::time::Duration::from_secs(60), Jitter::Off);
        let mut rng = StdRng::seed_from_u64(3);
        let id = repo.create_batch("prod_1", 10.0).unwrap().id;

        assert!(repo.blending_progress(&id, &sim, &mut rng).is_rest());
        repo.start_blending(&id).unwrap();
        clock.advance(Duration::seconds(30));
        let r = repo.blending_progress(&id, &sim, &mut rng);
        assert_eq!(r.progress, 0.5);

        repo.complete_blending(&id).unwrap();
        assert!(repo.blending_progress(&id, &sim, &mut rng).is_rest());
        assert!(repo.blending_progress("unknown", &sim, &mut rng).is_rest());
    }
}
