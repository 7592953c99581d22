//! Demo plant floor: one batch in every stage, timed relative to `now`.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::batch::{
    Batch, BatchDefaults, BatchRepository, BatchStatus, BlendAttempt, QcResult, StatusChange,
};
use crate::catalog::{ReferenceCatalog, Shift};
use crate::clock::Clock;
use crate::error::MesError;

const QC_ENGINEER: &str = "user_3";
const OPERATOR: &str = "user_2";

fn ago(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now - Duration::minutes(minutes)
}

fn planned(
    now: DateTime<Utc>,
    seq: u32,
    product: &str,
    qty: f64,
    shift: Shift,
    created_min_ago: i64,
) -> Batch {
    Batch::new(
        format!("batch_{seq:03}"),
        format!("B-{}-{:06}", now.year(), 2500 + seq),
        product.to_string(),
        qty,
        OPERATOR.to_string(),
        shift,
        ago(now, created_min_ago),
    )
}

fn step(batch: &mut Batch, to: BatchStatus, at: DateTime<Utc>) {
    batch.history.push(StatusChange {
        from: batch.status,
        to,
        at,
    });
    batch.status = to;
}

fn blend(batch: &mut Batch, start: DateTime<Utc>, end: Option<DateTime<Utc>>) {
    batch.blending_start = Some(start);
    step(batch, BatchStatus::InProgress, start);
    if let Some(end) = end {
        batch.blending_end = Some(end);
        batch.actual_qty_kl = batch.planned_qty_kl;
        step(batch, BatchStatus::ReadyForQc, end);
    }
}

fn pass_qc(batch: &mut Batch, at: DateTime<Utc>) {
    batch.qc_result = Some(QcResult::Pass);
    batch.qc_engineer_id = Some(QC_ENGINEER.to_string());
    batch.qc_date = Some(at);
    step(batch, BatchStatus::ReadyForFilling, at);
}

fn fill(batch: &mut Batch, line: &str, start: DateTime<Utc>, end: Option<(DateTime<Utc>, f64)>) {
    batch.filling_line_id = Some(line.to_string());
    batch.filling_start = Some(start);
    step(batch, BatchStatus::Filling, start);
    if let Some((end, actual)) = end {
        batch.filling_end = Some(end);
        batch.dispatched_at = Some(end);
        batch.actual_qty_kl = actual;
        step(batch, BatchStatus::Dispatched, end);
    }
}

/// Seven batches covering every status, plus one that failed QC and waits
/// to be re-blended. Newest first.
pub fn sample_batches(now: DateTime<Utc>) -> Vec<Batch> {
    let b1 = planned(now, 1, "prod_1", 10.0, Shift::A, 120);

    let mut b2 = planned(now, 2, "prod_2", 15.0, Shift::A, 60);
    blend(&mut b2, ago(now, 30), None);

    let mut b3 = planned(now, 3, "prod_1", 12.0, Shift::B, 180);
    blend(&mut b3, ago(now, 150), Some(ago(now, 90)));

    let mut b4 = planned(now, 4, "prod_2", 10.0, Shift::B, 300);
    blend(&mut b4, ago(now, 270), Some(ago(now, 240)));
    pass_qc(&mut b4, ago(now, 210));

    let mut b5 = planned(now, 5, "prod_1", 8.0, Shift::A, 480);
    blend(&mut b5, ago(now, 450), Some(ago(now, 420)));
    pass_qc(&mut b5, ago(now, 360));
    fill(&mut b5, "line_1", ago(now, 300), Some((ago(now, 270), 7.8)));

    let mut b6 = planned(now, 6, "prod_3", 6.0, Shift::C, 360);
    blend(&mut b6, ago(now, 330), Some(ago(now, 300)));
    pass_qc(&mut b6, ago(now, 270));
    fill(&mut b6, "line_2", ago(now, 40), None);

    let mut b7 = planned(now, 7, "prod_3", 9.0, Shift::C, 540);
    let (start, end, failed) = (ago(now, 510), ago(now, 480), ago(now, 450));
    blend(&mut b7, start, Some(end));
    b7.rework_history.push(BlendAttempt {
        blending_start: start,
        blending_end: end,
        provisional_qty_kl: b7.actual_qty_kl,
        failed_at: failed,
        engineer_id: QC_ENGINEER.to_string(),
    });
    b7.blending_start = None;
    b7.blending_end = None;
    b7.actual_qty_kl = 0.0;
    b7.qc_result = Some(QcResult::Fail);
    b7.qc_engineer_id = Some(QC_ENGINEER.to_string());
    b7.qc_date = Some(failed);
    step(&mut b7, BatchStatus::Planned, failed);

    let mut batches = vec![b1, b2, b3, b4, b5, b6, b7];
    batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    batches
}

/// A repository over `catalog`, seeded with [`sample_batches`] as of `clock.now()`.
pub fn demo_repository(
    catalog: Arc<dyn ReferenceCatalog>,
    clock: Arc<dyn Clock>,
    defaults: BatchDefaults,
) -> Result<BatchRepository, MesError> {
    let seed = sample_batches(clock.now());
    BatchRepository::new(catalog)
        .with_clock(clock)
        .with_defaults(defaults)
        .with_batches(seed)
}
