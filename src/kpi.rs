//! Fleet-level KPIs derived from a batch snapshot.
//!
//! Every function here is total: an empty or partially-populated snapshot
//! yields zeros, never an error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::batch::{Batch, BatchStatus, QcResult};
use crate::catalog::Shift;

/// Plant energy intensity reported until metering is wired in, in kWh/KL.
pub const DEFAULT_ENERGY_PER_KL: f64 = 2.45;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    /// Dispatched actual volume over all planned volume, in whole percent.
    pub yield_pct: u32,
    /// Share of batches whose latest QC decision is FAIL, in whole percent.
    pub quality_loss_pct: u32,
    /// Mean blending-start-to-dispatch time, one decimal.
    pub avg_cycle_time_hours: f64,
    pub energy_per_kl: f64,
    pub batches_planned: usize,
    pub batches_completed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftPerformance {
    pub shift: Shift,
    pub completed: usize,
    pub total: usize,
}

impl ShiftPerformance {
    pub fn completion_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductionSummary {
    pub planned_kl: f64,
    pub dispatched_kl: f64,
}

/// Everything the overview and KPI screens show, in one pass over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub kpis: Kpis,
    pub status_counts: BTreeMap<BatchStatus, usize>,
    pub shifts: Vec<ShiftPerformance>,
    pub product_mix: BTreeMap<String, usize>,
    pub summary: ProductionSummary,
    pub qc_pass_rate_pct: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiAggregator {
    pub energy_per_kl: f64,
}

impl Default for KpiAggregator {
    fn default() -> Self {
        Self {
            energy_per_kl: DEFAULT_ENERGY_PER_KL,
        }
    }
}

impl KpiAggregator {
    pub fn new(energy_per_kl: f64) -> Self {
        Self { energy_per_kl }
    }

    pub fn compute(&self, batches: &[Batch]) -> Kpis {
        let dispatched: Vec<&Batch> = batches.iter().filter(|b| is_dispatched(b)).collect();
        let failed = batches
            .iter()
            .filter(|b| b.qc_result == Some(QcResult::Fail))
            .count();

        let summary = production_summary(batches);

        let cycle_hours: Vec<f64> = dispatched
            .iter()
            .filter_map(|b| b.cycle_time())
            .map(|d| d.num_milliseconds() as f64 / 3_600_000.0)
            .collect();
        let avg_cycle_time_hours = if cycle_hours.is_empty() {
            0.0
        } else {
            let mean = cycle_hours.iter().sum::<f64>() / cycle_hours.len() as f64;
            (mean * 10.0).round() / 10.0
        };

        Kpis {
            yield_pct: percent(summary.dispatched_kl, summary.planned_kl),
            quality_loss_pct: percent(failed as f64, batches.len() as f64),
            avg_cycle_time_hours,
            energy_per_kl: self.energy_per_kl,
            batches_planned: batches.len(),
            batches_completed: dispatched.len(),
        }
    }

    pub fn dashboard(&self, batches: &[Batch]) -> Dashboard {
        Dashboard {
            kpis: self.compute(batches),
            status_counts: status_counts(batches),
            shifts: shift_performance(batches),
            product_mix: product_mix(batches),
            summary: production_summary(batches),
            qc_pass_rate_pct: qc_pass_rate_pct(batches),
        }
    }
}

/// KPIs with the default energy figure.
pub fn compute_kpis(batches: &[Batch]) -> Kpis {
    KpiAggregator::default().compute(batches)
}

/// Batch count per status; every status is present, zero if unused.
pub fn status_counts(batches: &[Batch]) -> BTreeMap<BatchStatus, usize> {
    let mut counts: BTreeMap<BatchStatus, usize> =
        BatchStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for batch in batches {
        *counts.entry(batch.status).or_insert(0) += 1;
    }
    counts
}

pub fn shift_performance(batches: &[Batch]) -> Vec<ShiftPerformance> {
    Shift::ALL
        .into_iter()
        .map(|shift| {
            let on_shift = batches.iter().filter(|b| b.shift == shift);
            ShiftPerformance {
                shift,
                completed: on_shift.clone().filter(|b| is_dispatched(b)).count(),
                total: on_shift.count(),
            }
        })
        .collect()
}

pub fn product_mix(batches: &[Batch]) -> BTreeMap<String, usize> {
    let mut mix = BTreeMap::new();
    for batch in batches {
        *mix.entry(batch.product_id.clone()).or_insert(0) += 1;
    }
    mix
}

pub fn production_summary(batches: &[Batch]) -> ProductionSummary {
    ProductionSummary {
        planned_kl: batches.iter().map(|b| b.planned_qty_kl).sum(),
        dispatched_kl: batches
            .iter()
            .filter(|b| is_dispatched(b))
            .map(|b| b.actual_qty_kl)
            .sum(),
    }
}

/// PASS share among batches that carry a QC decision.
pub fn qc_pass_rate_pct(batches: &[Batch]) -> u32 {
    let decided = batches.iter().filter(|b| b.qc_result.is_some()).count();
    let passed = batches
        .iter()
        .filter(|b| b.qc_result == Some(QcResult::Pass))
        .count();
    percent(passed as f64, decided as f64)
}

fn is_dispatched(batch: &Batch) -> bool {
    batch.status == BatchStatus::Dispatched
}

// Rounded whole percent; 0 when the denominator is not positive.
fn percent(part: f64, whole: f64) -> u32 {
    if whole > 0.0 {
        (part / whole * 100.0).round().max(0.0) as u32
    } else {
        0
    }
}
