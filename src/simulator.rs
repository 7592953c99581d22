//! Synthetic blend telemetry for batches that are currently blending.
//!
//! Readings follow a fixed ramp over the nominal blend duration and carry a
//! small uniform jitter drawn from a caller-supplied RNG. Pass a seeded
//! `StdRng` or use [`Jitter::Off`] to get reproducible figures.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::{Batch, BatchStatus};
use crate::catalog::ReferenceCatalog;

/// Blend time used when nothing else is configured: 60 seconds for a full run.
pub const DEFAULT_BLEND_DURATION: Duration = Duration::from_secs(60);

/// One live reading from the blend tank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendReading {
    /// Fraction of the nominal blend time elapsed, in `[0, 1]`.
    pub progress: f64,
    pub base_oil_pct: f64,
    pub additive_a_pct: f64,
    pub additive_b_pct: f64,
    pub temperature_c: f64,
    pub pressure_bar: f64,
}

impl BlendReading {
    /// The reading for a tank that is not blending: everything zero.
    pub fn rest() -> Self {
        Self::default()
    }

    pub fn is_rest(&self) -> bool {
        *self == Self::rest()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jitter {
    On,
    Off,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessSimulator {
    pub blend_duration: Duration,
    pub jitter: Jitter,
}

impl Default for ProcessSimulator {
    fn default() -> Self {
        Self {
            blend_duration: DEFAULT_BLEND_DURATION,
            jitter: Jitter::On,
        }
    }
}

impl ProcessSimulator {
    pub fn new(blend_duration: Duration, jitter: Jitter) -> Self {
        Self {
            blend_duration,
            jitter,
        }
    }

    /// Fraction of the blend completed `now`, saturating at 1.
    pub fn progress(&self, blending_start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let elapsed_ms = (now - blending_start).num_milliseconds().max(0) as f64;
        let total_ms = self.blend_duration.as_millis() as f64;
        if total_ms <= 0.0 {
            return 1.0;
        }
        (elapsed_ms / total_ms).min(1.0)
    }

    /// Current reading for `batch`. Anything not IN_PROGRESS reads as rest.
    pub fn reading<R: Rng>(&self, batch: &Batch, now: DateTime<Utc>, rng: &mut R) -> BlendReading {
        let start = match (batch.status, batch.blending_start) {
            (BatchStatus::InProgress, Some(start)) => start,
            _ => return BlendReading::rest(),
        };

        let p = self.progress(start, now);
        let mut j = |width: f64| self.jitter(&mut *rng, width);

        BlendReading {
            progress: p,
            base_oil_pct: (85.0 + p * 15.0 + j(2.0)).min(100.0),
            additive_a_pct: (10.0 + p * 5.0 + j(1.0)).min(100.0),
            additive_b_pct: (5.0 + p * 2.0 + j(0.5)).min(100.0),
            temperature_c: 20.0 + p * 60.0 + j(3.0),
            pressure_bar: 1.0 + p * 2.5 + j(0.1),
        }
    }

    // Uniform in [-width/2, width/2).
    fn jitter<R: Rng>(&self, rng: &mut R, width: f64) -> f64 {
        match self.jitter {
            Jitter::On => (rng.r#gen::<f64>() - 0.5) * width,
            Jitter::Off => 0.0,
        }
    }
}

/// Looks up `batch_id` in a snapshot and simulates it. Unknown batches and
/// products without a recipe read as rest; this never fails.
pub fn blending_progress<R: Rng>(
    batches: &[Batch],
    catalog: &dyn ReferenceCatalog,
    batch_id: &str,
    simulator: &ProcessSimulator,
    now: DateTime<Utc>,
    rng: &mut R,
) -> BlendReading {
    let Some(batch) = batches.iter().find(|b| b.id == batch_id) else {
        debug!(batch_id, "blending progress requested for unknown batch");
        return BlendReading::rest();
    };
    if catalog.recipe_for(&batch.product_id).is_none() {
        debug!(batch = %batch.batch_number, product = %batch.product_id, "no recipe, reading rest");
        return BlendReading::rest();
    }
    simulator.reading(batch, now, rng)
}
