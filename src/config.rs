//! Runtime settings loaded from `blendtrack.toml`.
//!
//! Missing keys fall back to defaults. `BLENDTRACK_SEED` overrides the
//! configured RNG seed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;

use crate::batch::BatchDefaults;
use crate::catalog::{ReferenceCatalog, Shift, StaticCatalog};
use crate::kpi::{DEFAULT_ENERGY_PER_KL, KpiAggregator};
use crate::simulator::{Jitter, ProcessSimulator};

pub const CONFIG_FILE: &str = "blendtrack.toml";
pub const SEED_ENV: &str = "BLENDTRACK_SEED";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlendtrackConfig {
    /// Nominal time for a blend to reach full progress.
    #[serde(default = "default_blend_duration_secs")]
    pub blend_duration_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Random noise on simulated readings.
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    #[serde(default = "default_energy_per_kl")]
    pub energy_per_kl: f64,

    #[serde(default = "default_batch_number_start")]
    pub batch_number_start: u64,

    #[serde(default = "default_operator")]
    pub default_operator: String,

    #[serde(default = "default_shift")]
    pub default_shift: Shift,

    /// Reference data file; the built-in demo plant when unset.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Fixed RNG seed for reproducible readings.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_blend_duration_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_jitter() -> bool {
    true
}

fn default_energy_per_kl() -> f64 {
    DEFAULT_ENERGY_PER_KL
}

fn default_batch_number_start() -> u64 {
    2501
}

fn default_operator() -> String {
    "user_2".to_string()
}

fn default_shift() -> Shift {
    Shift::A
}

impl Default for BlendtrackConfig {
    fn default() -> Self {
        Self {
            blend_duration_secs: default_blend_duration_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            jitter: default_jitter(),
            energy_per_kl: default_energy_per_kl(),
            batch_number_start: default_batch_number_start(),
            default_operator: default_operator(),
            default_shift: default_shift(),
            catalog_path: None,
            seed: None,
        }
    }
}

impl BlendtrackConfig {
    /// Loads `blendtrack.toml` from the working directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;

        if let Ok(raw) = std::env::var(SEED_ENV)
            && !raw.is_empty()
        {
            let seed = raw
                .parse()
                .with_context(|| format!("{SEED_ENV} must be an unsigned integer, got {raw:?}"))?;
            config.seed = Some(seed);
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn simulator(&self) -> ProcessSimulator {
        let jitter = if self.jitter { Jitter::On } else { Jitter::Off };
        ProcessSimulator::new(Duration::from_secs(self.blend_duration_secs), jitter)
    }

    pub fn kpi_aggregator(&self) -> KpiAggregator {
        KpiAggregator::new(self.energy_per_kl)
    }

    pub fn batch_defaults(&self) -> BatchDefaults {
        BatchDefaults {
            operator_id: self.default_operator.clone(),
            shift: self.default_shift,
            first_sequence: self.batch_number_start,
        }
    }

    /// Seeded when a seed is configured, from OS entropy otherwise.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn catalog(&self) -> Result<Arc<dyn ReferenceCatalog>> {
        let catalog = match &self.catalog_path {
            Some(path) => StaticCatalog::from_toml_file(path)?,
            None => StaticCatalog::demo(),
        };
        Ok(Arc::new(catalog))
    }
}
