//! Batch lifecycle tracking for a lubricant blending plant.
//!
//! A [`BatchRepository`] owns every batch and moves it through
//! PLANNED → IN_PROGRESS → READY_FOR_QC → READY_FOR_FILLING → FILLING →
//! DISPATCHED, with QC able to hold a batch or send it back for re-blending.
//! [`ProcessSimulator`] produces live readings for batches being blended and
//! [`KpiAggregator`] derives plant KPIs from any snapshot.

pub mod batch;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod kpi;
pub mod logging;
pub mod monitor;
pub mod sample;
pub mod simulator;
pub mod ui;

pub use batch::{Batch, BatchRepository, BatchStatus, Operation, QcResult, Snapshot};
pub use catalog::{ReferenceCatalog, StaticCatalog};
pub use config::BlendtrackConfig;
pub use error::{ErrorKind, MesError};
pub use kpi::{KpiAggregator, Kpis, compute_kpis};
pub use monitor::BlendMonitor;
pub use simulator::{BlendReading, Jitter, ProcessSimulator};
