mod lifecycle;
mod model;
mod repository;
mod trace;

pub use lifecycle::{Lifecycle, Operation};
pub use model::{Batch, BatchStatus, BlendAttempt, QcResult, StatusChange};
pub use repository::{BatchDefaults, BatchFilter, BatchRepository, NewBatch, Snapshot};
pub use trace::{Stage, StageRecord, StageState};
