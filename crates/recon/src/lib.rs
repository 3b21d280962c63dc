//! `splitgrid-recon`: expense aggregation and two-grid synchronization.
//!
//! Engine crate: reads the ledger through `LedgerStore`, writes cells
//! through `GridStore`. No CLI or file IO here.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod gate;
pub mod model;
pub mod reconcile;
pub mod store;

pub use aggregate::aggregate_records;
pub use engine::{Orchestrator, SyncContext};
pub use error::SyncError;
pub use gate::{Admission, CycleGate, CycleGuard, CycleKey};
pub use model::{
    Aggregates, CategoryTotals, CellFailure, CellWrite, CycleOutcome, GridReport, LedgerSnapshot,
    SyncMeta, SyncResult,
};
pub use reconcile::{plan_cells, reconcile, reconcile_filtered, retry_failed_writes, GridSide, GridTargets, PlannedCell};
pub use store::{GridError, GridStore, LedgerError, LedgerStore, MemoryGrid, MemoryLedger};
