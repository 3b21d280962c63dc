use std::collections::BTreeMap;

use serde::Serialize;
use splitgrid_core::{CellAddress, ExpenseRecord, OwnerId, Period};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Records visible to one owner's cycle, deduplicated by id, taken at one
/// ledger version.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub version: u64,
    pub records: Vec<ExpenseRecord>,
}

impl LedgerSnapshot {
    /// Merge listings into one id-ordered set. The owner's own shared
    /// records show up in both their listing and the shared listing; a
    /// record that shows up twice with different content means the store
    /// moved underneath us.
    pub fn merge<I>(version: u64, listings: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = Vec<ExpenseRecord>>,
    {
        let mut by_id: BTreeMap<String, ExpenseRecord> = BTreeMap::new();
        for listing in listings {
            for record in listing {
                match by_id.get(&record.id) {
                    Some(existing) if existing != &record => {
                        return Err(SyncError::SnapshotInconsistency { attempts: 1 });
                    }
                    Some(_) => {}
                    None => {
                        by_id.insert(record.id.clone(), record);
                    }
                }
            }
        }
        Ok(Self {
            version,
            records: by_id.into_values().collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Totals for one category, seen from the acting owner's cycle.
///
/// `shared_cents` is the acting owner's half of shared expenses and
/// `partner_shared_cents` the partner's half; the two always sum to the
/// category's shared spend. `aggregate_records` rejects any record that
/// would push a field or either cell value past `i64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTotals {
    pub personal_cents: i64,
    pub shared_cents: i64,
    pub partner_personal_cents: i64,
    pub partner_shared_cents: i64,
}

impl CategoryTotals {
    /// Value for the owner's grid.
    pub fn owner_value(&self) -> i64 {
        self.personal_cents + self.shared_cents
    }

    /// Value for the partner's grid. Never includes the owner's personal spend.
    pub fn partner_value(&self) -> i64 {
        self.partner_personal_cents + self.partner_shared_cents
    }
}

/// Result of one aggregation pass. Every mapped category is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub owner: OwnerId,
    pub partner: OwnerId,
    pub period: Period,
    pub category_version: u32,
    pub totals: BTreeMap<String, CategoryTotals>,
}

impl Aggregates {
    pub fn get(&self, category: &str) -> Option<&CategoryTotals> {
        self.totals.get(category)
    }
}

// ---------------------------------------------------------------------------
// Sync result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellWrite {
    pub address: CellAddress,
    pub category: String,
    pub value_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellFailure {
    pub address: CellAddress,
    pub category: String,
    pub value_cents: i64,
    pub error: String,
}

/// Outcome of the writes against one grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridReport {
    pub grid_id: String,
    pub written: Vec<CellWrite>,
    pub failed: Vec<CellFailure>,
    pub skipped: Vec<CellAddress>,
}

impl GridReport {
    pub fn new(grid_id: impl Into<String>) -> Self {
        Self {
            grid_id: grid_id.into(),
            written: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncMeta {
    pub engine_version: String,
    pub run_at: String,
    /// Set by the orchestrator; None when `reconcile` is called directly.
    pub ledger_version: Option<u64>,
    pub category_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub owner: OwnerId,
    pub partner: OwnerId,
    pub period: Period,
    pub owner_grid: GridReport,
    pub partner_grid: GridReport,
    pub meta: SyncMeta,
}

impl SyncResult {
    pub fn is_complete(&self) -> bool {
        self.owner_grid.is_complete() && self.partner_grid.is_complete()
    }

    pub fn failed_count(&self) -> usize {
        self.owner_grid.failed.len() + self.partner_grid.failed.len()
    }
}

/// What `run_cycle` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// This call ran the cycle (possibly more than once, if requests were
    /// coalesced into it). The result is from the last run.
    Completed(SyncResult),
    /// Another cycle for the same owner and period was in flight; it will
    /// re-run and pick up this request.
    Coalesced,
}

impl CycleOutcome {
    pub fn result(&self) -> Option<&SyncResult> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Coalesced => None,
        }
    }
}
