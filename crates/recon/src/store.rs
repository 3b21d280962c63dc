//! Collaborator seams: the ledger the engine reads and the grids it writes.
//!
//! The engine only needs `list_by_owner`, `list_shared` and a version
//! counter from the ledger, and single-cell read/write from the grid store.
//! In-memory implementations live here too, for tests and embedders.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use splitgrid_core::{CellAddress, ExpenseRecord, OwnerId, SharingMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No record with this id.
    NotFound(String),
    /// Actor tried to change someone else's record.
    NotOwner { id: String, owner: String },
    /// Record content rejected (bad amount, unknown mode, ...).
    Invalid(String),
    /// Backend failure.
    Storage(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "expense '{id}' not found"),
            Self::NotOwner { id, owner } => {
                write!(f, "expense '{id}' belongs to '{owner}' and cannot be changed by you")
            }
            Self::Invalid(msg) => write!(f, "invalid expense: {msg}"),
            Self::Storage(msg) => write!(f, "ledger storage error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Could not reach the grid store.
    Transport(String),
    /// Grid store answered with an error status.
    Rejected { status: u16, message: String },
    /// Cell content could not be read as a number.
    Parse(String),
    /// Local backend failure.
    Storage(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "grid transport error: {msg}"),
            Self::Rejected { status, message } => write!(f, "grid rejected write (HTTP {status}): {message}"),
            Self::Parse(msg) => write!(f, "grid value parse error: {msg}"),
            Self::Storage(msg) => write!(f, "grid storage error: {msg}"),
        }
    }
}

impl std::error::Error for GridError {}

/// Read side of the authoritative expense store.
pub trait LedgerStore: Send + Sync {
    /// Every record owned by `owner`, personal and shared.
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError>;

    /// Every shared record, regardless of owner.
    fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError>;

    /// Monotonic counter bumped by every mutation.
    fn version(&self) -> Result<u64, LedgerError>;
}

/// Per-party grid of cell → value (cents).
pub trait GridStore: Send + Sync {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError>;

    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError>;

    /// Write several cells. Results line up with `cells`; one failure does
    /// not stop the rest.
    fn write_cells(&self, grid_id: &str, cells: &[(CellAddress, i64)]) -> Vec<Result<(), GridError>> {
        cells
            .iter()
            .map(|(address, value)| self.write_cell(grid_id, address, *value))
            .collect()
    }
}

impl<T: LedgerStore + ?Sized> LedgerStore for &T {
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
        (**self).list_by_owner(owner)
    }
    fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError> {
        (**self).list_shared()
    }
    fn version(&self) -> Result<u64, LedgerError> {
        (**self).version()
    }
}

impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
        (**self).list_by_owner(owner)
    }
    fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError> {
        (**self).list_shared()
    }
    fn version(&self) -> Result<u64, LedgerError> {
        (**self).version()
    }
}

impl<T: GridStore + ?Sized> GridStore for &T {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        (**self).read_cell(grid_id, address)
    }
    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        (**self).write_cell(grid_id, address, value_cents)
    }
    fn write_cells(&self, grid_id: &str, cells: &[(CellAddress, i64)]) -> Vec<Result<(), GridError>> {
        (**self).write_cells(grid_id, cells)
    }
}

impl<T: GridStore + ?Sized> GridStore for Arc<T> {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        (**self).read_cell(grid_id, address)
    }
    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        (**self).write_cell(grid_id, address, value_cents)
    }
    fn write_cells(&self, grid_id: &str, cells: &[(CellAddress, i64)]) -> Vec<Result<(), GridError>> {
        (**self).write_cells(grid_id, cells)
    }
}

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<MemoryLedgerState>,
}

#[derive(Debug, Default)]
struct MemoryLedgerState {
    version: u64,
    records: Vec<ExpenseRecord>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ExpenseRecord>) -> Self {
        Self {
            inner: Mutex::new(MemoryLedgerState { version: 1, records }),
        }
    }

    /// Insert or replace by id.
    pub fn upsert(&self, record: ExpenseRecord) {
        let mut state = self.inner.lock();
        match state.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => state.records.push(record),
        }
        state.version += 1;
    }

    pub fn remove(&self, id: &str) -> Option<ExpenseRecord> {
        let mut state = self.inner.lock();
        let pos = state.records.iter().position(|r| r.id == id)?;
        state.version += 1;
        Some(state.records.remove(pos))
    }

    pub fn records(&self) -> Vec<ExpenseRecord> {
        self.inner.lock().records.clone()
    }
}

impl LedgerStore for MemoryLedger {
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
        Ok(self
            .inner
            .lock()
            .records
            .iter()
            .filter(|r| &r.owner_id == owner)
            .cloned()
            .collect())
    }

    fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError> {
        Ok(self
            .inner
            .lock()
            .records
            .iter()
            .filter(|r| r.sharing_mode == SharingMode::Shared)
            .cloned()
            .collect())
    }

    fn version(&self) -> Result<u64, LedgerError> {
        Ok(self.inner.lock().version)
    }
}

// ---------------------------------------------------------------------------
// In-memory grid
// ---------------------------------------------------------------------------

/// Grid store backed by a map, with a log of every write in order.
#[derive(Debug, Default)]
pub struct MemoryGrid {
    inner: Mutex<MemoryGridState>,
}

#[derive(Debug, Default)]
struct MemoryGridState {
    cells: HashMap<(String, CellAddress), i64>,
    log: Vec<(String, CellAddress, i64)>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without recording it as a write.
    pub fn seed(&self, grid_id: &str, address: CellAddress, value_cents: i64) {
        self.inner.lock().cells.insert((grid_id.to_string(), address), value_cents);
    }

    pub fn value(&self, grid_id: &str, address: &CellAddress) -> Option<i64> {
        self.inner
            .lock()
            .cells
            .get(&(grid_id.to_string(), address.clone()))
            .copied()
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(String, CellAddress, i64)> {
        self.inner.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.inner.lock().log.clear();
    }

    /// All non-empty cells of one grid.
    pub fn cells(&self, grid_id: &str) -> HashMap<CellAddress, i64> {
        self.inner
            .lock()
            .cells
            .iter()
            .filter(|((g, _), _)| g == grid_id)
            .map(|((_, a), v)| (a.clone(), *v))
            .collect()
    }
}

impl GridStore for MemoryGrid {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        Ok(self.value(grid_id, address))
    }

    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        let mut state = self.inner.lock();
        state.cells.insert((grid_id.to_string(), address.clone()), value_cents);
        state.log.push((grid_id.to_string(), address.clone(), value_cents));
        Ok(())
    }
}
