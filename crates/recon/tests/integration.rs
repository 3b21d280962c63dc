use std::sync::mpsc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use splitgrid_config::Settings;
use splitgrid_core::{CellAddress, ExpenseRecord, OwnerId, Period, SharingMode};
use splitgrid_recon::{
    CycleOutcome, GridError, GridStore, LedgerError, LedgerStore, MemoryGrid, MemoryLedger, Orchestrator,
    SyncContext, SyncError,
};

const CONFIG: &str = r#"
[[parties]]
owner_id = "alice"
grid_id = "sheet-alice"

[[parties]]
owner_id = "bob"
grid_id = "sheet-bob"

[sync]
partner_writes = "touched"
write_attempts = 2
"#;

fn context() -> SyncContext {
    let settings = Settings::from_toml(CONFIG).unwrap();
    SyncContext::from_settings(&settings).unwrap()
}

fn march() -> Period {
    Period::parse("2026-03").unwrap()
}

fn expense(id: &str, owner: &str, category: &str, cents: i64, mode: SharingMode) -> ExpenseRecord {
    ExpenseRecord {
        id: id.into(),
        owner_id: owner.into(),
        description: format!("{category} #{id}"),
        category: category.into(),
        amount_cents: cents,
        sharing_mode: mode,
        created_at: Utc.with_ymd_and_hms(2026, 3, 4, 19, 30, 0).unwrap(),
    }
}

fn cell(s: &str) -> CellAddress {
    CellAddress::parse(s).unwrap()
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn personal_expense_lands_in_owner_grid_only() {
    let ledger = MemoryLedger::with_records(vec![expense("e1", "alice", "Food", 3000, SharingMode::Personal)]);
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());

    let outcome = orch.run_cycle(&"alice".into(), march()).unwrap();
    let result = outcome.result().unwrap();

    assert!(result.is_complete());
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(3000));
    assert_eq!(orch.grids().value("sheet-bob", &cell("D34")), None);
    // Every category on the owner grid, nothing on the partner grid.
    assert_eq!(result.owner_grid.written.len(), 15);
    assert!(result.partner_grid.written.is_empty());
}

#[test]
fn shared_expense_splits_with_odd_cent_to_initiator() {
    let ledger = MemoryLedger::with_records(vec![expense("e1", "alice", "Food", 1001, SharingMode::Shared)]);
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());

    orch.run_cycle(&"alice".into(), march()).unwrap();
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(501));
    assert_eq!(orch.grids().value("sheet-bob", &cell("D34")), Some(500));
}

#[test]
fn shared_to_personal_moves_everything_back() {
    let ledger = MemoryLedger::with_records(vec![expense("e1", "alice", "Food", 1001, SharingMode::Shared)]);
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());
    orch.run_cycle(&"alice".into(), march()).unwrap();

    ledger.upsert(expense("e1", "alice", "Food", 1001, SharingMode::Personal));
    orch.run_cycle(&"alice".into(), march()).unwrap();

    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(1001));
    assert_eq!(orch.grids().value("sheet-bob", &cell("D34")), Some(0));
}

#[test]
fn other_months_are_left_alone() {
    let mut feb = expense("e0", "alice", "Food", 4200, SharingMode::Personal);
    feb.created_at = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap();
    let ledger = MemoryLedger::with_records(vec![feb, expense("e1", "alice", "Food", 100, SharingMode::Personal)]);
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());

    orch.run_cycle(&"alice".into(), march()).unwrap();
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(100));
    assert_eq!(orch.grids().value("sheet-alice", &cell("C34")), None);

    orch.run_cycle(&"alice".into(), Period::parse("2026-02").unwrap()).unwrap();
    assert_eq!(orch.grids().value("sheet-alice", &cell("C34")), Some(4200));
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(100));
}

#[test]
fn cycle_outcome_serializes_with_status_tag() {
    let orch = Orchestrator::new(MemoryLedger::new(), MemoryGrid::new(), context());
    let outcome = orch.run_cycle(&"bob".into(), march()).unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["status"], "completed");
    assert_eq!(json["owner"], "bob");
    assert_eq!(json["owner_grid"]["grid_id"], "sheet-bob");
    assert_eq!(json["meta"]["ledger_version"], 0);
}

// -------------------------------------------------------------------------
// Coalescing
// -------------------------------------------------------------------------

/// Grid that parks the first write until the test lets it go.
struct ParkedGrid {
    inner: MemoryGrid,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GridStore for ParkedGrid {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        self.inner.read_cell(grid_id, address)
    }

    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        let entered = self.entered.lock().take();
        if let Some(tx) = entered {
            tx.send(()).unwrap();
            let rx = self.release.lock().take().unwrap();
            rx.recv().unwrap();
        }
        self.inner.write_cell(grid_id, address, value_cents)
    }
}

#[test]
fn concurrent_request_coalesces_and_is_not_lost() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let grid = ParkedGrid {
        inner: MemoryGrid::new(),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(Some(release_rx)),
    };
    let ledger = MemoryLedger::with_records(vec![expense("e1", "alice", "Food", 1000, SharingMode::Personal)]);
    let orch = Orchestrator::new(&ledger, &grid, context());

    let first = std::thread::scope(|scope| {
        let running = scope.spawn(|| orch.run_cycle(&"alice".into(), march()));

        // First cycle is mid-write; a new expense arrives and triggers again.
        entered_rx.recv().unwrap();
        ledger.upsert(expense("e2", "alice", "Food", 234, SharingMode::Personal));
        let second = orch.run_cycle(&"alice".into(), march()).unwrap();
        assert_eq!(second, CycleOutcome::Coalesced);

        release_tx.send(()).unwrap();
        running.join().unwrap().unwrap()
    });

    let result = first.result().unwrap();
    assert_eq!(result.meta.ledger_version, Some(2));
    assert_eq!(grid.inner.value("sheet-alice", &cell("D34")), Some(1234));
}

#[test]
fn different_owners_do_not_coalesce() {
    let ledger = MemoryLedger::with_records(vec![
        expense("e1", "alice", "Food", 1001, SharingMode::Shared),
        expense("e2", "bob", "Rent", 90000, SharingMode::Personal),
    ]);
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());

    let results = orch.sync_all(march());
    for (owner, outcome) in &results {
        let outcome = outcome.as_ref().unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed(_)), "{owner} coalesced");
    }
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(501));
    assert_eq!(orch.grids().value("sheet-bob", &cell("D34")), Some(500));
    assert_eq!(orch.grids().value("sheet-bob", &cell("D26")), Some(90000));
    assert_eq!(orch.grids().value("sheet-alice", &cell("D26")), Some(0));
}

/// Ledger whose first listing parks until released, then fails.
struct LockedOnceLedger {
    inner: MemoryLedger,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl LedgerStore for LockedOnceLedger {
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
        let entered = self.entered.lock().take();
        if let Some(tx) = entered {
            tx.send(()).unwrap();
            let rx = self.release.lock().take().unwrap();
            rx.recv().unwrap();
            return Err(LedgerError::Storage("database is locked".into()));
        }
        self.inner.list_by_owner(owner)
    }

    fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError> {
        self.inner.list_shared()
    }

    fn version(&self) -> Result<u64, LedgerError> {
        self.inner.version()
    }
}

#[test]
fn failed_cycle_still_runs_coalesced_request() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let ledger = LockedOnceLedger {
        inner: MemoryLedger::with_records(vec![expense("e1", "alice", "Food", 1000, SharingMode::Personal)]),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(Some(release_rx)),
    };
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());

    let first = std::thread::scope(|scope| {
        let running = scope.spawn(|| orch.run_cycle(&"alice".into(), march()));

        entered_rx.recv().unwrap();
        let second = orch.run_cycle(&"alice".into(), march()).unwrap();
        assert_eq!(second, CycleOutcome::Coalesced);

        release_tx.send(()).unwrap();
        running.join().unwrap()
    });

    // The re-run for the coalesced request succeeds and is what the caller sees.
    let outcome = first.unwrap();
    assert!(outcome.result().unwrap().is_complete());
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), Some(1000));

    // Key released: the next request runs instead of coalescing.
    let next = orch.run_cycle(&"alice".into(), march()).unwrap();
    assert!(matches!(next, CycleOutcome::Completed(_)));
}

#[test]
fn failed_cycle_without_waiters_reports_error() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    release_tx.send(()).unwrap();
    let ledger = LockedOnceLedger {
        inner: MemoryLedger::new(),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(Some(release_rx)),
    };
    let orch = Orchestrator::new(&ledger, MemoryGrid::new(), context());

    let err = orch.run_cycle(&"alice".into(), march()).unwrap_err();
    entered_rx.recv().unwrap();
    assert!(matches!(err, SyncError::Ledger(ref m) if m.contains("database is locked")), "{err:?}");
    assert_eq!(orch.grids().value("sheet-alice", &cell("D34")), None);

    // Gate entry was released with the error.
    assert!(matches!(orch.run_cycle(&"alice".into(), march()).unwrap(), CycleOutcome::Completed(_)));
}
