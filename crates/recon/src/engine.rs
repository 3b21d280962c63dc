//! Sync orchestrator: snapshot → aggregate → reconcile, one owner and
//! period at a time.

use std::collections::HashSet;

use splitgrid_config::{PartyRoster, Settings, SyncSettings};
use splitgrid_core::{CellAddress, GridLayout, OwnerId, Period, SharingMode};

use crate::aggregate::aggregate_records;
use crate::error::SyncError;
use crate::gate::{Admission, CycleGate};
use crate::model::{CycleOutcome, LedgerSnapshot, SyncResult};
use crate::reconcile::{reconcile_filtered, retry_failed_writes, GridSide, GridTargets};
use crate::store::{GridStore, LedgerStore};

/// Static inputs of every cycle.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub layout: GridLayout,
    pub roster: PartyRoster,
    pub sync: SyncSettings,
}

impl SyncContext {
    pub fn from_settings(settings: &Settings) -> Result<Self, SyncError> {
        Ok(Self {
            layout: settings.layout()?,
            roster: settings.roster()?,
            sync: settings.sync.clone(),
        })
    }
}

pub struct Orchestrator<L, G> {
    ledger: L,
    grids: G,
    ctx: SyncContext,
    gate: CycleGate,
}

impl<L: LedgerStore, G: GridStore> Orchestrator<L, G> {
    pub fn new(ledger: L, grids: G, ctx: SyncContext) -> Self {
        Self {
            ledger,
            grids,
            ctx,
            gate: CycleGate::new(),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn grids(&self) -> &G {
        &self.grids
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Everything `owner`'s cycle may see: their records, every shared
    /// record, and the partner's personal records. Retaken if the ledger
    /// version moves while listing.
    pub fn snapshot(&self, owner: &OwnerId, partner: &OwnerId) -> Result<LedgerSnapshot, SyncError> {
        let attempts = self.ctx.sync.snapshot_attempts.max(1);
        let ledger_err = |e: crate::store::LedgerError| SyncError::Ledger(e.to_string());

        for attempt in 1..=attempts {
            let before = self.ledger.version().map_err(ledger_err)?;
            let own = self.ledger.list_by_owner(owner).map_err(ledger_err)?;
            let partner_personal: Vec<_> = self
                .ledger
                .list_by_owner(partner)
                .map_err(ledger_err)?
                .into_iter()
                .filter(|r| r.sharing_mode == SharingMode::Personal)
                .collect();
            let shared = self.ledger.list_shared().map_err(ledger_err)?;
            let after = self.ledger.version().map_err(ledger_err)?;

            if before != after {
                log::warn!(
                    "ledger moved from v{before} to v{after} during snapshot for {owner} (attempt {attempt}/{attempts})"
                );
                continue;
            }
            match LedgerSnapshot::merge(before, [own, partner_personal, shared]) {
                Ok(snapshot) => return Ok(snapshot),
                Err(SyncError::SnapshotInconsistency { .. }) => {
                    log::warn!("conflicting duplicate records in snapshot for {owner} (attempt {attempt}/{attempts})");
                }
                Err(e) => return Err(e),
            }
        }

        Err(SyncError::SnapshotInconsistency { attempts })
    }

    /// Run one sync cycle for `owner`. Coalesces with an in-flight cycle
    /// for the same owner and period.
    pub fn run_cycle(&self, owner: &OwnerId, period: Period) -> Result<CycleOutcome, SyncError> {
        self.gated(owner, period, None)
    }

    /// Re-run a cycle, writing only the addresses `previous` reported as
    /// failed. Values come from a fresh snapshot, not from `previous`.
    pub fn retry_failed(&self, previous: &SyncResult) -> Result<CycleOutcome, SyncError> {
        let mut only: HashSet<(GridSide, CellAddress)> = HashSet::new();
        only.extend(previous.owner_grid.failed.iter().map(|f| (GridSide::Owner, f.address.clone())));
        only.extend(previous.partner_grid.failed.iter().map(|f| (GridSide::Partner, f.address.clone())));
        self.gated(&previous.owner, previous.period, Some(&only))
    }

    /// Cycles for both parties, concurrently.
    pub fn sync_all(&self, period: Period) -> Vec<(OwnerId, Result<CycleOutcome, SyncError>)> {
        let owners = self.ctx.roster.owners();
        std::thread::scope(|scope| {
            let handles: Vec<_> = owners
                .iter()
                .map(|owner| {
                    let owner = (*owner).clone();
                    scope.spawn(move || {
                        let result = self.run_cycle(&owner, period);
                        (owner, result)
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(owners)
                .map(|(handle, owner)| {
                    handle.join().unwrap_or_else(|_| {
                        (owner.clone(), Err(SyncError::Ledger(format!("sync thread for {owner} panicked"))))
                    })
                })
                .collect()
        })
    }

    fn gated(
        &self,
        owner: &OwnerId,
        period: Period,
        only: Option<&HashSet<(GridSide, CellAddress)>>,
    ) -> Result<CycleOutcome, SyncError> {
        let mut guard = match self.gate.enter((owner.clone(), period)) {
            Admission::Run(guard) => guard,
            Admission::Coalesced => {
                log::info!("sync {owner} {period}: coalesced into in-flight cycle");
                return Ok(CycleOutcome::Coalesced);
            }
        };

        // A failed run still owes coalesced callers their cycle; the error is
        // only surfaced once nobody is waiting on this key.
        let mut only = only;
        loop {
            let run = self.cycle_once(owner, period, only);
            if !guard.rerun_requested() {
                return run.map(CycleOutcome::Completed);
            }
            if let Err(e) = &run {
                log::warn!("sync {owner} {period}: {e}; re-running for coalesced request");
            } else {
                log::info!("sync {owner} {period}: re-running for coalesced request");
            }
            // Coalesced requests want a full cycle.
            only = None;
        }
    }

    fn cycle_once(
        &self,
        owner: &OwnerId,
        period: Period,
        only: Option<&HashSet<(GridSide, CellAddress)>>,
    ) -> Result<SyncResult, SyncError> {
        let partner = self.ctx.roster.partner_of(owner)?;
        let owner_grid = self.ctx.roster.grid_for(owner)?;
        let targets = GridTargets {
            owner_grid,
            partner_grid: &partner.grid_id,
        };

        log::info!("sync {owner} {period}: start (grids {owner_grid}, {})", partner.grid_id);

        let snapshot = self.snapshot(owner, &partner.owner_id)?;
        let aggregates = aggregate_records(
            &snapshot.records,
            &self.ctx.layout.categories,
            owner,
            &partner.owner_id,
            period,
        )?;

        let mut result = reconcile_filtered(
            &self.grids,
            targets,
            &aggregates,
            &self.ctx.layout,
            self.ctx.sync.partner_writes,
            only,
        )?;
        result.meta.ledger_version = Some(snapshot.version);

        let extra = self.ctx.sync.write_attempts.saturating_sub(1);
        retry_failed_writes(&self.grids, &mut result.owner_grid, extra);
        retry_failed_writes(&self.grids, &mut result.partner_grid, extra);

        if result.is_complete() {
            log::info!(
                "sync {owner} {period}: done, {} + {} cell(s) written, {} skipped",
                result.owner_grid.written.len(),
                result.partner_grid.written.len(),
                result.partner_grid.skipped.len()
            );
        } else {
            log::warn!(
                "sync {owner} {period}: partial, {} cell(s) failed",
                result.failed_count()
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GridError, LedgerError, MemoryGrid, MemoryLedger};
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use splitgrid_config::{Party, PartnerWritePolicy};
    use splitgrid_core::ExpenseRecord;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn ctx() -> SyncContext {
        SyncContext {
            layout: GridLayout::default(),
            roster: PartyRoster::new(vec![
                Party { owner_id: "alice".into(), grid_id: "ga".into(), name: None },
                Party { owner_id: "bob".into(), grid_id: "gb".into(), name: None },
            ])
            .unwrap(),
            sync: SyncSettings {
                partner_writes: PartnerWritePolicy::Touched,
                write_attempts: 2,
                snapshot_attempts: 3,
            },
        }
    }

    fn march() -> Period {
        Period::new(2026, 2).unwrap()
    }

    fn rec(id: &str, owner: &str, category: &str, cents: i64, mode: SharingMode) -> ExpenseRecord {
        ExpenseRecord {
            id: id.into(),
            owner_id: owner.into(),
            description: String::new(),
            category: category.into(),
            amount_cents: cents,
            sharing_mode: mode,
            created_at: Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap(),
        }
    }

    fn food() -> CellAddress {
        CellAddress::new("D", 34)
    }

    #[test]
    fn owner_shared_record_counted_once() {
        let ledger = MemoryLedger::with_records(vec![rec("1", "alice", "Food", 1001, SharingMode::Shared)]);
        let orch = Orchestrator::new(&ledger, MemoryGrid::new(), ctx());

        let snap = orch.snapshot(&"alice".into(), &"bob".into()).unwrap();
        assert_eq!(snap.records.len(), 1);

        let outcome = orch.run_cycle(&"alice".into(), march()).unwrap();
        let result = outcome.result().unwrap();
        assert!(result.is_complete());
        assert_eq!(result.meta.ledger_version, Some(1));
        assert_eq!(orch.grids().value("ga", &food()), Some(501));
        assert_eq!(orch.grids().value("gb", &food()), Some(500));
    }

    #[test]
    fn both_owners_agree_on_shared_cells() {
        let ledger = MemoryLedger::with_records(vec![
            rec("1", "alice", "Food", 1001, SharingMode::Shared),
            rec("2", "bob", "Food", 2000, SharingMode::Personal),
            rec("3", "alice", "Rent", 70000, SharingMode::Personal),
        ]);
        let orch = Orchestrator::new(&ledger, MemoryGrid::new(), ctx());

        orch.run_cycle(&"alice".into(), march()).unwrap();
        let alice_grid = orch.grids().cells("ga");
        assert_eq!(orch.grids().value("gb", &food()), Some(2500));

        // Bob's cycle recomputes the same values from the other side.
        orch.run_cycle(&"bob".into(), march()).unwrap();
        assert_eq!(orch.grids().cells("ga"), alice_grid);
        assert_eq!(orch.grids().value("ga", &food()), Some(501));
        assert_eq!(orch.grids().value("gb", &food()), Some(2500));
        assert_eq!(orch.grids().value("gb", &CellAddress::new("D", 26)), Some(0));
    }

    #[test]
    fn sync_all_covers_both_parties() {
        let ledger = MemoryLedger::with_records(vec![rec("1", "bob", "Gym", 3000, SharingMode::Personal)]);
        let orch = Orchestrator::new(&ledger, MemoryGrid::new(), ctx());

        let results = orch.sync_all(march());
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| matches!(r, Ok(CycleOutcome::Completed(_)))));
        assert_eq!(orch.grids().value("gb", &CellAddress::new("D", 43)), Some(3000));
        assert_eq!(orch.grids().value("ga", &CellAddress::new("D", 43)), Some(0));
    }

    #[test]
    fn unknown_owner_is_fatal() {
        let orch = Orchestrator::new(MemoryLedger::new(), MemoryGrid::new(), ctx());
        let err = orch.run_cycle(&"carol".into(), march()).unwrap_err();
        assert_eq!(err, SyncError::UnknownOwner("carol".into()));
    }

    #[test]
    fn unknown_category_aborts_without_writes() {
        let ledger = MemoryLedger::with_records(vec![rec("1", "alice", "Cibo", 100, SharingMode::Personal)]);
        let orch = Orchestrator::new(&ledger, MemoryGrid::new(), ctx());
        let err = orch.run_cycle(&"alice".into(), march()).unwrap_err();
        assert_eq!(err, SyncError::UnknownCategory("Cibo".into()));
        assert!(orch.grids().writes().is_empty());
    }

    /// Ledger whose version ticks on every read for the first `unstable` reads.
    struct RestlessLedger {
        inner: MemoryLedger,
        reads: AtomicU64,
        unstable: u64,
    }

    impl LedgerStore for RestlessLedger {
        fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
            self.inner.list_by_owner(owner)
        }
        fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError> {
            self.inner.list_shared()
        }
        fn version(&self) -> Result<u64, LedgerError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(if n < self.unstable { n } else { self.unstable })
        }
    }

    #[test]
    fn snapshot_retried_until_stable() {
        // Reads 0,1 differ (attempt 1), reads 2,3 differ (attempt 2), then stable.
        let ledger = RestlessLedger { inner: MemoryLedger::new(), reads: AtomicU64::new(0), unstable: 4 };
        let orch = Orchestrator::new(ledger, MemoryGrid::new(), ctx());
        let snap = orch.snapshot(&"alice".into(), &"bob".into()).unwrap();
        assert_eq!(snap.version, 4);
    }

    #[test]
    fn snapshot_gives_up() {
        let ledger = RestlessLedger { inner: MemoryLedger::new(), reads: AtomicU64::new(0), unstable: 100 };
        let orch = Orchestrator::new(ledger, MemoryGrid::new(), ctx());
        let err = orch.run_cycle(&"alice".into(), march()).unwrap_err();
        assert_eq!(err, SyncError::SnapshotInconsistency { attempts: 3 });
        assert!(orch.grids().writes().is_empty());
    }

    /// Grid that fails every write to one address until `heal` is called.
    struct BrokenCell {
        inner: MemoryGrid,
        broken: Mutex<Option<(String, CellAddress)>>,
    }

    impl GridStore for BrokenCell {
        fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
            self.inner.read_cell(grid_id, address)
        }
        fn write_cell(&self, grid_id: &str, address: &CellAddress, value: i64) -> Result<(), GridError> {
            if let Some((g, a)) = &*self.broken.lock() {
                if g == grid_id && a == address {
                    return Err(GridError::Rejected { status: 503, message: "backend unavailable".into() });
                }
            }
            self.inner.write_cell(grid_id, address, value)
        }
    }

    #[test]
    fn partial_failure_then_retry_failed() {
        let ledger = MemoryLedger::with_records(vec![rec("1", "alice", "Food", 1001, SharingMode::Shared)]);
        let grid = BrokenCell { inner: MemoryGrid::new(), broken: Mutex::new(Some(("gb".into(), food()))) };
        let orch = Orchestrator::new(&ledger, &grid, ctx());

        let first = orch.run_cycle(&"alice".into(), march()).unwrap();
        let first = first.result().unwrap().clone();
        assert_eq!(first.failed_count(), 1);
        assert_eq!(first.partner_grid.failed[0].address, food());
        assert_eq!(grid.inner.value("ga", &food()), Some(501));

        *grid.broken.lock() = None;
        grid.inner.clear_log();

        let retried = orch.retry_failed(&first).unwrap();
        let retried = retried.result().unwrap();
        assert!(retried.is_complete());
        assert_eq!(grid.inner.writes(), vec![("gb".to_string(), food(), 500)]);
    }

    #[test]
    fn full_cycle_is_idempotent() {
        let ledger = MemoryLedger::with_records(vec![
            rec("1", "alice", "Food", 1001, SharingMode::Shared),
            rec("2", "alice", "Shopping", 5999, SharingMode::Personal),
        ]);
        let orch = Orchestrator::new(&ledger, MemoryGrid::new(), ctx());
        orch.run_cycle(&"alice".into(), march()).unwrap();
        let snapshot = (orch.grids().cells("ga"), orch.grids().cells("gb"));
        orch.run_cycle(&"alice".into(), march()).unwrap();
        assert_eq!((orch.grids().cells("ga"), orch.grids().cells("gb")), snapshot);
    }

    #[test]
    fn deletion_clears_cells() {
        let ledger = MemoryLedger::with_records(vec![rec("1", "alice", "Food", 1001, SharingMode::Shared)]);
        let orch = Orchestrator::new(&ledger, MemoryGrid::new(), ctx());
        orch.run_cycle(&"alice".into(), march()).unwrap();

        ledger.remove("1");
        orch.run_cycle(&"alice".into(), march()).unwrap();
        assert_eq!(orch.grids().value("ga", &food()), Some(0));
        assert_eq!(orch.grids().value("gb", &food()), Some(0));
    }
}
