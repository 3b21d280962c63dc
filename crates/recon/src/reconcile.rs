//! Synchronization engine: aggregates → cell writes on both grids.
//!
//! Every cycle recomputes each target value from scratch and overwrites the
//! cell. Nothing here reads a cell to add to it, so re-running a cycle (or
//! retrying a failed write) can never double-count.

use std::collections::HashSet;

use splitgrid_config::PartnerWritePolicy;
use splitgrid_core::{CellAddress, GridLayout};

use crate::error::SyncError;
use crate::model::{Aggregates, CellFailure, CellWrite, GridReport, SyncMeta, SyncResult};
use crate::store::GridStore;

/// The two grids a cycle writes to.
#[derive(Debug, Clone, Copy)]
pub struct GridTargets<'a> {
    pub owner_grid: &'a str,
    pub partner_grid: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridSide {
    Owner,
    Partner,
}

/// Target values for one (category, period) address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCell {
    pub category: String,
    pub address: CellAddress,
    pub owner_value: i64,
    pub partner_value: i64,
    pub partner_shared: i64,
}

/// Resolve every mapped category to its address and target values.
///
/// Runs before any write so an addressing failure aborts the cycle with the
/// grids untouched.
pub fn plan_cells(aggregates: &Aggregates, layout: &GridLayout) -> Result<Vec<PlannedCell>, SyncError> {
    if let Some(stray) = aggregates
        .totals
        .keys()
        .find(|c| !layout.categories.contains(c))
    {
        return Err(SyncError::UnknownCategory(stray.clone()));
    }

    layout
        .categories
        .by_row()
        .into_iter()
        .map(|(category, _)| {
            let address = layout.resolve_address(category, aggregates.period)?;
            let totals = aggregates.get(category).copied().unwrap_or_default();
            Ok(PlannedCell {
                category: category.to_string(),
                address,
                owner_value: totals.owner_value(),
                partner_value: totals.partner_value(),
                partner_shared: totals.partner_shared_cents,
            })
        })
        .collect()
}

/// Bring both grids in line with `aggregates` for its period.
pub fn reconcile<G: GridStore + ?Sized>(
    grids: &G,
    targets: GridTargets<'_>,
    aggregates: &Aggregates,
    layout: &GridLayout,
    policy: PartnerWritePolicy,
) -> Result<SyncResult, SyncError> {
    reconcile_filtered(grids, targets, aggregates, layout, policy, None)
}

/// Like `reconcile`, but only touches addresses in `only` when given.
pub fn reconcile_filtered<G: GridStore + ?Sized>(
    grids: &G,
    targets: GridTargets<'_>,
    aggregates: &Aggregates,
    layout: &GridLayout,
    policy: PartnerWritePolicy,
    only: Option<&HashSet<(GridSide, CellAddress)>>,
) -> Result<SyncResult, SyncError> {
    let plan = plan_cells(aggregates, layout)?;
    let selected = |side: GridSide, address: &CellAddress| {
        only.map_or(true, |set| set.contains(&(side, address.clone())))
    };

    // Owner grid: every category, every cycle.
    let mut owner_report = GridReport::new(targets.owner_grid);
    let owner_cells: Vec<&PlannedCell> = plan
        .iter()
        .filter(|c| selected(GridSide::Owner, &c.address))
        .collect();
    write_batch(
        grids,
        &mut owner_report,
        owner_cells.iter().map(|c| (*c, c.owner_value)).collect(),
    );

    // Partner grid: per policy.
    let mut partner_report = GridReport::new(targets.partner_grid);
    let mut partner_cells: Vec<&PlannedCell> = Vec::new();
    for cell in plan.iter().filter(|c| selected(GridSide::Partner, &c.address)) {
        if partner_needs_write(grids, targets.partner_grid, cell, policy) {
            partner_cells.push(cell);
        } else {
            log::debug!(
                "skip {}!{} ({}): partner value unchanged",
                targets.partner_grid,
                cell.address,
                cell.category
            );
            partner_report.skipped.push(cell.address.clone());
        }
    }
    write_batch(
        grids,
        &mut partner_report,
        partner_cells.iter().map(|c| (*c, c.partner_value)).collect(),
    );

    Ok(SyncResult {
        owner: aggregates.owner.clone(),
        partner: aggregates.partner.clone(),
        period: aggregates.period,
        owner_grid: owner_report,
        partner_grid: partner_report,
        meta: SyncMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            ledger_version: None,
            category_version: aggregates.category_version,
        },
    })
}

/// Under `Touched`, a partner cell is written when the partner carries a
/// shared share now, or when the grid holds something other than the
/// partner's target (covers shared → personal transitions). An unreadable
/// cell is written.
fn partner_needs_write<G: GridStore + ?Sized>(
    grids: &G,
    grid_id: &str,
    cell: &PlannedCell,
    policy: PartnerWritePolicy,
) -> bool {
    if policy == PartnerWritePolicy::Always || cell.partner_shared != 0 {
        return true;
    }
    match grids.read_cell(grid_id, &cell.address) {
        Ok(prior) => prior.unwrap_or(0) != cell.partner_value,
        Err(e) => {
            log::debug!("cannot read {grid_id}!{}: {e}; writing", cell.address);
            true
        }
    }
}

fn write_batch<G: GridStore + ?Sized>(grids: &G, report: &mut GridReport, cells: Vec<(&PlannedCell, i64)>) {
    if cells.is_empty() {
        return;
    }
    let batch: Vec<(CellAddress, i64)> = cells.iter().map(|(c, v)| (c.address.clone(), *v)).collect();
    let results = grids.write_cells(&report.grid_id, &batch);

    for (i, (cell, value)) in cells.into_iter().enumerate() {
        // A short result vector counts the missing entries as failures.
        match results.get(i) {
            Some(Ok(())) => report.written.push(CellWrite {
                address: cell.address.clone(),
                category: cell.category.clone(),
                value_cents: value,
            }),
            Some(Err(e)) => {
                log::warn!("write {}!{} failed: {e}", report.grid_id, cell.address);
                report.failed.push(CellFailure {
                    address: cell.address.clone(),
                    category: cell.category.clone(),
                    value_cents: value,
                    error: e.to_string(),
                });
            }
            None => report.failed.push(CellFailure {
                address: cell.address.clone(),
                category: cell.category.clone(),
                value_cents: value,
                error: "grid store returned no result for this cell".into(),
            }),
        }
    }
}

/// Re-issue the failed writes of a report, up to `extra_attempts` more
/// times. Values are the ones planned for this cycle.
pub fn retry_failed_writes<G: GridStore + ?Sized>(grids: &G, report: &mut GridReport, extra_attempts: u32) {
    for attempt in 1..=extra_attempts {
        if report.failed.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut report.failed);
        let batch: Vec<(CellAddress, i64)> =
            pending.iter().map(|f| (f.address.clone(), f.value_cents)).collect();
        let results = grids.write_cells(&report.grid_id, &batch);

        for (i, failure) in pending.into_iter().enumerate() {
            match results.get(i) {
                Some(Ok(())) => report.written.push(CellWrite {
                    address: failure.address,
                    category: failure.category,
                    value_cents: failure.value_cents,
                }),
                Some(Err(e)) => {
                    log::warn!(
                        "retry {attempt} of {}!{} failed: {e}",
                        report.grid_id,
                        failure.address
                    );
                    report.failed.push(CellFailure { error: e.to_string(), ..failure });
                }
                None => report.failed.push(failure),
            }
        }
    }
}
