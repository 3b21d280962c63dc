//! `sgrid sync` and the post-mutation trigger.

use std::collections::BTreeSet;

use splitgrid_core::{format_cents, OwnerId, Period};
use splitgrid_recon::{aggregate_records, plan_cells, CycleOutcome, SyncError, SyncResult};

use crate::app::App;
use crate::exit_codes::EXIT_SYNC_PARTIAL;
use crate::CliError;

pub struct SyncArgs {
    pub owner: Option<String>,
    pub all: bool,
    pub month: Option<String>,
    pub json: bool,
    pub dry_run: bool,
}

pub fn parse_month(month: Option<&str>) -> Result<Period, CliError> {
    match month {
        None => Ok(Period::current()),
        Some(m) => Period::parse(m).ok_or_else(|| {
            CliError::args(format!("invalid month '{m}'")).with_hint("use YYYY-MM, e.g. --month 2026-03")
        }),
    }
}

pub fn cmd_sync(app: &App, actor: Option<String>, args: SyncArgs) -> Result<(), CliError> {
    let period = parse_month(args.month.as_deref())?;

    let owners: Vec<OwnerId> = if args.all {
        app.ctx().roster.owners().iter().map(|o| (*o).clone()).collect()
    } else {
        let who = args.owner.or(actor);
        vec![app.actor(who)?]
    };

    if args.dry_run {
        return dry_run(app, &owners, period, args.json);
    }

    let outcomes: Vec<(OwnerId, Result<CycleOutcome, SyncError>)> = if args.all {
        app.engine.sync_all(period)
    } else {
        owners
            .into_iter()
            .map(|o| {
                let r = app.engine.run_cycle(&o, period);
                (o, r)
            })
            .collect()
    };

    let mut results = Vec::new();
    for (owner, outcome) in outcomes {
        match outcome.map_err(CliError::sync)? {
            CycleOutcome::Completed(result) => results.push(result),
            CycleOutcome::Coalesced => log::info!("sync {owner} {period}: coalesced"),
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&results)
            .map_err(|e| CliError::io(format!("cannot serialize result: {e}")))?;
        println!("{json}");
    } else {
        for r in &results {
            print_result(r);
        }
    }
    check_complete(&results)
}

/// Run a cycle for `actor` in every affected period. Called after the ledger
/// change has committed, so a failure here never undoes the change.
pub fn trigger(app: &App, actor: &OwnerId, periods: BTreeSet<Period>) -> Result<(), CliError> {
    let mut results = Vec::new();
    for period in periods {
        match app.engine.run_cycle(actor, period).map_err(CliError::sync)? {
            CycleOutcome::Completed(result) => {
                print_result(&result);
                results.push(result);
            }
            CycleOutcome::Coalesced => {}
        }
    }
    check_complete(&results)
}

fn check_complete(results: &[SyncResult]) -> Result<(), CliError> {
    let failed: usize = results.iter().map(SyncResult::failed_count).sum();
    if failed > 0 {
        return Err(CliError {
            code: EXIT_SYNC_PARTIAL,
            message: format!("{failed} cell write(s) failed"),
            hint: Some("run `sgrid sync` again; every cycle overwrites, so retrying is safe".into()),
        });
    }
    Ok(())
}

fn print_result(r: &SyncResult) {
    println!(
        "synced {} {}: {} cell(s) on {}, {} written / {} unchanged on {}",
        r.owner,
        r.period,
        r.owner_grid.written.len(),
        r.owner_grid.grid_id,
        r.partner_grid.written.len(),
        r.partner_grid.skipped.len(),
        r.partner_grid.grid_id,
    );
    for report in [&r.owner_grid, &r.partner_grid] {
        for f in &report.failed {
            println!(
                "  failed {}!{} ({}) = {}: {}",
                report.grid_id,
                f.address,
                f.category,
                format_cents(f.value_cents),
                f.error
            );
        }
    }
}

fn dry_run(app: &App, owners: &[OwnerId], period: Period, json: bool) -> Result<(), CliError> {
    let ctx = app.ctx();
    let mut plans = Vec::new();

    for owner in owners {
        let partner = ctx.roster.partner_of(owner).map_err(|e| CliError::sync(e.into()))?;
        let snapshot = app.engine.snapshot(owner, &partner.owner_id).map_err(CliError::sync)?;
        let aggs = aggregate_records(
            &snapshot.records,
            &ctx.layout.categories,
            owner,
            &partner.owner_id,
            period,
        )
        .map_err(CliError::sync)?;
        let cells = plan_cells(&aggs, &ctx.layout).map_err(CliError::sync)?;

        if json {
            plans.push(serde_json::json!({
                "owner": owner,
                "partner": partner.owner_id,
                "period": period.to_string(),
                "ledger_version": snapshot.version,
                "cells": cells.iter().map(|c| serde_json::json!({
                    "category": c.category,
                    "address": c.address.to_string(),
                    "owner_value_cents": c.owner_value,
                    "partner_value_cents": c.partner_value,
                })).collect::<Vec<_>>(),
            }));
        } else {
            println!("plan {owner} {period} (ledger v{}):", snapshot.version);
            println!("  {:<16} {:>6} {:>12} {:>12}", "category", "cell", owner.as_str(), partner.owner_id.as_str());
            for c in &cells {
                println!(
                    "  {:<16} {:>6} {:>12} {:>12}",
                    c.category,
                    c.address.to_string(),
                    format_cents(c.owner_value),
                    format_cents(c.partner_value)
                );
            }
        }
    }

    if json {
        let out = serde_json::to_string_pretty(&plans)
            .map_err(|e| CliError::io(format!("cannot serialize plan: {e}")))?;
        println!("{out}");
    }
    Ok(())
}
