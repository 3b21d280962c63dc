//! `sgrid grid`: read back what the grids hold.

use std::path::PathBuf;

use clap::Subcommand;

use splitgrid_core::{format_cents, CellAddress};
use splitgrid_io::export_csv;
use splitgrid_recon::GridStore;

use crate::app::App;
use crate::sync::parse_month;
use crate::CliError;

#[derive(Subcommand)]
pub enum GridCommands {
    /// Show one month column of a party's grid
    #[command(after_help = "\
Examples:
  sgrid grid show alice
  sgrid grid show bob --month 2026-03 --json")]
    Show {
        /// Party whose grid to read
        owner: String,

        /// Month (YYYY-MM). Defaults to the current month.
        #[arg(long)]
        month: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Export a party's whole grid as CSV (category × month)
    Export {
        owner: String,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

pub fn cmd_grid(app: &App, cmd: GridCommands) -> Result<(), CliError> {
    match cmd {
        GridCommands::Show { owner, month, json } => {
            let owner = app.owner(&owner)?;
            let period = parse_month(month.as_deref())?;
            let ctx = app.ctx();
            let grid_id = ctx.roster.grid_for(&owner).map_err(|e| CliError::sync(e.into()))?;
            let column = ctx.layout.resolve_period(period.month_index).map_err(|e| CliError::sync(e.into()))?;

            let mut rows = Vec::new();
            for (category, row) in ctx.layout.categories.by_row() {
                let address = CellAddress::new(column, row);
                let value = app.engine.grids().read_cell(grid_id, &address).map_err(CliError::grid)?;
                rows.push((category, address, value));
            }

            if json {
                let out: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|(category, address, value)| {
                        serde_json::json!({
                            "category": category,
                            "address": address.to_string(),
                            "value_cents": value,
                        })
                    })
                    .collect();
                let s = serde_json::to_string_pretty(&out)
                    .map_err(|e| CliError::io(format!("cannot serialize grid: {e}")))?;
                println!("{s}");
            } else {
                println!("{grid_id} {period} (column {column}):");
                for (category, address, value) in rows {
                    let shown = value.map(format_cents).unwrap_or_else(|| "-".into());
                    println!("  {category:<16} {:>5} {shown:>12}", address.to_string());
                }
            }
            Ok(())
        }

        GridCommands::Export { owner, output } => {
            let owner = app.owner(&owner)?;
            let ctx = app.ctx();
            let grid_id = ctx.roster.grid_for(&owner).map_err(|e| CliError::sync(e.into()))?;
            let csv = export_csv(app.engine.grids(), grid_id, &ctx.layout).map_err(CliError::grid)?;

            match output {
                Some(path) => std::fs::write(&path, csv)
                    .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?,
                None => print!("{csv}"),
            }
            Ok(())
        }
    }
}
