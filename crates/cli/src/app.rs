//! Wiring: config → ledger + grid backend → orchestrator.

use std::path::Path;

use splitgrid_config::{GridBackend, Settings};
use splitgrid_core::{CellAddress, OwnerId};
use splitgrid_io::{SqliteGrid, SqliteLedger};
use splitgrid_recon::{GridError, GridStore, Orchestrator, SyncContext};
use splitgrid_sheets_client::SheetsClient;

use crate::CliError;

/// The configured grid backend.
pub enum Grids {
    Local(SqliteGrid),
    Sheets(SheetsClient),
}

impl GridStore for Grids {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        match self {
            Grids::Local(g) => g.read_cell(grid_id, address),
            Grids::Sheets(g) => g.read_cell(grid_id, address),
        }
    }

    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        match self {
            Grids::Local(g) => g.write_cell(grid_id, address, value_cents),
            Grids::Sheets(g) => g.write_cell(grid_id, address, value_cents),
        }
    }

    fn write_cells(&self, grid_id: &str, cells: &[(CellAddress, i64)]) -> Vec<Result<(), GridError>> {
        match self {
            Grids::Local(g) => g.write_cells(grid_id, cells),
            Grids::Sheets(g) => g.write_cells(grid_id, cells),
        }
    }
}

pub type Engine = Orchestrator<SqliteLedger, Grids>;

pub struct App {
    pub settings: Settings,
    pub engine: Engine,
}

impl App {
    pub fn load(config: Option<&Path>) -> Result<Self, CliError> {
        let settings = Settings::load(config).map_err(CliError::config)?;
        let ctx = SyncContext::from_settings(&settings).map_err(CliError::sync)?;

        let ledger_path = settings.ledger_path();
        let ledger = SqliteLedger::open(&ledger_path).map_err(CliError::ledger)?;
        log::debug!("ledger: {}", ledger_path.display());

        let grids = match settings.grid.backend {
            GridBackend::Local => {
                let path = settings.local_grid_path();
                log::debug!("grid backend: local ({})", path.display());
                Grids::Local(SqliteGrid::open(&path).map_err(CliError::grid)?)
            }
            GridBackend::Sheets => {
                let client = SheetsClient::from_saved_credentials(&settings.grid.api_base, &settings.grid.sheet_name)
                    .map_err(CliError::sheets)?;
                log::debug!("grid backend: sheets ({})", client.api_base());
                Grids::Sheets(client)
            }
        };

        Ok(Self {
            engine: Orchestrator::new(ledger, grids, ctx),
            settings,
        })
    }

    pub fn ledger(&self) -> &SqliteLedger {
        self.engine.ledger()
    }

    pub fn ctx(&self) -> &SyncContext {
        self.engine.context()
    }

    /// `--as`, checked against the roster.
    pub fn actor(&self, who: Option<String>) -> Result<OwnerId, CliError> {
        let who = who.ok_or_else(|| {
            CliError::args("no acting owner").with_hint("pass --as <OWNER> or set SPLITGRID_OWNER")
        })?;
        self.owner(&who)
    }

    pub fn owner(&self, who: &str) -> Result<OwnerId, CliError> {
        let owner = OwnerId::new(who);
        if !self.ctx().roster.contains(&owner) {
            let known: Vec<String> = self.ctx().roster.owners().iter().map(|o| o.to_string()).collect();
            return Err(CliError::args(format!("unknown owner '{who}'"))
                .with_hint(format!("configured parties: {}", known.join(", "))));
        }
        Ok(owner)
    }
}
