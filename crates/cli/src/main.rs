// SplitGrid CLI - record expenses, keep both parties' monthly grids in sync
// Every ledger change triggers a full recompute of the affected months.

mod app;
mod exit_codes;
mod expense;
mod grid;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use splitgrid_config::{ConfigError, Settings};
use splitgrid_recon::{GridError, LedgerError, SyncError};
use splitgrid_sheets_client::{save_credentials, SheetsCredentials, SheetsError};

use app::App;
use exit_codes::{
    EXIT_CONFIG_INVALID, EXIT_CONFIG_MISSING, EXIT_CONFIG_PARSE, EXIT_ERROR, EXIT_GRID_ERROR,
    EXIT_GRID_NOT_AUTH, EXIT_LEDGER_INVALID, EXIT_LEDGER_NOT_FOUND, EXIT_LEDGER_NOT_OWNER,
    EXIT_LEDGER_STORAGE, EXIT_SUCCESS, EXIT_SYNC_INVALID_RECORD, EXIT_SYNC_SNAPSHOT,
    EXIT_SYNC_UNKNOWN_CATEGORY, EXIT_USAGE,
};
use expense::ExpenseCommands;
use grid::GridCommands;

#[derive(Parser)]
#[command(name = "sgrid")]
#[command(about = "Shared-expense ledger synced into two monthly grids")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/splitgrid/config.toml)
    #[arg(long, global = true, env = "SPLITGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Acting owner for expense commands and `sync`
    #[arg(long = "as", global = true, env = "SPLITGRID_OWNER", value_name = "OWNER")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config for two parties
    #[command(after_help = "\
Examples:
  sgrid init --party alice=1AbC...sheet-id --party bob=1XyZ...sheet-id
  sgrid --config ./splitgrid.toml init --party alice=a --party bob=b")]
    Init {
        /// OWNER=GRID_ID, exactly twice
        #[arg(long = "party", value_name = "OWNER=GRID_ID", required = true)]
        parties: Vec<String>,
    },

    /// Save the values API token (sheets backend)
    Login {
        #[arg(long)]
        token: String,

        /// Override [grid] api_base for this token
        #[arg(long)]
        api_base: Option<String>,
    },

    /// Record, change, delete and list expenses
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Recompute a month and write both grids
    #[command(after_help = "\
Examples:
  sgrid --as alice sync
  sgrid sync --all --month 2026-03
  sgrid sync --owner bob --dry-run --json")]
    Sync {
        /// Owner whose cycle to run (defaults to --as)
        #[arg(long, conflicts_with = "all")]
        owner: Option<String>,

        /// Run cycles for both parties
        #[arg(long)]
        all: bool,

        /// Month (YYYY-MM). Defaults to the current month.
        #[arg(long)]
        month: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Compute target values without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect and export grids
    #[command(subcommand)]
    Grid(GridCommands),

    /// Config helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate the config file
    Validate,
    /// Print the config file path in use
    Path,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.clone();
    match cli.command {
        Commands::Init { parties } => cmd_init(config, parties),
        Commands::Login { token, api_base } => cmd_login(token, api_base),
        Commands::Config(ConfigCommands::Validate) => cmd_config_validate(config),
        Commands::Config(ConfigCommands::Path) => {
            println!("{}", config.unwrap_or_else(Settings::config_path).display());
            Ok(())
        }
        Commands::Expense(cmd) => {
            let app = App::load(config.as_deref())?;
            expense::cmd_expense(&app, cli.actor, cmd)
        }
        Commands::Sync { owner, all, month, json, dry_run } => {
            let app = App::load(config.as_deref())?;
            sync::cmd_sync(&app, cli.actor, sync::SyncArgs { owner, all, month, json, dry_run })
        }
        Commands::Grid(cmd) => {
            let app = App::load(config.as_deref())?;
            grid::cmd_grid(&app, cmd)
        }
    }
}

fn cmd_init(config: Option<PathBuf>, parties: Vec<String>) -> Result<(), CliError> {
    let pairs: Vec<(&str, &str)> = parties
        .iter()
        .map(|p| {
            p.split_once('=')
                .map(|(o, g)| (o.trim(), g.trim()))
                .filter(|(o, g)| !o.is_empty() && !g.is_empty())
                .ok_or_else(|| CliError::args(format!("bad --party '{p}'")).with_hint("use OWNER=GRID_ID"))
        })
        .collect::<Result<_, _>>()?;
    let [a, b]: [(&str, &str); 2] = pairs
        .try_into()
        .map_err(|_| CliError::args("exactly two --party values are required"))?;

    let path = config.unwrap_or_else(Settings::config_path);
    Settings::write_template(&path, [a, b]).map_err(CliError::config)?;
    // Round-trip through the loader so a bad owner/grid pair fails here.
    Settings::load(Some(&path)).map_err(CliError::config)?;

    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_login(token: String, api_base: Option<String>) -> Result<(), CliError> {
    if token.trim().is_empty() {
        return Err(CliError::args("token is empty"));
    }
    let creds = SheetsCredentials { token: token.trim().to_string(), api_base };
    let path = save_credentials(&creds).map_err(CliError::io)?;
    println!("saved credentials to {}", path.display());
    Ok(())
}

fn cmd_config_validate(config: Option<PathBuf>) -> Result<(), CliError> {
    let settings = Settings::load(config.as_deref()).map_err(CliError::config)?;
    let layout = settings.layout().map_err(CliError::config)?;
    let roster = settings.roster().map_err(CliError::config)?;

    println!("config ok");
    for party in roster.parties() {
        println!("  party {} → grid {}", party.owner_id, party.grid_id);
    }
    println!(
        "  {} categories (table v{}), columns {}..{}",
        layout.categories.len(),
        layout.categories.version(),
        layout.periods.columns().first().map(String::as_str).unwrap_or("?"),
        layout.periods.columns().last().map(String::as_str).unwrap_or("?"),
    );
    println!("  ledger {}", settings.ledger_path().display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn config(err: ConfigError) -> Self {
        let (code, hint) = match &err {
            ConfigError::Io(_) => (EXIT_CONFIG_MISSING, Some("run `sgrid init --party A=GRID --party B=GRID`")),
            ConfigError::Parse(_) => (EXIT_CONFIG_PARSE, None),
            ConfigError::UnknownOwner(_) => (EXIT_USAGE, None),
            ConfigError::Validation(_) | ConfigError::Address(_) => (EXIT_CONFIG_INVALID, None),
        };
        Self { code, message: err.to_string(), hint: hint.map(String::from) }
    }

    pub fn sync(err: SyncError) -> Self {
        let code = match &err {
            SyncError::UnknownCategory(_) => EXIT_SYNC_UNKNOWN_CATEGORY,
            SyncError::UnknownOwner(_) => EXIT_USAGE,
            SyncError::InvalidAmount { .. } => EXIT_SYNC_INVALID_RECORD,
            SyncError::InvalidPeriod(_) | SyncError::Config(_) => EXIT_CONFIG_INVALID,
            SyncError::SnapshotInconsistency { .. } => EXIT_SYNC_SNAPSHOT,
            SyncError::Ledger(_) => EXIT_LEDGER_STORAGE,
        };
        let hint = match &err {
            SyncError::UnknownCategory(_) => Some("fix the expense's category or add a row for it under [categories]".to_string()),
            SyncError::SnapshotInconsistency { .. } => Some("the ledger is busy; run `sgrid sync` again".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn ledger(err: LedgerError) -> Self {
        let code = match &err {
            LedgerError::NotFound(_) => EXIT_LEDGER_NOT_FOUND,
            LedgerError::NotOwner { .. } => EXIT_LEDGER_NOT_OWNER,
            LedgerError::Invalid(_) => EXIT_LEDGER_INVALID,
            LedgerError::Storage(_) => EXIT_LEDGER_STORAGE,
        };
        Self { code, message: err.to_string(), hint: None }
    }

    pub fn grid(err: GridError) -> Self {
        Self { code: EXIT_GRID_ERROR, message: err.to_string(), hint: None }
    }

    pub fn sheets(err: SheetsError) -> Self {
        let code = match &err {
            SheetsError::NotAuthenticated => EXIT_GRID_NOT_AUTH,
            _ => EXIT_GRID_ERROR,
        };
        Self { code, message: err.to_string(), hint: None }
    }
}
