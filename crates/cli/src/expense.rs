//! `sgrid expense`: ledger mutations. Each one triggers a sync cycle for
//! the acting owner in every period the change touches.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;

use splitgrid_core::{format_cents, parse_amount, ExpenseRecord, OwnerId, Period, SharingMode};
use splitgrid_io::{ExpensePatch, NewExpense};
use splitgrid_recon::LedgerStore;

use crate::app::App;
use crate::exit_codes::{EXIT_LEDGER_INVALID, EXIT_SYNC_UNKNOWN_CATEGORY};
use crate::sync::{parse_month, trigger};
use crate::CliError;

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense and sync
    #[command(after_help = "\
Examples:
  sgrid --as alice expense add 30 Food
  sgrid --as alice expense add 10.01 Food --shared -d 'groceries'
  sgrid --as bob expense add 12,50 Transit --date 2026-02-27")]
    Add {
        /// Amount, e.g. 10.01 (a comma decimal separator is accepted)
        amount: String,

        /// Category, e.g. Food
        category: String,

        /// Split half-and-half with the other party
        #[arg(long)]
        shared: bool,

        /// Free-text description
        #[arg(long, short = 'd', default_value = "")]
        description: String,

        /// Expense date (YYYY-MM-DD, UTC). Defaults to now.
        #[arg(long)]
        date: Option<String>,

        /// Skip the sync cycle
        #[arg(long)]
        no_sync: bool,
    },

    /// Change an expense you own and sync
    Edit {
        id: String,

        #[arg(long)]
        amount: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, short = 'd')]
        description: Option<String>,

        /// Make the expense shared
        #[arg(long, conflicts_with = "personal")]
        shared: bool,

        /// Make the expense personal
        #[arg(long)]
        personal: bool,

        /// Move the expense to another date (YYYY-MM-DD, UTC)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        no_sync: bool,
    },

    /// Delete an expense you own and sync
    Delete {
        id: String,

        #[arg(long)]
        no_sync: bool,
    },

    /// Delete every expense you own and sync the months they were in
    #[command(after_help = "\
Examples:
  sgrid --as alice expense clear --yes")]
    Clear {
        /// Confirm the bulk delete
        #[arg(long)]
        yes: bool,

        #[arg(long)]
        no_sync: bool,
    },

    /// List your expenses
    List {
        /// Only this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List every shared expense (both parties)
    Shared {
        #[arg(long)]
        month: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_expense(app: &App, actor: Option<String>, cmd: ExpenseCommands) -> Result<(), CliError> {
    match cmd {
        ExpenseCommands::Add { amount, category, shared, description, date, no_sync } => {
            let owner = app.actor(actor)?;
            check_category(app, &category)?;
            let mode = if shared { SharingMode::Shared } else { SharingMode::Personal };

            let record = app
                .ledger()
                .insert(NewExpense {
                    owner_id: owner.clone(),
                    description,
                    category,
                    amount_cents: parse_cents(&amount)?,
                    sharing_mode: mode,
                    created_at: date.as_deref().map(parse_date).transpose()?,
                })
                .map_err(CliError::ledger)?;
            println!("added {}", describe(&record));

            sync_periods(app, &owner, [record.created_at], no_sync)
        }

        ExpenseCommands::Edit { id, amount, category, description, shared, personal, date, no_sync } => {
            let owner = app.actor(actor)?;
            if let Some(c) = &category {
                check_category(app, c)?;
            }
            let patch = ExpensePatch {
                description,
                category,
                amount_cents: amount.as_deref().map(parse_cents).transpose()?,
                sharing_mode: match (shared, personal) {
                    (true, _) => Some(SharingMode::Shared),
                    (_, true) => Some(SharingMode::Personal),
                    _ => None,
                },
                created_at: date.as_deref().map(parse_date).transpose()?,
            };
            if patch.is_empty() {
                return Err(CliError::args("nothing to change")
                    .with_hint("pass at least one of --amount, --category, -d, --shared, --personal, --date"));
            }

            let (before, after) = app.ledger().update(&id, &owner, &patch).map_err(CliError::ledger)?;
            println!("updated {}", describe(&after));

            // A moved date leaves a stale value behind in the old month.
            sync_periods(app, &owner, [before.created_at, after.created_at], no_sync)
        }

        ExpenseCommands::Delete { id, no_sync } => {
            let owner = app.actor(actor)?;
            let record = app.ledger().delete(&id, &owner).map_err(CliError::ledger)?;
            println!("deleted {}", describe(&record));

            sync_periods(app, &owner, [record.created_at], no_sync)
        }

        ExpenseCommands::Clear { yes, no_sync } => {
            let owner = app.actor(actor)?;
            if !yes {
                return Err(CliError::args(format!("refusing to delete every expense of {owner}"))
                    .with_hint("pass --yes to confirm"));
            }
            let records = app.ledger().delete_all(&owner).map_err(CliError::ledger)?;
            println!("deleted {} expense(s) of {owner}", records.len());

            if no_sync {
                return Ok(());
            }
            let periods: BTreeSet<Period> = records.iter().map(|r| Period::of(r.created_at)).collect();
            trigger(app, &owner, periods)
        }

        ExpenseCommands::List { month, json } => {
            let owner = app.actor(actor)?;
            let records = app.ledger().list_by_owner(&owner).map_err(CliError::ledger)?;
            print_records(filter_month(records, month.as_deref())?, json)
        }

        ExpenseCommands::Shared { month, json } => {
            let records = app.ledger().list_shared().map_err(CliError::ledger)?;
            print_records(filter_month(records, month.as_deref())?, json)
        }
    }
}

fn sync_periods<const N: usize>(
    app: &App,
    owner: &OwnerId,
    dates: [DateTime<Utc>; N],
    no_sync: bool,
) -> Result<(), CliError> {
    if no_sync {
        return Ok(());
    }
    let periods: BTreeSet<Period> = dates.into_iter().map(Period::of).collect();
    trigger(app, owner, periods)
}

fn check_category(app: &App, category: &str) -> Result<(), CliError> {
    let categories = &app.ctx().layout.categories;
    if categories.contains(category) {
        return Ok(());
    }
    let known: Vec<&str> = categories.by_row().into_iter().map(|(c, _)| c).collect();
    Err(CliError {
        code: EXIT_SYNC_UNKNOWN_CATEGORY,
        message: format!("unknown category '{category}'"),
        hint: Some(format!("known categories: {}", known.join(", "))),
    })
}

fn parse_cents(s: &str) -> Result<i64, CliError> {
    parse_amount(s).map_err(|e| CliError {
        code: EXIT_LEDGER_INVALID,
        message: e.to_string(),
        hint: Some("amounts look like 30, 10.5 or 10,01".into()),
    })
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, CliError> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CliError {
        code: EXIT_LEDGER_INVALID,
        message: format!("invalid date '{s}': {e}"),
        hint: Some("use YYYY-MM-DD".into()),
    })?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn filter_month(records: Vec<ExpenseRecord>, month: Option<&str>) -> Result<Vec<ExpenseRecord>, CliError> {
    let Some(m) = month else {
        return Ok(records);
    };
    let period = parse_month(Some(m))?;
    Ok(records.into_iter().filter(|r| period.contains(r.created_at)).collect())
}

fn describe(r: &ExpenseRecord) -> String {
    format!(
        "{} {} {} {} ({}, {})",
        r.id,
        r.created_at.format("%Y-%m-%d"),
        format_cents(r.amount_cents),
        r.category,
        r.sharing_mode,
        r.owner_id
    )
}

fn print_records(records: Vec<ExpenseRecord>, json: bool) -> Result<(), CliError> {
    if json {
        let out = serde_json::to_string_pretty(&records)
            .map_err(|e| CliError::io(format!("cannot serialize expenses: {e}")))?;
        println!("{out}");
        return Ok(());
    }
    for r in &records {
        let desc = if r.description.is_empty() { String::new() } else { format!("  {}", r.description) };
        println!("{}{desc}", describe(r));
    }
    if records.is_empty() {
        eprintln!("no expenses");
    }
    Ok(())
}
