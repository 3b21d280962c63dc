//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `sgrid` exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain   | Description                                   |
//! |---------|----------|-----------------------------------------------|
//! | 0       | Universal| Success                                       |
//! | 1       | Universal| General error (unspecified)                   |
//! | 2       | Universal| CLI usage error (bad args, unknown owner)     |
//! | 3-9     | config   | Config file missing, unparseable, invalid     |
//! | 10-19   | ledger   | Expense store codes                           |
//! | 20-29   | sync     | Cycle outcomes                                |
//! | 30-39   | grid     | Grid store / values API codes                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `CliError::from_*` in main.rs

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing `--as`, owner not in the roster.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Config file missing or unreadable.
pub const EXIT_CONFIG_MISSING: u8 = 3;

/// Config file is not valid TOML / has wrong types.
pub const EXIT_CONFIG_PARSE: u8 = 4;

/// Config parsed but failed validation (roster, category table, periods).
pub const EXIT_CONFIG_INVALID: u8 = 5;

// =============================================================================
// Ledger (10-19)
// =============================================================================

/// No expense with the given id.
pub const EXIT_LEDGER_NOT_FOUND: u8 = 10;

/// Expense belongs to the other party.
pub const EXIT_LEDGER_NOT_OWNER: u8 = 11;

/// Expense content rejected (negative amount, empty category, bad date).
pub const EXIT_LEDGER_INVALID: u8 = 12;

/// SQLite failure.
pub const EXIT_LEDGER_STORAGE: u8 = 13;

// =============================================================================
// Sync (20-29)
// =============================================================================

/// Cycle completed but some cell writes failed. The report lists them.
/// Re-running `sgrid sync` is safe: every cycle overwrites.
pub const EXIT_SYNC_PARTIAL: u8 = 20;

/// A record in the period uses a category with no grid row. Nothing written.
pub const EXIT_SYNC_UNKNOWN_CATEGORY: u8 = 21;

/// Ledger kept changing while taking the snapshot. Nothing written.
pub const EXIT_SYNC_SNAPSHOT: u8 = 22;

/// A record's amount is not a valid non-negative value. Nothing written.
pub const EXIT_SYNC_INVALID_RECORD: u8 = 23;

// =============================================================================
// Grid (30-39)
// =============================================================================

/// Sheets backend selected but no token in env or credentials file.
pub const EXIT_GRID_NOT_AUTH: u8 = 30;

/// Grid store unreachable or rejected a read.
pub const EXIT_GRID_ERROR: u8 = 31;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG_MISSING,
            EXIT_CONFIG_PARSE,
            EXIT_CONFIG_INVALID,
            EXIT_LEDGER_NOT_FOUND,
            EXIT_LEDGER_NOT_OWNER,
            EXIT_LEDGER_INVALID,
            EXIT_LEDGER_STORAGE,
            EXIT_SYNC_PARTIAL,
            EXIT_SYNC_UNKNOWN_CATEGORY,
            EXIT_SYNC_SNAPSHOT,
            EXIT_SYNC_INVALID_RECORD,
            EXIT_GRID_NOT_AUTH,
            EXIT_GRID_ERROR,
        ];
        let mut seen = std::collections::HashSet::new();
        for c in codes {
            assert!(seen.insert(c), "duplicate exit code {c}");
        }
    }
}
