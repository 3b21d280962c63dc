use std::fmt;

use splitgrid_config::ConfigError;
use splitgrid_core::AddressError;

/// Cycle-fatal errors. Per-cell write failures are not errors; they are
/// reported inside `SyncResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A record (or a planned write) names a category outside the map.
    UnknownCategory(String),
    /// Owner is not one of the two configured parties.
    UnknownOwner(String),
    /// A record carries a negative amount, or one that overflows its
    /// category total.
    InvalidAmount { record_id: String, amount_cents: i64 },
    /// Month index outside 0..=11.
    InvalidPeriod(u8),
    /// Ledger kept changing while the snapshot was being taken.
    SnapshotInconsistency { attempts: u32 },
    /// Ledger store read failed.
    Ledger(String),
    /// Configuration problem surfaced at cycle time.
    Config(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCategory(c) => write!(f, "unknown category '{c}'"),
            Self::UnknownOwner(o) => write!(f, "unknown owner '{o}'"),
            Self::InvalidAmount { record_id, amount_cents } => {
                write!(f, "record '{record_id}': invalid amount {amount_cents} (cents)")
            }
            Self::InvalidPeriod(m) => write!(f, "month index {m} out of range 0..=11"),
            Self::SnapshotInconsistency { attempts } => {
                write!(f, "ledger changed during snapshot ({attempts} attempt(s))")
            }
            Self::Ledger(msg) => write!(f, "ledger error: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<AddressError> for SyncError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::UnknownCategory(c) => Self::UnknownCategory(c),
            AddressError::InvalidPeriod(m) => Self::InvalidPeriod(m),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::UnknownOwner(o) => Self::UnknownOwner(o),
            ConfigError::Address(a) => a.into(),
            other => Self::Config(other.to_string()),
        }
    }
}
