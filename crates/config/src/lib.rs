// Configuration loading

pub mod roster;
pub mod settings;

pub use roster::{Party, PartyRoster};
pub use settings::{
    GridBackend, GridSettings, LedgerSettings, PartnerWritePolicy, Settings, SyncSettings,
};

use std::fmt;

use splitgrid_core::AddressError;

#[derive(Debug)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    Parse(String),
    /// Structural validation error (roster shape, attempts, etc.).
    Validation(String),
    /// Category or period table rejected.
    Address(AddressError),
    /// Owner id is not one of the two configured parties.
    UnknownOwner(String),
    /// File read/write error.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
            Self::Address(e) => write!(f, "config address table error: {e}"),
            Self::UnknownOwner(id) => write!(f, "unknown owner '{id}' (not in [[parties]])"),
            Self::Io(msg) => write!(f, "config IO error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<AddressError> for ConfigError {
    fn from(e: AddressError) -> Self {
        Self::Address(e)
    }
}
