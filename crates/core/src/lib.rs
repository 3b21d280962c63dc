//! `splitgrid-core`: shared data model.
//!
//! Expense records, minor-unit money, periods and the static address maps
//! that place a (category, period) pair onto a grid cell.

pub mod address;
pub mod expense;
pub mod money;
pub mod period;

pub use address::{AddressError, CategoryMap, CellAddress, GridLayout, PeriodMap};
pub use expense::{ExpenseRecord, OwnerId, SharingMode};
pub use money::{format_cents, parse_amount, split_shared, AmountError};
pub use period::Period;
