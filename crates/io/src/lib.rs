// Storage: SQLite ledger, local grid store, CSV export

pub mod csv;
pub mod grid;
pub mod ledger;

pub use self::csv::export_csv;
pub use grid::SqliteGrid;
pub use ledger::{ExpensePatch, NewExpense, SqliteLedger};
