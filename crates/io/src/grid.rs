// Local grid store in SQLite
//
// One table holds every grid: (grid_id, address) → cents. Stands in for the
// remote spreadsheet when [grid] backend = "local".

use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use splitgrid_core::CellAddress;
use splitgrid_recon::{GridError, GridStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cells (
    grid_id TEXT NOT NULL,
    address TEXT NOT NULL,         -- A1 style, e.g. 'D34'
    value_cents INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (grid_id, address)
);
"#;

const UPSERT: &str = "INSERT INTO cells (grid_id, address, value_cents, updated_at) VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT(grid_id, address) DO UPDATE SET value_cents = excluded.value_cents, updated_at = excluded.updated_at";

pub struct SqliteGrid {
    conn: Mutex<Connection>,
}

impl SqliteGrid {
    pub fn open(path: &Path) -> Result<Self, GridError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, GridError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, GridError> {
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl GridStore for SqliteGrid {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value_cents FROM cells WHERE grid_id = ?1 AND address = ?2",
            params![grid_id, address.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage)
    }

    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        let conn = self.conn.lock();
        conn.execute(
            UPSERT,
            params![grid_id, address.to_string(), value_cents, Utc::now().to_rfc3339()],
        )
        .map_err(storage)?;
        Ok(())
    }

    /// One transaction for the batch; per-cell results are kept independent.
    fn write_cells(&self, grid_id: &str, cells: &[(CellAddress, i64)]) -> Vec<Result<(), GridError>> {
        let mut conn = self.conn.lock();
        let tx = match conn.transaction() {
            Ok(tx) => tx,
            Err(e) => return cells.iter().map(|_| Err(storage_ref(&e))).collect(),
        };

        let now = Utc::now().to_rfc3339();
        let mut results: Vec<Result<(), GridError>> = cells
            .iter()
            .map(|(address, value)| {
                tx.execute(UPSERT, params![grid_id, address.to_string(), value, now])
                    .map(|_| ())
                    .map_err(storage)
            })
            .collect();

        if let Err(e) = tx.commit() {
            log::warn!("local grid commit for '{grid_id}' failed: {e}");
            for r in results.iter_mut().filter(|r| r.is_ok()) {
                *r = Err(storage_ref(&e));
            }
        }
        results
    }
}

fn storage(e: rusqlite::Error) -> GridError {
    GridError::Storage(e.to_string())
}

fn storage_ref(e: &rusqlite::Error) -> GridError {
    GridError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn write_then_read() {
        let grid = SqliteGrid::open_in_memory().unwrap();
        assert_eq!(grid.read_cell("g1", &addr("D34")).unwrap(), None);

        grid.write_cell("g1", &addr("D34"), 501).unwrap();
        grid.write_cell("g1", &addr("D34"), 1001).unwrap();
        assert_eq!(grid.read_cell("g1", &addr("D34")).unwrap(), Some(1001));
        assert_eq!(grid.read_cell("g2", &addr("D34")).unwrap(), None);
    }

    #[test]
    fn batch_write_and_listing() {
        let grid = SqliteGrid::open_in_memory().unwrap();
        let results = grid.write_cells("g1", &[(addr("M74"), 5), (addr("B26"), 70000), (addr("B27"), 0)]);
        assert!(results.iter().all(|r| r.is_ok()));

        assert_eq!(grid.read_cell("g1", &addr("B26")).unwrap(), Some(70000));
        assert_eq!(grid.read_cell("g1", &addr("B27")).unwrap(), Some(0));
        assert_eq!(grid.read_cell("g1", &addr("M74")).unwrap(), Some(5));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grids.db");
        SqliteGrid::open(&path).unwrap().write_cell("g", &addr("C31"), 250).unwrap();
        let grid = SqliteGrid::open(&path).unwrap();
        assert_eq!(grid.read_cell("g", &addr("C31")).unwrap(), Some(250));
    }
}
