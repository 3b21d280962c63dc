// Expense ledger in SQLite

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use splitgrid_core::{ExpenseRecord, OwnerId, SharingMode};
use splitgrid_recon::{LedgerError, LedgerStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS expenses (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    sharing_mode TEXT NOT NULL,    -- 'personal' | 'shared'
    created_at TEXT NOT NULL       -- RFC 3339, UTC
);

CREATE INDEX IF NOT EXISTS idx_expenses_owner ON expenses(owner_id);
CREATE INDEX IF NOT EXISTS idx_expenses_mode ON expenses(sharing_mode);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR IGNORE INTO meta (key, value) VALUES ('version', '0');
"#;

const COLUMNS: &str = "id, owner_id, description, category, amount_cents, sharing_mode, created_at";

/// Fields of an expense before it has an id.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub owner_id: OwnerId,
    pub description: String,
    pub category: String,
    pub amount_cents: i64,
    pub sharing_mode: SharingMode,
    /// Defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount_cents: Option<i64>,
    pub sharing_mode: Option<SharingMode>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.category.is_none()
            && self.amount_cents.is_none()
            && self.sharing_mode.is_none()
            && self.created_at.is_none()
    }

    fn apply(&self, record: &mut ExpenseRecord) {
        if let Some(d) = &self.description {
            record.description = d.clone();
        }
        if let Some(c) = &self.category {
            record.category = c.clone();
        }
        if let Some(a) = self.amount_cents {
            record.amount_cents = a;
        }
        if let Some(m) = self.sharing_mode {
            record.sharing_mode = m;
        }
        if let Some(t) = self.created_at {
            record.created_at = t;
        }
    }
}

/// SQLite-backed ledger. Every mutation bumps `meta.version` in the same
/// transaction, which is what snapshot consistency checks against.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, LedgerError> {
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn insert(&self, new: NewExpense) -> Result<ExpenseRecord, LedgerError> {
        let record = ExpenseRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: new.owner_id,
            description: new.description,
            category: new.category,
            amount_cents: new.amount_cents,
            sharing_mode: new.sharing_mode,
            created_at: new.created_at.unwrap_or_else(Utc::now),
        };
        validate(&record)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage)?;
        tx.execute(
            &format!("INSERT INTO expenses ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                record.id,
                record.owner_id.as_str(),
                record.description,
                record.category,
                record.amount_cents,
                record.sharing_mode.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(storage)?;
        bump_version(&tx)?;
        tx.commit().map_err(storage)?;

        log::debug!("ledger: inserted {} for {}", record.id, record.owner_id);
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<ExpenseRecord, LedgerError> {
        let conn = self.conn.lock();
        fetch(&conn, id)?.ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Apply `patch` to a record owned by `actor`. Returns the record as it
    /// was before and after, so callers can resync both periods when the
    /// date moves.
    pub fn update(
        &self,
        id: &str,
        actor: &OwnerId,
        patch: &ExpensePatch,
    ) -> Result<(ExpenseRecord, ExpenseRecord), LedgerError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage)?;

        let before = fetch(&tx, id)?.ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        check_owner(&before, actor)?;

        let mut after = before.clone();
        patch.apply(&mut after);
        validate(&after)?;

        tx.execute(
            "UPDATE expenses SET description = ?2, category = ?3, amount_cents = ?4, sharing_mode = ?5, created_at = ?6 WHERE id = ?1",
            params![
                id,
                after.description,
                after.category,
                after.amount_cents,
                after.sharing_mode.as_str(),
                after.created_at.to_rfc3339(),
            ],
        )
        .map_err(storage)?;
        bump_version(&tx)?;
        tx.commit().map_err(storage)?;

        Ok((before, after))
    }

    /// Delete a record owned by `actor`. Returns what was deleted.
    pub fn delete(&self, id: &str, actor: &OwnerId) -> Result<ExpenseRecord, LedgerError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage)?;

        let record = fetch(&tx, id)?.ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        check_owner(&record, actor)?;

        tx.execute("DELETE FROM expenses WHERE id = ?1", params![id]).map_err(storage)?;
        bump_version(&tx)?;
        tx.commit().map_err(storage)?;

        Ok(record)
    }

    /// Delete every record owned by `owner`. Returns the deleted records.
    pub fn delete_all(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage)?;

        let records = query(&tx, "WHERE owner_id = ?1", params![owner.as_str()])?;
        if records.is_empty() {
            return Ok(records);
        }
        tx.execute("DELETE FROM expenses WHERE owner_id = ?1", params![owner.as_str()])
            .map_err(storage)?;
        bump_version(&tx)?;
        tx.commit().map_err(storage)?;

        Ok(records)
    }
}

impl LedgerStore for SqliteLedger {
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<ExpenseRecord>, LedgerError> {
        let conn = self.conn.lock();
        query(&conn, "WHERE owner_id = ?1", params![owner.as_str()])
    }

    fn list_shared(&self) -> Result<Vec<ExpenseRecord>, LedgerError> {
        let conn = self.conn.lock();
        query(&conn, "WHERE sharing_mode = ?1", params![SharingMode::Shared.as_str()])
    }

    fn version(&self) -> Result<u64, LedgerError> {
        let conn = self.conn.lock();
        let raw: String = conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| row.get(0))
            .map_err(storage)?;
        raw.parse()
            .map_err(|_| LedgerError::Storage(format!("corrupt ledger version '{raw}'")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn storage(e: rusqlite::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn validate(record: &ExpenseRecord) -> Result<(), LedgerError> {
    if record.amount_cents < 0 {
        return Err(LedgerError::Invalid(format!(
            "amount must not be negative (got {} cents)",
            record.amount_cents
        )));
    }
    if record.category.trim().is_empty() {
        return Err(LedgerError::Invalid("category is empty".into()));
    }
    Ok(())
}

fn check_owner(record: &ExpenseRecord, actor: &OwnerId) -> Result<(), LedgerError> {
    if &record.owner_id != actor {
        return Err(LedgerError::NotOwner {
            id: record.id.clone(),
            owner: record.owner_id.to_string(),
        });
    }
    Ok(())
}

fn bump_version(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute(
        "UPDATE meta SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT) WHERE key = 'version'",
        [],
    )
    .map_err(storage)?;
    Ok(())
}

fn fetch(conn: &Connection, id: &str) -> Result<Option<ExpenseRecord>, LedgerError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM expenses WHERE id = ?1"),
        params![id],
        read_row,
    )
    .optional()
    .map_err(storage)
}

fn query(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<ExpenseRecord>, LedgerError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM expenses {filter} ORDER BY created_at, id"))
        .map_err(storage)?;
    let rows = stmt.query_map(args, read_row).map_err(storage)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(storage)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ExpenseRecord> {
    let mode: String = row.get(5)?;
    let sharing_mode = SharingMode::parse(&mode).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown sharing mode '{mode}'").into(),
        )
    })?;

    let created: String = row.get(6)?;
    let created_at = DateTime::parse_from_rfc3339(&created)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(ExpenseRecord {
        id: row.get(0)?,
        owner_id: OwnerId::new(row.get::<_, String>(1)?),
        description: row.get(2)?,
        category: row.get(3)?,
        amount_cents: row.get(4)?,
        sharing_mode,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn new(owner: &str, category: &str, cents: i64, mode: SharingMode) -> NewExpense {
        NewExpense {
            owner_id: owner.into(),
            description: "test".into(),
            category: category.into(),
            amount_cents: cents,
            sharing_mode: mode,
            created_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
        }
    }

    #[test]
    fn insert_get_and_version() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        assert_eq!(ledger.version().unwrap(), 0);

        let rec = ledger.insert(new("alice", "Food", 1001, SharingMode::Shared)).unwrap();
        assert_eq!(ledger.version().unwrap(), 1);
        assert_eq!(ledger.get(&rec.id).unwrap(), rec);
        assert_eq!(ledger.list_shared().unwrap(), vec![rec.clone()]);
        assert_eq!(ledger.list_by_owner(&"alice".into()).unwrap(), vec![rec]);
        assert!(ledger.list_by_owner(&"bob".into()).unwrap().is_empty());
    }

    #[test]
    fn update_is_owner_checked() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let rec = ledger.insert(new("alice", "Food", 1001, SharingMode::Shared)).unwrap();

        let patch = ExpensePatch { sharing_mode: Some(SharingMode::Personal), ..Default::default() };
        let err = ledger.update(&rec.id, &"bob".into(), &patch).unwrap_err();
        assert!(matches!(err, LedgerError::NotOwner { .. }));
        assert_eq!(ledger.version().unwrap(), 1);

        let (before, after) = ledger.update(&rec.id, &"alice".into(), &patch).unwrap();
        assert_eq!(before.sharing_mode, SharingMode::Shared);
        assert_eq!(after.sharing_mode, SharingMode::Personal);
        assert_eq!(ledger.get(&rec.id).unwrap(), after);
        assert!(ledger.list_shared().unwrap().is_empty());
        assert_eq!(ledger.version().unwrap(), 2);
    }

    #[test]
    fn update_rejects_negative_amount() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let rec = ledger.insert(new("alice", "Food", 100, SharingMode::Personal)).unwrap();
        let patch = ExpensePatch { amount_cents: Some(-1), ..Default::default() };
        assert!(matches!(
            ledger.update(&rec.id, &"alice".into(), &patch),
            Err(LedgerError::Invalid(_))
        ));
        assert_eq!(ledger.get(&rec.id).unwrap().amount_cents, 100);
    }

    #[test]
    fn delete_and_delete_all() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let a1 = ledger.insert(new("alice", "Food", 100, SharingMode::Personal)).unwrap();
        ledger.insert(new("alice", "Rent", 200, SharingMode::Shared)).unwrap();
        let b1 = ledger.insert(new("bob", "Gym", 300, SharingMode::Personal)).unwrap();

        assert!(matches!(ledger.delete(&b1.id, &"alice".into()), Err(LedgerError::NotOwner { .. })));
        assert_eq!(ledger.delete(&a1.id, &"alice".into()).unwrap(), a1);
        assert!(matches!(ledger.get(&a1.id), Err(LedgerError::NotFound(_))));

        let gone = ledger.delete_all(&"alice".into()).unwrap();
        assert_eq!(gone.len(), 1);
        assert!(ledger.list_by_owner(&"alice".into()).unwrap().is_empty());
        assert_eq!(ledger.list_by_owner(&"bob".into()).unwrap(), vec![b1]);

        let v = ledger.version().unwrap();
        assert!(ledger.delete_all(&"alice".into()).unwrap().is_empty());
        assert_eq!(ledger.version().unwrap(), v);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let rec = {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.insert(new("bob", "Transit", 250, SharingMode::Personal)).unwrap()
        };
        let ledger = SqliteLedger::open(&path).unwrap();
        assert_eq!(ledger.get(&rec.id).unwrap(), rec);
        assert_eq!(ledger.version().unwrap(), 1);
    }
}
