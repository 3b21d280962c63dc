//! Category and period address maps.
//!
//! A cell address is a pure function of (category, period): the category
//! picks the row, the month picks the column. Owner never participates, so
//! the same address exists in both parties' grids.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::period::Period;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Category is not in the category map. Never falls back to a default row.
    UnknownCategory(String),
    /// Month index outside 0..=11.
    InvalidPeriod(u8),
    /// Category name is empty or whitespace.
    EmptyCategory,
    /// Row 0 does not exist in a grid.
    ZeroRow(String),
    /// Two categories map onto the same row.
    DuplicateRow { row: u32, first: String, second: String },
    /// The period map must have exactly 12 columns.
    PeriodCount(usize),
    /// Column identifier is not 1-3 uppercase letters.
    InvalidColumn(String),
    /// Two months map onto the same column.
    DuplicateColumn(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCategory(c) => write!(f, "unknown category '{c}'"),
            Self::InvalidPeriod(m) => write!(f, "month index {m} out of range 0..=11"),
            Self::EmptyCategory => write!(f, "category name is empty"),
            Self::ZeroRow(c) => write!(f, "category '{c}': rows start at 1"),
            Self::DuplicateRow { row, first, second } => {
                write!(f, "categories '{first}' and '{second}' both map to row {row}")
            }
            Self::PeriodCount(n) => write!(f, "period map needs 12 columns, found {n}"),
            Self::InvalidColumn(c) => write!(f, "invalid column identifier '{c}'"),
            Self::DuplicateColumn(c) => write!(f, "column '{c}' is used by more than one month"),
        }
    }
}

impl std::error::Error for AddressError {}

/// One scalar slot in a grid, e.g. `B34`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellAddress {
    pub column: String,
    pub row: u32,
}

impl CellAddress {
    pub fn new(column: impl Into<String>, row: u32) -> Self {
        Self { column: column.into(), row }
    }

    /// Parse an A1-style reference such as "M52".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (col, row) = s.split_at(split);
        if !is_valid_column(col) {
            return None;
        }
        let row: u32 = row.parse().ok()?;
        (row > 0).then(|| Self::new(col, row))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

fn is_valid_column(col: &str) -> bool {
    !col.is_empty() && col.len() <= 3 && col.chars().all(|c| c.is_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Category map
// ---------------------------------------------------------------------------

/// Versioned category → row table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    version: u32,
    rows: BTreeMap<String, u32>,
}

/// Built-in table, version 1.
const DEFAULT_CATEGORY_ROWS: &[(&str, u32)] = &[
    ("Rent", 26),
    ("Home", 27),
    ("Phone/Internet", 28),
    ("Transit", 31),
    ("Food", 34),
    ("Dining Out", 35),
    ("Misc", 36),
    ("Shopping", 37),
    ("Entertainment", 40),
    ("Gym", 43),
    ("Roadtrip", 46),
    ("Commercial", 50),
    ("Tax/Auto", 51),
    ("Tax/Other", 52),
    ("Vacation", 74),
];

impl CategoryMap {
    /// Build and validate a map. Rejects empty names, row 0 and shared rows.
    pub fn new<I, S>(version: u32, entries: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut rows = BTreeMap::new();
        let mut by_row: HashMap<u32, String> = HashMap::new();
        for (name, row) in entries {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(AddressError::EmptyCategory);
            }
            if row == 0 {
                return Err(AddressError::ZeroRow(name));
            }
            if let Some(first) = by_row.get(&row) {
                return Err(AddressError::DuplicateRow {
                    row,
                    first: first.clone(),
                    second: name,
                });
            }
            by_row.insert(row, name.clone());
            rows.insert(name, row);
        }
        Ok(Self { version, rows })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn row(&self, category: &str) -> Result<u32, AddressError> {
        self.rows
            .get(category)
            .copied()
            .ok_or_else(|| AddressError::UnknownCategory(category.to_string()))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.rows.contains_key(category)
    }

    /// Category names in name order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// (category, row) pairs ordered by row, the way they appear in a grid.
    pub fn by_row(&self) -> Vec<(&str, u32)> {
        let mut v: Vec<_> = self.rows.iter().map(|(c, r)| (c.as_str(), *r)).collect();
        v.sort_by_key(|(_, r)| *r);
        v
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self {
            version: 1,
            rows: DEFAULT_CATEGORY_ROWS
                .iter()
                .map(|(c, r)| (c.to_string(), *r))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Period map
// ---------------------------------------------------------------------------

/// Month index → column table. Exactly 12 distinct columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodMap {
    columns: Vec<String>,
}

impl PeriodMap {
    pub fn new<I, S>(columns: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() != 12 {
            return Err(AddressError::PeriodCount(columns.len()));
        }
        let mut seen = HashSet::new();
        for col in &columns {
            if !is_valid_column(col) {
                return Err(AddressError::InvalidColumn(col.clone()));
            }
            if !seen.insert(col.as_str()) {
                return Err(AddressError::DuplicateColumn(col.clone()));
            }
        }
        Ok(Self { columns })
    }

    /// Column for a 0-based month index.
    pub fn column(&self, month_index: u8) -> Result<&str, AddressError> {
        self.columns
            .get(month_index as usize)
            .map(String::as_str)
            .ok_or(AddressError::InvalidPeriod(month_index))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Default for PeriodMap {
    fn default() -> Self {
        Self {
            columns: ('B'..='M').map(|c| c.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Both maps together: everything needed to place a value in a grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridLayout {
    pub categories: CategoryMap,
    pub periods: PeriodMap,
}

impl GridLayout {
    pub fn new(categories: CategoryMap, periods: PeriodMap) -> Self {
        Self { categories, periods }
    }

    pub fn resolve_period(&self, month_index: u8) -> Result<&str, AddressError> {
        self.periods.column(month_index)
    }

    pub fn resolve_address(&self, category: &str, period: Period) -> Result<CellAddress, AddressError> {
        let row = self.categories.row(category)?;
        let column = self.periods.column(period.month_index)?;
        Ok(CellAddress::new(column, row))
    }
}
