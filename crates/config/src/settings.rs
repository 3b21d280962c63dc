// SplitGrid settings
// Loaded from ~/.config/splitgrid/config.toml (or --config)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use splitgrid_core::{CategoryMap, GridLayout, PeriodMap};

use crate::roster::{Party, PartyRoster};
use crate::ConfigError;

/// Where grid writes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridBackend {
    /// SQLite file next to the config (default)
    #[default]
    Local,
    /// Remote spreadsheet values API
    Sheets,
}

/// When an owner's cycle writes the partner's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerWritePolicy {
    /// Only cells with a shared total now, or a stale value before.
    Touched,
    /// Every category cell, every cycle.
    #[default]
    Always,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// SQLite ledger file. Relative paths resolve against the config file's directory.
    pub path: PathBuf,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self { path: PathBuf::from("ledger.db") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub backend: GridBackend,
    /// Local grid file (backend = "local").
    pub local_path: PathBuf,
    /// Sheet/tab name inside each remote spreadsheet.
    pub sheet_name: String,
    /// Values API base URL (backend = "sheets").
    pub api_base: String,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            backend: GridBackend::Local,
            local_path: PathBuf::from("grids.db"),
            sheet_name: "Sheet1".to_string(),
            api_base: "https://sheets.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub partner_writes: PartnerWritePolicy,
    /// Total attempts per cell write within one cycle (>= 1).
    pub write_attempts: u32,
    /// Total attempts to take a consistent ledger snapshot (>= 1).
    pub snapshot_attempts: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            partner_writes: PartnerWritePolicy::Always,
            write_attempts: 2,
            snapshot_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub version: u32,
    pub rows: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTable {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ledger: LedgerSettings,
    pub grid: GridSettings,
    pub sync: SyncSettings,
    pub parties: Vec<Party>,
    /// Omitted = built-in table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategoryTable>,
    /// Omitted = columns B..M.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periods: Option<PeriodTable>,

    /// Directory relative paths resolve against. Not part of the file.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("splitgrid")
            .join("config.toml")
    }

    /// Parse and validate. Relative paths stay relative to `base_dir` (".").
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.base_dir = PathBuf::from(".");
        settings.validate()?;
        Ok(settings)
    }

    /// Load from `path`, or the default location when None.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        let contents = fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("cannot read {}: {e}", path.display())))?;
        let mut settings = Self::from_toml(&contents)?;
        settings.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.write_attempts == 0 {
            return Err(ConfigError::Validation("sync.write_attempts must be >= 1".into()));
        }
        if self.sync.snapshot_attempts == 0 {
            return Err(ConfigError::Validation("sync.snapshot_attempts must be >= 1".into()));
        }
        if self.grid.backend == GridBackend::Sheets && self.grid.sheet_name.trim().is_empty() {
            return Err(ConfigError::Validation("grid.sheet_name is empty".into()));
        }
        self.roster()?;
        self.layout()?;
        Ok(())
    }

    pub fn roster(&self) -> Result<PartyRoster, ConfigError> {
        PartyRoster::new(self.parties.clone())
    }

    pub fn layout(&self) -> Result<GridLayout, ConfigError> {
        let categories = match &self.categories {
            Some(table) => CategoryMap::new(
                table.version,
                table.rows.iter().map(|(c, r)| (c.clone(), *r)),
            )?,
            None => CategoryMap::default(),
        };
        let periods = match &self.periods {
            Some(table) => PeriodMap::new(table.columns.iter().cloned())?,
            None => PeriodMap::default(),
        };
        Ok(GridLayout::new(categories, periods))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.resolve(&self.ledger.path)
    }

    pub fn local_grid_path(&self) -> PathBuf {
        self.resolve(&self.grid.local_path)
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    /// Write a starter config for two parties. Refuses to overwrite.
    pub fn write_template(path: &Path, owners: [(&str, &str); 2]) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::Io(format!("{} already exists", path.display())));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let mut out = String::from(TEMPLATE_HEADER);
        for (owner, grid) in owners {
            out.push_str(&format!(
                "\n[[parties]]\nowner_id = \"{owner}\"\ngrid_id = \"{grid}\"\n"
            ));
        }
        fs::write(path, out).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

const TEMPLATE_HEADER: &str = r#"# SplitGrid configuration
#
# [categories] and [periods] are optional; omit them to use the built-in
# category rows and columns B..M.

[ledger]
path = "ledger.db"

[grid]
backend = "local"          # "local" or "sheets"
local_path = "grids.db"
sheet_name = "Sheet1"

[sync]
partner_writes = "always"  # or "touched": skip partner cells already correct
write_attempts = 2
snapshot_attempts = 3
"#;
