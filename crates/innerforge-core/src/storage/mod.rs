mod sqlite;

pub use sqlite::{SqliteStore, StoreCounts};

use std::path::PathBuf;

use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};

/// Open the store described by `config`, creating the parent directory for
/// file-backed databases on first use.
pub fn open_from_config(config: &ForgeConfig) -> Result<SqliteStore> {
    let path = match &config.storage.path {
        Some(p) => PathBuf::from(p),
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ForgeError::Storage(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    SqliteStore::open(&path)
}

/// Default SQLite path: `~/.config/innerforge/innerforge.db`
pub fn default_db_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("innerforge").join("innerforge.db"))
        .ok_or_else(|| ForgeError::Config("cannot determine config directory".to_string()))
}
