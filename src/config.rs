/// Runtime configuration for the habit store
///
/// The binary fills this from command line arguments, which fall back to
/// `HABIT_STORE_*` environment variables. Everything has a default.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::storage::sqlite::DEFAULT_PAGE_SIZE;
use crate::storage::DEFAULT_REQUEST_TIMEOUT;

/// Logical table every item lives in unless configured otherwise
pub const DEFAULT_TABLE_NAME: &str = "HabitTrackerApp";

/// Days of checks shown next to each habit on the overview
pub const DEFAULT_RECENT_WINDOW_DAYS: u32 = 7;

/// Checks shown on a habit's detail view
pub const DEFAULT_LATEST_CHECKS_LIMIT: u32 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file; `None` picks a per-user default location
    pub database: Option<PathBuf>,
    pub table_name: String,
    pub request_timeout: Duration,
    pub page_size: usize,
    pub recent_window_days: u32,
    pub latest_checks_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            latest_checks_limit: DEFAULT_LATEST_CHECKS_LIMIT,
        }
    }
}

impl Config {
    /// The configured database path, creating its directory if needed
    pub fn database_path(&self) -> io::Result<PathBuf> {
        match &self.database {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Ok(path.clone())
            }
            None => default_database_path(),
        }
    }
}

/// First writable location among the home, data and config directories,
/// then the working directory, then the temp directory
pub fn default_database_path() -> io::Result<PathBuf> {
    let candidates = [
        dirs::home_dir().map(|p| p.join(".habit_store")),
        dirs::data_dir().map(|p| p.join("habit_store")),
        dirs::config_dir().map(|p| p.join("habit_store")),
        std::env::current_dir().ok().map(|p| p.join(".habit_store")),
    ];

    for dir in candidates.iter().flatten() {
        if is_writable_dir(dir) {
            let path = dir.join("habits.db");
            info!("Using database at: {}", path.display());
            return Ok(path);
        }
    }

    let dir = std::env::temp_dir().join("habit_store");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("habits.db");
    warn!("Using temporary directory for database: {}", path.display());
    Ok(path)
}

fn is_writable_dir(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".write_probe");
    let writable = std::fs::write(&probe, b"").is_ok();
    let _ = std::fs::remove_file(&probe);
    writable
}
