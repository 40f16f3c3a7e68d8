//! SQLite configuration.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use keel_migrate::EngineConfig;
use keel_migrate::config::{DEFAULT_HISTORY_TABLE, DEFAULT_LOCK_TABLE};

use crate::error::{SqliteError, SqliteResult};

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Enable foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Journal mode.
    pub journal_mode: JournalMode,
    /// Execution history table.
    pub history_table: String,
    /// Changelog lock table.
    pub lock_table: String,
}

/// Database path configuration.
#[derive(Debug, Clone, Default)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Path for display. Non UTF-8 bytes are replaced.
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            Self::Memory => Cow::Borrowed(":memory:"),
            Self::File(path) => path.to_string_lossy(),
        }
    }

    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Truncate,
    Memory,
    #[default]
    Wal,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            journal_mode: JournalMode::Wal,
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            lock_table: DEFAULT_LOCK_TABLE.to_string(),
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite URL into configuration.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` - In-memory database
    /// - `sqlite://path/to/db.sqlite` - File-based database
    /// - `file:path/to/db.sqlite` - Alternative format
    ///
    /// `foreign_keys`, `busy_timeout` and `journal_mode` are read from the query string.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url_str = url.as_ref();
        let (location, query) = match url_str.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url_str, None),
        };

        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .or_else(|| location.strip_prefix("file:"))
            .unwrap_or(location);

        let mut config = match path {
            "" => return Err(SqliteError::config("database path is required")),
            ":memory:" => Self::memory(),
            path => Self::file(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value
                        .parse()
                        .map_err(|_| SqliteError::config(format!("invalid busy_timeout '{}'", value)))?;
                    config.busy_timeout_ms = Some(ms);
                }
                "journal_mode" => {
                    config.journal_mode = match value.to_ascii_lowercase().as_str() {
                        "delete" => JournalMode::Delete,
                        "truncate" => JournalMode::Truncate,
                        "memory" => JournalMode::Memory,
                        "wal" => JournalMode::Wal,
                        other => return Err(SqliteError::config(format!("unknown journal_mode '{}'", other))),
                    };
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Take the table names from an engine configuration.
    pub fn with_engine_config(mut self, engine: &EngineConfig) -> Self {
        self.history_table = engine.history_table.clone();
        self.lock_table = engine.lock_table.clone();
        self
    }

    /// Database path for logs.
    pub fn path_str(&self) -> Cow<'_, str> {
        self.path.display()
    }

    /// Reject table names that cannot be interpolated safely and file paths
    /// that are not valid UTF-8.
    pub fn validate(&self) -> SqliteResult<()> {
        for (what, name) in [("history", &self.history_table), ("lock", &self.lock_table)] {
            let valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(SqliteError::config(format!("invalid {} table name '{}'", what, name)));
            }
        }
        if let DatabasePath::File(path) = &self.path {
            if path.to_str().is_none() {
                return Err(SqliteError::config(format!(
                    "database path '{}' is not valid UTF-8",
                    path.to_string_lossy()
                )));
            }
        }
        if self.history_table == self.lock_table {
            return Err(SqliteError::config("history and lock tables must differ"));
        }
        Ok(())
    }

    /// Generate the initialization SQL for this configuration.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();

        if self.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON;\n");
        }

        // In-memory databases only support MEMORY journaling.
        if !self.path.is_memory() {
            sql.push_str(&format!("PRAGMA journal_mode = {};\n", self.journal_mode.as_pragma()));
        }

        if let Some(timeout) = self.busy_timeout_ms {
            sql.push_str(&format!("PRAGMA busy_timeout = {};\n", timeout));
        }

        sql
    }

    /// Enable or disable foreign keys.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Set the history and lock table names.
    pub fn tables(mut self, history: impl Into<String>, lock: impl Into<String>) -> Self {
        self.history_table = history.into();
        self.lock_table = lock.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_from_url() {
        assert!(SqliteConfig::from_url("sqlite::memory:").unwrap().path.is_memory());
        assert!(SqliteConfig::from_url(":memory:").unwrap().path.is_memory());

        let config = SqliteConfig::from_url("sqlite://./keel.db?foreign_keys=0&busy_timeout=250&journal_mode=delete").unwrap();
        assert_eq!(config.path_str(), "./keel.db");
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, Some(250));
        assert_eq!(config.journal_mode, JournalMode::Delete);

        assert!(SqliteConfig::from_url("sqlite://").is_err());
        assert!(SqliteConfig::from_url("file:x.db?journal_mode=sideways").is_err());
    }

    #[test]
    fn test_table_names_validated() {
        assert!(SqliteConfig::memory().validate().is_ok());
        assert!(SqliteConfig::memory().tables("history; DROP TABLE x", "lock").validate().is_err());
        assert!(SqliteConfig::memory().tables("same", "same").validate().is_err());

        let engine = EngineConfig::new().history_table("app_changelog").lock_table("app_lock");
        let config = SqliteConfig::memory().with_engine_config(&engine);
        assert_eq!(config.history_table, "app_changelog");
        assert_eq!(config.lock_table, "app_lock");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let config = SqliteConfig::file(OsStr::from_bytes(b"keel-\xff.db"));
        assert!(!config.path.is_memory());
        assert!(config.validate().is_err());
        assert!(config.path_str().starts_with("keel-"));
    }

    #[test]
    fn test_init_sql() {
        let memory = SqliteConfig::memory().init_sql();
        assert!(memory.contains("foreign_keys = ON"));
        assert!(!memory.contains("journal_mode"));

        let file = SqliteConfig::file("keel.db").busy_timeout(100).init_sql();
        assert!(file.contains("journal_mode = WAL"));
        assert!(file.contains("busy_timeout = 100"));
    }
}
