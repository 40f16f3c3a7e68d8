//! Engine configuration and the `keel.toml` file model.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumVersion;
use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};
use crate::logging::LogFormat;

/// Default history table name.
pub const DEFAULT_HISTORY_TABLE: &str = "keel_changelog";

/// Default lock table name.
pub const DEFAULT_LOCK_TABLE: &str = "keel_changelog_lock";

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Checksum version written to history.
    pub checksum_version: ChecksumVersion,
    /// History table name.
    pub history_table: String,
    /// Lock table name.
    pub lock_table: String,
    /// Rewrite verified legacy-version checksums to the current version.
    pub upgrade_checksums: bool,
    /// Treat checksum drift on run-once changesets as an error.
    pub fail_on_drift: bool,
    /// Default failure propagation for changesets that do not set it.
    pub fail_on_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checksum_version: ChecksumVersion::CURRENT,
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            lock_table: DEFAULT_LOCK_TABLE.to_string(),
            upgrade_checksums: true,
            fail_on_drift: true,
            fail_on_error: true,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the checksum version written to history.
    pub fn checksum_version(mut self, version: ChecksumVersion) -> Self {
        self.checksum_version = version;
        self
    }

    /// Set the history table name.
    pub fn history_table(mut self, table: impl Into<String>) -> Self {
        self.history_table = table.into();
        self
    }

    /// Set the lock table name.
    pub fn lock_table(mut self, table: impl Into<String>) -> Self {
        self.lock_table = table.into();
        self
    }

    /// Set whether legacy checksums are upgraded after verification.
    pub fn upgrade_checksums(mut self, upgrade: bool) -> Self {
        self.upgrade_checksums = upgrade;
        self
    }

    /// Set whether drift fails the run.
    pub fn fail_on_drift(mut self, fail: bool) -> Self {
        self.fail_on_drift = fail;
        self
    }

    /// Set the default failure propagation.
    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }
}

/// Contents of `keel.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeelConfig {
    /// Target database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl KeelConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrationError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration from TOML, expanding `${VAR}` references first.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> MigrateResult<Self> {
        let expanded = expand_env_vars(content)?;
        toml::from_str(&expanded).map_err(|e| MigrationError::config(e.to_string()))
    }

    /// Dialect described by `[database]`.
    pub fn dialect(&self) -> MigrateResult<Dialect> {
        Dialect::parse(&self.database.dialect, self.database.version.as_deref())
    }

    /// Apply the overrides of `env`, if declared.
    pub fn with_environment(mut self, env: &str) -> Self {
        let Some(overrides) = self.environments.remove(env) else {
            return self;
        };

        if let Some(db) = overrides.database {
            if let Some(dialect) = db.dialect {
                self.database.dialect = dialect;
            }
            if db.version.is_some() {
                self.database.version = db.version;
            }
            if db.url.is_some() {
                self.database.url = db.url;
            }
        }
        if let Some(engine) = overrides.engine {
            if let Some(table) = engine.history_table {
                self.engine.history_table = table;
            }
            if let Some(upgrade) = engine.upgrade_checksums {
                self.engine.upgrade_checksums = upgrade;
            }
            if let Some(fail) = engine.fail_on_drift {
                self.engine.fail_on_drift = fail;
            }
            if let Some(fail) = engine.fail_on_error {
                self.engine.fail_on_error = fail;
            }
        }
        if let Some(logging) = overrides.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
        self
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Dialect short name (`postgresql`, `sqlite`, ...).
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Server version, `major.minor`.
    pub version: Option<String>,

    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            version: None,
            url: None,
        }
    }
}

fn default_dialect() -> String {
    "generic".to_string()
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

/// `[environments.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    pub database: Option<DatabaseOverride>,
    pub engine: Option<EngineOverride>,
    pub logging: Option<LoggingOverride>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    pub dialect: Option<String>,
    pub version: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOverride {
    pub history_table: Option<String>,
    pub upgrade_checksums: Option<bool>,
    pub fail_on_drift: Option<bool>,
    pub fail_on_error: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingOverride {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

/// Replace `${VAR}` with the variable's value; unset variables are left as written.
fn expand_env_vars(content: &str) -> MigrateResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").map_err(|e| MigrationError::config(e.to_string()))?;
    Ok(re
        .replace_all(content, |caps: &regex_lite::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = KeelConfig::default();
        assert_eq!(config.database.dialect, "generic");
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.history_table, "keel_changelog");
        assert_eq!(config.engine.checksum_version, ChecksumVersion::V9);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [database]
            dialect = "postgres"
            version = "15.2"

            [engine]
            checksum_version = 8
            fail_on_drift = false

            [logging]
            level = "debug"
            format = "pretty"
        "#;

        let config = KeelConfig::from_str(toml).unwrap();
        let dialect = config.dialect().unwrap();
        assert_eq!(dialect.kind(), DatabaseKind::PostgreSql);
        assert_eq!(dialect.major_version(), 15);
        assert_eq!(config.engine.checksum_version, ChecksumVersion::V8);
        assert!(!config.engine.fail_on_drift);
        assert!(config.engine.upgrade_checksums);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(KeelConfig::from_str("[engine]\nfail_fast = true\n").is_err());
        assert!(KeelConfig::from_str("[engine]\nchecksum_version = 7\n").is_err());
    }

    #[test]
    fn test_environment_override() {
        let toml = r#"
            [database]
            dialect = "sqlite"

            [environments.ci.database]
            url = "sqlite::memory:"

            [environments.ci.engine]
            fail_on_error = false
        "#;

        let config = KeelConfig::from_str(toml).unwrap().with_environment("ci");
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.database.dialect, "sqlite");
        assert!(!config.engine.fail_on_error);

        let untouched = KeelConfig::from_str(toml).unwrap().with_environment("prod");
        assert!(untouched.database.url.is_none());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("KEEL_TEST_CONFIG_URL", "postgres://test");
        }
        assert_eq!(
            expand_env_vars("url = \"${KEEL_TEST_CONFIG_URL}\" other = \"${KEEL_TEST_UNSET_VAR}\"").unwrap(),
            "url = \"postgres://test\" other = \"${KEEL_TEST_UNSET_VAR}\""
        );
        unsafe {
            std::env::remove_var("KEEL_TEST_CONFIG_URL");
        }
    }
}
