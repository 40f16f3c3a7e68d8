//! Database dialect descriptors.
//!
//! A [`Dialect`] identifies the target database (vendor and version) and carries the
//! capability flags consulted by change validation and by generator selection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Supported database vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DatabaseKind {
    /// PostgreSQL.
    #[serde(rename = "postgresql", alias = "postgres", alias = "pg")]
    PostgreSql,
    /// MySQL.
    #[serde(rename = "mysql")]
    MySql,
    /// MariaDB.
    #[serde(rename = "mariadb")]
    MariaDb,
    /// SQLite.
    #[serde(rename = "sqlite")]
    Sqlite,
    /// Microsoft SQL Server.
    #[serde(rename = "mssql", alias = "sqlserver")]
    Mssql,
    /// DB2 for Linux, Unix and Windows.
    #[serde(rename = "db2")]
    Db2,
    /// DB2 for z/OS.
    #[serde(rename = "db2z")]
    Db2z,
    /// Oracle.
    #[serde(rename = "oracle")]
    Oracle,
    /// H2.
    #[serde(rename = "h2")]
    H2,
    /// Any other ANSI-ish database.
    #[serde(rename = "generic")]
    Generic,
}

impl DatabaseKind {
    /// All known kinds.
    pub const ALL: [DatabaseKind; 10] = [
        Self::PostgreSql,
        Self::MySql,
        Self::MariaDb,
        Self::Sqlite,
        Self::Mssql,
        Self::Db2,
        Self::Db2z,
        Self::Oracle,
        Self::H2,
        Self::Generic,
    ];

    /// Short name used in configuration and `dbms` filters.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
            Self::Db2 => "db2",
            Self::Db2z => "db2z",
            Self::Oracle => "oracle",
            Self::H2 => "h2",
            Self::Generic => "generic",
        }
    }

    /// The family this vendor belongs to.
    pub fn family(&self) -> DialectFamily {
        match self {
            Self::PostgreSql => DialectFamily::Postgres,
            Self::MySql | Self::MariaDb => DialectFamily::MySql,
            Self::Sqlite => DialectFamily::Sqlite,
            Self::Mssql => DialectFamily::SqlServer,
            Self::Db2 | Self::Db2z => DialectFamily::Db2,
            Self::Oracle => DialectFamily::Oracle,
            Self::H2 | Self::Generic => DialectFamily::Ansi,
        }
    }

    fn default_capabilities(&self) -> BTreeSet<Capability> {
        use Capability::*;

        let caps: &[Capability] = match self {
            Self::PostgreSql => &[
                DeferrableConstraints,
                IfExists,
                TransactionalDdl,
                RenameColumn,
                ColumnComments,
                Sequences,
                DropColumn,
            ],
            Self::MySql | Self::MariaDb => &[IfExists, RenameColumn, ColumnComments, DropColumn],
            Self::Sqlite => &[IfExists, TransactionalDdl, RenameColumn, DropColumn],
            Self::Mssql => &[TransactionalDdl, RenameColumn, Sequences, DropColumn],
            Self::Db2 => &[
                TransactionalDdl,
                RenameColumn,
                ColumnComments,
                Sequences,
                DropColumn,
                ReorgAfterAlter,
            ],
            Self::Db2z => &[TransactionalDdl, ColumnComments, Sequences, DropColumn],
            Self::Oracle => &[
                DeferrableConstraints,
                RenameColumn,
                ColumnComments,
                Sequences,
                DropColumn,
            ],
            Self::H2 => &[IfExists, TransactionalDdl, RenameColumn, Sequences, DropColumn],
            Self::Generic => &[RenameColumn, DropColumn],
        };

        caps.iter().copied().collect()
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for DatabaseKind {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "db2" => Ok(Self::Db2),
            "db2z" => Ok(Self::Db2z),
            "oracle" => Ok(Self::Oracle),
            "h2" => Ok(Self::H2),
            "generic" => Ok(Self::Generic),
            other => Err(MigrationError::config(format!(
                "unknown database kind '{}'",
                other
            ))),
        }
    }
}

/// Groups of vendors that share most of their SQL syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectFamily {
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
    /// SQL Server.
    SqlServer,
    /// DB2 (LUW and z/OS).
    Db2,
    /// Oracle.
    Oracle,
    /// Everything else.
    Ansi,
}

/// Feature flags a dialect may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// `DEFERRABLE` constraints.
    DeferrableConstraints,
    /// `IF EXISTS` / `IF NOT EXISTS` on DDL.
    IfExists,
    /// DDL participates in transactions.
    TransactionalDdl,
    /// Columns can be renamed in place.
    RenameColumn,
    /// Column comments / remarks.
    ColumnComments,
    /// Sequences.
    Sequences,
    /// `ALTER TABLE ... DROP COLUMN`.
    DropColumn,
    /// Tables must be reorganized after certain `ALTER TABLE` statements.
    ReorgAfterAlter,
}

/// A target database: vendor, version and capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    kind: DatabaseKind,
    major_version: u32,
    minor_version: u32,
    capabilities: BTreeSet<Capability>,
}

impl Dialect {
    /// Create a dialect with the vendor's default capabilities and an unknown version.
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            major_version: 0,
            minor_version: 0,
            capabilities: kind.default_capabilities(),
        }
    }

    /// PostgreSQL dialect.
    pub fn postgres() -> Self {
        Self::new(DatabaseKind::PostgreSql)
    }

    /// MySQL dialect.
    pub fn mysql() -> Self {
        Self::new(DatabaseKind::MySql)
    }

    /// SQLite dialect.
    pub fn sqlite() -> Self {
        Self::new(DatabaseKind::Sqlite)
    }

    /// SQL Server dialect.
    pub fn mssql() -> Self {
        Self::new(DatabaseKind::Mssql)
    }

    /// DB2 LUW dialect.
    pub fn db2() -> Self {
        Self::new(DatabaseKind::Db2)
    }

    /// Parse a dialect from a short name and optional `major.minor` version string.
    pub fn parse(name: &str, version: Option<&str>) -> MigrateResult<Self> {
        let dialect = Self::new(name.parse()?);
        match version {
            Some(version) => {
                let mut parts = version.trim().split('.');
                let major = parse_version_part(parts.next(), version)?;
                let minor = parse_version_part(parts.next(), version)?;
                Ok(dialect.with_version(major, minor))
            }
            None => Ok(dialect),
        }
    }

    /// Set the server version.
    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Add a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Remove a capability.
    pub fn without_capability(mut self, capability: Capability) -> Self {
        self.capabilities.remove(&capability);
        self
    }

    /// Get the vendor.
    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    /// Get the vendor family.
    pub fn family(&self) -> DialectFamily {
        self.kind.family()
    }

    /// Get the short name.
    pub fn short_name(&self) -> &'static str {
        self.kind.short_name()
    }

    /// Get the major version (0 when unknown).
    pub fn major_version(&self) -> u32 {
        self.major_version
    }

    /// Get the minor version.
    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    /// Whether the version is known and at least `major.minor`.
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major_version, self.minor_version) >= (major, minor)
    }

    /// Whether the version is known.
    pub fn has_version(&self) -> bool {
        self.major_version > 0
    }

    /// Check a capability flag.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Default statement delimiter.
    pub fn statement_delimiter(&self) -> &'static str {
        ";"
    }

    /// Quote an identifier for this dialect.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self.family() {
            DialectFamily::MySql => format!("`{}`", name.replace('`', "``")),
            DialectFamily::SqlServer => format!("[{}]", name.replace(']', "]]")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Quote a possibly schema-qualified object name.
    pub fn quote_object(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }

    /// Check a `dbms` attribute value against this dialect.
    ///
    /// The value is a comma separated list of short names. `all` matches every
    /// dialect, `none` matches none, and `!name` excludes a vendor. A list made only
    /// of exclusions matches every vendor not excluded.
    pub fn matches_dbms(&self, dbms: &[String]) -> bool {
        let entries: Vec<String> = dbms
            .iter()
            .flat_map(|d| d.split(','))
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        if entries.is_empty() {
            return true;
        }

        let mut saw_positive = false;
        let mut matched = false;
        for entry in &entries {
            if entry == "none" {
                return false;
            }
            if let Some(excluded) = entry.strip_prefix('!') {
                if self.is_named(excluded) {
                    return false;
                }
                continue;
            }
            saw_positive = true;
            if entry == "all" || self.is_named(entry) {
                matched = true;
            }
        }

        matched || !saw_positive
    }

    fn is_named(&self, name: &str) -> bool {
        name.parse::<DatabaseKind>()
            .map(|kind| kind == self.kind)
            .unwrap_or(false)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_version() {
            write!(
                f,
                "{} {}.{}",
                self.short_name(),
                self.major_version,
                self.minor_version
            )
        } else {
            f.write_str(self.short_name())
        }
    }
}

fn parse_version_part(part: Option<&str>, full: &str) -> MigrateResult<u32> {
    match part {
        None => Ok(0),
        Some(p) => p
            .trim()
            .parse()
            .map_err(|_| MigrationError::config(format!("invalid database version '{}'", full))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_aliases() {
        assert_eq!("postgres".parse::<DatabaseKind>().unwrap(), DatabaseKind::PostgreSql);
        assert_eq!("PG".parse::<DatabaseKind>().unwrap(), DatabaseKind::PostgreSql);
        assert_eq!("sqlserver".parse::<DatabaseKind>().unwrap(), DatabaseKind::Mssql);
        assert!("cobol".parse::<DatabaseKind>().is_err());
    }

    #[test]
    fn test_family() {
        assert_eq!(Dialect::new(DatabaseKind::MariaDb).family(), DialectFamily::MySql);
        assert_eq!(Dialect::new(DatabaseKind::Db2z).family(), DialectFamily::Db2);
        assert_eq!(Dialect::new(DatabaseKind::H2).family(), DialectFamily::Ansi);
    }

    #[test]
    fn test_parse_with_version() {
        let dialect = Dialect::parse("sqlite", Some("3.34")).unwrap();
        assert_eq!(dialect.kind(), DatabaseKind::Sqlite);
        assert!(!dialect.is_at_least(3, 35));
        assert!(dialect.is_at_least(3, 34));
        assert_eq!(dialect.to_string(), "sqlite 3.34");

        assert!(Dialect::parse("sqlite", Some("three")).is_err());
    }

    #[test]
    fn test_capabilities_override() {
        let dialect = Dialect::db2();
        assert!(dialect.supports(Capability::ReorgAfterAlter));

        let dialect = dialect.without_capability(Capability::ReorgAfterAlter);
        assert!(!dialect.supports(Capability::ReorgAfterAlter));

        let dialect = Dialect::mysql().with_capability(Capability::DeferrableConstraints);
        assert!(dialect.supports(Capability::DeferrableConstraints));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::postgres().quote_identifier("user"), "\"user\"");
        assert_eq!(Dialect::postgres().quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::mysql().quote_identifier("user"), "`user`");
        assert_eq!(Dialect::mssql().quote_identifier("user"), "[user]");
        assert_eq!(
            Dialect::postgres().quote_object(Some("app"), "users"),
            "\"app\".\"users\""
        );
    }

    #[test]
    fn test_matches_dbms() {
        let pg = Dialect::postgres();
        let dbms = |s: &str| vec![s.to_string()];

        assert!(pg.matches_dbms(&[]));
        assert!(pg.matches_dbms(&dbms("postgresql")));
        assert!(pg.matches_dbms(&dbms("mysql, postgres")));
        assert!(pg.matches_dbms(&dbms("all")));
        assert!(!pg.matches_dbms(&dbms("none")));
        assert!(!pg.matches_dbms(&dbms("mysql")));
        assert!(!pg.matches_dbms(&dbms("!postgresql")));
        assert!(pg.matches_dbms(&dbms("!mysql")));
        assert!(!pg.matches_dbms(&dbms("all, !postgresql")));
    }
}
