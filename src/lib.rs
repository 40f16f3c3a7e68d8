//! # Keel
//!
//! A database-agnostic schema change reconciliation engine.
//!
//! Keel provides:
//! - Changesets of typed changes, identified by `path::id::author`
//! - Versioned checksums that detect edits to already-applied changesets
//! - Per-dialect SQL generation through a prioritized generator chain
//! - Execution history with run-once, run-always and run-on-change policies
//! - Rollback from explicit rollback blocks or computed inverses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::MigrationError> {
//!     let config = KeelConfig::from_file("keel.toml")?.with_environment("production");
//!     keel::logging::init_with(&config.logging.level, config.logging.format);
//!
//!     let mut changelog = ChangeLog::new("db/changelog.yaml");
//!     let users = changelog.changeset("1", "alice").change(
//!         CreateTableChange::new("users").column(ColumnConfig::new("id", "INTEGER").primary_key()),
//!     );
//!     changelog.add(users)?;
//!
//!     let engine = keel::connect_sqlite(&config).await?;
//!     let report = engine.update(&changelog, &AcceptAll).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The reconciliation engine and its building blocks.
pub mod migrate {
    pub use keel_migrate::*;
}

/// SQLite history store and executor.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use keel_sqlite::*;
}

pub use keel_migrate::{logging, VERSION};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use keel_migrate::{
        AcceptAll, Change, ChangeLog, ChangeSet, ChangeSetFilter, ChangeSetOutcome, ColumnConfig,
        CreateTableChange, Dialect, EngineConfig, EngineContext, FilterVerdict, InMemoryHistoryStore,
        KeelConfig, MigrateResult, MigrationError, ReconciliationEngine, Rollback, RollbackTarget,
        SqlChange, SqlScriptExecutor, UpdateReport,
    };

    #[cfg(feature = "sqlite")]
    pub use keel_sqlite::{SqliteConfig, SqliteDatabase};
}

// Re-export key types at the crate root
pub use keel_migrate::{ChangeLog, ChangeSet, MigrateResult, MigrationError, ReconciliationEngine};

/// Engine backed by one SQLite database.
#[cfg(feature = "sqlite")]
pub type SqliteEngine = ReconciliationEngine<keel_sqlite::SqliteDatabase, keel_sqlite::SqliteDatabase>;

/// Open the SQLite database named by `[database].url` and build an engine
/// configured from `[engine]`.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub async fn connect_sqlite(config: &keel_migrate::KeelConfig) -> MigrateResult<SqliteEngine> {
    use keel_sqlite::{SqliteConfig, SqliteDatabase};

    let url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| MigrationError::config("[database].url is required"))?;
    let sqlite = SqliteConfig::from_url(url)?.with_engine_config(&config.engine);
    let db = SqliteDatabase::open(sqlite).await?;

    let ctx = keel_migrate::EngineContext::new(db.dialect().clone()).with_config(config.engine.clone());
    Ok(ReconciliationEngine::new(ctx, db.clone(), db))
}
