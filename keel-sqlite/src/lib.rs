//! SQLite backend for keel.
//!
//! [`SqliteDatabase`] is the execution history store, the statement executor
//! and the schema inspector of one SQLite database, built on `tokio-rusqlite`.
//!
//! # Example
//!
//! ```rust,ignore
//! use keel_migrate::{AcceptAll, EngineContext, ReconciliationEngine};
//! use keel_sqlite::{SqliteConfig, SqliteDatabase};
//!
//! let db = SqliteDatabase::open(SqliteConfig::from_url("sqlite://./app.db")?).await?;
//! let engine = ReconciliationEngine::new(EngineContext::new(db.dialect().clone()), db.clone(), db);
//! let report = engine.update(&changelog, &AcceptAll).await?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod history;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use database::SqliteDatabase;
pub use error::{SqliteError, SqliteResult};
