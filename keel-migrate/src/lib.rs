//! # keel-migrate
//!
//! Changeset reconciliation engine.
//!
//! This crate provides:
//! - Versioned checksums of changesets, with content normalization
//! - The [`Change`] contract and a registry of built-in change types
//! - Priority-ordered, chainable SQL generator dispatch per dialect
//! - The [`ReconciliationEngine`] deciding, executing and recording changesets
//! - Rollback planning from explicit rollbacks or computed inverses
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │  ChangeLog   │────▶│  Reconciliation│────▶│ GeneratorRegistry│
//! │ (ChangeSets) │     │     Engine     │     │  (per dialect)   │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//!                        │            │                │
//!                        ▼            ▼                ▼
//!               ┌──────────────┐  ┌──────────────────────────┐
//!               │   History    │  │    StatementExecutor     │
//!               │    Store     │  │ (database or SQL script) │
//!               └──────────────┘  └──────────────────────────┘
//! ```
//!
//! A changeset runs when it has no history row, when it is `runAlways`, or when
//! it is `runOnChange` and its checksum changed. A run-once changeset whose
//! checksum changed is drift and stops the update before anything executes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_migrate::{
//!     AcceptAll, ChangeLog, ColumnConfig, CreateTableChange, Dialect, EngineContext,
//!     InMemoryHistoryStore, ReconciliationEngine, SqlScriptExecutor,
//! };
//!
//! async fn run() -> keel_migrate::MigrateResult<()> {
//!     let mut changelog = ChangeLog::new("db/changelog.yaml");
//!     let users = changelog
//!         .changeset("1", "alice")
//!         .change(CreateTableChange::new("users").column(ColumnConfig::new("id", "BIGINT").primary_key()));
//!     changelog.add(users)?;
//!
//!     let engine = ReconciliationEngine::new(
//!         EngineContext::new(Dialect::postgres()),
//!         InMemoryHistoryStore::new(),
//!         SqlScriptExecutor::new(),
//!     );
//!     let report = engine.update(&changelog, &AcceptAll).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod change;
pub mod changelog;
pub mod changeset;
pub mod checksum;
pub mod config;
pub mod context;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod history;
pub mod inspect;
pub mod logging;
pub mod memory;
pub mod resource;
pub mod rollback;
pub mod sql_text;
pub mod sqlgen;
pub mod statement;
pub mod validation;

/// Engine version written into every history row.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use change::{
    AddColumnChange, AddNotNullConstraintChange, AppliedState, Change, ChangeContext, ChangeRegistry,
    ChangeStatus, ChecksumField, ColumnConfig, CreateIndexChange, CreateTableChange, DropColumnChange,
    DropIndexChange, DropTableChange, RenameColumnChange, RenameTableChange, SqlChange, SqlFileChange,
    TagDatabaseChange,
};
pub use changelog::{ChangeLog, ProblemKind, ValidationProblem, ValidationReport};
pub use changeset::{ChangeSet, ChangeSetId, Rollback, ValidChecksum};
pub use checksum::{Checksum, ChecksumComparison, ChecksumVersion, NormalizeOptions};
pub use config::{EngineConfig, KeelConfig};
pub use context::EngineContext;
pub use dialect::{Capability, DatabaseKind, Dialect};
pub use engine::{
    ChangeSetOutcome, ChangeSetStatus, EvaluatedChangeSet, PendingChangeSet, PendingReason, ReconciliationEngine, RollbackReport,
    UpdateReport,
};
pub use error::{MigrateResult, MigrationError};
pub use executor::{ExecutionUnit, SqlScriptExecutor, StatementExecutor};
pub use filter::{AcceptAll, ChangeSetFilter, DbmsFilter, FilterChain, FilterVerdict, IgnoreFilter};
pub use history::{ExecType, ExecutionHistoryStore, ExecutionLock, ExecutionRecord};
pub use inspect::{SchemaInspector, SnapshotInspector};
pub use memory::InMemoryHistoryStore;
pub use resource::{FileSystemResourceAccessor, InMemoryResourceAccessor, ResourceAccessor};
pub use rollback::{RollbackPlan, RollbackPlanner, RollbackStep, RollbackTarget};
pub use sqlgen::{GeneratorChain, GeneratorRegistry, SqlGenerator};
pub use statement::{Sql, SqlStatement, StatementKind};
pub use validation::ValidationErrors;
