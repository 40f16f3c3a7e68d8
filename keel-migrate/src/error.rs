//! Error types for the reconciliation engine.

// Fields are read by the thiserror/miette derives.
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for engine operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while reconciling, executing or rolling back changesets.
#[derive(Debug, Error, Diagnostic)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(keel::io))]
    Io(#[from] std::io::Error),

    /// Database operation error reported by a collaborator.
    #[error("Database error: {0}")]
    #[diagnostic(code(keel::database))]
    Database(String),

    /// Configuration could not be read or is inconsistent.
    #[error("Configuration error: {0}")]
    #[diagnostic(code(keel::config))]
    Config(String),

    /// A stored checksum string could not be parsed.
    #[error("Invalid checksum '{0}': expected '<version>:<digest>'")]
    #[diagnostic(code(keel::checksum::invalid))]
    InvalidChecksum(String),

    /// A run-once changeset was modified after it was executed.
    #[error(
        "Checksum drift for changeset '{changeset}': stored {stored}, now {actual}. \
         The changeset was modified after it ran"
    )]
    #[diagnostic(
        code(keel::checksum::drift),
        help("revert the edit, mark the changeset runOnChange, or add a validCheckSum")
    )]
    ChecksumDrift {
        /// Changeset identity (`path::id::author`).
        changeset: String,
        /// Checksum recorded in the history store.
        stored: String,
        /// Checksum recomputed with the stored version.
        actual: String,
    },

    /// A change failed its structural self-check.
    #[error("Validation failed for {change_type} in changeset '{changeset}' on {dialect}: {errors}")]
    #[diagnostic(code(keel::validation))]
    Validation {
        /// Changeset identity.
        changeset: String,
        /// Declared change type.
        change_type: String,
        /// Target dialect short name.
        dialect: String,
        /// Joined validation messages.
        errors: String,
    },

    /// The changelog did not pass validation; nothing was executed.
    #[error("Changelog validation failed with {count} problem(s):\n{summary}")]
    #[diagnostic(code(keel::validation::changelog))]
    ValidationFailed {
        /// Number of problems found.
        count: usize,
        /// One line per problem.
        summary: String,
    },

    /// No SQL generator accepts the statement for the dialect.
    #[error("Unsupported operation: no SQL generator for '{statement}' on {dialect}")]
    #[diagnostic(
        code(keel::dispatch),
        help("register a generator for this statement, or target a dialect that supports it")
    )]
    UnsupportedStatement {
        /// Statement kind.
        statement: String,
        /// Target dialect short name.
        dialect: String,
    },

    /// The statement depends on live database state and cannot be rendered offline.
    #[error("Statement '{statement}' cannot be rendered offline for {dialect}")]
    #[diagnostic(code(keel::dispatch::volatile))]
    VolatileStatement {
        /// Statement kind.
        statement: String,
        /// Target dialect short name.
        dialect: String,
    },

    /// A referenced resource could not be read.
    #[error("Resource not found: {0}")]
    #[diagnostic(code(keel::resource))]
    ResourceNotFound(String),

    /// Executing a changeset's statements failed.
    #[error("Changeset '{changeset}' failed on {dialect}: {source}")]
    #[diagnostic(code(keel::execution))]
    ExecutionFailed {
        /// Changeset identity.
        changeset: String,
        /// Target dialect short name.
        dialect: String,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// A changeset has no explicit rollback and a change cannot compute its inverse.
    #[error(
        "Cannot roll back changeset '{changeset}': {change_type} has no inverse and no explicit rollback was declared"
    )]
    #[diagnostic(code(keel::rollback::impossible))]
    RollbackImpossible {
        /// Changeset identity.
        changeset: String,
        /// Change type without an inverse.
        change_type: String,
    },

    /// A history row has no matching changeset in the changelog.
    #[error("Changeset '{0}' is recorded as applied but is not in the changelog")]
    #[diagnostic(code(keel::changeset::not_found))]
    ChangeSetNotFound(String),

    /// Two changesets share the same identity.
    #[error("Duplicate changeset identity '{0}'")]
    #[diagnostic(code(keel::changeset::duplicate))]
    DuplicateChangeSet(String),

    /// The rollback tag does not exist in the history store.
    #[error("Tag '{0}' does not exist")]
    #[diagnostic(code(keel::tag::not_found))]
    TagNotFound(String),

    /// No factory is registered for the declared change type.
    #[error("Unknown change type '{0}'")]
    #[diagnostic(code(keel::change::unknown))]
    UnknownChangeType(String),

    /// Change parameters could not be turned into a change.
    #[error("Invalid {change_type} change: {message}")]
    #[diagnostic(code(keel::change::invalid))]
    InvalidChange {
        /// Declared change type.
        change_type: String,
        /// What was wrong.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire changelog lock: {0}")]
    #[diagnostic(code(keel::lock))]
    LockFailed(String),

    /// General engine error.
    #[error("Migration error: {0}")]
    #[diagnostic(code(keel::other))]
    Other(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a lock failed error.
    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    /// Create an invalid change error.
    pub fn invalid_change(change_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidChange {
            change_type: change_type.into(),
            message: message.into(),
        }
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a recoverable error.
    ///
    /// Recoverable errors go away by re-invoking the operation later; the engine
    /// itself never retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LockFailed(_))
    }

    /// Check if this error comes from a configuration or compatibility problem
    /// rather than from the database or the changelog content.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnsupportedStatement { .. }
                | Self::VolatileStatement { .. }
                | Self::UnknownChangeType(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::ChangeSetNotFound("db/changelog.yaml::1::alice".to_string());
        assert!(err.to_string().contains("db/changelog.yaml::1::alice"));
    }

    #[test]
    fn test_checksum_drift_display() {
        let err = MigrationError::ChecksumDrift {
            changeset: "changelog.sql::create-users::bob".to_string(),
            stored: "9:abc".to_string(),
            actual: "9:xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("create-users"));
        assert!(msg.contains("9:abc"));
        assert!(msg.contains("9:xyz"));
    }

    #[test]
    fn test_unsupported_statement_names_statement_and_dialect() {
        let err = MigrationError::UnsupportedStatement {
            statement: "addNotNullConstraint".to_string(),
            dialect: "sqlite".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("addNotNullConstraint"));
        assert!(msg.contains("sqlite"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_execution_failed_keeps_source() {
        let err = MigrationError::ExecutionFailed {
            changeset: "a::1::me".to_string(),
            dialect: "postgresql".to_string(),
            source: Box::new(MigrationError::database("relation already exists")),
        };
        assert!(err.to_string().contains("relation already exists"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(MigrationError::lock_failed("held by host-a").is_recoverable());
        assert!(!MigrationError::database("connection").is_recoverable());
    }
}
