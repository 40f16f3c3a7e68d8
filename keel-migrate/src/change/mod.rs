//! The change contract.
//!
//! A [`Change`] is one declarative schema or data operation. The engine never looks
//! inside a change; it only asks it to validate itself, describe the statements it
//! stands for, fingerprint itself, report whether it looks applied, and optionally
//! compute its own inverse.
//!
//! Changes are created by name through a [`ChangeRegistry`] from a JSON parameter map,
//! which keeps the engine independent from any changelog file format.

mod registry;
mod sql;
mod structural;
mod tag;

use std::fmt;

use crate::checksum::{Checksum, ChecksumVersion};
use crate::dialect::Dialect;
use crate::error::MigrateResult;
use crate::inspect::SchemaInspector;
use crate::resource::ResourceAccessor;
use crate::statement::SqlStatement;
use crate::validation::ValidationErrors;

pub use registry::{ChangeFactory, ChangeRegistry, from_params};
pub use sql::{SqlChange, SqlFileChange};
pub use structural::{
    AddColumnChange, AddNotNullConstraintChange, ColumnConfig, CreateIndexChange,
    CreateTableChange, DropColumnChange, DropIndexChange, DropTableChange, RenameColumnChange,
    RenameTableChange,
};
pub use tag::TagDatabaseChange;

/// Namespace of the built-in changes.
pub const DEFAULT_NAMESPACE: &str = "keel";

/// Whether a field influences generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSignificance {
    /// Changes the SQL; always part of the checksum.
    Sql,
    /// Descriptive only (remarks, encoding hints); left out by the current
    /// checksum version.
    Metadata,
}

/// One serialized field of a change, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumField {
    /// Field name.
    pub name: &'static str,
    /// Serialized value.
    pub value: String,
    /// Whether it affects SQL.
    pub significance: FieldSignificance,
}

impl ChecksumField {
    /// A field that affects SQL.
    pub fn sql(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
            significance: FieldSignificance::Sql,
        }
    }

    /// A descriptive field.
    pub fn metadata(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
            significance: FieldSignificance::Metadata,
        }
    }
}

/// Checksum of a change type plus its serialized fields.
///
/// Version 9 skips [`FieldSignificance::Metadata`] fields; version 8 hashes everything.
pub fn checksum_of_fields(change_type: &str, fields: &[ChecksumField], version: ChecksumVersion) -> Checksum {
    let mut serialized = format!("{}\n", change_type);
    for field in fields {
        if version >= ChecksumVersion::V9 && field.significance == FieldSignificance::Metadata {
            continue;
        }
        serialized.push_str(field.name);
        serialized.push('=');
        serialized.push_str(&field.value);
        serialized.push('\n');
    }
    Checksum::compute(&serialized, version)
}

/// Whether a change currently appears to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedState {
    Applied,
    NotApplied,
    Indeterminate,
}

/// Result of [`Change::check_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeStatus {
    /// Overall state.
    pub state: AppliedState,
    /// Supporting detail.
    pub messages: Vec<String>,
}

impl ChangeStatus {
    /// The change is applied.
    pub fn applied() -> Self {
        Self {
            state: AppliedState::Applied,
            messages: Vec::new(),
        }
    }

    /// The change is not applied.
    pub fn not_applied(message: impl Into<String>) -> Self {
        Self {
            state: AppliedState::NotApplied,
            messages: vec![message.into()],
        }
    }

    /// The state cannot be determined.
    pub fn indeterminate(message: impl Into<String>) -> Self {
        Self {
            state: AppliedState::Indeterminate,
            messages: vec![message.into()],
        }
    }

    /// Applied when `condition` holds, otherwise not applied with `message`.
    pub fn applied_if(condition: bool, message: impl Into<String>) -> Self {
        if condition {
            Self::applied()
        } else {
            Self::not_applied(message)
        }
    }
}

/// Everything a change may consult while generating statements or checksums.
#[derive(Debug, Clone, Copy)]
pub struct ChangeContext<'a> {
    /// Target dialect.
    pub dialect: &'a Dialect,
    /// Accessor for referenced files.
    pub resources: &'a dyn ResourceAccessor,
    /// Path of the changelog declaring the change.
    pub changelog_path: Option<&'a str>,
    /// Missing external content degrades to no statements instead of failing.
    pub continue_on_error: bool,
}

impl<'a> ChangeContext<'a> {
    /// Create a context that fails on missing content.
    pub fn new(dialect: &'a Dialect, resources: &'a dyn ResourceAccessor) -> Self {
        Self {
            dialect,
            resources,
            changelog_path: None,
            continue_on_error: false,
        }
    }

    /// Set the declaring changelog path.
    pub fn with_changelog_path(mut self, path: &'a str) -> Self {
        self.changelog_path = Some(path);
        self
    }

    /// Set the continue-on-error policy.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// A single schema or data operation.
///
/// `generate_statements` must be a pure function of the change's fields and the
/// context: the engine may call it more than once and expects the same output.
#[async_trait::async_trait]
pub trait Change: Send + Sync + fmt::Debug {
    /// Declared type name, e.g. `addColumn`.
    fn change_type(&self) -> &'static str;

    /// Namespace tag.
    fn namespace(&self) -> &str {
        DEFAULT_NAMESPACE
    }

    /// `dbms` filter attached to the change itself.
    fn dbms(&self) -> Vec<String> {
        Vec::new()
    }

    /// Serialized fields used by the default checksum.
    fn checksum_fields(&self) -> Vec<ChecksumField> {
        Vec::new()
    }

    /// Fingerprint of the change under `version`.
    fn checksum(&self, _ctx: &ChangeContext<'_>, version: ChecksumVersion) -> MigrateResult<Checksum> {
        Ok(checksum_of_fields(self.change_type(), &self.checksum_fields(), version))
    }

    /// Structural self-check against a dialect.
    fn validate(&self, dialect: &Dialect) -> ValidationErrors;

    /// Describe the change as abstract statements.
    fn generate_statements(&self, ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>>;

    /// Inspect the database to see whether the change looks applied.
    async fn check_status(&self, _dialect: &Dialect, _inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        Ok(ChangeStatus::indeterminate(format!(
            "{} does not support status checks",
            self.change_type()
        )))
    }

    /// Changes that undo this one, in execution order. `None` when impossible.
    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        None
    }

    /// Human-readable outcome for logs.
    fn confirmation_message(&self) -> String;

    /// Short description recorded in history.
    fn short_description(&self) -> String {
        self.change_type().to_string()
    }

    /// Tag this change applies to the history row, if any.
    fn tag(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_fields_only_in_legacy_checksum() {
        let base = vec![ChecksumField::sql("tableName", "users")];
        let mut with_remarks = base.clone();
        with_remarks.push(ChecksumField::metadata("remarks", "people"));

        assert_eq!(
            checksum_of_fields("createTable", &base, ChecksumVersion::V9),
            checksum_of_fields("createTable", &with_remarks, ChecksumVersion::V9)
        );
        assert_ne!(
            checksum_of_fields("createTable", &base, ChecksumVersion::V8),
            checksum_of_fields("createTable", &with_remarks, ChecksumVersion::V8)
        );
    }

    #[test]
    fn test_change_type_is_part_of_checksum() {
        let fields = vec![ChecksumField::sql("tableName", "users")];
        assert_ne!(
            checksum_of_fields("createTable", &fields, ChecksumVersion::V9),
            checksum_of_fields("dropTable", &fields, ChecksumVersion::V9)
        );
    }

    #[test]
    fn test_status_constructors() {
        assert_eq!(ChangeStatus::applied_if(true, "x").state, AppliedState::Applied);
        let status = ChangeStatus::applied_if(false, "table t missing");
        assert_eq!(status.state, AppliedState::NotApplied);
        assert_eq!(status.messages, vec!["table t missing".to_string()]);
    }
}
