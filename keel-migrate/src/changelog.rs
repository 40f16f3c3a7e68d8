//! The declared, ordered list of changesets.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::changeset::{ChangeSet, ChangeSetId};
use crate::context::EngineContext;
use crate::error::{MigrateResult, MigrationError};

/// An ordered sequence of changesets with unique identities.
#[derive(Debug, Default)]
pub struct ChangeLog {
    path: String,
    changesets: Vec<ChangeSet>,
    index: HashMap<ChangeSetId, usize>,
    duplicates: Vec<ChangeSetId>,
}

impl ChangeLog {
    /// Create an empty changelog read from `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Path of the root changelog.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Start a changeset declared in this changelog.
    pub fn changeset(&self, id: impl Into<String>, author: impl Into<String>) -> ChangeSet {
        ChangeSet::new(id, author, self.path.clone())
    }

    /// Append a changeset, rejecting a duplicate identity.
    pub fn add(&mut self, changeset: ChangeSet) -> MigrateResult<()> {
        if self.index.contains_key(changeset.identity()) {
            return Err(MigrationError::DuplicateChangeSet(changeset.identity().to_string()));
        }
        self.index.insert(changeset.identity().clone(), self.changesets.len());
        self.changesets.push(changeset);
        Ok(())
    }

    /// Builder form of [`ChangeLog::add`].
    pub fn with(mut self, changeset: ChangeSet) -> MigrateResult<Self> {
        self.add(changeset)?;
        Ok(self)
    }

    /// Append every changeset of an included changelog.
    ///
    /// Duplicates are dropped and reported by [`ChangeLog::validate`].
    pub fn include(&mut self, other: ChangeLog) {
        self.duplicates.extend(other.duplicates);
        for changeset in other.changesets {
            let identity = changeset.identity().clone();
            if let Err(e) = self.add(changeset) {
                debug!(changeset = %identity, error = %e, "duplicate changeset in included changelog");
                self.duplicates.push(identity);
            }
        }
    }

    /// Look up a changeset by identity.
    pub fn find(&self, identity: &ChangeSetId) -> Option<&ChangeSet> {
        self.index.get(identity).map(|&i| &self.changesets[i])
    }

    /// Changesets in declared order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeSet> {
        self.changesets.iter()
    }

    pub fn len(&self) -> usize {
        self.changesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changesets.is_empty()
    }

    /// Check every change against the context's dialect and generators.
    ///
    /// Nothing touches the database; ignored changesets and changes excluded by
    /// `dbms` are skipped.
    pub fn validate(&self, ctx: &EngineContext) -> ValidationReport {
        let mut report = ValidationReport::default();

        for identity in &self.duplicates {
            report.push(
                identity.clone(),
                None,
                ProblemKind::DuplicateIdentity,
                "changeset declared more than once",
            );
        }

        for changeset in self.iter().filter(|cs| !cs.is_ignored()) {
            Self::validate_changeset(ctx, changeset, &mut report);
        }

        report
    }

    /// Validate one changeset into `report`.
    pub fn validate_changeset(ctx: &EngineContext, changeset: &ChangeSet, report: &mut ValidationReport) {
        let dialect = ctx.dialect();
        let continue_on_error = !changeset.fails_on_error(ctx.config().fail_on_error);
        let change_ctx = changeset.change_context(dialect, ctx.resources(), continue_on_error);

        for change in changeset.applicable_changes(dialect) {
            let change_type = change.change_type();
            let errors = change.validate(dialect);
            for warning in errors.warnings() {
                report.warn(changeset.identity().clone(), warning.clone());
            }
            if errors.has_errors() {
                for error in errors.errors() {
                    report.push(
                        changeset.identity().clone(),
                        Some(change_type),
                        ProblemKind::InvalidChange,
                        error.clone(),
                    );
                }
                continue;
            }

            let statements = match change.generate_statements(&change_ctx) {
                Ok(statements) => statements,
                Err(e) => {
                    report.push(
                        changeset.identity().clone(),
                        Some(change_type),
                        ProblemKind::StatementGeneration,
                        e.to_string(),
                    );
                    continue;
                }
            };

            for statement in &statements {
                let errors = ctx.generators().validate(statement, dialect);
                for error in errors.errors() {
                    let kind = if ctx.generators().supports(statement, dialect) {
                        ProblemKind::InvalidChange
                    } else {
                        ProblemKind::Unsupported
                    };
                    report.push(changeset.identity().clone(), Some(change_type), kind, error.clone());
                }
                for warning in errors.warnings() {
                    report.warn(changeset.identity().clone(), warning.clone());
                }
                for warning in ctx.generators().warn(statement, dialect) {
                    report.warn(changeset.identity().clone(), warning);
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a ChangeSet;
    type IntoIter = std::slice::Iter<'a, ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.changesets.iter()
    }
}

/// Category of a validation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// A change's fields are invalid for the dialect.
    InvalidChange,
    /// No generator handles a statement on the dialect.
    Unsupported,
    /// A change could not describe its statements.
    StatementGeneration,
    /// Two changesets share an identity.
    DuplicateIdentity,
    /// A run-once changeset was edited after it ran.
    ChecksumDrift,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidChange => "invalid change",
            Self::Unsupported => "unsupported",
            Self::StatementGeneration => "statement generation",
            Self::DuplicateIdentity => "duplicate identity",
            Self::ChecksumDrift => "checksum drift",
        })
    }
}

/// One problem found by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProblem {
    pub changeset: ChangeSetId,
    pub change_type: Option<String>,
    pub kind: ProblemKind,
    pub message: String,
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.change_type {
            Some(change_type) => write!(f, "{} [{}] {}: {}", self.changeset, change_type, self.kind, self.message),
            None => write!(f, "{} {}: {}", self.changeset, self.kind, self.message),
        }
    }
}

/// Aggregated validation outcome of a changelog.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    problems: Vec<ValidationProblem>,
    warnings: Vec<(ChangeSetId, String)>,
}

impl ValidationReport {
    /// Record a problem.
    pub fn push(
        &mut self,
        changeset: ChangeSetId,
        change_type: Option<&str>,
        kind: ProblemKind,
        message: impl Into<String>,
    ) {
        self.problems.push(ValidationProblem {
            changeset,
            change_type: change_type.map(str::to_string),
            kind,
            message: message.into(),
        });
    }

    /// Record a warning.
    pub fn warn(&mut self, changeset: ChangeSetId, message: impl Into<String>) {
        self.warnings.push((changeset, message.into()));
    }

    pub fn problems(&self) -> &[ValidationProblem] {
        &self.problems
    }

    pub fn warnings(&self) -> &[(ChangeSetId, String)] {
        &self.warnings
    }

    /// Problems of one kind.
    pub fn of_kind(&self, kind: ProblemKind) -> impl Iterator<Item = &ValidationProblem> {
        self.problems.iter().filter(move |p| p.kind == kind)
    }

    pub fn has_errors(&self) -> bool {
        !self.problems.is_empty()
    }

    /// One line per problem.
    pub fn summary(&self) -> String {
        self.problems
            .iter()
            .map(|p| format!("  - {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `Ok` when clean, otherwise [`MigrationError::ValidationFailed`].
    pub fn into_result(self) -> MigrateResult<()> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::ValidationFailed {
                count: self.problems.len(),
                summary: self.summary(),
            })
        }
    }
}
