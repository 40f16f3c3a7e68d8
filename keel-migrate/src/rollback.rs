//! Rollback planning.
//!
//! A plan is computed in full before anything is executed, so a changeset that
//! cannot be reversed stops the whole rollback up front.

use std::fmt;

use tracing::debug;

use crate::change::{Change, SqlChange};
use crate::changelog::ChangeLog;
use crate::changeset::{ChangeSet, Rollback};
use crate::context::EngineContext;
use crate::error::{MigrateResult, MigrationError};
use crate::history::ExecutionRecord;
use crate::statement::SqlStatement;

/// How far to roll back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackTarget {
    /// The `n` most recent changesets.
    Count(usize),
    /// Every changeset recorded after the row carrying the tag.
    Tag(String),
    /// Everything in history.
    All,
}

impl fmt::Display for RollbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "last {} changeset(s)", n),
            Self::Tag(tag) => write!(f, "tag '{}'", tag),
            Self::All => f.write_str("all changesets"),
        }
    }
}

/// Reversal of one applied changeset.
#[derive(Debug, Clone)]
pub struct RollbackStep {
    /// History row to remove afterwards.
    pub record: ExecutionRecord,
    /// Statements that undo the changeset, in execution order.
    pub statements: Vec<SqlStatement>,
}

/// Steps newest first.
#[derive(Debug, Clone, Default)]
pub struct RollbackPlan {
    pub steps: Vec<RollbackStep>,
}

impl RollbackPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Derives reversal statements from explicit rollbacks or computed inverses.
#[derive(Debug, Clone, Copy)]
pub struct RollbackPlanner<'a> {
    ctx: &'a EngineContext,
}

impl<'a> RollbackPlanner<'a> {
    pub fn new(ctx: &'a EngineContext) -> Self {
        Self { ctx }
    }

    /// Statements reversing one changeset.
    ///
    /// An explicit rollback is used verbatim. Otherwise every applicable change is
    /// inverted, last change first; a change without an inverse fails the plan.
    pub fn plan_changeset(&self, changeset: &ChangeSet) -> MigrateResult<Vec<SqlStatement>> {
        let dialect = self.ctx.dialect();
        let continue_on_error = !changeset.fails_on_error(self.ctx.config().fail_on_error);
        let change_ctx = changeset.change_context(dialect, self.ctx.resources(), continue_on_error);

        if let Some(rollback) = changeset.explicit_rollback() {
            return match rollback {
                Rollback::Sql(sql) => SqlChange::new(sql.clone()).generate_statements(&change_ctx),
                Rollback::Changes(changes) => {
                    let mut statements = Vec::new();
                    for change in changes {
                        statements.extend(change.generate_statements(&change_ctx)?);
                    }
                    Ok(statements)
                }
                Rollback::Empty => Ok(Vec::new()),
            };
        }

        let changes: Vec<_> = changeset.applicable_changes(dialect).collect();
        let mut statements = Vec::new();
        for change in changes.into_iter().rev() {
            let inverses = change
                .compute_inverse()
                .ok_or_else(|| MigrationError::RollbackImpossible {
                    changeset: changeset.to_string(),
                    change_type: change.change_type().to_string(),
                })?;
            for inverse in &inverses {
                statements.extend(inverse.generate_statements(&change_ctx)?);
            }
        }
        Ok(statements)
    }

    /// Plan the reversal of `target` given the applied rows.
    pub fn plan(
        &self,
        changelog: &ChangeLog,
        records: &[ExecutionRecord],
        target: &RollbackTarget,
    ) -> MigrateResult<RollbackPlan> {
        let mut newest_first: Vec<&ExecutionRecord> = records.iter().collect();
        newest_first.sort_by(|a, b| b.sequence.cmp(&a.sequence));

        let selected: Vec<&ExecutionRecord> = match target {
            RollbackTarget::Count(n) => newest_first.into_iter().take(*n).collect(),
            RollbackTarget::All => newest_first,
            RollbackTarget::Tag(tag) => {
                let tagged = newest_first
                    .iter()
                    .find(|r| r.tag.as_deref() == Some(tag.as_str()))
                    .map(|r| r.sequence)
                    .ok_or_else(|| MigrationError::TagNotFound(tag.clone()))?;
                newest_first.into_iter().take_while(|r| r.sequence > tagged).collect()
            }
        };

        let mut plan = RollbackPlan::default();
        for record in selected {
            let changeset = changelog
                .find(&record.identity)
                .ok_or_else(|| MigrationError::ChangeSetNotFound(record.identity.to_string()))?;
            let statements = self.plan_changeset(changeset)?;
            debug!(
                changeset = %record.identity,
                statements = statements.len(),
                "planned rollback"
            );
            plan.steps.push(RollbackStep {
                record: record.clone(),
                statements,
            });
        }
        Ok(plan)
    }
}
