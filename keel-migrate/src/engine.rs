//! Reconciliation engine.
//!
//! Walks a changelog in declared order, decides per changeset whether it runs,
//! renders its statements through the generator registry and records the
//! outcome in the history store.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::change::{AppliedState, ChangeContext, ChangeStatus};
use crate::changelog::{ChangeLog, ProblemKind, ValidationReport};
use crate::changeset::{ChangeSet, ChangeSetId};
use crate::checksum::{Checksum, ChecksumVersion};
use crate::context::EngineContext;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ExecutionUnit, SqlScriptExecutor, StatementExecutor};
use crate::filter::{AcceptAll, ChangeSetFilter, FilterChain, FilterVerdict};
use crate::history::{ExecType, ExecutionHistoryStore, ExecutionRecord, new_deployment_id};
use crate::inspect::SchemaInspector;
use crate::rollback::{RollbackPlanner, RollbackTarget};
use crate::statement::{Sql, SqlStatement};

/// What happened to one changeset during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetOutcome {
    /// Rejected by a filter; history untouched.
    SkippedFiltered(String),
    /// Run-once changeset already recorded with a matching checksum.
    SkippedAlreadyRun,
    /// Run-on-change changeset whose checksum has not changed.
    SkippedUnchanged,
    /// Executed for the first time.
    Executed,
    /// Executed again over an existing history row.
    Reran,
    /// Recorded without executing.
    MarkedRan,
    /// Failed with `failOnError` off; no history row was written.
    FailedTolerated(String),
}

impl ChangeSetOutcome {
    /// Whether a history row was written for it.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Executed | Self::Reran | Self::MarkedRan)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::SkippedFiltered(_) | Self::SkippedAlreadyRun | Self::SkippedUnchanged
        )
    }
}

/// One evaluated changeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedChangeSet {
    pub identity: ChangeSetId,
    pub outcome: ChangeSetOutcome,
    /// Time spent on the changeset in milliseconds.
    pub duration_ms: i64,
}

/// Result of an update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Id shared by every history row written by the run.
    pub deployment_id: String,
    /// Evaluated changesets in changelog order.
    pub changesets: Vec<EvaluatedChangeSet>,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
    /// Warnings raised by validation or tolerated drift.
    pub warnings: Vec<String>,
}

impl UpdateReport {
    /// Outcome for a changeset, if it was evaluated.
    pub fn outcome(&self, identity: &ChangeSetId) -> Option<&ChangeSetOutcome> {
        self.changesets
            .iter()
            .find(|c| &c.identity == identity)
            .map(|c| &c.outcome)
    }

    /// Outcomes in changelog order.
    pub fn outcomes(&self) -> Vec<&ChangeSetOutcome> {
        self.changesets.iter().map(|c| &c.outcome).collect()
    }

    pub fn applied_count(&self) -> usize {
        self.changesets.iter().filter(|c| c.outcome.is_applied()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.changesets.iter().filter(|c| c.outcome.is_skipped()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.changesets
            .iter()
            .filter(|c| matches!(c.outcome, ChangeSetOutcome::FailedTolerated(_)))
            .count()
    }

    /// Whether anything was written to history.
    pub fn has_changes(&self) -> bool {
        self.applied_count() > 0
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.applied_count() > 0 {
            parts.push(format!("{} applied", self.applied_count()));
        }

        if self.skipped_count() > 0 {
            parts.push(format!("{} skipped", self.skipped_count()));
        }

        if self.failed_count() > 0 {
            parts.push(format!("{} failed", self.failed_count()));
        }

        if parts.is_empty() {
            "No changesets evaluated".to_string()
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }
}

/// Why a changeset shows up in [`ReconciliationEngine::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingReason {
    /// Never recorded.
    NotRun,
    /// Runs on every update.
    RunAlways,
    /// Run-on-change changeset edited since it ran.
    Changed,
    /// Run-once changeset edited since it ran.
    Drifted { stored: Checksum, actual: Checksum },
}

/// A changeset the next update would act on, or refuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeSet {
    pub identity: ChangeSetId,
    pub reason: PendingReason,
}

/// What the live schema says about one changeset's changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetStatus {
    pub identity: ChangeSetId,
    /// Whether the history store holds an applied row for it.
    pub recorded: bool,
    /// One entry per applicable change, in declared order.
    pub changes: Vec<ChangeStatus>,
}

impl ChangeSetStatus {
    /// Applied or not applied when every change agrees, otherwise indeterminate.
    pub fn state(&self) -> AppliedState {
        let Some(first) = self.changes.first() else {
            return AppliedState::Indeterminate;
        };
        if self.changes.iter().all(|c| c.state == first.state) {
            first.state
        } else {
            AppliedState::Indeterminate
        }
    }

    /// Recorded in history while the schema says otherwise.
    pub fn is_inconsistent(&self) -> bool {
        matches!(
            (self.recorded, self.state()),
            (true, AppliedState::NotApplied) | (false, AppliedState::Applied)
        )
    }
}

/// Result of a rollback run.
#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    /// Rolled back changesets, newest first.
    pub rolled_back: Vec<ChangeSetId>,
    pub duration_ms: i64,
}

impl RollbackReport {
    pub fn summary(&self) -> String {
        if self.rolled_back.is_empty() {
            "Nothing to roll back".to_string()
        } else {
            format!("{} rolled back in {}ms", self.rolled_back.len(), self.duration_ms)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Limit<'a> {
    Unbounded,
    Count(usize),
    Tag(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Execute,
    MarkRan,
}

#[derive(Debug)]
enum Decision {
    Filtered(String),
    Skip {
        record: ExecutionRecord,
        outcome: ChangeSetOutcome,
        rewrite: Option<Checksum>,
    },
    Run {
        rerun: bool,
        reason: PendingReason,
    },
    Drift {
        stored: Checksum,
        actual: Checksum,
    },
}

/// Reconciles a changelog against the execution history of one database.
///
/// The engine owns the only write path into the history store and takes the
/// store's lock for every run that may write.
pub struct ReconciliationEngine<H: ExecutionHistoryStore, X: StatementExecutor> {
    ctx: EngineContext,
    history: H,
    executor: X,
}

impl<H, X> ReconciliationEngine<H, X>
where
    H: ExecutionHistoryStore,
    X: StatementExecutor,
{
    /// Create a new engine.
    pub fn new(ctx: EngineContext, history: H, executor: X) -> Self {
        Self { ctx, history, executor }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Apply every eligible changeset.
    pub async fn update(&self, changelog: &ChangeLog, filter: &dyn ChangeSetFilter) -> MigrateResult<UpdateReport> {
        self.run(changelog, filter, Limit::Unbounded, Mode::Execute, &self.executor)
            .await
    }

    /// Apply at most `count` eligible changesets.
    pub async fn update_count(
        &self,
        changelog: &ChangeLog,
        filter: &dyn ChangeSetFilter,
        count: usize,
    ) -> MigrateResult<UpdateReport> {
        self.run(changelog, filter, Limit::Count(count), Mode::Execute, &self.executor)
            .await
    }

    /// Apply changesets up to and including the one that declares `tag`.
    pub async fn update_to_tag(
        &self,
        changelog: &ChangeLog,
        filter: &dyn ChangeSetFilter,
        tag: &str,
    ) -> MigrateResult<UpdateReport> {
        if !changelog.iter().any(|cs| cs.tag() == Some(tag)) {
            return Err(MigrationError::TagNotFound(tag.to_string()));
        }
        self.run(changelog, filter, Limit::Tag(tag), Mode::Execute, &self.executor)
            .await
    }

    /// Render the SQL an update would run, without executing or recording it.
    pub async fn update_sql(&self, changelog: &ChangeLog, filter: &dyn ChangeSetFilter) -> MigrateResult<String> {
        let script = SqlScriptExecutor::new();
        script.comment(&format!("Update script for {} on {}", changelog.path(), self.ctx.dialect()));
        self.run(changelog, filter, Limit::Unbounded, Mode::Execute, &script)
            .await?;
        Ok(script.take_script())
    }

    /// Record every eligible changeset as run without executing it.
    pub async fn changelog_sync(&self, changelog: &ChangeLog, filter: &dyn ChangeSetFilter) -> MigrateResult<UpdateReport> {
        self.run(changelog, filter, Limit::Unbounded, Mode::MarkRan, &self.executor)
            .await
    }

    /// Changesets the next update would run, plus drifted ones.
    pub async fn status(&self, changelog: &ChangeLog, filter: &dyn ChangeSetFilter) -> MigrateResult<Vec<PendingChangeSet>> {
        self.history.initialize().await?;
        let records = self.applied_records().await?;
        let builtin = FilterChain::standard(self.ctx.dialect());

        let mut pending = Vec::new();
        for changeset in changelog {
            let reason = match self.decide(changeset, &builtin, filter, &records)? {
                Decision::Run { reason, .. } => reason,
                Decision::Drift { stored, actual } => PendingReason::Drifted { stored, actual },
                Decision::Filtered(_) | Decision::Skip { .. } => continue,
            };
            pending.push(PendingChangeSet {
                identity: changeset.identity().clone(),
                reason,
            });
        }
        Ok(pending)
    }

    /// Ask every change whether the live schema already reflects it.
    ///
    /// Read-only: nothing is executed and history is not written. Changes that
    /// cannot tell report `Indeterminate`.
    pub async fn check_status(
        &self,
        changelog: &ChangeLog,
        inspector: &dyn SchemaInspector,
    ) -> MigrateResult<Vec<ChangeSetStatus>> {
        self.history.initialize().await?;
        let records = self.applied_records().await?;
        let dialect = self.ctx.dialect();

        let mut statuses = Vec::new();
        for changeset in changelog {
            if changeset.is_ignored() {
                continue;
            }
            let mut changes = Vec::new();
            for change in changeset.applicable_changes(dialect) {
                changes.push(change.check_status(dialect, inspector).await?);
            }
            let status = ChangeSetStatus {
                identity: changeset.identity().clone(),
                recorded: records.contains_key(changeset.identity()),
                changes,
            };
            if status.is_inconsistent() {
                warn!(changeset = %changeset, state = ?status.state(), "history and schema disagree");
            }
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Static validation of the changelog plus drift against history.
    pub async fn validate(&self, changelog: &ChangeLog) -> MigrateResult<ValidationReport> {
        let mut report = changelog.validate(&self.ctx);

        self.history.initialize().await?;
        let records = self.applied_records().await?;
        let builtin = FilterChain::standard(self.ctx.dialect());
        for changeset in changelog {
            match self.decide(changeset, &builtin, &AcceptAll, &records) {
                Ok(Decision::Drift { stored, actual }) => report.push(
                    changeset.identity().clone(),
                    None,
                    ProblemKind::ChecksumDrift,
                    format!("stored {}, now {}", stored, actual),
                ),
                Ok(_) => {}
                // Already reported by the static pass.
                Err(e) => debug!(changeset = %changeset, error = %e, "checksum unavailable"),
            }
        }
        Ok(report)
    }

    /// Tag the most recently applied changeset.
    pub async fn tag(&self, tag: &str) -> MigrateResult<()> {
        self.history.initialize().await?;
        let _lock = self.history.acquire_lock().await?;
        if !self.history.tag_last(tag).await? {
            return Err(MigrationError::other(format!(
                "cannot tag '{}': no changesets have been applied",
                tag
            )));
        }
        info!(tag, "tagged database");
        Ok(())
    }

    /// Whether any history row carries `tag`.
    pub async fn tag_exists(&self, tag: &str) -> MigrateResult<bool> {
        self.history.initialize().await?;
        self.history.tag_exists(tag).await
    }

    /// Null every stored checksum; the next update rewrites them.
    pub async fn clear_checksums(&self) -> MigrateResult<()> {
        self.history.initialize().await?;
        let _lock = self.history.acquire_lock().await?;
        self.history.clear_checksums().await?;
        info!("cleared stored checksums");
        Ok(())
    }

    /// Overwrite stored checksums with the current ones for every recorded
    /// changeset still in the changelog. Returns the rows that changed.
    pub async fn repair_checksums(&self, changelog: &ChangeLog) -> MigrateResult<Vec<ChangeSetId>> {
        self.history.initialize().await?;
        let _lock = self.history.acquire_lock().await?;
        let version = self.ctx.config().checksum_version;

        let mut repaired = Vec::new();
        for mut record in self.history.list().await? {
            let Some(changeset) = changelog.find(&record.identity) else {
                continue;
            };
            let current = self.checksum(changeset, version)?;
            if record.checksum.as_ref() == Some(&current) {
                continue;
            }
            let identity = record.identity.clone();
            record.checksum = Some(current);
            self.history.upsert(record).await?;
            debug!(changeset = %identity, "repaired checksum");
            repaired.push(identity);
        }

        info!(repaired = repaired.len(), "checksum repair finished");
        Ok(repaired)
    }

    /// Undo applied changesets down to `target`.
    pub async fn rollback(&self, changelog: &ChangeLog, target: &RollbackTarget) -> MigrateResult<RollbackReport> {
        self.run_rollback(changelog, target, &self.executor).await
    }

    /// Render the SQL a rollback would run, without executing or recording it.
    pub async fn rollback_sql(&self, changelog: &ChangeLog, target: &RollbackTarget) -> MigrateResult<String> {
        let script = SqlScriptExecutor::new();
        script.comment(&format!("Rollback {} on {}", target, self.ctx.dialect()));
        self.run_rollback(changelog, target, &script).await?;
        Ok(script.take_script())
    }

    async fn run(
        &self,
        changelog: &ChangeLog,
        filter: &dyn ChangeSetFilter,
        limit: Limit<'_>,
        mode: Mode,
        executor: &dyn StatementExecutor,
    ) -> MigrateResult<UpdateReport> {
        let start = Instant::now();
        let config = self.ctx.config();
        let offline = executor.is_offline();

        self.history.initialize().await?;
        let _lock = self.history.acquire_lock().await?;

        let deployment_id = new_deployment_id();
        info!(
            changelog = changelog.path(),
            dialect = %self.ctx.dialect(),
            deployment_id = %deployment_id,
            offline,
            "starting update"
        );

        let mut report = UpdateReport {
            deployment_id: deployment_id.clone(),
            ..Default::default()
        };

        // Decide everything first; drift or invalid changes stop the run
        // before any statement executes.
        let records = self.applied_records().await?;
        let builtin = FilterChain::standard(self.ctx.dialect());
        let mut problems = ValidationReport::default();
        let mut decisions = Vec::with_capacity(changelog.len());
        for changeset in changelog {
            let decision = self.decide(changeset, &builtin, filter, &records)?;
            match &decision {
                Decision::Run { .. } => ChangeLog::validate_changeset(&self.ctx, changeset, &mut problems),
                Decision::Drift { stored, actual } => {
                    if config.fail_on_drift {
                        return Err(MigrationError::ChecksumDrift {
                            changeset: changeset.to_string(),
                            stored: stored.to_string(),
                            actual: actual.to_string(),
                        });
                    }
                    warn!(changeset = %changeset, %stored, %actual, "checksum drift ignored");
                    report
                        .warnings
                        .push(format!("{}: checksum drift ignored (stored {}, now {})", changeset, stored, actual));
                }
                Decision::Filtered(_) | Decision::Skip { .. } => {}
            }
            decisions.push((changeset, decision));
        }
        for (identity, warning) in problems.warnings() {
            report.warnings.push(format!("{}: {}", identity, warning));
        }
        problems.into_result()?;

        let mut applied = 0usize;
        for (changeset, decision) in decisions {
            if let Limit::Count(count) = limit {
                if applied >= count {
                    break;
                }
            }

            let started = Instant::now();
            let outcome = match decision {
                Decision::Filtered(reason) => {
                    debug!(changeset = %changeset, %reason, "changeset filtered");
                    ChangeSetOutcome::SkippedFiltered(reason)
                }
                Decision::Skip { record, outcome, rewrite } => {
                    if let Some(checksum) = rewrite {
                        if !offline {
                            self.rewrite_checksum(record, checksum).await?;
                        }
                    }
                    outcome
                }
                Decision::Drift { .. } => ChangeSetOutcome::SkippedAlreadyRun,
                Decision::Run { .. } if mode == Mode::MarkRan => {
                    if !offline {
                        self.record(changeset, ExecType::MarkRan, &deployment_id).await?;
                    }
                    ChangeSetOutcome::MarkedRan
                }
                Decision::Run { rerun, .. } => match self.execute_changeset(changeset, executor, offline).await {
                    Ok(()) => {
                        let (exec_type, outcome) = if rerun {
                            (ExecType::Reran, ChangeSetOutcome::Reran)
                        } else {
                            (ExecType::Executed, ChangeSetOutcome::Executed)
                        };
                        if !offline {
                            self.record(changeset, exec_type, &deployment_id).await?;
                        }
                        info!(changeset = %changeset, exec_type = %exec_type, "changeset applied");
                        outcome
                    }
                    Err(e @ MigrationError::VolatileStatement { .. }) => return Err(e),
                    Err(e) if !changeset.fails_on_error(config.fail_on_error) => {
                        warn!(changeset = %changeset, error = %e, "changeset failed, continuing");
                        ChangeSetOutcome::FailedTolerated(e.to_string())
                    }
                    Err(e) => {
                        return Err(MigrationError::ExecutionFailed {
                            changeset: changeset.to_string(),
                            dialect: self.ctx.dialect().to_string(),
                            source: Box::new(e),
                        });
                    }
                },
            };

            if outcome.is_applied() {
                applied += 1;
            }
            report.changesets.push(EvaluatedChangeSet {
                identity: changeset.identity().clone(),
                outcome,
                duration_ms: started.elapsed().as_millis() as i64,
            });

            if let Limit::Tag(tag) = limit {
                if changeset.tag() == Some(tag) {
                    break;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as i64;
        info!(summary = %report.summary(), "update finished");
        Ok(report)
    }

    async fn run_rollback(
        &self,
        changelog: &ChangeLog,
        target: &RollbackTarget,
        executor: &dyn StatementExecutor,
    ) -> MigrateResult<RollbackReport> {
        let start = Instant::now();
        let offline = executor.is_offline();

        self.history.initialize().await?;
        let _lock = self.history.acquire_lock().await?;

        let records: Vec<ExecutionRecord> = self
            .history
            .list()
            .await?
            .into_iter()
            .filter(|r| r.exec_type.is_applied())
            .collect();
        let plan = RollbackPlanner::new(&self.ctx).plan(changelog, &records, target)?;

        // Render every step before executing any of them.
        let mut units = Vec::with_capacity(plan.len());
        for step in &plan.steps {
            let sql = self.render_statements(&step.statements, offline)?;
            let run_in_transaction = changelog
                .find(&step.record.identity)
                .is_none_or(|cs| cs.is_run_in_transaction());
            units.push(
                ExecutionUnit::new(step.record.identity.clone(), sql)
                    .with_description(format!("Rollback {}", step.record.description))
                    .with_transaction(run_in_transaction),
            );
        }

        info!(rollback_target = %target, changesets = units.len(), offline, "starting rollback");

        let mut report = RollbackReport::default();
        for unit in units {
            executor
                .execute(&unit)
                .await
                .map_err(|e| MigrationError::ExecutionFailed {
                    changeset: unit.changeset.to_string(),
                    dialect: self.ctx.dialect().to_string(),
                    source: Box::new(e),
                })?;
            if !offline {
                self.history.delete(&unit.changeset).await?;
            }
            info!(changeset = %unit.changeset, "changeset rolled back");
            report.rolled_back.push(unit.changeset);
        }

        report.duration_ms = start.elapsed().as_millis() as i64;
        Ok(report)
    }

    fn decide(
        &self,
        changeset: &ChangeSet,
        builtin: &FilterChain,
        filter: &dyn ChangeSetFilter,
        records: &HashMap<ChangeSetId, ExecutionRecord>,
    ) -> MigrateResult<Decision> {
        let verdict = match builtin.evaluate(changeset) {
            FilterVerdict::Accept => filter.evaluate(changeset),
            rejected => rejected,
        };
        if let FilterVerdict::Reject(reason) = verdict {
            return Ok(Decision::Filtered(reason));
        }

        let Some(record) = records.get(changeset.identity()) else {
            return Ok(Decision::Run {
                rerun: false,
                reason: PendingReason::NotRun,
            });
        };
        if changeset.is_run_always() {
            return Ok(Decision::Run {
                rerun: true,
                reason: PendingReason::RunAlways,
            });
        }

        let skipped = if changeset.is_run_on_change() {
            ChangeSetOutcome::SkippedUnchanged
        } else {
            ChangeSetOutcome::SkippedAlreadyRun
        };
        let config = self.ctx.config();
        let current = self.checksum(changeset, config.checksum_version)?;

        let Some(stored) = &record.checksum else {
            return Ok(Decision::Skip {
                record: record.clone(),
                outcome: skipped,
                rewrite: Some(current),
            });
        };

        // Compare under the stored algorithm version; a version change alone
        // is never drift.
        let actual = if stored.version() == current.version() {
            current.clone()
        } else {
            self.checksum(changeset, stored.version())?
        };

        if changeset.is_checksum_valid(stored, &actual) {
            let upgrade = stored == &actual && current.version() > stored.version() && config.upgrade_checksums;
            if upgrade {
                debug!(changeset = %changeset, from = %stored.version(), to = %current.version(), "upgrading checksum");
            }
            return Ok(Decision::Skip {
                record: record.clone(),
                outcome: skipped,
                rewrite: upgrade.then_some(current),
            });
        }

        if changeset.is_run_on_change() {
            return Ok(Decision::Run {
                rerun: true,
                reason: PendingReason::Changed,
            });
        }

        Ok(Decision::Drift {
            stored: stored.clone(),
            actual,
        })
    }

    async fn applied_records(&self) -> MigrateResult<HashMap<ChangeSetId, ExecutionRecord>> {
        Ok(self
            .history
            .list()
            .await?
            .into_iter()
            .filter(|r| r.exec_type.is_applied())
            .map(|r| (r.identity.clone(), r))
            .collect())
    }

    fn change_context<'a>(&'a self, changeset: &'a ChangeSet) -> ChangeContext<'a> {
        let continue_on_error = !changeset.fails_on_error(self.ctx.config().fail_on_error);
        changeset.change_context(self.ctx.dialect(), self.ctx.resources(), continue_on_error)
    }

    fn checksum(&self, changeset: &ChangeSet, version: ChecksumVersion) -> MigrateResult<Checksum> {
        changeset.checksum(&self.change_context(changeset), version)
    }

    async fn execute_changeset(
        &self,
        changeset: &ChangeSet,
        executor: &dyn StatementExecutor,
        offline: bool,
    ) -> MigrateResult<()> {
        let change_ctx = self.change_context(changeset);
        let mut sql = Vec::new();
        for change in changeset.applicable_changes(self.ctx.dialect()) {
            let statements = change.generate_statements(&change_ctx)?;
            sql.extend(self.render_statements(&statements, offline)?);
        }

        let unit = ExecutionUnit::new(changeset.identity().clone(), sql)
            .with_description(changeset.description())
            .with_transaction(changeset.is_run_in_transaction());
        debug!(changeset = %changeset, statements = unit.sql.len(), "executing changeset");
        executor.execute(&unit).await
    }

    fn render_statements(&self, statements: &[SqlStatement], offline: bool) -> MigrateResult<Vec<Sql>> {
        let dialect = self.ctx.dialect();
        let generators = self.ctx.generators();
        let mut sql = Vec::new();
        for statement in statements {
            if offline && generators.is_volatile(statement, dialect) {
                return Err(MigrationError::VolatileStatement {
                    statement: statement.kind().name().to_string(),
                    dialect: dialect.to_string(),
                });
            }
            sql.extend(generators.generate(statement, dialect)?);
        }
        Ok(sql)
    }

    async fn record(&self, changeset: &ChangeSet, exec_type: ExecType, deployment_id: &str) -> MigrateResult<()> {
        let checksum = self.checksum(changeset, self.ctx.config().checksum_version)?;
        let sequence = self.history.next_sequence().await?;

        let mut record = ExecutionRecord::new(changeset.identity().clone(), checksum, sequence, exec_type);
        record.description = changeset.description();
        record.comments = changeset.comments_text().map(str::to_string);
        // A rerun keeps a tag applied earlier unless the changeset sets its own.
        record.tag = match changeset.tag() {
            Some(tag) => Some(tag.to_string()),
            None => self
                .history
                .find(changeset.identity())
                .await?
                .and_then(|previous| previous.tag),
        };
        record.deployment_id = deployment_id.to_string();
        self.history.upsert(record).await
    }

    async fn rewrite_checksum(&self, mut record: ExecutionRecord, checksum: Checksum) -> MigrateResult<()> {
        debug!(changeset = %record.identity, %checksum, "rewriting stored checksum");
        record.checksum = Some(checksum);
        self.history.upsert(record).await
    }
}
