//! Changesets: identified, ordered groups of changes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::change::{Change, ChangeContext};
use crate::checksum::{Checksum, ChecksumVersion};
use crate::dialect::{DatabaseKind, Dialect};
use crate::error::{MigrateResult, MigrationError};
use crate::resource::ResourceAccessor;

/// Identity of a changeset: unique within a changelog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeSetId {
    /// Changelog source path.
    pub path: String,
    /// Author-chosen id.
    pub id: String,
    /// Author.
    pub author: String,
}

impl ChangeSetId {
    /// Create an identity.
    pub fn new(path: impl Into<String>, id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            author: author.into(),
        }
    }
}

impl fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.path, self.id, self.author)
    }
}

/// A checksum accepted in place of the recomputed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidChecksum {
    /// Accept any stored checksum.
    Any,
    /// Accept this exact stored checksum.
    Exact(Checksum),
}

impl ValidChecksum {
    /// Whether a stored checksum is accepted.
    pub fn accepts(&self, stored: &Checksum) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(checksum) => checksum == stored,
        }
    }
}

impl FromStr for ValidChecksum {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("any") {
            Ok(Self::Any)
        } else {
            Checksum::parse(s.trim()).map(Self::Exact)
        }
    }
}

/// Author-supplied rollback.
#[derive(Debug)]
pub enum Rollback {
    /// Literal SQL, split on the dialect delimiter.
    Sql(String),
    /// Alternate changes, run in the given order.
    Changes(Vec<Box<dyn Change>>),
    /// Rolling back does nothing besides removing the history row.
    Empty,
}

/// An ordered group of changes with identity and execution policy.
///
/// Checksums are computed lazily and cached per version and database kind.
#[derive(Debug)]
pub struct ChangeSet {
    identity: ChangeSetId,
    changes: Vec<Box<dyn Change>>,
    run_always: bool,
    run_on_change: bool,
    fail_on_error: Option<bool>,
    run_in_transaction: bool,
    ignore: bool,
    comments: Option<String>,
    dbms: Vec<String>,
    created: Option<String>,
    valid_checksums: Vec<ValidChecksum>,
    rollback: Option<Rollback>,
    checksum_cache: Mutex<HashMap<(ChecksumVersion, DatabaseKind), Checksum>>,
}

impl ChangeSet {
    /// Create an empty run-once changeset.
    pub fn new(id: impl Into<String>, author: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            identity: ChangeSetId::new(path, id, author),
            changes: Vec::new(),
            run_always: false,
            run_on_change: false,
            fail_on_error: None,
            run_in_transaction: true,
            ignore: false,
            comments: None,
            dbms: Vec::new(),
            created: None,
            valid_checksums: Vec::new(),
            rollback: None,
            checksum_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Append a change.
    pub fn change(mut self, change: impl Change + 'static) -> Self {
        self.changes.push(Box::new(change));
        self
    }

    /// Append a boxed change.
    pub fn boxed_change(mut self, change: Box<dyn Change>) -> Self {
        self.changes.push(change);
        self
    }

    /// Execute on every update regardless of history.
    pub fn run_always(mut self) -> Self {
        self.run_always = true;
        self
    }

    /// Re-execute when the checksum changes instead of reporting drift.
    pub fn run_on_change(mut self) -> Self {
        self.run_on_change = true;
        self
    }

    /// Override the engine default for failure propagation.
    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = Some(fail);
        self
    }

    /// Whether statements share one transaction.
    pub fn run_in_transaction(mut self, run_in_transaction: bool) -> Self {
        self.run_in_transaction = run_in_transaction;
        self
    }

    /// Never execute this changeset.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Set comments recorded in history.
    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Restrict to the given `dbms` names.
    pub fn dbms(mut self, dbms: impl Into<String>) -> Self {
        self.dbms.push(dbms.into());
        self
    }

    /// Set the creation marker.
    pub fn created(mut self, created: impl Into<String>) -> Self {
        self.created = Some(created.into());
        self
    }

    /// Accept an additional stored checksum.
    pub fn valid_checksum(mut self, checksum: ValidChecksum) -> Self {
        self.valid_checksums.push(checksum);
        self
    }

    /// Declare an explicit rollback.
    pub fn rollback(mut self, rollback: Rollback) -> Self {
        self.rollback = Some(rollback);
        self
    }

    pub fn identity(&self) -> &ChangeSetId {
        &self.identity
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn author(&self) -> &str {
        &self.identity.author
    }

    pub fn path(&self) -> &str {
        &self.identity.path
    }

    pub fn changes(&self) -> &[Box<dyn Change>] {
        &self.changes
    }

    pub fn is_run_always(&self) -> bool {
        self.run_always
    }

    pub fn is_run_on_change(&self) -> bool {
        self.run_on_change
    }

    /// Effective fail-on-error given the engine default.
    pub fn fails_on_error(&self, default: bool) -> bool {
        self.fail_on_error.unwrap_or(default)
    }

    pub fn is_run_in_transaction(&self) -> bool {
        self.run_in_transaction
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    pub fn comments_text(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn dbms_filter(&self) -> &[String] {
        &self.dbms
    }

    pub fn created_marker(&self) -> Option<&str> {
        self.created.as_deref()
    }

    pub fn valid_checksums(&self) -> &[ValidChecksum] {
        &self.valid_checksums
    }

    pub fn explicit_rollback(&self) -> Option<&Rollback> {
        self.rollback.as_ref()
    }

    /// Context for this changeset's changes.
    pub fn change_context<'a>(
        &'a self,
        dialect: &'a Dialect,
        resources: &'a dyn ResourceAccessor,
        continue_on_error: bool,
    ) -> ChangeContext<'a> {
        ChangeContext::new(dialect, resources)
            .with_changelog_path(&self.identity.path)
            .with_continue_on_error(continue_on_error)
    }

    /// Changes that apply to the dialect, in order.
    pub fn applicable_changes<'a>(&'a self, dialect: &'a Dialect) -> impl Iterator<Item = &'a dyn Change> + 'a {
        self.changes
            .iter()
            .map(|c| c.as_ref())
            .filter(move |c| dialect.matches_dbms(&c.dbms()))
    }

    /// Checksum under `version`, cached.
    ///
    /// Version 9 leaves out changes whose `dbms` does not match the dialect;
    /// version 8 hashes every change.
    pub fn checksum(&self, ctx: &ChangeContext<'_>, version: ChecksumVersion) -> MigrateResult<Checksum> {
        let key = (version, ctx.dialect.kind());
        if let Some(cached) = self.checksum_cache.lock().get(&key) {
            return Ok(cached.clone());
        }

        let mut children = Vec::with_capacity(self.changes.len());
        for change in &self.changes {
            if version >= ChecksumVersion::V9 && !ctx.dialect.matches_dbms(&change.dbms()) {
                continue;
            }
            children.push(change.checksum(ctx, version)?);
        }
        let checksum = Checksum::compose(&children, version);

        self.checksum_cache.lock().insert(key, checksum.clone());
        Ok(checksum)
    }

    /// Drop cached checksums.
    pub fn clear_checksum_cache(&self) {
        self.checksum_cache.lock().clear();
    }

    /// Whether `stored` is acceptable given the recomputed `actual`.
    pub fn is_checksum_valid(&self, stored: &Checksum, actual: &Checksum) -> bool {
        stored == actual || self.valid_checksums.iter().any(|v| v.accepts(stored))
    }

    /// Short descriptions of the changes, for history.
    pub fn description(&self) -> String {
        self.changes
            .iter()
            .map(|c| c.short_description())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Tag set by a `tagDatabase` change, if any.
    pub fn tag(&self) -> Option<&str> {
        self.changes.iter().find_map(|c| c.tag())
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identity.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ColumnConfig, CreateTableChange, SqlChange, TagDatabaseChange};
    use crate::resource::InMemoryResourceAccessor;

    fn users() -> ChangeSet {
        ChangeSet::new("1", "alice", "db/changelog.yaml")
            .change(CreateTableChange::new("users").column(ColumnConfig::new("id", "INT")))
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(users().to_string(), "db/changelog.yaml::1::alice");
    }

    #[test]
    fn test_checksum_is_stable_and_cached() {
        let dialect = Dialect::postgres();
        let resources = InMemoryResourceAccessor::new();
        let cs = users();
        let ctx = cs.change_context(&dialect, &resources, false);

        let first = cs.checksum(&ctx, ChecksumVersion::V9).unwrap();
        let second = cs.checksum(&ctx, ChecksumVersion::V9).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.version(), ChecksumVersion::V9);
        assert_eq!(users().checksum(&ctx, ChecksumVersion::V9).unwrap(), first);
        assert_ne!(cs.checksum(&ctx, ChecksumVersion::V8).unwrap().digest(), first.digest());
    }

    #[test]
    fn test_checksum_changes_with_any_child() {
        let dialect = Dialect::postgres();
        let resources = InMemoryResourceAccessor::new();
        let base = users();
        let extended = users().change(SqlChange::new("INSERT INTO users VALUES (1)"));
        let ctx = base.change_context(&dialect, &resources, false);

        assert_ne!(
            base.checksum(&ctx, ChecksumVersion::V9).unwrap(),
            extended.checksum(&ctx, ChecksumVersion::V9).unwrap()
        );
    }

    #[test]
    fn test_dbms_excluded_changes_only_skipped_by_current_version() {
        let dialect = Dialect::postgres();
        let resources = InMemoryResourceAccessor::new();
        let base = users();
        let with_mysql_only = users().change(SqlChange::new("SET NAMES utf8").with_dbms("mysql"));
        let ctx = base.change_context(&dialect, &resources, false);

        assert_eq!(
            base.checksum(&ctx, ChecksumVersion::V9).unwrap(),
            with_mysql_only.checksum(&ctx, ChecksumVersion::V9).unwrap()
        );
        assert_ne!(
            base.checksum(&ctx, ChecksumVersion::V8).unwrap(),
            with_mysql_only.checksum(&ctx, ChecksumVersion::V8).unwrap()
        );
        assert_eq!(with_mysql_only.applicable_changes(&dialect).count(), 1);
    }

    #[test]
    fn test_valid_checksums() {
        let stored = Checksum::compute("old", ChecksumVersion::V9);
        let actual = Checksum::compute("new", ChecksumVersion::V9);

        assert!(!users().is_checksum_valid(&stored, &actual));
        assert!(
            users()
                .valid_checksum(ValidChecksum::Exact(stored.clone()))
                .is_checksum_valid(&stored, &actual)
        );
        assert!(
            users()
                .valid_checksum("ANY".parse().unwrap())
                .is_checksum_valid(&stored, &actual)
        );
        assert!("garbage".parse::<ValidChecksum>().is_err());
    }

    #[test]
    fn test_description_and_tag() {
        let cs = users().change(TagDatabaseChange::new("v1"));
        assert_eq!(cs.description(), "createTable tableName=users, tagDatabase tag=v1");
        assert_eq!(cs.tag(), Some("v1"));
        assert!(cs.fails_on_error(true));
        assert!(!cs.fail_on_error(false).fails_on_error(true));
    }
}
