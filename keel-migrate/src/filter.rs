//! Gating predicates evaluated before a changeset is considered.
//!
//! Contexts, labels and preconditions are evaluated by the host; they reach the
//! engine as a [`ChangeSetFilter`].

use std::fmt;

use crate::changeset::ChangeSet;
use crate::dialect::Dialect;

/// Whether a changeset may run, with the reason when it may not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    Reject(String),
}

impl FilterVerdict {
    /// Reject with a reason.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject(reason.into())
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// An external gate on changesets. Never touches history.
pub trait ChangeSetFilter: Send + Sync {
    fn evaluate(&self, changeset: &ChangeSet) -> FilterVerdict;
}

impl<F> ChangeSetFilter for F
where
    F: Fn(&ChangeSet) -> FilterVerdict + Send + Sync,
{
    fn evaluate(&self, changeset: &ChangeSet) -> FilterVerdict {
        self(changeset)
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ChangeSetFilter for AcceptAll {
    fn evaluate(&self, _changeset: &ChangeSet) -> FilterVerdict {
        FilterVerdict::Accept
    }
}

/// Rejects changesets whose `dbms` list excludes the dialect.
#[derive(Debug, Clone)]
pub struct DbmsFilter {
    dialect: Dialect,
}

impl DbmsFilter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl ChangeSetFilter for DbmsFilter {
    fn evaluate(&self, changeset: &ChangeSet) -> FilterVerdict {
        if self.dialect.matches_dbms(changeset.dbms_filter()) {
            FilterVerdict::Accept
        } else {
            FilterVerdict::reject(format!(
                "dbms {} does not match {}",
                changeset.dbms_filter().join(","),
                self.dialect.short_name()
            ))
        }
    }
}

/// Rejects changesets marked `ignore`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreFilter;

impl ChangeSetFilter for IgnoreFilter {
    fn evaluate(&self, changeset: &ChangeSet) -> FilterVerdict {
        if changeset.is_ignored() {
            FilterVerdict::reject("changeset is marked ignore")
        } else {
            FilterVerdict::Accept
        }
    }
}

/// All filters must accept; the first rejection wins.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn ChangeSetFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// `IgnoreFilter` followed by a `DbmsFilter` for the dialect.
    pub fn standard(dialect: &Dialect) -> Self {
        Self::new().with(IgnoreFilter).with(DbmsFilter::new(dialect.clone()))
    }

    /// Append a filter.
    pub fn with(mut self, filter: impl ChangeSetFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl ChangeSetFilter for FilterChain {
    fn evaluate(&self, changeset: &ChangeSet) -> FilterVerdict {
        for filter in &self.filters {
            let verdict = filter.evaluate(changeset);
            if !verdict.is_accepted() {
                return verdict;
            }
        }
        FilterVerdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dbms_filter() {
        let filter = DbmsFilter::new(Dialect::postgres());
        assert!(filter.evaluate(&ChangeSet::new("1", "a", "c")).is_accepted());
        assert!(filter.evaluate(&ChangeSet::new("1", "a", "c").dbms("postgresql,mysql")).is_accepted());
        assert_eq!(
            filter.evaluate(&ChangeSet::new("1", "a", "c").dbms("!postgresql")),
            FilterVerdict::reject("dbms !postgresql does not match postgresql")
        );
    }

    #[test]
    fn test_chain_first_rejection_wins() {
        let chain = FilterChain::standard(&Dialect::sqlite())
            .with(|cs: &ChangeSet| {
                if cs.id().starts_with("seed") {
                    FilterVerdict::reject("context 'test' not active")
                } else {
                    FilterVerdict::Accept
                }
            });

        assert_eq!(chain.len(), 3);
        assert!(chain.evaluate(&ChangeSet::new("1", "a", "c")).is_accepted());
        assert_eq!(
            chain.evaluate(&ChangeSet::new("seed-1", "a", "c").ignore()),
            FilterVerdict::reject("changeset is marked ignore")
        );
        assert_eq!(
            chain.evaluate(&ChangeSet::new("seed-1", "a", "c")),
            FilterVerdict::reject("context 'test' not active")
        );
    }

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.evaluate(&ChangeSet::new("1", "a", "c").ignore()).is_accepted());
    }
}
