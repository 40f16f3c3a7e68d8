use serde::{Deserialize, Serialize};

use super::{Change, ChangeContext, ChecksumField};
use crate::dialect::Dialect;
use crate::error::MigrateResult;
use crate::statement::SqlStatement;
use crate::validation::ValidationErrors;

/// Marks the history row of its changeset with a tag usable as a rollback target.
///
/// Produces no SQL; the engine writes the tag when recording the changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TagDatabaseChange {
    #[serde(default)]
    pub tag: String,
}

impl TagDatabaseChange {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

#[async_trait::async_trait]
impl Change for TagDatabaseChange {
    fn change_type(&self) -> &'static str {
        "tagDatabase"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![ChecksumField::sql("tag", &self.tag)]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tag", Some(self.tag.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(Vec::new())
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        Some(Vec::new())
    }

    fn confirmation_message(&self) -> String {
        format!("Tag '{}' applied to database", self.tag)
    }

    fn short_description(&self) -> String {
        format!("tagDatabase tag={}", self.tag)
    }

    fn tag(&self) -> Option<&str> {
        Some(&self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_change() {
        let change = TagDatabaseChange::new("v1.0");
        assert_eq!(change.tag(), Some("v1.0"));
        assert!(change.compute_inverse().unwrap().is_empty());
        assert!(TagDatabaseChange::new("").validate(&Dialect::sqlite()).has_errors());
    }
}
