//! Change type name to constructor lookup.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    AddColumnChange, AddNotNullConstraintChange, Change, CreateIndexChange, CreateTableChange,
    DropColumnChange, DropIndexChange, DropTableChange, RenameColumnChange, RenameTableChange,
    SqlChange, SqlFileChange, TagDatabaseChange,
};
use crate::error::{MigrateResult, MigrationError};

/// Builds a change from its JSON parameter map.
pub type ChangeFactory = Arc<dyn Fn(&Value) -> MigrateResult<Box<dyn Change>> + Send + Sync>;

/// Maps declared change type names to constructors.
///
/// Populated once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct ChangeRegistry {
    factories: IndexMap<String, ChangeFactory>,
}

impl fmt::Debug for ChangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChangeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in change.
    pub fn standard() -> Self {
        Self::new()
            .with_serde::<CreateTableChange>("createTable")
            .with_serde::<DropTableChange>("dropTable")
            .with_serde::<RenameTableChange>("renameTable")
            .with_serde::<AddColumnChange>("addColumn")
            .with_serde::<DropColumnChange>("dropColumn")
            .with_serde::<RenameColumnChange>("renameColumn")
            .with_serde::<CreateIndexChange>("createIndex")
            .with_serde::<DropIndexChange>("dropIndex")
            .with_serde::<AddNotNullConstraintChange>("addNotNullConstraint")
            .with_serde::<SqlChange>("sql")
            .with_serde::<SqlFileChange>("sqlFile")
            .with_serde::<TagDatabaseChange>("tagDatabase")
    }

    /// Register a constructor, replacing any previous one for the name.
    pub fn register(&mut self, change_type: impl Into<String>, factory: ChangeFactory) {
        self.factories.insert(change_type.into(), factory);
    }

    /// Register a change deserialized straight from its parameters.
    pub fn with_serde<T>(mut self, change_type: &str) -> Self
    where
        T: Change + DeserializeOwned + 'static,
    {
        let name = change_type.to_string();
        self.register(
            change_type,
            Arc::new(move |params: &Value| from_params::<T>(&name, params)),
        );
        self
    }

    /// Construct a change by declared type name.
    pub fn create(&self, change_type: &str, params: &Value) -> MigrateResult<Box<dyn Change>> {
        let factory = self
            .factories
            .get(change_type)
            .ok_or_else(|| MigrationError::UnknownChangeType(change_type.to_string()))?;
        factory(params)
    }

    /// Whether a type name is registered.
    pub fn contains(&self, change_type: &str) -> bool {
        self.factories.contains_key(change_type)
    }

    /// Registered names in registration order.
    pub fn change_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Deserialize a change from its parameter map.
pub fn from_params<T>(change_type: &str, params: &Value) -> MigrateResult<Box<dyn Change>>
where
    T: Change + DeserializeOwned + 'static,
{
    let change: T = serde_json::from_value(params.clone())
        .map_err(|e| MigrationError::invalid_change(change_type, e.to_string()))?;
    Ok(Box::new(change))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_registry_creates_changes() {
        let registry = ChangeRegistry::standard();
        let change = registry
            .create(
                "addColumn",
                &json!({
                    "tableName": "users",
                    "columns": [{ "name": "email", "type": "VARCHAR(255)" }]
                }),
            )
            .unwrap();
        assert_eq!(change.change_type(), "addColumn");
        assert_eq!(registry.change_types().count(), 12);
    }

    #[test]
    fn test_unknown_change_type() {
        let err = ChangeRegistry::standard()
            .create("loadData", &json!({}))
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnknownChangeType(name) if name == "loadData"));
    }

    #[test]
    fn test_bad_parameters_name_the_change_type() {
        let err = ChangeRegistry::standard()
            .create("dropColumn", &json!({ "tableName": 5 }))
            .unwrap_err();
        match err {
            MigrationError::InvalidChange { change_type, .. } => assert_eq!(change_type, "dropColumn"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ChangeRegistry::new();
        registry.register(
            "noop",
            Arc::new(|_params: &Value| {
                Ok(Box::new(TagDatabaseChange::new("noop")) as Box<dyn Change>)
            }),
        );
        assert!(registry.contains("noop"));
        assert!(!registry.contains("sql"));
        assert!(registry.create("noop", &Value::Null).is_ok());
    }
}
