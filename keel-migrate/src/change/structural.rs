//! Built-in structural changes.

use serde::{Deserialize, Serialize};

use super::{Change, ChangeContext, ChangeStatus, ChecksumField};
use crate::dialect::Dialect;
use crate::error::MigrateResult;
use crate::inspect::SchemaInspector;
use crate::statement::{
    AddColumn, AddNotNullConstraint, ColumnDef, CreateIndex, CreateTable, DropColumn, DropIndex,
    DropTable, ObjectName, RenameColumn, RenameTable, SqlStatement,
};
use crate::validation::ValidationErrors;

fn object(schema: &Option<String>, name: &str) -> ObjectName {
    ObjectName {
        schema: schema.clone(),
        name: name.to_string(),
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn default_true() -> bool {
    true
}

/// Column declaration inside `createTable`, `addColumn` and `dropTable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
    pub default_value: Option<String>,
    pub remarks: Option<String>,
}

impl ColumnConfig {
    /// A nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            nullable: true,
            unique: false,
            auto_increment: false,
            default_value: None,
            remarks: None,
        }
    }

    /// Mark as primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as auto increment.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    fn to_column_def(&self) -> ColumnDef {
        ColumnDef {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            nullable: self.nullable && !self.primary_key,
            primary_key: self.primary_key,
            auto_increment: self.auto_increment,
            unique: self.unique,
            default: self.default_value.clone(),
        }
    }

    fn checksum_value(&self) -> String {
        format!(
            "{} {} pk={} nullable={} unique={} auto={} default={}",
            self.name,
            self.data_type,
            self.primary_key,
            self.nullable,
            self.unique,
            self.auto_increment,
            opt(&self.default_value)
        )
    }

    fn validate_into(&self, errors: &mut ValidationErrors) {
        errors.check_required("column.name", Some(self.name.as_str()));
        errors.check_required("column.type", Some(self.data_type.as_str()));
    }
}

fn columns_checksum(columns: &[ColumnConfig]) -> ChecksumField {
    let value: Vec<String> = columns.iter().map(ColumnConfig::checksum_value).collect();
    ChecksumField::sql("columns", value.join(", "))
}

fn column_remarks(columns: &[ColumnConfig]) -> ChecksumField {
    let value: Vec<String> = columns
        .iter()
        .filter_map(|c| c.remarks.as_ref().map(|r| format!("{}={}", c.name, r)))
        .collect();
    ChecksumField::metadata("columnRemarks", value.join(", "))
}

/// Creates a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTableChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub if_not_exists: bool,
    pub remarks: Option<String>,
}

impl CreateTableChange {
    /// A table with no columns yet.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    /// Append a column.
    pub fn column(mut self, column: ColumnConfig) -> Self {
        self.columns.push(column);
        self
    }
}

#[async_trait::async_trait]
impl Change for CreateTableChange {
    fn change_type(&self) -> &'static str {
        "createTable"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            columns_checksum(&self.columns),
            ChecksumField::sql("ifNotExists", self.if_not_exists),
            ChecksumField::metadata("remarks", opt(&self.remarks)),
            column_remarks(&self.columns),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors.check_not_empty("columns", &self.columns);
        for column in &self.columns {
            column.validate_into(&mut errors);
        }
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::CreateTable(CreateTable {
            table: object(&self.schema_name, &self.table_name),
            columns: self.columns.iter().map(ColumnConfig::to_column_def).collect(),
            if_not_exists: self.if_not_exists,
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        if !inspector.table_exists(&table).await? {
            return Ok(ChangeStatus::not_applied(format!("table {} does not exist", table)));
        }
        let mut missing = Vec::new();
        for column in &self.columns {
            if !inspector.column_exists(&table, &column.name).await? {
                missing.push(column.name.clone());
            }
        }
        Ok(ChangeStatus::applied_if(
            missing.is_empty(),
            format!("table {} is missing columns: {}", table, missing.join(", ")),
        ))
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        Some(vec![Box::new(DropTableChange {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            cascade_constraints: false,
            columns: None,
        })])
    }

    fn confirmation_message(&self) -> String {
        format!("Table {} created", self.table_name)
    }

    fn short_description(&self) -> String {
        format!("createTable tableName={}", self.table_name)
    }
}

/// Drops a table. Carrying the column list makes it reversible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DropTableChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub cascade_constraints: bool,
    pub columns: Option<Vec<ColumnConfig>>,
}

impl DropTableChange {
    /// Drop `table_name`.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl Change for DropTableChange {
    fn change_type(&self) -> &'static str {
        "dropTable"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        let mut fields = vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            ChecksumField::sql("cascadeConstraints", self.cascade_constraints),
        ];
        if let Some(columns) = &self.columns {
            fields.push(columns_checksum(columns));
        }
        fields
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::DropTable(DropTable {
            table: object(&self.schema_name, &self.table_name),
            if_exists: false,
            cascade: self.cascade_constraints,
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        let exists = inspector.table_exists(&table).await?;
        Ok(ChangeStatus::applied_if(!exists, format!("table {} still exists", table)))
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        let columns = self.columns.as_ref().filter(|c| !c.is_empty())?;
        Some(vec![Box::new(CreateTableChange {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            columns: columns.clone(),
            if_not_exists: false,
            remarks: None,
        })])
    }

    fn confirmation_message(&self) -> String {
        format!("Table {} dropped", self.table_name)
    }

    fn short_description(&self) -> String {
        format!("dropTable tableName={}", self.table_name)
    }
}

/// Renames a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RenameTableChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub old_table_name: String,
    #[serde(default)]
    pub new_table_name: String,
}

#[async_trait::async_trait]
impl Change for RenameTableChange {
    fn change_type(&self) -> &'static str {
        "renameTable"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("oldTableName", &self.old_table_name),
            ChecksumField::sql("newTableName", &self.new_table_name),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("oldTableName", Some(self.old_table_name.as_str()));
        errors.check_required("newTableName", Some(self.new_table_name.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::RenameTable(RenameTable {
            table: object(&self.schema_name, &self.old_table_name),
            new_name: self.new_table_name.clone(),
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let old = inspector
            .table_exists(&object(&self.schema_name, &self.old_table_name))
            .await?;
        let new = inspector
            .table_exists(&object(&self.schema_name, &self.new_table_name))
            .await?;
        Ok(match (old, new) {
            (false, true) => ChangeStatus::applied(),
            (true, false) => ChangeStatus::not_applied(format!("table {} not renamed yet", self.old_table_name)),
            _ => ChangeStatus::indeterminate(format!(
                "tables {} and {} both {}",
                self.old_table_name,
                self.new_table_name,
                if old { "exist" } else { "missing" }
            )),
        })
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        Some(vec![Box::new(RenameTableChange {
            schema_name: self.schema_name.clone(),
            old_table_name: self.new_table_name.clone(),
            new_table_name: self.old_table_name.clone(),
        })])
    }

    fn confirmation_message(&self) -> String {
        format!("Table {} renamed to {}", self.old_table_name, self.new_table_name)
    }
}

/// Adds one or more columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddColumnChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

impl AddColumnChange {
    /// Add columns to `table_name`.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    /// Append a column.
    pub fn column(mut self, column: ColumnConfig) -> Self {
        self.columns.push(column);
        self
    }
}

#[async_trait::async_trait]
impl Change for AddColumnChange {
    fn change_type(&self) -> &'static str {
        "addColumn"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            columns_checksum(&self.columns),
            column_remarks(&self.columns),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors.check_not_empty("columns", &self.columns);
        for column in &self.columns {
            column.validate_into(&mut errors);
        }
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        let table = object(&self.schema_name, &self.table_name);
        Ok(self
            .columns
            .iter()
            .map(|column| {
                SqlStatement::AddColumn(AddColumn {
                    table: table.clone(),
                    column: column.to_column_def(),
                })
            })
            .collect())
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        let mut missing = Vec::new();
        for column in &self.columns {
            if !inspector.column_exists(&table, &column.name).await? {
                missing.push(column.name.clone());
            }
        }
        Ok(ChangeStatus::applied_if(
            missing.is_empty(),
            format!("columns not on {}: {}", table, missing.join(", ")),
        ))
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        Some(
            self.columns
                .iter()
                .rev()
                .map(|column| {
                    Box::new(DropColumnChange {
                        schema_name: self.schema_name.clone(),
                        table_name: self.table_name.clone(),
                        column_name: column.name.clone(),
                    }) as Box<dyn Change>
                })
                .collect(),
        )
    }

    fn confirmation_message(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        format!("Columns {} added to {}", names.join(", "), self.table_name)
    }

    fn short_description(&self) -> String {
        format!("addColumn tableName={}", self.table_name)
    }
}

/// Drops a column. Not reversible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DropColumnChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub column_name: String,
}

#[async_trait::async_trait]
impl Change for DropColumnChange {
    fn change_type(&self) -> &'static str {
        "dropColumn"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            ChecksumField::sql("columnName", &self.column_name),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors.check_required("columnName", Some(self.column_name.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::DropColumn(DropColumn {
            table: object(&self.schema_name, &self.table_name),
            column: self.column_name.clone(),
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        let exists = inspector.column_exists(&table, &self.column_name).await?;
        Ok(ChangeStatus::applied_if(
            !exists,
            format!("column {}.{} still exists", table, self.column_name),
        ))
    }

    fn confirmation_message(&self) -> String {
        format!("Column {}.{} dropped", self.table_name, self.column_name)
    }
}

/// Renames a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RenameColumnChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub old_column_name: String,
    #[serde(default)]
    pub new_column_name: String,
    pub column_data_type: Option<String>,
    pub remarks: Option<String>,
}

#[async_trait::async_trait]
impl Change for RenameColumnChange {
    fn change_type(&self) -> &'static str {
        "renameColumn"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            ChecksumField::sql("oldColumnName", &self.old_column_name),
            ChecksumField::sql("newColumnName", &self.new_column_name),
            ChecksumField::sql("columnDataType", opt(&self.column_data_type)),
            ChecksumField::metadata("remarks", opt(&self.remarks)),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors.check_required("oldColumnName", Some(self.old_column_name.as_str()));
        errors.check_required("newColumnName", Some(self.new_column_name.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::RenameColumn(RenameColumn {
            table: object(&self.schema_name, &self.table_name),
            old_name: self.old_column_name.clone(),
            new_name: self.new_column_name.clone(),
            data_type: self.column_data_type.clone(),
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        let old = inspector.column_exists(&table, &self.old_column_name).await?;
        let new = inspector.column_exists(&table, &self.new_column_name).await?;
        Ok(match (old, new) {
            (false, true) => ChangeStatus::applied(),
            (true, false) => ChangeStatus::not_applied(format!("column {} not renamed yet", self.old_column_name)),
            _ => ChangeStatus::indeterminate(format!(
                "columns {} and {} are both {}",
                self.old_column_name,
                self.new_column_name,
                if old { "present" } else { "absent" }
            )),
        })
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        Some(vec![Box::new(RenameColumnChange {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            old_column_name: self.new_column_name.clone(),
            new_column_name: self.old_column_name.clone(),
            column_data_type: self.column_data_type.clone(),
            remarks: None,
        })])
    }

    fn confirmation_message(&self) -> String {
        format!(
            "Column {}.{} renamed to {}",
            self.table_name, self.old_column_name, self.new_column_name
        )
    }
}

/// Creates an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateIndexChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub index_name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[async_trait::async_trait]
impl Change for CreateIndexChange {
    fn change_type(&self) -> &'static str {
        "createIndex"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            ChecksumField::sql("indexName", &self.index_name),
            ChecksumField::sql("columns", self.columns.join(", ")),
            ChecksumField::sql("unique", self.unique),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors.check_required("indexName", Some(self.index_name.as_str()));
        errors.check_not_empty("columns", &self.columns);
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::CreateIndex(CreateIndex {
            name: self.index_name.clone(),
            table: object(&self.schema_name, &self.table_name),
            columns: self.columns.clone(),
            unique: self.unique,
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        let exists = inspector.index_exists(&table, &self.index_name).await?;
        Ok(ChangeStatus::applied_if(
            exists,
            format!("index {} does not exist", self.index_name),
        ))
    }

    fn compute_inverse(&self) -> Option<Vec<Box<dyn Change>>> {
        Some(vec![Box::new(DropIndexChange {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            index_name: self.index_name.clone(),
        })])
    }

    fn confirmation_message(&self) -> String {
        format!("Index {} created", self.index_name)
    }
}

/// Drops an index. Not reversible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DropIndexChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub index_name: String,
}

#[async_trait::async_trait]
impl Change for DropIndexChange {
    fn change_type(&self) -> &'static str {
        "dropIndex"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            ChecksumField::sql("indexName", &self.index_name),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("indexName", Some(self.index_name.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::DropIndex(DropIndex {
            name: self.index_name.clone(),
            table: object(&self.schema_name, &self.table_name),
        })])
    }

    async fn check_status(&self, _dialect: &Dialect, inspector: &dyn SchemaInspector) -> MigrateResult<ChangeStatus> {
        let table = object(&self.schema_name, &self.table_name);
        let exists = inspector.index_exists(&table, &self.index_name).await?;
        Ok(ChangeStatus::applied_if(
            !exists,
            format!("index {} still exists", self.index_name),
        ))
    }

    fn confirmation_message(&self) -> String {
        format!("Index {} dropped", self.index_name)
    }
}

/// Makes an existing column NOT NULL, optionally back-filling NULL rows first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddNotNullConstraintChange {
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub column_name: String,
    pub column_data_type: Option<String>,
    pub default_null_value: Option<String>,
}

#[async_trait::async_trait]
impl Change for AddNotNullConstraintChange {
    fn change_type(&self) -> &'static str {
        "addNotNullConstraint"
    }

    fn checksum_fields(&self) -> Vec<ChecksumField> {
        vec![
            ChecksumField::sql("schemaName", opt(&self.schema_name)),
            ChecksumField::sql("tableName", &self.table_name),
            ChecksumField::sql("columnName", &self.column_name),
            ChecksumField::sql("columnDataType", opt(&self.column_data_type)),
            ChecksumField::sql("defaultNullValue", opt(&self.default_null_value)),
        ]
    }

    fn validate(&self, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some(self.table_name.as_str()));
        errors.check_required("columnName", Some(self.column_name.as_str()));
        errors
    }

    fn generate_statements(&self, _ctx: &ChangeContext<'_>) -> MigrateResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::AddNotNullConstraint(AddNotNullConstraint {
            table: object(&self.schema_name, &self.table_name),
            column: self.column_name.clone(),
            data_type: self.column_data_type.clone(),
            default_null_value: self.default_null_value.clone(),
        })])
    }

    fn confirmation_message(&self) -> String {
        format!("Null constraint added to {}.{}", self.table_name, self.column_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::AppliedState;
    use crate::checksum::ChecksumVersion;
    use crate::inspect::SnapshotInspector;
    use crate::resource::InMemoryResourceAccessor;
    use serde_json::json;

    fn ctx_parts() -> (Dialect, InMemoryResourceAccessor) {
        (Dialect::postgres(), InMemoryResourceAccessor::new())
    }

    #[test]
    fn test_create_table_from_params() {
        let change: CreateTableChange = serde_json::from_value(json!({
            "tableName": "users",
            "remarks": "people",
            "columns": [
                { "name": "id", "type": "INTEGER", "primaryKey": true, "autoIncrement": true },
                { "name": "email", "type": "VARCHAR(255)", "nullable": false }
            ]
        }))
        .unwrap();

        assert!(!change.validate(&Dialect::postgres()).has_errors());
        let (dialect, resources) = ctx_parts();
        let statements = change
            .generate_statements(&ChangeContext::new(&dialect, &resources))
            .unwrap();
        let SqlStatement::CreateTable(stmt) = &statements[0] else {
            panic!("expected createTable");
        };
        assert_eq!(stmt.columns.len(), 2);
        assert!(!stmt.columns[1].nullable);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<DropColumnChange, _> = serde_json::from_value(json!({
            "tableName": "users",
            "column": "email"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_remarks_do_not_affect_current_checksum() {
        let (dialect, resources) = ctx_parts();
        let ctx = ChangeContext::new(&dialect, &resources);
        let plain = CreateTableChange::new("users").column(ColumnConfig::new("id", "INT"));
        let mut described = plain.clone();
        described.remarks = Some("all the users".into());

        assert_eq!(
            plain.checksum(&ctx, ChecksumVersion::V9).unwrap(),
            described.checksum(&ctx, ChecksumVersion::V9).unwrap()
        );
        assert_ne!(
            plain.checksum(&ctx, ChecksumVersion::V8).unwrap(),
            described.checksum(&ctx, ChecksumVersion::V8).unwrap()
        );

        let mut renamed = plain.clone();
        renamed.columns[0].name = "key".into();
        assert_ne!(
            plain.checksum(&ctx, ChecksumVersion::V9).unwrap(),
            renamed.checksum(&ctx, ChecksumVersion::V9).unwrap()
        );
    }

    #[test]
    fn test_add_column_inverse_is_reverse_drops() {
        let change = AddColumnChange::new("users")
            .column(ColumnConfig::new("a", "INT"))
            .column(ColumnConfig::new("b", "INT"));
        let inverse = change.compute_inverse().unwrap();
        let descriptions: Vec<String> = inverse.iter().map(|c| c.confirmation_message()).collect();
        assert_eq!(
            descriptions,
            vec!["Column users.b dropped".to_string(), "Column users.a dropped".to_string()]
        );
    }

    #[test]
    fn test_irreversible_changes() {
        assert!(DropColumnChange::default().compute_inverse().is_none());
        assert!(DropIndexChange::default().compute_inverse().is_none());
        assert!(AddNotNullConstraintChange::default().compute_inverse().is_none());
        assert!(DropTableChange::new("t").compute_inverse().is_none());

        let mut with_columns = DropTableChange::new("t");
        with_columns.columns = Some(vec![ColumnConfig::new("id", "INT")]);
        assert_eq!(with_columns.compute_inverse().unwrap()[0].change_type(), "createTable");
    }

    #[test]
    fn test_rename_inverse_swaps_names() {
        let change = RenameColumnChange {
            table_name: "users".into(),
            old_column_name: "mail".into(),
            new_column_name: "email".into(),
            ..Default::default()
        };
        let inverse = change.compute_inverse().unwrap();
        assert_eq!(inverse[0].confirmation_message(), "Column users.email renamed to mail");
    }

    #[tokio::test]
    async fn test_check_status() {
        let dialect = Dialect::postgres();
        let inspector = SnapshotInspector::new().with_table("users", &["id", "email"]);

        let created = CreateTableChange::new("users")
            .column(ColumnConfig::new("id", "INT"))
            .column(ColumnConfig::new("email", "TEXT"));
        assert_eq!(
            created.check_status(&dialect, &inspector).await.unwrap().state,
            AppliedState::Applied
        );

        let added = AddColumnChange::new("users").column(ColumnConfig::new("name", "TEXT"));
        let status = added.check_status(&dialect, &inspector).await.unwrap();
        assert_eq!(status.state, AppliedState::NotApplied);
        assert!(status.messages[0].contains("name"));

        let not_null = AddNotNullConstraintChange::default();
        assert_eq!(
            not_null.check_status(&dialect, &inspector).await.unwrap().state,
            AppliedState::Indeterminate
        );
    }
}
