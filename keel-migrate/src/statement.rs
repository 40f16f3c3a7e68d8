//! Dialect-independent statements and the concrete SQL they render to.

use std::fmt;

/// A possibly schema-qualified object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    /// Schema, when qualified.
    pub schema: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectName {
    /// An unqualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// A schema-qualified name.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A column definition used by `CREATE TABLE` and `ADD COLUMN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared data type, passed through as written.
    pub data_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Database-generated identity.
    pub auto_increment: bool,
    /// Unique constraint.
    pub unique: bool,
    /// Default value expression.
    pub default: Option<String>,
}

impl ColumnDef {
    /// A nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
        }
    }

    /// Mark as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as primary key (implies NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark as auto increment.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default expression.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    pub table: ObjectName,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

/// `DROP TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTable {
    pub table: ObjectName,
    pub if_exists: bool,
    pub cascade: bool,
}

/// Rename a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTable {
    pub table: ObjectName,
    pub new_name: String,
}

/// `ALTER TABLE ... ADD COLUMN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddColumn {
    pub table: ObjectName,
    pub column: ColumnDef,
}

/// `ALTER TABLE ... DROP COLUMN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropColumn {
    pub table: ObjectName,
    pub column: String,
}

/// Rename a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameColumn {
    pub table: ObjectName,
    pub old_name: String,
    pub new_name: String,
    /// Needed by dialects that restate the column definition on rename.
    pub data_type: Option<String>,
}

/// `CREATE INDEX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndex {
    pub name: String,
    pub table: ObjectName,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// `DROP INDEX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropIndex {
    pub name: String,
    pub table: ObjectName,
}

/// Add a NOT NULL constraint to an existing column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddNotNullConstraint {
    pub table: ObjectName,
    pub column: String,
    pub data_type: Option<String>,
    /// Value written into existing NULL rows first.
    pub default_null_value: Option<String>,
}

/// Literal SQL passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSql {
    pub sql: String,
    pub end_delimiter: Option<String>,
}

/// A comment emitted into rendered scripts only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
}

/// An abstract description of one SQL side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlStatement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    RenameTable(RenameTable),
    AddColumn(AddColumn),
    DropColumn(DropColumn),
    RenameColumn(RenameColumn),
    CreateIndex(CreateIndex),
    DropIndex(DropIndex),
    AddNotNullConstraint(AddNotNullConstraint),
    RawSql(RawSql),
    Comment(Comment),
}

impl SqlStatement {
    /// Convenience constructor for literal SQL with the default delimiter.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::RawSql(RawSql {
            sql: sql.into(),
            end_delimiter: None,
        })
    }

    /// Concrete statement kind.
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::CreateTable(_) => StatementKind::CreateTable,
            Self::DropTable(_) => StatementKind::DropTable,
            Self::RenameTable(_) => StatementKind::RenameTable,
            Self::AddColumn(_) => StatementKind::AddColumn,
            Self::DropColumn(_) => StatementKind::DropColumn,
            Self::RenameColumn(_) => StatementKind::RenameColumn,
            Self::CreateIndex(_) => StatementKind::CreateIndex,
            Self::DropIndex(_) => StatementKind::DropIndex,
            Self::AddNotNullConstraint(_) => StatementKind::AddNotNullConstraint,
            Self::RawSql(_) => StatementKind::RawSql,
            Self::Comment(_) => StatementKind::Comment,
        }
    }

    /// The table this statement touches, if any.
    pub fn table(&self) -> Option<&ObjectName> {
        match self {
            Self::CreateTable(s) => Some(&s.table),
            Self::DropTable(s) => Some(&s.table),
            Self::RenameTable(s) => Some(&s.table),
            Self::AddColumn(s) => Some(&s.table),
            Self::DropColumn(s) => Some(&s.table),
            Self::RenameColumn(s) => Some(&s.table),
            Self::CreateIndex(s) => Some(&s.table),
            Self::DropIndex(s) => Some(&s.table),
            Self::AddNotNullConstraint(s) => Some(&s.table),
            Self::RawSql(_) | Self::Comment(_) => None,
        }
    }
}

/// Statement type tags, arranged in a supertype hierarchy.
///
/// A generator registered for a kind also handles every kind below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Root of the hierarchy.
    Any,
    /// Parent of every `ALTER TABLE` shaped statement.
    AlterTable,
    CreateTable,
    DropTable,
    RenameTable,
    AddColumn,
    DropColumn,
    RenameColumn,
    CreateIndex,
    DropIndex,
    AddNotNullConstraint,
    RawSql,
    Comment,
}

impl StatementKind {
    /// Direct supertype.
    pub fn parent(&self) -> Option<StatementKind> {
        match self {
            Self::Any => None,
            Self::AddColumn
            | Self::DropColumn
            | Self::RenameColumn
            | Self::RenameTable
            | Self::AddNotNullConstraint => Some(Self::AlterTable),
            _ => Some(Self::Any),
        }
    }

    /// This kind followed by every supertype up to [`StatementKind::Any`].
    pub fn ancestors(&self) -> Vec<StatementKind> {
        let mut kinds = vec![*self];
        let mut current = *self;
        while let Some(parent) = current.parent() {
            kinds.push(parent);
            current = parent;
        }
        kinds
    }

    /// Whether `self` is `other` or one of its subtypes.
    pub fn is_a(&self, other: StatementKind) -> bool {
        self.ancestors().contains(&other)
    }

    /// Name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::AlterTable => "alterTable",
            Self::CreateTable => "createTable",
            Self::DropTable => "dropTable",
            Self::RenameTable => "renameTable",
            Self::AddColumn => "addColumn",
            Self::DropColumn => "dropColumn",
            Self::RenameColumn => "renameColumn",
            Self::CreateIndex => "createIndex",
            Self::DropIndex => "dropIndex",
            Self::AddNotNullConstraint => "addNotNullConstraint",
            Self::RawSql => "rawSql",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One concrete SQL fragment ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sql {
    /// SQL text without the end delimiter.
    pub text: String,
    /// Delimiter written after the text in scripts.
    pub end_delimiter: String,
    /// Objects touched, for logs and script headers.
    pub affected: Vec<String>,
    /// Script-only comment; executors skip it.
    pub comment: bool,
}

impl Sql {
    /// A fragment with the default `;` delimiter.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            end_delimiter: ";".to_string(),
            affected: Vec::new(),
            comment: false,
        }
    }

    /// A `--` comment line.
    pub fn comment(text: &str) -> Self {
        Self {
            text: format!("-- {}", text.trim()),
            end_delimiter: String::new(),
            affected: Vec::new(),
            comment: true,
        }
    }

    /// Set the end delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.end_delimiter = delimiter.into();
        self
    }

    /// Record an affected object.
    pub fn affecting(mut self, object: impl ToString) -> Self {
        self.affected.push(object.to_string());
        self
    }

    /// Whether this fragment is a script-only comment.
    pub fn is_comment(&self) -> bool {
        self.comment
    }
}

impl fmt::Display for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_comment() {
            f.write_str(&self.text)
        } else {
            write!(f, "{}{}", self.text, self.end_delimiter)
        }
    }
}
