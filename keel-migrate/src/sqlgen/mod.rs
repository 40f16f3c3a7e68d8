//! Statement x dialect dispatch to SQL generators.
//!
//! Generators are registered once into an immutable [`GeneratorRegistry`], sorted by
//! [`Specificity`] and then by numeric priority, highest first. For a statement and a
//! dialect, every generator whose statement kind is the statement's kind or one of
//! its supertypes, and whose [`SqlGenerator::supports`] accepts the dialect, becomes a
//! candidate. Only the first candidate is invoked; it reaches the next one through the
//! [`GeneratorChain`] it is handed.
//!
//! ```text
//!  AddColumn on db2 ──▶ Db2ReorgTableGenerator ──chain──▶ AddColumnGenerator
//!                              │                               │
//!                              ▼                               ▼
//!                    CALL SYSPROC.ADMIN_CMD(...)      ALTER TABLE ... ADD ...
//! ```

mod db2;
mod mssql;
mod mysql;
mod postgres;
mod sqlite;
mod standard;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::dialect::{DatabaseKind, Dialect, DialectFamily};
use crate::error::{MigrateResult, MigrationError};
use crate::statement::{Sql, SqlStatement, StatementKind};
use crate::validation::ValidationErrors;

pub use db2::Db2ReorgTableGenerator;
pub use mssql::{
    MssqlAddColumnGenerator, MssqlAddNotNullGenerator, MssqlCreateTableGenerator,
    MssqlDropIndexGenerator, MssqlRenameColumnGenerator, MssqlRenameTableGenerator,
};
pub use mysql::{
    MySqlAddColumnGenerator, MySqlAddNotNullGenerator, MySqlCreateTableGenerator,
    MySqlDropIndexGenerator, MySqlRenameColumnGenerator,
};
pub use postgres::{PostgresAddColumnGenerator, PostgresCreateTableGenerator};
pub use sqlite::{SqliteCreateTableGenerator, SqliteDropColumnGenerator, SqliteDropTableGenerator};
pub use standard::{
    AddColumnGenerator, AddNotNullGenerator, CommentGenerator, CreateIndexGenerator,
    CreateTableGenerator, DropColumnGenerator, DropIndexGenerator, DropTableGenerator,
    RawSqlGenerator, RenameColumnGenerator, RenameTableGenerator,
};

/// Default numeric priority.
pub const PRIORITY_DEFAULT: i32 = 1;

/// How narrowly a generator targets dialects. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    /// Any dialect.
    Generic,
    /// A dialect family.
    Family,
    /// One database kind.
    Dialect,
}

/// Renders statements of one kind (or a supertype) to SQL.
pub trait SqlGenerator: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Statement kind handled; supertypes match every subtype.
    fn statement_kind(&self) -> StatementKind;

    /// Dialect specificity.
    fn specificity(&self) -> Specificity {
        Specificity::Generic
    }

    /// Tie-breaker among equally specific generators.
    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    /// Whether this generator handles `statement` on `dialect`.
    fn supports(&self, _statement: &SqlStatement, _dialect: &Dialect) -> bool {
        true
    }

    /// Validate the statement. The default defers to the rest of the chain.
    fn validate(
        &self,
        statement: &SqlStatement,
        dialect: &Dialect,
        chain: &mut GeneratorChain<'_>,
    ) -> ValidationErrors {
        chain.validate(statement, dialect)
    }

    /// Non-fatal remarks about the statement. The default defers to the chain.
    fn warn(
        &self,
        statement: &SqlStatement,
        dialect: &Dialect,
        chain: &mut GeneratorChain<'_>,
    ) -> Vec<String> {
        chain.warn(statement, dialect)
    }

    /// Whether the output depends on live database state.
    fn is_volatile(&self, _statement: &SqlStatement, _dialect: &Dialect) -> bool {
        false
    }

    /// Render the statement.
    fn generate(
        &self,
        statement: &SqlStatement,
        dialect: &Dialect,
        chain: &mut GeneratorChain<'_>,
    ) -> MigrateResult<Vec<Sql>>;
}

/// The remaining candidates after the generator currently running.
pub struct GeneratorChain<'a> {
    generators: &'a [Arc<dyn SqlGenerator>],
    position: usize,
}

impl<'a> GeneratorChain<'a> {
    fn new(generators: &'a [Arc<dyn SqlGenerator>]) -> Self {
        Self {
            generators,
            position: 0,
        }
    }

    fn next_generator(&mut self) -> Option<&'a Arc<dyn SqlGenerator>> {
        let generators = self.generators;
        let next = generators.get(self.position);
        if next.is_some() {
            self.position += 1;
        }
        next
    }

    /// Whether another generator follows.
    pub fn has_next(&self) -> bool {
        self.position < self.generators.len()
    }

    /// Run the next generator. Yields no SQL when the chain is exhausted.
    pub fn generate(&mut self, statement: &SqlStatement, dialect: &Dialect) -> MigrateResult<Vec<Sql>> {
        match self.next_generator() {
            Some(generator) => {
                trace!(generator = generator.name(), "chaining");
                generator.generate(statement, dialect, self)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Validate with the next generator.
    pub fn validate(&mut self, statement: &SqlStatement, dialect: &Dialect) -> ValidationErrors {
        match self.next_generator() {
            Some(generator) => generator.validate(statement, dialect, self),
            None => ValidationErrors::new(),
        }
    }

    /// Collect warnings from the next generator.
    pub fn warn(&mut self, statement: &SqlStatement, dialect: &Dialect) -> Vec<String> {
        match self.next_generator() {
            Some(generator) => generator.warn(statement, dialect, self),
            None => Vec::new(),
        }
    }
}

/// Immutable, priority-sorted set of generators.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: Vec<Arc<dyn SqlGenerator>>,
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.generators.iter().map(|g| g.name()))
            .finish()
    }
}

impl GeneratorRegistry {
    /// Start building a registry.
    pub fn builder() -> GeneratorRegistryBuilder {
        GeneratorRegistryBuilder::default()
    }

    /// The built-in generator set.
    pub fn standard() -> Self {
        GeneratorRegistryBuilder::standard().build()
    }

    /// Number of registered generators.
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Candidates for a statement on a dialect, highest priority first.
    pub fn generators_for(&self, statement: &SqlStatement, dialect: &Dialect) -> Vec<Arc<dyn SqlGenerator>> {
        let kinds = statement.kind().ancestors();
        self.generators
            .iter()
            .filter(|g| kinds.contains(&g.statement_kind()) && g.supports(statement, dialect))
            .cloned()
            .collect()
    }

    /// Whether at least one generator handles the statement.
    pub fn supports(&self, statement: &SqlStatement, dialect: &Dialect) -> bool {
        !self.generators_for(statement, dialect).is_empty()
    }

    /// Render one statement.
    pub fn generate(&self, statement: &SqlStatement, dialect: &Dialect) -> MigrateResult<Vec<Sql>> {
        let candidates = self.generators_for(statement, dialect);
        let Some(first) = candidates.first() else {
            return Err(unsupported(statement, dialect));
        };
        debug!(
            statement = %statement.kind(),
            dialect = %dialect,
            generator = first.name(),
            candidates = candidates.len(),
            "dispatching statement"
        );
        GeneratorChain::new(&candidates).generate(statement, dialect)
    }

    /// Render statements in order.
    pub fn generate_all(&self, statements: &[SqlStatement], dialect: &Dialect) -> MigrateResult<Vec<Sql>> {
        let mut sql = Vec::new();
        for statement in statements {
            sql.extend(self.generate(statement, dialect)?);
        }
        Ok(sql)
    }

    /// Validate a statement through its chain. An unsupported statement is an error.
    pub fn validate(&self, statement: &SqlStatement, dialect: &Dialect) -> ValidationErrors {
        let candidates = self.generators_for(statement, dialect);
        if candidates.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add_error(unsupported(statement, dialect).to_string());
            return errors;
        }
        GeneratorChain::new(&candidates).validate(statement, dialect)
    }

    /// Warnings for a statement.
    pub fn warn(&self, statement: &SqlStatement, dialect: &Dialect) -> Vec<String> {
        let candidates = self.generators_for(statement, dialect);
        GeneratorChain::new(&candidates).warn(statement, dialect)
    }

    /// Whether the generator that would render the statement depends on live
    /// database state. Shadowed candidates are not consulted.
    pub fn is_volatile(&self, statement: &SqlStatement, dialect: &Dialect) -> bool {
        self.generators_for(statement, dialect)
            .first()
            .is_some_and(|g| g.is_volatile(statement, dialect))
    }
}

fn unsupported(statement: &SqlStatement, dialect: &Dialect) -> MigrationError {
    MigrationError::UnsupportedStatement {
        statement: statement.kind().name().to_string(),
        dialect: dialect.to_string(),
    }
}

/// Collects generators before freezing them into a [`GeneratorRegistry`].
#[derive(Default)]
pub struct GeneratorRegistryBuilder {
    generators: Vec<Arc<dyn SqlGenerator>>,
}

impl GeneratorRegistryBuilder {
    /// A builder preloaded with the built-in generators.
    pub fn standard() -> Self {
        Self::default()
            .register(CreateTableGenerator)
            .register(DropTableGenerator)
            .register(RenameTableGenerator)
            .register(AddColumnGenerator)
            .register(DropColumnGenerator)
            .register(RenameColumnGenerator)
            .register(CreateIndexGenerator)
            .register(DropIndexGenerator)
            .register(AddNotNullGenerator)
            .register(RawSqlGenerator)
            .register(CommentGenerator)
            .register(PostgresCreateTableGenerator)
            .register(PostgresAddColumnGenerator)
            .register(MySqlCreateTableGenerator)
            .register(MySqlAddColumnGenerator)
            .register(MySqlRenameColumnGenerator)
            .register(MySqlDropIndexGenerator)
            .register(MySqlAddNotNullGenerator)
            .register(SqliteCreateTableGenerator)
            .register(SqliteDropTableGenerator)
            .register(SqliteDropColumnGenerator)
            .register(MssqlCreateTableGenerator)
            .register(MssqlAddColumnGenerator)
            .register(MssqlRenameTableGenerator)
            .register(MssqlRenameColumnGenerator)
            .register(MssqlDropIndexGenerator)
            .register(MssqlAddNotNullGenerator)
            .register(Db2ReorgTableGenerator)
    }

    /// Add a generator.
    pub fn register(self, generator: impl SqlGenerator + 'static) -> Self {
        self.register_arc(Arc::new(generator))
    }

    /// Add a shared generator.
    pub fn register_arc(mut self, generator: Arc<dyn SqlGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    /// Freeze into a sorted registry. Registration order breaks remaining ties.
    pub fn build(mut self) -> GeneratorRegistry {
        self.generators.sort_by(|a, b| {
            (b.specificity(), b.priority()).cmp(&(a.specificity(), a.priority()))
        });
        GeneratorRegistry {
            generators: self.generators,
        }
    }
}

/// Whether `dialect` belongs to `family`.
pub(crate) fn in_family(dialect: &Dialect, family: DialectFamily) -> bool {
    dialect.family() == family
}

/// Whether `dialect` is exactly `kind`.
pub(crate) fn is_kind(dialect: &Dialect, kind: DatabaseKind) -> bool {
    dialect.kind() == kind
}
