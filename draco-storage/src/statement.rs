//! Statement-rendering sink.
//!
//! Renders collaborator calls as the SQL a relational backend would execute,
//! without connecting anywhere. Used by the dry-run tool and handy for
//! eyeballing what a notification turns into.
//!
//! Every schema, table and column identifier is quoted for the dialect:
//! double quotes for PostgreSQL, backticks for MySQL and HiveQL.

use crate::SinkTrait;
use draco_core::{Backend, DracoResult, PersistenceError};
use std::sync::{PoisonError, RwLock};

/// SQL flavour of a relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    PostgreSql,
    MySql,
    HiveQl,
}

impl Dialect {
    /// Dialect of `backend`; only relational backends have one.
    pub fn for_backend(backend: Backend) -> Result<Self, PersistenceError> {
        match backend {
            Backend::PostgreSql => Ok(Dialect::PostgreSql),
            Backend::MySql => Ok(Dialect::MySql),
            Backend::Hive => Ok(Dialect::HiveQl),
            other => Err(PersistenceError::UnsupportedDialect {
                backend: other.to_string(),
            }),
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let quote = match self {
            Dialect::PostgreSql => '"',
            Dialect::MySql | Dialect::HiveQl => '`',
        };
        let mut quoted = String::with_capacity(identifier.len() + 2);
        quoted.push(quote);
        for c in identifier.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// `schema.table`, both quoted.
    fn qualified(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_identifier(schema), self.quote_identifier(table))
    }

    pub fn create_schema(&self, schema: &str) -> String {
        let schema = self.quote_identifier(schema);
        match self {
            Dialect::PostgreSql => format!("CREATE SCHEMA IF NOT EXISTS {}", schema),
            Dialect::MySql | Dialect::HiveQl => format!("CREATE DATABASE IF NOT EXISTS {}", schema),
        }
    }

    pub fn create_table(&self, schema: &str, table: &str, typed_fields: &str) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} {}", self.qualified(schema, table), typed_fields)
    }

    pub fn insert(&self, schema: &str, table: &str, field_names: &str, field_values: &str) -> String {
        let target = self.qualified(schema, table);
        match self {
            Dialect::PostgreSql | Dialect::MySql => {
                format!("INSERT INTO {} {} VALUES {}", target, field_names, field_values)
            }
            Dialect::HiveQl => {
                format!("INSERT INTO TABLE {} {} VALUES {}", target, field_names, field_values)
            }
        }
    }
}

/// Sink that records rendered statements instead of executing them.
#[derive(Debug)]
pub struct StatementSink {
    dialect: Dialect,
    statements: RwLock<Vec<String>>,
}

impl StatementSink {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: RwLock::new(Vec::new()),
        }
    }

    /// Sink for `backend`, failing for non-relational backends.
    pub fn for_backend(backend: Backend) -> DracoResult<Self> {
        Ok(Self::new(Dialect::for_backend(backend)?))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Rendered statements, oldest first.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, statement: String) {
        tracing::info!(statement = %statement, "Rendered statement");
        self.statements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement);
    }
}

impl SinkTrait for StatementSink {
    fn quote_identifier(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    fn create_schema(&self, schema: &str) -> DracoResult<()> {
        self.push(self.dialect.create_schema(schema));
        Ok(())
    }

    fn create_table(&self, schema: &str, table: &str, typed_fields: &str) -> DracoResult<()> {
        self.push(self.dialect.create_table(schema, table, typed_fields));
        Ok(())
    }

    fn insert(
        &self,
        schema: &str,
        table: &str,
        field_names: &str,
        field_values: &str,
    ) -> DracoResult<()> {
        self.push(self.dialect.insert(schema, table, field_names, field_values));
        Ok(())
    }
}
