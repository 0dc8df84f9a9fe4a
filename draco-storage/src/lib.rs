//! Draco Storage - Sink Trait, Aggregation and Persistence
//!
//! Turns parsed notifications into calls against a sink collaborator.
//! Network clients for the actual databases live outside this crate; they
//! implement [`SinkTrait`].

pub mod aggregator;
pub mod cache;
pub mod persister;
pub mod record;
pub mod statement;

pub use aggregator::{
    format_recv_time, Aggregator, ColumnAggregator, RowAggregator, COLUMN_BASE_FIELDS,
    RECV_TIME_FORMAT, ROW_FIELDS,
};
pub use cache::{CacheStats, SchemaTableCache};
pub use persister::{NotificationPersister, PersistSummary};
pub use record::{Cell, RecordBuffer};
pub use statement::{Dialect, StatementSink};

use draco_core::{DracoError, DracoResult, PersistenceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

// ============================================================================
// SINK TRAIT
// ============================================================================

/// Collaborator contract every backend implements.
///
/// `create_schema` and `create_table` must be idempotent ("create if not
/// exists"). Failures are reported as [`PersistenceError`] and propagated
/// unchanged; retrying is the caller's business.
pub trait SinkTrait: Send + Sync {
    /// Create a schema (database, keyspace).
    fn create_schema(&self, schema: &str) -> DracoResult<()>;

    /// Create a table from its typed field declaration, e.g. `(a text,b text)`.
    fn create_table(&self, schema: &str, table: &str, typed_fields: &str) -> DracoResult<()>;

    /// Insert a batch of rows, e.g. `(a,b)` and `('1','2'),('3',NULL)`.
    fn insert(
        &self,
        schema: &str,
        table: &str,
        field_names: &str,
        field_values: &str,
    ) -> DracoResult<()>;

    /// Quote a column identifier for this backend. Unquoted by default.
    fn quote_identifier(&self, identifier: &str) -> String {
        identifier.to_string()
    }
}

// ============================================================================
// MOCK SINK
// ============================================================================

/// A collaborator call recorded by [`MockSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    CreateSchema {
        schema: String,
    },
    CreateTable {
        schema: String,
        table: String,
        typed_fields: String,
    },
    Insert {
        schema: String,
        table: String,
        field_names: String,
        field_values: String,
    },
}

/// In-memory sink for testing. Records every call in order.
#[derive(Debug, Default)]
pub struct MockSink {
    calls: RwLock<Vec<SinkCall>>,
    fail_inserts: AtomicBool,
}

impl MockSink {
    /// Create a new mock sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail with [`PersistenceError::InsertFailed`].
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: SinkCall) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear recorded calls.
    pub fn clear(&self) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn count(&self, pred: impl Fn(&SinkCall) -> bool) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    /// Get count of `create_schema` calls.
    pub fn create_schema_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::CreateSchema { .. }))
    }

    /// Get count of `create_table` calls.
    pub fn create_table_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::CreateTable { .. }))
    }

    /// Get count of `insert` calls.
    pub fn insert_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::Insert { .. }))
    }
}

impl SinkTrait for MockSink {
    fn create_schema(&self, schema: &str) -> DracoResult<()> {
        self.record(SinkCall::CreateSchema {
            schema: schema.to_string(),
        });
        Ok(())
    }

    fn create_table(&self, schema: &str, table: &str, typed_fields: &str) -> DracoResult<()> {
        self.record(SinkCall::CreateTable {
            schema: schema.to_string(),
            table: table.to_string(),
            typed_fields: typed_fields.to_string(),
        });
        Ok(())
    }

    fn insert(
        &self,
        schema: &str,
        table: &str,
        field_names: &str,
        field_values: &str,
    ) -> DracoResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(DracoError::Persistence(PersistenceError::InsertFailed {
                schema: schema.to_string(),
                table: table.to_string(),
                reason: "mock sink configured to fail".to_string(),
            }));
        }

        self.record(SinkCall::Insert {
            schema: schema.to_string(),
            table: table.to_string(),
            field_names: field_names.to_string(),
            field_values: field_values.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
