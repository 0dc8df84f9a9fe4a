//! Schema/table provisioning cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to the sink.
    pub misses: u64,
    /// Number of schemas remembered.
    pub schemas: u64,
    /// Number of tables remembered, across all schemas.
    pub tables: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fields a table was provisioned with, keyed by table name.
type Tables = HashMap<String, Vec<String>>;

/// Process-wide memo of provisioned schemas, their tables and the fields each
/// table was created with.
///
/// Insert-only. The first layout remembered for a table sticks; later
/// `remember_table` calls for the same table leave it untouched.
#[derive(Debug, Default)]
pub struct SchemaTableCache {
    schemas: RwLock<HashMap<String, Tables>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaTableCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, hit: bool) -> bool {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Whether `schema` is known to be provisioned.
    pub fn has_schema(&self, schema: &str) -> bool {
        // A poisoned lock still guards a consistent map: writers only insert.
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        self.record(schemas.contains_key(schema))
    }

    /// Whether `table` is known to be provisioned in `schema`.
    pub fn has_table(&self, schema: &str, table: &str) -> bool {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        let hit = schemas
            .get(schema)
            .is_some_and(|tables| tables.contains_key(table));
        self.record(hit)
    }

    /// Fields `table` was provisioned with, if it is known.
    ///
    /// Does not count towards the hit/miss statistics.
    pub fn table_fields(&self, schema: &str, table: &str) -> Option<Vec<String>> {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        schemas.get(schema)?.get(table).cloned()
    }

    /// Remember `schema` as provisioned.
    pub fn remember_schema(&self, schema: &str) {
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        if !schemas.contains_key(schema) {
            schemas.insert(schema.to_string(), Tables::new());
        }
    }

    /// Remember `table` (and its schema) as provisioned with `fields`.
    pub fn remember_table(&self, schema: &str, table: &str, fields: &[String]) {
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        schemas
            .entry(schema.to_string())
            .or_default()
            .entry(table.to_string())
            .or_insert_with(|| fields.to_vec());
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> CacheStats {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            schemas: schemas.len() as u64,
            tables: schemas.values().map(|t| t.len() as u64).sum(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
