//! Notification persistence pipeline.
//!
//! ```text
//! NotificationEvent
//!     │ build_schema_name / build_table_name
//!     ▼
//! Aggregator per (schema, table)     ── one per distinct table, first-seen order
//!     │
//!     ▼
//! SchemaTableCache ── miss ──► create_schema / create_table
//!     │
//!     ▼
//! insert (one batch per table)
//! ```
//!
//! Naming and aggregation finish for the whole notification before the first
//! sink call, so a bad entity never leaves a partially persisted batch.
//!
//! A table's columns are fixed by the first batch that provisions it. Later
//! batches for a cached table must use a subset of those columns; anything
//! else rejects the whole notification before the sink is touched.

use crate::{Aggregator, RecordBuffer, SchemaTableCache, SinkTrait};
use draco_core::{
    build_schema_name, build_table_name, AttrPersistence, ContextDataError, DracoResult,
    NamingPolicy, NotificationEvent, SinkConfig,
};
use std::sync::Arc;

/// Outcome of persisting one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    /// Tables that received an insert.
    pub tables: usize,
    /// Rows inserted across all tables.
    pub rows: usize,
    /// `create_schema` calls issued.
    pub schemas_created: usize,
    /// `create_table` calls issued.
    pub tables_created: usize,
}

/// Persists notifications through a sink collaborator.
///
/// Cheap to share: the policy is `Copy` and the cache and sink are behind
/// `Arc`s, so one persister can serve many worker threads.
#[derive(Clone)]
pub struct NotificationPersister {
    policy: NamingPolicy,
    attr_persistence: AttrPersistence,
    cache: Arc<SchemaTableCache>,
    sink: Arc<dyn SinkTrait>,
}

impl std::fmt::Debug for NotificationPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationPersister")
            .field("policy", &self.policy)
            .field("attr_persistence", &self.attr_persistence)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl NotificationPersister {
    pub fn new(
        policy: NamingPolicy,
        attr_persistence: AttrPersistence,
        cache: Arc<SchemaTableCache>,
        sink: Arc<dyn SinkTrait>,
    ) -> Self {
        Self {
            policy,
            attr_persistence,
            cache,
            sink,
        }
    }

    /// Build a persister from a validated configuration.
    pub fn from_config(
        config: &SinkConfig,
        cache: Arc<SchemaTableCache>,
        sink: Arc<dyn SinkTrait>,
    ) -> DracoResult<Self> {
        Ok(Self::new(
            config.naming_policy()?,
            config.attr_persistence()?,
            cache,
            sink,
        ))
    }

    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    pub fn attr_persistence(&self) -> AttrPersistence {
        self.attr_persistence
    }

    /// Name and aggregate every entity, without touching the sink.
    ///
    /// Returns one buffer per distinct table, in first-seen order.
    pub fn aggregate(&self, event: &NotificationEvent) -> DracoResult<Vec<RecordBuffer>> {
        event.validate()?;

        let schema = build_schema_name(&event.service, &self.policy)?;
        let mut aggregators: Vec<Aggregator> = Vec::new();

        for (entity, service_path) in event.entities_with_paths()? {
            let table = build_table_name(service_path, entity, &self.policy)?;

            let index = match aggregators.iter().position(|a| a.table() == table) {
                Some(index) => index,
                None => {
                    aggregators.push(Aggregator::new(
                        self.attr_persistence,
                        schema.as_str(),
                        table,
                        self.policy,
                    ));
                    aggregators.len() - 1
                }
            };

            aggregators[index].aggregate(event, entity, service_path)?;
        }

        Ok(aggregators.into_iter().map(Aggregator::into_buffer).collect())
    }

    /// Persist a notification: aggregate, provision what the cache does not
    /// know yet, then insert one batch per table.
    pub fn persist(&self, event: &NotificationEvent) -> DracoResult<PersistSummary> {
        let span = tracing::info_span!(
            "persist",
            correlator = %event.correlator_id,
            service = %event.service,
        );
        let _guard = span.enter();

        let buffers = self
            .aggregate(event)
            .and_then(|buffers| {
                buffers
                    .iter()
                    .try_for_each(|buffer| self.check_provisioned_layout(buffer))?;
                Ok(buffers)
            })
            .inspect_err(|e| {
                tracing::warn!(error = %e, "Notification rejected");
            })?;

        let mut summary = PersistSummary::default();
        for buffer in &buffers {
            if buffer.is_empty() {
                tracing::debug!(table = %buffer.table(), "Nothing to persist");
                continue;
            }

            self.provision(buffer, &mut summary)?;

            tracing::info!(
                schema = %buffer.schema(),
                table = %buffer.table(),
                rows = buffer.row_count(),
                "Persisting batch"
            );
            self.sink.insert(
                buffer.schema(),
                buffer.table(),
                &buffer.field_names_with(|f| self.sink.quote_identifier(f)),
                &buffer.field_values(),
            )?;

            summary.tables += 1;
            summary.rows += buffer.row_count();
        }

        Ok(summary)
    }

    /// A buffer bound for an already provisioned table may only use the
    /// columns that table was created with.
    fn check_provisioned_layout(&self, buffer: &RecordBuffer) -> DracoResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let Some(provisioned) = self.cache.table_fields(buffer.schema(), buffer.table()) else {
            return Ok(());
        };

        match buffer.fields().iter().find(|f| !provisioned.contains(f)) {
            Some(column) => Err(ContextDataError::ProvisionedLayoutMismatch {
                table: buffer.table().to_string(),
                column: column.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn provision(&self, buffer: &RecordBuffer, summary: &mut PersistSummary) -> DracoResult<()> {
        let schema = buffer.schema();
        let table = buffer.table();

        if !self.cache.has_schema(schema) {
            tracing::info!(schema = %schema, "Creating schema");
            self.sink.create_schema(schema)?;
            self.cache.remember_schema(schema);
            summary.schemas_created += 1;
        }

        if !self.cache.has_table(schema, table) {
            let typed_fields = buffer.typed_field_names_with(
                self.policy.profile.backend.text_column_type(),
                |f| self.sink.quote_identifier(f),
            );
            tracing::info!(schema = %schema, table = %table, "Creating table");
            self.sink.create_table(schema, table, &typed_fields)?;
            self.cache.remember_table(schema, table, buffer.fields());
            summary.tables_created += 1;
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
