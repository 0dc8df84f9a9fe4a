//! Error types for Draco operations

use thiserror::Error;

/// Configuration errors (BadConfiguration).
///
/// Fatal to the notification being processed. Raised before anything reaches
/// the sink, so shared state is never touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown data model '{value}', expected one of: dm-by-service-path, dm-by-entity")]
    UnknownDataModel { value: String },

    #[error("Unknown attribute persistence '{value}', expected one of: row, column")]
    UnknownAttrPersistence { value: String },

    #[error("Unknown backend '{value}'")]
    UnknownBackend { value: String },

    #[error("Building {component} name '{name}': length {len} exceeds the {backend} limit of {max}")]
    NameTooLong {
        component: String,
        name: String,
        len: usize,
        max: usize,
        backend: String,
    },

    #[error("Default service path '/' cannot be used with dm-by-service-path unless encoding is enabled")]
    RootServicePathNotAllowed,

    #[error("Building {component} name produced an empty identifier")]
    EmptyName { component: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Cannot read configuration from {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Cannot parse configuration: {reason}")]
    Unparsable { reason: String },
}

/// Notification payload errors (BadContextData).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextDataError {
    #[error("Malformed notification: {reason}")]
    Malformed { reason: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Notification carries no entities")]
    EmptyEntityList,

    #[error("Invalid service path '{path}': must start with '/'")]
    InvalidServicePath { path: String },

    #[error("Service path header lists {paths} paths for {entities} entities")]
    ServicePathCountMismatch { paths: usize, entities: usize },

    #[error("Entity {entity_id} has attribute '{attribute}' not present in the column layout of table {table}")]
    ColumnLayoutMismatch {
        table: String,
        entity_id: String,
        attribute: String,
    },

    #[error("Attribute columns of table {table} collide on '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Column '{column}' is not part of the provisioned layout of table {table}")]
    ProvisionedLayoutMismatch { table: String, column: String },
}

/// Sink collaborator failures, propagated unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Creating schema {schema} failed: {reason}")]
    CreateSchemaFailed { schema: String, reason: String },

    #[error("Creating table {schema}.{table} failed: {reason}")]
    CreateTableFailed {
        schema: String,
        table: String,
        reason: String,
    },

    #[error("Insert into {schema}.{table} failed: {reason}")]
    InsertFailed {
        schema: String,
        table: String,
        reason: String,
    },

    #[error("Backend {backend} has no statement dialect")]
    UnsupportedDialect { backend: String },
}

/// Errors decoding a reversibly encoded identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid escape token '{token}' at offset {offset}")]
    InvalidEscape { token: String, offset: usize },

    #[error("Unpaired surrogate escape at offset {offset}")]
    UnpairedSurrogate { offset: usize },
}

/// Master error type for all Draco errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DracoError {
    #[error("Bad configuration: {0}")]
    BadConfiguration(#[from] ConfigError),

    #[error("Bad context data: {0}")]
    BadContextData(#[from] ContextDataError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Result type alias for Draco operations.
pub type DracoResult<T> = Result<T, DracoError>;

// =============================================================================
// TESTS
// =============================================================================
