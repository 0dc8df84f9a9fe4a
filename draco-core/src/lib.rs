//! Draco Core - NGSI event model, identifier encoding and naming
//!
//! Pure, synchronous building blocks shared by every sink:
//! - [`NotificationEvent`] and its entities, attributes and metadata
//! - reversible and legacy identifier encoding ([`encoding`])
//! - schema/table/column naming under a [`DataModel`] ([`build_schema_name`], [`build_table_name`], [`build_column_name`])
//! - per-backend parameters ([`BackendProfile`])
//! - sink configuration ([`SinkConfig`]) and the error taxonomy ([`DracoError`])

pub mod backend;
pub mod config;
pub mod encoding;
pub mod error;
pub mod event;
pub mod naming;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use backend::{Alphabet, Backend, BackendProfile, CONCATENATOR, LEGACY_SEPARATOR};
pub use config::{AttrPersistence, SinkConfig};
pub use encoding::{
    decode, decode_components, encode, encode_legacy, encode_reversible, split_components,
    truncate_service_path, EncodingMode,
};
pub use error::{
    ConfigError, ContextDataError, DracoError, DracoResult, EncodingError, PersistenceError,
};
pub use event::{
    Attribute, Entity, Metadata, NotificationEvent, NotificationHeaders, DEFAULT_SERVICE,
    DEFAULT_SERVICE_PATH,
};
pub use naming::{
    build_column_name, build_metadata_column_name, build_schema_name, build_table_name, DataModel,
    NamingPolicy, METADATA_SUFFIX,
};
