//! Provisioning cache.
//!
//! Remembers which schemas and tables have already been created in the sink
//! so repeated notifications skip the provisioning round-trips. Each table
//! keeps the fields it was created with, so a later batch can be checked
//! against the columns that actually exist.
//!
//! # Contract
//!
//! The cache is best-effort, not authoritative:
//! - a name present in the cache has been provisioned in the sink
//! - a name absent from the cache may or may not exist; the caller issues an
//!   idempotent "create if not exists" call and then remembers it
//!
//! Entries are never evicted. One instance lives as long as the process and
//! is shared by all persisting workers through an `Arc`.
//!
//! # Example
//!
//! ```
//! use draco_storage::SchemaTableCache;
//!
//! let cache = SchemaTableCache::new();
//! assert!(!cache.has_table("openiot", "room1_room"));
//! let fields = vec!["recvTime".to_string(), "temperature".to_string()];
//! cache.remember_table("openiot", "room1_room", &fields);
//! assert!(cache.has_schema("openiot"));
//! assert!(cache.has_table("openiot", "room1_room"));
//! assert_eq!(cache.table_fields("openiot", "room1_room"), Some(fields));
//! ```

pub mod schema_table;

pub use schema_table::{CacheStats, SchemaTableCache};
