//! Schema, table and column naming.
//!
//! Names are derived from the notification's service, service path and
//! entity under a [`DataModel`]:
//!
//! | data model           | encoding | table name                                   |
//! |----------------------|----------|----------------------------------------------|
//! | `dm-by-service-path` | off      | `somePath`                                   |
//! | `dm-by-service-path` | on       | `x002fsomePath`                              |
//! | `dm-by-entity`       | off      | `somePath_someId_someType`                   |
//! | `dm-by-entity`       | on       | `x002fsomePathxffffsomeIdxffffsomeType`      |
//!
//! Lowercasing is a final pass on schema and table names; the length check
//! comes last and never truncates.
//!
//! Column-mode attribute columns go through the same encoder and length
//! check, but keep their case, like the fixed `recvTime`/`entityId` columns.

use crate::encoding::{
    encode, encode_legacy, encode_reversible, truncate_service_path, EncodingMode,
};
use crate::{BackendProfile, ConfigError, DracoResult, Entity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DATA MODEL
// ============================================================================

/// How tables are laid out per schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataModel {
    /// One table per service path.
    ByServicePath,
    /// One table per (service path, entity id, entity type).
    ByEntity,
}

impl DataModel {
    /// Configuration string for this data model.
    pub fn as_config_str(&self) -> &'static str {
        match self {
            DataModel::ByServicePath => "dm-by-service-path",
            DataModel::ByEntity => "dm-by-entity",
        }
    }
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_config_str())
    }
}

impl FromStr for DataModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dm-by-service-path" => Ok(DataModel::ByServicePath),
            "dm-by-entity" => Ok(DataModel::ByEntity),
            other => Err(ConfigError::UnknownDataModel {
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// NAMING POLICY
// ============================================================================

/// Immutable naming configuration for one sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingPolicy {
    pub data_model: DataModel,
    pub encoding_enabled: bool,
    pub lowercase: bool,
    pub profile: BackendProfile,
}

impl NamingPolicy {
    /// Policy with encoding and lowercasing disabled.
    pub fn new(data_model: DataModel, profile: BackendProfile) -> Self {
        Self {
            data_model,
            encoding_enabled: false,
            lowercase: false,
            profile,
        }
    }

    pub fn with_encoding(mut self, enabled: bool) -> Self {
        self.encoding_enabled = enabled;
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn encoding_mode(&self) -> EncodingMode {
        EncodingMode::from_enabled(self.encoding_enabled)
    }
}

// ============================================================================
// NAME BUILDING
// ============================================================================

/// Schema (database, keyspace) name for a service.
pub fn build_schema_name(service: &str, policy: &NamingPolicy) -> DracoResult<String> {
    let name = match policy.encoding_mode() {
        EncodingMode::Reversible => encode_reversible(service, &policy.profile),
        EncodingMode::Legacy => encode_legacy(service, &policy.profile),
    };
    finish_name("schema", name, policy)
}

/// Table name for an entity notified under `service_path`.
pub fn build_table_name(
    service_path: &str,
    entity: &Entity,
    policy: &NamingPolicy,
) -> DracoResult<String> {
    let profile = &policy.profile;

    let name = match (policy.data_model, policy.encoding_mode()) {
        (DataModel::ByServicePath, EncodingMode::Reversible) => {
            encode_reversible(service_path, profile)
        }
        (DataModel::ByServicePath, EncodingMode::Legacy) => {
            if service_path == "/" {
                return Err(ConfigError::RootServicePathNotAllowed.into());
            }
            truncate_service_path(service_path, profile)
        }
        (DataModel::ByEntity, EncodingMode::Reversible) => [
            encode_reversible(service_path, profile),
            encode_reversible(&entity.id, profile),
            encode_reversible(&entity.entity_type, profile),
        ]
        .join(profile.concatenator),
        (DataModel::ByEntity, EncodingMode::Legacy) => {
            let truncated = truncate_service_path(service_path, profile);
            let mut parts = Vec::with_capacity(3);
            if !truncated.is_empty() {
                parts.push(truncated);
            }
            parts.push(encode_legacy(&entity.id, profile));
            parts.push(encode_legacy(&entity.entity_type, profile));
            parts.join(profile.legacy_separator)
        }
    };

    finish_name("table", name, policy)
}

/// Suffix of the metadata column paired with each attribute column.
pub const METADATA_SUFFIX: &str = "_md";

/// Column holding an attribute's value in column mode.
pub fn build_column_name(attribute: &str, policy: &NamingPolicy) -> DracoResult<String> {
    let name = encode(attribute, policy.encoding_mode(), &policy.profile);
    check_name("column", name, policy)
}

/// Column holding an attribute's metadata in column mode: the encoded
/// attribute name plus [`METADATA_SUFFIX`].
pub fn build_metadata_column_name(attribute: &str, policy: &NamingPolicy) -> DracoResult<String> {
    let mut name = encode(attribute, policy.encoding_mode(), &policy.profile);
    if name.is_empty() {
        return check_name("column", name, policy);
    }
    name.push_str(METADATA_SUFFIX);
    check_name("column", name, policy)
}

/// Lowercase if requested, then enforce the backend length limit.
fn finish_name(component: &str, name: String, policy: &NamingPolicy) -> DracoResult<String> {
    let name = if policy.lowercase {
        name.to_lowercase()
    } else {
        name
    };
    check_name(component, name, policy)
}

/// Reject empty names and names over the backend length limit.
fn check_name(component: &str, name: String, policy: &NamingPolicy) -> DracoResult<String> {
    if name.is_empty() {
        return Err(ConfigError::EmptyName {
            component: component.to_string(),
        }
        .into());
    }

    let len = name.chars().count();
    if len > policy.profile.max_name_len {
        return Err(ConfigError::NameTooLong {
            component: component.to_string(),
            name,
            len,
            max: policy.profile.max_name_len,
            backend: policy.profile.backend.to_string(),
        }
        .into());
    }

    Ok(name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Backend, DracoError};

    fn entity() -> Entity {
        Entity::new("someId", "someType")
    }

    fn policy(data_model: DataModel, encoding: bool) -> NamingPolicy {
        NamingPolicy::new(data_model, Backend::PostgreSql.profile()).with_encoding(encoding)
    }

    #[test]
    fn test_by_service_path_without_encoding() {
        let name = build_table_name("/somePath", &entity(), &policy(DataModel::ByServicePath, false));
        assert_eq!(name.unwrap(), "somePath");
    }

    #[test]
    fn test_by_service_path_with_encoding() {
        let name = build_table_name("/somePath", &entity(), &policy(DataModel::ByServicePath, true));
        assert_eq!(name.unwrap(), "x002fsomePath");
    }

    #[test]
    fn test_by_entity_without_encoding() {
        let name = build_table_name("/somePath", &entity(), &policy(DataModel::ByEntity, false));
        assert_eq!(name.unwrap(), "somePath_someId_someType");
    }

    #[test]
    fn test_by_entity_with_encoding() {
        let name = build_table_name("/somePath", &entity(), &policy(DataModel::ByEntity, true));
        assert_eq!(name.unwrap(), "x002fsomePathxffffsomeIdxffffsomeType");
    }

    #[test]
    fn test_root_path_by_service_path_without_encoding_is_fatal() {
        let err = build_table_name("/", &entity(), &policy(DataModel::ByServicePath, false));
        assert_eq!(
            err,
            Err(DracoError::BadConfiguration(ConfigError::RootServicePathNotAllowed))
        );
    }

    #[test]
    fn test_root_path_by_service_path_with_encoding() {
        let name = build_table_name("/", &entity(), &policy(DataModel::ByServicePath, true));
        assert_eq!(name.unwrap(), "x002f");
    }

    #[test]
    fn test_root_path_by_entity_omits_path_segment() {
        let name = build_table_name("/", &entity(), &policy(DataModel::ByEntity, false));
        assert_eq!(name.unwrap(), "someId_someType");

        let name = build_table_name("/", &entity(), &policy(DataModel::ByEntity, true));
        assert_eq!(name.unwrap(), "x002fxffffsomeIdxffffsomeType");
    }

    #[test]
    fn test_legacy_substitutes_inside_parts() {
        let entity = Entity::new("urn:room:1", "Room");
        let name = build_table_name("/a/b", &entity, &policy(DataModel::ByEntity, false));
        assert_eq!(name.unwrap(), "a_b_urn_room_1_Room");
    }

    #[test]
    fn test_schema_name() {
        let p = policy(DataModel::ByEntity, false);
        assert_eq!(build_schema_name("openiot", &p).unwrap(), "openiot");
        assert_eq!(build_schema_name("open-iot", &p).unwrap(), "open_iot");

        let p = policy(DataModel::ByEntity, true);
        assert_eq!(build_schema_name("open-iot", &p).unwrap(), "openx002diot");
    }

    #[test]
    fn test_schema_name_too_long() {
        let service = "s".repeat(90);
        let p = NamingPolicy::new(DataModel::ByEntity, Backend::MySql.profile());
        let err = build_schema_name(&service, &p).unwrap_err();
        assert_eq!(
            err,
            DracoError::BadConfiguration(ConfigError::NameTooLong {
                component: "schema".to_string(),
                name: service,
                len: 90,
                max: 64,
                backend: "mysql".to_string(),
            })
        );
    }

    #[test]
    fn test_table_name_too_long_after_encoding() {
        // 30 slashes encode to 150 characters.
        let path = "/".repeat(30);
        let err = build_table_name(&path, &entity(), &policy(DataModel::ByServicePath, true));
        assert!(matches!(
            err,
            Err(DracoError::BadConfiguration(ConfigError::NameTooLong { len: 150, max: 63, .. }))
        ));
    }

    #[test]
    fn test_name_at_limit_is_accepted() {
        let p = NamingPolicy::new(DataModel::ByEntity, Backend::MySql.profile());
        assert!(build_schema_name(&"s".repeat(64), &p).is_ok());
    }

    #[test]
    fn test_lowercase_is_final_pass() {
        let p = policy(DataModel::ByEntity, true).with_lowercase(true);
        let name = build_table_name("/somePath", &entity(), &p).unwrap();
        assert_eq!(name, "x002fsomepathxffffsomeidxffffsometype");
        assert_eq!(build_schema_name("OpenIoT", &p).unwrap(), "openiot");
    }

    #[test]
    fn test_empty_service_is_rejected() {
        let err = build_schema_name("", &policy(DataModel::ByEntity, false));
        assert_eq!(
            err,
            Err(DracoError::BadConfiguration(ConfigError::EmptyName {
                component: "schema".to_string()
            }))
        );
    }

    #[test]
    fn test_column_name_legacy_substitutes_punctuation() {
        let p = policy(DataModel::ByServicePath, false);
        assert_eq!(
            build_column_name("t text);DROP SCHEMA openiot;--", &p).unwrap(),
            "t_text__DROP_SCHEMA_openiot___"
        );
        assert_eq!(build_column_name("temperature", &p).unwrap(), "temperature");
    }

    #[test]
    fn test_column_name_reversible_escapes_punctuation() {
        let p = policy(DataModel::ByServicePath, true);
        assert_eq!(build_column_name("a b", &p).unwrap(), "ax0020b");
        assert_eq!(build_metadata_column_name("a b", &p).unwrap(), "ax0020b_md");
    }

    #[test]
    fn test_column_name_keeps_case() {
        let p = policy(DataModel::ByEntity, false).with_lowercase(true);
        assert_eq!(build_column_name("pressureMax", &p).unwrap(), "pressureMax");
    }

    #[test]
    fn test_column_name_too_long() {
        let attribute = "a".repeat(100);
        let err = build_column_name(&attribute, &policy(DataModel::ByEntity, false)).unwrap_err();
        assert_eq!(
            err,
            DracoError::BadConfiguration(ConfigError::NameTooLong {
                component: "column".to_string(),
                name: attribute,
                len: 100,
                max: 63,
                backend: "postgresql".to_string(),
            })
        );
    }

    #[test]
    fn test_metadata_column_suffix_counts_towards_limit() {
        let p = policy(DataModel::ByEntity, false);
        let attribute = "a".repeat(62);
        assert!(build_column_name(&attribute, &p).is_ok());
        assert!(matches!(
            build_metadata_column_name(&attribute, &p),
            Err(DracoError::BadConfiguration(ConfigError::NameTooLong { len: 65, .. }))
        ));
    }

    #[test]
    fn test_empty_column_name_is_rejected() {
        let p = policy(DataModel::ByEntity, true);
        assert!(matches!(
            build_metadata_column_name("", &p),
            Err(DracoError::BadConfiguration(ConfigError::EmptyName { .. }))
        ));
    }

    #[test]
    fn test_data_model_parse() {
        assert_eq!("dm-by-service-path".parse::<DataModel>().unwrap(), DataModel::ByServicePath);
        assert_eq!("dm-by-entity".parse::<DataModel>().unwrap(), DataModel::ByEntity);

        let err = "dm-by-attribute".parse::<DataModel>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("dm-by-service-path") && msg.contains("dm-by-entity"));
    }

    #[test]
    fn test_data_model_display_roundtrip() {
        for model in [DataModel::ByServicePath, DataModel::ByEntity] {
            assert_eq!(model.to_string().parse::<DataModel>().unwrap(), model);
        }
    }
}
