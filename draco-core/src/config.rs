//! Sink configuration.
//!
//! Loaded from TOML. String-valued policy fields are kept as strings until
//! [`SinkConfig::naming_policy`] / [`SinkConfig::attr_persistence`] resolve
//! them, so an unknown value is reported with the accepted alternatives.
//!
//! ```toml
//! backend = "postgresql"
//! data_model = "dm-by-entity"
//! attr_persistence = "row"
//! enable_encoding = true
//! enable_lowercase = false
//! ```

use crate::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// ATTRIBUTE PERSISTENCE
// ============================================================================

/// How attributes become records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrPersistence {
    /// One record per attribute.
    Row,
    /// One record per entity, two columns per attribute.
    Column,
}

impl AttrPersistence {
    pub fn as_config_str(&self) -> &'static str {
        match self {
            AttrPersistence::Row => "row",
            AttrPersistence::Column => "column",
        }
    }
}

impl fmt::Display for AttrPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_config_str())
    }
}

impl FromStr for AttrPersistence {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "row" => Ok(AttrPersistence::Row),
            "column" => Ok(AttrPersistence::Column),
            _ => Err(ConfigError::UnknownAttrPersistence {
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// SINK CONFIG
// ============================================================================

fn default_data_model() -> String {
    DataModel::ByEntity.as_config_str().to_string()
}

fn default_attr_persistence() -> String {
    AttrPersistence::Row.as_config_str().to_string()
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_service_path() -> String {
    DEFAULT_SERVICE_PATH.to_string()
}

/// Configuration of one sink instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    pub backend: Backend,
    #[serde(default = "default_data_model")]
    pub data_model: String,
    #[serde(default = "default_attr_persistence")]
    pub attr_persistence: String,
    #[serde(default)]
    pub enable_encoding: bool,
    #[serde(default)]
    pub enable_lowercase: bool,
    /// Overrides the backend's identifier length limit.
    #[serde(default)]
    pub max_name_len: Option<usize>,
    #[serde(default = "default_service")]
    pub default_service: String,
    #[serde(default = "default_service_path")]
    pub default_service_path: String,
}

impl SinkConfig {
    /// Configuration with every optional field at its default.
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            data_model: default_data_model(),
            attr_persistence: default_attr_persistence(),
            enable_encoding: false,
            enable_lowercase: false,
            max_name_len: None,
            default_service: default_service(),
            default_service_path: default_service_path(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> DracoResult<Self> {
        let config: SinkConfig = toml::from_str(s).map_err(|e| ConfigError::Unparsable {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> DracoResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - data_model and attr_persistence are known values
    /// - max_name_len, when set, is positive
    /// - default_service_path starts with '/'
    pub fn validate(&self) -> DracoResult<()> {
        self.naming_policy()?;
        self.attr_persistence()?;

        if self.max_name_len == Some(0) {
            return Err(DracoError::BadConfiguration(ConfigError::InvalidValue {
                field: "max_name_len".to_string(),
                value: "0".to_string(),
                reason: "max_name_len must be greater than 0".to_string(),
            }));
        }

        if !self.default_service_path.starts_with('/') {
            return Err(DracoError::BadConfiguration(ConfigError::InvalidValue {
                field: "default_service_path".to_string(),
                value: self.default_service_path.clone(),
                reason: "service paths must start with '/'".to_string(),
            }));
        }

        Ok(())
    }

    /// Resolve the naming policy.
    pub fn naming_policy(&self) -> Result<NamingPolicy, ConfigError> {
        let data_model: DataModel = self.data_model.parse()?;
        let mut profile = self.backend.profile();
        if let Some(max) = self.max_name_len {
            profile = profile.with_max_name_len(max);
        }

        Ok(NamingPolicy::new(data_model, profile)
            .with_encoding(self.enable_encoding)
            .with_lowercase(self.enable_lowercase))
    }

    /// Resolve the attribute persistence mode.
    pub fn attr_persistence(&self) -> Result<AttrPersistence, ConfigError> {
        self.attr_persistence.parse()
    }
}

// =============================================================================
// TESTS
// =============================================================================
