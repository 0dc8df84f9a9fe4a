//! NGSI notification event model.
//!
//! A [`NotificationEvent`] is built once per inbound notification and is
//! read-only afterwards. Attribute order is the order of the notification
//! body; `serde_json` is built with `preserve_order` so parsing keeps it.

use crate::{ContextDataError, DracoResult, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Service used when the notification carries no `fiware-service` header.
pub const DEFAULT_SERVICE: &str = "default";

/// Service path used when the notification carries no `fiware-servicepath` header.
pub const DEFAULT_SERVICE_PATH: &str = "/";

/// Separator of the multi-path `fiware-servicepath` form.
const SERVICE_PATH_SEPARATOR: char = ',';

// ============================================================================
// METADATA / ATTRIBUTE / ENTITY
// ============================================================================

/// Attribute metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(rename = "type")]
    pub md_type: String,
    pub value: String,
}

impl Metadata {
    pub fn new(
        name: impl Into<String>,
        md_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            md_type: md_type.into(),
            value: value.into(),
        }
    }
}

/// Entity attribute with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: String,
    pub metadata: Vec<Metadata>,
    /// Serialized metadata, written verbatim by the aggregators. Empty when
    /// there is no metadata.
    pub metadata_raw: String,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        attr_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            attr_type: attr_type.into(),
            value: value.into(),
            metadata: Vec::new(),
            metadata_raw: String::new(),
        }
    }

    /// Attach metadata, serializing it into `metadata_raw`.
    pub fn with_metadata(mut self, metadata: Vec<Metadata>) -> Self {
        self.metadata_raw = serialize_metadata(
            metadata
                .iter()
                .map(|md| (md.name.as_str(), md.md_type.as_str(), Value::from(md.value.as_str()))),
        );
        self.metadata = metadata;
        self
    }

    /// `None` when there is no metadata; the sink writes NULL for it.
    pub fn metadata_or_null(&self) -> Option<&str> {
        if self.metadata.is_empty() {
            None
        } else {
            Some(&self.metadata_raw)
        }
    }
}

/// Context entity. Identity is the (id, type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub attributes: Vec<Attribute>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

fn serialize_metadata<'a>(entries: impl Iterator<Item = (&'a str, &'a str, Value)>) -> String {
    let array: Vec<Value> = entries
        .map(|(name, md_type, value)| {
            let mut obj = Map::new();
            obj.insert("name".to_string(), Value::from(name));
            obj.insert("type".to_string(), Value::from(md_type));
            obj.insert("value".to_string(), value);
            Value::Object(obj)
        })
        .collect();

    if array.is_empty() {
        String::new()
    } else {
        Value::Array(array).to_string()
    }
}

// ============================================================================
// NOTIFICATION EVENT
// ============================================================================

/// Transport headers accompanying a notification body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationHeaders {
    pub service: Option<String>,
    pub service_path: Option<String>,
    pub correlator: Option<String>,
}

impl NotificationHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_service_path(mut self, service_path: impl Into<String>) -> Self {
        self.service_path = Some(service_path.into());
        self
    }

    pub fn with_correlator(mut self, correlator: impl Into<String>) -> Self {
        self.correlator = Some(correlator.into());
        self
    }

    /// Fill absent service headers with the given defaults.
    pub fn or_defaults(mut self, service: &str, service_path: &str) -> Self {
        self.service.get_or_insert_with(|| service.to_string());
        self.service_path
            .get_or_insert_with(|| service_path.to_string());
        self
    }
}

/// A parsed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub creation_time: Timestamp,
    pub service: String,
    /// Either one path for every entity, or a comma-separated list with one
    /// path per entity.
    pub service_path: String,
    pub entities: Vec<Entity>,
    pub correlator_id: String,
    pub subscription_id: Option<String>,
}

impl NotificationEvent {
    /// Create an event stamped with the current time and a fresh correlator.
    pub fn new(
        service: impl Into<String>,
        service_path: impl Into<String>,
        entities: Vec<Entity>,
    ) -> Self {
        Self {
            creation_time: Utc::now(),
            service: service.into(),
            service_path: service_path.into(),
            entities,
            correlator_id: Uuid::now_v7().to_string(),
            subscription_id: None,
        }
    }

    pub fn with_creation_time(mut self, creation_time: Timestamp) -> Self {
        self.creation_time = creation_time;
        self
    }

    pub fn with_correlator_id(mut self, correlator_id: impl Into<String>) -> Self {
        self.correlator_id = correlator_id.into();
        self
    }

    /// Parse an NGSIv2 notification body.
    ///
    /// Absent service headers fall back to [`DEFAULT_SERVICE`] and
    /// [`DEFAULT_SERVICE_PATH`]; an absent correlator gets a fresh UUIDv7.
    pub fn parse(
        body: &str,
        headers: &NotificationHeaders,
        creation_time: Timestamp,
    ) -> DracoResult<Self> {
        let root: Value = serde_json::from_str(body).map_err(|e| ContextDataError::Malformed {
            reason: e.to_string(),
        })?;

        let data = root
            .get("data")
            .ok_or_else(|| ContextDataError::MissingField {
                field: "data".to_string(),
            })?
            .as_array()
            .ok_or_else(|| ContextDataError::Malformed {
                reason: "data must be an array".to_string(),
            })?;

        let entities = data
            .iter()
            .enumerate()
            .map(|(index, raw)| parse_entity(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let event = Self {
            creation_time,
            service: headers
                .service
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            service_path: headers
                .service_path
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE_PATH.to_string()),
            entities,
            correlator_id: headers
                .correlator
                .clone()
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            subscription_id: root
                .get("subscriptionId")
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        event.validate()?;

        tracing::debug!(
            correlator = %event.correlator_id,
            service = %event.service,
            service_path = %event.service_path,
            entities = event.entities.len(),
            "Parsed notification"
        );

        Ok(event)
    }

    /// Check the entity list and the service path header.
    pub fn validate(&self) -> Result<(), ContextDataError> {
        if self.entities.is_empty() {
            return Err(ContextDataError::EmptyEntityList);
        }

        let paths = self.service_paths();
        if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ContextDataError::InvalidServicePath {
                path: bad.to_string(),
            });
        }

        if paths.len() != 1 && paths.len() != self.entities.len() {
            return Err(ContextDataError::ServicePathCountMismatch {
                paths: paths.len(),
                entities: self.entities.len(),
            });
        }

        Ok(())
    }

    /// The service path header split into its comma-separated paths.
    pub fn service_paths(&self) -> Vec<&str> {
        self.service_path
            .split(SERVICE_PATH_SEPARATOR)
            .map(str::trim)
            .collect()
    }

    /// Entities paired with their service paths, in notification order.
    ///
    /// A single path applies to every entity; otherwise there must be one
    /// path per entity.
    pub fn entities_with_paths(&self) -> Result<Vec<(&Entity, &str)>, ContextDataError> {
        let paths = self.service_paths();
        match paths.as_slice() {
            [single] => Ok(self.entities.iter().map(|e| (e, *single)).collect()),
            many if many.len() == self.entities.len() => {
                Ok(self.entities.iter().zip(many.iter().copied()).collect())
            }
            many => Err(ContextDataError::ServicePathCountMismatch {
                paths: many.len(),
                entities: self.entities.len(),
            }),
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Stringify an NGSI value: strings are taken as-is, anything else as compact JSON.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn required_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, ContextDataError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ContextDataError::MissingField {
            field: format!("{}.{}", path, key),
        })
}

fn parse_entity(index: usize, raw: &Value) -> Result<Entity, ContextDataError> {
    let path = format!("data[{}]", index);
    let obj = raw.as_object().ok_or_else(|| ContextDataError::Malformed {
        reason: format!("{} must be an object", path),
    })?;

    let mut entity = Entity::new(
        required_str(obj, "id", &path)?,
        required_str(obj, "type", &path)?,
    );

    for (name, raw_attr) in obj {
        if name == "id" || name == "type" {
            continue;
        }
        entity
            .attributes
            .push(parse_attribute(&format!("{}.{}", path, name), name, raw_attr)?);
    }

    Ok(entity)
}

fn parse_attribute(path: &str, name: &str, raw: &Value) -> Result<Attribute, ContextDataError> {
    let obj = raw.as_object().ok_or_else(|| ContextDataError::Malformed {
        reason: format!("{} must be an object", path),
    })?;

    let attr_type = required_str(obj, "type", path)?;
    let value = obj.get("value").map(value_to_string).unwrap_or_default();

    let raw_metadata = match obj.get("metadata") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(md)) => md
            .iter()
            .map(|(md_name, md_raw)| -> Result<(String, String, Value), ContextDataError> {
                let md_path = format!("{}.metadata.{}", path, md_name);
                let md_obj = md_raw.as_object().ok_or_else(|| ContextDataError::Malformed {
                    reason: format!("{} must be an object", md_path),
                })?;
                let md_type = required_str(md_obj, "type", &md_path)?;
                let md_value = md_obj.get("value").cloned().unwrap_or(Value::Null);
                Ok((md_name.clone(), md_type, md_value))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ContextDataError::Malformed {
                reason: format!("{}.metadata must be an object", path),
            })
        }
    };

    let metadata_raw = serialize_metadata(
        raw_metadata
            .iter()
            .map(|(n, t, v)| (n.as_str(), t.as_str(), v.clone())),
    );
    let metadata = raw_metadata
        .iter()
        .map(|(n, t, v)| Metadata::new(n.clone(), t.clone(), value_to_string(v)))
        .collect();

    Ok(Attribute {
        name: name.to_string(),
        attr_type,
        value,
        metadata,
        metadata_raw,
    })
}

// ============================================================================
// TESTS
// ============================================================================
