//! Draco Test Utilities
//!
//! Centralized test infrastructure for the Draco workspace:
//! - Proptest generators for notifications, entities and naming policies
//! - Test fixtures for common scenarios
//! - Custom assertions for Draco-specific validation

// Re-export the in-memory sink from its source crate
pub use draco_storage::{MockSink, SinkCall};

// Re-export core types for convenience
pub use draco_core::{
    Alphabet, Attribute, AttrPersistence, Backend, BackendProfile, ConfigError, ContextDataError,
    DataModel, DracoError, DracoResult, Entity, Metadata, NamingPolicy, NotificationEvent,
    NotificationHeaders, PersistenceError, SinkConfig, Timestamp,
};
pub use draco_storage::{NotificationPersister, SchemaTableCache};

use chrono::Utc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Draco event types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a Timestamp (DateTime<Utc>) with millisecond precision.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2015-2030
        (1_420_070_400_000i64..1_893_456_000_000i64).prop_map(|millis| {
            chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
        })
    }

    /// Identifier-ish text, including characters every backend rejects.
    pub fn arb_raw_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_x/.# ñ-]{1,16}"
    }

    /// Any non-empty text, including astral-plane characters.
    pub fn arb_unicode_name() -> impl Strategy<Value = String> {
        prop::collection::vec(any::<char>(), 1..12).prop_map(|chars| chars.into_iter().collect())
    }

    /// Fiware service name.
    pub fn arb_service() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    /// A single absolute service path, never the root.
    pub fn arb_service_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9_]{1,8}", 1..3)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    pub fn arb_metadata() -> impl Strategy<Value = Metadata> {
        ("[a-z]{1,8}", "[A-Z][a-z]{0,7}", "[a-zA-Z0-9 ]{0,8}")
            .prop_map(|(name, md_type, value)| Metadata::new(name, md_type, value))
    }

    /// Attribute with distinct metadata names.
    pub fn arb_attribute() -> impl Strategy<Value = Attribute> {
        (
            "[a-z][a-zA-Z0-9]{0,9}",
            prop_oneof![Just("Float"), Just("Integer"), Just("Text")],
            "[a-zA-Z0-9.' ]{0,12}",
            prop::collection::btree_map("[a-z]{1,8}", arb_metadata(), 0..3),
        )
            .prop_map(|(name, attr_type, value, metadata)| {
                let attribute = Attribute::new(name, attr_type, value);
                if metadata.is_empty() {
                    attribute
                } else {
                    attribute.with_metadata(
                        metadata
                            .into_iter()
                            .map(|(name, md)| Metadata::new(name, md.md_type, md.value))
                            .collect(),
                    )
                }
            })
    }

    /// Entity with distinct attribute names (possibly none).
    pub fn arb_entity() -> impl Strategy<Value = Entity> {
        (
            "[A-Za-z0-9:]{1,10}",
            "[A-Z][a-z]{0,7}",
            prop::collection::btree_map("[a-z][a-zA-Z0-9]{0,9}", arb_attribute(), 0..5),
        )
            .prop_map(|(id, entity_type, attributes)| {
                let mut entity = Entity::new(id, entity_type);
                for (name, mut attribute) in attributes {
                    attribute.name = name;
                    entity.attributes.push(attribute);
                }
                entity
            })
    }

    /// Valid notification: one to four entities under one service path.
    pub fn arb_notification() -> impl Strategy<Value = NotificationEvent> {
        (
            arb_service(),
            arb_service_path(),
            prop::collection::vec(arb_entity(), 1..5),
            arb_timestamp(),
        )
            .prop_map(|(service, service_path, entities, creation_time)| {
                NotificationEvent::new(service, service_path, entities)
                    .with_creation_time(creation_time)
            })
    }

    pub fn arb_backend() -> impl Strategy<Value = Backend> {
        prop::sample::select(Backend::ALL.to_vec())
    }

    pub fn arb_data_model() -> impl Strategy<Value = DataModel> {
        prop_oneof![Just(DataModel::ByServicePath), Just(DataModel::ByEntity)]
    }

    pub fn arb_attr_persistence() -> impl Strategy<Value = AttrPersistence> {
        prop_oneof![Just(AttrPersistence::Row), Just(AttrPersistence::Column)]
    }

    /// Any naming policy over any backend profile.
    pub fn arb_naming_policy() -> impl Strategy<Value = NamingPolicy> {
        (arb_data_model(), arb_backend(), any::<bool>(), any::<bool>()).prop_map(
            |(data_model, backend, encoding, lowercase)| {
                NamingPolicy::new(data_model, backend.profile())
                    .with_encoding(encoding)
                    .with_lowercase(lowercase)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    /// NGSIv2 notification with two rooms, one attribute carrying metadata.
    pub const NOTIFICATION_JSON: &str = r#"{
        "subscriptionId": "51c0ac9ed714fb3b37d7d5a8",
        "data": [
            {
                "id": "Room1",
                "type": "Room",
                "temperature": {
                    "type": "Float",
                    "value": 26.5,
                    "metadata": {
                        "accuracy": {"type": "Float", "value": 0.8}
                    }
                },
                "pressure": {"type": "Integer", "value": 763, "metadata": {}}
            },
            {
                "id": "Room2",
                "type": "Room",
                "temperature": {"type": "Float", "value": 21.1, "metadata": {}},
                "pressure": {"type": "Integer", "value": 760, "metadata": {}}
            }
        ]
    }"#;

    /// 2016-04-20T07:19:55.801Z
    pub const CREATION_MILLIS: i64 = 1_461_136_795_801;

    pub fn creation_time() -> Timestamp {
        chrono::DateTime::from_timestamp_millis(CREATION_MILLIS).unwrap_or_else(Utc::now)
    }

    pub fn headers() -> NotificationHeaders {
        NotificationHeaders::new()
            .with_service("openiot")
            .with_service_path("/4wheels")
            .with_correlator("1cbf8e54-9f4a-4b51-b3ad-6f6c0d6a0f3e")
    }

    /// [`NOTIFICATION_JSON`] parsed under [`headers`].
    pub fn sample_notification() -> DracoResult<NotificationEvent> {
        NotificationEvent::parse(NOTIFICATION_JSON, &headers(), creation_time())
    }

    /// A room with `temperature` and `pressure`.
    pub fn room(id: &str) -> Entity {
        Entity::new(id, "Room")
            .with_attribute(Attribute::new("temperature", "Float", "26.5"))
            .with_attribute(Attribute::new("pressure", "Integer", "763"))
    }

    /// Notification under `openiot` at the fixture creation time.
    pub fn notification(service_path: &str, entities: Vec<Entity>) -> NotificationEvent {
        NotificationEvent::new("openiot", service_path, entities).with_creation_time(creation_time())
    }

    /// Persister over a fresh cache and mock sink.
    pub fn mock_persister(
        policy: NamingPolicy,
        mode: AttrPersistence,
    ) -> (NotificationPersister, Arc<MockSink>, Arc<SchemaTableCache>) {
        let sink = Arc::new(MockSink::new());
        let cache = Arc::new(SchemaTableCache::new());
        let persister = NotificationPersister::new(policy, mode, cache.clone(), sink.clone());
        (persister, sink, cache)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Draco-specific validation.

    use super::*;

    /// Assert that a DracoResult is a BadConfiguration error.
    #[track_caller]
    pub fn assert_bad_configuration<T: std::fmt::Debug>(result: &DracoResult<T>) {
        match result {
            Err(DracoError::BadConfiguration(_)) => {}
            other => panic!("Expected BadConfiguration error, got: {:?}", other),
        }
    }

    /// Assert that a DracoResult is a BadContextData error.
    #[track_caller]
    pub fn assert_bad_context_data<T: std::fmt::Debug>(result: &DracoResult<T>) {
        match result {
            Err(DracoError::BadContextData(_)) => {}
            other => panic!("Expected BadContextData error, got: {:?}", other),
        }
    }

    /// Assert that a DracoResult is a Persistence error.
    #[track_caller]
    pub fn assert_persistence_error<T: std::fmt::Debug>(result: &DracoResult<T>) {
        match result {
            Err(DracoError::Persistence(_)) => {}
            other => panic!("Expected Persistence error, got: {:?}", other),
        }
    }

    /// Assert that `name` fits the profile's length limit and alphabet.
    #[track_caller]
    pub fn assert_name_fits_profile(name: &str, profile: &BackendProfile) {
        let len = name.chars().count();
        assert!(
            len <= profile.max_name_len,
            "Name '{}' has {} chars, {} allows {}",
            name,
            len,
            profile.backend,
            profile.max_name_len
        );
        if let Some(bad) = name.chars().find(|c| !profile.allows(*c)) {
            panic!("Name '{}' contains {:?}, not allowed by {}", name, bad, profile.backend);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sample_notification_fixture() {
        let event = fixtures::sample_notification().unwrap();
        assert_eq!(event.service, "openiot");
        assert_eq!(event.service_path, "/4wheels");
        assert_eq!(event.entities.len(), 2);
        assert_eq!(event.entities[0].attributes[0].name, "temperature");
        assert_eq!(event.entities[0].attributes[0].value, "26.5");
        assert_eq!(event.creation_time.timestamp_millis(), fixtures::CREATION_MILLIS);
    }

    #[test]
    fn test_room_fixture() {
        let room = fixtures::room("Room1");
        assert!(room.has_attributes());
        assert_eq!(room.attributes.len(), 2);
    }

    #[test]
    fn test_mock_persister_fixture() {
        let policy = NamingPolicy::new(DataModel::ByEntity, Backend::MySql.profile());
        let (persister, sink, cache) = fixtures::mock_persister(policy, AttrPersistence::Row);

        persister
            .persist(&fixtures::notification("/4wheels", vec![fixtures::room("Room1")]))
            .unwrap();
        assert_eq!(sink.insert_count(), 1);
        assert_eq!(cache.stats().tables, 1);
    }

    #[test]
    fn test_assertions() {
        let config: DracoResult<()> = Err(ConfigError::RootServicePathNotAllowed.into());
        assertions::assert_bad_configuration(&config);

        let data: DracoResult<()> = Err(ContextDataError::EmptyEntityList.into());
        assertions::assert_bad_context_data(&data);

        assertions::assert_name_fits_profile("openiot_room1", &Backend::PostgreSql.profile());
    }

    #[test]
    #[should_panic]
    fn test_name_fit_rejects_disallowed_char() {
        assertions::assert_name_fits_profile("4wheels.room", &Backend::PostgreSql.profile());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_notifications_validate(event in generators::arb_notification()) {
            prop_assert!(event.validate().is_ok());
        }

        #[test]
        fn prop_generated_entities_have_distinct_attributes(entity in generators::arb_entity()) {
            let mut names: Vec<&str> = entity.attributes.iter().map(|a| a.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), entity.attributes.len());
        }
    }
}
