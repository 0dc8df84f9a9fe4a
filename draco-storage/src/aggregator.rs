//! Row and column aggregation.
//!
//! An aggregator accumulates the entities bound for one (schema, table) into
//! a [`RecordBuffer`]. The strategy is chosen once per notification from
//! [`AttrPersistence`].
//!
//! Row mode, one record per attribute:
//!
//! ```text
//! recvTimeTs | recvTime | fiwareServicePath | entityId | entityType | attrName | attrType | attrValue | attrMd
//! ```
//!
//! Column mode, one record per entity:
//!
//! ```text
//! recvTime | fiwareServicePath | entityId | entityType | <attr> | <attr>_md | ...
//! ```
//!
//! Attribute columns are named through the [`NamingPolicy`], so they carry
//! the same alphabet and length guarantees as schema and table names.

use crate::{Cell, RecordBuffer};
use draco_core::{
    build_column_name, build_metadata_column_name, AttrPersistence, ContextDataError, DracoResult,
    Entity, NamingPolicy, NotificationEvent, Timestamp,
};

/// `recvTime` layout: `MM/dd/yyyy HH:mm:ss`, UTC.
pub const RECV_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Row-mode fields, fixed regardless of the entity's attributes.
pub const ROW_FIELDS: [&str; 9] = [
    "recvTimeTs",
    "recvTime",
    "fiwareServicePath",
    "entityId",
    "entityType",
    "attrName",
    "attrType",
    "attrValue",
    "attrMd",
];

/// Column-mode fields preceding the attribute columns.
pub const COLUMN_BASE_FIELDS: [&str; 4] = ["recvTime", "fiwareServicePath", "entityId", "entityType"];

/// Format a creation time as `recvTime`.
pub fn format_recv_time(time: &Timestamp) -> String {
    time.format(RECV_TIME_FORMAT).to_string()
}

// ============================================================================
// ROW AGGREGATOR
// ============================================================================

/// One record per attribute.
#[derive(Debug, Clone)]
pub struct RowAggregator {
    buffer: RecordBuffer,
}

impl RowAggregator {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        let fields = ROW_FIELDS.iter().map(|f| f.to_string()).collect();
        Self {
            buffer: RecordBuffer::new(schema, table, fields),
        }
    }

    /// Append one row per attribute of `entity`. Returns the rows appended.
    pub fn aggregate(
        &mut self,
        event: &NotificationEvent,
        entity: &Entity,
        service_path: &str,
    ) -> usize {
        if !entity.has_attributes() {
            tracing::debug!(
                entity_id = %entity.id,
                entity_type = %entity.entity_type,
                "No attributes within the notified entity, nothing is done"
            );
            return 0;
        }

        let recv_time_ts = event.creation_time.timestamp_millis().to_string();
        let recv_time = format_recv_time(&event.creation_time);

        for attribute in &entity.attributes {
            tracing::debug!(
                entity_id = %entity.id,
                attr_name = %attribute.name,
                attr_type = %attribute.attr_type,
                "Processing attribute"
            );

            self.buffer.push_row(vec![
                Cell::text(recv_time_ts.as_str()),
                Cell::text(recv_time.as_str()),
                Cell::text(service_path),
                Cell::text(entity.id.as_str()),
                Cell::text(entity.entity_type.as_str()),
                Cell::text(attribute.name.as_str()),
                Cell::text(attribute.attr_type.as_str()),
                Cell::text(attribute.value.as_str()),
                Cell::from_option(attribute.metadata_or_null()),
            ]);
        }

        entity.attributes.len()
    }

    pub fn buffer(&self) -> &RecordBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> RecordBuffer {
        self.buffer
    }
}

// ============================================================================
// COLUMN AGGREGATOR
// ============================================================================

/// One record per entity.
///
/// The column layout is fixed by the first aggregated entity. A later entity
/// whose attributes are a subset of the layout gets NULL for the missing
/// ones; an entity carrying an attribute outside the layout is rejected.
#[derive(Debug, Clone)]
pub struct ColumnAggregator {
    schema: String,
    table: String,
    policy: NamingPolicy,
    state: Option<ColumnLayout>,
}

/// Attribute columns fixed by the initializing entity, and the rows so far.
#[derive(Debug, Clone)]
struct ColumnLayout {
    /// Raw attribute names, matched against later entities.
    attributes: Vec<String>,
    buffer: RecordBuffer,
}

impl ColumnLayout {
    fn from_entity(
        schema: &str,
        table: &str,
        entity: &Entity,
        policy: &NamingPolicy,
    ) -> DracoResult<Self> {
        let mut attributes: Vec<String> = Vec::with_capacity(entity.attributes.len());
        for attribute in &entity.attributes {
            if !attributes.contains(&attribute.name) {
                attributes.push(attribute.name.clone());
            }
        }

        let mut fields: Vec<String> = COLUMN_BASE_FIELDS.iter().map(|f| f.to_string()).collect();
        for name in &attributes {
            for column in [
                build_column_name(name, policy)?,
                build_metadata_column_name(name, policy)?,
            ] {
                if fields.contains(&column) {
                    return Err(ContextDataError::DuplicateColumn {
                        table: table.to_string(),
                        column,
                    }
                    .into());
                }
                fields.push(column);
            }
        }

        tracing::debug!(table = %table, columns = fields.len(), "Initialized column layout");

        Ok(Self {
            attributes,
            buffer: RecordBuffer::new(schema, table, fields),
        })
    }
}

impl ColumnAggregator {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, policy: NamingPolicy) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            policy,
            state: None,
        }
    }

    /// Attribute names of the layout, once initialized.
    pub fn layout(&self) -> Option<&[String]> {
        self.state.as_ref().map(|s| s.attributes.as_slice())
    }

    /// Append one row for `entity`. Returns the rows appended (always 1).
    pub fn aggregate(
        &mut self,
        event: &NotificationEvent,
        entity: &Entity,
        service_path: &str,
    ) -> DracoResult<usize> {
        let state = match &mut self.state {
            Some(state) => state,
            empty => empty.insert(ColumnLayout::from_entity(
                &self.schema,
                &self.table,
                entity,
                &self.policy,
            )?),
        };

        if let Some(extra) = entity
            .attributes
            .iter()
            .find(|a| !state.attributes.contains(&a.name))
        {
            return Err(ContextDataError::ColumnLayoutMismatch {
                table: self.table.clone(),
                entity_id: entity.id.clone(),
                attribute: extra.name.clone(),
            }
            .into());
        }

        if !entity.has_attributes() {
            tracing::debug!(
                entity_id = %entity.id,
                entity_type = %entity.entity_type,
                "No attributes within the notified entity, only base columns are written"
            );
        }

        let mut row = Vec::with_capacity(state.buffer.fields().len());
        row.push(Cell::text(format_recv_time(&event.creation_time)));
        row.push(Cell::text(service_path));
        row.push(Cell::text(entity.id.as_str()));
        row.push(Cell::text(entity.entity_type.as_str()));

        for name in &state.attributes {
            match entity.attributes.iter().find(|a| &a.name == name) {
                Some(attribute) => {
                    row.push(Cell::text(attribute.value.as_str()));
                    row.push(Cell::from_option(attribute.metadata_or_null()));
                }
                None => {
                    row.push(Cell::Null);
                    row.push(Cell::Null);
                }
            }
        }

        state.buffer.push_row(row);
        Ok(1)
    }

    pub fn buffer(&self) -> Option<&RecordBuffer> {
        self.state.as_ref().map(|s| &s.buffer)
    }

    /// The buffer, or an empty base-column buffer when nothing was aggregated.
    pub fn into_buffer(self) -> RecordBuffer {
        match self.state {
            Some(state) => state.buffer,
            None => {
                let fields = COLUMN_BASE_FIELDS.iter().map(|f| f.to_string()).collect();
                RecordBuffer::new(self.schema, self.table, fields)
            }
        }
    }
}

// ============================================================================
// STRATEGY
// ============================================================================

/// Aggregation strategy for one (schema, table).
#[derive(Debug, Clone)]
pub enum Aggregator {
    Row(RowAggregator),
    Column(ColumnAggregator),
}

impl Aggregator {
    pub fn new(
        mode: AttrPersistence,
        schema: impl Into<String>,
        table: impl Into<String>,
        policy: NamingPolicy,
    ) -> Self {
        match mode {
            AttrPersistence::Row => Aggregator::Row(RowAggregator::new(schema, table)),
            AttrPersistence::Column => {
                Aggregator::Column(ColumnAggregator::new(schema, table, policy))
            }
        }
    }

    pub fn mode(&self) -> AttrPersistence {
        match self {
            Aggregator::Row(_) => AttrPersistence::Row,
            Aggregator::Column(_) => AttrPersistence::Column,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Aggregator::Row(agg) => agg.buffer.table(),
            Aggregator::Column(agg) => &agg.table,
        }
    }

    pub fn aggregate(
        &mut self,
        event: &NotificationEvent,
        entity: &Entity,
        service_path: &str,
    ) -> DracoResult<usize> {
        match self {
            Aggregator::Row(agg) => Ok(agg.aggregate(event, entity, service_path)),
            Aggregator::Column(agg) => agg.aggregate(event, entity, service_path),
        }
    }

    pub fn into_buffer(self) -> RecordBuffer {
        match self {
            Aggregator::Row(agg) => agg.into_buffer(),
            Aggregator::Column(agg) => agg.into_buffer(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use draco_core::{Attribute, Backend, ConfigError, DataModel, DracoError, Metadata};

    fn policy(encoding: bool) -> NamingPolicy {
        NamingPolicy::new(DataModel::ByEntity, Backend::PostgreSql.profile()).with_encoding(encoding)
    }

    fn event(entities: Vec<Entity>) -> NotificationEvent {
        NotificationEvent::new("openiot", "/4wheels", entities)
            .with_creation_time(Utc.timestamp_millis_opt(1_461_136_795_801).unwrap())
    }

    fn room() -> Entity {
        Entity::new("Room1", "Room")
            .with_attribute(
                Attribute::new("temperature", "Float", "26.5")
                    .with_metadata(vec![Metadata::new("accuracy", "Float", "0.8")]),
            )
            .with_attribute(Attribute::new("pressure", "Integer", "763"))
    }

    #[test]
    fn test_recv_time_format() {
        let time = Utc.timestamp_millis_opt(1_461_136_795_801).unwrap();
        assert_eq!(format_recv_time(&time), "04/20/2016 07:19:55");
    }

    #[test]
    fn test_row_one_row_per_attribute() {
        let entity = room();
        let event = event(vec![entity.clone()]);
        let mut agg = RowAggregator::new("openiot", "room1_room");

        assert_eq!(agg.aggregate(&event, &entity, "/4wheels"), 2);

        let buffer = agg.into_buffer();
        assert_eq!(buffer.fields().len(), 9);
        assert_eq!(buffer.row_count(), 2);
        assert_eq!(
            buffer.rows()[0],
            vec![
                Cell::text("1461136795801"),
                Cell::text("04/20/2016 07:19:55"),
                Cell::text("/4wheels"),
                Cell::text("Room1"),
                Cell::text("Room"),
                Cell::text("temperature"),
                Cell::text("Float"),
                Cell::text("26.5"),
                Cell::text(r#"[{"name":"accuracy","type":"Float","value":"0.8"}]"#),
            ]
        );
        assert_eq!(buffer.rows()[1][5], Cell::text("pressure"));
        assert_eq!(buffer.rows()[1][8], Cell::Null);
    }

    #[test]
    fn test_row_typed_fields_are_fixed() {
        let agg = RowAggregator::new("s", "t");
        assert_eq!(
            agg.buffer().typed_field_names("text"),
            "(recvTimeTs text,recvTime text,fiwareServicePath text,entityId text,entityType text,\
             attrName text,attrType text,attrValue text,attrMd text)"
        );
    }

    #[test]
    fn test_row_no_attributes_is_noop() {
        let entity = Entity::new("Room1", "Room");
        let event = event(vec![entity.clone()]);
        let mut agg = RowAggregator::new("openiot", "room1_room");

        assert_eq!(agg.aggregate(&event, &entity, "/4wheels"), 0);
        assert!(agg.buffer().is_empty());
    }

    #[test]
    fn test_row_accumulates_across_entities() {
        let first = room();
        let second = Entity::new("Room1", "Room").with_attribute(Attribute::new("humidity", "Float", "40"));
        let event = event(vec![first.clone(), second.clone()]);
        let mut agg = RowAggregator::new("openiot", "room1_room");

        agg.aggregate(&event, &first, "/4wheels");
        agg.aggregate(&event, &second, "/4wheels");

        let names: Vec<&str> = agg
            .buffer()
            .rows()
            .iter()
            .filter_map(|row| row[5].as_text())
            .collect();
        assert_eq!(names, vec!["temperature", "pressure", "humidity"]);
    }

    #[test]
    fn test_column_one_row_per_entity() {
        let entity = room();
        let event = event(vec![entity.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        assert_eq!(agg.aggregate(&event, &entity, "/4wheels").unwrap(), 1);

        let buffer = agg.into_buffer();
        assert_eq!(
            buffer.field_names(),
            "(recvTime,fiwareServicePath,entityId,entityType,temperature,temperature_md,pressure,pressure_md)"
        );
        assert_eq!(buffer.row_count(), 1);
        assert_eq!(
            buffer.rows()[0],
            vec![
                Cell::text("04/20/2016 07:19:55"),
                Cell::text("/4wheels"),
                Cell::text("Room1"),
                Cell::text("Room"),
                Cell::text("26.5"),
                Cell::text(r#"[{"name":"accuracy","type":"Float","value":"0.8"}]"#),
                Cell::text("763"),
                Cell::Null,
            ]
        );
    }

    #[test]
    fn test_column_no_attributes_writes_base_columns() {
        let entity = Entity::new("Room1", "Room");
        let event = event(vec![entity.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        agg.aggregate(&event, &entity, "/4wheels").unwrap();
        let buffer = agg.into_buffer();
        assert_eq!(buffer.fields().len(), 4);
        assert_eq!(buffer.rows()[0].len(), 4);
    }

    #[test]
    fn test_column_missing_attribute_is_null() {
        let first = room();
        let second = Entity::new("Room1", "Room").with_attribute(Attribute::new("pressure", "Integer", "760"));
        let event = event(vec![first.clone(), second.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        agg.aggregate(&event, &first, "/4wheels").unwrap();
        agg.aggregate(&event, &second, "/4wheels").unwrap();

        let buffer = agg.into_buffer();
        assert_eq!(buffer.row_count(), 2);
        assert_eq!(&buffer.rows()[1][4..], &[Cell::Null, Cell::Null, Cell::text("760"), Cell::Null]);
    }

    #[test]
    fn test_column_extra_attribute_is_rejected() {
        let first = room();
        let second = room().with_attribute(Attribute::new("humidity", "Float", "40"));
        let event = event(vec![first.clone(), second.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        agg.aggregate(&event, &first, "/4wheels").unwrap();
        let err = agg.aggregate(&event, &second, "/4wheels").unwrap_err();
        assert_eq!(
            err,
            DracoError::BadContextData(ContextDataError::ColumnLayoutMismatch {
                table: "room1_room".to_string(),
                entity_id: "Room1".to_string(),
                attribute: "humidity".to_string(),
            })
        );
        assert_eq!(agg.buffer().map(RecordBuffer::row_count), Some(1));
    }

    #[test]
    fn test_column_attribute_order_follows_layout() {
        let first = room();
        let second = Entity::new("Room1", "Room")
            .with_attribute(Attribute::new("pressure", "Integer", "761"))
            .with_attribute(Attribute::new("temperature", "Float", "20"));
        let event = event(vec![first.clone(), second.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        agg.aggregate(&event, &first, "/4wheels").unwrap();
        agg.aggregate(&event, &second, "/4wheels").unwrap();

        let row = &agg.buffer().unwrap().rows()[1];
        assert_eq!(row[4], Cell::text("20"));
        assert_eq!(row[6], Cell::text("761"));
    }

    #[test]
    fn test_strategy_dispatch() {
        let entity = room();
        let event = event(vec![entity.clone()]);

        let mut row = Aggregator::new(AttrPersistence::Row, "openiot", "t", policy(false));
        assert_eq!(row.mode(), AttrPersistence::Row);
        assert_eq!(row.aggregate(&event, &entity, "/").unwrap(), 2);

        let mut column = Aggregator::new(AttrPersistence::Column, "openiot", "t", policy(false));
        assert_eq!(column.mode(), AttrPersistence::Column);
        assert_eq!(column.table(), "t");
        assert_eq!(column.aggregate(&event, &entity, "/").unwrap(), 1);

        let extra = room().with_attribute(Attribute::new("x", "T", "v"));
        assert!(matches!(
            column.aggregate(&event, &extra, "/"),
            Err(DracoError::BadContextData(ContextDataError::ColumnLayoutMismatch { .. }))
        ));
    }

    #[test]
    fn test_column_names_are_encoded() {
        let entity = Entity::new("Room1", "Room")
            .with_attribute(Attribute::new("t text);DROP SCHEMA openiot;--", "Text", "x"));
        let event = event(vec![entity.clone()]);

        let mut legacy = ColumnAggregator::new("openiot", "room1_room", policy(false));
        legacy.aggregate(&event, &entity, "/4wheels").unwrap();
        assert_eq!(
            legacy.buffer().unwrap().fields()[4..],
            ["t_text__DROP_SCHEMA_openiot___", "t_text__DROP_SCHEMA_openiot____md"]
        );
        assert_eq!(
            legacy.layout().unwrap(),
            ["t text);DROP SCHEMA openiot;--".to_string()]
        );

        let mut reversible = ColumnAggregator::new("openiot", "room1_room", policy(true));
        reversible.aggregate(&event, &entity, "/4wheels").unwrap();
        let fields = reversible.buffer().unwrap().fields();
        assert!(fields[4].starts_with("tx0020tex0078t"));
        assert!(fields[4..].iter().all(|f| f.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')));
    }

    #[test]
    fn test_column_name_over_backend_limit_is_rejected() {
        let entity = Entity::new("Room1", "Room").with_attribute(Attribute::new("a".repeat(100), "Float", "1"));
        let event = event(vec![entity.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        let err = agg.aggregate(&event, &entity, "/4wheels").unwrap_err();
        assert!(matches!(
            err,
            DracoError::BadConfiguration(ConfigError::NameTooLong { len: 100, max: 63, .. })
        ));
        assert!(agg.buffer().is_none());
    }

    #[test]
    fn test_metadata_suffix_collision_is_rejected() {
        let entity = Entity::new("Room1", "Room")
            .with_attribute(Attribute::new("a", "Float", "1"))
            .with_attribute(Attribute::new("a_md", "Text", "2"));
        let event = event(vec![entity.clone()]);
        let mut agg = ColumnAggregator::new("openiot", "room1_room", policy(false));

        let err = agg.aggregate(&event, &entity, "/4wheels").unwrap_err();
        assert_eq!(
            err,
            DracoError::BadContextData(ContextDataError::DuplicateColumn {
                table: "room1_room".to_string(),
                column: "a_md".to_string(),
            })
        );
    }

    #[test]
    fn test_legacy_encoding_collision_is_rejected() {
        let entity = Entity::new("Room1", "Room")
            .with_attribute(Attribute::new("a.b", "Float", "1"))
            .with_attribute(Attribute::new("a-b", "Float", "2"));
        let event = event(vec![entity.clone()]);

        let mut legacy = ColumnAggregator::new("openiot", "room1_room", policy(false));
        assert!(matches!(
            legacy.aggregate(&event, &entity, "/4wheels"),
            Err(DracoError::BadContextData(ContextDataError::DuplicateColumn { .. }))
        ));

        let mut reversible = ColumnAggregator::new("openiot", "room1_room", policy(true));
        assert_eq!(reversible.aggregate(&event, &entity, "/4wheels").unwrap(), 1);
    }
}
