//! Aggregation buffers.
//!
//! A [`RecordBuffer`] holds the rows bound for one (schema, table) and
//! renders them into the strings the sink collaborator takes:
//!
//! ```text
//! field_names()         (recvTime,entityId,temperature)
//! typed_field_names()   (recvTime text,entityId text,temperature text)
//! field_values()        ('04/20/2016 07:19:55','Room1','26.5'),(...)
//! ```
//!
//! The `_with` renderers take the sink's identifier quoting.

use std::fmt;

/// A single value. NULL and the empty string are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Text(String),
    Null,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// `None` becomes NULL.
    pub fn from_option(value: Option<&str>) -> Self {
        value.map_or(Cell::Null, Cell::text)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Null => None,
        }
    }

    /// Quoted SQL literal, with embedded single quotes doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Cell::Null => "NULL".to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql_literal())
    }
}

/// Rows for one (schema, table), in aggregation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBuffer {
    schema: String,
    table: String,
    fields: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RecordBuffer {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            fields,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Its width must match the field list.
    pub(crate) fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.fields.len(), "row width must match fields");
        self.rows.push(row);
    }

    /// `(a,b,c)`
    pub fn field_names(&self) -> String {
        self.field_names_with(str::to_string)
    }

    /// `(a text,b text,c text)`
    pub fn typed_field_names(&self, column_type: &str) -> String {
        self.typed_field_names_with(column_type, str::to_string)
    }

    /// [`field_names`](Self::field_names) with every field passed through `quote`.
    pub fn field_names_with(&self, quote: impl Fn(&str) -> String) -> String {
        let names: Vec<String> = self.fields.iter().map(|f| quote(f)).collect();
        format!("({})", names.join(","))
    }

    /// [`typed_field_names`](Self::typed_field_names) with every field passed
    /// through `quote`.
    pub fn typed_field_names_with(&self, column_type: &str, quote: impl Fn(&str) -> String) -> String {
        let typed: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{} {}", quote(f), column_type))
            .collect();
        format!("({})", typed.join(","))
    }

    /// `('v1','v2',NULL),('v3','v4','v5')`
    pub fn field_values(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                let literals: Vec<String> = row.iter().map(Cell::to_sql_literal).collect();
                format!("({})", literals.join(","))
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
