//! Backend profiles.
//!
//! Every sink shares one naming and encoding algorithm. What differs between
//! backends is captured here as plain data: the identifier alphabet, the
//! maximum identifier length and the separator tokens.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between components of a reversibly encoded composite name.
pub const CONCATENATOR: &str = "xffff";

/// Separator between components of a legacy composite name.
pub const LEGACY_SEPARATOR: &str = "_";

// ============================================================================
// BACKEND ENUM
// ============================================================================

/// Persistence backend a sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    PostgreSql,
    MySql,
    Cassandra,
    DynamoDb,
    Hive,
    Hdfs,
    Neo4j,
}

impl Backend {
    /// All supported backends.
    pub const ALL: [Backend; 7] = [
        Backend::PostgreSql,
        Backend::MySql,
        Backend::Cassandra,
        Backend::DynamoDb,
        Backend::Hive,
        Backend::Hdfs,
        Backend::Neo4j,
    ];

    /// Configuration string for this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::PostgreSql => "postgresql",
            Backend::MySql => "mysql",
            Backend::Cassandra => "cassandra",
            Backend::DynamoDb => "dynamodb",
            Backend::Hive => "hive",
            Backend::Hdfs => "hdfs",
            Backend::Neo4j => "neo4j",
        }
    }

    /// Column type used for every aggregated field.
    pub fn text_column_type(&self) -> &'static str {
        match self {
            Backend::Hive => "string",
            _ => "text",
        }
    }

    /// The naming profile for this backend.
    pub fn profile(&self) -> BackendProfile {
        let (max_name_len, alphabet) = match self {
            // NAMEDATALEN - 1
            Backend::PostgreSql => (63, Alphabet::Identifier),
            Backend::MySql => (64, Alphabet::Identifier),
            Backend::Cassandra => (48, Alphabet::Identifier),
            Backend::DynamoDb => (255, Alphabet::IdentifierDotDash),
            Backend::Hive => (128, Alphabet::Identifier),
            Backend::Hdfs => (255, Alphabet::IdentifierDotDash),
            Backend::Neo4j => (255, Alphabet::Identifier),
        };

        BackendProfile {
            backend: *self,
            max_name_len,
            alphabet,
            concatenator: CONCATENATOR,
            legacy_separator: LEGACY_SEPARATOR,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .iter()
            .copied()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownBackend {
                value: s.to_string(),
            })
    }
}

// ============================================================================
// ALPHABET
// ============================================================================

/// Set of characters a backend accepts verbatim in identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// `[A-Za-z0-9_]`
    Identifier,
    /// `[A-Za-z0-9_.-]`
    IdentifierDotDash,
}

impl Alphabet {
    /// Whether `c` may appear verbatim in an identifier.
    pub fn allows(&self, c: char) -> bool {
        match self {
            Alphabet::Identifier => c.is_ascii_alphanumeric() || c == '_',
            Alphabet::IdentifierDotDash => {
                c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
            }
        }
    }
}

// ============================================================================
// PROFILE
// ============================================================================

/// Backend-specific parameters of the shared naming algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendProfile {
    pub backend: Backend,
    /// Maximum identifier length in characters.
    pub max_name_len: usize,
    pub alphabet: Alphabet,
    /// Joins components of reversibly encoded composite names.
    pub concatenator: &'static str,
    /// Joins components of legacy composite names.
    pub legacy_separator: &'static str,
}

impl BackendProfile {
    /// Override the maximum identifier length.
    pub fn with_max_name_len(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }

    /// Whether `c` is accepted verbatim.
    pub fn allows(&self, c: char) -> bool {
        self.alphabet.allows(c)
    }
}
