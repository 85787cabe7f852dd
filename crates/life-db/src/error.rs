use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Boxed source error carried by storage, migration and transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// ValidationError / ValidationErrors
// ---------------------------------------------------------------------------

/// A single field-level validation failure on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"Validation failed at "{}": {}"#, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A collection of one or more `ValidationError`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed:")?;
        for e in &self.0 {
            write!(f, "\n  - {}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("No schema version registered; the store cannot be opened")]
    NoVersions,

    #[error("Schema version {version} must be greater than {previous}")]
    VersionOrder { version: u32, previous: u32 },

    #[error(
        "Invalid {kind} name \"{name}\". Names must start with a letter or underscore \
         and contain only alphanumeric characters and underscores."
    )]
    InvalidName { kind: &'static str, name: String },

    #[error("Table \"{0}\" is declared twice")]
    DuplicateTable(String),

    #[error("Index \"{index}\" already defined on table \"{table}\"")]
    DuplicateIndex { table: String, index: String },

    #[error("Schema v{version} removes or retypes {what} \"{name}\" without a migration")]
    DestructiveChange {
        version: u32,
        what: &'static str,
        name: String,
    },

    #[error("Stored schema version {stored} is newer than the registered version {registered}")]
    Downgrade { stored: u32, registered: u32 },

    #[error("Persisted schema metadata is unreadable: {0}")]
    CorruptMetadata(String),
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {table}/{key}")]
    NotFound { table: String, key: i64 },

    #[error("Write to table \"{table}\" failed: {message}")]
    Write {
        table: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Table \"{0}\" is not declared in the schema")]
    UnknownTable(String),

    #[error("Cannot modify immutable field \"{field}\" on {table}/{key}")]
    ImmutableField {
        table: String,
        key: i64,
        field: String,
    },

    #[error("Records written to \"{table}\" must be JSON objects")]
    NotAnObject { table: String },

    #[error("Storage corruption in {table}/{key}: {message}")]
    Corruption {
        table: String,
        key: i64,
        message: String,
    },

    #[error("Store is closed")]
    Closed,

    #[error("Transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// MigrationError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("Migration to v{to_version} failed for {table}/{key}")]
pub struct MigrationError {
    pub table: String,
    pub key: i64,
    pub to_version: u32,
    #[source]
    pub source: BoxError,
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown index \"{index}\" on table \"{table}\"")]
    UnknownIndex { table: String, index: String },

    #[error("Invalid range on \"{index}\": lower bound is above upper bound")]
    InvertedRange { index: String },

    #[error("Invalid range bound on \"{index}\": {reason}")]
    InvalidBound { index: String, reason: String },

    #[error("Range on table \"{table}\" requires an index")]
    RangeWithoutIndex { table: String },

    #[error("Union query on table \"{table}\" has no branches")]
    EmptyUnion { table: String },
}

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request did not complete (connection, DNS, timeout, ...).
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The request completed and the service reported a logical failure.
    #[error("Remote rejected request ({status}): {payload}")]
    Rejection { status: u16, payload: Value },

    #[error("Malformed remote response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// LifeDbError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LifeDbError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias: the default error type is `LifeDbError`.
pub type Result<T, E = LifeDbError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// ErrorKind / ErrorInfo: cloneable summaries for state holders
// ---------------------------------------------------------------------------

/// Coarse classification of a [`LifeDbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Store unavailable or quota exceeded.
    Write,
    /// Mutation against an absent key.
    NotFound,
    /// Malformed predicate, range or index, or an undeclared table.
    Query,
    /// Remote call failed to complete.
    Transport,
    /// Remote call completed but reported a logical failure.
    RemoteRejection,
    Schema,
    Migration,
    /// Entity invariant broken, or a record shape the store refuses.
    Validation,
    Internal,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnknownTable(_) => ErrorKind::Query,
            Self::ImmutableField { .. } | Self::NotAnObject { .. } => ErrorKind::Validation,
            Self::Corruption { .. } => ErrorKind::Internal,
            Self::Write { .. } | Self::Transaction { .. } | Self::Closed => ErrorKind::Write,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => ErrorKind::Write,
        }
    }
}

impl LifeDbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) => ErrorKind::Schema,
            Self::Storage(e) => e.kind(),
            Self::Migration(_) => ErrorKind::Migration,
            Self::Query(_) => ErrorKind::Query,
            Self::Remote(RemoteError::Rejection { .. }) => ErrorKind::RemoteRejection,
            Self::Remote(_) => ErrorKind::Transport,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Serialization(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Cloneable snapshot of an error, kept in repository state next to the
/// last good data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LifeDbError> for ErrorInfo {
    fn from(e: &LifeDbError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
