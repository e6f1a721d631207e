use std::fmt;

/// Crate-wide result alias for this boundary type.
pub type Result<T> = std::result::Result<T, Error>;

/// Raised synchronously at setup time: unknown filter/sort field, invalid
/// generated-column identifier, duplicate registry key, prefix
/// reinitialisation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("field {field:?} is not declared in filterSortFields for this entity")]
    UnknownField { field: String },
    #[error("field name {name:?} is not a valid generated-column identifier")]
    InvalidFieldName { name: String },
    #[error("a repository for {full_name:?} is already registered")]
    DuplicateEntity { full_name: String },
    #[error("no repository registered for {full_name:?}; known collections: {known:?}")]
    UnknownRepository { full_name: String, known: Vec<String> },
    #[error("cannot reinitialise the HTTP prefix: already set to {existing:?}")]
    PrefixAlreadySet { existing: String },
    #[error("migration {name:?} is already registered")]
    DuplicateMigration { name: String },
}

/// Raised while reconciling a table's physical shape with its entity
/// definition; fatal, aborts the `addEntity` call.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("column {column:?} of table {table:?} has an unrecognised physical type {found:?}")]
    UnrecognisedColumnType {
        table: String,
        column: String,
        found: String,
    },
    #[error("table {table:?} has an inconsistent shape after migration: {detail}")]
    InconsistentShape { table: String, detail: String },
    #[error("row {id:?} in table {table:?} failed re-insertion during legacy migration: {source}")]
    LegacyRowRejected {
        table: String,
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Raised at the repository boundary for invalid-JSON-on-legacy-migration;
/// not-found is modelled as `Option`/`None` rather than an error.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("contents of row {id:?} in table {table:?} is not valid JSON: {source}")]
    InvalidContents {
        table: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Sentinel error a hook raises to short-circuit a request with a specific
/// HTTP status. Carries an open status code rather than a fixed set of
/// kinds, defaulting to 500 when the hook doesn't pick one.
#[derive(Debug)]
pub struct HookError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl HookError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    /// The status code to use at the boundary: the declared code, or 500
    /// when absent.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(500)
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook error ({}): {}", self.status(), self.message)
    }
}

impl std::error::Error for HookError {}

/// Umbrella error type returned from fallible public APIs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("database driver error: {0}")]
    Driver(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
