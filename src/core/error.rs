use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No such element: {0}")]
    NoSuchElement(String),
    #[error("Storage I/O error: {0}")]
    StorageIo(String),
    #[error("Transaction {0} aborted: {1}")]
    TransactionAborted(u64, String),
    #[error("Table '{0}' not found")]
    TableNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl DatabaseError {
    /// Errors that must abort the running operator tree without retry
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::TransactionAborted(..))
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
