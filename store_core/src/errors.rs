use crate::validation::IdentifierError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No matching row in {table}")]
    NotFound { table: String },

    #[error("{operation} on {table} requires at least one filter")]
    MissingWhereClause { table: String, operation: String },

    #[error("Unknown relation '{relation}' on {table}")]
    UnknownRelation { table: String, relation: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("Record type {record} exposes no mappable fields")]
    NoMappableFields { record: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error during {operation} on {table}: {source}")]
    Database {
        table: String,
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction {0} is not active")]
    TransactionNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    pub fn database_operation(table: &str, operation: &str, source: sqlx::Error) -> Self {
        Self::Database {
            table: table.to_string(),
            operation: operation.to_string(),
            source,
        }
    }

    pub fn not_found(table: &str) -> Self {
        Self::NotFound {
            table: table.to_string(),
        }
    }

    pub fn missing_where(table: &str, operation: &str) -> Self {
        Self::MissingWhereClause {
            table: table.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Whether the engine reported "no matching row" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => true,
            StoreError::Database { source, .. } => matches!(source, sqlx::Error::RowNotFound),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
