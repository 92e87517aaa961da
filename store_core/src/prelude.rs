//! Convenience re-exports for common store-core usage

// Core traits
pub use crate::traits::{Entity, EntityStore, Record, Relation};

// Error types
pub use crate::errors::StoreError;

// Store and its collaborators
pub use crate::convert::{Converter, IdentityConverter, ReflectConverter};
pub use crate::generic_store::{Store, StoreBuilder};
pub use crate::transaction::{Context, DirectScope, TransactionScope, TxId};

// Query building
pub use crate::params::{Param, Params};
pub use crate::query_builder::{Operator, SortDirection};

// Engines
pub use crate::engine::{Connection, RecordSchema, Row};
pub use crate::memory::{MemoryConnection, MemoryTransactionScope};
pub use crate::postgres::{PgTransactionScope, PostgresConnection};

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;
