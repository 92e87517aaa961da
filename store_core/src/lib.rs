//! Store Core - entity/record mapping and parameter-driven data access
//!
//! This crate holds everything below the facade: the parameter model, field mapping,
//! scope compilation, entity/record conversion, the generic store and the storage
//! engines (in-memory and PostgreSQL).

// Generated code refers to `store_core::...`, including inside this crate's own tests
extern crate self as store_core;

/// Debug logging compiled in only with the `debug-logging` feature
#[cfg(feature = "debug-logging")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod convert;
pub mod engine;
pub mod errors;
pub mod field_map;
pub mod generic_store;
pub mod memory;
pub mod params;
pub mod postgres;
pub mod prelude;
pub mod query_builder;
pub mod traits;
pub mod transaction;
pub mod validation;

pub use convert::{Converter, IdentityConverter, ReflectConverter};
pub use engine::{Connection, RecordSchema, Row};
pub use errors::StoreError;
pub use field_map::{build_field_column_map, FieldColumnMap};
pub use generic_store::{Store, StoreBuilder, DEFAULT_BATCH_SIZE};
pub use memory::{MemoryConnection, MemoryTransactionScope};
pub use params::{Param, Params};
pub use postgres::{PgExecutor, PgTransactionScope, PostgresConnection};
pub use query_builder::{Condition, Operator, Query, Scope, ScopeBuilder, SortDirection};
pub use traits::{Entity, EntityStore, Record, Relation};
pub use transaction::{Context, DirectScope, FinishedTransaction, TransactionScope, TxId};
pub use validation::{IdentifierError, ValidatedIdentifier};

// Used by code the record macros generate
pub use serde;

use sqlx::PgPool;

pub type DbPool = PgPool;
