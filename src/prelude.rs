//! Convenience re-exports for common FlexStore usage
//!
//! This prelude module re-exports the most commonly used items from the FlexStore crates,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use flexstore::prelude::*;
//!
//! let params = Params::from([Param::gt("age", 18), Param::limit(10)]);
//! assert!(params.has_filters());
//! ```

// Core FlexStore components
pub use crate::core::FlexStore;
pub use crate::errors::FlexStoreError;

// Re-export centralized config
pub use config::{AppConfig, ConfigError, DatabaseConfig, StoreSettings};

// Traits, store, params, engines and transactions
pub use store_core::prelude::*;

// Re-export store_core for macro-generated code
pub use store_core;

// Re-export record derive for model creation
pub use record_derive::{Record, record_model};

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;

// Commonly used sqlx types
pub use sqlx::{PgPool, Postgres, Transaction};
