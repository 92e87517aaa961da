//! # FlexStore
//!
//! Parameter-driven data access for Rust: domain entities are mapped to storage records,
//! callers describe what they want with a list of `Param`s using logical field names,
//! and a generic store turns that into calls on a pluggable engine (PostgreSQL or
//! in-memory).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flexstore::prelude::*;
//!
//! #[record_model]
//! #[record(table = "users")]
//! pub struct UserRecord {
//!     #[primary_key]
//!     pub id: i64,
//!
//!     #[column(name = "full_name")]
//!     pub name: String,
//!
//!     pub email: String,
//! }
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: i64,
//!     pub name: String,
//!     pub email: String,
//! }
//!
//! impl Entity for User {
//!     type Id = i64;
//!
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let flex = FlexStore::new(AppConfig::load()?).await?;
//!     let users = flex.store::<User, UserRecord>()?;
//!
//!     let ctx = Context::new();
//!     let id = users
//!         .create(&ctx, &User { name: "Ada".into(), email: "ada@example.com".into(), ..Default::default() })
//!         .await?;
//!
//!     let adults = users
//!         .list(&ctx, &Params::from([Param::eq("name", "Ada"), Param::desc("id"), Param::limit(10)]))
//!         .await?;
//!     println!("created {id}, found {}", adults.len());
//!
//!     // transactional work
//!     let tx = flex.begin(&ctx).await?;
//!     users.delete(&tx, &Params::from([Param::eq("id", id)])).await?;
//!     flex.rollback(&tx).await?;
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::FlexStore;
pub use crate::errors::FlexStoreError;

// Re-export centralized config
pub use config::{AppConfig, ConfigError, DatabaseConfig, StoreSettings};

// Re-export internal crates used by macros and public API
// These MUST be public for the generated macro code to work correctly
pub use record_derive;
pub use store_core;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
