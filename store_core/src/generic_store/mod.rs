//! Generic store
//!
//! [`Store`] implements [`EntityStore`](crate::traits::EntityStore) for any entity and
//! record pair on top of a transaction scope.

pub mod core;
pub mod entity_store;


pub use self::core::{Store, StoreBuilder, DEFAULT_BATCH_SIZE};
