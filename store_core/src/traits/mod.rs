//! Trait definitions
//!
//! Capabilities records and entities provide, and the store surface callers program
//! against.

pub mod entity_store;
pub mod record;

pub use entity_store::EntityStore;
pub use record::{Entity, Record, Relation};
