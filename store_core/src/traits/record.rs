//! Entity and record capabilities
//!
//! These two traits are the seam between domain code and storage. Usually they are
//! derived:
//!
//! ```ignore
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
//!     #[relation(table = "posts", foreign_key = "author_id")]
//!     pub posts: Vec<PostRecord>,
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Anything with a single identity value.
///
/// `Id::default()` stands for "not yet persisted".
pub trait Entity {
    type Id: Clone + PartialEq + Default + Debug + Serialize + DeserializeOwned + Send + Sync;

    fn id(&self) -> Self::Id;

    fn is_new(&self) -> bool {
        self.id() == Self::Id::default()
    }
}

/// A has-many relation a record can preload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Field on the owning record that receives the related rows
    pub field: &'static str,
    /// Table holding the related rows
    pub table: &'static str,
    /// Column on the related table pointing back at the owner
    pub foreign_key: &'static str,
    /// Column on the owning table the foreign key refers to (usually the primary key)
    pub references: &'static str,
}

/// Storage-facing representation of an entity.
///
/// Field names as serde sees them are the *logical* names used by filters and sorts;
/// [`column_overrides`](Record::column_overrides) renames individual fields, everything
/// else is mapped by converting the field name to snake_case.
pub trait Record:
    Entity + Default + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn table_name() -> &'static str;

    /// Logical name of the identity field
    fn primary_key() -> &'static str {
        "id"
    }

    /// `(field, column)` pairs that deviate from the naming convention
    fn column_overrides() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Relation fields; never written, only filled by preloads
    fn relations() -> &'static [Relation] {
        &[]
    }
}
