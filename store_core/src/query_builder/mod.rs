//! Query construction
//!
//! Params are compiled into scopes, scopes are folded into a [`Query`], and the
//! PostgreSQL engine renders queries with [`SqlGenerator`](sql_generation::SqlGenerator).

pub mod builder;
pub mod filter;
pub mod ordering;
pub mod pagination;
pub mod scope;
pub mod sql_generation;


pub use builder::Query;
pub use filter::{Condition, Operator};
pub use ordering::SortDirection;
pub use pagination::Pagination;
pub use scope::{Scope, ScopeBuilder};
