//! The base query scopes are folded into

use crate::query_builder::filter::{Condition, Operator};
use crate::query_builder::ordering::SortDirection;
use crate::query_builder::pagination::Pagination;
use crate::query_builder::scope::Scope;
use serde_json::Value;

/// Engine-facing description of what to select.
///
/// Conditions are AND-ed. Engines only ever see a `Query`, never the caller's params.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub(crate) conditions: Vec<Condition>,
    pub(crate) order_by: Vec<(String, SortDirection)>,
    pub(crate) pagination: Pagination,
    pub(crate) preloads: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `scopes` in sequence to an empty query
    pub fn from_scopes(scopes: &[Scope]) -> Self {
        scopes.iter().fold(Self::new(), |mut query, scope| {
            scope.apply(&mut query);
            query
        })
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq(self, column: &str, value: Value) -> Self {
        self.filter(Condition::new(column, Operator::Eq, value))
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = Some(offset);
        self
    }

    pub fn preload(mut self, relation: &str) -> Self {
        self.preloads.push(relation.to_string());
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn ordering(&self) -> &[(String, SortDirection)] {
        &self.order_by
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }
}
