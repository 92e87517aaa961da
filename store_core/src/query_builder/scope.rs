//! Scopes and the parameter → scope compiler

use crate::field_map::FieldColumnMap;
use crate::params::{Param, Params};
use crate::query_builder::builder::Query;
use crate::query_builder::filter::Condition;
use crate::query_builder::ordering::SortDirection;
use std::sync::Arc;

/// One composable modification of a [`Query`]
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Where(Condition),
    Order {
        column: String,
        direction: SortDirection,
    },
    Limit(u64),
    Offset(u64),
    Preload(String),
}

impl Scope {
    pub fn apply(&self, query: &mut Query) {
        match self {
            Scope::Where(condition) => query.conditions.push(condition.clone()),
            Scope::Order { column, direction } => {
                query.order_by.push((column.clone(), *direction))
            }
            Scope::Limit(n) => query.pagination.limit = Some(*n),
            Scope::Offset(n) => query.pagination.offset = Some(*n),
            Scope::Preload(relation) => query.preloads.push(relation.clone()),
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, Scope::Where(_))
    }
}

/// Compiles [`Params`] into [`Scope`]s for one record type.
///
/// Output order: every `Where` first in input order, then the shaping scopes (order,
/// limit, offset, preload) in input order. Only the last `Limit` and the last `Offset`
/// are kept, each at the position it was given. Filter and sort fields missing from the
/// column map are passed through unresolved.
#[derive(Debug, Clone)]
pub struct ScopeBuilder {
    field_map: Arc<FieldColumnMap>,
}

impl ScopeBuilder {
    pub fn new(field_map: Arc<FieldColumnMap>) -> Self {
        Self { field_map }
    }

    pub fn field_map(&self) -> &FieldColumnMap {
        &self.field_map
    }

    pub fn build(&self, params: &Params) -> Vec<Scope> {
        let last_limit = params
            .iter()
            .rposition(|p| matches!(p, Param::Limit(_)));
        let last_offset = params
            .iter()
            .rposition(|p| matches!(p, Param::Offset(_)));

        let mut filters = Vec::new();
        let mut shaping = Vec::new();

        for (idx, param) in params.iter().enumerate() {
            match param {
                Param::Filter {
                    field,
                    operator,
                    value,
                } => filters.push(Scope::Where(Condition::new(
                    self.field_map.resolve(field),
                    *operator,
                    value.clone(),
                ))),
                Param::Sort { field, direction } => shaping.push(Scope::Order {
                    column: self.field_map.resolve(field).to_string(),
                    direction: *direction,
                }),
                Param::Limit(n) if Some(idx) == last_limit => shaping.push(Scope::Limit(*n)),
                Param::Offset(n) if Some(idx) == last_offset => shaping.push(Scope::Offset(*n)),
                Param::Limit(_) | Param::Offset(_) => {}
                Param::Preload(relation) => shaping.push(Scope::Preload(relation.clone())),
            }
        }

        filters.extend(shaping);
        filters
    }

    /// Compile and fold in one step
    pub fn query(&self, params: &Params) -> Query {
        Query::from_scopes(&self.build(params))
    }
}
