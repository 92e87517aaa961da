use crate::errors::StoreError;
use crate::params::Params;
use crate::traits::Entity;
use crate::transaction::Context;
use async_trait::async_trait;

/// Data access for one entity type.
///
/// Every operation runs on the connection the store's transaction scope resolves for
/// `ctx`, and gives up with [`StoreError::Cancelled`] or [`StoreError::DeadlineExceeded`]
/// when the context ends first.
#[async_trait]
pub trait EntityStore<E>: Send + Sync
where
    E: Entity + Send + Sync,
{
    /// First entity matching `params`.
    ///
    /// A missing row is *not* an error: the result is `E::default()`. Use
    /// [`find`](Self::find) or check [`Entity::is_new`] to tell the two apart.
    async fn get(&self, ctx: &Context, params: &Params) -> Result<E, StoreError>;

    /// First entity matching `params`, `None` when there is none
    async fn find(&self, ctx: &Context, params: &Params) -> Result<Option<E>, StoreError>;

    async fn list(&self, ctx: &Context, params: &Params) -> Result<Vec<E>, StoreError>;

    /// Rows the query selects, limit and offset included. A page's params give the size
    /// of that page; pass [`Params::without_pagination`] for the total.
    async fn count(&self, ctx: &Context, params: &Params) -> Result<u64, StoreError>;

    async fn exists(&self, ctx: &Context, params: &Params) -> Result<bool, StoreError>;

    /// Insert one entity and return its id (generated when the entity had none)
    async fn create(&self, ctx: &Context, entity: &E) -> Result<E::Id, StoreError>;

    /// Insert in batches, preserving order. Batches already written stay written when a
    /// later one fails.
    async fn create_many(&self, ctx: &Context, entities: &[E]) -> Result<Vec<E::Id>, StoreError>;

    /// Overwrite every non-key column, zero values included.
    ///
    /// Without params the row is selected by the entity's id, which then must not be the
    /// default. With params, the params alone select the rows.
    async fn update(&self, ctx: &Context, entity: &E, params: &Params)
        -> Result<u64, StoreError>;

    /// Write only the columns whose value is not the zero value
    async fn partial_update(
        &self,
        ctx: &Context,
        entity: &E,
        params: &Params,
    ) -> Result<u64, StoreError>;

    /// Remove the rows `params` select; at least one filter is required
    async fn delete(&self, ctx: &Context, params: &Params) -> Result<u64, StoreError>;
}
