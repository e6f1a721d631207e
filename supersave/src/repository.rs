use async_trait::async_trait;
use supersave_core::{BaseEntity, EntityDefinition, Query, Result};
use supersave_query::QueryBuilder;

/// Capability interface both engine repositories realise. One object-safe
/// trait via `async-trait` so the entity manager can hold a homogeneous
/// registry of `Arc<dyn Repository>` regardless of backend — the one place
/// a trait object is warranted, since the registry is heterogeneous only in
/// backend, not in behaviour.
#[async_trait]
pub trait Repository: Send + Sync {
    fn definition(&self) -> &EntityDefinition;

    /// A fresh [`QueryBuilder`] pre-loaded with this entity's
    /// `filterSortFields`.
    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.definition().filter_sort_fields.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<BaseEntity>>;
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<BaseEntity>>;
    async fn get_all(&self) -> Result<Vec<BaseEntity>>;
    async fn get_by_query(&self, query: &Query) -> Result<Vec<BaseEntity>>;
    async fn create(&self, input: BaseEntity) -> Result<BaseEntity>;
    async fn update(&self, id: &str, input: BaseEntity) -> Result<Option<BaseEntity>>;
    async fn delete_using_id(&self, id: &str) -> Result<()>;
}
