use serde_json::Value;
use supersave_core::{BaseEntity, EntityDefinition, Error};

use crate::relations::{fill_in_relations, RelationSource};

/// Turns a physical `(id, contents)` row into the entity the caller sees:
/// parse `contents`, merge it over `template`'s defaults, expand relations,
/// then overlay the authoritative `id` column.
pub async fn hydrate(
    def: &EntityDefinition,
    id: &str,
    contents: &BaseEntity,
    source: &dyn RelationSource,
) -> Result<BaseEntity, Error> {
    let mut merged = def.template.clone();
    for (key, value) in contents {
        merged.insert(key.clone(), value.clone());
    }
    let mut merged = fill_in_relations(def, merged, source).await?;
    merged.insert("id".to_owned(), Value::String(id.to_owned()));
    Ok(merged)
}
