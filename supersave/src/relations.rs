use async_trait::async_trait;
use serde_json::Value;
use supersave_core::{BaseEntity, EntityDefinition, Relation, Result};

/// What the base repository needs from the entity manager's registry in
/// order to expand relations on read: a way to resolve one or many ids in
/// another entity's collection, addressed by its `(namespace, name)` full
/// name. Implemented by `crate::registry::Registry`.
///
/// Kept as a narrow trait so the base repository logic stays engine- and
/// registry-agnostic.
#[async_trait]
pub trait RelationSource: Send + Sync {
    async fn get_by_id(&self, full_name: &str, id: &str) -> Result<Option<BaseEntity>>;
    async fn get_by_ids(&self, full_name: &str, ids: &[String]) -> Result<Vec<BaseEntity>>;
}

/// Relation projection on write: replaces each relation field's value with
/// an id-only reference, so only `{id}` (or `[{id}, ...]` for `multiple`) is
/// ever persisted in `contents`.
pub fn simplify_relations(relations: &[Relation], mut input: BaseEntity) -> BaseEntity {
    for relation in relations {
        let Some(value) = input.get(&relation.field).cloned() else {
            continue;
        };
        let simplified = if relation.multiple {
            simplify_multiple(value)
        } else {
            simplify_single(value)
        };
        input.insert(relation.field.clone(), simplified);
    }
    input
}

fn simplify_single(value: Value) -> Value {
    match value {
        Value::String(id) => id_ref(id),
        Value::Object(mut obj) => match obj.remove("id") {
            Some(Value::String(id)) => id_ref(id),
            _ => Value::Object(obj),
        },
        other => other,
    }
}

fn simplify_multiple(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(simplify_single).collect()),
        other => other,
    }
}

fn id_ref(id: String) -> Value {
    let mut obj = serde_json::Map::with_capacity(1);
    obj.insert("id".to_owned(), Value::String(id));
    Value::Object(obj)
}

/// Relation expansion on read: for each relation, resolves the stored
/// id-only reference(s) into the target entity, looked up in the
/// registry by `(entity, namespace)`. Missing targets become `null` for
/// single relations and are dropped (not nulled) for multiple relations,
/// per spec.
pub async fn fill_in_relations(
    def: &EntityDefinition,
    mut entity: BaseEntity,
    source: &dyn RelationSource,
) -> Result<BaseEntity> {
    for relation in &def.relations {
        let Some(value) = entity.get(&relation.field).cloned() else {
            continue;
        };
        let full_name = relation.full_entity_name();
        let expanded = if relation.multiple {
            let ids = extract_ids_multiple(&value);
            let resolved = source.get_by_ids(&full_name, &ids).await?;
            let by_id: std::collections::HashMap<String, BaseEntity> = resolved
                .into_iter()
                .filter_map(|e| e.get("id").and_then(Value::as_str).map(|id| (id.to_owned(), e)))
                .collect();
            Value::Array(
                ids.iter()
                    .filter_map(|id| by_id.get(id).cloned().map(Value::Object))
                    .collect(),
            )
        } else {
            match extract_id_single(&value) {
                Some(id) => match source.get_by_id(&full_name, &id).await? {
                    Some(resolved) => Value::Object(resolved),
                    None => Value::Null,
                },
                None => Value::Null,
            }
        };
        entity.insert(relation.field.clone(), expanded);
    }
    Ok(entity)
}

fn extract_id_single(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

fn extract_ids_multiple(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(extract_id_single).collect(),
        _ => Vec::new(),
    }
}
