use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record stored by a collection. Any JSON object carrying a stable string
/// `id` qualifies; an empty `id` means "to be assigned" by the repository on
/// `create`.
pub type BaseEntity = Map<String, Value>;

/// Declarative definition of an entity, as handed to `addEntity`.
///
/// This is the single source of truth the entity manager uses to derive a
/// table name, create the backing table, run the schema synchronizer and
/// bind a repository — see `supersave::manager::EntityManager::add_entity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    /// Entity name; slugified to derive the physical table name.
    pub name: String,
    /// Optional namespace, joined with `name` when deriving the table name
    /// and the registry key.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Default shape merged under a fetched row before relations are
    /// expanded and `id` is overlaid.
    #[serde(default)]
    pub template: BaseEntity,
    /// Relations to other entities, serialized as `{id}` references.
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Fields that are materialized as generated, indexed columns and that
    /// may be used to filter or sort. `id` is implicitly filterable/sortable
    /// and need not be listed here.
    #[serde(default)]
    pub filter_sort_fields: IndexMap<String, FieldKind>,
}

impl EntityDefinition {
    /// Registry / table-name key: `namespace_name` when namespaced, else
    /// just `name`.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}_{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A typed linkage from one entity field to another entity's rows.
///
/// Non-multiple relations serialize as `{"id": "..."}`; multiple relations
/// serialize as `[{"id": "..."}, ...]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Attribute name on the owning entity.
    pub field: String,
    /// Target entity name.
    pub entity: String,
    /// Target entity namespace, if namespaced.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Whether the field holds an array of references rather than a single
    /// reference.
    #[serde(default)]
    pub multiple: bool,
}

impl Relation {
    pub fn full_entity_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}_{}", self.entity),
            None => self.entity.clone(),
        }
    }
}

/// The three JSON-derived kinds a `filterSortField` (or implicit `id`
/// field) can take. Drives both the generated-column SQL type (see
/// `supersave::sync`) and coercion at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
}
