use indexmap::IndexMap;
use supersave_core::{ConfigError, FieldKind};

/// The set of fields a query may filter or sort on for one entity:
/// the entity's declared `filterSortFields`, plus the implicit `id`.
#[derive(Debug, Clone)]
pub struct FieldTable(IndexMap<String, FieldKind>);

impl FieldTable {
    pub fn new(mut fields: IndexMap<String, FieldKind>) -> Self {
        fields.entry("id".to_owned()).or_insert(FieldKind::String);
        Self(fields)
    }

    pub fn check(&self, field: &str) -> Result<FieldKind, ConfigError> {
        self.0
            .get(field)
            .copied()
            .ok_or_else(|| ConfigError::UnknownField {
                field: field.to_owned(),
            })
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.0.get(field).copied()
    }
}

impl From<IndexMap<String, FieldKind>> for FieldTable {
    fn from(fields: IndexMap<String, FieldKind>) -> Self {
        Self::new(fields)
    }
}
