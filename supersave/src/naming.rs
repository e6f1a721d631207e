use supersave_core::EntityDefinition;

/// Derives the physical table name for an entity: a slug of `name`, joined
/// with a slug of `namespace` when present.
pub fn table_name(def: &EntityDefinition) -> String {
    name_key(&def.name, def.namespace.as_deref())
}

/// Same derivation as [`table_name`], taking the raw name/namespace
/// directly rather than an [`EntityDefinition`] — used by
/// `EntityManager::get_repository`, which only receives a name, not a full
/// definition.
pub fn name_key(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("{}_{}", slug(ns), slug(name)),
        None => slug(name),
    }
}

/// Lowercases, replaces runs of non-alphanumeric characters with a single
/// underscore, and trims leading/trailing underscores.
fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_sep = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Registry key for an entity: same shape as its table name.
pub fn full_name(def: &EntityDefinition) -> String {
    table_name(def)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, namespace: Option<&str>) -> EntityDefinition {
        EntityDefinition {
            name: name.to_owned(),
            namespace: namespace.map(str::to_owned),
            template: Default::default(),
            relations: Vec::new(),
            filter_sort_fields: Default::default(),
        }
    }

    #[test]
    fn simple_name_is_slugged() {
        assert_eq!(table_name(&def("Planets", None)), "planets");
    }

    #[test]
    fn namespace_is_prefixed() {
        assert_eq!(table_name(&def("Planets", Some("Space Agency"))), "space_agency_planets");
    }

    #[test]
    fn repeated_separators_collapse() {
        assert_eq!(table_name(&def("My  Planet!!", None)), "my_planet");
    }
}
