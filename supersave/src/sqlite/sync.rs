use std::collections::{HashMap, HashSet};

use regex::Regex;
use sqlx::{Row, SqlitePool};
use supersave_core::{EntityDefinition, Error, FieldKind, SchemaError};

use crate::sql::is_valid_field_name;

/// Creates the base `(id, contents)` table if it does not already exist.
/// Already-JSON on a fresh table; the synchronizer (`sync`) takes it from
/// there.
pub async fn ensure_base_table(pool: &SqlitePool, table: &str) -> Result<(), Error> {
    let sql = format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (id TEXT PRIMARY KEY, contents JSON NOT NULL)"#
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

/// The kind of generated-column expression a field needs, derived from
/// whether it is also a relation on the entity (single or multiple) or a
/// plain scalar `filterSortField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    SingleRelation,
    MultipleRelation,
    String,
    Number,
    Boolean,
}

fn classify(def: &EntityDefinition, field: &str) -> ColumnKind {
    if let Some(relation) = def.relations.iter().find(|r| r.field == field) {
        return if relation.multiple { ColumnKind::MultipleRelation } else { ColumnKind::SingleRelation };
    }
    match def.filter_sort_fields.get(field).copied() {
        Some(FieldKind::Boolean) => ColumnKind::Boolean,
        Some(FieldKind::Number) => ColumnKind::Number,
        _ => ColumnKind::String,
    }
}

/// Physical column type for a generated column.
fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Boolean | ColumnKind::Number => "INTEGER",
        ColumnKind::String | ColumnKind::SingleRelation | ColumnKind::MultipleRelation => "TEXT",
    }
}

/// Generated-column expression for a SQLite column.
fn generated_expr(kind: ColumnKind, field: &str) -> String {
    let path = format!("'$.{field}'");
    match kind {
        ColumnKind::String | ColumnKind::SingleRelation => format!("json_extract(contents, {path})"),
        ColumnKind::Number | ColumnKind::Boolean => format!("CAST(json_extract(contents, {path}) AS INTEGER)"),
        ColumnKind::MultipleRelation => format!(
            "REPLACE(REPLACE(REPLACE(REPLACE(json_extract(contents, {path}), \
             '}},{{\"id\":\"', ','), '[{{\"id\":\"', ''), '\"}}]', ''), '\"}}', '')"
        ),
    }
}

fn index_name(field: &str) -> String {
    format!("idx_{field}")
}

/// Target generated-column shape for every declared `filterSortField`
/// (`id` and `contents` are never generated).
fn expected_columns(def: &EntityDefinition) -> Vec<(String, ColumnKind)> {
    def.filter_sort_fields
        .keys()
        .filter(|f| f.as_str() != "id")
        .map(|f| (f.clone(), classify(def, f)))
        .collect()
}

fn validate_field_names(def: &EntityDefinition) -> Result<(), Error> {
    for field in def.filter_sort_fields.keys() {
        if field != "id" && !is_valid_field_name(field) {
            return Err(supersave_core::ConfigError::InvalidFieldName { name: field.clone() }.into());
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ContentsKind {
    Json,
    Text,
}

/// Legacy detection: inspects `PRAGMA table_info` for the physical type of
/// `contents`.
async fn contents_kind(pool: &SqlitePool, table: &str) -> Result<ContentsKind, Error> {
    let sql = format!(r#"PRAGMA table_info("{table}")"#);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    for row in &rows {
        let name: String = row.try_get("name")?;
        if name == "contents" {
            let decl_type: String = row.try_get("type")?;
            let upper = decl_type.to_uppercase();
            return if upper.contains("JSON") {
                Ok(ContentsKind::Json)
            } else if upper.contains("TEXT") {
                Ok(ContentsKind::Text)
            } else {
                Err(SchemaError::UnrecognisedColumnType {
                    table: table.to_owned(),
                    column: "contents".to_owned(),
                    found: decl_type,
                }
                .into())
            };
        }
    }
    // No contents column at all: treat as already-JSON, matching a table
    // `ensure_base_table` just created.
    Ok(ContentsKind::Json)
}

struct CurrentColumn {
    decl_type: String,
    generated: bool,
}

async fn current_columns(pool: &SqlitePool, table: &str) -> Result<HashMap<String, CurrentColumn>, Error> {
    let sql = format!(r#"PRAGMA table_info("{table}")"#);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    let table_sql = table_definition_sql(pool, table).await?;
    let mut out = HashMap::new();
    for row in &rows {
        let name: String = row.try_get("name")?;
        if name == "id" || name == "contents" {
            continue;
        }
        let decl_type: String = row.try_get("type")?;
        let generated = is_generated_in_sql(&table_sql, &name);
        out.insert(name, CurrentColumn { decl_type, generated });
    }
    Ok(out)
}

async fn table_definition_sql(pool: &SqlitePool, table: &str) -> Result<String, Error> {
    let row = sqlx::query("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(table)
        .fetch_optional(pool)
        .await?;
    Ok(match row {
        Some(row) => row.try_get::<String, _>("sql")?,
        None => String::new(),
    })
}

/// Generated-column detection: scans the table's DDL text for
/// `"<field>" ... GENERATED ALWAYS AS`.
fn is_generated_in_sql(table_sql: &str, field: &str) -> bool {
    let pattern = format!(
        r#"(?is)"?{}"?\s+[^,)]+GENERATED\s+ALWAYS\s+AS"#,
        regex::escape(field)
    );
    Regex::new(&pattern).map(|re| re.is_match(table_sql)).unwrap_or(false)
}

async fn current_indexes(pool: &SqlitePool, table: &str) -> Result<HashSet<String>, Error> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?")
        .bind(table)
        .fetch_all(pool)
        .await?;
    let mut out = HashSet::new();
    for row in &rows {
        out.insert(row.try_get::<String, _>("name")?);
    }
    Ok(out)
}

fn create_table_sql(table: &str, columns: &[(String, ColumnKind)]) -> String {
    let mut sql = format!(r#"CREATE TABLE "{table}" (id TEXT PRIMARY KEY, contents JSON NOT NULL"#);
    for (field, kind) in columns {
        sql.push_str(&format!(
            r#", "{field}" {} GENERATED ALWAYS AS ({}) STORED"#,
            sql_type(*kind),
            generated_expr(*kind, field)
        ));
    }
    sql.push(')');
    sql
}

/// Full table recreation: shadow table, row-by-row copy (validating JSON,
/// recomputing generated columns), drop, rename. Wrapped in a transaction —
/// SQLite supports transactional DDL.
async fn recreate_table(pool: &SqlitePool, table: &str, def: &EntityDefinition) -> Result<(), Error> {
    let shadow = format!("{table}_2");
    let columns = expected_columns(def);

    let mut txn = pool.begin().await?;

    sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{shadow}""#)).execute(&mut *txn).await?;
    sqlx::query(&create_table_sql(&shadow, &columns)).execute(&mut *txn).await?;
    for (field, _) in &columns {
        let sql = format!(r#"CREATE INDEX "{}" ON "{shadow}"("{field}")"#, index_name(field));
        sqlx::query(&sql).execute(&mut *txn).await?;
    }

    let rows = sqlx::query(&format!(r#"SELECT id, contents FROM "{table}""#)).fetch_all(&mut *txn).await?;
    for row in rows {
        let id: String = row.try_get("id")?;
        let contents: String = row.try_get("contents")?;
        if let Err(source) = serde_json::from_str::<serde_json::Value>(&contents) {
            return Err(SchemaError::LegacyRowRejected { table: table.to_owned(), id, source: source.into() }.into());
        }
        let insert = format!(r#"INSERT INTO "{shadow}" (id, contents) VALUES (?, ?)"#);
        sqlx::query(&insert).bind(&id).bind(&contents).execute(&mut *txn).await.map_err(|e| {
            Error::from(SchemaError::LegacyRowRejected { table: table.to_owned(), id: id.clone(), source: e.into() })
        })?;
    }

    sqlx::query(&format!(r#"DROP TABLE "{table}""#)).execute(&mut *txn).await?;
    sqlx::query(&format!(r#"ALTER TABLE "{shadow}" RENAME TO "{table}""#)).execute(&mut *txn).await?;

    txn.commit().await?;
    log::info!("recreated sqlite table {table:?} ({} generated column(s))", columns.len());
    Ok(())
}

/// Reconciles `table`'s physical shape with `def`: legacy contents
/// migration first, then incremental column/index maintenance.
pub async fn sync(pool: &SqlitePool, def: &EntityDefinition, table: &str) -> Result<(), Error> {
    validate_field_names(def)?;

    if contents_kind(pool, table).await? == ContentsKind::Text {
        log::info!("migrating legacy TEXT contents column on sqlite table {table:?}");
        recreate_table(pool, table, def).await?;
        return Ok(());
    }

    let expected = expected_columns(def);
    let current = current_columns(pool, table).await?;

    let shape_matches = expected.len() == current.len()
        && expected.iter().all(|(field, kind)| {
            current
                .get(field)
                .map(|col| col.generated && col.decl_type.eq_ignore_ascii_case(sql_type(*kind)))
                .unwrap_or(false)
        });

    if !shape_matches {
        log::info!("schema drift on sqlite table {table:?}: recreating with current filterSortFields");
        recreate_table(pool, table, def).await?;
        return Ok(());
    }

    // Columns already match; reconcile indexes only.
    let existing_indexes = current_indexes(pool, table).await?;
    let expected_index_names: HashSet<String> = expected.iter().map(|(f, _)| index_name(f)).collect();

    for (field, _) in &expected {
        let name = index_name(field);
        if !existing_indexes.contains(&name) {
            let sql = format!(r#"CREATE INDEX "{name}" ON "{table}"("{field}")"#);
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    for name in &existing_indexes {
        if name.starts_with("idx_") && !expected_index_names.contains(name) {
            let sql = format!(r#"DROP INDEX "{name}""#);
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_column_detection_matches_case_insensitively() {
        let sql = r#"CREATE TABLE "planets" (id TEXT PRIMARY KEY, contents JSON NOT NULL, "name" TEXT generated always as (json_extract(contents, '$.name')) stored)"#;
        assert!(is_generated_in_sql(sql, "name"));
        assert!(!is_generated_in_sql(sql, "distance"));
    }

    #[test]
    fn classify_picks_relation_kind_over_scalar_kind() {
        let def = EntityDefinition {
            name: "moons".into(),
            namespace: None,
            template: Default::default(),
            relations: vec![supersave_core::Relation {
                field: "planet".into(),
                entity: "planets".into(),
                namespace: None,
                multiple: false,
            }],
            filter_sort_fields: {
                let mut m = indexmap::IndexMap::new();
                m.insert("planet".to_owned(), FieldKind::String);
                m
            },
        };
        assert_eq!(classify(&def, "planet"), ColumnKind::SingleRelation);
    }
}
