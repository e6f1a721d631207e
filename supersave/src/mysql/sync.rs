use std::collections::{HashMap, HashSet};

use sqlx::{MySqlPool, Row};
use supersave_core::{EntityDefinition, Error, FieldKind, SchemaError};

use crate::sql::is_valid_field_name;

/// Creates the base `(id, contents)` table if it does not already exist.
pub async fn ensure_base_table(pool: &MySqlPool, table: &str) -> Result<(), Error> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS `{table}` (id VARCHAR(32) PRIMARY KEY, contents JSON NOT NULL)"
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

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

/// Declared column type, written in the same lowercase, parenthesised form
/// `INFORMATION_SCHEMA.COLUMNS.COLUMN_TYPE` reports it back as, so
/// introspection can compare by equality.
fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Boolean => "tinyint(4)",
        ColumnKind::Number => "int(11)",
        ColumnKind::String | ColumnKind::SingleRelation | ColumnKind::MultipleRelation => "varchar(255)",
    }
}

/// Generated-column expression for a MySQL column.
fn generated_expr(kind: ColumnKind, field: &str) -> String {
    let path = format!("'$.{field}'");
    let extract = format!("JSON_EXTRACT(contents, {path})");
    let unquoted = format!("JSON_UNQUOTE({extract})");
    match kind {
        ColumnKind::SingleRelation => unquoted,
        ColumnKind::MultipleRelation => format!(
            "REPLACE(REPLACE(REPLACE(REPLACE({unquoted}, \
             '}}, {{\"id\": \"', ','), '[{{\"id\": \"', ''), '\"}}]', ''), '\"}}', '')"
        ),
        ColumnKind::Number => format!("CAST({extract} AS SIGNED)"),
        ColumnKind::Boolean => format!(
            "CASE \
             WHEN JSON_TYPE({extract}) = 'NULL' THEN NULL \
             WHEN JSON_TYPE({extract}) = 'BOOLEAN' THEN ({unquoted} = 'true') \
             WHEN LOWER({unquoted}) = 'true' THEN 1 \
             WHEN LOWER({unquoted}) = 'false' THEN 0 \
             ELSE 0 END"
        ),
        ColumnKind::String => format!("IF(JSON_TYPE({extract}) = 'NULL', NULL, {unquoted})"),
    }
}

fn index_name(field: &str) -> String {
    format!("idx_{field}")
}

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

/// Legacy detection on the MySQL/MariaDB side: `COLUMN_TYPE` containing
/// `json` means already-JSON; a `longtext` column is checked
/// against `CHECK_CONSTRAINTS`/`TABLE_CONSTRAINTS` for a `JSON_VALID`
/// constraint (MariaDB's emulation of the JSON type). If that lookup itself
/// fails (older server without the view), the column is treated as not
/// JSON.
async fn contents_kind(pool: &MySqlPool, table: &str) -> Result<ContentsKind, Error> {
    let row = sqlx::query(
        "SELECT COLUMN_TYPE, DATA_TYPE FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = 'contents'",
    )
    .bind(table)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        // No contents column yet: a table `ensure_base_table` just created.
        return Ok(ContentsKind::Json);
    };
    let column_type: String = row.try_get("COLUMN_TYPE")?;
    if column_type.to_lowercase().contains("json") {
        return Ok(ContentsKind::Json);
    }
    let data_type: String = row.try_get("DATA_TYPE")?;
    if data_type.to_lowercase() != "longtext" {
        return Err(SchemaError::UnrecognisedColumnType {
            table: table.to_owned(),
            column: "contents".to_owned(),
            found: data_type,
        }
        .into());
    }

    let check = sqlx::query(
        "SELECT cc.CHECK_CLAUSE FROM INFORMATION_SCHEMA.CHECK_CONSTRAINTS cc \
         JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
           ON tc.CONSTRAINT_SCHEMA = cc.CONSTRAINT_SCHEMA AND tc.CONSTRAINT_NAME = cc.CONSTRAINT_NAME \
         WHERE tc.TABLE_SCHEMA = DATABASE() AND tc.TABLE_NAME = ?",
    )
    .bind(table)
    .fetch_all(pool)
    .await;

    let has_json_valid = match check {
        Ok(rows) => rows.iter().any(|r| {
            r.try_get::<String, _>("CHECK_CLAUSE")
                .map(|c| c.to_uppercase().contains("JSON_VALID"))
                .unwrap_or(false)
        }),
        Err(_) => false,
    };

    Ok(if has_json_valid { ContentsKind::Json } else { ContentsKind::Text })
}

struct CurrentColumn {
    column_type: String,
    generated: bool,
}

/// Batched introspection: one query for columns (+ generation expression),
/// one for index membership — one query per table, not per column.
async fn current_columns(pool: &MySqlPool, table: &str) -> Result<HashMap<String, CurrentColumn>, Error> {
    let rows = sqlx::query(
        "SELECT COLUMN_NAME, COLUMN_TYPE, GENERATION_EXPRESSION FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let mut out = HashMap::new();
    for row in &rows {
        let name: String = row.try_get("COLUMN_NAME")?;
        if name == "id" || name == "contents" {
            continue;
        }
        let column_type: String = row.try_get("COLUMN_TYPE")?;
        let generation_expr: Option<String> = row.try_get("GENERATION_EXPRESSION")?;
        let generated = generation_expr.map(|e| !e.is_empty()).unwrap_or(false);
        out.insert(name, CurrentColumn { column_type, generated });
    }
    Ok(out)
}

async fn current_indexes(pool: &MySqlPool, table: &str) -> Result<HashSet<String>, Error> {
    let rows = sqlx::query(
        "SELECT DISTINCT INDEX_NAME FROM INFORMATION_SCHEMA.STATISTICS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;
    let mut out = HashSet::new();
    for row in &rows {
        out.insert(row.try_get::<String, _>("INDEX_NAME")?);
    }
    Ok(out)
}

fn column_decl(field: &str, kind: ColumnKind) -> String {
    format!("`{field}` {} GENERATED ALWAYS AS ({}) STORED", sql_type(kind), generated_expr(kind, field))
}

/// String columns get a `(191)` index key-length prefix on MySQL; other
/// kinds index the full column.
fn index_column_expr(field: &str, kind: ColumnKind) -> String {
    match kind {
        ColumnKind::String | ColumnKind::SingleRelation | ColumnKind::MultipleRelation => {
            format!("`{field}`(191)")
        }
        ColumnKind::Number | ColumnKind::Boolean => format!("`{field}`"),
    }
}

async fn create_indexes(pool: &MySqlPool, table: &str, columns: &[(String, ColumnKind)]) -> Result<(), Error> {
    for (field, kind) in columns {
        let sql = format!(
            "ALTER TABLE `{table}` ADD INDEX `{}` ({})",
            index_name(field),
            index_column_expr(field, *kind)
        );
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}

/// Full table recreation. MySQL DDL is only best-effort transactional
/// (most DDL statements implicitly commit), so unlike the SQLite path this
/// runs as sequential statements rather than inside a `START TRANSACTION`
/// block.
async fn recreate_table(pool: &MySqlPool, table: &str, def: &EntityDefinition) -> Result<(), Error> {
    let shadow = format!("{table}_2");
    let columns = expected_columns(def);

    sqlx::query(&format!("DROP TABLE IF EXISTS `{shadow}`")).execute(pool).await?;

    let mut create_sql = format!("CREATE TABLE `{shadow}` (id VARCHAR(32) PRIMARY KEY, contents JSON NOT NULL");
    for (field, kind) in &columns {
        create_sql.push_str(", ");
        create_sql.push_str(&column_decl(field, *kind));
    }
    create_sql.push(')');
    sqlx::query(&create_sql).execute(pool).await?;

    create_indexes(pool, &shadow, &columns).await?;

    let rows = sqlx::query(&format!("SELECT id, contents FROM `{table}`")).fetch_all(pool).await?;
    for row in rows {
        let id: String = row.try_get("id")?;
        let contents: String = row.try_get("contents")?;
        if let Err(source) = serde_json::from_str::<serde_json::Value>(&contents) {
            return Err(SchemaError::LegacyRowRejected { table: table.to_owned(), id, source: source.into() }.into());
        }
        let insert = format!("INSERT INTO `{shadow}` (id, contents) VALUES (?, ?)");
        sqlx::query(&insert).bind(&id).bind(&contents).execute(pool).await.map_err(|e| {
            Error::from(SchemaError::LegacyRowRejected { table: table.to_owned(), id: id.clone(), source: e.into() })
        })?;
    }

    sqlx::query(&format!("DROP TABLE `{table}`")).execute(pool).await?;
    sqlx::query(&format!("RENAME TABLE `{shadow}` TO `{table}`")).execute(pool).await?;

    log::info!("recreated mysql table {table:?} ({} generated column(s))", columns.len());
    Ok(())
}

/// Reconciles `table`'s physical shape with `def`.
pub async fn sync(pool: &MySqlPool, def: &EntityDefinition, table: &str) -> Result<(), Error> {
    validate_field_names(def)?;

    if contents_kind(pool, table).await? == ContentsKind::Text {
        log::info!("migrating legacy LONGTEXT contents column on mysql table {table:?}");
        recreate_table(pool, table, def).await?;
        return Ok(());
    }

    let expected = expected_columns(def);
    let current = current_columns(pool, table).await?;

    let shape_matches = expected.len() == current.len()
        && expected.iter().all(|(field, kind)| {
            current
                .get(field)
                .map(|col| col.generated && col.column_type.eq_ignore_ascii_case(sql_type(*kind)))
                .unwrap_or(false)
        });

    if !shape_matches {
        log::info!("schema drift on mysql table {table:?}: recreating with current filterSortFields");
        recreate_table(pool, table, def).await?;
        return Ok(());
    }

    let existing_indexes = current_indexes(pool, table).await?;
    let expected_index_names: HashSet<String> = expected.iter().map(|(f, _)| index_name(f)).collect();

    for (field, kind) in &expected {
        let name = index_name(field);
        if !existing_indexes.contains(&name) {
            let sql = format!("ALTER TABLE `{table}` ADD INDEX `{name}` ({})", index_column_expr(field, *kind));
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    for name in &existing_indexes {
        if name.starts_with("idx_") && !expected_index_names.contains(name) {
            let sql = format!("ALTER TABLE `{table}` DROP INDEX `{name}`");
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_expression_handles_json_and_string_encodings() {
        let expr = generated_expr(ColumnKind::Boolean, "visible");
        assert!(expr.contains("JSON_TYPE(JSON_EXTRACT(contents, '$.visible'))"));
        assert!(expr.contains("= 'true'"));
    }

    #[test]
    fn string_expression_nulls_out_json_null() {
        let expr = generated_expr(ColumnKind::String, "name");
        assert_eq!(
            expr,
            "IF(JSON_TYPE(JSON_EXTRACT(contents, '$.name')) = 'NULL', NULL, \
             JSON_UNQUOTE(JSON_EXTRACT(contents, '$.name')))"
        );
    }

    #[test]
    fn string_fields_index_with_a_key_length_prefix() {
        assert_eq!(index_column_expr("name", ColumnKind::String), "`name`(191)");
        assert_eq!(index_column_expr("distance", ColumnKind::Number), "`distance`");
    }
}
