use async_trait::async_trait;
use serde_json::Value;
use sqlx::{MySqlPool, Row};
use supersave_core::{BaseEntity, EntityDefinition, Error, Query, Result};

use crate::conn::EngineKind;
use crate::hydrate::hydrate;
use crate::query_sql::{self, BoundValue};
use crate::registry::Registry;
use crate::relations::simplify_relations;
use crate::repository::Repository;
use crate::sql::SqlWriter;

/// MySQL/MariaDB realisation of the repository capability interface.
/// Structurally identical to [`crate::sqlite::SqliteRepository`] — the only
/// differences are identifier quoting (backticks) and the `id` column's
/// physical width — engine differences are collapsed to composition rather
/// than an inheritance chain.
pub struct MySqlRepository {
    pool: MySqlPool,
    table: String,
    definition: EntityDefinition,
    registry: Registry,
}

impl MySqlRepository {
    pub fn new(pool: MySqlPool, table: String, definition: EntityDefinition, registry: Registry) -> Self {
        Self { pool, table, definition, registry }
    }

    async fn hydrate_row(&self, id: &str, contents: &BaseEntity) -> Result<BaseEntity> {
        hydrate(&self.definition, id, contents, &self.registry).await
    }

    fn decode_row(row: &sqlx::mysql::MySqlRow) -> sqlx::Result<(String, BaseEntity)> {
        let id: String = row.try_get("id")?;
        let contents: sqlx::types::Json<BaseEntity> = row.try_get("contents")?;
        Ok((id, contents.0))
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<BaseEntity>> {
        let sql = format!("SELECT id, contents FROM `{}` WHERE id = ?", self.table);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let (id, contents) = Self::decode_row(&row)?;
                Ok(Some(self.hydrate_row(&id, &contents).await?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<BaseEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT id, contents FROM `{}` WHERE id IN ({placeholders})", self.table);
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let (id, contents) = Self::decode_row(row)?;
            out.push(self.hydrate_row(&id, &contents).await?);
        }
        Ok(out)
    }

    async fn get_all(&self) -> Result<Vec<BaseEntity>> {
        let sql = format!("SELECT id, contents FROM `{}`", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let (id, contents) = Self::decode_row(row)?;
            out.push(self.hydrate_row(&id, &contents).await?);
        }
        Ok(out)
    }

    async fn get_by_query(&self, query: &Query) -> Result<Vec<BaseEntity>> {
        let mut writer = SqlWriter::new(EngineKind::MySql);
        writer.write_str(&format!("SELECT id, contents FROM `{}`", self.table));
        let params = if query.conditions.is_empty() {
            Vec::new()
        } else {
            writer.write_str(" WHERE ");
            query_sql::translate_conditions(&mut writer, &self.definition.filter_sort_fields, &query.conditions)
        };
        // MySQL sorts with the column's default collation: no `COLLATE
        // NOCASE` equivalent is appended.
        query_sql::write_order_by(&mut writer, &self.definition.filter_sort_fields, &query.sort, false);
        query_sql::write_limit_offset(&mut writer, query);

        let sql = writer.build();
        let mut sqlx_query = sqlx::query(&sql);
        for param in &params {
            sqlx_query = match param {
                BoundValue::Text(s) => sqlx_query.bind(s.clone()),
                BoundValue::Int(i) => sqlx_query.bind(*i),
                BoundValue::Bool(b) => sqlx_query.bind(*b),
            };
        }
        let rows = sqlx_query.fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let (id, contents) = Self::decode_row(row)?;
            out.push(self.hydrate_row(&id, &contents).await?);
        }
        Ok(out)
    }

    async fn create(&self, input: BaseEntity) -> Result<BaseEntity> {
        let id = match input.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => crate::id::generate(),
        };
        let mut contents = self.definition.template.clone();
        for (k, v) in simplify_relations(&self.definition.relations, input) {
            contents.insert(k, v);
        }
        contents.remove("id");

        let sql = format!("INSERT INTO `{}` (id, contents) VALUES (?, ?)", self.table);
        sqlx::query(&sql)
            .bind(&id)
            .bind(sqlx::types::Json(&contents))
            .execute(&self.pool)
            .await?;

        self.get_by_id(&id).await?.ok_or_else(|| {
            Error::Other(anyhow::anyhow!("row {id:?} vanished immediately after insert into {:?}", self.table))
        })
    }

    async fn update(&self, id: &str, input: BaseEntity) -> Result<Option<BaseEntity>> {
        let mut contents = simplify_relations(&self.definition.relations, input);
        contents.remove("id");

        let sql = format!("UPDATE `{}` SET contents = ? WHERE id = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(sqlx::types::Json(&contents))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete_using_id(&self, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM `{}` WHERE id = ?", self.table);
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
