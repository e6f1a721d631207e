//! The same scenarios as `end_to_end.rs`, run against a real MySQL/MariaDB
//! server instead of `sqlite::memory:`. Gated behind `DATABASE_URL` (a
//! `mysql://` DSN) since no MySQL server is available in a plain `cargo
//! test` environment; `#[ignore]`d by default, run explicitly with
//! `cargo test --test mysql_end_to_end -- --ignored` once `DATABASE_URL`
//! points at a real instance.

use indexmap::IndexMap;
use serde_json::json;
use sqlx::Row;
use supersave::{manager::AddEntityOptions, EntityDefinition, EntityManager, FieldKind, SortDirection};

fn mysql_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|u| !u.starts_with("sqlite://"))
}

fn planet_def(table_suffix: &str) -> EntityDefinition {
    let mut fields = IndexMap::new();
    fields.insert("name".to_owned(), FieldKind::String);
    fields.insert("distance".to_owned(), FieldKind::Number);
    EntityDefinition {
        name: format!("planets_{table_suffix}"),
        namespace: None,
        template: Default::default(),
        relations: Vec::new(),
        filter_sort_fields: fields,
    }
}

fn obj(value: serde_json::Value) -> supersave::BaseEntity {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[tokio::test]
#[ignore]
async fn create_fetch_and_query_against_mysql() {
    let Some(url) = mysql_url() else {
        eprintln!("skipping: set DATABASE_URL to a mysql:// DSN to run this test");
        return;
    };
    let manager = EntityManager::connect(&url).await.unwrap();
    let repo = manager.add_entity(planet_def("mysql_crud"), AddEntityOptions::default()).await.unwrap();

    let earth = repo.create(obj(json!({"name": "Earth", "distance": 100}))).await.unwrap();
    let id = earth.get("id").and_then(|v| v.as_str()).unwrap().to_owned();
    let fetched = repo.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&json!("Earth")));

    repo.create(obj(json!({"name": "Earth", "distance": 200}))).await.unwrap();
    repo.create(obj(json!({"name": "Mars", "distance": 100}))).await.unwrap();

    let mut q = repo.query_builder();
    q.eq("name", "Earth").unwrap();
    q.sort("distance", SortDirection::Desc).unwrap();
    let results = repo.get_by_query(&q.get_where()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].get("distance"), Some(&json!(200)));
}

#[tokio::test]
#[ignore]
async fn legacy_longtext_table_migrates_to_json_on_mysql() {
    let Some(url) = mysql_url() else {
        eprintln!("skipping: set DATABASE_URL to a mysql:// DSN to run this test");
        return;
    };
    let manager = EntityManager::connect(&url).await.unwrap();
    let pool = match manager.connection() {
        supersave::Engine::MySql(pool) => pool.clone(),
        supersave::Engine::Sqlite(_) => unreachable!(),
    };

    let table = "planets_mysql_legacy";
    sqlx::query(&format!("DROP TABLE IF EXISTS `{table}`")).execute(&pool).await.unwrap();
    sqlx::query(&format!(
        "CREATE TABLE `{table}` (id VARCHAR(32) PRIMARY KEY, contents LONGTEXT NOT NULL)"
    ))
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(&format!("INSERT INTO `{table}` (id, contents) VALUES (?, ?)"))
        .bind("earth")
        .bind(r#"{"name":"Earth"}"#)
        .execute(&pool)
        .await
        .unwrap();

    let def = EntityDefinition {
        name: "planets_mysql_legacy".to_owned(),
        namespace: None,
        template: Default::default(),
        relations: Vec::new(),
        filter_sort_fields: {
            let mut m = IndexMap::new();
            m.insert("name".to_owned(), FieldKind::String);
            m
        },
    };
    let repo = manager.add_entity(def, AddEntityOptions::default()).await.unwrap();
    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 1);

    let row = sqlx::query(
        "SELECT COLUMN_TYPE FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = 'contents'",
    )
    .bind(table)
    .fetch_one(&pool)
    .await
    .unwrap();
    let column_type: String = row.try_get("COLUMN_TYPE").unwrap();
    assert!(column_type.to_lowercase().contains("json"));
}
