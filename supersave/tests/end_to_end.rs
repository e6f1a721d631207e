//! End-to-end scenarios exercised against SQLite via the public `SuperSave`
//! facade and `EntityManager`/`Repository` directly, as plain
//! `#[tokio::test]`s.

use indexmap::IndexMap;
use serde_json::json;
use sqlx::Row;
use supersave::collection::{Hook, HookContext, HookKind};
use supersave::{
    manager::AddEntityOptions, Collection, EntityDefinition, EntityManager, Error, FieldKind,
    Relation, SortDirection, SuperSave, SuperSaveOptions,
};

async fn sqlite_url(file: &tempfile::TempPath) -> String {
    format!("sqlite://{}", file.display())
}

fn planet_def() -> EntityDefinition {
    let mut fields = IndexMap::new();
    fields.insert("name".to_owned(), FieldKind::String);
    EntityDefinition {
        name: "planets".to_owned(),
        namespace: None,
        template: Default::default(),
        relations: Vec::new(),
        filter_sort_fields: fields,
    }
}

fn planet_def_with_distance() -> EntityDefinition {
    let mut fields = IndexMap::new();
    fields.insert("name".to_owned(), FieldKind::String);
    fields.insert("distance".to_owned(), FieldKind::Number);
    EntityDefinition {
        name: "planets".to_owned(),
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
async fn create_and_fetch() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();
    let repo = store.add_entity(planet_def(), None).await.unwrap();

    let created = repo.create(obj(json!({"name": "Earth"}))).await.unwrap();
    let id = created.get("id").and_then(|v| v.as_str()).unwrap().to_owned();
    assert_eq!(created.get("name"), Some(&json!("Earth")));

    let fetched = repo.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn update_round_trip() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();
    let repo = store.add_entity(planet_def(), None).await.unwrap();

    let created = repo.create(obj(json!({"name": "Earth"}))).await.unwrap();
    let id = created.get("id").and_then(|v| v.as_str()).unwrap().to_owned();

    let updated = repo
        .update(&id, obj(json!({"name": "Earth", "note": "home"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get("name"), Some(&json!("Earth")));
    assert_eq!(updated.get("note"), Some(&json!("home")));
    assert_eq!(updated.get("id"), Some(&json!(id)));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();
    let repo = store.add_entity(planet_def(), None).await.unwrap();

    let created = repo.create(obj(json!({"name": "Earth"}))).await.unwrap();
    let id = created.get("id").and_then(|v| v.as_str()).unwrap().to_owned();

    repo.delete_using_id(&id).await.unwrap();
    assert!(repo.get_by_id(&id).await.unwrap().is_none());
    // second delete of the same (now absent) id is a no-op, not an error.
    repo.delete_using_id(&id).await.unwrap();
}

#[tokio::test]
async fn sort_and_filter() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();
    let repo = store.add_entity(planet_def_with_distance(), None).await.unwrap();

    repo.create(obj(json!({"name": "Earth", "distance": 100}))).await.unwrap();
    repo.create(obj(json!({"name": "Earth", "distance": 200}))).await.unwrap();
    repo.create(obj(json!({"name": "Mars", "distance": 100}))).await.unwrap();

    let mut q = repo.query_builder();
    q.eq("name", "Earth").unwrap();
    q.eq("distance", 100i64).unwrap();
    let results = repo.get_by_query(&q.get_where()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("name"), Some(&json!("Earth")));
    assert_eq!(results[0].get("distance"), Some(&json!(100)));

    let mut q2 = repo.query_builder();
    q2.sort("distance", SortDirection::Desc).unwrap();
    q2.limit(2);
    let top_two = repo.get_by_query(&q2.get_where()).await.unwrap();
    assert_eq!(top_two.len(), 2);
    assert_eq!(top_two[0].get("distance"), Some(&json!(200)));
}

#[tokio::test]
async fn logical_composition() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();

    let mut fields = IndexMap::new();
    fields.insert("name".to_owned(), FieldKind::String);
    fields.insert("visible".to_owned(), FieldKind::Boolean);
    let def = EntityDefinition {
        name: "planets".to_owned(),
        namespace: None,
        template: Default::default(),
        relations: Vec::new(),
        filter_sort_fields: fields,
    };
    let repo = store.add_entity(def, None).await.unwrap();

    repo.create(obj(json!({"name": "Earth", "visible": true}))).await.unwrap();
    repo.create(obj(json!({"name": "Mars", "visible": true}))).await.unwrap();
    repo.create(obj(json!({"name": "Jupiter", "visible": false}))).await.unwrap();
    repo.create(obj(json!({"name": "Venus", "visible": false}))).await.unwrap();

    let mut q = repo.query_builder();
    q.and();
    q.eq("visible", true).unwrap();
    let mut mars = repo.query_builder();
    mars.eq("name", "Mars").unwrap();
    let mut venus = repo.query_builder();
    venus.eq("name", "Venus").unwrap();
    q.or_of(vec![mars, venus]);

    let results = repo.get_by_query(&q.get_where()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("name"), Some(&json!("Mars")));
}

#[tokio::test]
async fn in_with_empty_list_matches_nothing() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();
    let repo = store.add_entity(planet_def(), None).await.unwrap();
    repo.create(obj(json!({"name": "Earth"}))).await.unwrap();

    let mut q = repo.query_builder();
    q.in_("name", Vec::<String>::new()).unwrap();
    let results = repo.get_by_query(&q.get_where()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn legacy_text_table_migrates_to_json() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let manager = EntityManager::connect(&url).await.unwrap();

    let pool = match manager.connection() {
        supersave::Engine::Sqlite(pool) => pool.clone(),
        supersave::Engine::MySql(_) => unreachable!(),
    };
    sqlx::query(r#"CREATE TABLE "planets" (id TEXT PRIMARY KEY, contents TEXT NOT NULL)"#)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(r#"INSERT INTO "planets" (id, contents) VALUES (?, ?)"#)
        .bind("earth")
        .bind(r#"{"name":"Earth"}"#)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(r#"INSERT INTO "planets" (id, contents) VALUES (?, ?)"#)
        .bind("mars")
        .bind(r#"{"name":"Mars"}"#)
        .execute(&pool)
        .await
        .unwrap();

    let repo = manager.add_entity(planet_def(), AddEntityOptions::default()).await.unwrap();
    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 2);

    let contents_type: String = sqlx::query(r#"SELECT type FROM pragma_table_info('planets') WHERE name = 'contents'"#)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("type")
        .unwrap();
    assert!(contents_type.to_uppercase().contains("JSON"));

    repo.create(obj(json!({"name": "Jupiter"}))).await.unwrap();
    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 3);

    // Re-adding the same entity observes the already-JSON column and skips
    // the migration a second time; the repository is returned from cache.
    let repo2 = manager.add_entity(planet_def(), AddEntityOptions::default()).await.unwrap();
    assert_eq!(repo2.get_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn hook_negation_short_circuits_before_any_mutation() {
    let hook = Hook::new(HookKind::UpdateBefore, |_ctx, _value| async move {
        Err(supersave::HookError::new("Test", Some(401)))
    });
    let collection = Collection::new(planet_def()).with_hook(hook);

    let ctx = HookContext::default();
    let err = supersave::collection::run_hooks(
        &collection.hooks,
        HookKind::UpdateBefore,
        &ctx,
        obj(json!({"name": "Earth"})),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), 401);
    assert_eq!(err.message, "Test");
}

#[tokio::test]
async fn relation_projection_and_expansion() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();

    let planets = store.add_entity(planet_def(), None).await.unwrap();
    let earth = planets.create(obj(json!({"name": "Earth"}))).await.unwrap();
    let earth_id = earth.get("id").and_then(|v| v.as_str()).unwrap().to_owned();

    let moon_def = EntityDefinition {
        name: "moons".to_owned(),
        namespace: None,
        template: Default::default(),
        relations: vec![Relation {
            field: "planet".to_owned(),
            entity: "planets".to_owned(),
            namespace: None,
            multiple: false,
        }],
        filter_sort_fields: IndexMap::new(),
    };
    let moons = store.add_entity(moon_def, None).await.unwrap();

    let luna = moons
        .create(obj(json!({"name": "Luna", "planet": earth_id})))
        .await
        .unwrap();
    assert_eq!(luna.get("planet"), Some(&json!({"id": earth_id, "name": "Earth"})));

    let luna_id = luna.get("id").and_then(|v| v.as_str()).unwrap().to_owned();
    let fetched = moons.get_by_id(&luna_id).await.unwrap().unwrap();
    let planet = fetched.get("planet").unwrap();
    assert_eq!(planet.get("name"), Some(&json!("Earth")));
}

#[tokio::test]
async fn unknown_filter_field_is_a_configuration_error() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();
    let repo = store.add_entity(planet_def(), None).await.unwrap();

    let mut q = repo.query_builder();
    let err = q.eq("mass", 1i64).unwrap_err();
    assert!(matches!(err, supersave::ConfigError::UnknownField { .. }));
}

#[tokio::test]
async fn invalid_field_name_fails_sync_before_ddl() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let manager = EntityManager::connect(&url).await.unwrap();

    let mut fields = IndexMap::new();
    fields.insert("invalid-field-name".to_owned(), FieldKind::String);
    let def = EntityDefinition {
        name: "planets".to_owned(),
        namespace: None,
        template: Default::default(),
        relations: Vec::new(),
        filter_sort_fields: fields,
    };

    let err = manager.add_entity(def, AddEntityOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Config(supersave::ConfigError::InvalidFieldName { .. })));
}

#[tokio::test]
async fn duplicate_entity_registration_returns_cached_repository() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let manager = EntityManager::connect(&url).await.unwrap();

    let first = manager.add_entity(planet_def(), AddEntityOptions::default()).await.unwrap();
    first.create(obj(json!({"name": "Earth"}))).await.unwrap();

    let second = manager.add_entity(planet_def(), AddEntityOptions::default()).await.unwrap();
    assert_eq!(second.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn migration_runs_once_and_is_recorded() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;

    let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter_for_migration = counter.clone();
    let migration = supersave::Migration::new("seed-planets", None, move |ctx| {
        let counter = counter_for_migration.clone();
        async move {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if let supersave::Engine::Sqlite(pool) = &ctx.connection {
                sqlx::query(r#"CREATE TABLE IF NOT EXISTS "seed_marker" (id TEXT PRIMARY KEY)"#)
                    .execute(pool)
                    .await?;
            }
            Ok(())
        }
    });

    let options = SuperSaveOptions::new().with_migration(migration).unwrap();
    let store = SuperSave::connect(&url, options).await.unwrap();
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);

    // A second startup against the same database must not rerun it.
    store.close().await;
    let migration_again = supersave::Migration::new("seed-planets", None, move |_ctx| async move { Ok(()) });
    let options2 = SuperSaveOptions::new().with_migration(migration_again).unwrap();
    let store2 = SuperSave::connect(&url, options2).await.unwrap();
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    store2.close().await;
}

#[tokio::test]
async fn prefix_reinitialisation_is_a_configuration_error() {
    let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = sqlite_url(&file).await;
    let store = SuperSave::connect(&url, SuperSaveOptions::new()).await.unwrap();

    store.set_prefix("/api").unwrap();
    let err = store.set_prefix("/v2").unwrap_err();
    assert!(matches!(err, Error::Config(supersave::ConfigError::PrefixAlreadySet { .. })));
}
