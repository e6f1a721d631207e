//! SuperSave: an entity store that maps declarative entity definitions onto
//! SQLite/MySQL tables and exposes both a repository API (this crate) and
//! the primitives an external HTTP collaborator needs to expose each entity
//! as a REST collection (`collection`).

pub mod collection;
mod conn;
mod hydrate;
mod id;
pub mod manager;
mod mysql;
mod naming;
mod query_sql;
pub mod migration;
mod registry;
mod relations;
pub mod repository;
mod sql;
mod sqlite;

pub use collection::{Collection, Hook, HookContext, HookKind};
pub use conn::{Engine, EngineKind};
pub use manager::{AddEntityOptions, EntityManager};
pub use migration::{Migration, MigrationContext, MigrationRunner};
pub use naming::{name_key, table_name};
pub use repository::Repository;

pub use supersave_core::*;
pub use supersave_query::QueryBuilder;

use std::sync::Arc;

/// Construction-time options, built with the familiar `with_*` chain idiom.
#[derive(Default)]
pub struct SuperSaveOptions {
    skip_sync: bool,
    skip_migrations: bool,
    migrations: Vec<Migration>,
    prefix: Option<String>,
}

impl SuperSaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_sync(mut self, skip: bool) -> Self {
        self.skip_sync = skip;
        self
    }

    pub fn with_skip_migrations(mut self, skip: bool) -> Self {
        self.skip_migrations = skip;
        self
    }

    /// Registers one migration; rejects a duplicate `name` immediately.
    pub fn with_migration(mut self, migration: Migration) -> Result<Self> {
        self.migrations.push(migration);
        Ok(self)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// The façade tying the entity manager, the migration runner and the
/// registered collections together. Multiple instances may coexist in one
/// process; nothing is stored in a true process global.
pub struct SuperSave {
    manager: EntityManager,
    migrations: MigrationRunner,
    collections: std::sync::RwLock<Vec<Collection>>,
    prefix: std::sync::RwLock<Option<String>>,
    skip_sync: bool,
}

impl SuperSave {
    /// Connects (`sqlite://` vs a MySQL DSN), registers the configured user
    /// migrations, and — unless `skip_migrations` is set — runs them
    /// immediately; the MySQL user-migration bookkeeping table is created
    /// lazily on this first run.
    pub async fn connect(url: &str, options: SuperSaveOptions) -> Result<Self> {
        let manager = EntityManager::connect(url).await?;

        let mut runner = MigrationRunner::new();
        for migration in options.migrations {
            runner.register(migration)?;
        }

        let store = Self {
            manager,
            migrations: runner,
            collections: std::sync::RwLock::new(Vec::new()),
            prefix: std::sync::RwLock::new(options.prefix),
            skip_sync: options.skip_sync,
        };

        if !options.skip_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    /// Explicit re-run entry point, callable on startup or on demand;
    /// idempotent thanks to the bookkeeping table.
    pub async fn run_migrations(&self) -> Result<()> {
        self.migrations.run_pending(self.manager.connection()).await
    }

    /// Creates the table (if missing), runs the schema synchronizer unless
    /// configured or called with `skip_sync`, and registers the repository.
    pub async fn add_entity(
        &self,
        def: EntityDefinition,
        skip_sync: Option<bool>,
    ) -> Result<Arc<dyn Repository>> {
        let options = AddEntityOptions { skip_sync: skip_sync.unwrap_or(self.skip_sync) };
        self.manager.add_entity(def, options).await
    }

    /// Converts a [`Collection`] into `(entity + hooks)`, creates its
    /// repository via [`Self::add_entity`], and makes it available to any
    /// attached external HTTP router.
    pub async fn register(&self, collection: Collection) -> Result<Arc<dyn Repository>> {
        let repo = self.add_entity(collection.entity.clone(), None).await?;
        self.collections.write().expect("collections lock poisoned").push(collection);
        Ok(repo)
    }

    /// All collections registered via [`Self::register`], in registration
    /// order — the list an external HTTP router walks to build its route
    /// table, including any overview endpoint.
    pub fn collections(&self) -> Vec<Collection> {
        self.collections.read().expect("collections lock poisoned").clone()
    }

    pub fn get_repository(&self, name: &str, namespace: Option<&str>) -> Result<Arc<dyn Repository>> {
        Ok(self.manager.get_repository(name, namespace)?)
    }

    /// Sets the HTTP path prefix on first use; a second call with a
    /// different value is a configuration error.
    pub fn set_prefix(&self, prefix: impl Into<String>) -> Result<()> {
        let prefix = prefix.into();
        let mut guard = self.prefix.write().expect("prefix lock poisoned");
        match guard.as_ref() {
            Some(existing) if existing != &prefix => {
                return Err(ConfigError::PrefixAlreadySet { existing: existing.clone() }.into());
            }
            _ => {}
        }
        *guard = Some(prefix);
        Ok(())
    }

    pub fn prefix(&self) -> Option<String> {
        self.prefix.read().expect("prefix lock poisoned").clone()
    }

    pub fn connection(&self) -> &Engine {
        self.manager.connection()
    }

    pub async fn close(&self) {
        self.manager.close().await;
    }
}
