use std::sync::Arc;

use supersave_core::{ConfigError, EntityDefinition, Error, Result};

use crate::conn::Engine;
use crate::mysql::{MySqlRepository, self as mysql};
use crate::naming::{full_name, name_key, table_name};
use crate::registry::Registry;
use crate::repository::Repository;
use crate::sqlite::{self, SqliteRepository};

/// Per-`addEntity` options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddEntityOptions {
    pub skip_sync: bool,
}

/// Owns the connection, holds the `(namespace, name)`-keyed repository
/// registry, and orchestrates `addEntity`. The manager is the sole owner of
/// the registry rather than leaving that to a higher layer.
pub struct EntityManager {
    engine: Engine,
    registry: Registry,
}

impl EntityManager {
    pub fn new(engine: Engine) -> Self {
        Self { engine, registry: Registry::new() }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(Engine::connect(url).await.map_err(Error::Driver)?))
    }

    /// Exposes the raw connection handle, used by the migration runner and
    /// by tests.
    pub fn connection(&self) -> &Engine {
        &self.engine
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Creates the table (if missing), runs the schema synchronizer (unless
    /// `skip_sync`), builds a repository bound to the connection, and
    /// registers it. Re-adding the same entity returns the cached
    /// repository instead of erroring.
    pub async fn add_entity(
        &self,
        def: EntityDefinition,
        options: AddEntityOptions,
    ) -> Result<Arc<dyn Repository>> {
        let key = full_name(&def);
        if let Some(existing) = self.registry.get(&key) {
            return Ok(existing);
        }

        let table = table_name(&def);
        let repository: Arc<dyn Repository> = match &self.engine {
            Engine::Sqlite(pool) => {
                sqlite::ensure_base_table(pool, &table).await?;
                if !options.skip_sync {
                    sqlite::sync(pool, &def, &table).await?;
                }
                Arc::new(SqliteRepository::new(pool.clone(), table, def, self.registry.clone()))
            }
            Engine::MySql(pool) => {
                mysql::ensure_base_table(pool, &table).await?;
                if !options.skip_sync {
                    mysql::sync(pool, &def, &table).await?;
                }
                Arc::new(MySqlRepository::new(pool.clone(), table, def, self.registry.clone()))
            }
        };

        self.registry.insert(key, repository.clone());
        Ok(repository)
    }

    /// Looks up a previously-added repository by entity name and optional
    /// namespace; a missing entry is a [`ConfigError::UnknownRepository`]
    /// listing the currently known keys.
    pub fn get_repository(&self, name: &str, namespace: Option<&str>) -> std::result::Result<Arc<dyn Repository>, ConfigError> {
        self.registry.get_or_err(&name_key(name, namespace))
    }

    /// Releases the underlying connection/pool.
    pub async fn close(&self) {
        self.engine.close().await;
    }
}
