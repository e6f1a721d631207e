use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sqlx::Row;
use supersave_core::{ConfigError, Result};

use crate::conn::{Engine, EngineKind};

/// Context handed to a [`Migration`]'s `run` closure: just the raw
/// connection. `Engine` wraps a pool handle, so handing over an owned
/// clone is cheap and sidesteps tying the closure's future to a borrow's
/// lifetime.
pub struct MigrationContext {
    pub connection: Engine,
}

type RunFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A user-supplied, named, run-once operation. `engine` restricts it to
/// one backend; `None` runs on both. User migrations are arbitrary
/// closures rather than a generated plan of schema-diff steps.
#[derive(Clone)]
pub struct Migration {
    pub name: String,
    pub engine: Option<EngineKind>,
    run: Arc<dyn Fn(MigrationContext) -> RunFuture + Send + Sync>,
}

impl Migration {
    /// Builds a migration from an async closure taking an owned
    /// [`MigrationContext`].
    pub fn new<F, Fut>(name: impl Into<String>, engine: Option<EngineKind>, run: F) -> Self
    where
        F: Fn(MigrationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            engine,
            run: Arc::new(move |ctx| Box::pin(run(ctx))),
        }
    }

    async fn run(&self, ctx: MigrationContext) -> Result<()> {
        (self.run)(ctx).await
    }
}

/// Records executed migrations durably and replays the configured list in
/// declared order, skipping engine-mismatched and already-recorded entries.
pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    /// Registers a migration; rejects re-registering a name already
    /// present.
    pub fn register(&mut self, migration: Migration) -> std::result::Result<(), ConfigError> {
        if self.migrations.iter().any(|m| m.name == migration.name) {
            return Err(ConfigError::DuplicateMigration { name: migration.name });
        }
        self.migrations.push(migration);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Creates `_supersave_migrations(name PRIMARY KEY)` if absent.
    /// Idempotent; safe to call on every startup.
    async fn ensure_table(engine: &Engine) -> Result<()> {
        match engine {
            Engine::Sqlite(pool) => {
                sqlx::query(r#"CREATE TABLE IF NOT EXISTS "_supersave_migrations" (name TEXT PRIMARY KEY)"#)
                    .execute(pool)
                    .await?;
            }
            Engine::MySql(pool) => {
                sqlx::query("CREATE TABLE IF NOT EXISTS `_supersave_migrations` (name VARCHAR(255) PRIMARY KEY)")
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn already_ran(engine: &Engine, name: &str) -> Result<bool> {
        let found = match engine {
            Engine::Sqlite(pool) => {
                sqlx::query(r#"SELECT name FROM "_supersave_migrations" WHERE name = ?"#)
                    .bind(name)
                    .fetch_optional(pool)
                    .await?
            }
            Engine::MySql(pool) => {
                sqlx::query("SELECT name FROM `_supersave_migrations` WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await?
            }
        };
        Ok(found.is_some())
    }

    async fn record(engine: &Engine, name: &str) -> Result<()> {
        match engine {
            Engine::Sqlite(pool) => {
                sqlx::query(r#"INSERT INTO "_supersave_migrations" (name) VALUES (?)"#)
                    .bind(name)
                    .execute(pool)
                    .await?;
            }
            Engine::MySql(pool) => {
                sqlx::query("INSERT INTO `_supersave_migrations` (name) VALUES (?)")
                    .bind(name)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Count of recorded migrations, exposed for tests asserting the
    /// bookkeeping table is stable across repeated runs.
    pub async fn recorded_count(engine: &Engine) -> Result<i64> {
        Self::ensure_table(engine).await?;
        let row = match engine {
            Engine::Sqlite(pool) => {
                sqlx::query(r#"SELECT COUNT(*) AS c FROM "_supersave_migrations""#).fetch_one(pool).await?
            }
            Engine::MySql(pool) => {
                sqlx::query("SELECT COUNT(*) AS c FROM `_supersave_migrations`").fetch_one(pool).await?
            }
        };
        Ok(row.try_get::<i64, _>("c")?)
    }

    /// Runs every registered migration in declared order, skipping
    /// engine-mismatched and already-recorded ones. On failure of a given
    /// migration, propagates immediately and does not record it or run any
    /// migration after it.
    pub async fn run_pending(&self, engine: &Engine) -> Result<()> {
        Self::ensure_table(engine).await?;
        for migration in &self.migrations {
            if let Some(required) = migration.engine {
                if required != engine.kind() {
                    continue;
                }
            }
            if Self::already_ran(engine, &migration.name).await? {
                continue;
            }
            migration.run(MigrationContext { connection: engine.clone() }).await.map_err(|err| {
                log::error!("migration {:?} failed: {err}", migration.name);
                err
            })?;
            Self::record(engine, &migration.name).await?;
            log::info!("ran migration {:?}", migration.name);
        }
        Ok(())
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_migration_name_is_rejected_at_registration() {
        let mut runner = MigrationRunner::new();
        runner
            .register(Migration::new("seed", None, |_ctx| async { Ok(()) }))
            .unwrap();
        let err = runner
            .register(Migration::new("seed", None, |_ctx| async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMigration { .. }));
    }
}
