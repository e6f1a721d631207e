use sqlx::mysql::MySqlPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{MySqlPool, SqlitePool};

/// A live connection to one of the two supported backends.
///
/// Kept as two concrete pool types instead of `sqlx::AnyPool` because the
/// schema synchronizer needs backend-specific introspection queries that
/// `sqlx::Any` cannot express.
#[derive(Debug, Clone)]
pub enum Engine {
    Sqlite(SqlitePool),
    MySql(MySqlPool),
}

impl Engine {
    /// Dispatches on the `sqlite://` prefix (spec §6.1): anything else is
    /// handed to the MySQL/MariaDB driver as a standard DSN, mirroring
    /// `server/src/store.rs::DbStore::connect`'s use of
    /// `sqlx::any::AnyConnectOptions::from_str` to pick a driver from the
    /// connection string, generalized here to pick a concrete pool type.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        if let Some(path) = url.strip_prefix("sqlite://") {
            let pool = SqlitePoolOptions::new().connect(&format!("sqlite://{path}")).await?;
            Ok(Self::Sqlite(pool))
        } else {
            let pool = MySqlPoolOptions::new().connect(url).await?;
            Ok(Self::MySql(pool))
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Self::Sqlite(_) => EngineKind::Sqlite,
            Self::MySql(_) => EngineKind::MySql,
        }
    }

    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
    }
}

/// Tag identifying which backend an [`Engine`] wraps, used anywhere code
/// needs to branch on dialect without matching the pool itself (SQL
/// generation, migration user-facing `engine` filter in §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Sqlite,
    MySql,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }
}
