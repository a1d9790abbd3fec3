use std::path::Path;

use anyhow::{Context, Result};
use deadpool::managed::{self, Pool, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

/// Milliseconds a connection waits on a locked database before erroring
const BUSY_TIMEOUT_MS: u64 = 5_000;

pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

/// WAL lets readers proceed while a writer commits; FULL sync makes a
/// returned insert survive a crash.
async fn configure_connection(conn: &Connection) -> Result<(), LibsqlError> {
    // These pragmas report their new value as a row, so query instead of execute
    for pragma in [
        format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"),
        "PRAGMA journal_mode = WAL".to_string(),
        "PRAGMA synchronous = FULL".to_string(),
    ] {
        let mut rows = conn.query(&pragma, ()).await?;
        while rows.next().await?.is_some() {}
    }
    Ok(())
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        configure_connection(&conn).await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(LibsqlError::QueryReturnedNoRows)?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

/// Open (or create) a local database file and wrap it in a pool
pub async fn open_pool(path: impl AsRef<Path>) -> Result<LibsqlPool> {
    let path = path.as_ref();
    let database = libsql::Builder::new_local(path)
        .build()
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;

    let pool = Pool::builder(LibsqlManager::new(database))
        .config(managed::PoolConfig::default())
        .build()
        .context("failed to build connection pool")?;

    Ok(pool)
}
