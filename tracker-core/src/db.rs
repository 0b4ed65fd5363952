use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};

use crate::error::StoreResult;

/// Handle to the SQLite store. Cheap to clone; every clone shares one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default location of the database file for a service, e.g. `tasks.db`.
    pub fn default_path(file_name: &str) -> anyhow::Result<PathBuf> {
        let state_dir = dirs::state_dir()
            .or_else(dirs::config_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
            .ok_or_else(|| anyhow::anyhow!("Could not find state directory"))?;

        Ok(state_dir.join("tracker").join("data").join(file_name))
    }

    /// Opens (creating if needed) the database file at `path` and brings the
    /// schema up to date.
    pub async fn connect(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&database_url)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let db = Database { pool };
        db.migrate().await?;

        info!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// A private in-memory database. The pool holds a single connection that
    /// never expires, since the data lives and dies with it.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }
}

/// Commits `tx` if the unit of work succeeded, otherwise rolls it back and
/// hands the original error on.
pub(crate) async fn finish<T>(
    tx: Transaction<'static, Sqlite>,
    result: StoreResult<T>,
) -> StoreResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
