//! SQLite access layer for the Tessera reconciliation engine.
//!
//! One [`TesseraDb`] handle is scoped to a single reconciliation run and
//! dropped on every exit path. The engine assumes it is the sole schema
//! writer for the duration of a run; serializing concurrent runs against
//! the same database is the host's responsibility.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tessera_db::{TesseraDb, Result};
//!
//! let db = TesseraDb::open("data/store.sqlite3").await?;
//! if !db.table_exists("order_header").await? {
//!     db.execute("CREATE TABLE IF NOT EXISTS order_header (id TEXT PRIMARY KEY)").await?;
//! }
//! ```

mod error;
mod ident;
mod introspect;

pub use error::{DbError, Result};
pub use ident::{quote_ident, validate_bare_identifier, validate_identifier};
pub use introspect::ActualColumn;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Handle to one live SQLite database.
#[derive(Clone)]
pub struct TesseraDb {
    pub(crate) pool: SqlitePool,
}

impl TesseraDb {
    /// Open or create a database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.apply_pragmas().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.apply_pragmas().await?;

        Ok(db)
    }

    /// WAL for concurrent readers, NORMAL sync, and enforced foreign keys.
    async fn apply_pragmas(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");

        let db = TesseraDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = TesseraDb::open_existing(&db_path).await;
        assert!(result.is_err());
    }
}
