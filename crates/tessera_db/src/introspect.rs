//! Live-schema introspection and DDL execution.
//!
//! This is the narrow contract the reconciliation engine consumes:
//! `table_exists`, `list_columns`, `execute`. Nothing here interprets the
//! results; classification belongs to the validator.

use crate::error::Result;
use crate::ident::{quote_ident, validate_identifier};
use crate::TesseraDb;
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// One column as reported by the live database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualColumn {
    /// Column name as stored in the catalog
    pub name: String,
    /// Raw declared type, parameters included (e.g. `VARCHAR(255)`)
    pub raw_type: String,
    /// Whether the column carries a NOT NULL constraint
    pub not_null: bool,
    /// Whether the column is part of the primary key
    pub is_primary_key: bool,
}

impl TesseraDb {
    /// Check whether a table exists in the live database.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// List the columns of a table in catalog order.
    ///
    /// Returns an empty list for a table with no catalog entry; callers that
    /// care about existence should probe [`Self::table_exists`] first.
    pub async fn list_columns(&self, table: &str) -> Result<Vec<ActualColumn>> {
        validate_identifier(table)?;

        // PRAGMA arguments cannot be bound, so the (validated) name is
        // quoted and spliced.
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ActualColumn {
                name: row.try_get::<String, _>("name")?,
                raw_type: row.try_get::<String, _>("type")?,
                not_null: row.try_get::<i64, _>("notnull")? != 0,
                is_primary_key: row.try_get::<i64, _>("pk")? != 0,
            });
        }
        Ok(columns)
    }

    /// Check whether an index exists in the live database.
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?")
            .bind(index)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Execute a single DDL statement, returning the affected-row count.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::TesseraDb;
    use tempfile::TempDir;

    #[tokio::test]
    async fn table_exists_reflects_catalog() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();

        assert!(!db.table_exists("orders").await.unwrap());
        db.execute("CREATE TABLE orders (id TEXT PRIMARY KEY)")
            .await
            .unwrap();
        assert!(db.table_exists("orders").await.unwrap());

        db.close().await;
    }

    #[tokio::test]
    async fn list_columns_preserves_order_and_flags() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();

        db.execute(
            "CREATE TABLE order_line (id TEXT PRIMARY KEY, qty INTEGER NOT NULL, note VARCHAR(50))",
        )
        .await
        .unwrap();

        let cols = db.list_columns("order_line").await.unwrap();
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].name, "id");
        assert!(cols[0].is_primary_key);
        assert_eq!(cols[1].name, "qty");
        assert!(cols[1].not_null);
        assert!(!cols[1].is_primary_key);
        assert_eq!(cols[2].raw_type, "VARCHAR(50)");
        assert!(!cols[2].not_null);

        db.close().await;
    }

    #[tokio::test]
    async fn list_columns_on_missing_table_is_empty() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();

        let cols = db.list_columns("nope").await.unwrap();
        assert!(cols.is_empty());

        db.close().await;
    }
}
