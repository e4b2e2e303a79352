use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use super::{Table, TableStore};
use crate::error::AppError;

/// Embedded substitute for the remote sheet. Each row of the table is one JSON array of cells.
pub struct SqliteTableStore {
    db: SqlitePool,
}

impl SqliteTableStore {
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: SqlitePool) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .map_err(|e| AppError::Database(e.into()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn read_table(&self) -> Result<Table, AppError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT row_index, cells FROM sheet_rows ORDER BY row_index")
                .fetch_all(&self.db)
                .await?;

        let mut table = Vec::with_capacity(rows.len());
        for (row_index, cells) in rows {
            let cells: Vec<String> = serde_json::from_str(&cells).map_err(|e| {
                tracing::error!("sheet_rows row {} is not a JSON array: {}", row_index, e);
                AppError::Json(e)
            })?;
            table.push(cells);
        }
        Ok(table)
    }

    async fn overwrite_table(&self, table: &Table) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM sheet_rows")
            .execute(&mut *tx)
            .await?;

        for (row_index, cells) in table.iter().enumerate() {
            sqlx::query("INSERT INTO sheet_rows (row_index, cells) VALUES (?, ?)")
                .bind(row_index as i64)
                .bind(serde_json::to_string(cells)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
