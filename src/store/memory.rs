use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Table, TableStore};
use crate::error::AppError;

/// Process-local table, for running without credentials and for tests.
#[derive(Default)]
pub struct MemoryTableStore {
    table: RwLock<Table>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: Table) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    pub async fn snapshot(&self) -> Table {
        self.table.read().await.clone()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_table(&self) -> Result<Table, AppError> {
        Ok(self.table.read().await.clone())
    }

    async fn overwrite_table(&self, table: &Table) -> Result<(), AppError> {
        *self.table.write().await = table.clone();
        Ok(())
    }
}
