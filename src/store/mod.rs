pub mod google_auth;
pub mod memory;
pub mod sheets;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::AppError;

pub use google_auth::SheetsCredentials;
pub use memory::MemoryTableStore;
pub use sheets::{SheetsConfig, SheetsTableStore};
pub use sqlite::SqliteTableStore;

/// A text-only table: the first row is the header, every cell is text.
pub type Table = Vec<Vec<String>>;

/// The backing store collaborator. Only full-table reads and full-table overwrites exist;
/// there is no per-row update.
#[async_trait]
pub trait TableStore: Send + Sync {
    fn name(&self) -> &str;
    async fn read_table(&self) -> Result<Table, AppError>;
    async fn overwrite_table(&self, table: &Table) -> Result<(), AppError>;
}

/// Stands in for a store whose configuration is missing, so the app still starts.
pub struct UnavailableTableStore {
    reason: String,
}

impl UnavailableTableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TableStore for UnavailableTableStore {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn read_table(&self) -> Result<Table, AppError> {
        Err(AppError::StoreUnavailable(self.reason.clone()))
    }

    async fn overwrite_table(&self, _table: &Table) -> Result<(), AppError> {
        Err(AppError::StoreUnavailable(self.reason.clone()))
    }
}

/// Drops trailing empty cells and rows so tables read back from different stores compare equal.
pub fn normalize_table(table: &Table) -> Table {
    let mut rows: Table = table
        .iter()
        .map(|row| {
            let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |p| p + 1);
            row[..len].to_vec()
        })
        .collect();
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows
}
