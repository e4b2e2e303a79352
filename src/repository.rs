use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::codec::{self, CodecWarning};
use crate::error::AppError;
use crate::models::{Task, TaskStatus};
use crate::store::{Table, TableStore, normalize_table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// The store could not be read; the task list is empty because of the failure, not because
    /// there is no data.
    Unavailable(String),
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub tasks: Vec<Task>,
    pub status: LoadStatus,
    pub warnings: Vec<CodecWarning>,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        self.status == LoadStatus::Loaded
    }
}

/// The only component that talks to the backing table. Reads and writes always cover the
/// whole table.
pub struct TaskRepository {
    store: Arc<dyn TableStore>,
    conflict_check: bool,
    /// Table as last read or written, compared against the live table before each save when
    /// `conflict_check` is on.
    last_seen: Mutex<Option<Table>>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            conflict_check: false,
            last_seen: Mutex::new(None),
        }
    }

    /// Rejects a save when the table changed since this repository last read or wrote it.
    pub fn with_conflict_check(mut self, enabled: bool) -> Self {
        self.conflict_check = enabled;
        self
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub async fn load(&self) -> LoadOutcome {
        let table = match self.store.read_table().await {
            Ok(table) => table,
            Err(e) => {
                warn!("Failed to load tasks from {}: {}", self.store.name(), e);
                return LoadOutcome {
                    tasks: Vec::new(),
                    status: LoadStatus::Unavailable(e.user_message()),
                    warnings: Vec::new(),
                };
            }
        };

        let decoded = codec::decode_table(&table);
        for warning in &decoded.warnings {
            warn!("Repaired stored task data: {}", warning);
        }
        *self.last_seen.lock().await = Some(normalize_table(&table));

        info!("Loaded {} tasks from {}", decoded.tasks.len(), self.store.name());
        LoadOutcome {
            tasks: decoded.tasks,
            status: LoadStatus::Loaded,
            warnings: decoded.warnings,
        }
    }

    /// Clears the table and writes the header plus every task.
    pub async fn save(&self, tasks: &[Task]) -> Result<(), AppError> {
        let table = codec::encode_table(tasks);
        let mut last_seen = self.last_seen.lock().await;

        if self.conflict_check {
            let current = normalize_table(&self.store.read_table().await?);
            // A table never read by this process only counts as unchanged when it is empty.
            let expected = last_seen.clone().unwrap_or_default();
            if current != expected {
                warn!("Refusing to overwrite {}: table changed since last load", self.store.name());
                return Err(AppError::Conflict(
                    "The task table was changed by another session.".to_string(),
                ));
            }
        }

        self.store.overwrite_table(&table).await.map_err(|e| {
            warn!("Failed to save {} tasks to {}: {}", tasks.len(), self.store.name(), e);
            e
        })?;
        *last_seen = Some(normalize_table(&table));

        info!("Saved {} tasks to {}", tasks.len(), self.store.name());
        Ok(())
    }
}

pub fn find_task<'a>(tasks: &'a [Task], id: i64) -> Option<&'a Task> {
    tasks.iter().find(|t| t.id == id)
}

/// Filters out the task with `id`. Not durable until saved.
pub fn remove(tasks: Vec<Task>, id: i64) -> Vec<Task> {
    tasks.into_iter().filter(|t| t.id != id).collect()
}

pub fn set_status(tasks: &mut [Task], id: i64, status: TaskStatus) -> Result<(), AppError> {
    let task = tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(AppError::NotFound)?;
    task.status = status;
    Ok(())
}

/// Flips one checklist item and returns its new `done` value.
pub fn toggle_checklist_item(
    tasks: &mut [Task],
    id: i64,
    item_index: usize,
) -> Result<bool, AppError> {
    let item = tasks
        .iter_mut()
        .find(|t| t.id == id)
        .and_then(|t| t.subtasks.get_mut(item_index))
        .ok_or(AppError::NotFound)?;
    item.done = !item.done;
    Ok(item.done)
}

/// Timestamp-derived id, bumped past the current maximum on collision.
pub fn next_id(tasks: &[Task], timestamp: i64) -> i64 {
    if tasks.iter().any(|t| t.id == timestamp) {
        tasks.iter().map(|t| t.id).max().unwrap_or(timestamp) + 1
    } else {
        timestamp
    }
}

pub fn pending(tasks: &[Task]) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_pending()).collect()
}
