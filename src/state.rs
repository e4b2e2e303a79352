use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::classifier::{GeminiClient, TaskClassifier};
use crate::config::{AppConfig, StoreConfig};
use crate::error::AppError;
use crate::repository::TaskRepository;
use crate::services::TaskService;
use crate::store::{
    MemoryTableStore, SheetsTableStore, SqliteTableStore, TableStore, UnavailableTableStore,
};
use crate::views::{Notice, Views};

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub views: Arc<Views>,
    /// Result of the last action, shown once by the page its redirect lands on.
    flash: Arc<Mutex<Option<Notice>>>,
}

impl AppState {
    pub fn new(tasks: TaskService) -> Result<Self, AppError> {
        Ok(Self {
            tasks: Arc::new(tasks),
            views: Arc::new(Views::new()?),
            flash: Arc::new(Mutex::new(None)),
        })
    }

    pub async fn set_notice(&self, notice: Notice) {
        *self.flash.lock().await = Some(notice);
    }

    pub async fn take_notice(&self) -> Option<Notice> {
        self.flash.lock().await.take()
    }

    /// Wires the store and classifier named by `config`. Missing or broken configuration leaves
    /// the matching part unavailable instead of failing startup.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let store = build_store(config).await;
        let repository = TaskRepository::new(store).with_conflict_check(config.conflict_check);

        let classifier = match &config.gemini {
            Some(gemini) => match GeminiClient::new(gemini.clone()) {
                Ok(client) => Some(TaskClassifier::new(
                    Arc::new(client),
                    config.primary_model.clone(),
                    config.fallback_model.clone(),
                )),
                Err(e) => {
                    warn!("Classifier disabled: {}", e);
                    None
                }
            },
            None => {
                warn!("GEMINI_API_KEY is not set, task creation is disabled");
                None
            }
        };

        Self::new(TaskService::new(repository, classifier))
    }
}

async fn build_store(config: &AppConfig) -> Arc<dyn TableStore> {
    let built: Result<Arc<dyn TableStore>, AppError> = match &config.store {
        StoreConfig::Sheets(sheets) => {
            SheetsTableStore::new(sheets.clone()).map(|s| Arc::new(s) as Arc<dyn TableStore>)
        }
        StoreConfig::Sqlite { database_url } => SqliteTableStore::connect(database_url, config.timeout)
            .await
            .map(|s| Arc::new(s) as Arc<dyn TableStore>),
        StoreConfig::Memory => Ok(Arc::new(MemoryTableStore::new()) as Arc<dyn TableStore>),
        StoreConfig::Missing(reason) => Err(AppError::Config(reason.clone())),
    };

    match built {
        Ok(store) => {
            info!("Using {} task store", store.name());
            store
        }
        Err(e) => {
            warn!("Task store unavailable: {}", e);
            let reason = match e {
                AppError::Config(reason) => reason,
                other => other.to_string(),
            };
            Arc::new(UnavailableTableStore::new(reason))
        }
    }
}
