use chrono::{Local, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::classifier::TaskClassifier;
use crate::error::AppError;
use crate::models::{NewTaskRequest, Task, TaskStatus};
use crate::repository::{self, LoadStatus, TaskRepository};

pub const DEFAULT_DEADLINE_TIME: &str = "17:00";

/// Whether a mutation reached the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Saved,
    /// The change only exists in memory and is lost on refresh.
    NotSaved(String),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub tasks: Vec<Task>,
    pub load_status: LoadStatus,
}

/// Owns the single writable copy of the task collection for this process. Every action holds
/// the session lock until it has finished, including its network calls, so actions never
/// interleave.
pub struct TaskService {
    repository: TaskRepository,
    classifier: Option<TaskClassifier>,
    session: Mutex<Session>,
}

impl TaskService {
    pub fn new(repository: TaskRepository, classifier: Option<TaskClassifier>) -> Self {
        Self {
            repository,
            classifier,
            session: Mutex::new(Session {
                tasks: Vec::new(),
                load_status: LoadStatus::Unavailable("not loaded yet".to_string()),
            }),
        }
    }

    pub fn classifier_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn store_name(&self) -> &str {
        self.repository.store_name()
    }

    /// Replaces the in-memory collection with the stored one.
    pub async fn refresh(&self) -> LoadStatus {
        let mut session = self.session.lock().await;
        let outcome = self.repository.load().await;
        session.tasks = outcome.tasks;
        session.load_status = outcome.status.clone();
        outcome.status
    }

    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn create_task(&self, req: NewTaskRequest) -> Result<(Task, Persistence), AppError> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Task description is empty".to_string()));
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not set".to_string()))?;
        let deadline = format_deadline(&req.deadline_date, req.deadline_time.as_deref())?;

        let mut session = self.session.lock().await;
        let draft = classifier.classify(text, &deadline).await?;

        let id = repository::next_id(&session.tasks, Utc::now().timestamp());
        let task = Task::from_draft(id, Local::now().date_naive(), deadline, draft);
        info!("Created task {} ({:?})", task.id, task.task_name);
        session.tasks.push(task.clone());

        let persistence = self.persist(&session.tasks).await;
        Ok((task, persistence))
    }

    /// Flips one checklist item and returns its new state.
    pub async fn toggle_subtask(
        &self,
        id: i64,
        item_index: usize,
    ) -> Result<(bool, Persistence), AppError> {
        let mut session = self.session.lock().await;
        let done = repository::toggle_checklist_item(&mut session.tasks, id, item_index)?;
        let persistence = self.persist(&session.tasks).await;
        Ok((done, persistence))
    }

    pub async fn complete_task(&self, id: i64) -> Result<Persistence, AppError> {
        let mut session = self.session.lock().await;
        repository::set_status(&mut session.tasks, id, TaskStatus::Done)?;
        Ok(self.persist(&session.tasks).await)
    }

    pub async fn delete_task(&self, id: i64) -> Result<Persistence, AppError> {
        let mut session = self.session.lock().await;
        if repository::find_task(&session.tasks, id).is_none() {
            return Err(AppError::NotFound);
        }
        let tasks = std::mem::take(&mut session.tasks);
        session.tasks = repository::remove(tasks, id);
        Ok(self.persist(&session.tasks).await)
    }

    async fn persist(&self, tasks: &[Task]) -> Persistence {
        match self.repository.save(tasks).await {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                warn!("Change kept in memory only: {}", e);
                Persistence::NotSaved(e.user_message())
            }
        }
    }
}

/// Builds the `YYYY-MM-DD HH:MM` deadline text from form input.
pub fn format_deadline(date: &str, time: Option<&str>) -> Result<String, AppError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid deadline date {:?}", date)))?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
            .map_err(|_| AppError::BadRequest(format!("Invalid deadline time {:?}", t)))?,
        None => NaiveTime::parse_from_str(DEFAULT_DEADLINE_TIME, "%H:%M")
            .map_err(|_| AppError::BadRequest("Invalid default deadline time".to_string()))?,
    };
    Ok(format!("{} {}", date.format("%Y-%m-%d"), time.format("%H:%M")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::classifier::GenerativeModel;
    use crate::codec;
    use crate::store::{MemoryTableStore, UnavailableTableStore};

    struct FixedModel(&'static str);

    #[async_trait]
    impl GenerativeModel for FixedModel {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    const DRAFT: &str = r#"{"task_name":"Calibrate press #3","description":"...","priority":"High","eisenhower":"Q1","subtasks":[{"name":"Check pressure","done":false}]}"#;

    fn service_with(store: Arc<MemoryTableStore>, response: &'static str) -> TaskService {
        let classifier = TaskClassifier::new(Arc::new(FixedModel(response)), "primary", "fallback");
        TaskService::new(TaskRepository::new(store), Some(classifier))
    }

    fn request(text: &str) -> NewTaskRequest {
        NewTaskRequest {
            text: text.to_string(),
            deadline_date: "2025-06-01".to_string(),
            deadline_time: Some("17:00".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_task_merges_bookkeeping_fields() {
        let store = Arc::new(MemoryTableStore::new());
        let service = service_with(store.clone(), DRAFT);
        service.refresh().await;

        let (task, persistence) = service.create_task(request("Calibrate press #3")).await.unwrap();
        assert_eq!(persistence, Persistence::Saved);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.deadline, "2025-06-01 17:00");
        assert_eq!(task.created_at, Local::now().date_naive());
        assert!(task.id > 0);

        let stored = codec::decode_table(&store.snapshot().await);
        assert_eq!(stored.tasks, vec![task]);
    }

    #[tokio::test]
    async fn test_consecutive_creates_get_distinct_ids() {
        let service = service_with(Arc::new(MemoryTableStore::new()), DRAFT);

        let (first, _) = service.create_task(request("one")).await.unwrap();
        let (second, _) = service.create_task(request("two")).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_failed_classification_creates_nothing() {
        let store = Arc::new(MemoryTableStore::new());
        let service = service_with(store.clone(), "I cannot help with that");

        let err = service.create_task(request("Calibrate press #3")).await.unwrap_err();
        assert!(matches!(err, AppError::Classifier(_)));
        assert!(service.snapshot().await.tasks.is_empty());
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_classifier_is_a_config_error() {
        let service = TaskService::new(TaskRepository::new(Arc::new(MemoryTableStore::new())), None);
        assert!(matches!(
            service.create_task(request("anything")).await,
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unsaved_change_stays_in_memory() {
        let classifier = TaskClassifier::new(Arc::new(FixedModel(DRAFT)), "primary", "fallback");
        let service = TaskService::new(
            TaskRepository::new(Arc::new(UnavailableTableStore::new("no credentials"))),
            Some(classifier),
        );

        let status = service.refresh().await;
        assert!(matches!(status, LoadStatus::Unavailable(_)));

        let (task, persistence) = service.create_task(request("Calibrate press #3")).await.unwrap();
        assert!(matches!(persistence, Persistence::NotSaved(_)));
        assert_eq!(service.snapshot().await.tasks, vec![task]);
    }

    #[tokio::test]
    async fn test_toggle_complete_and_delete() {
        let service = service_with(Arc::new(MemoryTableStore::new()), DRAFT);
        let (task, _) = service.create_task(request("Calibrate press #3")).await.unwrap();

        let (done, persistence) = service.toggle_subtask(task.id, 0).await.unwrap();
        assert!(done);
        assert_eq!(persistence, Persistence::Saved);

        service.complete_task(task.id).await.unwrap();
        service.refresh().await;
        let session = service.snapshot().await;
        assert_eq!(session.tasks[0].status, TaskStatus::Done);
        assert!(session.tasks[0].subtasks[0].done);

        service.delete_task(task.id).await.unwrap();
        service.refresh().await;
        assert!(service.snapshot().await.tasks.is_empty());
        assert!(matches!(service.delete_task(task.id).await, Err(AppError::NotFound)));
    }

    #[test]
    fn deadline_formatting() {
        assert_eq!(format_deadline("2025-06-01", None).unwrap(), "2025-06-01 17:00");
        assert_eq!(format_deadline("2025-06-01", Some("08:30:00")).unwrap(), "2025-06-01 08:30");
        assert!(format_deadline("01/06/2025", None).is_err());
        assert!(format_deadline("2025-06-01", Some("25:00")).is_err());
    }
}
