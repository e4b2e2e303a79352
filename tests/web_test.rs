use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Local;
use http_body_util::BodyExt;
use tower::ServiceExt;

use task_commander::classifier::{GenerativeModel, TaskClassifier};
use task_commander::codec;
use task_commander::error::AppError;
use task_commander::models::TaskStatus;
use task_commander::repository::TaskRepository;
use task_commander::routes::router;
use task_commander::services::TaskService;
use task_commander::state::AppState;
use task_commander::store::MemoryTableStore;

const CALIBRATE: &str = r#"{"task_name":"Calibrate press #3","description":"...","priority":"High","eisenhower":"Q1","subtasks":[{"name":"Check pressure","done":false}]}"#;

struct CannedModel(&'static str);

#[async_trait]
impl GenerativeModel for CannedModel {
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Ok(self.0.to_string())
    }
}

async fn setup(response: Option<&'static str>) -> (Router, AppState, Arc<MemoryTableStore>) {
    let store = Arc::new(MemoryTableStore::new());
    let classifier = response.map(|r| {
        TaskClassifier::new(Arc::new(CannedModel(r)), "gemini-primary", "gemini-fallback")
    });
    let service = TaskService::new(TaskRepository::new(store.clone()), classifier);
    let state = AppState::new(service).expect("Failed to build state");
    state.tasks.refresh().await;
    (router(state.clone()), state, store)
}

struct Reply {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

async fn send(app: &Router, method: &str, uri: &str, form: Option<&str>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match form {
        Some(form) => {
            builder = builder.header("content-type", "application/x-www-form-urlencoded");
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .expect("request failed");
    let status = response.status();
    let location = response
        .headers()
        .get("location")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Reply { status, location, body: String::from_utf8_lossy(&bytes).to_string() }
}

/// Posts an action, checks it redirects to the task list, and returns the page it lands on.
async fn act(app: &Router, uri: &str, form: Option<&str>) -> String {
    let reply = send(app, "POST", uri, form).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "POST {} should redirect", uri);
    assert_eq!(reply.location.as_deref(), Some("/"));
    assert!(reply.body.is_empty());

    let page = send(app, "GET", "/", None).await;
    assert_eq!(page.status, StatusCode::OK);
    page.body
}

const CREATE_FORM: &str =
    "text=Calibrate+press+%233&deadline_date=2025-06-01&deadline_time=17%3A00";

#[tokio::test]
async fn test_create_task_end_to_end() {
    let (app, state, store) = setup(Some(CALIBRATE)).await;

    let page = act(&app, "/tasks", Some(CREATE_FORM)).await;
    assert!(page.contains("notice success"));
    assert!(page.contains("Calibrate press #3"));
    assert!(page.contains("Check pressure"));

    let session = state.tasks.snapshot().await;
    assert_eq!(session.tasks.len(), 1);
    let task = &session.tasks[0];
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.deadline, "2025-06-01 17:00");
    assert_eq!(task.created_at, Local::now().date_naive());

    let stored = codec::decode_table(&store.snapshot().await);
    assert_eq!(stored.tasks, session.tasks);
}

#[tokio::test]
async fn test_toggle_then_reload_keeps_item_done() {
    let (app, state, _store) = setup(Some(CALIBRATE)).await;
    act(&app, "/tasks", Some(CREATE_FORM)).await;
    let id = state.tasks.snapshot().await.tasks[0].id;

    act(&app, &format!("/tasks/{}/subtasks/0/toggle", id), None).await;

    let page = act(&app, "/refresh", None).await;
    assert!(page.contains("Tasks reloaded"));
    assert!(page.contains("<s>Check pressure</s>"));

    let task = &state.tasks.snapshot().await.tasks[0];
    assert!(task.subtasks[0].done);
    assert_eq!(task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_done_task_moves_to_report_only() {
    let (app, state, _store) = setup(Some(CALIBRATE)).await;
    act(&app, "/tasks", Some(CREATE_FORM)).await;
    let id = state.tasks.snapshot().await.tasks[0].id;

    let page = act(&app, &format!("/tasks/{}/done", id), None).await;
    assert!(page.contains("0 task(s) not finished"));

    let matrix = send(&app, "GET", "/matrix", None).await.body;
    assert!(matrix.contains("Q1 Do first (0)"));

    let report = send(&app, "GET", "/report", None).await.body;
    assert!(report.contains("Calibrate press #3"));
    assert!(report.contains("<td>Done</td>"));
}

#[tokio::test]
async fn test_delete_removes_task_from_store() {
    let (app, state, store) = setup(Some(CALIBRATE)).await;
    act(&app, "/tasks", Some(CREATE_FORM)).await;
    let id = state.tasks.snapshot().await.tasks[0].id;

    act(&app, &format!("/tasks/{}/delete", id), None).await;
    act(&app, "/refresh", None).await;

    assert!(state.tasks.snapshot().await.tasks.is_empty());
    let stored = codec::decode_table(&store.snapshot().await);
    assert!(stored.tasks.iter().all(|t| t.id != id));
}

#[tokio::test]
async fn test_missing_api_key_blocks_creation() {
    let (app, state, store) = setup(None).await;

    let page = send(&app, "GET", "/", None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("GEMINI_API_KEY is not set"));

    let page = act(&app, "/tasks", Some(CREATE_FORM)).await;
    assert!(page.contains("Missing configuration"));
    assert!(state.tasks.snapshot().await.tasks.is_empty());
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_unusable_model_output_asks_for_retry() {
    let (app, state, _store) = setup(Some("Sorry, I can't do that.")).await;

    let page = act(&app, "/tasks", Some(CREATE_FORM)).await;
    assert!(page.contains("Please retry with a clearer description"));
    assert!(state.tasks.snapshot().await.tasks.is_empty());
}

#[tokio::test]
async fn test_unknown_task_shows_not_found_notice() {
    let (app, _state, _store) = setup(Some(CALIBRATE)).await;

    let page = act(&app, "/tasks/42/done", None).await;
    assert!(page.contains("Task not found"));
}

#[tokio::test]
async fn test_health() {
    let (app, _state, _store) = setup(None).await;
    let reply = send(&app, "GET", "/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_reloading_after_create_does_not_create_again() {
    let (app, state, _store) = setup(Some(CALIBRATE)).await;

    let page = act(&app, "/tasks", Some(CREATE_FORM)).await;
    assert!(page.contains("notice success"));

    // A browser reload repeats the GET it was redirected to, not the POST.
    let reloaded = send(&app, "GET", "/", None).await;
    assert_eq!(reloaded.status, StatusCode::OK);
    assert!(!reloaded.body.contains("notice success"));
    assert_eq!(state.tasks.snapshot().await.tasks.len(), 1);
}

#[tokio::test]
async fn test_reloading_after_toggle_does_not_flip_back() {
    let (app, state, _store) = setup(Some(CALIBRATE)).await;
    act(&app, "/tasks", Some(CREATE_FORM)).await;
    let id = state.tasks.snapshot().await.tasks[0].id;

    act(&app, &format!("/tasks/{}/subtasks/0/toggle", id), None).await;
    send(&app, "GET", "/", None).await;

    assert!(state.tasks.snapshot().await.tasks[0].subtasks[0].done);
}
