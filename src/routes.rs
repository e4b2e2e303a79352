use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::Router;
use tracing::warn;

use crate::error::AppError;
use crate::models::NewTaskRequest;
use crate::repository::LoadStatus;
use crate::services::Persistence;
use crate::state::AppState;
use crate::views::{Notice, PageFrame};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_tasks))
        .route("/matrix", get(matrix))
        .route("/report", get(report))
        .route("/health", get(health))
        .route("/refresh", post(refresh))
        .route("/tasks", post(create_task))
        .route("/tasks/{id}/subtasks/{index}/toggle", post(toggle_subtask))
        .route("/tasks/{id}/done", post(complete_task))
        .route("/tasks/{id}/delete", post(delete_task))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_tasks(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let notice = state.take_notice().await;
    render_tasks(&state, notice).await
}

async fn matrix(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let session = state.tasks.snapshot().await;
    let frame = PageFrame { store_name: state.tasks.store_name(), notice: None };
    Ok(Html(state.views.matrix_page(&frame, &session)?))
}

async fn report(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let session = state.tasks.snapshot().await;
    let frame = PageFrame { store_name: state.tasks.store_name(), notice: None };
    Ok(Html(state.views.report_page(&frame, &session)?))
}

async fn refresh(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let notice = match state.tasks.refresh().await {
        LoadStatus::Loaded => Notice::success("Tasks reloaded"),
        // The banner from the session already explains the failure.
        LoadStatus::Unavailable(_) => Notice::warning("Reload failed"),
    };
    Ok(back_to_tasks(&state, notice).await)
}

async fn create_task(
    State(state): State<AppState>,
    Form(req): Form<NewTaskRequest>,
) -> Result<Redirect, AppError> {
    let notice = match state.tasks.create_task(req).await {
        Ok((task, persistence)) => {
            persistence_notice(&persistence, &format!("Saved \"{}\"", task.task_name))
        }
        Err(e) => action_error(e)?,
    };
    Ok(back_to_tasks(&state, notice).await)
}

async fn toggle_subtask(
    State(state): State<AppState>,
    Path((id, index)): Path<(i64, usize)>,
) -> Result<Redirect, AppError> {
    let notice = match state.tasks.toggle_subtask(id, index).await {
        Ok((done, persistence)) => {
            let verb = if done { "checked" } else { "unchecked" };
            persistence_notice(&persistence, &format!("Checklist item {}", verb))
        }
        Err(e) => action_error(e)?,
    };
    Ok(back_to_tasks(&state, notice).await)
}

async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let notice = match state.tasks.complete_task(id).await {
        Ok(persistence) => persistence_notice(&persistence, "Task marked as done"),
        Err(e) => action_error(e)?,
    };
    Ok(back_to_tasks(&state, notice).await)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let notice = match state.tasks.delete_task(id).await {
        Ok(persistence) => persistence_notice(&persistence, "Task deleted"),
        Err(e) => action_error(e)?,
    };
    Ok(back_to_tasks(&state, notice).await)
}

/// Post/redirect/get: the browser lands on `/`, so reloading never repeats the action.
async fn back_to_tasks(state: &AppState, notice: Notice) -> Redirect {
    state.set_notice(notice).await;
    Redirect::to("/")
}

async fn render_tasks(state: &AppState, notice: Option<Notice>) -> Result<Html<String>, AppError> {
    let session = state.tasks.snapshot().await;
    let frame = PageFrame {
        store_name: state.tasks.store_name(),
        notice: notice.as_ref(),
    };
    Ok(Html(state.views.tasks_page(
        &frame,
        &session,
        state.tasks.classifier_available(),
    )?))
}

fn persistence_notice(persistence: &Persistence, success: &str) -> Notice {
    match persistence {
        Persistence::Saved => Notice::success(success),
        Persistence::NotSaved(reason) => Notice::warning(format!(
            "{}, but it was NOT saved and will be lost on refresh: {}",
            success, reason
        )),
    }
}

/// Turns an action failure into a page notice. Rendering failures still propagate.
fn action_error(e: AppError) -> Result<Notice, AppError> {
    match e {
        AppError::Template(_) => Err(e),
        other => {
            warn!("Action failed: {}", other);
            Ok(Notice::error(other.user_message()))
        }
    }
}
