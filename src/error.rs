use axum::{http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl AppError {
    /// Message shown to the user on the rendered page.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(msg) => format!("Missing configuration: {}", msg),
            AppError::StoreUnavailable(msg) => format!("Task store unavailable: {}", msg),
            AppError::Classifier(_) => {
                "The AI could not analyse this task. Please retry with a clearer description."
                    .to_string()
            }
            AppError::Conflict(msg) => format!("{} Refresh to load the latest tasks.", msg),
            AppError::NotFound => "Task not found".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(_) | AppError::Http(_) | AppError::Json(_) => {
                "Backend error occurred".to_string()
            }
            AppError::Template(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Config(_) | AppError::StoreUnavailable(_) | AppError::Classifier(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Http(e) => {
                error!("upstream http error: {}", e);
                StatusCode::BAD_GATEWAY
            }
            AppError::Json(e) => {
                error!("json error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Template(e) => {
                error!("template error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.user_message()).into_response()
    }
}
