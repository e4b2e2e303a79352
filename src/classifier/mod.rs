pub mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{ChecklistItem, Priority, Quadrant, TaskDraft};

pub use gemini::{GeminiClient, GeminiConfig};

/// A remote text model that is asked for JSON output.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;
}

/// Turns a free-text task description into a [`TaskDraft`], trying the primary model and then
/// the fallback model exactly once each.
pub struct TaskClassifier {
    backend: Arc<dyn GenerativeModel>,
    primary_model: String,
    fallback_model: String,
}

impl TaskClassifier {
    pub fn new(
        backend: Arc<dyn GenerativeModel>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
        }
    }

    pub async fn classify(&self, text: &str, deadline: &str) -> Result<TaskDraft, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Task description is empty".to_string()));
        }

        let prompt = build_prompt(text, deadline);
        let mut last_error = String::new();

        for model in [&self.primary_model, &self.fallback_model] {
            let attempt = match self.backend.generate(model, &prompt).await {
                Ok(raw) => parse_draft(&raw),
                Err(e) => Err(e.to_string()),
            };
            match attempt {
                Ok(draft) => {
                    info!("Classified task with {}: {:?}", model, draft.task_name);
                    return Ok(draft);
                }
                Err(reason) => {
                    warn!("Classifier attempt with {} failed: {}", model, reason);
                    last_error = format!("{}: {}", model, reason);
                }
            }
        }

        Err(AppError::Classifier(last_error))
    }
}

pub fn build_prompt(text: &str, deadline: &str) -> String {
    let input = serde_json::json!({ "task": text, "deadline": deadline });
    format!(
        "You are a manufacturing operations planner. Analyse the task below and return ONLY a \
         JSON object, no Markdown.\n\n\
         Input: {}\n\n\
         Schema:\n\
         {{\"task_name\": \"short imperative title\", \
         \"description\": \"one or two sentences\", \
         \"priority\": \"High\" | \"Medium\" | \"Low\", \
         \"eisenhower\": \"Q1\" | \"Q2\" | \"Q3\" | \"Q4\", \
         \"subtasks\": [\"Step 1\", \"Step 2\"]}}\n\n\
         Rules:\n\
         - Q1 urgent and important, Q2 important not urgent, Q3 urgent not important, Q4 neither.\n\
         - Judge urgency against the deadline.\n\
         - \"subtasks\" is an ordered, non-empty execution checklist.\n",
        input
    )
}

/// Validates and normalises a raw model response.
pub fn parse_draft(raw: &str) -> Result<TaskDraft, String> {
    let trimmed = raw.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let json_str = json_str.strip_suffix("```").unwrap_or(json_str).trim();

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| format!("response is not valid JSON ({}): {}", e, raw))?;

    let object = match value {
        Value::Object(object) => object,
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(object)) => object,
            _ => return Err("response array has no object".to_string()),
        },
        _ => return Err("response is not a JSON object".to_string()),
    };

    let text_field = |key: &str| -> String {
        match object.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };

    let task_name = text_field("task_name");
    if task_name.is_empty() {
        return Err("task_name is missing".to_string());
    }

    let eisenhower = text_field("eisenhower");
    if Quadrant::from_text(&eisenhower).is_none() {
        return Err(format!("eisenhower {:?} has no Q1-Q4 code", eisenhower));
    }

    // Nothing has been done yet, so any `done` flag from the model is ignored.
    let subtasks: Vec<ChecklistItem> = match object.get("subtasks") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.trim().to_string()),
                Value::Object(fields) => fields
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|name| name.trim().to_string()),
                _ => None,
            })
            .filter(|name| !name.is_empty())
            .map(ChecklistItem::new)
            .collect(),
        _ => Vec::new(),
    };
    if subtasks.is_empty() {
        return Err("checklist is empty".to_string());
    }

    Ok(TaskDraft {
        task_name,
        description: text_field("description"),
        priority: Priority::parse_lenient(&text_field("priority")),
        eisenhower,
        subtasks,
    })
}
