use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Done => "Done",
        }
    }

    /// Unknown or empty text falls back to `Pending`.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("done") {
            Self::Done
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Unknown or empty text falls back to `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Eisenhower urgency/importance quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::Q1, Quadrant::Q2, Quadrant::Q3, Quadrant::Q4];

    pub fn code(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Q1 => "Do first",
            Self::Q2 => "Schedule",
            Self::Q3 => "Delegate",
            Self::Q4 => "Delete",
        }
    }

    /// Finds the first quadrant code mentioned in free text such as `"Q2 - important"`.
    pub fn from_text(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .filter_map(|q| upper.find(q.code()).map(|pos| (pos, q)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, q)| q)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub name: String,
    #[serde(default)]
    pub done: bool,
}

impl ChecklistItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub status: TaskStatus,
    pub created_at: NaiveDate,
    pub deadline: String,
    pub task_name: String,
    pub description: String,
    pub priority: Priority,
    pub eisenhower: String,
    pub subtasks: Vec<ChecklistItem>,
}

impl Task {
    /// Merges a classifier draft with the bookkeeping fields of a fresh task.
    pub fn from_draft(id: i64, created_at: NaiveDate, deadline: String, draft: TaskDraft) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            created_at,
            deadline,
            task_name: draft.task_name,
            description: draft.description,
            priority: draft.priority,
            eisenhower: draft.eisenhower,
            subtasks: draft.subtasks,
        }
    }

    pub fn quadrant(&self) -> Option<Quadrant> {
        Quadrant::from_text(&self.eisenhower)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

/// Structured output of the classifier, before bookkeeping fields are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub task_name: String,
    pub description: String,
    pub priority: Priority,
    pub eisenhower: String,
    pub subtasks: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub text: String,
    pub deadline_date: String,
    #[serde(default)]
    pub deadline_time: Option<String>,
}
