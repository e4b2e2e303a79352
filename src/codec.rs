//! Field codec between [`Task`] and the flat, all-text rows of the backing table.
//!
//! Every cell is text. The checklist is the only nested field and is stored as a JSON array of
//! `{"name", "done"}` objects. Decoding is lenient: legacy or corrupted checklist cells degrade
//! to an empty checklist and produce a [`CodecWarning`] instead of an error.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate};
use serde_json::{Value, json};

use crate::models::{ChecklistItem, Priority, Task, TaskStatus};
use crate::repository::next_id;

pub const COLUMNS: [&str; 9] = [
    "id",
    "status",
    "created_at",
    "deadline",
    "task_name",
    "description",
    "priority",
    "eisenhower",
    "subtasks",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecWarning {
    /// 1-based data row position, header excluded.
    pub row: usize,
    pub task_id: Option<i64>,
    pub message: String,
}

impl fmt::Display for CodecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.task_id {
            Some(id) => write!(f, "row {} (task {}): {}", self.row, id, self.message),
            None => write!(f, "row {}: {}", self.row, self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct DecodedTable {
    pub tasks: Vec<Task>,
    pub warnings: Vec<CodecWarning>,
}

pub fn encode_subtasks(items: &[ChecklistItem]) -> String {
    Value::Array(
        items
            .iter()
            .map(|item| json!({ "name": item.name, "done": item.done }))
            .collect(),
    )
    .to_string()
}

/// Parses a stored checklist cell. Returns the items and, when the cell had to be discarded,
/// the reason.
pub fn decode_subtasks(text: &str) -> (Vec<ChecklistItem>, Option<String>) {
    let text = text.trim();
    if text.is_empty() {
        return (Vec::new(), None);
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return (
                Vec::new(),
                Some(format!("checklist is not valid JSON ({}), dropped: {}", e, text)),
            );
        }
    };

    let Value::Array(elements) = value else {
        return (
            Vec::new(),
            Some(format!("checklist is not a list, dropped: {}", text)),
        );
    };

    let mut items = Vec::with_capacity(elements.len());
    for element in elements {
        match decode_item(element) {
            Some(item) => items.push(item),
            None => {
                return (
                    Vec::new(),
                    Some(format!("checklist has an unrecognised entry, dropped: {}", text)),
                );
            }
        }
    }
    (items, None)
}

fn decode_item(element: Value) -> Option<ChecklistItem> {
    match element {
        Value::String(name) => Some(ChecklistItem::new(name)),
        Value::Object(mut fields) => {
            let name = match fields.remove("name")? {
                Value::String(name) => name,
                _ => return None,
            };
            let done = match fields.remove("done") {
                None | Some(Value::Null) => false,
                Some(Value::Bool(done)) => done,
                Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
                Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
                Some(_) => return None,
            };
            Some(ChecklistItem { name, done })
        }
        _ => None,
    }
}

/// Cells in [`COLUMNS`] order.
pub fn encode_task(task: &Task) -> Vec<String> {
    vec![
        task.id.to_string(),
        task.status.as_str().to_string(),
        task.created_at.format(DATE_FORMAT).to_string(),
        task.deadline.clone(),
        task.task_name.clone(),
        task.description.clone(),
        task.priority.as_str().to_string(),
        task.eisenhower.clone(),
        encode_subtasks(&task.subtasks),
    ]
}

/// Header row followed by one row per task.
pub fn encode_table(tasks: &[Task]) -> Vec<Vec<String>> {
    let header = COLUMNS.iter().map(|c| c.to_string()).collect();
    std::iter::once(header)
        .chain(tasks.iter().map(encode_task))
        .collect()
}

/// Decodes a whole table whose first row is the header. Rows without a usable id are skipped;
/// rows repeating an earlier id get a fresh one.
pub fn decode_table(table: &[Vec<String>]) -> DecodedTable {
    let mut decoded = DecodedTable::default();
    let Some((header, rows)) = table.split_first() else {
        return decoded;
    };
    let mut positions = Vec::with_capacity(rows.len());

    for (i, cells) in rows.iter().enumerate() {
        let position = i + 1;
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let row = RowView { header, cells };
        match decode_row(&row, position, &mut decoded.warnings) {
            Some(task) => {
                decoded.tasks.push(task);
                positions.push(position);
            }
            None => decoded.warnings.push(CodecWarning {
                row: position,
                task_id: None,
                message: format!("missing or invalid id {:?}, row skipped", row.get("id")),
            }),
        }
    }
    reassign_duplicate_ids(&mut decoded, &positions);
    decoded
}

/// Keeps the first row holding an id and moves later ones past the current maximum.
fn reassign_duplicate_ids(decoded: &mut DecodedTable, positions: &[usize]) {
    let mut seen = HashSet::with_capacity(decoded.tasks.len());
    for i in 0..decoded.tasks.len() {
        let id = decoded.tasks[i].id;
        if seen.insert(id) {
            continue;
        }
        let fresh = next_id(&decoded.tasks, id);
        decoded.tasks[i].id = fresh;
        seen.insert(fresh);
        decoded.warnings.push(CodecWarning {
            row: positions[i],
            task_id: Some(fresh),
            message: format!("duplicate id {}, reassigned to {}", id, fresh),
        });
    }
}

struct RowView<'a> {
    header: &'a [String],
    cells: &'a [String],
}

impl RowView<'_> {
    /// Missing columns and cells trimmed off the end of a ragged row read as empty.
    fn get(&self, column: &str) -> &str {
        self.header
            .iter()
            .position(|h| h.trim() == column)
            .and_then(|idx| self.cells.get(idx))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

fn decode_row(row: &RowView<'_>, position: usize, warnings: &mut Vec<CodecWarning>) -> Option<Task> {
    let id = parse_id(row.get("id"))?;

    let (subtasks, subtask_warning) = decode_subtasks(row.get("subtasks"));
    if let Some(message) = subtask_warning {
        warnings.push(CodecWarning {
            row: position,
            task_id: Some(id),
            message,
        });
    }

    let created_at = match parse_date(row.get("created_at")) {
        Some(date) => date,
        None => {
            let fallback = DateTime::from_timestamp(id, 0)
                .map(|dt| dt.date_naive())
                .unwrap_or_else(|| Local::now().date_naive());
            warnings.push(CodecWarning {
                row: position,
                task_id: Some(id),
                message: format!(
                    "invalid created_at {:?}, using {}",
                    row.get("created_at"),
                    fallback
                ),
            });
            fallback
        }
    };

    Some(Task {
        id,
        status: TaskStatus::parse_lenient(row.get("status")),
        created_at,
        deadline: row.get("deadline").to_string(),
        task_name: row.get("task_name").to_string(),
        description: row.get("description").to_string(),
        priority: Priority::parse_lenient(row.get("priority")),
        eisenhower: row.get("eisenhower").to_string(),
        subtasks,
    })
}

fn parse_id(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        // Spreadsheets sometimes hand integers back as "1717000000.0".
        s.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| s.get(..10).and_then(|prefix| NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok()))
}
