pub mod task;

pub use task::{ChecklistItem, NewTaskRequest, Priority, Quadrant, Task, TaskDraft, TaskStatus};
