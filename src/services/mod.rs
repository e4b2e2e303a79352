pub mod task_service;

pub use task_service::{Persistence, Session, TaskService, format_deadline};
