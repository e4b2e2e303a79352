use chrono::Local;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{Quadrant, Task};
use crate::repository::{self, LoadStatus};
use crate::services::{Session, task_service::DEFAULT_DEADLINE_TIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// One-off message rendered above the page content after an action.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

#[derive(Serialize)]
struct QuadrantGroup<'a> {
    code: &'static str,
    label: &'static str,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct ReportRow<'a> {
    task: &'a Task,
    checked: usize,
}

/// Page header data shared by every screen.
pub struct PageFrame<'a> {
    pub store_name: &'a str,
    pub notice: Option<&'a Notice>,
}

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, AppError> {
        let mut env = Environment::new();
        env.add_template("layout.html", include_str!("../templates/layout.html"))?;
        env.add_template("tasks.html", include_str!("../templates/tasks.html"))?;
        env.add_template("matrix.html", include_str!("../templates/matrix.html"))?;
        env.add_template("report.html", include_str!("../templates/report.html"))?;
        Ok(Self { env })
    }

    /// Pending tasks, newest first, plus the creation form.
    pub fn tasks_page(
        &self,
        frame: &PageFrame<'_>,
        session: &Session,
        classifier_available: bool,
    ) -> Result<String, AppError> {
        let pending: Vec<&Task> = repository::pending(&session.tasks).into_iter().rev().collect();
        let template = self.env.get_template("tasks.html")?;
        Ok(template.render(context! {
            store_name => frame.store_name,
            notice => frame.notice,
            load_error => load_error(session),
            pending => pending,
            classifier_available => classifier_available,
            today => Local::now().date_naive().format("%Y-%m-%d").to_string(),
            default_time => DEFAULT_DEADLINE_TIME,
        })?)
    }

    /// Pending tasks grouped by Eisenhower quadrant.
    pub fn matrix_page(&self, frame: &PageFrame<'_>, session: &Session) -> Result<String, AppError> {
        let pending = repository::pending(&session.tasks);
        let quadrants: Vec<QuadrantGroup<'_>> = Quadrant::ALL
            .into_iter()
            .map(|q| QuadrantGroup {
                code: q.code(),
                label: q.label(),
                tasks: pending.iter().copied().filter(|t| t.quadrant() == Some(q)).collect(),
            })
            .collect();
        let unclassified: Vec<&Task> = pending
            .iter()
            .copied()
            .filter(|t| t.quadrant().is_none())
            .collect();

        let template = self.env.get_template("matrix.html")?;
        Ok(template.render(context! {
            store_name => frame.store_name,
            notice => frame.notice,
            load_error => load_error(session),
            quadrants => quadrants,
            unclassified => unclassified,
        })?)
    }

    /// Every task, done or not, as a table.
    pub fn report_page(&self, frame: &PageFrame<'_>, session: &Session) -> Result<String, AppError> {
        let rows: Vec<ReportRow<'_>> = session
            .tasks
            .iter()
            .map(|task| ReportRow {
                task,
                checked: task.subtasks.iter().filter(|s| s.done).count(),
            })
            .collect();
        let pending_count = repository::pending(&session.tasks).len();

        let template = self.env.get_template("report.html")?;
        Ok(template.render(context! {
            store_name => frame.store_name,
            notice => frame.notice,
            load_error => load_error(session),
            tasks => rows,
            done_count => session.tasks.len() - pending_count,
            pending_count => pending_count,
        })?)
    }
}

fn load_error(session: &Session) -> Option<&str> {
    match &session.load_status {
        LoadStatus::Loaded => None,
        LoadStatus::Unavailable(reason) => Some(reason.as_str()),
    }
}
