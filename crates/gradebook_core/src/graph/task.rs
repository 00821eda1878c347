//! crates/gradebook_core/src/graph/task.rs
//!
//! Homework tasks, as seen by a student, a parent or a teacher.

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use crate::api::Api;
use crate::cache::{Identified, Paged};
use crate::domain::{EntityId, TaskInfo};
use crate::endpoints;
use crate::events::Outcome;
use crate::ports::{PortError, PortResult};

use super::StudentView;

/// Whose list a task sits in. Only a student can change their own progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAudience {
    Student(StudentView),
    Teacher,
}

impl TaskAudience {
    fn task_path(&self, task_id: EntityId) -> String {
        match self {
            TaskAudience::Student(view) => endpoints::task(&view.root(), task_id),
            TaskAudience::Teacher => endpoints::teacher_task(task_id),
        }
    }
}

#[derive(Debug)]
pub struct Task {
    id: EntityId,
    subject_id: EntityId,
    title: String,
    description: String,
    due_date: Option<NaiveDate>,
    completed: Mutex<bool>,
    audience: TaskAudience,
    api: Api,
}

impl Identified for Task {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Task {
    pub(crate) fn new(info: TaskInfo, audience: TaskAudience, api: Api) -> Self {
        Self {
            id: info.id,
            subject_id: info.subject_id,
            title: info.title,
            description: info.description,
            due_date: info.due_date,
            completed: Mutex::new(info.completed),
            audience,
            api,
        }
    }

    /// A paginated task list behind `list_path`.
    pub(crate) fn collection(
        list_path: String,
        audience: TaskAudience,
        api: Api,
        page_size: usize,
    ) -> Paged<Arc<Task>> {
        let page_api = api.clone();
        Paged::new(
            page_size,
            move |query| {
                let (api, path) = (page_api.clone(), list_path.clone());
                async move {
                    let infos: Vec<TaskInfo> = api.get_with(&path, &query).await?;
                    Ok(infos
                        .into_iter()
                        .map(|info| Arc::new(Task::new(info, audience, api.clone())))
                        .collect())
                }
            },
            move |task_id| {
                let api = api.clone();
                async move {
                    let info: TaskInfo = api.get(&audience.task_path(task_id)).await?;
                    Ok(Arc::new(Task::new(info, audience, api)))
                }
            },
        )
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn subject_id(&self) -> EntityId {
        self.subject_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn audience(&self) -> TaskAudience {
        self.audience
    }

    pub fn is_completed(&self) -> bool {
        *self.completed.lock()
    }

    pub async fn mark_completed(&self) -> PortResult<()> {
        self.set_completion(true).await
    }

    pub async fn mark_uncompleted(&self) -> PortResult<()> {
        self.set_completion(false).await
    }

    async fn set_completion(&self, completed: bool) -> PortResult<()> {
        if self.audience != TaskAudience::Student(StudentView::Own) {
            return Err(PortError::Forbidden(
                "only the student can change task progress".to_string(),
            ));
        }
        let info: TaskInfo = self
            .api
            .put(&endpoints::task_completion(self.id), &json!({ "completed": completed }))
            .await?;
        *self.completed.lock() = info.completed;
        Ok(())
    }

    /// Flag flip from a task-completed / task-uncompleted event.
    pub(crate) fn apply_progress(&self, completed: bool) -> Outcome {
        *self.completed.lock() = completed;
        Outcome::Applied
    }
}
