//! crates/gradebook_core/src/graph/subject.rs
//!
//! A subject as a student sees it: its tasks and the student's grade ledger.
//! Parents get the same entity for each of their children's subjects.

use std::sync::Arc;

use crate::cache::{Identified, Lazy, Paged};
use crate::domain::{EntityId, SubjectInfo};
use crate::endpoints;
use crate::events::{observed, Branch, EventHub, Outcome, PushEvent};
use crate::ports::PortResult;

use super::{GradeLedger, GraphContext, LedgerScope, Task, TaskAudience};

/// Whose subjects these are: the signed-in student's own, or a parent's child's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentView {
    Own,
    Child { child_id: EntityId },
}

impl StudentView {
    pub(crate) fn root(&self) -> String {
        match self {
            StudentView::Own => "student".to_string(),
            StudentView::Child { child_id } => endpoints::child_root(*child_id),
        }
    }
}

#[derive(Debug)]
pub struct StudentSubject {
    id: EntityId,
    name: String,
    teacher_name: Option<String>,
    view: StudentView,
    tasks: Paged<Arc<Task>>,
    ledger: Lazy<Arc<GradeLedger>>,
}

impl Identified for StudentSubject {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl StudentSubject {
    pub(crate) fn new(info: SubjectInfo, view: StudentView, ctx: &GraphContext) -> Self {
        let tasks = Task::collection(
            endpoints::subject_tasks(&view.root(), info.id),
            TaskAudience::Student(view),
            ctx.api.clone(),
            ctx.page_size,
        );
        let ledger = GradeLedger::lazy(
            LedgerScope::Student {
                view,
                subject_id: info.id,
            },
            ctx.api.clone(),
        );
        Self {
            id: info.id,
            name: info.name,
            teacher_name: info.teacher_name,
            view,
            tasks,
            ledger,
        }
    }

    /// The lazily fetched subject list of `view`.
    pub(crate) fn lazy_list(view: StudentView, ctx: &GraphContext) -> Lazy<Vec<Arc<StudentSubject>>> {
        let ctx = ctx.clone();
        Lazy::new(move || {
            let ctx = ctx.clone();
            async move {
                let infos: Vec<SubjectInfo> = ctx.api.get(&endpoints::subjects(&view.root())).await?;
                Ok(infos
                    .into_iter()
                    .map(|info| Arc::new(StudentSubject::new(info, view, &ctx)))
                    .collect())
            }
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn teacher_name(&self) -> Option<&str> {
        self.teacher_name.as_deref()
    }

    pub fn view(&self) -> StudentView {
        self.view
    }

    pub fn tasks(&self) -> &Paged<Arc<Task>> {
        &self.tasks
    }

    pub async fn ledger(&self) -> PortResult<Arc<GradeLedger>> {
        self.ledger.get().await
    }

    pub fn is_ledger_loaded(&self) -> bool {
        self.ledger.is_realized()
    }

    pub(crate) async fn apply_task_created(&self, task_id: EntityId) -> PortResult<Outcome> {
        if !self.tasks.is_realized() {
            return Ok(Outcome::Dropped);
        }
        Ok(match self.tasks.append(task_id).await? {
            true => Outcome::Applied,
            false => Outcome::Dropped,
        })
    }

    pub(crate) fn apply_task_progress(&self, task_id: EntityId, completed: bool) -> Outcome {
        match self.tasks.find_by_id(task_id) {
            Some(task) => task.apply_progress(completed),
            None => Outcome::Dropped,
        }
    }

    pub(crate) async fn apply_assessment(&self, event: &PushEvent) -> PortResult<Outcome> {
        match self.ledger.peek() {
            Some(ledger) => ledger.apply_event(event).await,
            None => Ok(Outcome::Dropped),
        }
    }
}

/// Branches for every materialized subject an event concerns. The caller has
/// already checked that the event is about this student.
pub(crate) fn route_student_subjects<'a>(
    subjects: &'a [Arc<StudentSubject>],
    event: &'a PushEvent,
    hub: &'a EventHub,
) -> Vec<Branch<'a>> {
    let subject_id = match event {
        PushEvent::TaskCreated { subject_id, .. } => *subject_id,
        PushEvent::TaskCompleted(p) | PushEvent::TaskUncompleted(p) => p.subject_id,
        PushEvent::AssessmentCreated(r)
        | PushEvent::AssessmentChanged(r)
        | PushEvent::AssessmentDeleted(r) => r.subject_id,
        PushEvent::FinalAssessmentCreated { subject_id, .. } => *subject_id,
        _ => return Vec::new(),
    };
    subjects
        .iter()
        .filter(|subject| subject.id == subject_id)
        .map(|subject| -> Branch<'a> {
            match event {
                PushEvent::TaskCreated { task_id, .. } => {
                    observed(hub, event, subject.apply_task_created(*task_id))
                }
                PushEvent::TaskCompleted(p) => {
                    observed(hub, event, async move { Ok(subject.apply_task_progress(p.task_id, true)) })
                }
                PushEvent::TaskUncompleted(p) => {
                    observed(hub, event, async move { Ok(subject.apply_task_progress(p.task_id, false)) })
                }
                _ => observed(hub, event, subject.apply_assessment(event)),
            }
        })
        .collect()
}
