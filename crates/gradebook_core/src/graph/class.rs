//! crates/gradebook_core/src/graph/class.rs
//!
//! The teacher's side of the graph: taught subjects, the classes each subject is
//! taught in, the students of a class and the class journal.

use chrono::NaiveDate;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::api::Api;
use crate::cache::{Identified, Lazy, Paged};
use crate::domain::{ClassInfo, EntityId, JournalRow, SessionInfo, StudentInfo, TaskInfo, TaughtSubjectInfo};
use crate::endpoints;
use crate::events::{fan_out, fan_out_reports, observed, Branch, EventHub, Outcome, PushEvent, RouteReport};
use crate::ports::PortResult;

use super::{GradeLedger, GraphContext, LedgerScope, LessonSession, Task, TaskAudience};

//=========================================================================================
// Taught subjects
//=========================================================================================

#[derive(Debug)]
pub struct TaughtSubject {
    id: EntityId,
    name: String,
    classes: Lazy<Vec<Arc<TeacherClass>>>,
}

impl Identified for TaughtSubject {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl TaughtSubject {
    pub(crate) fn new(info: TaughtSubjectInfo, ctx: &GraphContext) -> Self {
        let subject_id = info.id;
        let class_ctx = ctx.clone();
        Self {
            id: info.id,
            name: info.name,
            classes: Lazy::new(move || {
                let ctx = class_ctx.clone();
                async move {
                    let infos: Vec<ClassInfo> = ctx.api.get(&endpoints::classes(subject_id)).await?;
                    Ok(infos
                        .into_iter()
                        .map(|info| Arc::new(TeacherClass::new(info, subject_id, &ctx)))
                        .collect())
                }
            }),
        }
    }

    pub(crate) fn lazy_list(ctx: &GraphContext) -> Lazy<Vec<Arc<TaughtSubject>>> {
        let ctx = ctx.clone();
        Lazy::new(move || {
            let ctx = ctx.clone();
            async move {
                let infos: Vec<TaughtSubjectInfo> = ctx.api.get(endpoints::taught_subjects()).await?;
                Ok(infos
                    .into_iter()
                    .map(|info| Arc::new(TaughtSubject::new(info, &ctx)))
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

    pub async fn classes(&self) -> PortResult<Vec<Arc<TeacherClass>>> {
        self.classes.get().await
    }

    pub async fn class(&self, class_id: EntityId) -> PortResult<Option<Arc<TeacherClass>>> {
        let classes = self.classes.get().await?;
        Ok(classes.into_iter().find(|class| class.id == class_id))
    }

    pub fn are_classes_loaded(&self) -> bool {
        self.classes.is_realized()
    }

    /// Walks the materialized classes this event is about. Session events name a
    /// class only, so every subject taught in that class receives them.
    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        if subject_of(event).is_some_and(|subject_id| subject_id != self.id) {
            return RouteReport::dropped();
        }
        let Some(classes) = self.classes.peek() else {
            return RouteReport::dropped();
        };
        let Some(class_id) = class_of(event) else {
            return RouteReport::dropped();
        };
        let reports: Vec<BoxFuture<'_, RouteReport>> = classes
            .iter()
            .filter(|class| class.id == class_id)
            .map(|class| class.route(event, hub).boxed())
            .collect();
        fan_out_reports(reports).await
    }
}

fn subject_of(event: &PushEvent) -> Option<EntityId> {
    match event {
        PushEvent::TaskCreated { subject_id, .. } => Some(*subject_id),
        PushEvent::AssessmentCreated(r)
        | PushEvent::AssessmentChanged(r)
        | PushEvent::AssessmentDeleted(r) => Some(r.subject_id),
        PushEvent::FinalAssessmentCreated { subject_id, .. } => Some(*subject_id),
        _ => None,
    }
}

fn class_of(event: &PushEvent) -> Option<EntityId> {
    match event {
        PushEvent::TaskCreated { class_id, .. } => Some(*class_id),
        PushEvent::AssessmentCreated(r)
        | PushEvent::AssessmentChanged(r)
        | PushEvent::AssessmentDeleted(r) => Some(r.class_id),
        PushEvent::FinalAssessmentCreated { class_id, .. } => Some(*class_id),
        PushEvent::SessionCreated(r) | PushEvent::SessionClosed(r) => Some(r.class_id),
        _ => None,
    }
}

//=========================================================================================
// Classes
//=========================================================================================

/// A class as seen from one subject its teacher teaches there.
#[derive(Debug)]
pub struct TeacherClass {
    id: EntityId,
    subject_id: EntityId,
    name: String,
    students_count: u32,
    tasks: Paged<Arc<Task>>,
    students: Lazy<Vec<Arc<ClassStudent>>>,
    journal: Lazy<Arc<ClassJournal>>,
    sessions: Paged<Arc<LessonSession>>,
    api: Api,
}

impl Identified for TeacherClass {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl TeacherClass {
    pub(crate) fn new(info: ClassInfo, subject_id: EntityId, ctx: &GraphContext) -> Self {
        let class_id = info.id;

        let students_api = ctx.api.clone();
        let students = Lazy::new(move || {
            let api = students_api.clone();
            async move {
                let infos: Vec<StudentInfo> =
                    api.get(&endpoints::class_students(subject_id, class_id)).await?;
                Ok(infos
                    .into_iter()
                    .map(|info| Arc::new(ClassStudent::new(info, subject_id, class_id, api.clone())))
                    .collect())
            }
        });

        let journal_api = ctx.api.clone();
        let journal = Lazy::new(move || {
            let api = journal_api.clone();
            async move {
                let rows: Vec<JournalRow> =
                    api.get(&endpoints::class_journal(subject_id, class_id)).await?;
                Ok(Arc::new(ClassJournal {
                    subject_id,
                    class_id,
                    rows: Mutex::new(rows),
                    api,
                }))
            }
        });

        Self {
            id: class_id,
            subject_id,
            name: info.name,
            students_count: info.students_count,
            tasks: Task::collection(
                endpoints::class_tasks(subject_id, class_id),
                TaskAudience::Teacher,
                ctx.api.clone(),
                ctx.page_size,
            ),
            students,
            journal,
            sessions: LessonSession::collection(class_id, ctx.api.clone(), ctx.page_size),
            api: ctx.api.clone(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn subject_id(&self) -> EntityId {
        self.subject_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn students_count(&self) -> u32 {
        self.students_count
    }

    pub fn tasks(&self) -> &Paged<Arc<Task>> {
        &self.tasks
    }

    pub fn sessions(&self) -> &Paged<Arc<LessonSession>> {
        &self.sessions
    }

    pub async fn students(&self) -> PortResult<Vec<Arc<ClassStudent>>> {
        self.students.get().await
    }

    pub async fn student(&self, student_id: EntityId) -> PortResult<Option<Arc<ClassStudent>>> {
        let students = self.students.get().await?;
        Ok(students.into_iter().find(|student| student.id == student_id))
    }

    pub async fn journal(&self) -> PortResult<Arc<ClassJournal>> {
        self.journal.get().await
    }

    pub fn is_journal_loaded(&self) -> bool {
        self.journal.is_realized()
    }

    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        due_date: Option<NaiveDate>,
    ) -> PortResult<Arc<Task>> {
        let info: TaskInfo = self
            .api
            .post(
                &endpoints::class_tasks(self.subject_id, self.id),
                &json!({ "title": title, "description": description, "dueDate": due_date }),
            )
            .await?;
        let task = Arc::new(Task::new(info, TaskAudience::Teacher, self.api.clone()));
        if self.tasks.is_realized() {
            self.tasks.insert_head(task.clone());
        }
        Ok(task)
    }

    pub async fn open_session(&self) -> PortResult<Arc<LessonSession>> {
        let info: SessionInfo = self
            .api
            .post(&endpoints::class_sessions(self.id), &json!({ "subjectId": self.subject_id }))
            .await?;
        let session = Arc::new(LessonSession::new(info, self.api.clone()));
        if self.sessions.is_realized() {
            self.sessions.insert_head(session.clone());
        }
        Ok(session)
    }

    //=====================================================================================
    // Event application
    //=====================================================================================

    /// One branch per view the event touches. An assessment change reaches both the
    /// student's ledger and the journal row, each only if it was loaded.
    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        let branches: Vec<Branch<'_>> = match event {
            PushEvent::TaskCreated { task_id, .. } => {
                vec![observed(hub, event, self.apply_task_created(*task_id))]
            }
            PushEvent::AssessmentCreated(r)
            | PushEvent::AssessmentChanged(r)
            | PushEvent::AssessmentDeleted(r) => vec![
                observed(hub, event, self.apply_to_student(r.student_id, event)),
                observed(hub, event, self.apply_to_journal(r.student_id)),
            ],
            PushEvent::FinalAssessmentCreated { student_id, .. } => {
                vec![observed(hub, event, self.apply_to_student(*student_id, event))]
            }
            PushEvent::SessionCreated(r) => {
                vec![observed(hub, event, self.apply_session_created(r.session_id))]
            }
            PushEvent::SessionClosed(r) => {
                let session_id = r.session_id;
                vec![observed(hub, event, async move { Ok(self.apply_session_closed(session_id)) })]
            }
            _ => Vec::new(),
        };
        fan_out(branches).await
    }

    async fn apply_task_created(&self, task_id: EntityId) -> PortResult<Outcome> {
        if !self.tasks.is_realized() {
            return Ok(Outcome::Dropped);
        }
        Ok(match self.tasks.append(task_id).await? {
            true => Outcome::Applied,
            false => Outcome::Dropped,
        })
    }

    async fn apply_to_student(&self, student_id: EntityId, event: &PushEvent) -> PortResult<Outcome> {
        let Some(students) = self.students.peek() else {
            return Ok(Outcome::Dropped);
        };
        match students.iter().find(|student| student.id == student_id) {
            Some(student) => student.apply_assessment(event).await,
            None => Ok(Outcome::Dropped),
        }
    }

    async fn apply_to_journal(&self, student_id: EntityId) -> PortResult<Outcome> {
        match self.journal.peek() {
            Some(journal) => journal.refresh_row(student_id).await,
            None => Ok(Outcome::Dropped),
        }
    }

    async fn apply_session_created(&self, session_id: EntityId) -> PortResult<Outcome> {
        if !self.sessions.is_realized() {
            return Ok(Outcome::Dropped);
        }
        Ok(match self.sessions.append(session_id).await? {
            true => Outcome::Applied,
            false => Outcome::Dropped,
        })
    }

    fn apply_session_closed(&self, session_id: EntityId) -> Outcome {
        match self.sessions.find_by_id(session_id) {
            Some(session) => session.apply_closed(),
            None => Outcome::Dropped,
        }
    }
}

//=========================================================================================
// Students and the journal
//=========================================================================================

#[derive(Debug)]
pub struct ClassStudent {
    id: EntityId,
    full_name: String,
    ledger: Lazy<Arc<GradeLedger>>,
}

impl Identified for ClassStudent {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl ClassStudent {
    fn new(info: StudentInfo, subject_id: EntityId, class_id: EntityId, api: Api) -> Self {
        let scope = LedgerScope::Teacher {
            subject_id,
            class_id,
            student_id: info.id,
        };
        Self {
            id: info.id,
            full_name: info.full_name,
            ledger: GradeLedger::lazy(scope, api),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub async fn ledger(&self) -> PortResult<Arc<GradeLedger>> {
        self.ledger.get().await
    }

    pub fn is_ledger_loaded(&self) -> bool {
        self.ledger.is_realized()
    }

    async fn apply_assessment(&self, event: &PushEvent) -> PortResult<Outcome> {
        match self.ledger.peek() {
            Some(ledger) => ledger.apply_event(event).await,
            None => Ok(Outcome::Dropped),
        }
    }
}

/// Per-student averages of one class in one subject.
#[derive(Debug)]
pub struct ClassJournal {
    subject_id: EntityId,
    class_id: EntityId,
    rows: Mutex<Vec<JournalRow>>,
    api: Api,
}

impl ClassJournal {
    pub fn rows(&self) -> Vec<JournalRow> {
        self.rows.lock().clone()
    }

    pub fn row(&self, student_id: EntityId) -> Option<JournalRow> {
        self.rows
            .lock()
            .iter()
            .find(|row| row.student_id == student_id)
            .cloned()
    }

    /// Re-fetches one student's row. Students the journal does not list are
    /// dropped.
    pub(crate) async fn refresh_row(&self, student_id: EntityId) -> PortResult<Outcome> {
        if self.row(student_id).is_none() {
            return Ok(Outcome::Dropped);
        }
        let fresh: JournalRow = self
            .api
            .get(&endpoints::journal_row(self.subject_id, self.class_id, student_id))
            .await?;
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|row| row.student_id == student_id) {
            Some(slot) => {
                *slot = fresh;
                Ok(Outcome::Applied)
            }
            None => {
                debug!("Journal row {} vanished during refresh", student_id);
                Ok(Outcome::Dropped)
            }
        }
    }
}
