//! crates/gradebook_core/src/roles/student.rs

use std::sync::Arc;

use crate::cache::Lazy;
use crate::domain::{EntityId, Role};
use crate::events::{fan_out, EventHub, EventKind, PushEvent, RouteReport};
use crate::graph::{route_student_subjects, ChatDirectory, GraphContext, StudentSubject, StudentView, Timetable};
use crate::ports::PortResult;

use super::route_timetable;

pub(crate) const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::TaskCreated,
    EventKind::TaskCompleted,
    EventKind::TaskUncompleted,
    EventKind::AssessmentCreated,
    EventKind::AssessmentChanged,
    EventKind::AssessmentDeleted,
    EventKind::FinalAssessmentCreated,
    EventKind::TimetableChanged,
    EventKind::ChatCreated,
    EventKind::ChatMessageReceived,
];

#[derive(Debug)]
pub struct StudentRole {
    user_id: EntityId,
    subjects: Lazy<Vec<Arc<StudentSubject>>>,
    timetable: Lazy<Arc<Timetable>>,
    chats: ChatDirectory,
}

impl StudentRole {
    pub(crate) fn new(user_id: EntityId, ctx: &GraphContext) -> Self {
        Self {
            user_id,
            subjects: StudentSubject::lazy_list(StudentView::Own, ctx),
            timetable: Timetable::lazy(Role::Student, ctx.api.clone()),
            chats: ChatDirectory::new(ctx),
        }
    }

    pub async fn subjects(&self) -> PortResult<Vec<Arc<StudentSubject>>> {
        self.subjects.get().await
    }

    pub async fn subject(&self, subject_id: EntityId) -> PortResult<Option<Arc<StudentSubject>>> {
        let subjects = self.subjects.get().await?;
        Ok(subjects.into_iter().find(|subject| subject.id() == subject_id))
    }

    pub fn are_subjects_loaded(&self) -> bool {
        self.subjects.is_realized()
    }

    pub async fn timetable(&self) -> PortResult<Arc<Timetable>> {
        self.timetable.get().await
    }

    pub fn chats(&self) -> &ChatDirectory {
        &self.chats
    }

    /// Progress and grade events name a student; those for anyone else are dropped.
    fn is_mine(&self, event: &PushEvent) -> bool {
        match event {
            PushEvent::TaskCompleted(p) | PushEvent::TaskUncompleted(p) => p.student_id == self.user_id,
            PushEvent::AssessmentCreated(r)
            | PushEvent::AssessmentChanged(r)
            | PushEvent::AssessmentDeleted(r) => r.student_id == self.user_id,
            PushEvent::FinalAssessmentCreated { student_id, .. } => *student_id == self.user_id,
            _ => true,
        }
    }

    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        match event {
            PushEvent::TimetableChanged { class_id } => {
                route_timetable(&self.timetable, *class_id, event, hub).await
            }
            PushEvent::ChatCreated { .. } | PushEvent::ChatMessageReceived { .. } => {
                self.chats.route(event, hub).await
            }
            _ if !self.is_mine(event) => RouteReport::dropped(),
            _ => match self.subjects.peek() {
                Some(subjects) => fan_out(route_student_subjects(&subjects, event, hub)).await,
                None => RouteReport::dropped(),
            },
        }
    }
}
