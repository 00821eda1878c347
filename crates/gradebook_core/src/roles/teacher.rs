//! crates/gradebook_core/src/roles/teacher.rs

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use crate::cache::Lazy;
use crate::domain::{EntityId, Role};
use crate::events::{fan_out_reports, EventHub, EventKind, PushEvent, RouteReport};
use crate::graph::{ChatDirectory, GraphContext, TaughtSubject, Timetable};
use crate::ports::PortResult;

use super::route_timetable;

pub(crate) const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::TaskCreated,
    EventKind::AssessmentCreated,
    EventKind::AssessmentChanged,
    EventKind::AssessmentDeleted,
    EventKind::FinalAssessmentCreated,
    EventKind::TimetableChanged,
    EventKind::SessionCreated,
    EventKind::SessionClosed,
    EventKind::ChatCreated,
    EventKind::ChatMessageReceived,
];

#[derive(Debug)]
pub struct TeacherRole {
    subjects: Lazy<Vec<Arc<TaughtSubject>>>,
    timetable: Lazy<Arc<Timetable>>,
    chats: ChatDirectory,
}

impl TeacherRole {
    pub(crate) fn new(ctx: &GraphContext) -> Self {
        Self {
            subjects: TaughtSubject::lazy_list(ctx),
            timetable: Timetable::lazy(Role::Teacher, ctx.api.clone()),
            chats: ChatDirectory::new(ctx),
        }
    }

    pub async fn subjects(&self) -> PortResult<Vec<Arc<TaughtSubject>>> {
        self.subjects.get().await
    }

    pub async fn subject(&self, subject_id: EntityId) -> PortResult<Option<Arc<TaughtSubject>>> {
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

    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        match event {
            PushEvent::TimetableChanged { class_id } => {
                route_timetable(&self.timetable, *class_id, event, hub).await
            }
            PushEvent::ChatCreated { .. } | PushEvent::ChatMessageReceived { .. } => {
                self.chats.route(event, hub).await
            }
            _ => {
                let Some(subjects) = self.subjects.peek() else {
                    return RouteReport::dropped();
                };
                let reports: Vec<BoxFuture<'_, RouteReport>> = subjects
                    .iter()
                    .map(|subject| subject.route(event, hub).boxed())
                    .collect();
                fan_out_reports(reports).await
            }
        }
    }
}
