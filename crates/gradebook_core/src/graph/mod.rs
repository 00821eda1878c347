//! The domain entity graph.
//!
//! Entities are built from listing payloads. Their children are wrapped in
//! [`Lazy`](crate::cache::Lazy) or [`Paged`](crate::cache::Paged) and fetched on
//! first access, so building a parent never fetches a child. Each entity also knows
//! how to apply the push events that concern it, and only does so for children that
//! are already materialized.

mod chat;
mod class;
mod ledger;
mod lesson;
mod people;
mod subject;
mod task;

pub use chat::{Chat, ChatDirectory, Message};
pub use class::{ClassJournal, ClassStudent, TaughtSubject, TeacherClass};
pub use ledger::{GradeLedger, LedgerScope};
pub use lesson::{AttendanceSheet, LessonSession, Timetable};
pub use people::{Child, Directory};
pub use subject::{StudentSubject, StudentView};
pub use task::{Task, TaskAudience};

pub(crate) use subject::route_student_subjects;

use crate::api::Api;
use crate::cache::Identified;
use crate::domain::{ClassInfo, EntityId, UserInfo};

/// What every entity needs to fetch its children.
#[derive(Debug, Clone)]
pub struct GraphContext {
    pub(crate) api: Api,
    pub(crate) page_size: usize,
}

impl GraphContext {
    pub fn new(api: Api, page_size: usize) -> Self {
        Self { api, page_size }
    }

    pub fn api(&self) -> &Api {
        &self.api
    }
}

impl Identified for UserInfo {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Identified for ClassInfo {
    fn id(&self) -> EntityId {
        self.id
    }
}
