//! crates/gradebook_core/src/roles/parent.rs

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use crate::cache::Lazy;
use crate::domain::EntityId;
use crate::events::{fan_out_reports, EventHub, EventKind, PushEvent, RouteReport};
use crate::graph::{ChatDirectory, Child, GraphContext};
use crate::ports::PortResult;

pub(crate) const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::TaskCreated,
    EventKind::TaskCompleted,
    EventKind::TaskUncompleted,
    EventKind::AssessmentCreated,
    EventKind::AssessmentChanged,
    EventKind::AssessmentDeleted,
    EventKind::FinalAssessmentCreated,
    EventKind::ChatCreated,
    EventKind::ChatMessageReceived,
];

#[derive(Debug)]
pub struct ParentRole {
    children: Lazy<Vec<Arc<Child>>>,
    chats: ChatDirectory,
}

impl ParentRole {
    pub(crate) fn new(ctx: &GraphContext) -> Self {
        Self {
            children: Child::lazy_list(ctx),
            chats: ChatDirectory::new(ctx),
        }
    }

    pub async fn children(&self) -> PortResult<Vec<Arc<Child>>> {
        self.children.get().await
    }

    pub async fn child(&self, child_id: EntityId) -> PortResult<Option<Arc<Child>>> {
        let children = self.children.get().await?;
        Ok(children.into_iter().find(|child| child.id() == child_id))
    }

    pub fn are_children_loaded(&self) -> bool {
        self.children.is_realized()
    }

    pub fn chats(&self) -> &ChatDirectory {
        &self.chats
    }

    /// Siblings in one class all receive a task-created event for that class.
    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        if let PushEvent::ChatCreated { .. } | PushEvent::ChatMessageReceived { .. } = event {
            return self.chats.route(event, hub).await;
        }
        let Some(children) = self.children.peek() else {
            return RouteReport::dropped();
        };
        let reports: Vec<BoxFuture<'_, RouteReport>> = children
            .iter()
            .filter(|child| child.concerns(event))
            .map(|child| child.route(event, hub).boxed())
            .collect();
        fan_out_reports(reports).await
    }
}
