//! crates/gradebook_core/src/roles/admin.rs

use crate::events::{EventHub, EventKind, PushEvent, RouteReport};
use crate::graph::{ChatDirectory, Directory, GraphContext};

pub(crate) const SUBSCRIPTIONS: &[EventKind] = &[EventKind::ChatCreated, EventKind::ChatMessageReceived];

#[derive(Debug)]
pub struct AdminRole {
    directory: Directory,
    chats: ChatDirectory,
}

impl AdminRole {
    pub(crate) fn new(ctx: &GraphContext) -> Self {
        Self {
            directory: Directory::new(ctx),
            chats: ChatDirectory::new(ctx),
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn chats(&self) -> &ChatDirectory {
        &self.chats
    }

    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        self.chats.route(event, hub).await
    }
}
