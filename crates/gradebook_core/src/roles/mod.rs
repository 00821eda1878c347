//! crates/gradebook_core/src/roles/mod.rs
//!
//! The top of the entity graph for each kind of signed-in user.
//!
//! Roles share every mechanism below them. They differ only in the collections
//! they expose and in the events they listen to.

mod admin;
mod parent;
mod student;
mod teacher;

pub use admin::AdminRole;
pub use parent::ParentRole;
pub use student::StudentRole;
pub use teacher::TeacherRole;

use std::sync::Arc;

use crate::cache::Lazy;
use crate::domain::{EntityId, Identity, Role};
use crate::events::{fan_out, observed, EventHub, EventKind, PushEvent, RouteReport};
use crate::graph::{ChatDirectory, GraphContext, Timetable};

#[derive(Debug)]
pub enum RoleGraph {
    Student(StudentRole),
    Teacher(TeacherRole),
    Parent(ParentRole),
    Administrator(AdminRole),
}

impl RoleGraph {
    /// Builds the wrappers of the role's top-level collections. Fetches nothing.
    pub fn build(identity: &Identity, ctx: &GraphContext) -> Self {
        match identity.role {
            Role::Student => RoleGraph::Student(StudentRole::new(identity.user_id, ctx)),
            Role::Teacher => RoleGraph::Teacher(TeacherRole::new(ctx)),
            Role::Parent => RoleGraph::Parent(ParentRole::new(ctx)),
            Role::Administrator => RoleGraph::Administrator(AdminRole::new(ctx)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleGraph::Student(_) => Role::Student,
            RoleGraph::Teacher(_) => Role::Teacher,
            RoleGraph::Parent(_) => Role::Parent,
            RoleGraph::Administrator(_) => Role::Administrator,
        }
    }

    pub fn subscriptions(&self) -> &'static [EventKind] {
        match self {
            RoleGraph::Student(_) => student::SUBSCRIPTIONS,
            RoleGraph::Teacher(_) => teacher::SUBSCRIPTIONS,
            RoleGraph::Parent(_) => parent::SUBSCRIPTIONS,
            RoleGraph::Administrator(_) => admin::SUBSCRIPTIONS,
        }
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.subscriptions().contains(&kind)
    }

    pub fn chats(&self) -> &ChatDirectory {
        match self {
            RoleGraph::Student(role) => role.chats(),
            RoleGraph::Teacher(role) => role.chats(),
            RoleGraph::Parent(role) => role.chats(),
            RoleGraph::Administrator(role) => role.chats(),
        }
    }

    pub fn as_student(&self) -> Option<&StudentRole> {
        match self {
            RoleGraph::Student(role) => Some(role),
            _ => None,
        }
    }

    pub fn as_teacher(&self) -> Option<&TeacherRole> {
        match self {
            RoleGraph::Teacher(role) => Some(role),
            _ => None,
        }
    }

    pub fn as_parent(&self) -> Option<&ParentRole> {
        match self {
            RoleGraph::Parent(role) => Some(role),
            _ => None,
        }
    }

    pub fn as_admin(&self) -> Option<&AdminRole> {
        match self {
            RoleGraph::Administrator(role) => Some(role),
            _ => None,
        }
    }

    /// Routes one pushed event down the materialized part of the graph. Events the
    /// role does not subscribe to are dropped without looking at the graph.
    pub async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        if !self.is_subscribed(event.kind()) {
            return RouteReport::dropped();
        }
        match self {
            RoleGraph::Student(role) => role.route(event, hub).await,
            RoleGraph::Teacher(role) => role.route(event, hub).await,
            RoleGraph::Parent(role) => role.route(event, hub).await,
            RoleGraph::Administrator(role) => role.route(event, hub).await,
        }
    }
}

async fn route_timetable(
    timetable: &Lazy<Arc<Timetable>>,
    class_id: EntityId,
    event: &PushEvent,
    hub: &EventHub,
) -> RouteReport {
    let Some(timetable) = timetable.peek() else {
        return RouteReport::dropped();
    };
    fan_out(vec![observed(hub, event, async move {
        timetable.apply_changed(class_id).await
    })])
    .await
}
