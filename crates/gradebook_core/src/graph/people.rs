//! crates/gradebook_core/src/graph/people.rs
//!
//! People other roles look after: a parent's children and the administrator's
//! user and class directory.

use serde_json::json;
use std::sync::Arc;

use crate::cache::{Identified, Lazy, Paged};
use crate::domain::{ChildInfo, ClassInfo, EntityId, Role, UserInfo};
use crate::endpoints;
use crate::events::{fan_out, EventHub, PushEvent, RouteReport};
use crate::ports::PortResult;

use super::{route_student_subjects, GraphContext, StudentSubject, StudentView};

//=========================================================================================
// Children
//=========================================================================================

#[derive(Debug)]
pub struct Child {
    id: EntityId,
    full_name: String,
    class_id: Option<EntityId>,
    subjects: Lazy<Vec<Arc<StudentSubject>>>,
}

impl Identified for Child {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Child {
    /// A child outside any class has no subjects and never asks the server for them.
    pub(crate) fn new(info: ChildInfo, ctx: &GraphContext) -> Self {
        let subjects = match info.class_id {
            Some(_) => StudentSubject::lazy_list(StudentView::Child { child_id: info.id }, ctx),
            None => Lazy::ready(Vec::new()),
        };
        Self {
            id: info.id,
            full_name: info.full_name,
            class_id: info.class_id,
            subjects,
        }
    }

    pub(crate) fn lazy_list(ctx: &GraphContext) -> Lazy<Vec<Arc<Child>>> {
        let ctx = ctx.clone();
        Lazy::new(move || {
            let ctx = ctx.clone();
            async move {
                let infos: Vec<ChildInfo> = ctx.api.get(endpoints::children()).await?;
                Ok(infos
                    .into_iter()
                    .map(|info| Arc::new(Child::new(info, &ctx)))
                    .collect())
            }
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn class_id(&self) -> Option<EntityId> {
        self.class_id
    }

    pub async fn subjects(&self) -> PortResult<Vec<Arc<StudentSubject>>> {
        self.subjects.get().await
    }

    pub fn are_subjects_loaded(&self) -> bool {
        self.subjects.is_realized()
    }

    /// Whether the event is about this child: student-addressed events by id,
    /// new tasks by class.
    pub(crate) fn concerns(&self, event: &PushEvent) -> bool {
        match event {
            PushEvent::TaskCreated { class_id, .. } => self.class_id == Some(*class_id),
            PushEvent::TaskCompleted(p) | PushEvent::TaskUncompleted(p) => p.student_id == self.id,
            PushEvent::AssessmentCreated(r)
            | PushEvent::AssessmentChanged(r)
            | PushEvent::AssessmentDeleted(r) => r.student_id == self.id,
            PushEvent::FinalAssessmentCreated { student_id, .. } => *student_id == self.id,
            _ => false,
        }
    }

    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        if !self.concerns(event) {
            return RouteReport::dropped();
        }
        let Some(subjects) = self.subjects.peek() else {
            return RouteReport::dropped();
        };
        fan_out(route_student_subjects(&subjects, event, hub)).await
    }
}

//=========================================================================================
// Administrator directory
//=========================================================================================

/// Users and classes of the school, both filterable.
#[derive(Debug)]
pub struct Directory {
    users: Paged<UserInfo>,
    classes: Paged<ClassInfo>,
    ctx: GraphContext,
}

impl Directory {
    pub(crate) fn new(ctx: &GraphContext) -> Self {
        let (users_api, user_api) = (ctx.api.clone(), ctx.api.clone());
        let users: Paged<UserInfo> = Paged::new(
            ctx.page_size,
            move |query| {
                let api = users_api.clone();
                async move { api.get_with(endpoints::users(), &query).await }
            },
            move |user_id| {
                let api = user_api.clone();
                async move { api.get(&endpoints::user(user_id)).await }
            },
        );
        let (classes_api, class_api) = (ctx.api.clone(), ctx.api.clone());
        let classes: Paged<ClassInfo> = Paged::new(
            ctx.page_size,
            move |query| {
                let api = classes_api.clone();
                async move { api.get_with(endpoints::admin_classes(), &query).await }
            },
            move |class_id| {
                let api = class_api.clone();
                async move { api.get(&endpoints::admin_class(class_id)).await }
            },
        );
        Self {
            users,
            classes,
            ctx: ctx.clone(),
        }
    }

    pub fn users(&self) -> &Paged<UserInfo> {
        &self.users
    }

    pub fn classes(&self) -> &Paged<ClassInfo> {
        &self.classes
    }

    pub async fn create_user(
        &self,
        full_name: &str,
        role: Role,
        login: &str,
        password: &str,
    ) -> PortResult<UserInfo> {
        let user: UserInfo = self
            .ctx
            .api
            .post(
                endpoints::users(),
                &json!({ "fullName": full_name, "role": role, "login": login, "password": password }),
            )
            .await?;
        if self.users.is_realized() {
            self.users.insert_head(user.clone());
        }
        Ok(user)
    }

    pub async fn create_class(&self, name: &str) -> PortResult<ClassInfo> {
        let class: ClassInfo = self
            .ctx
            .api
            .post(endpoints::admin_classes(), &json!({ "name": name }))
            .await?;
        if self.classes.is_realized() {
            self.classes.insert_head(class.clone());
        }
        Ok(class)
    }
}
