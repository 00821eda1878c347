pub mod api;
pub mod cache;
pub mod domain;
pub mod endpoints;
pub mod events;
pub mod graph;
pub mod ports;
pub mod roles;
pub mod session;

pub use api::{Api, SessionStatus};
pub use cache::{Identified, Lazy, PageQuery, Paged, DEFAULT_PAGE_SIZE};
pub use domain::{EntityId, Identity, Role};
pub use events::{EventHub, EventKind, Outcome, PushEvent, RouteReport};
pub use ports::{PortError, PortResult, PushChannel, Transport};
pub use roles::{AdminRole, ParentRole, RoleGraph, StudentRole, TeacherRole};
pub use session::{SessionSettings, UserSession};
