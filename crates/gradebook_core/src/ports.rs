//! crates/gradebook_core/src/ports.rs
//!
//! Defines the service contracts (traits) the cache consumes.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete HTTP client and websocket implementations.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::sync::mpsc;

use crate::events::PushEvent;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// `Clone` because a single lazy computation hands the same outcome to every
/// caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// The server rejected the request and explained why.
    #[error("Remote error: {0}")]
    Remote(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The server answered without a body where one was required.
    #[error("Empty response from {0}")]
    EmptyResponse(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Access past the materialized prefix of a paginated collection.
    #[error("Index {index} is outside the {len} materialized items")]
    OutOfRange { index: usize, len: usize },
    /// The signed-in role cannot perform this operation.
    #[error("Not permitted: {0}")]
    Forbidden(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Request/response access to the gradebook API.
///
/// Paths are opaque strings built by [`crate::endpoints`]. Arguments travel as JSON:
/// query parameters for `get`/`delete`, the request body for `post`/`put`.
/// Void responses come back as `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: Option<Value>) -> PortResult<Value>;

    async fn post(&self, path: &str, body: Option<Value>) -> PortResult<Value>;

    async fn put(&self, path: &str, body: Option<Value>) -> PortResult<Value>;

    async fn delete(&self, path: &str, query: Option<Value>) -> PortResult<Value>;

    /// Uploads a local file and returns the link the server assigned to it.
    async fn upload(&self, path: &str, file: &Path) -> PortResult<String>;

    /// Downloads a file endpoint into `destination`.
    async fn download(&self, path: &str, destination: &Path) -> PortResult<()>;

    /// Sets or clears the process-wide authorization token. Last write wins.
    fn set_auth_token(&self, token: Option<String>);
}

/// Server-initiated notifications.
///
/// Implementations reconnect on their own and do not replay events missed while
/// disconnected. Events are delivered on the returned receiver in arrival order.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn connect(&self, url: &str, token: &str) -> PortResult<mpsc::Receiver<PushEvent>>;

    /// Stops reconnecting and closes the current connection, if any.
    async fn disconnect(&self);
}
