//! crates/gradebook_core/src/api.rs
//!
//! Typed access to the [`Transport`] port.
//!
//! Entities never talk to the transport directly: they go through `Api`, which
//! serializes arguments, decodes responses and notices when the server stops
//! accepting the session's token.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::ports::{PortError, PortResult, Transport};

/// Validity of the signed-in session as seen by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    /// The server answered 401. Every further call on this session is void.
    Invalidated,
}

#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Active);
        Self {
            transport,
            status: Arc::new(status),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        let value = self.observe(self.transport.get(path, None).await)?;
        decode(path, value)
    }

    pub async fn get_with<Q, T>(&self, path: &str, query: &Q) -> PortResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query = encode(query)?;
        let value = self.observe(self.transport.get(path, Some(query)).await)?;
        decode(path, value)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let value = self.observe(self.transport.post(path, Some(body)).await)?;
        decode(path, value)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let value = self.observe(self.transport.put(path, Some(body)).await)?;
        decode(path, value)
    }

    pub async fn delete(&self, path: &str) -> PortResult<()> {
        self.observe(self.transport.delete(path, None).await)?;
        Ok(())
    }

    pub async fn upload(&self, path: &str, file: &Path) -> PortResult<String> {
        let link = self.observe(self.transport.upload(path, file).await)?;
        if link.is_empty() {
            return Err(PortError::EmptyResponse(path.to_string()));
        }
        Ok(link)
    }

    pub async fn download(&self, path: &str, destination: &Path) -> PortResult<()> {
        self.observe(self.transport.download(path, destination).await)
    }

    fn observe<T>(&self, result: PortResult<T>) -> PortResult<T> {
        if let Err(PortError::Unauthorized) = &result {
            let flipped = self.status.send_if_modified(|status| {
                let active = *status == SessionStatus::Active;
                *status = SessionStatus::Invalidated;
                active
            });
            if flipped {
                warn!("Server rejected the session token; session invalidated.");
            }
        }
        result
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn encode<A: Serialize + ?Sized>(argument: &A) -> PortResult<Value> {
    serde_json::to_value(argument)
        .map_err(|e| PortError::Unexpected(format!("Failed to encode request: {}", e)))
}

/// A `null` body is fine for `()` and `Option<_>` targets and an
/// `EmptyResponse` for everything else.
fn decode<T: DeserializeOwned>(path: &str, value: Value) -> PortResult<T> {
    let was_null = value.is_null();
    serde_json::from_value(value).map_err(|e| {
        if was_null {
            PortError::EmptyResponse(path.to_string())
        } else {
            PortError::Unexpected(format!("Failed to decode response from {}: {}", path, e))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AverageGrade;

    #[test]
    fn null_body_is_empty_response_for_required_values() {
        let err = decode::<AverageGrade>("student/subjects/1/average", Value::Null).unwrap_err();
        assert_eq!(err, PortError::EmptyResponse("student/subjects/1/average".into()));
        assert_eq!(decode::<()>("x", Value::Null), Ok(()));
        assert_eq!(decode::<Option<i64>>("x", Value::Null), Ok(None));
    }
}
