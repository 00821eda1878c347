//! services/client/src/adapters/http.rs
//!
//! This module contains the adapter for the gradebook REST API.
//! It implements the `Transport` port from the `core` crate on top of `reqwest`.

use async_trait::async_trait;
use gradebook_core::ports::{PortError, PortResult, Transport};
use parking_lot::RwLock;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `Transport` port over HTTP with a bearer token.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Creates a new `HttpTransport` for the API rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Links handed out by the server may already be absolute.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Request failed: {}", e)))?;
        check_status(response).await
    }

    async fn send_json(&self, request: RequestBuilder) -> PortResult<Value> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read response: {}", e)))?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body)
            .map_err(|e| PortError::Unexpected(format!("Response is not JSON: {}", e)))
    }
}

//=========================================================================================
// `Transport` Trait Implementation
//=========================================================================================

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: Option<Value>) -> PortResult<Value> {
        debug!("GET {}", path);
        let mut request = self.client.get(self.url(path));
        if let Some(query) = query {
            request = request.query(&query);
        }
        self.send_json(request).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> PortResult<Value> {
        debug!("POST {}", path);
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send_json(request).await
    }

    async fn put(&self, path: &str, body: Option<Value>) -> PortResult<Value> {
        debug!("PUT {}", path);
        let mut request = self.client.put(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send_json(request).await
    }

    async fn delete(&self, path: &str, query: Option<Value>) -> PortResult<Value> {
        debug!("DELETE {}", path);
        let mut request = self.client.delete(self.url(path));
        if let Some(query) = query {
            request = request.query(&query);
        }
        self.send_json(request).await
    }

    async fn upload(&self, path: &str, file: &Path) -> PortResult<String> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read {}: {}", file.display(), e)))?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        debug!("Uploading {} ({} bytes) to {}", file_name, bytes.len(), path);

        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name));
        let request = self.client.post(self.url(path)).multipart(form);
        let value = self.send_json(request).await?;
        Ok(link_from(&value))
    }

    async fn download(&self, path: &str, destination: &Path) -> PortResult<()> {
        debug!("Downloading {} to {}", path, destination.display());
        let response = self.send(self.client.get(self.url(path))).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read download: {}", e)))?;
        tokio::fs::write(destination, &bytes).await.map_err(|e| {
            PortError::Unexpected(format!("Failed to write {}: {}", destination.display(), e))
        })
    }

    fn set_auth_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

//=========================================================================================
// Response Helpers
//=========================================================================================

async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(PortError::Unauthorized);
    }
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(PortError::Remote(remote_message(status, &body)));
    }
    if !status.is_success() {
        return Err(PortError::Unexpected(format!("Server responded with {}", status)));
    }
    Ok(response)
}

/// The server's `message` field when the error body has one.
fn remote_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        })
}

/// Upload endpoints answer either with the bare link or with `{"link": ...}`.
fn link_from(value: &Value) -> String {
    match value {
        Value::String(link) => link.clone(),
        other => other
            .get("link")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_errors_prefer_the_server_message() {
        assert_eq!(
            remote_message(StatusCode::BAD_REQUEST, r#"{"message":"Grade must be 1-5"}"#),
            "Grade must be 1-5"
        );
        assert_eq!(remote_message(StatusCode::CONFLICT, "already closed"), "already closed");
        assert_eq!(remote_message(StatusCode::NOT_FOUND, ""), "404 Not Found");
    }

    #[test]
    fn upload_links_come_bare_or_wrapped() {
        assert_eq!(link_from(&json!("files/abc.pdf")), "files/abc.pdf");
        assert_eq!(link_from(&json!({ "link": "files/abc.pdf" })), "files/abc.pdf");
        assert_eq!(link_from(&Value::Null), "");
    }

    #[test]
    fn relative_paths_join_the_base_url() {
        let transport = HttpTransport::new("http://localhost:5000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.url("student/subjects"), "http://localhost:5000/api/student/subjects");
        assert_eq!(transport.url("https://cdn.example/f/1"), "https://cdn.example/f/1");
    }
}
