//! services/client/src/adapters/push.rs
//!
//! This module contains the adapter for the server's push notification socket.
//! It implements the `PushChannel` port from the `core` crate on top of
//! `tokio-tungstenite`, reconnecting with bounded exponential backoff.

use async_trait::async_trait;
use futures::StreamExt;
use gradebook_core::ports::{PortError, PortResult, PushChannel};
use gradebook_core::PushEvent;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Delays between reconnection attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PushChannel` port over a websocket.
pub struct WsPushChannel {
    policy: ReconnectPolicy,
    buffer: usize,
    running: Mutex<Option<CancellationToken>>,
}

impl WsPushChannel {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            buffer: 64,
            running: Mutex::new(None),
        }
    }
}

impl Default for WsPushChannel {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

//=========================================================================================
// `PushChannel` Trait Implementation
//=========================================================================================

#[async_trait]
impl PushChannel for WsPushChannel {
    /// The first connection is made before returning so that a wrong URL or a
    /// rejected token surfaces to the caller. Later drops reconnect silently.
    async fn connect(&self, url: &str, token: &str) -> PortResult<mpsc::Receiver<PushEvent>> {
        let socket = open_socket(url, token).await?;
        info!("Push channel connected to {}", url);

        let cancel = CancellationToken::new();
        if let Some(previous) = self.running.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        tokio::spawn(run(
            socket,
            url.to_string(),
            token.to_string(),
            self.policy,
            tx,
            cancel,
        ));
        Ok(rx)
    }

    async fn disconnect(&self) {
        if let Some(cancel) = self.running.lock().take() {
            cancel.cancel();
            info!("Push channel disconnected.");
        }
    }
}

//=========================================================================================
// Connection Loop
//=========================================================================================

async fn open_socket(url: &str, token: &str) -> PortResult<Socket> {
    let mut request = url
        .into_client_request()
        .map_err(|e| PortError::Unexpected(format!("Invalid push URL {}: {}", url, e)))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| PortError::Unexpected(format!("Invalid token: {}", e)))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    match connect_async(request).await {
        Ok((socket, _)) => Ok(socket),
        Err(tokio_tungstenite::tungstenite::Error::Http(response))
            if response.status().as_u16() == 401 =>
        {
            Err(PortError::Unauthorized)
        }
        Err(e) => Err(PortError::Remote(format!("Push connection failed: {}", e))),
    }
}

/// Reads frames until the socket drops, then reconnects. Ends when cancelled or
/// when nobody holds the receiver any more. Events sent while disconnected are
/// lost.
async fn run(
    mut socket: Socket,
    url: String,
    token: String,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<PushEvent>,
    cancel: CancellationToken,
) {
    loop {
        if !forward(&mut socket, &tx, &cancel).await {
            if let Err(e) = socket.close(None).await {
                debug!("Closing push socket failed: {}", e);
            }
            return;
        }

        let mut delay = policy.initial_delay;
        socket = loop {
            warn!("Push channel dropped; reconnecting in {:?}", delay);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match open_socket(&url, &token).await {
                Ok(socket) => {
                    info!("Push channel reconnected.");
                    break socket;
                }
                Err(PortError::Unauthorized) => {
                    warn!("Push channel token rejected; giving up.");
                    return;
                }
                Err(e) => {
                    debug!("Reconnect attempt failed: {}", e);
                    delay = policy.next_delay(delay);
                }
            }
        };
    }
}

/// Returns `false` when the loop should stop instead of reconnecting.
async fn forward(socket: &mut Socket, tx: &mpsc::Sender<PushEvent>, cancel: &CancellationToken) -> bool {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return false,
            frame = socket.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                if let Some(event) = decode_frame(&text) {
                    if tx.send(event).await.is_err() {
                        debug!("Push receiver dropped; stopping.");
                        return false;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => return true,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Push channel error: {}", e);
                return true;
            }
        }
    }
}

/// Frames look like `{"event": "<name>", "data": {...}}`. Unknown names and
/// malformed frames are logged and skipped.
fn decode_frame(text: &str) -> Option<PushEvent> {
    match serde_json::from_str::<PushEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            let name = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|frame| frame.get("event").and_then(Value::as_str).map(str::to_string));
            match name {
                Some(name) => warn!("Skipping push event '{}': {}", name, e),
                None => warn!("Skipping malformed push frame: {}", e),
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_events_decode_and_unknown_ones_are_skipped() {
        let frame = r#"{"event":"session-closed","data":{"sessionId":4,"classId":2}}"#;
        assert!(matches!(decode_frame(frame), Some(PushEvent::SessionClosed(r)) if r.session_id == 4));

        assert!(decode_frame(r#"{"event":"homework-graded","data":{}}"#).is_none());
        assert!(decode_frame("not json").is_none());
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..4 {
            delay = policy.next_delay(delay);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 5, 5]);
    }

    #[tokio::test]
    async fn disconnect_closes_the_socket_and_ends_the_stream() {
        use futures::SinkExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"session-closed","data":{"sessionId":4,"classId":2}}"#.into(),
            ))
            .await
            .unwrap();
            let mut saw_close = false;
            while let Some(Ok(frame)) = ws.next().await {
                saw_close |= frame.is_close();
            }
            saw_close
        });

        let channel = WsPushChannel::default();
        let mut events = channel.connect(&format!("ws://{}", addr), "token-1").await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
        assert!(matches!(first, Some(PushEvent::SessionClosed(r)) if r.session_id == 4));

        channel.disconnect().await;
        let after = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
        assert!(after.is_none());
        assert!(tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap());
    }
}
