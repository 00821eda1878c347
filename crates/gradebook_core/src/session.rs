//! crates/gradebook_core/src/session.rs
//!
//! The root of one signed-in session.
//!
//! A `UserSession` sets the transport token, builds the role graph, connects the
//! push channel and runs the dispatch loop that routes every pushed event through
//! the graph. Everything it built is released with it.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::api::{Api, SessionStatus};
use crate::cache::DEFAULT_PAGE_SIZE;
use crate::domain::Identity;
use crate::endpoints;
use crate::events::{EventHub, PushEvent, RouteReport};
use crate::graph::GraphContext;
use crate::ports::{PortResult, PushChannel, Transport};
use crate::roles::RoleGraph;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub push_url: String,
    pub page_size: usize,
    /// Events an observer may fall behind by before it starts missing some.
    pub observer_capacity: usize,
}

impl SessionSettings {
    pub fn new(push_url: impl Into<String>) -> Self {
        Self {
            push_url: push_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
            observer_capacity: 256,
        }
    }
}

pub struct UserSession {
    identity: Identity,
    api: Api,
    graph: Arc<RoleGraph>,
    hub: EventHub,
    push: Arc<dyn PushChannel>,
    shutdown: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
}

impl UserSession {
    /// Opens the session of an identity returned by sign-in.
    pub async fn open(
        identity: Identity,
        transport: Arc<dyn Transport>,
        push: Arc<dyn PushChannel>,
        settings: SessionSettings,
    ) -> PortResult<Self> {
        transport.set_auth_token(Some(identity.token.clone()));
        let api = Api::new(transport);
        let ctx = GraphContext::new(api.clone(), settings.page_size);
        let graph = Arc::new(RoleGraph::build(&identity, &ctx));
        let hub = EventHub::new(settings.observer_capacity);

        let events = match push.connect(&settings.push_url, &identity.token).await {
            Ok(events) => events,
            Err(e) => {
                api.transport().set_auth_token(None);
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        let dispatcher = tokio::spawn(dispatch(events, graph.clone(), hub.clone(), shutdown.clone()));
        info!(
            "Session opened for user {} ({:?})",
            identity.user_id, identity.role
        );

        Ok(Self {
            identity,
            api,
            graph,
            hub,
            push,
            shutdown,
            dispatcher: Some(dispatcher),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn graph(&self) -> &RoleGraph {
        &self.graph
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    /// Registers an observer of applied events. Drop the receiver to unregister.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.hub.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.api.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.api.watch_status()
    }

    /// Resolves once the server rejects the session's token.
    pub async fn invalidated(&self) {
        let mut status = self.api.watch_status();
        if status
            .wait_for(|status| *status == SessionStatus::Invalidated)
            .await
            .is_err()
        {
            trace!("Session status sender dropped");
        }
    }

    /// Routes an event as if it had been pushed, and waits for every branch.
    pub async fn route(&self, event: &PushEvent) -> RouteReport {
        self.graph.route(event, &self.hub).await
    }

    /// Stops event dispatch, disconnects the push channel, tells the server and
    /// clears the transport token. The token is cleared even when the server call
    /// fails.
    pub async fn sign_out(mut self) -> PortResult<()> {
        self.shutdown.cancel();
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.await {
                warn!("Event dispatcher ended abnormally: {:?}", e);
            }
        }
        self.push.disconnect().await;
        let result = self.api.post::<_, ()>(endpoints::logout(), &json!({})).await;
        self.api.transport().set_auth_token(None);
        info!("Session closed for user {}", self.identity.user_id);
        result
    }
}

impl Drop for UserSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

//=========================================================================================
// Dispatch Loop
//=========================================================================================

/// One task per event, so a handler waiting on a follow-up fetch does not hold up
/// the events behind it.
async fn dispatch(
    mut events: mpsc::Receiver<PushEvent>,
    graph: Arc<RoleGraph>,
    hub: EventHub,
    shutdown: CancellationToken,
) {
    let mut handlers: JoinSet<(PushEvent, RouteReport)> = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = events.recv() => match received {
                Some(event) => {
                    if !graph.is_subscribed(event.kind()) {
                        trace!("Ignoring unsubscribed event {}", event.name());
                        continue;
                    }
                    let (graph, hub) = (graph.clone(), hub.clone());
                    handlers.spawn(async move {
                        let report = graph.route(&event, &hub).await;
                        (event, report)
                    });
                }
                None => {
                    info!("Push channel closed; no more events will arrive.");
                    break;
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => log_handled(joined),
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            joined = handlers.join_next() => match joined {
                Some(joined) => log_handled(joined),
                None => break,
            },
        }
    }
    handlers.shutdown().await;
}

fn log_handled(joined: Result<(PushEvent, RouteReport), JoinError>) {
    match joined {
        Ok((event, report)) => {
            for failure in &report.failures {
                error!("Failed to apply {}: {}", event.name(), failure);
            }
            debug!(
                "Routed {}: {} applied, {} dropped, {} failed",
                event.name(),
                report.applied,
                report.dropped,
                report.failures.len()
            );
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!("Event handler panicked: {:?}", e),
    }
}
