//! crates/gradebook_core/src/events.rs
//!
//! Server-initiated change notifications, the local re-notification hub observers
//! subscribe to, and the bookkeeping types of one routing pass.

use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::EntityId;
use crate::ports::{PortError, PortResult};

//=========================================================================================
// Push Events
//=========================================================================================

/// Identifies the ledger entry an assessment event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRef {
    pub assessment_id: EntityId,
    pub subject_id: EntityId,
    pub class_id: EntityId,
    pub student_id: EntityId,
}

/// A student's completion state of a task changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub task_id: EntityId,
    pub subject_id: EntityId,
    pub student_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: EntityId,
    pub class_id: EntityId,
}

/// A notification pushed by the server. Carries the identifiers needed to find the
/// affected entity and, where cheap, the new state itself.
///
/// Wire shape: `{"event": "task-created", "data": {"taskId": 1, ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum PushEvent {
    TaskCreated {
        task_id: EntityId,
        subject_id: EntityId,
        class_id: EntityId,
    },
    TaskCompleted(TaskProgress),
    TaskUncompleted(TaskProgress),
    AssessmentCreated(AssessmentRef),
    AssessmentChanged(AssessmentRef),
    AssessmentDeleted(AssessmentRef),
    FinalAssessmentCreated {
        final_assessment_id: EntityId,
        subject_id: EntityId,
        class_id: EntityId,
        student_id: EntityId,
    },
    TimetableChanged {
        class_id: EntityId,
    },
    SessionCreated(SessionRef),
    SessionClosed(SessionRef),
    ChatCreated {
        chat_id: EntityId,
    },
    ChatMessageReceived {
        chat_id: EntityId,
        message_id: EntityId,
    },
}

/// Event categories, used by roles to declare what they listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TaskCreated,
    TaskCompleted,
    TaskUncompleted,
    AssessmentCreated,
    AssessmentChanged,
    AssessmentDeleted,
    FinalAssessmentCreated,
    TimetableChanged,
    SessionCreated,
    SessionClosed,
    ChatCreated,
    ChatMessageReceived,
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::TaskCreated { .. } => EventKind::TaskCreated,
            PushEvent::TaskCompleted(_) => EventKind::TaskCompleted,
            PushEvent::TaskUncompleted(_) => EventKind::TaskUncompleted,
            PushEvent::AssessmentCreated(_) => EventKind::AssessmentCreated,
            PushEvent::AssessmentChanged(_) => EventKind::AssessmentChanged,
            PushEvent::AssessmentDeleted(_) => EventKind::AssessmentDeleted,
            PushEvent::FinalAssessmentCreated { .. } => EventKind::FinalAssessmentCreated,
            PushEvent::TimetableChanged { .. } => EventKind::TimetableChanged,
            PushEvent::SessionCreated(_) => EventKind::SessionCreated,
            PushEvent::SessionClosed(_) => EventKind::SessionClosed,
            PushEvent::ChatCreated { .. } => EventKind::ChatCreated,
            PushEvent::ChatMessageReceived { .. } => EventKind::ChatMessageReceived,
        }
    }

    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            EventKind::TaskCreated => "task-created",
            EventKind::TaskCompleted => "task-completed",
            EventKind::TaskUncompleted => "task-uncompleted",
            EventKind::AssessmentCreated => "assessment-created",
            EventKind::AssessmentChanged => "assessment-changed",
            EventKind::AssessmentDeleted => "assessment-deleted",
            EventKind::FinalAssessmentCreated => "final-assessment-created",
            EventKind::TimetableChanged => "timetable-changed",
            EventKind::SessionCreated => "session-created",
            EventKind::SessionClosed => "session-closed",
            EventKind::ChatCreated => "chat-created",
            EventKind::ChatMessageReceived => "chat-message-received",
        }
    }
}

//=========================================================================================
// Local Re-notification
//=========================================================================================

/// Fan-out of applied events to local observers (a UI layer, a CLI printer).
///
/// An event is published only after the in-memory state it describes was updated.
/// Observers unregister by dropping their receiver; the hub itself is dropped with
/// the session that owns it.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<PushEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.sender.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub(crate) fn publish(&self, event: &PushEvent) {
        if self.sender.send(event.clone()).is_err() {
            trace!("No observers for {}", event.name());
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

//=========================================================================================
// Routing Outcomes
//=========================================================================================

/// Final state of one routing branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target was materialized and updated; observers were notified.
    Applied,
    /// Some hop on the way was not materialized, or the id was unknown.
    Dropped,
}

/// Summary of routing one event through every branch of a role graph.
#[derive(Debug, Default)]
pub struct RouteReport {
    pub applied: usize,
    pub dropped: usize,
    pub failures: Vec<PortError>,
}

impl RouteReport {
    pub(crate) fn dropped() -> Self {
        Self {
            dropped: 1,
            ..Self::default()
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied > 0
    }

    /// Turns the first branch failure into an error, after every branch ran.
    pub fn into_result(mut self) -> PortResult<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.swap_remove(0))
        }
    }

    fn record(&mut self, result: PortResult<Outcome>) {
        match result {
            Ok(Outcome::Applied) => self.applied += 1,
            Ok(Outcome::Dropped) => self.dropped += 1,
            Err(e) => self.failures.push(e),
        }
    }

    fn merge(&mut self, other: RouteReport) {
        self.applied += other.applied;
        self.dropped += other.dropped;
        self.failures.extend(other.failures);
    }
}

/// A routing branch still to be awaited.
pub(crate) type Branch<'a> = BoxFuture<'a, PortResult<Outcome>>;

/// Wraps a branch so that observers hear about it once it applied.
pub(crate) fn observed<'a, F>(hub: &'a EventHub, event: &'a PushEvent, branch: F) -> Branch<'a>
where
    F: Future<Output = PortResult<Outcome>> + Send + 'a,
{
    Box::pin(async move {
        let outcome = branch.await?;
        if outcome == Outcome::Applied {
            hub.publish(event);
        }
        Ok(outcome)
    })
}

/// Runs every branch to completion, whatever the others do. No branch at all
/// counts as one drop.
pub(crate) async fn fan_out(branches: Vec<Branch<'_>>) -> RouteReport {
    let mut report = RouteReport::default();
    if branches.is_empty() {
        report.dropped = 1;
        return report;
    }
    for result in join_all(branches).await {
        report.record(result);
    }
    report
}

/// Runs nested fan-outs (one per matching sibling) and sums their reports.
pub(crate) async fn fan_out_reports(reports: Vec<BoxFuture<'_, RouteReport>>) -> RouteReport {
    let mut total = RouteReport::default();
    if reports.is_empty() {
        total.dropped = 1;
        return total;
    }
    for report in join_all(reports).await {
        total.merge(report);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_kebab_case_names_and_camel_case_fields() {
        let event: PushEvent = serde_json::from_value(json!({
            "event": "assessment-changed",
            "data": { "assessmentId": 3, "subjectId": 7, "classId": 2, "studentId": 11 }
        }))
        .unwrap();

        assert_eq!(
            event,
            PushEvent::AssessmentChanged(AssessmentRef {
                assessment_id: 3,
                subject_id: 7,
                class_id: 2,
                student_id: 11,
            })
        );
        assert_eq!(event.name(), "assessment-changed");
    }

    #[test]
    fn struct_variants_use_camel_case_fields() {
        let event: PushEvent = serde_json::from_value(json!({
            "event": "chat-message-received",
            "data": { "chatId": 4, "messageId": 40 }
        }))
        .unwrap();
        assert_eq!(event, PushEvent::ChatMessageReceived { chat_id: 4, message_id: 40 });
    }

    #[tokio::test]
    async fn one_failing_branch_does_not_stop_the_others() {
        let branches: Vec<Branch<'_>> = vec![
            Box::pin(async { Err(PortError::Remote("boom".into())) }),
            Box::pin(async { Ok(Outcome::Applied) }),
            Box::pin(async { Ok(Outcome::Dropped) }),
        ];
        let report = fan_out(branches).await;

        assert_eq!(report.applied, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.failures, vec![PortError::Remote("boom".into())]);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn hub_delivers_to_every_observer() {
        let hub = EventHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        let event = PushEvent::ChatCreated { chat_id: 1 };

        hub.publish(&event);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
        drop(first);
        assert_eq!(hub.observer_count(), 1);
    }
}
