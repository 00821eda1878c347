//! The root session: push dispatch, invalidation and sign-out.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use common::{identity, task, FakePush, FakeTransport, Method, STUDENT_ID};
use gradebook_core::events::TaskProgress;
use gradebook_core::{PortError, PushEvent, Role, SessionSettings, SessionStatus, UserSession};

async fn open(role: Role, transport: &Arc<FakeTransport>, push: &Arc<FakePush>) -> UserSession {
    UserSession::open(
        identity(role),
        transport.clone(),
        push.clone(),
        SessionSettings::new("wss://push.example/hub"),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn open_sets_the_token_and_connects_without_fetching() {
    let transport = FakeTransport::new();
    let push = FakePush::new();

    let session = open(Role::Teacher, &transport, &push).await;

    assert_eq!(transport.token().as_deref(), Some("token-1"));
    assert_eq!(
        push.connected_with(),
        Some(("wss://push.example/hub".to_string(), "token-1".to_string()))
    );
    assert_eq!(transport.total_calls(), 0);
    assert_eq!(session.graph().role(), Role::Teacher);
    assert_eq!(session.status(), SessionStatus::Active);
}

#[tokio::test]
async fn pushed_events_reach_loaded_entities_and_observers() {
    let transport = FakeTransport::new();
    transport.reply(Method::Get, "student/subjects", json!([{ "id": 7, "name": "Math" }]));
    transport.reply(Method::Get, "student/subjects/7/tasks", json!([task(1, 7), task(2, 7)]));
    let push = FakePush::new();
    let session = open(Role::Student, &transport, &push).await;
    let mut observer = session.subscribe();

    let student = session.graph().as_student().unwrap();
    let subject = student.subject(7).await.unwrap().unwrap();
    subject.tasks().load_next().await.unwrap();

    let event = PushEvent::TaskCompleted(TaskProgress {
        task_id: 1,
        subject_id: 7,
        student_id: STUDENT_ID,
    });
    push.sender().send(event.clone()).await.unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(5), observer.recv())
        .await
        .expect("no event within five seconds")
        .unwrap();
    assert_eq!(seen, event);
    assert!(subject.tasks().find_by_id(1).unwrap().is_completed());
    assert!(!subject.tasks().find_by_id(2).unwrap().is_completed());
}

#[tokio::test]
async fn unauthorized_response_resolves_invalidated() {
    let transport = FakeTransport::new();
    transport.fail(Method::Get, "parent/children", PortError::Unauthorized);
    let push = FakePush::new();
    let session = open(Role::Parent, &transport, &push).await;

    let err = session.graph().as_parent().unwrap().children().await.unwrap_err();
    assert_eq!(err, PortError::Unauthorized);

    tokio::time::timeout(Duration::from_secs(5), session.invalidated())
        .await
        .expect("session was not invalidated");
    assert_eq!(session.status(), SessionStatus::Invalidated);
}

#[tokio::test]
async fn sign_out_disconnects_and_clears_the_token() {
    let transport = FakeTransport::new();
    transport.reply(Method::Post, "auth/logout", Value::Null);
    let push = FakePush::new();
    let session = open(Role::Administrator, &transport, &push).await;

    session.sign_out().await.unwrap();

    assert!(push.is_disconnected());
    assert_eq!(transport.calls(Method::Post, "auth/logout"), 1);
    assert_eq!(transport.token(), None);
}

#[tokio::test]
async fn sign_out_clears_the_token_even_when_logout_fails() {
    let transport = FakeTransport::new();
    transport.fail(Method::Post, "auth/logout", PortError::Unauthorized);
    let push = FakePush::new();
    let session = open(Role::Student, &transport, &push).await;

    let result = session.sign_out().await;

    assert_eq!(result, Err(PortError::Unauthorized));
    assert_eq!(transport.token(), None);
}
