//! In-memory stand-ins for the transport and push channel.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use gradebook_core::graph::GraphContext;
use gradebook_core::ports::{PortError, PortResult, PushChannel, Transport};
use gradebook_core::{Api, Identity, PushEvent, Role, RoleGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Upload,
    Download,
}

type Handler = Arc<dyn Fn(Option<Value>) -> PortResult<Value> + Send + Sync>;

/// Answers requests from handlers registered per method and path, and records
/// every request it receives with its body or query. Unregistered paths answer
/// `NotFound`.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), Handler>>,
    calls: Mutex<Vec<(Method, String, Option<Value>)>>,
    token: Mutex<Option<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on<F>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(Option<Value>) -> PortResult<Value> + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .insert((method, path.to_string()), Arc::new(handler));
    }

    pub fn reply(&self, method: Method, path: &str, value: Value) {
        self.on(method, path, move |_| Ok(value.clone()));
    }

    pub fn fail(&self, method: Method, path: &str, error: PortError) {
        self.on(method, path, move |_| Err(error.clone()));
    }

    pub fn calls(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(m, p, _)| *m == method && p == path)
            .count()
    }

    /// Body or query of the latest request to `path`.
    pub fn last_argument(&self, method: Method, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(m, p, _)| *m == method && p == path)
            .and_then(|(_, _, argument)| argument.clone())
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn handle(&self, method: Method, path: &str, argument: Option<Value>) -> PortResult<Value> {
        self.calls
            .lock()
            .push((method, path.to_string(), argument.clone()));
        let handler = self.routes.lock().get(&(method, path.to_string())).cloned();
        match handler {
            Some(handler) => handler(argument),
            None => Err(PortError::NotFound(path.to_string())),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str, query: Option<Value>) -> PortResult<Value> {
        self.handle(Method::Get, path, query)
    }

    async fn post(&self, path: &str, body: Option<Value>) -> PortResult<Value> {
        self.handle(Method::Post, path, body)
    }

    async fn put(&self, path: &str, body: Option<Value>) -> PortResult<Value> {
        self.handle(Method::Put, path, body)
    }

    async fn delete(&self, path: &str, query: Option<Value>) -> PortResult<Value> {
        self.handle(Method::Delete, path, query)
    }

    async fn upload(&self, path: &str, file: &Path) -> PortResult<String> {
        let value = self.handle(Method::Upload, path, Some(json!(file.display().to_string())))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn download(&self, path: &str, _destination: &Path) -> PortResult<()> {
        self.handle(Method::Download, path, None).map(|_| ())
    }

    fn set_auth_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }
}

/// Hands the test the sending half of the event stream.
#[derive(Default)]
pub struct FakePush {
    sender: Mutex<Option<mpsc::Sender<PushEvent>>>,
    connected_with: Mutex<Option<(String, String)>>,
    disconnected: Mutex<bool>,
}

impl FakePush {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sender(&self) -> mpsc::Sender<PushEvent> {
        self.sender.lock().clone().expect("push channel not connected")
    }

    pub fn connected_with(&self) -> Option<(String, String)> {
        self.connected_with.lock().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        *self.disconnected.lock()
    }
}

#[async_trait]
impl PushChannel for FakePush {
    async fn connect(&self, url: &str, token: &str) -> PortResult<mpsc::Receiver<PushEvent>> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock() = Some(tx);
        *self.connected_with.lock() = Some((url.to_string(), token.to_string()));
        Ok(rx)
    }

    async fn disconnect(&self) {
        self.sender.lock().take();
        *self.disconnected.lock() = true;
    }
}

//=========================================================================================
// Graphs
//=========================================================================================

pub fn graph_for(role: Role, transport: &Arc<FakeTransport>) -> (RoleGraph, Api) {
    let api = Api::new(transport.clone());
    let graph = RoleGraph::build(&identity(role), &GraphContext::new(api.clone(), 20));
    (graph, api)
}

/// Physics (subject 3) taught to class 9A (class 2) with one student whose ledger
/// holds a single assessment.
pub fn serve_teacher_class(transport: &FakeTransport) {
    transport.reply(Method::Get, "teacher/subjects", json!([{ "id": 3, "name": "Physics" }]));
    transport.reply(
        Method::Get,
        "teacher/subjects/3/classes",
        json!([{ "id": 2, "name": "9A", "studentsCount": 1 }]),
    );
    transport.reply(
        Method::Get,
        "teacher/subjects/3/classes/2/students",
        json!([{ "id": STUDENT_ID, "fullName": "Ann Lee" }]),
    );
    transport.reply(
        Method::Get,
        "teacher/subjects/3/classes/2/journal",
        json!([{ "studentId": STUDENT_ID, "fullName": "Ann Lee", "average": 3.0 }]),
    );
    let ledger = teacher_ledger_path();
    transport.reply(Method::Get, &format!("{}/assessments", ledger), json!([assessment(1, 3, "3")]));
    transport.reply(Method::Get, &format!("{}/average", ledger), average(3.0));
    transport.reply(Method::Get, &format!("{}/final-assessment", ledger), Value::Null);
}

pub fn teacher_ledger_path() -> String {
    format!("teacher/subjects/3/classes/2/students/{}", STUDENT_ID)
}

//=========================================================================================
// Payloads
//=========================================================================================

pub const STUDENT_ID: i64 = 11;

pub fn identity(role: Role) -> Identity {
    Identity {
        user_id: STUDENT_ID,
        role,
        full_name: "Test User".to_string(),
        token: "token-1".to_string(),
    }
}

pub fn task(id: i64, subject_id: i64) -> Value {
    json!({
        "id": id,
        "subjectId": subject_id,
        "title": format!("Task {}", id),
        "description": "",
        "dueDate": null,
        "completed": false
    })
}

pub fn assessment(id: i64, subject_id: i64, grade: &str) -> Value {
    json!({
        "id": id,
        "subjectId": subject_id,
        "studentId": STUDENT_ID,
        "grade": grade,
        "comment": null,
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

pub fn average(value: f64) -> Value {
    json!({ "average": value })
}

pub fn session(id: i64, class_id: i64, closed: bool) -> Value {
    json!({
        "id": id,
        "classId": class_id,
        "openedAt": "2024-05-01T08:00:00Z",
        "closed": closed
    })
}

pub fn lesson(id: i64, class_id: i64) -> Value {
    json!({
        "id": id,
        "subjectId": 7,
        "classId": class_id,
        "subjectName": "Math",
        "startsAt": "2024-05-01T08:00:00Z",
        "endsAt": "2024-05-01T08:45:00Z",
        "room": "101"
    })
}

pub fn chat(id: i64) -> Value {
    json!({ "id": id, "title": format!("Chat {}", id), "lastMessage": null })
}

pub fn message(id: i64, chat_id: i64, sent_at: &str) -> Value {
    json!({
        "id": id,
        "chatId": chat_id,
        "senderId": 2,
        "text": format!("Message {}", id),
        "sentAt": sent_at,
        "attachment": null
    })
}
