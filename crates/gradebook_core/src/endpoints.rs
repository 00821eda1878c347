//! crates/gradebook_core/src/endpoints.rs
//!
//! Endpoint paths of the gradebook API. Paths are relative to the configured base
//! URL and are treated as opaque strings by the transport.
//!
//! Student-facing paths take a `root`: `student` for the signed-in student, or
//! `parent/children/{id}` when a parent looks at a child.

use crate::domain::{EntityId, Role};

pub fn login() -> &'static str {
    "auth/login"
}

pub fn logout() -> &'static str {
    "auth/logout"
}

pub fn role_root(role: Role) -> &'static str {
    match role {
        Role::Student => "student",
        Role::Teacher => "teacher",
        Role::Parent => "parent",
        Role::Administrator => "admin",
    }
}

pub fn timetable(role: Role) -> String {
    format!("{}/timetable", role_root(role))
}

// --- Student view (own or a child's) ---

pub fn subjects(root: &str) -> String {
    format!("{}/subjects", root)
}

pub fn subject_tasks(root: &str, subject_id: EntityId) -> String {
    format!("{}/subjects/{}/tasks", root, subject_id)
}

pub fn task(root: &str, task_id: EntityId) -> String {
    format!("{}/tasks/{}", root, task_id)
}

pub fn task_completion(task_id: EntityId) -> String {
    format!("student/tasks/{}/completion", task_id)
}

pub fn ledger(root: &str, subject_id: EntityId) -> String {
    format!("{}/subjects/{}", root, subject_id)
}

// --- Teacher ---

pub fn taught_subjects() -> &'static str {
    "teacher/subjects"
}

pub fn classes(subject_id: EntityId) -> String {
    format!("teacher/subjects/{}/classes", subject_id)
}

pub fn class_root(subject_id: EntityId, class_id: EntityId) -> String {
    format!("teacher/subjects/{}/classes/{}", subject_id, class_id)
}

pub fn class_tasks(subject_id: EntityId, class_id: EntityId) -> String {
    format!("{}/tasks", class_root(subject_id, class_id))
}

pub fn teacher_task(task_id: EntityId) -> String {
    format!("teacher/tasks/{}", task_id)
}

pub fn class_students(subject_id: EntityId, class_id: EntityId) -> String {
    format!("{}/students", class_root(subject_id, class_id))
}

pub fn student_ledger(subject_id: EntityId, class_id: EntityId, student_id: EntityId) -> String {
    format!("{}/students/{}", class_root(subject_id, class_id), student_id)
}

pub fn class_journal(subject_id: EntityId, class_id: EntityId) -> String {
    format!("{}/journal", class_root(subject_id, class_id))
}

pub fn journal_row(subject_id: EntityId, class_id: EntityId, student_id: EntityId) -> String {
    format!("{}/journal/{}", class_root(subject_id, class_id), student_id)
}

pub fn class_sessions(class_id: EntityId) -> String {
    format!("teacher/classes/{}/sessions", class_id)
}

pub fn session(session_id: EntityId) -> String {
    format!("teacher/sessions/{}", session_id)
}

pub fn session_close(session_id: EntityId) -> String {
    format!("{}/close", session(session_id))
}

pub fn attendance(session_id: EntityId) -> String {
    format!("{}/attendance", session(session_id))
}

// --- Parent ---

pub fn children() -> &'static str {
    "parent/children"
}

pub fn child_root(child_id: EntityId) -> String {
    format!("parent/children/{}", child_id)
}

// --- Chats (every role) ---

pub fn chats() -> &'static str {
    "chats"
}

pub fn chat(chat_id: EntityId) -> String {
    format!("chats/{}", chat_id)
}

pub fn chat_messages(chat_id: EntityId) -> String {
    format!("chats/{}/messages", chat_id)
}

pub fn chat_message(chat_id: EntityId, message_id: EntityId) -> String {
    format!("chats/{}/messages/{}", chat_id, message_id)
}

pub fn chat_files(chat_id: EntityId) -> String {
    format!("chats/{}/files", chat_id)
}

// --- Administrator ---

pub fn users() -> &'static str {
    "admin/users"
}

pub fn user(user_id: EntityId) -> String {
    format!("admin/users/{}", user_id)
}

pub fn admin_classes() -> &'static str {
    "admin/classes"
}

pub fn admin_class(class_id: EntityId) -> String {
    format!("admin/classes/{}", class_id)
}
