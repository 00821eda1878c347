//! crates/gradebook_core/src/domain.rs
//!
//! Plain data shapes returned by the gradebook API.
//! Entities in [`crate::graph`] are built from these and add lazy children on top.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned identifier, unique within one entity type.
pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Administrator,
}

/// Who is signed in. Returned by the auth endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: EntityId,
    pub role: Role,
    pub full_name: String,
    pub token: String,
}

/// A subject a student studies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInfo {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub teacher_name: Option<String>,
}

/// A subject a teacher teaches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaughtSubjectInfo {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub students_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: EntityId,
    pub full_name: String,
}

/// A parent's child.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildInfo {
    pub id: EntityId,
    pub full_name: String,
    /// `None` while the child is not enrolled in any class.
    #[serde(default)]
    pub class_id: Option<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: EntityId,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: EntityId,
    pub subject_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInfo {
    pub id: EntityId,
    pub subject_id: EntityId,
    pub student_id: EntityId,
    pub grade: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAssessmentInfo {
    pub id: EntityId,
    pub subject_id: EntityId,
    pub student_id: EntityId,
    pub grade: String,
}

/// Summary the server recomputes whenever a ledger changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageGrade {
    pub average: Option<f64>,
}

/// One row of a class journal: a student and their current average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRow {
    pub student_id: EntityId,
    pub full_name: String,
    pub average: Option<f64>,
}

/// A timetable entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInfo {
    pub id: EntityId,
    pub subject_id: EntityId,
    pub class_id: EntityId,
    pub subject_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub room: Option<String>,
}

/// A lesson a teacher opened to take attendance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: EntityId,
    pub class_id: EntityId,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: EntityId,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInfo {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub last_message: Option<MessageInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: EntityId,
    pub chat_id: EntityId,
    pub sender_id: EntityId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    /// Server link of an attached file.
    #[serde(default)]
    pub attachment: Option<String>,
}
