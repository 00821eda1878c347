//! crates/gradebook_core/src/graph/lesson.rs
//!
//! Timetables and the lesson sessions teachers open to take attendance.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::api::Api;
use crate::cache::{Identified, Lazy, Paged};
use crate::domain::{AttendanceMark, EntityId, LessonInfo, Role, SessionInfo};
use crate::endpoints;
use crate::events::Outcome;
use crate::ports::PortResult;

//=========================================================================================
// Timetable
//=========================================================================================

#[derive(Debug)]
pub struct Timetable {
    role: Role,
    lessons: Mutex<Vec<LessonInfo>>,
    api: Api,
}

impl Timetable {
    pub(crate) fn lazy(role: Role, api: Api) -> Lazy<Arc<Timetable>> {
        Lazy::new(move || {
            let api = api.clone();
            async move {
                let lessons: Vec<LessonInfo> = api.get(&endpoints::timetable(role)).await?;
                Ok(Arc::new(Timetable {
                    role,
                    lessons: Mutex::new(lessons),
                    api,
                }))
            }
        })
    }

    pub fn lessons(&self) -> Vec<LessonInfo> {
        self.lessons.lock().clone()
    }

    pub fn lessons_on(&self, day: chrono::NaiveDate) -> Vec<LessonInfo> {
        self.lessons
            .lock()
            .iter()
            .filter(|lesson| lesson.starts_at.date_naive() == day)
            .cloned()
            .collect()
    }

    /// Re-fetches the whole timetable and swaps it in.
    pub async fn refresh(&self) -> PortResult<()> {
        let lessons: Vec<LessonInfo> = self.api.get(&endpoints::timetable(self.role)).await?;
        *self.lessons.lock() = lessons;
        Ok(())
    }

    /// timetable-changed. The cached lessons cannot tell whether the user was just
    /// scheduled into `class_id`, so a loaded timetable always refreshes.
    pub(crate) async fn apply_changed(&self, class_id: EntityId) -> PortResult<Outcome> {
        debug!("Timetable of {:?} changed for class {}", self.role, class_id);
        self.refresh().await?;
        Ok(Outcome::Applied)
    }
}

//=========================================================================================
// Lesson sessions
//=========================================================================================

#[derive(Debug)]
pub struct AttendanceSheet {
    marks: Mutex<Vec<AttendanceMark>>,
}

impl AttendanceSheet {
    pub fn marks(&self) -> Vec<AttendanceMark> {
        self.marks.lock().clone()
    }

    pub fn is_present(&self, student_id: EntityId) -> Option<bool> {
        self.marks
            .lock()
            .iter()
            .find(|mark| mark.student_id == student_id)
            .map(|mark| mark.present)
    }

    fn record(&self, mark: AttendanceMark) {
        let mut marks = self.marks.lock();
        match marks.iter_mut().find(|m| m.student_id == mark.student_id) {
            Some(slot) => *slot = mark,
            None => marks.push(mark),
        }
    }
}

#[derive(Debug)]
pub struct LessonSession {
    id: EntityId,
    class_id: EntityId,
    opened_at: DateTime<Utc>,
    closed: Mutex<bool>,
    attendance: Lazy<Arc<AttendanceSheet>>,
    api: Api,
}

impl Identified for LessonSession {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl LessonSession {
    pub(crate) fn new(info: SessionInfo, api: Api) -> Self {
        let session_id = info.id;
        let sheet_api = api.clone();
        Self {
            id: info.id,
            class_id: info.class_id,
            opened_at: info.opened_at,
            closed: Mutex::new(info.closed),
            attendance: Lazy::new(move || {
                let api = sheet_api.clone();
                async move {
                    let marks: Vec<AttendanceMark> = api.get(&endpoints::attendance(session_id)).await?;
                    Ok(Arc::new(AttendanceSheet {
                        marks: Mutex::new(marks),
                    }))
                }
            }),
            api,
        }
    }

    pub(crate) fn collection(class_id: EntityId, api: Api, page_size: usize) -> Paged<Arc<LessonSession>> {
        let page_api = api.clone();
        Paged::new(
            page_size,
            move |query| {
                let api = page_api.clone();
                async move {
                    let infos: Vec<SessionInfo> =
                        api.get_with(&endpoints::class_sessions(class_id), &query).await?;
                    Ok(infos
                        .into_iter()
                        .map(|info| Arc::new(LessonSession::new(info, api.clone())))
                        .collect())
                }
            },
            move |session_id| {
                let api = api.clone();
                async move {
                    let info: SessionInfo = api.get(&endpoints::session(session_id)).await?;
                    Ok(Arc::new(LessonSession::new(info, api)))
                }
            },
        )
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn class_id(&self) -> EntityId {
        self.class_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub async fn attendance(&self) -> PortResult<Arc<AttendanceSheet>> {
        self.attendance.get().await
    }

    pub async fn set_attendance(&self, student_id: EntityId, present: bool) -> PortResult<AttendanceMark> {
        let mark: AttendanceMark = self
            .api
            .put(
                &endpoints::attendance(self.id),
                &json!({ "studentId": student_id, "present": present }),
            )
            .await?;
        if let Some(sheet) = self.attendance.peek() {
            sheet.record(mark);
        }
        Ok(mark)
    }

    pub async fn close(&self) -> PortResult<()> {
        let info: SessionInfo = self.api.post(&endpoints::session_close(self.id), &json!({})).await?;
        *self.closed.lock() = info.closed;
        Ok(())
    }

    pub(crate) fn apply_closed(&self) -> Outcome {
        *self.closed.lock() = true;
        Outcome::Applied
    }
}
