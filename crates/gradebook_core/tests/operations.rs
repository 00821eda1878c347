//! Operations users start themselves: what goes over the wire and how the cache
//! follows the server's answer.

mod common;

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use common::{
    assessment, average, chat, graph_for, message, serve_teacher_class, session, task, teacher_ledger_path,
    FakeTransport, Method, STUDENT_ID,
};
use gradebook_core::graph::TeacherClass;
use gradebook_core::{PortError, Role, RoleGraph};

async fn teacher_class(graph: &RoleGraph) -> Arc<TeacherClass> {
    let subject = graph.as_teacher().unwrap().subject(3).await.unwrap().unwrap();
    subject.class(2).await.unwrap().unwrap()
}

//=========================================================================================
// Student
//=========================================================================================

#[tokio::test]
async fn student_marks_a_task_completed_and_back() {
    let transport = FakeTransport::new();
    transport.reply(Method::Get, "student/subjects", json!([{ "id": 7, "name": "Math" }]));
    transport.reply(Method::Get, "student/subjects/7/tasks", json!([task(1, 7)]));
    transport.on(Method::Put, "student/tasks/1/completion", |body| {
        let completed = body.and_then(|b| b["completed"].as_bool()).unwrap_or_default();
        let mut info = task(1, 7);
        info["completed"] = json!(completed);
        Ok(info)
    });
    let (graph, _) = graph_for(Role::Student, &transport);

    let subject = graph.as_student().unwrap().subject(7).await.unwrap().unwrap();
    subject.tasks().load_next().await.unwrap();
    let homework = subject.tasks().at(0).unwrap();

    homework.mark_completed().await.unwrap();
    assert!(homework.is_completed());
    assert_eq!(
        transport.last_argument(Method::Put, "student/tasks/1/completion"),
        Some(json!({ "completed": true }))
    );

    homework.mark_uncompleted().await.unwrap();
    assert!(!homework.is_completed());
    assert_eq!(
        transport.last_argument(Method::Put, "student/tasks/1/completion"),
        Some(json!({ "completed": false }))
    );
}

//=========================================================================================
// Teacher
//=========================================================================================

#[tokio::test]
async fn grade_changes_follow_the_server_answers() {
    let transport = FakeTransport::new();
    serve_teacher_class(&transport);
    let path = teacher_ledger_path();
    let (graph, _) = graph_for(Role::Teacher, &transport);

    let class = teacher_class(&graph).await;
    let student = class.student(STUDENT_ID).await.unwrap().unwrap();
    let ledger = student.ledger().await.unwrap();

    transport.reply(Method::Post, &format!("{}/assessments", path), assessment(2, 3, "5"));
    transport.reply(Method::Get, &format!("{}/average", path), average(4.0));
    let created = ledger.add_assessment("5", Some("oral answer")).await.unwrap();
    assert_eq!(created.id, 2);
    assert_eq!(
        transport.last_argument(Method::Post, &format!("{}/assessments", path)),
        Some(json!({ "grade": "5", "comment": "oral answer" }))
    );
    let ids: Vec<i64> = ledger.assessments().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(ledger.average(), Some(4.0));

    transport.reply(Method::Put, &format!("{}/assessments/2", path), assessment(2, 3, "4"));
    transport.reply(Method::Get, &format!("{}/average", path), average(3.5));
    ledger.change_assessment(2, "4", None).await.unwrap();
    assert_eq!(
        transport.last_argument(Method::Put, &format!("{}/assessments/2", path)),
        Some(json!({ "grade": "4", "comment": null }))
    );
    assert_eq!(ledger.assessment(2).unwrap().grade, "4");
    assert_eq!(ledger.average(), Some(3.5));

    transport.reply(Method::Delete, &format!("{}/assessments/1", path), Value::Null);
    transport.reply(Method::Get, &format!("{}/average", path), average(4.0));
    ledger.delete_assessment(1).await.unwrap();
    assert_eq!(transport.calls(Method::Delete, &format!("{}/assessments/1", path)), 1);
    assert_eq!(ledger.assessment(1), None);
    assert_eq!(ledger.average(), Some(4.0));

    transport.reply(
        Method::Post,
        &format!("{}/final-assessment", path),
        json!({ "id": 8, "subjectId": 3, "studentId": STUDENT_ID, "grade": "4" }),
    );
    let final_assessment = ledger.set_final_assessment("4").await.unwrap();
    assert_eq!(
        transport.last_argument(Method::Post, &format!("{}/final-assessment", path)),
        Some(json!({ "grade": "4" }))
    );
    assert_eq!(ledger.final_assessment(), Some(final_assessment));
}

#[tokio::test]
async fn committed_grade_is_kept_when_the_average_cannot_be_fetched() {
    let transport = FakeTransport::new();
    serve_teacher_class(&transport);
    let path = teacher_ledger_path();
    let (graph, _) = graph_for(Role::Teacher, &transport);

    let class = teacher_class(&graph).await;
    let student = class.student(STUDENT_ID).await.unwrap().unwrap();
    let ledger = student.ledger().await.unwrap();

    transport.reply(Method::Post, &format!("{}/assessments", path), assessment(2, 3, "5"));
    transport.fail(
        Method::Get,
        &format!("{}/average", path),
        PortError::Remote("average unavailable".into()),
    );
    let created = ledger.add_assessment("5", None).await.unwrap();

    assert_eq!(ledger.assessment(2), Some(created));
    assert_eq!(ledger.average(), Some(3.0));
}

#[tokio::test]
async fn rejected_grade_leaves_the_ledger_untouched() {
    let transport = FakeTransport::new();
    serve_teacher_class(&transport);
    let path = teacher_ledger_path();
    let (graph, _) = graph_for(Role::Teacher, &transport);

    let class = teacher_class(&graph).await;
    let student = class.student(STUDENT_ID).await.unwrap().unwrap();
    let ledger = student.ledger().await.unwrap();
    let before = transport.calls(Method::Get, &format!("{}/average", path));

    transport.fail(
        Method::Post,
        &format!("{}/assessments", path),
        PortError::Remote("grade out of scale".into()),
    );
    let err = ledger.add_assessment("9", None).await.unwrap_err();

    assert_eq!(err, PortError::Remote("grade out of scale".into()));
    assert_eq!(ledger.assessments().len(), 1);
    assert_eq!(ledger.average(), Some(3.0));
    assert_eq!(transport.calls(Method::Get, &format!("{}/average", path)), before);
}

#[tokio::test]
async fn opened_session_takes_attendance_and_closes() {
    let transport = FakeTransport::new();
    serve_teacher_class(&transport);
    transport.reply(Method::Get, "teacher/classes/2/sessions", json!([session(5, 2, true)]));
    transport.reply(Method::Post, "teacher/classes/2/sessions", session(6, 2, false));
    transport.reply(Method::Get, "teacher/sessions/6/attendance", json!([]));
    transport.reply(
        Method::Put,
        "teacher/sessions/6/attendance",
        json!({ "studentId": STUDENT_ID, "present": true }),
    );
    transport.reply(Method::Post, "teacher/sessions/6/close", session(6, 2, true));
    let (graph, _) = graph_for(Role::Teacher, &transport);

    let class = teacher_class(&graph).await;
    class.sessions().load_next().await.unwrap();

    let opened = class.open_session().await.unwrap();
    assert_eq!(
        transport.last_argument(Method::Post, "teacher/classes/2/sessions"),
        Some(json!({ "subjectId": 3 }))
    );
    let ids: Vec<i64> = class.sessions().items().iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![6, 5]);
    assert!(!opened.is_closed());

    let sheet = opened.attendance().await.unwrap();
    assert_eq!(sheet.is_present(STUDENT_ID), None);
    let mark = opened.set_attendance(STUDENT_ID, true).await.unwrap();
    assert!(mark.present);
    assert_eq!(
        transport.last_argument(Method::Put, "teacher/sessions/6/attendance"),
        Some(json!({ "studentId": STUDENT_ID, "present": true }))
    );
    assert_eq!(sheet.is_present(STUDENT_ID), Some(true));

    opened.close().await.unwrap();
    assert_eq!(transport.calls(Method::Post, "teacher/sessions/6/close"), 1);
    assert!(opened.is_closed());
}

//=========================================================================================
// Chats
//=========================================================================================

#[tokio::test]
async fn sent_messages_and_files_land_at_the_head_of_the_history() {
    let transport = FakeTransport::new();
    transport.reply(Method::Get, "chats", json!([chat(1)]));
    transport.reply(
        Method::Get,
        "chats/1/messages",
        json!([message(2, 1, "2024-05-01T09:00:00Z")]),
    );
    transport.reply(Method::Post, "chats/1/messages", message(3, 1, "2024-05-01T10:00:00Z"));
    let (graph, _) = graph_for(Role::Student, &transport);

    let chats = graph.chats().chats();
    chats.load_next().await.unwrap();
    let chat = chats.find_by_id(1).unwrap();
    chat.messages().load_next().await.unwrap();

    let sent = chat.send_message("See you at nine").await.unwrap();
    assert_eq!(sent.text(), "Message 3");
    assert_eq!(
        transport.last_argument(Method::Post, "chats/1/messages"),
        Some(json!({ "text": "See you at nine" }))
    );
    let ids: Vec<i64> = chat.messages().items().iter().map(|m| m.info().id).collect();
    assert_eq!(ids, vec![3, 2]);
    assert_eq!(chat.last_message().map(|m| m.id), Some(3));

    let mut with_file = message(4, 1, "2024-05-01T11:00:00Z");
    with_file["attachment"] = json!("files/homework.pdf");
    transport.reply(Method::Upload, "chats/1/files", json!("files/homework.pdf"));
    transport.reply(Method::Post, "chats/1/messages", with_file);
    transport.reply(Method::Download, "files/homework.pdf", Value::Null);

    let sent = chat.send_file(Path::new("homework.pdf"), None).await.unwrap();
    assert_eq!(
        transport.last_argument(Method::Post, "chats/1/messages"),
        Some(json!({ "text": "", "attachment": "files/homework.pdf" }))
    );
    assert_eq!(sent.attachment(), Some("files/homework.pdf"));
    assert_eq!(chat.messages().at(0).unwrap().info().id, 4);

    sent.download_attachment(Path::new("homework-copy.pdf")).await.unwrap();
    assert_eq!(transport.calls(Method::Download, "files/homework.pdf"), 1);

    let plain = chat.messages().find_by_id(2).unwrap();
    let err = plain
        .download_attachment(Path::new("nothing.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn failed_upload_sends_no_message() {
    let transport = FakeTransport::new();
    transport.reply(Method::Get, "chats", json!([chat(1)]));
    transport.fail(Method::Upload, "chats/1/files", PortError::Remote("file too large".into()));
    let (graph, _) = graph_for(Role::Teacher, &transport);

    let chats = graph.chats().chats();
    chats.load_next().await.unwrap();
    let chat = chats.at(0).unwrap();

    let err = chat.send_file(Path::new("video.mp4"), Some("lesson")).await.unwrap_err();
    assert_eq!(err, PortError::Remote("file too large".into()));
    assert_eq!(transport.calls(Method::Post, "chats/1/messages"), 0);
    assert_eq!(chat.last_message(), None);
}

//=========================================================================================
// Administrator
//=========================================================================================

#[tokio::test]
async fn administrator_creates_users_and_classes() {
    let transport = FakeTransport::new();
    transport.reply(
        Method::Get,
        "admin/users",
        json!([{ "id": 1, "fullName": "Ann Lee", "role": "student" }]),
    );
    transport.reply(
        Method::Post,
        "admin/users",
        json!({ "id": 2, "fullName": "Bob Stone", "role": "teacher" }),
    );
    transport.reply(Method::Post, "admin/classes", json!({ "id": 4, "name": "10B" }));
    let (graph, _) = graph_for(Role::Administrator, &transport);
    let directory = graph.as_admin().unwrap().directory();

    directory.users().load_next().await.unwrap();
    let user = directory
        .create_user("Bob Stone", Role::Teacher, "bstone", "secret")
        .await
        .unwrap();
    assert_eq!(user.id, 2);
    assert_eq!(
        transport.last_argument(Method::Post, "admin/users"),
        Some(json!({ "fullName": "Bob Stone", "role": "teacher", "login": "bstone", "password": "secret" }))
    );
    let ids: Vec<i64> = directory.users().items().iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![2, 1]);

    let class = directory.create_class("10B").await.unwrap();
    assert_eq!(class.name, "10B");
    assert_eq!(
        transport.last_argument(Method::Post, "admin/classes"),
        Some(json!({ "name": "10B" }))
    );
    assert!(!directory.classes().is_realized());
    assert_eq!(transport.calls(Method::Get, "admin/classes"), 0);
}

#[tokio::test]
async fn directory_filter_sends_the_filtered_query() {
    let transport = FakeTransport::new();
    transport.reply(
        Method::Get,
        "admin/users",
        json!([{ "id": 1, "fullName": "Ann Lee", "role": "student" }]),
    );
    let (graph, _) = graph_for(Role::Administrator, &transport);
    let users = graph.as_admin().unwrap().directory().users();

    let live = tokio_util::sync::CancellationToken::new();
    assert_eq!(users.set_filter_cancellable("ann", &live).await.unwrap(), 1);
    assert_eq!(
        transport.last_argument(Method::Get, "admin/users"),
        Some(json!({ "filterIsActive": true, "filterText": "ann", "offset": 0, "count": 20 }))
    );
    assert_eq!(users.filter(), "ann");
    assert!(users.is_realized());
}
