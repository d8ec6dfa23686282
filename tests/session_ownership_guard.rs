mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, setup_lesson_fixture, spawn_sidecar, temp_dir};

#[test]
fn non_owner_is_rejected_without_state_change() {
    let workspace = temp_dir("campusd-ownership");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 2);

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "name": "Okafor, Sam" }),
    );
    let other_id = other["teacherId"].as_str().expect("teacherId").to_string();

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "session.start",
        json!({ "lessonId": fx.lesson_id, "teacherId": other_id }),
        "unauthorized",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "session.active",
        json!({ "lessonId": fx.lesson_id, "teacherId": other_id }),
        "unauthorized",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "session.updateAttendance",
        json!({
            "lessonId": fx.lesson_id,
            "studentId": fx.student_ids[0],
            "status": "absent",
            "teacherId": other_id,
        }),
        "unauthorized",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "session.end",
        json!({ "lessonId": fx.lesson_id, "teacherId": other_id }),
        "unauthorized",
    );

    // The rejected calls must have left the lesson untouched.
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "lessons.open",
        json!({ "lessonId": fx.lesson_id }),
    );
    let lesson = &opened["lesson"];
    assert_eq!(lesson["isActive"].as_bool(), Some(false));
    assert_eq!(lesson["isCompleted"].as_bool(), Some(false));
    assert!(lesson["sessionStartTime"].is_null());
}

#[test]
fn admin_may_drive_any_lesson() {
    let workspace = temp_dir("campusd-admin-override");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 2);

    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "name": "Head, Office", "role": "admin" }),
    );
    let admin_id = admin["teacherId"].as_str().expect("teacherId").to_string();

    let started = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.start",
        json!({ "lessonId": fx.lesson_id, "teacherId": admin_id }),
    );
    assert_eq!(started["session"]["isActive"].as_bool(), Some(true));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.updateAttendance",
        json!({
            "lessonId": fx.lesson_id,
            "studentId": fx.student_ids[0],
            "status": "late",
            "teacherId": admin_id,
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.end",
        json!({ "lessonId": fx.lesson_id, "teacherId": admin_id }),
    );
}

#[test]
fn unknown_caller_is_unauthorized() {
    let workspace = temp_dir("campusd-unknown-caller");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 1);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "session.start",
        json!({ "lessonId": fx.lesson_id, "teacherId": "nobody" }),
        "unauthorized",
    );
}

#[test]
fn missing_lesson_is_not_found() {
    let workspace = temp_dir("campusd-missing-lesson");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 1);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "session.start",
        json!({ "lessonId": "no-such-lesson", "teacherId": fx.teacher_id }),
        "not_found",
    );
}
