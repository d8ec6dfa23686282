mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, setup_lesson_fixture, spawn_sidecar, temp_dir};

#[test]
fn provision_creates_missing_records_and_is_idempotent() {
    let workspace = temp_dir("campusd-bulk-provision");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 3);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.bulkProvision",
        json!({ "lessonId": fx.lesson_id }),
    );
    assert_eq!(first["createdCount"].as_i64(), Some(3));
    assert_eq!(
        first["createdRecordIds"].as_array().map(|a| a.len()),
        Some(3)
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.bulkProvision",
        json!({ "lessonId": fx.lesson_id }),
    );
    assert_eq!(second["createdCount"].as_i64(), Some(0));
}

#[test]
fn starting_after_provision_reuses_existing_records() {
    let workspace = temp_dir("campusd-provision-then-start");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 2);

    let provisioned = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.bulkProvision",
        json!({ "lessonId": fx.lesson_id }),
    );
    let mut pre_ids: Vec<String> = provisioned["createdRecordIds"]
        .as_array()
        .expect("ids")
        .iter()
        .map(|v| v.as_str().expect("id").to_string())
        .collect();
    pre_ids.sort();

    let started = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.start",
        json!({ "lessonId": fx.lesson_id, "teacherId": fx.teacher_id }),
    );
    let mut live_ids: Vec<String> = started["session"]["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|e| e["attendanceRecordId"].as_str().expect("record id").to_string())
        .collect();
    live_ids.sort();

    assert_eq!(pre_ids, live_ids);
}

#[test]
fn provision_covers_students_added_after_creation() {
    let workspace = temp_dir("campusd-provision-growth");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 2);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.bulkProvision",
        json!({ "lessonId": fx.lesson_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "groupId": fx.group_id,
            "lastName": "Newcomer",
            "firstName": "Late",
        }),
    );
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.bulkProvision",
        json!({ "lessonId": fx.lesson_id }),
    );
    assert_eq!(again["createdCount"].as_i64(), Some(1));
}

#[test]
fn provision_requires_an_existing_lesson() {
    let workspace = temp_dir("campusd-provision-missing");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _fx = setup_lesson_fixture(&mut stdin, &mut reader, &workspace, 1);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.bulkProvision",
        json!({ "lessonId": "no-such-lesson" }),
        "not_found",
    );
}
