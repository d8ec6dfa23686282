#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_campusd"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), nanos));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let line = serde_json::to_string(&json!({
        "id": id,
        "method": method,
        "params": params,
    }))
    .expect("serialize request");
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");

    let mut resp_line = String::new();
    reader.read_line(&mut resp_line).expect("read response");
    serde_json::from_str(&resp_line).expect("parse response")
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok response for {}, got: {}",
        method,
        resp
    );
    resp.get("result").cloned().unwrap_or(Value::Null)
}

pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
    expected_code: &str,
) -> Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected error response for {}, got: {}",
        method,
        resp
    );
    let error = resp.get("error").cloned().unwrap_or(Value::Null);
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some(expected_code),
        "expected error code {} for {}, got: {}",
        expected_code,
        method,
        error
    );
    error
}

pub struct Fixture {
    pub teacher_id: String,
    pub group_id: String,
    pub student_ids: Vec<String>,
    pub lesson_id: String,
}

/// Workspace with one teacher, one group, `student_count` active
/// students, and one scheduled lesson owned by that teacher.
pub fn setup_lesson_fixture(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
    student_count: usize,
) -> Fixture {
    let _ = request_ok(
        stdin,
        reader,
        "fx-workspace",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher = request_ok(
        stdin,
        reader,
        "fx-teacher",
        "teachers.create",
        json!({ "name": "Rivera, Dana" }),
    );
    let teacher_id = teacher
        .get("teacherId")
        .and_then(|v| v.as_str())
        .expect("teacherId")
        .to_string();
    let group = request_ok(
        stdin,
        reader,
        "fx-group",
        "groups.create",
        json!({ "name": "Period 3 Math" }),
    );
    let group_id = group
        .get("groupId")
        .and_then(|v| v.as_str())
        .expect("groupId")
        .to_string();

    let mut student_ids = Vec::with_capacity(student_count);
    for i in 0..student_count {
        let created = request_ok(
            stdin,
            reader,
            &format!("fx-student-{}", i),
            "students.create",
            json!({
                "groupId": group_id,
                "lastName": format!("Student{}", i + 1),
                "firstName": "Test",
            }),
        );
        student_ids.push(
            created
                .get("studentId")
                .and_then(|v| v.as_str())
                .expect("studentId")
                .to_string(),
        );
    }

    let lesson = request_ok(
        stdin,
        reader,
        "fx-lesson",
        "lessons.create",
        json!({
            "teacherId": teacher_id,
            "groupId": group_id,
            "title": "Fractions review",
            "scheduledDate": "2026-03-02",
        }),
    );
    let lesson_id = lesson
        .get("lessonId")
        .and_then(|v| v.as_str())
        .expect("lessonId")
        .to_string();

    Fixture {
        teacher_id,
        group_id,
        student_ids,
        lesson_id,
    }
}
