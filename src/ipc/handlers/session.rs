use crate::grades;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const STATUS_PRESENT: &str = "present";
const STATUS_ABSENT: &str = "absent";
const STATUS_LATE: &str = "late";

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    fn db(code: &'static str, e: impl ToString) -> Self {
        HandlerErr {
            code,
            message: e.to_string(),
            details: None,
        }
    }
}

fn validate_status(status: &str) -> bool {
    matches!(status, STATUS_PRESENT | STATUS_ABSENT | STATUS_LATE)
}

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

#[derive(Debug, Clone)]
struct LessonRow {
    id: String,
    teacher_id: String,
    group_id: String,
    title: String,
    is_active: bool,
    is_completed: bool,
    session_start_time: Option<String>,
    session_end_time: Option<String>,
}

fn load_lesson(conn: &Connection, lesson_id: &str) -> Result<LessonRow, HandlerErr> {
    conn.query_row(
        "SELECT id, teacher_id, group_id, title, is_active, is_completed,
                session_start_time, session_end_time
         FROM lessons
         WHERE id = ?",
        [lesson_id],
        |r| {
            Ok(LessonRow {
                id: r.get(0)?,
                teacher_id: r.get(1)?,
                group_id: r.get(2)?,
                title: r.get(3)?,
                is_active: r.get::<_, i64>(4)? != 0,
                is_completed: r.get::<_, i64>(5)? != 0,
                session_start_time: r.get(6)?,
                session_end_time: r.get(7)?,
            })
        },
    )
    .optional()
    .map_err(|e| HandlerErr::db("db_query_failed", e))?
    .ok_or_else(|| HandlerErr::new("not_found", "lesson not found"))
}

/// Every orchestrator operation goes through this single guard: the
/// owning teacher or any admin may drive the session, nobody else.
fn require_owner_or_admin(
    conn: &Connection,
    lesson: &LessonRow,
    caller_id: &str,
) -> Result<(), HandlerErr> {
    if lesson.teacher_id == caller_id {
        // Owner still has to exist; the FK guarantees that for lessons.
        return Ok(());
    }
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM teachers WHERE id = ?",
            [caller_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    match role.as_deref() {
        Some("admin") => Ok(()),
        _ => Err(HandlerErr::new(
            "unauthorized",
            "caller is not the owning teacher",
        )),
    }
}

fn lookup_name(conn: &Connection, table: &str, id: &str) -> Result<String, HandlerErr> {
    let sql = format!("SELECT name FROM {} WHERE id = ?", table);
    conn.query_row(&sql, [id], |r| r.get::<_, String>(0))
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))
        .map(|v| v.unwrap_or_default())
}

/// Roster joined against existing attendance rows. Students without a
/// row display as present with a null record id; nothing is written.
fn session_view(conn: &Connection, lesson: &LessonRow) -> Result<serde_json::Value, HandlerErr> {
    let teacher_name = lookup_name(conn, "teachers", &lesson.teacher_id)?;
    let group_name = lookup_name(conn, "groups", &lesson.group_id)?;
    let students = roster::students_in_group(conn, &lesson.group_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let mut by_student: HashMap<String, (String, String, Option<String>)> = HashMap::new();
    let mut stmt = conn
        .prepare(
            "SELECT student_id, id, status, remarks
             FROM attendance_records
             WHERE lesson_id = ?",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let rows = stmt
        .query_map([&lesson.id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    for (student_id, record_id, status, remarks) in rows {
        by_student.insert(student_id, (record_id, status, remarks));
    }

    let students_json: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let record = by_student.get(&s.id);
            json!({
                "studentId": s.id,
                "studentName": s.display_name,
                "currentStatus": record.map(|r| r.1.as_str()).unwrap_or(STATUS_PRESENT),
                "attendanceRecordId": record.map(|r| r.0.clone()),
                "remarks": record.and_then(|r| r.2.clone()),
            })
        })
        .collect();

    Ok(json!({
        "lessonId": lesson.id,
        "title": lesson.title,
        "groupId": lesson.group_id,
        "groupName": group_name,
        "teacherId": lesson.teacher_id,
        "teacherName": teacher_name,
        "isActive": lesson.is_active,
        "isCompleted": lesson.is_completed,
        "sessionStartTime": lesson.session_start_time,
        "sessionEndTime": lesson.session_end_time,
        "students": students_json,
    }))
}

/// Insert a present-default row for every roster student lacking one.
/// ON CONFLICT DO NOTHING keeps existing marks untouched, so re-running
/// is always safe.
fn provision_missing(
    conn: &Connection,
    lesson: &LessonRow,
    recorded_by: &str,
    session_start_time: Option<&str>,
    ts: &str,
) -> Result<Vec<String>, HandlerErr> {
    let students = roster::students_in_group(conn, &lesson.group_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let mut created: Vec<String> = Vec::new();
    for student in &students {
        let record_id = Uuid::new_v4().to_string();
        let changed = conn
            .execute(
                "INSERT INTO attendance_records(
                    id, lesson_id, student_id, teacher_id, status,
                    attendance_date, session_start_time, remarks, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, NULL, NULL)
                 ON CONFLICT(lesson_id, student_id) DO NOTHING",
                params![
                    record_id,
                    lesson.id,
                    student.id,
                    recorded_by,
                    STATUS_PRESENT,
                    ts,
                    session_start_time
                ],
            )
            .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
        if changed > 0 {
            created.push(record_id);
        }
    }
    Ok(created)
}

fn session_start(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    let teacher_id = get_required_str(params, "teacherId")?;

    let lesson = load_lesson(conn, &lesson_id)?;
    require_owner_or_admin(conn, &lesson, &teacher_id)?;
    if lesson.is_completed {
        return Err(HandlerErr::new("invalid_state", "lesson already completed"));
    }
    if lesson.is_active {
        // Teacher navigated away and back; treat as a read.
        let view = session_view(conn, &lesson)?;
        return Ok(json!({ "session": view }));
    }

    let ts = now_ts();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "UPDATE lessons SET is_active = 1, session_start_time = ?, updated_at = ? WHERE id = ?",
        params![ts, ts, lesson.id],
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    provision_missing(&tx, &lesson, &teacher_id, Some(&ts), &ts)?;
    tx.commit().map_err(|e| HandlerErr::db("db_commit_failed", e))?;

    let lesson = load_lesson(conn, &lesson_id)?;
    let view = session_view(conn, &lesson)?;
    Ok(json!({ "session": view }))
}

fn session_active(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    let teacher_id = get_required_str(params, "teacherId")?;

    let lesson = load_lesson(conn, &lesson_id)?;
    require_owner_or_admin(conn, &lesson, &teacher_id)?;
    if !lesson.is_active {
        return Err(HandlerErr::new("invalid_state", "session not started"));
    }
    let view = session_view(conn, &lesson)?;
    Ok(json!({ "session": view }))
}

fn session_update_attendance(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    let student_id = get_required_str(params, "studentId")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let status = get_required_str(params, "status")?.to_ascii_lowercase();
    if !validate_status(&status) {
        return Err(HandlerErr::new(
            "bad_params",
            format!("invalid status: {}", status),
        ));
    }
    let remarks = match params.get("remarks") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_str() {
            Some(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            None => {
                return Err(HandlerErr::new(
                    "bad_params",
                    "remarks must be string or null",
                ))
            }
        },
    };

    let lesson = load_lesson(conn, &lesson_id)?;
    require_owner_or_admin(conn, &lesson, &teacher_id)?;
    if lesson.is_completed {
        return Err(HandlerErr::new("invalid_state", "lesson already completed"));
    }
    if !lesson.is_active {
        return Err(HandlerErr::new("invalid_state", "session not started"));
    }

    let in_group = conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ? AND group_id = ?",
            params![student_id, lesson.group_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .is_some();
    if !in_group {
        return Err(HandlerErr::new("not_found", "student not found in lesson group"));
    }

    // Atomic upsert keyed on (lesson, student): last write wins, no
    // query-then-write race. The insert path covers students marked
    // before any provisioning pass reached them.
    let ts = now_ts();
    let record_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO attendance_records(
            id, lesson_id, student_id, teacher_id, status,
            attendance_date, session_start_time, remarks, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, NULL)
         ON CONFLICT(lesson_id, student_id) DO UPDATE SET
           status = excluded.status,
           teacher_id = excluded.teacher_id,
           remarks = COALESCE(excluded.remarks, attendance_records.remarks),
           updated_at = ?",
        params![
            record_id,
            lesson.id,
            student_id,
            teacher_id,
            status,
            ts,
            lesson.session_start_time,
            remarks,
            ts
        ],
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e))?;

    Ok(json!({ "ok": true }))
}

fn session_end(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    let teacher_id = get_required_str(params, "teacherId")?;

    let lesson = load_lesson(conn, &lesson_id)?;
    require_owner_or_admin(conn, &lesson, &teacher_id)?;
    if lesson.is_completed {
        return Err(HandlerErr::new("invalid_state", "lesson already completed"));
    }

    let entries: Vec<(String, f64, Option<String>)> = match params.get("grades") {
        None => Vec::new(),
        Some(v) if v.is_null() => Vec::new(),
        Some(v) => {
            let arr = v
                .as_array()
                .ok_or_else(|| HandlerErr::new("bad_params", "grades must be an array"))?;
            let mut out = Vec::with_capacity(arr.len());
            for entry in arr {
                let Some(student_id) = entry.get("studentId").and_then(|x| x.as_str()) else {
                    return Err(HandlerErr::new(
                        "bad_params",
                        "grades entries must carry studentId",
                    ));
                };
                let Some(score) = entry.get("score").and_then(|x| x.as_f64()) else {
                    return Err(HandlerErr::new(
                        "bad_params",
                        "grades entries must carry a numeric score",
                    ));
                };
                let feedback = entry
                    .get("feedback")
                    .and_then(|x| x.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
                out.push((student_id.trim().to_string(), score, feedback));
            }
            out
        }
    };

    let ts = now_ts();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    let mut graded_count: i64 = 0;
    let mut skipped: Vec<serde_json::Value> = Vec::new();
    for (student_id, score, feedback) in &entries {
        if !grades::score_in_range(*score) {
            skipped.push(json!({ "studentId": student_id, "reason": "score out of range" }));
            continue;
        }
        let in_group = tx
            .query_row(
                "SELECT 1 FROM students WHERE id = ? AND group_id = ?",
                params![student_id, lesson.group_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()
            .map_err(|e| HandlerErr::db("db_query_failed", e))?
            .is_some();
        if !in_group {
            skipped.push(json!({ "studentId": student_id, "reason": "student not in group" }));
            continue;
        }
        grades::insert_grade(
            &tx,
            &lesson.id,
            student_id,
            &lesson.group_id,
            *score,
            feedback.as_deref(),
            &ts,
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
        graded_count += 1;
    }

    tx.execute(
        "UPDATE lessons SET is_active = 0, is_completed = 1, session_end_time = ?, updated_at = ? WHERE id = ?",
        params![ts, ts, lesson.id],
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    tx.commit().map_err(|e| HandlerErr::db("db_commit_failed", e))?;

    Ok(json!({ "gradedCount": graded_count, "skipped": skipped }))
}

fn attendance_bulk_provision(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    let lesson = load_lesson(conn, &lesson_id)?;

    // Pre-population path: no ownership or session-state precondition.
    let ts = now_ts();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    let created = provision_missing(
        &tx,
        &lesson,
        &lesson.teacher_id,
        lesson.session_start_time.as_deref(),
        &ts,
    )?;
    tx.commit().map_err(|e| HandlerErr::db("db_commit_failed", e))?;

    Ok(json!({
        "createdCount": created.len(),
        "createdRecordIds": created,
    }))
}

fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.start" => Some(with_conn(state, req, session_start)),
        "session.active" => Some(with_conn(state, req, session_active)),
        "session.updateAttendance" => Some(with_conn(state, req, session_update_attendance)),
        "session.end" => Some(with_conn(state, req, session_end)),
        "attendance.bulkProvision" => Some(with_conn(state, req, attendance_bulk_provision)),
        _ => None,
    }
}
