use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::{params, types::Value, params_from_iter, Connection, OptionalExtension};
use serde_json::{json, Value as JsonValue};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn row_exists(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}

fn lesson_to_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<JsonValue> {
    Ok(json!({
        "id": row.get::<_, String>(0)?,
        "teacherId": row.get::<_, String>(1)?,
        "groupId": row.get::<_, String>(2)?,
        "title": row.get::<_, String>(3)?,
        "scheduledDate": row.get::<_, Option<String>>(4)?,
        "isActive": row.get::<_, i64>(5)? != 0,
        "isCompleted": row.get::<_, i64>(6)? != 0,
        "sessionStartTime": row.get::<_, Option<String>>(7)?,
        "sessionEndTime": row.get::<_, Option<String>>(8)?,
        "createdAt": row.get::<_, String>(9)?,
        "updatedAt": row.get::<_, String>(10)?,
    }))
}

const LESSON_COLUMNS: &str = "id, teacher_id, group_id, title, scheduled_date, is_active, is_completed, session_start_time, session_end_time, created_at, updated_at";

fn handle_lessons_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let group_id = match required_str(req, "groupId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scheduled_date = match req.params.get("scheduledDate") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let Some(s) = v.as_str() else {
                return err(&req.id, "bad_params", "scheduledDate must be string or null", None);
            };
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                    return err(&req.id, "bad_params", "scheduledDate must be YYYY-MM-DD", None);
                }
                Some(s.to_string())
            }
        }
    };

    match row_exists(conn, "SELECT 1 FROM teachers WHERE id = ?", &teacher_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "teacher not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    match row_exists(conn, "SELECT 1 FROM groups WHERE id = ?", &group_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "group not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let lesson_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO lessons(
            id, teacher_id, group_id, title, scheduled_date, is_active, is_completed,
            session_start_time, session_end_time, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, 0, 0, NULL, NULL, ?, ?)",
        params![lesson_id, teacher_id, group_id, title, scheduled_date, ts, ts],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "lessons" })),
        );
    }
    ok(&req.id, json!({ "lessonId": lesson_id }))
}

fn handle_lessons_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut where_clause = String::from("1 = 1");
    let mut values: Vec<Value> = Vec::new();
    if let Some(teacher_id) = req.params.get("teacherId").and_then(|v| v.as_str()) {
        where_clause.push_str(" AND teacher_id = ?");
        values.push(Value::Text(teacher_id.trim().to_string()));
    }
    if let Some(group_id) = req.params.get("groupId").and_then(|v| v.as_str()) {
        where_clause.push_str(" AND group_id = ?");
        values.push(Value::Text(group_id.trim().to_string()));
    }
    let sql = format!(
        "SELECT {} FROM lessons WHERE {} ORDER BY scheduled_date, created_at, id",
        LESSON_COLUMNS, where_clause
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let lessons = match stmt.query_map(params_from_iter(values), lesson_to_json) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "lessons": lessons }))
}

fn handle_lessons_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sql = format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLUMNS);
    match conn
        .query_row(&sql, params![lesson_id], lesson_to_json)
        .optional()
    {
        Ok(Some(lesson)) => ok(&req.id, json!({ "lesson": lesson })),
        Ok(None) => err(&req.id, "not_found", "lesson not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "lessons.list" => Some(handle_lessons_list(state, req)),
        "lessons.open" => Some(handle_lessons_open(state, req)),
        _ => None,
    }
}
