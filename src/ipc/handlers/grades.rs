use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_grades_list_by_lesson(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let lesson_id = match req.params.get("lessonId").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing lessonId", None),
    };

    let mut stmt = match conn.prepare(
        "SELECT g.id, g.student_id, s.last_name, s.first_name, g.score, g.letter, g.feedback, g.graded_at
         FROM grades g
         JOIN students s ON s.id = g.student_id
         WHERE g.lesson_id = ?
         ORDER BY g.graded_at, g.id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&lesson_id], |row| {
            let last: String = row.get(2)?;
            let first: String = row.get(3)?;
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "studentId": row.get::<_, String>(1)?,
                "studentName": format!("{}, {}", last, first),
                "score": row.get::<_, f64>(4)?,
                "letter": row.get::<_, String>(5)?,
                "feedback": row.get::<_, Option<String>>(6)?,
                "gradedAt": row.get::<_, String>(7)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.listByLesson" => Some(handle_grades_list_by_lesson(state, req)),
        _ => None,
    }
}
