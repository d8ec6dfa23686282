use rusqlite::{params, Connection};
use uuid::Uuid;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Fixed letter breakpoints: >=90 A, >=80 B, >=70 C, >=60 D, else F.
pub fn letter_for_score(score: f64) -> &'static str {
    if score >= 90.0 {
        "A"
    } else if score >= 80.0 {
        "B"
    } else if score >= 70.0 {
        "C"
    } else if score >= 60.0 {
        "D"
    } else {
        "F"
    }
}

pub fn score_in_range(score: f64) -> bool {
    score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Append one grade row. No upsert: the session-end path is append-only
/// and re-grading is blocked upstream by the completed-lesson check.
pub fn insert_grade(
    conn: &Connection,
    lesson_id: &str,
    student_id: &str,
    group_id: &str,
    score: f64,
    feedback: Option<&str>,
    graded_at: &str,
) -> rusqlite::Result<String> {
    let grade_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO grades(id, lesson_id, student_id, group_id, score, letter, feedback, graded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            grade_id,
            lesson_id,
            student_id,
            group_id,
            score,
            letter_for_score(score),
            feedback,
            graded_at
        ],
    )?;
    Ok(grade_id)
}
