use rusqlite::Connection;

#[derive(Debug, Clone)]
pub struct RosterStudent {
    pub id: String,
    pub display_name: String,
    pub sort_order: i64,
}

/// Active students in a group, in roster order. One batched read;
/// callers must not re-query per student.
pub fn students_in_group(
    conn: &Connection,
    group_id: &str,
) -> rusqlite::Result<Vec<RosterStudent>> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, sort_order
         FROM students
         WHERE group_id = ? AND active = 1
         ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([group_id], |r| {
        let last: String = r.get(1)?;
        let first: String = r.get(2)?;
        Ok(RosterStudent {
            id: r.get(0)?,
            display_name: format!("{}, {}", last, first),
            sort_order: r.get(3)?,
        })
    })?;
    rows.collect()
}
