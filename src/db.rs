use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("examseat.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            email TEXT,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT,
            year TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            reg_no TEXT NOT NULL,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            class_id TEXT,
            year TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_department ON students(department)",
        [],
    )?;

    // Existing workspaces may predate the year column. Add if needed.
    ensure_students_year(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            department TEXT NOT NULL,
            code TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            session TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS series_configs(
            exam_id TEXT NOT NULL,
            id INTEGER NOT NULL,
            prefix TEXT NOT NULL,
            department TEXT NOT NULL DEFAULT '',
            start_reg_no TEXT NOT NULL DEFAULT '',
            end_reg_no TEXT NOT NULL DEFAULT '',
            year TEXT NOT NULL DEFAULT '',
            PRIMARY KEY(exam_id, id),
            FOREIGN KEY(exam_id) REFERENCES exams(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_series_configs_exam ON series_configs(exam_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seating_plans(
            exam_id TEXT PRIMARY KEY,
            rows INTEGER NOT NULL,
            cols INTEGER NOT NULL,
            room_no TEXT,
            floor TEXT,
            hall_id TEXT,
            generated_at TEXT,
            FOREIGN KEY(exam_id) REFERENCES exams(id)
        )",
        [],
    )?;
    ensure_seating_plans_hall_columns(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seating_seats(
            exam_id TEXT NOT NULL,
            pos INTEGER NOT NULL,
            seat_no TEXT NOT NULL,
            student_name TEXT,
            reg_no TEXT,
            department TEXT,
            PRIMARY KEY(exam_id, pos),
            FOREIGN KEY(exam_id) REFERENCES exams(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seating_seats_exam ON seating_seats(exam_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, &text),
    )?;
    Ok(())
}

fn ensure_students_year(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "year")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN year TEXT", [])?;
    Ok(())
}

fn ensure_seating_plans_hall_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "seating_plans", "room_no")? {
        conn.execute("ALTER TABLE seating_plans ADD COLUMN room_no TEXT", [])?;
    }
    if !table_has_column(conn, "seating_plans", "floor")? {
        conn.execute("ALTER TABLE seating_plans ADD COLUMN floor TEXT", [])?;
    }
    if !table_has_column(conn, "seating_plans", "hall_id")? {
        conn.execute("ALTER TABLE seating_plans ADD COLUMN hall_id TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
