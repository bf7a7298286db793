use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    let department = get_optional_str(&req.params, "department");
    let (sql, binds): (&str, Vec<SqlValue>) = match &department {
        Some(d) => (
            "SELECT id, reg_no, name, department, class_id, year
             FROM students WHERE department = ? ORDER BY sort_order, reg_no",
            vec![SqlValue::Text(d.clone())],
        ),
        None => (
            "SELECT id, reg_no, name, department, class_id, year
             FROM students ORDER BY sort_order, reg_no",
            Vec::new(),
        ),
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map(params_from_iter(binds), |row| {
            let id: String = row.get(0)?;
            let reg_no: String = row.get(1)?;
            let name: String = row.get(2)?;
            let department: String = row.get(3)?;
            let class_id: Option<String> = row.get(4)?;
            let year: Option<String> = row.get(5)?;
            Ok(json!({
                "id": id,
                "regNo": reg_no,
                "name": name,
                "department": department,
                "classId": class_id,
                "year": year
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let reg_no = match get_required_str(&req.params, "regNo") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let department = match get_required_str(&req.params, "department") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let class_id = get_optional_str(&req.params, "classId");
    let year = get_optional_str(&req.params, "year");

    if let Some(cid) = &class_id {
        let class_exists: Option<i64> = match conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [cid], |r| r.get(0))
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if class_exists.is_none() {
            return err(&req.id, "not_found", "class not found", None);
        }
    }

    let sort_order: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let student_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, reg_no, name, department, class_id, year, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &reg_no,
            &name,
            &department,
            class_id.as_deref(),
            year.as_deref(),
            sort_order,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    ok(&req.id, json!({ "studentId": student_id }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let mut set_parts: Vec<String> = Vec::new();
    let mut bind_values: Vec<SqlValue> = Vec::new();

    for (field, column) in [
        ("regNo", "reg_no"),
        ("name", "name"),
        ("department", "department"),
    ] {
        if let Some(v) = patch.get(field) {
            match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => {
                    set_parts.push(format!("{} = ?", column));
                    bind_values.push(SqlValue::Text(s.to_string()));
                }
                None => {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("patch.{} must be a non-empty string", field),
                        None,
                    )
                }
            }
        }
    }
    for (field, column) in [("classId", "class_id"), ("year", "year")] {
        if let Some(v) = patch.get(field) {
            if v.is_null() {
                set_parts.push(format!("{} = ?", column));
                bind_values.push(SqlValue::Null);
            } else if let Some(s) = v.as_str() {
                let t = s.trim().to_string();
                set_parts.push(format!("{} = ?", column));
                if t.is_empty() {
                    bind_values.push(SqlValue::Null);
                } else {
                    bind_values.push(SqlValue::Text(t));
                }
            } else {
                return err(
                    &req.id,
                    "bad_params",
                    format!("patch.{} must be a string or null", field),
                    None,
                );
            }
        }
    }

    if set_parts.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        );
    }

    let sql = format!("UPDATE students SET {} WHERE id = ?", set_parts.join(", "));
    bind_values.push(SqlValue::Text(student_id));

    let changed = match conn.execute(&sql, params_from_iter(bind_values)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "table": "students" })),
            )
        }
    };
    if changed == 0 {
        return err(&req.id, "not_found", "student not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let changed = match conn.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "students" })),
            )
        }
    };
    if changed == 0 {
        return err(&req.id, "not_found", "student not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.create" => Some(handle_create(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
