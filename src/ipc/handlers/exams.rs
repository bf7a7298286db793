use crate::ipc::error::{err, ok};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde_json::json;
use uuid::Uuid;

fn validate_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn validate_session(s: &str) -> bool {
    matches!(s, "FN" | "AN")
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "exams": [] }));
    };

    // Seat counts let the dashboard show which exams already have a plan.
    let mut stmt = match conn.prepare(
        "SELECT
           e.id,
           e.name,
           e.date,
           e.session,
           (SELECT COUNT(*) FROM series_configs sc WHERE sc.exam_id = e.id) AS series_count,
           (SELECT COUNT(*) FROM seating_seats ss WHERE ss.exam_id = e.id) AS seat_count
         FROM exams e
         ORDER BY e.date, e.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let date: String = row.get(2)?;
            let session: String = row.get(3)?;
            let series_count: i64 = row.get(4)?;
            let seat_count: i64 = row.get(5)?;
            Ok(json!({
                "id": id,
                "name": name,
                "date": date,
                "session": session,
                "seriesCount": series_count,
                "seatCount": seat_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(exams) => ok(&req.id, json!({ "exams": exams })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let date = match get_required_str(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if !validate_date(&date) {
        return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None);
    }
    let session = match get_required_str(&req.params, "session") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if !validate_session(&session) {
        return err(&req.id, "bad_params", "session must be FN or AN", None);
    }

    let exam_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO exams(id, name, date, session) VALUES(?, ?, ?, ?)",
        (&exam_id, &name, &date, &session),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "exams" })),
        );
    }

    ok(&req.id, json!({ "examId": exam_id }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let mut set_parts: Vec<String> = Vec::new();
    let mut bind_values: Vec<SqlValue> = Vec::new();

    if let Some(v) = patch.get("name") {
        match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => {
                set_parts.push("name = ?".into());
                bind_values.push(SqlValue::Text(s.to_string()));
            }
            None => return err(&req.id, "bad_params", "patch.name must be a non-empty string", None),
        }
    }
    if let Some(v) = patch.get("date") {
        match v.as_str().map(str::trim).filter(|s| validate_date(s)) {
            Some(s) => {
                set_parts.push("date = ?".into());
                bind_values.push(SqlValue::Text(s.to_string()));
            }
            None => return err(&req.id, "bad_params", "patch.date must be YYYY-MM-DD", None),
        }
    }
    if let Some(v) = patch.get("session") {
        match v.as_str().map(str::trim).filter(|s| validate_session(s)) {
            Some(s) => {
                set_parts.push("session = ?".into());
                bind_values.push(SqlValue::Text(s.to_string()));
            }
            None => return err(&req.id, "bad_params", "patch.session must be FN or AN", None),
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

    let sql = format!("UPDATE exams SET {} WHERE id = ?", set_parts.join(", "));
    bind_values.push(SqlValue::Text(exam_id));

    let changed = match conn.execute(&sql, params_from_iter(bind_values)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "table": "exams" })),
            )
        }
    };
    if changed == 0 {
        return err(&req.id, "not_found", "exam not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    for (sql, table) in [
        ("DELETE FROM seating_seats WHERE exam_id = ?", "seating_seats"),
        ("DELETE FROM seating_plans WHERE exam_id = ?", "seating_plans"),
        (
            "DELETE FROM series_configs WHERE exam_id = ?",
            "series_configs",
        ),
    ] {
        if let Err(e) = tx.execute(sql, [&exam_id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": table })),
            );
        }
    }

    let changed = match tx.execute("DELETE FROM exams WHERE id = ?", [&exam_id]) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "exams" })),
            );
        }
    };
    if changed == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "exam not found", None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(handle_list(state, req)),
        "exams.create" => Some(handle_create(state, req)),
        "exams.update" => Some(handle_update(state, req)),
        "exams.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
