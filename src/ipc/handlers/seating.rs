use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::subjects::load_catalog;
use crate::ipc::helpers::{get_optional_str, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::seating::{self, ConfigField, Direction, RegistryError, Seat, SeriesConfig};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn exam_exists(conn: &Connection, exam_id: &str) -> Result<bool, rusqlite::Error> {
    let row: Option<i64> = conn
        .query_row("SELECT 1 FROM exams WHERE id = ?", [exam_id], |r| r.get(0))
        .optional()?;
    Ok(row.is_some())
}

fn load_configs(conn: &Connection, exam_id: &str) -> Result<Vec<SeriesConfig>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, prefix, department, start_reg_no, end_reg_no, year
         FROM series_configs WHERE exam_id = ? ORDER BY id",
    )?;
    let rows = stmt.query_map([exam_id], |row| {
        Ok(SeriesConfig {
            id: row.get(0)?,
            prefix: row.get(1)?,
            department: row.get(2)?,
            start_reg_no: row.get(3)?,
            end_reg_no: row.get(4)?,
            year: row.get(5)?,
        })
    })?;
    rows.collect()
}

fn load_seats(conn: &Connection, exam_id: &str) -> Result<Vec<Seat>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT pos, seat_no, student_name, reg_no, department
         FROM seating_seats WHERE exam_id = ? ORDER BY pos",
    )?;
    let rows = stmt.query_map([exam_id], |row| {
        let pos: i64 = row.get(0)?;
        Ok(Seat {
            id: pos as usize,
            seat_no: row.get(1)?,
            student_name: row.get(2)?,
            reg_no: row.get(3)?,
            department: row.get(4)?,
        })
    })?;
    rows.collect()
}

fn store_seats(conn: &Connection, exam_id: &str, seats: &[Seat]) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM seating_seats WHERE exam_id = ?", [exam_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO seating_seats(exam_id, pos, seat_no, student_name, reg_no, department)
         VALUES(?, ?, ?, ?, ?, ?)",
    )?;
    for seat in seats {
        stmt.execute((
            exam_id,
            seat.id as i64,
            &seat.seat_no,
            seat.student_name.as_deref(),
            seat.reg_no.as_deref(),
            seat.department.as_deref(),
        ))?;
    }
    Ok(())
}

fn config_json(c: &SeriesConfig) -> serde_json::Value {
    json!({
        "id": c.id,
        "prefix": c.prefix,
        "department": c.department,
        "startRegNo": c.start_reg_no,
        "endRegNo": c.end_reg_no,
        "year": c.year
    })
}

fn handle_series_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match load_configs(conn, &exam_id) {
        Ok(configs) => ok(
            &req.id,
            json!({ "series": configs.iter().map(config_json).collect::<Vec<_>>() }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_series_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let prefix = match get_required_str(&req.params, "prefix") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    match exam_exists(conn, &exam_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "exam not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let configs = match load_configs(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let updated = match seating::add_series(&configs, &prefix) {
        Ok(v) => v,
        Err(RegistryError::DuplicatePrefix) => {
            return err(
                &req.id,
                "duplicate_prefix",
                format!("{} series already exists", prefix),
                None,
            )
        }
    };
    // add_series appends exactly one freshly minted slot
    let Some(created) = updated.last() else {
        return err(&req.id, "internal", "series slot missing after add", None);
    };

    if let Err(e) = conn.execute(
        "INSERT INTO series_configs(exam_id, id, prefix, department, start_reg_no, end_reg_no, year)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &exam_id,
            created.id,
            &created.prefix,
            &created.department,
            &created.start_reg_no,
            &created.end_reg_no,
            &created.year,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "series_configs" })),
        );
    }

    ok(
        &req.id,
        json!({ "series": config_json(created), "prefix": created.prefix }),
    )
}

fn handle_series_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let series_id = match get_required_i64(&req.params, "seriesId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let configs = match load_configs(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let (_, removed_prefix) = seating::remove_series(&configs, series_id);
    let Some(prefix) = removed_prefix else {
        // unknown id is a no-op, not an error
        return ok(&req.id, json!({ "removed": false, "prefix": null }));
    };

    if let Err(e) = conn.execute(
        "DELETE FROM series_configs WHERE exam_id = ? AND id = ?",
        (&exam_id, series_id),
    ) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "series_configs" })),
        );
    }

    ok(&req.id, json!({ "removed": true, "prefix": prefix }))
}

fn handle_series_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let series_id = match get_required_i64(&req.params, "seriesId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let field = match get_required_str(&req.params, "field") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let value = req
        .params
        .get("value")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let Some(update) = ConfigField::parse(&field, value) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown field: {}", field),
            None,
        );
    };

    let configs = match load_configs(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let updated = seating::update_field(&configs, series_id, update);
    let Some(changed) = updated.iter().find(|c| c.id == series_id) else {
        return ok(&req.id, json!({ "updated": false }));
    };

    if let Err(e) = conn.execute(
        "UPDATE series_configs
         SET prefix = ?, department = ?, start_reg_no = ?, end_reg_no = ?, year = ?
         WHERE exam_id = ? AND id = ?",
        (
            &changed.prefix,
            &changed.department,
            &changed.start_reg_no,
            &changed.end_reg_no,
            &changed.year,
            &exam_id,
            series_id,
        ),
    ) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "series_configs" })),
        );
    }

    ok(&req.id, json!({ "updated": true, "series": config_json(changed) }))
}

fn grid_shape(state: &AppState, req: &Request) -> Result<(usize, usize), serde_json::Value> {
    let defaults = state
        .db
        .as_ref()
        .and_then(|conn| db::settings_get_json(conn, "setup.seating").ok().flatten());
    let default_rows = defaults
        .as_ref()
        .and_then(|v| v.get("rows"))
        .and_then(|v| v.as_u64())
        .unwrap_or(5);
    let default_cols = defaults
        .as_ref()
        .and_then(|v| v.get("cols"))
        .and_then(|v| v.as_u64())
        .unwrap_or(5);

    let rows = req
        .params
        .get("rows")
        .and_then(|v| v.as_u64())
        .unwrap_or(default_rows);
    let cols = req
        .params
        .get("cols")
        .and_then(|v| v.as_u64())
        .unwrap_or(default_cols);
    if rows < 1 || cols < 1 {
        return Err(err(
            &req.id,
            "bad_params",
            "rows and cols must be >= 1",
            None,
        ));
    }
    Ok((rows as usize, cols as usize))
}

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let (rows, cols) = match grid_shape(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let room_no = get_optional_str(&req.params, "roomNo");
    let floor = get_optional_str(&req.params, "floor");
    let hall_id = get_optional_str(&req.params, "hallId");

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match exam_exists(conn, &exam_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "exam not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let configs = match load_configs(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let catalog = match load_catalog(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let seats = seating::generate(&configs, rows, cols, &catalog);
    let occupied = seats.iter().filter(|s| !s.is_empty()).count();

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "INSERT INTO seating_plans(exam_id, rows, cols, room_no, floor, hall_id, generated_at)
         VALUES(?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
         ON CONFLICT(exam_id) DO UPDATE SET
           rows = excluded.rows,
           cols = excluded.cols,
           room_no = excluded.room_no,
           floor = excluded.floor,
           hall_id = excluded.hall_id,
           generated_at = excluded.generated_at",
        (
            &exam_id,
            rows as i64,
            cols as i64,
            room_no.as_deref(),
            floor.as_deref(),
            hall_id.as_deref(),
        ),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "seating_plans" })),
        );
    }
    if let Err(e) = store_seats(&tx, &exam_id, &seats) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "seating_seats" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "rows": rows,
            "cols": cols,
            "occupiedCount": occupied,
            "seats": seats
        }),
    )
}

fn handle_rotate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let direction_raw = match get_required_str(&req.params, "direction") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(direction) = Direction::parse(&direction_raw) else {
        return err(&req.id, "bad_params", "direction must be left or right", None);
    };

    let seats = match load_seats(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if seats.is_empty() {
        return ok(&req.id, json!({ "seats": [] }));
    }

    let rotated = seating::rotate(&seats, direction);

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = store_seats(&tx, &exam_id, &rotated) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "seating_seats" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "seats": rotated }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let plan: Option<(i64, i64, Option<String>, Option<String>, Option<String>, Option<String>)> =
        match conn
            .query_row(
                "SELECT rows, cols, room_no, floor, hall_id, generated_at
                 FROM seating_plans WHERE exam_id = ?",
                [&exam_id],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                    ))
                },
            )
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };

    let seats = match load_seats(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let plan_json = plan.map(|(rows, cols, room_no, floor, hall_id, generated_at)| {
        json!({
            "rows": rows,
            "cols": cols,
            "roomNo": room_no,
            "floor": floor,
            "hallId": hall_id,
            "generatedAt": generated_at
        })
    });

    ok(&req.id, json!({ "plan": plan_json, "seats": seats }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "seating.seriesList" => Some(handle_series_list(state, req)),
        "seating.seriesAdd" => Some(handle_series_add(state, req)),
        "seating.seriesRemove" => Some(handle_series_remove(state, req)),
        "seating.seriesUpdate" => Some(handle_series_update(state, req)),
        "seating.generate" => Some(handle_generate(state, req)),
        "seating.rotate" => Some(handle_rotate(state, req)),
        "seating.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
