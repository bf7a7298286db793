use crate::ipc::error::{err, ok};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;

struct PlanRow {
    rows: i64,
    cols: i64,
    room_no: Option<String>,
    floor: Option<String>,
    hall_id: Option<String>,
}

struct SeatRow {
    pos: i64,
    seat_no: String,
    student_name: Option<String>,
    reg_no: Option<String>,
    department: Option<String>,
}

fn load_plan(conn: &Connection, exam_id: &str) -> Result<Option<PlanRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT rows, cols, room_no, floor, hall_id FROM seating_plans WHERE exam_id = ?",
        [exam_id],
        |r| {
            Ok(PlanRow {
                rows: r.get(0)?,
                cols: r.get(1)?,
                room_no: r.get(2)?,
                floor: r.get(3)?,
                hall_id: r.get(4)?,
            })
        },
    )
    .optional()
}

fn load_seat_rows(conn: &Connection, exam_id: &str) -> Result<Vec<SeatRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT pos, seat_no, student_name, reg_no, department
         FROM seating_seats WHERE exam_id = ? ORDER BY pos",
    )?;
    let rows = stmt.query_map([exam_id], |row| {
        Ok(SeatRow {
            pos: row.get(0)?,
            seat_no: row.get(1)?,
            student_name: row.get(2)?,
            reg_no: row.get(3)?,
            department: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Row-major nested grid for the visual seat-map renderer. Rendering
/// itself (PDF/Excel/screen) happens outside the daemon.
fn handle_grid_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let plan = match load_plan(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(plan) = plan else {
        return err(&req.id, "not_found", "no seating plan for exam", None);
    };
    let seats = match load_seat_rows(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let cols = plan.cols.max(1) as usize;
    let mut grid: Vec<Vec<serde_json::Value>> = Vec::new();
    for seat in &seats {
        if grid.last().map(|r: &Vec<_>| r.len() >= cols).unwrap_or(true) {
            grid.push(Vec::new());
        }
        if let Some(row) = grid.last_mut() {
            row.push(json!({
                "id": seat.pos,
                "seatNo": seat.seat_no,
                "studentName": seat.student_name,
                "regNo": seat.reg_no,
                "department": seat.department
            }));
        }
    }

    ok(
        &req.id,
        json!({
            "rows": plan.rows,
            "cols": plan.cols,
            "roomNo": plan.room_no,
            "floor": plan.floor,
            "hallId": plan.hall_id,
            "grid": grid
        }),
    )
}

fn handle_hall_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let exam_id = match get_required_str(&req.params, "examId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let seats = match load_seat_rows(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut by_department: BTreeMap<String, i64> = BTreeMap::new();
    let mut occupied = 0i64;
    for seat in &seats {
        if let Some(dept) = &seat.department {
            occupied += 1;
            *by_department.entry(dept.clone()).or_insert(0) += 1;
        }
    }

    let departments = by_department
        .iter()
        .map(|(department, count)| json!({ "department": department, "count": count }))
        .collect::<Vec<_>>();

    ok(
        &req.id,
        json!({
            "totalSeats": seats.len(),
            "occupied": occupied,
            "empty": seats.len() as i64 - occupied,
            "departments": departments
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.seatingGridModel" => Some(handle_grid_model(state, req)),
        "reports.hallSummaryModel" => Some(handle_hall_summary(state, req)),
        _ => None,
    }
}
