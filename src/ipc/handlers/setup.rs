use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const SEATING_SECTION: &str = "setup.seating";

fn handle_defaults_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let section = db::settings_get_json(conn, SEATING_SECTION)
        .ok()
        .flatten()
        .unwrap_or_else(|| json!({}));
    let rows = section.get("rows").and_then(|v| v.as_u64()).unwrap_or(5);
    let cols = section.get("cols").and_then(|v| v.as_u64()).unwrap_or(5);

    ok(&req.id, json!({ "rows": rows, "cols": cols }))
}

fn handle_defaults_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let rows = req.params.get("rows").and_then(|v| v.as_u64());
    let cols = req.params.get("cols").and_then(|v| v.as_u64());
    let (Some(rows), Some(cols)) = (rows, cols) else {
        return err(&req.id, "bad_params", "missing rows/cols", None);
    };
    if rows < 1 || cols < 1 {
        return err(&req.id, "bad_params", "rows and cols must be >= 1", None);
    }

    if let Err(e) = db::settings_set_json(
        conn,
        SEATING_SECTION,
        &json!({ "rows": rows, "cols": cols }),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "rows": rows, "cols": cols }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.seatingDefaults.get" => Some(handle_defaults_get(state, req)),
        "setup.seatingDefaults.update" => Some(handle_defaults_update(state, req)),
        _ => None,
    }
}
