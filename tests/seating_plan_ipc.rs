use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examseatd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examseatd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_raw(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request_raw(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn seat_field<'a>(seat: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    seat.get(key).and_then(|v| v.as_str())
}

struct Harness {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Harness {
    fn start(workspace: &PathBuf) -> Harness {
        let (child, stdin, reader) = spawn_sidecar();
        let mut h = Harness {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        let _ = h.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        h
    }

    fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn raw(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        request_raw(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn finish(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

fn seed_exam(h: &mut Harness) -> String {
    let _ = h.ok(
        "subjects.create",
        json!({ "name": "Data Structures", "department": "CS", "code": "CS201" }),
    );
    let _ = h.ok(
        "subjects.create",
        json!({ "name": "Circuit Theory", "department": "EE", "code": "EE105" }),
    );
    let created = h.ok(
        "exams.create",
        json!({ "name": "Midsem", "date": "2026-04-18", "session": "FN" }),
    );
    created
        .get("examId")
        .and_then(|v| v.as_str())
        .expect("examId")
        .to_string()
}

fn seed_series(h: &mut Harness, exam_id: &str) -> (i64, i64) {
    let a = h.ok(
        "seating.seriesAdd",
        json!({ "examId": exam_id, "prefix": "A" }),
    );
    let a_id = a
        .get("series")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_i64())
        .expect("series A id");
    let b = h.ok(
        "seating.seriesAdd",
        json!({ "examId": exam_id, "prefix": "B" }),
    );
    let b_id = b
        .get("series")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_i64())
        .expect("series B id");

    for (sid, field, value) in [
        (a_id, "department", "Data Structures"),
        (a_id, "startRegNo", "1"),
        (a_id, "endRegNo", "2"),
        (b_id, "department", "Circuit Theory"),
        (b_id, "startRegNo", "1"),
        (b_id, "endRegNo", "1"),
    ] {
        let _ = h.ok(
            "seating.seriesUpdate",
            json!({ "examId": exam_id, "seriesId": sid, "field": field, "value": value }),
        );
    }
    (a_id, b_id)
}

#[test]
fn series_registry_over_ipc() {
    let workspace = temp_dir("examseat-series");
    let mut h = Harness::start(&workspace);
    let exam_id = seed_exam(&mut h);

    let (a_id, _) = seed_series(&mut h, &exam_id);
    assert_eq!(a_id, 1);

    // second add for an existing prefix is rejected, registry unchanged
    let dup = h.raw(
        "seating.seriesAdd",
        json!({ "examId": exam_id, "prefix": "A" }),
    );
    assert_eq!(dup.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        dup.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("duplicate_prefix")
    );
    let listed = h.ok("seating.seriesList", json!({ "examId": exam_id }));
    assert_eq!(
        listed.get("series").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    // unknown field name is rejected
    let bad_field = h.raw(
        "seating.seriesUpdate",
        json!({ "examId": exam_id, "seriesId": a_id, "field": "seatCount", "value": "9" }),
    );
    assert_eq!(
        bad_field
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_params")
    );

    // updating an absent id is a quiet no-op
    let noop = h.ok(
        "seating.seriesUpdate",
        json!({ "examId": exam_id, "seriesId": 99, "field": "year", "value": "2026" }),
    );
    assert_eq!(noop.get("updated").and_then(|v| v.as_bool()), Some(false));

    // removal reports the prefix it dropped; ids are not reused afterwards
    let removed = h.ok(
        "seating.seriesRemove",
        json!({ "examId": exam_id, "seriesId": a_id }),
    );
    assert_eq!(removed.get("removed").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(removed.get("prefix").and_then(|v| v.as_str()), Some("A"));

    let missing = h.ok(
        "seating.seriesRemove",
        json!({ "examId": exam_id, "seriesId": a_id }),
    );
    assert_eq!(missing.get("removed").and_then(|v| v.as_bool()), Some(false));

    let readded = h.ok(
        "seating.seriesAdd",
        json!({ "examId": exam_id, "prefix": "C" }),
    );
    assert_eq!(
        readded
            .get("series")
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_i64()),
        Some(3)
    );

    h.finish();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn generate_interleaves_and_truncates() {
    let workspace = temp_dir("examseat-generate");
    let mut h = Harness::start(&workspace);
    let exam_id = seed_exam(&mut h);
    let _ = seed_series(&mut h, &exam_id);

    // exact fit: round-robin A1 B1 A2
    let result = h.ok(
        "seating.generate",
        json!({ "examId": exam_id, "rows": 1, "cols": 3 }),
    );
    let seats = result.get("seats").and_then(|v| v.as_array()).expect("seats");
    assert_eq!(seats.len(), 3);
    assert_eq!(seat_field(&seats[0], "seatNo"), Some("A1"));
    assert_eq!(seat_field(&seats[0], "regNo"), Some("001"));
    assert_eq!(seat_field(&seats[0], "department"), Some("CS"));
    assert_eq!(seat_field(&seats[1], "seatNo"), Some("B1"));
    assert_eq!(seat_field(&seats[1], "department"), Some("EE"));
    assert_eq!(seat_field(&seats[2], "seatNo"), Some("A2"));
    assert_eq!(seat_field(&seats[2], "regNo"), Some("002"));

    // overflow: the trailing student is dropped without an error
    let result = h.ok(
        "seating.generate",
        json!({ "examId": exam_id, "rows": 1, "cols": 2 }),
    );
    let seats = result.get("seats").and_then(|v| v.as_array()).expect("seats");
    assert_eq!(seats.len(), 2);
    assert_eq!(seat_field(&seats[0], "seatNo"), Some("A1"));
    assert_eq!(seat_field(&seats[1], "seatNo"), Some("B1"));

    // underflow: the fourth seat stays empty
    let result = h.ok(
        "seating.generate",
        json!({
            "examId": exam_id,
            "rows": 2,
            "cols": 2,
            "roomNo": "H-101",
            "floor": "1",
            "hallId": "MAIN"
        }),
    );
    let seats = result.get("seats").and_then(|v| v.as_array()).expect("seats");
    assert_eq!(seats.len(), 4);
    assert_eq!(result.get("occupiedCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(seat_field(&seats[3], "seatNo"), Some(""));
    assert!(seats[3].get("studentName").map(|v| v.is_null()).unwrap_or(false));
    assert!(seats[3].get("regNo").map(|v| v.is_null()).unwrap_or(false));
    assert!(seats[3].get("department").map(|v| v.is_null()).unwrap_or(false));

    // the stored plan carries the externally supplied hall keys
    let stored = h.ok("seating.get", json!({ "examId": exam_id }));
    let plan = stored.get("plan").expect("plan");
    assert_eq!(plan.get("rows").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(plan.get("cols").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(plan.get("roomNo").and_then(|v| v.as_str()), Some("H-101"));
    assert_eq!(plan.get("hallId").and_then(|v| v.as_str()), Some("MAIN"));
    assert_eq!(
        stored.get("seats").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(4)
    );

    // generation is deterministic: same inputs, same seats
    let again = h.ok(
        "seating.generate",
        json!({ "examId": exam_id, "rows": 2, "cols": 2 }),
    );
    assert_eq!(again.get("seats"), result.get("seats"));

    // rows/cols must be valid when given
    let bad = h.raw(
        "seating.generate",
        json!({ "examId": exam_id, "rows": 0, "cols": 3 }),
    );
    assert_eq!(
        bad.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_params")
    );

    h.finish();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn rotate_shifts_occupants_and_round_trips() {
    let workspace = temp_dir("examseat-rotate");
    let mut h = Harness::start(&workspace);
    let exam_id = seed_exam(&mut h);
    let _ = seed_series(&mut h, &exam_id);

    let generated = h.ok(
        "seating.generate",
        json!({ "examId": exam_id, "rows": 2, "cols": 2 }),
    );
    let original = generated.get("seats").cloned().expect("seats");

    // grid: [A1, B1, A2, empty]; right rotation pulls the empty seat front
    let rotated = h.ok(
        "seating.rotate",
        json!({ "examId": exam_id, "direction": "right" }),
    );
    let seats = rotated.get("seats").and_then(|v| v.as_array()).expect("seats");
    assert_eq!(seat_field(&seats[0], "seatNo"), Some(""));
    assert_eq!(seat_field(&seats[1], "seatNo"), Some("A1"));
    assert_eq!(seat_field(&seats[2], "seatNo"), Some("B1"));
    assert_eq!(seat_field(&seats[3], "seatNo"), Some("A2"));
    // ids stay glued to grid positions
    let ids: Vec<i64> = seats
        .iter()
        .map(|s| s.get("id").and_then(|v| v.as_i64()).expect("id"))
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    // left undoes right, persisted state included
    let back = h.ok(
        "seating.rotate",
        json!({ "examId": exam_id, "direction": "left" }),
    );
    assert_eq!(back.get("seats"), Some(&original));
    let stored = h.ok("seating.get", json!({ "examId": exam_id }));
    assert_eq!(stored.get("seats"), Some(&original));

    // rotation on an exam without a plan is a no-op
    let other = h.ok(
        "exams.create",
        json!({ "name": "Endsem", "date": "2026-05-20", "session": "AN" }),
    );
    let other_id = other.get("examId").and_then(|v| v.as_str()).expect("examId");
    let empty = h.ok(
        "seating.rotate",
        json!({ "examId": other_id, "direction": "left" }),
    );
    assert_eq!(
        empty.get("seats").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    // direction is validated
    let bad = h.raw(
        "seating.rotate",
        json!({ "examId": exam_id, "direction": "sideways" }),
    );
    assert_eq!(
        bad.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_params")
    );

    h.finish();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn defaults_reports_and_csv_export() {
    let workspace = temp_dir("examseat-reports");
    let csv_out = workspace.join("seating.csv");
    let mut h = Harness::start(&workspace);
    let exam_id = seed_exam(&mut h);
    let _ = seed_series(&mut h, &exam_id);

    // stored defaults drive generation when the caller omits the shape
    let _ = h.ok(
        "setup.seatingDefaults.update",
        json!({ "rows": 1, "cols": 3 }),
    );
    let defaults = h.ok("setup.seatingDefaults.get", json!({}));
    assert_eq!(defaults.get("rows").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(defaults.get("cols").and_then(|v| v.as_u64()), Some(3));

    let result = h.ok("seating.generate", json!({ "examId": exam_id }));
    let seats = result.get("seats").and_then(|v| v.as_array()).expect("seats");
    assert_eq!(seats.len(), 3);

    let grid = h.ok("reports.seatingGridModel", json!({ "examId": exam_id }));
    assert_eq!(grid.get("rows").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(grid.get("cols").and_then(|v| v.as_i64()), Some(3));
    let grid_rows = grid.get("grid").and_then(|v| v.as_array()).expect("grid");
    assert_eq!(grid_rows.len(), 1);
    assert_eq!(grid_rows[0].as_array().map(|r| r.len()), Some(3));

    let summary = h.ok("reports.hallSummaryModel", json!({ "examId": exam_id }));
    assert_eq!(summary.get("totalSeats").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(summary.get("occupied").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(summary.get("empty").and_then(|v| v.as_i64()), Some(0));
    let departments = summary
        .get("departments")
        .and_then(|v| v.as_array())
        .expect("departments");
    assert_eq!(departments.len(), 2);
    assert_eq!(
        departments[0].get("department").and_then(|v| v.as_str()),
        Some("CS")
    );
    assert_eq!(departments[0].get("count").and_then(|v| v.as_i64()), Some(2));

    let exported = h.ok(
        "exchange.exportSeatingCsv",
        json!({ "examId": exam_id, "outPath": csv_out.to_string_lossy() }),
    );
    assert_eq!(exported.get("rowsExported").and_then(|v| v.as_u64()), Some(3));
    let text = std::fs::read_to_string(&csv_out).expect("read exported csv");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "pos,seat_no,student_name,reg_no,department");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].contains("A1"));
    assert!(lines[2].contains("B1"));

    h.finish();
    let _ = std::fs::remove_dir_all(workspace);
}
