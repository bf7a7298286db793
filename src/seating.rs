use serde::{Deserialize, Serialize};

/// Department label used when a series config names a subject that is not
/// in the catalog.
pub const UNKNOWN_DEPARTMENT: &str = "Unknown Department";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesConfig {
    pub id: i64,
    pub prefix: String,
    pub department: String,
    pub start_reg_no: String,
    pub end_reg_no: String,
    pub year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub name: String,
    pub department: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub name: String,
    pub reg_no: String,
    pub department: String,
    pub subject_code: Option<String>,
    pub subject_name: String,
    pub seat_no: String,
    pub year: String,
}

/// One grid cell of the final arrangement. `id` is the row-major grid
/// position (`row*cols + col`) and never moves; only the occupant payload
/// does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: usize,
    pub seat_no: String,
    pub student_name: Option<String>,
    pub reg_no: Option<String>,
    pub department: Option<String>,
}

impl Seat {
    pub fn empty(id: usize) -> Self {
        Seat {
            id,
            seat_no: String::new(),
            student_name: None,
            reg_no: None,
            department: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seat_no.is_empty() && self.student_name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigField {
    Department(String),
    StartRegNo(String),
    EndRegNo(String),
    Prefix(String),
    Year(String),
}

impl ConfigField {
    pub fn parse(field: &str, value: String) -> Option<ConfigField> {
        match field {
            "department" => Some(ConfigField::Department(value)),
            "startRegNo" => Some(ConfigField::StartRegNo(value)),
            "endRegNo" => Some(ConfigField::EndRegNo(value)),
            "prefix" => Some(ConfigField::Prefix(value)),
            "year" => Some(ConfigField::Year(value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistryError {
    DuplicatePrefix,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Direction> {
        match s {
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

pub fn pad_reg_no(n: i64) -> String {
    format!("{:03}", n)
}

/// Appends an empty config slot for `prefix`. A prefix may carry at most
/// one config at a time; a second add for the same prefix is rejected and
/// the input list is returned to the caller unchanged via the error path.
pub fn add_series(
    configs: &[SeriesConfig],
    prefix: &str,
) -> Result<Vec<SeriesConfig>, RegistryError> {
    if configs.iter().any(|c| c.prefix == prefix) {
        return Err(RegistryError::DuplicatePrefix);
    }
    let next_id = configs.iter().map(|c| c.id).max().unwrap_or(0) + 1;
    let mut out = configs.to_vec();
    out.push(SeriesConfig {
        id: next_id,
        prefix: prefix.to_string(),
        department: String::new(),
        start_reg_no: String::new(),
        end_reg_no: String::new(),
        year: String::new(),
    });
    Ok(out)
}

/// Removes the config with `id`, reporting the removed prefix so the
/// shell can name it in a notification. Unknown ids are a no-op.
pub fn remove_series(configs: &[SeriesConfig], id: i64) -> (Vec<SeriesConfig>, Option<String>) {
    let removed = configs.iter().find(|c| c.id == id).map(|c| c.prefix.clone());
    if removed.is_none() {
        return (configs.to_vec(), None);
    }
    let out = configs.iter().filter(|c| c.id != id).cloned().collect();
    (out, removed)
}

/// Replaces one field of the config with `id`; every other config and
/// field is untouched. Unknown ids are a no-op.
pub fn update_field(configs: &[SeriesConfig], id: i64, field: ConfigField) -> Vec<SeriesConfig> {
    configs
        .iter()
        .map(|c| {
            if c.id != id {
                return c.clone();
            }
            let mut updated = c.clone();
            match &field {
                ConfigField::Department(v) => updated.department = v.clone(),
                ConfigField::StartRegNo(v) => updated.start_reg_no = v.clone(),
                ConfigField::EndRegNo(v) => updated.end_reg_no = v.clone(),
                ConfigField::Prefix(v) => updated.prefix = v.clone(),
                ConfigField::Year(v) => updated.year = v.clone(),
            }
            updated
        })
        .collect()
}

/// Expands a config's inclusive registration range into one Student per
/// number. Incomplete or malformed configs contribute nothing rather than
/// failing the whole generation.
///
/// Seat labels are config-local: `<prefix>1..` restarts for every config,
/// not per series.
pub fn expand_to_students(config: &SeriesConfig, catalog: &[SubjectRef]) -> Vec<Student> {
    if config.department.trim().is_empty()
        || config.start_reg_no.trim().is_empty()
        || config.end_reg_no.trim().is_empty()
    {
        return Vec::new();
    }
    let (Ok(start), Ok(end)) = (
        config.start_reg_no.trim().parse::<i64>(),
        config.end_reg_no.trim().parse::<i64>(),
    ) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let subject = catalog.iter().find(|s| s.name == config.department);
    let (department, subject_code, subject_name) = match subject {
        Some(s) => (s.department.clone(), Some(s.code.clone()), s.name.clone()),
        None => (
            UNKNOWN_DEPARTMENT.to_string(),
            None,
            config.department.clone(),
        ),
    };

    (start..=end)
        .enumerate()
        .map(|(i, reg)| Student {
            name: format!("{} Student", department),
            reg_no: pad_reg_no(reg),
            department: department.clone(),
            subject_code: subject_code.clone(),
            subject_name: subject_name.clone(),
            seat_no: format!("{}{}", config.prefix, i + 1),
            year: config.year.clone(),
        })
        .collect()
}

/// Lays the configured series out on a `rows` x `cols` grid.
///
/// Students are merged round-robin across series (series ordered by first
/// appearance in `configs`) so that adjacent seats alternate departments.
/// The output always has exactly `rows*cols` seats: students beyond
/// capacity are dropped and unfilled positions stay empty, silently in
/// both directions.
pub fn generate(
    configs: &[SeriesConfig],
    rows: usize,
    cols: usize,
    catalog: &[SubjectRef],
) -> Vec<Seat> {
    let mut series: Vec<(String, Vec<Student>)> = Vec::new();
    for config in configs {
        let students = expand_to_students(config, catalog);
        match series.iter_mut().find(|(p, _)| *p == config.prefix) {
            Some((_, bucket)) => bucket.extend(students),
            None => series.push((config.prefix.clone(), students)),
        }
    }

    let max_len = series.iter().map(|(_, bucket)| bucket.len()).max().unwrap_or(0);
    let mut merged: Vec<&Student> = Vec::new();
    for i in 0..max_len {
        for (_, bucket) in &series {
            if let Some(s) = bucket.get(i) {
                merged.push(s);
            }
        }
    }

    let total = rows * cols;
    (0..total)
        .map(|pos| match merged.get(pos) {
            Some(s) => Seat {
                id: pos,
                seat_no: s.seat_no.clone(),
                student_name: Some(s.name.clone()),
                reg_no: Some(s.reg_no.clone()),
                department: Some(s.department.clone()),
            },
            None => Seat::empty(pos),
        })
        .collect()
}

/// Cyclic shift of the occupant payload by one position. Grid ids stay
/// attached to their physical positions; students are reseated, the room
/// layout does not change.
pub fn rotate(seats: &[Seat], direction: Direction) -> Vec<Seat> {
    let n = seats.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|pos| {
            let src = match direction {
                Direction::Right => (pos + n - 1) % n,
                Direction::Left => (pos + 1) % n,
            };
            Seat {
                id: seats[pos].id,
                seat_no: seats[src].seat_no.clone(),
                student_name: seats[src].student_name.clone(),
                reg_no: seats[src].reg_no.clone(),
                department: seats[src].department.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: i64, prefix: &str, department: &str, start: &str, end: &str) -> SeriesConfig {
        SeriesConfig {
            id,
            prefix: prefix.to_string(),
            department: department.to_string(),
            start_reg_no: start.to_string(),
            end_reg_no: end.to_string(),
            year: String::new(),
        }
    }

    fn catalog() -> Vec<SubjectRef> {
        vec![
            SubjectRef {
                name: "Data Structures".to_string(),
                department: "CS".to_string(),
                code: "CS201".to_string(),
            },
            SubjectRef {
                name: "Circuit Theory".to_string(),
                department: "EE".to_string(),
                code: "EE105".to_string(),
            },
        ]
    }

    #[test]
    fn add_series_mints_next_id_and_rejects_duplicates() {
        let configs = add_series(&[], "A").expect("first add");
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].id, 1);
        assert_eq!(configs[0].prefix, "A");
        assert!(configs[0].department.is_empty());

        let configs = add_series(&configs, "B").expect("second add");
        assert_eq!(configs[1].id, 2);

        assert_eq!(add_series(&configs, "A"), Err(RegistryError::DuplicatePrefix));
    }

    #[test]
    fn add_series_never_reuses_ids_after_removal() {
        let configs = add_series(&[], "A").expect("add A");
        let configs = add_series(&configs, "B").expect("add B");
        let (configs, removed) = remove_series(&configs, 1);
        assert_eq!(removed.as_deref(), Some("A"));

        // max id present is 2, so the next slot is 3 even though 1 is free
        let configs = add_series(&configs, "C").expect("add C");
        assert_eq!(configs.last().map(|c| c.id), Some(3));
    }

    #[test]
    fn remove_series_unknown_id_is_noop() {
        let configs = add_series(&[], "A").expect("add A");
        let (out, removed) = remove_series(&configs, 99);
        assert_eq!(out, configs);
        assert_eq!(removed, None);
    }

    #[test]
    fn update_field_touches_one_field_of_one_config() {
        let configs = add_series(&[], "A").expect("add A");
        let configs = add_series(&configs, "B").expect("add B");

        let out = update_field(
            &configs,
            1,
            ConfigField::Department("Data Structures".to_string()),
        );
        assert_eq!(out[0].department, "Data Structures");
        assert!(out[0].start_reg_no.is_empty());
        assert_eq!(out[1], configs[1]);

        // unknown id leaves everything alone
        let untouched = update_field(&configs, 42, ConfigField::Year("2026".to_string()));
        assert_eq!(untouched, configs);
    }

    #[test]
    fn config_field_parse_maps_wire_names() {
        assert_eq!(
            ConfigField::parse("startRegNo", "7".to_string()),
            Some(ConfigField::StartRegNo("7".to_string()))
        );
        assert_eq!(ConfigField::parse("seatNo", "x".to_string()), None);
    }

    #[test]
    fn expand_pads_reg_numbers_and_restarts_seat_labels_per_config() {
        let c = config(1, "A", "Data Structures", "8", "10");
        let students = expand_to_students(&c, &catalog());
        assert_eq!(students.len(), 3);
        assert_eq!(students[0].reg_no, "008");
        assert_eq!(students[2].reg_no, "010");
        assert_eq!(students[0].seat_no, "A1");
        assert_eq!(students[2].seat_no, "A3");
        assert_eq!(students[0].department, "CS");
        assert_eq!(students[0].subject_code.as_deref(), Some("CS201"));
        assert_eq!(students[0].name, "CS Student");

        // a second config on the same prefix numbers from 1 again
        let c2 = config(2, "A", "Data Structures", "20", "21");
        let more = expand_to_students(&c2, &catalog());
        assert_eq!(more[0].seat_no, "A1");
        assert_eq!(more[1].seat_no, "A2");
    }

    #[test]
    fn expand_unknown_subject_uses_sentinel_department() {
        let c = config(1, "A", "Basket Weaving", "1", "1");
        let students = expand_to_students(&c, &catalog());
        assert_eq!(students[0].department, UNKNOWN_DEPARTMENT);
        assert_eq!(students[0].subject_code, None);
        assert_eq!(students[0].subject_name, "Basket Weaving");
        assert_eq!(students[0].name, "Unknown Department Student");
    }

    #[test]
    fn expand_degrades_to_empty_on_bad_input() {
        let empty_dept = config(1, "A", "", "1", "5");
        assert!(expand_to_students(&empty_dept, &[]).is_empty());

        let missing_start = config(1, "A", "Data Structures", "", "5");
        assert!(expand_to_students(&missing_start, &[]).is_empty());

        let non_numeric = config(1, "A", "Data Structures", "one", "5");
        assert!(expand_to_students(&non_numeric, &[]).is_empty());

        let inverted = config(1, "A", "Data Structures", "5", "2");
        assert!(expand_to_students(&inverted, &[]).is_empty());
    }

    #[test]
    fn generate_interleaves_round_robin_across_series() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "2"),
            config(2, "B", "Circuit Theory", "1", "1"),
        ];
        let seats = generate(&configs, 1, 3, &catalog());
        assert_eq!(seats.len(), 3);
        assert_eq!(seats[0].seat_no, "A1");
        assert_eq!(seats[0].reg_no.as_deref(), Some("001"));
        assert_eq!(seats[0].department.as_deref(), Some("CS"));
        assert_eq!(seats[1].seat_no, "B1");
        assert_eq!(seats[1].department.as_deref(), Some("EE"));
        assert_eq!(seats[2].seat_no, "A2");
        assert_eq!(seats[2].reg_no.as_deref(), Some("002"));
    }

    #[test]
    fn generate_is_deterministic() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "4"),
            config(2, "B", "Circuit Theory", "1", "3"),
        ];
        let first = generate(&configs, 3, 3, &catalog());
        let second = generate(&configs, 3, 3, &catalog());
        assert_eq!(first, second);
    }

    #[test]
    fn generate_truncates_overflow_silently() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "2"),
            config(2, "B", "Circuit Theory", "1", "1"),
        ];
        let seats = generate(&configs, 1, 2, &catalog());
        assert_eq!(seats.len(), 2);
        assert_eq!(seats[0].seat_no, "A1");
        assert_eq!(seats[1].seat_no, "B1");
    }

    #[test]
    fn generate_pads_underflow_with_empty_seats() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "2"),
            config(2, "B", "Circuit Theory", "1", "1"),
        ];
        let seats = generate(&configs, 2, 2, &catalog());
        assert_eq!(seats.len(), 4);
        assert!(seats[3].is_empty());
        assert_eq!(seats[3].id, 3);
        assert_eq!(seats[3].seat_no, "");
        assert_eq!(seats[3].student_name, None);
        assert_eq!(seats[3].reg_no, None);
        assert_eq!(seats[3].department, None);
    }

    #[test]
    fn generate_with_no_students_yields_all_empty_grid() {
        let seats = generate(&[], 2, 3, &[]);
        assert_eq!(seats.len(), 6);
        assert!(seats.iter().all(|s| s.is_empty()));
        assert_eq!(seats.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn generate_merges_same_prefix_configs_in_config_order() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "1"),
            config(2, "B", "Circuit Theory", "1", "1"),
            config(3, "A", "Data Structures", "30", "30"),
        ];
        let seats = generate(&configs, 1, 4, &catalog());
        // series A holds both A-configs' students in config order
        assert_eq!(seats[0].reg_no.as_deref(), Some("001"));
        assert_eq!(seats[1].seat_no, "B1");
        assert_eq!(seats[2].reg_no.as_deref(), Some("030"));
        assert_eq!(seats[2].seat_no, "A1");
        assert!(seats[3].is_empty());
    }

    #[test]
    fn generate_cycles_through_all_six_canonical_series() {
        let configs: Vec<SeriesConfig> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .enumerate()
            .map(|(i, p)| config(i as i64 + 1, p, "Data Structures", "1", "2"))
            .collect();
        let seats = generate(&configs, 2, 6, &catalog());
        let labels: Vec<&str> = seats.iter().map(|s| s.seat_no.as_str()).collect();
        assert_eq!(
            labels,
            vec!["A1", "B1", "C1", "D1", "E1", "F1", "A2", "B2", "C2", "D2", "E2", "F2"]
        );
    }

    #[test]
    fn rotate_right_wraps_last_payload_to_front() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "2"),
            config(2, "B", "Circuit Theory", "1", "1"),
        ];
        let seats = generate(&configs, 1, 3, &catalog());
        let rotated = rotate(&seats, Direction::Right);
        assert_eq!(rotated[0].seat_no, "A2");
        assert_eq!(rotated[1].seat_no, "A1");
        assert_eq!(rotated[2].seat_no, "B1");
        // ids stay glued to the grid positions
        assert_eq!(rotated.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn rotate_round_trips() {
        let configs = vec![
            config(1, "A", "Data Structures", "1", "3"),
            config(2, "B", "Circuit Theory", "1", "1"),
        ];
        let seats = generate(&configs, 2, 3, &catalog());
        assert_eq!(rotate(&rotate(&seats, Direction::Left), Direction::Right), seats);
        assert_eq!(rotate(&rotate(&seats, Direction::Right), Direction::Left), seats);
    }

    #[test]
    fn rotate_empty_is_noop() {
        assert!(rotate(&[], Direction::Left).is_empty());
    }

    #[test]
    fn rotate_carries_empty_seats_with_the_payload() {
        let configs = vec![config(1, "A", "Data Structures", "1", "1")];
        let seats = generate(&configs, 1, 3, &catalog());
        let rotated = rotate(&seats, Direction::Right);
        // the trailing empty seat moved to the front
        assert!(rotated[0].is_empty());
        assert_eq!(rotated[1].seat_no, "A1");
        assert!(rotated[2].is_empty());
    }
}
