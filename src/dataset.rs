use std::path::Path;

use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::NaiveDateTime;

use crate::error::{CourseLensError, Result};

const EXPECTED_COLUMNS: [&str; 9] = [
    "Employee ID",
    "Main Organization Unit",
    "Country",
    "Platform",
    "Course Name",
    "Course Level",
    "Employee Role",
    "Registration Date",
    "Course Completion Date",
];

/// One row of the course completion spreadsheet. A `None` completion date
/// means the employee is currently enrolled.
#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub employee_id: String,
    pub organization: String,
    pub country: String,
    pub platform: String,
    pub course_name: String,
    pub course_level: String,
    pub role: String,
    pub registration: Option<NaiveDateTime>,
    pub completion: Option<NaiveDateTime>,
}

/// The in-memory table. Loaded once per invocation and shared read-only by
/// every component; nothing is ever written back to the source file.
#[derive(Debug)]
pub struct Dataset {
    records: Vec<CourseRecord>,
}

impl Dataset {
    /// Read the spreadsheet at `path`. A missing or unreadable file and a
    /// missing column are fatal; an unparsable date cell is coerced to None.
    pub fn load(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| CourseLensError::Dataset(format!("Failed to open {}: {e}", path.display())))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| CourseLensError::Dataset("Workbook has no sheets".to_string()))?
            .map_err(|e| CourseLensError::Dataset(format!("Failed to read sheet: {e}")))?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| CourseLensError::Dataset("Sheet is empty".to_string()))?;

        let columns = column_indices(header)?;

        let records = rows
            .map(|row| CourseRecord {
                employee_id: cell_text(row, columns[0]),
                organization: cell_text(row, columns[1]),
                country: cell_text(row, columns[2]),
                platform: cell_text(row, columns[3]),
                course_name: cell_text(row, columns[4]),
                course_level: cell_text(row, columns[5]),
                role: cell_text(row, columns[6]),
                registration: cell_datetime(row, columns[7]),
                completion: cell_datetime(row, columns[8]),
            })
            .collect();

        Ok(Self { records })
    }

    pub fn from_records(records: Vec<CourseRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the table as CSV for the agent's system context.
    pub fn to_csv(&self) -> String {
        let mut out = EXPECTED_COLUMNS.join(",");
        out.push('\n');
        for r in &self.records {
            let row = [
                &r.employee_id,
                &r.organization,
                &r.country,
                &r.platform,
                &r.course_name,
                &r.course_level,
                &r.role,
                &format_date(r.registration),
                &format_date(r.completion),
            ]
            .map(|field| csv_escape(field))
            .join(",");
            out.push_str(&row);
            out.push('\n');
        }
        out
    }
}

fn column_indices(header: &[Data]) -> Result<[usize; 9]> {
    let mut indices = [0usize; 9];
    for (slot, name) in indices.iter_mut().zip(EXPECTED_COLUMNS) {
        *slot = header
            .iter()
            .position(|cell| cell.as_string().is_some_and(|s| s.trim() == name))
            .ok_or_else(|| CourseLensError::Dataset(format!("Missing column: {name}")))?;
    }
    Ok(indices)
}

fn cell_text(row: &[Data], index: usize) -> String {
    row.get(index)
        .and_then(|cell| cell.as_string())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn cell_datetime(row: &[Data], index: usize) -> Option<NaiveDateTime> {
    let cell = row.get(index)?;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    cell.as_string().and_then(|s| parse_date(&s))
}

/// Best-effort date parsing for cells stored as text; anything unparsable
/// becomes None rather than failing the load.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    const FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d", "%d-%m-%Y"];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn format_date(value: Option<NaiveDateTime>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_common_formats() {
        assert!(parse_date("2024-03-15").is_some());
        assert!(parse_date("2024-03-15 10:30:00").is_some());
        assert!(parse_date("15-03-2024").is_some());
    }

    #[test]
    fn test_parse_date_coerces_garbage_to_none() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("2024-13-99").is_none());
    }

    #[test]
    fn test_to_csv_includes_header_and_rows() {
        let dataset = Dataset::from_records(vec![CourseRecord {
            employee_id: "E1".into(),
            organization: "Sales, EMEA".into(),
            country: "Germany".into(),
            platform: "Coursera".into(),
            course_name: "Rust Basics".into(),
            course_level: "Beginner".into(),
            role: "Engineer".into(),
            registration: parse_date("2024-01-10"),
            completion: None,
        }]);

        let csv = dataset.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), EXPECTED_COLUMNS.join(","));
        let row = lines.next().unwrap();
        // Comma-bearing fields are quoted, empty completion stays empty.
        assert!(row.starts_with("E1,\"Sales, EMEA\",Germany"));
        assert!(row.ends_with("2024-01-10,"));
    }
}
