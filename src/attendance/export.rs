use super::reports::SessionRollup;
use super::AttendanceStatus;
use crate::dates;
use crate::error::{AttendanceError, AttendanceResult};
use rusqlite::Connection;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const ATTENDANCE_CSV_HEADER: &str = "Fecha,Alumno,Estado,Tema";
pub const HISTORY_CSV_HEADER: &str = "Fecha,Tema,Presentes,Faltas,Tardanzas,Justificados";

/// A rendered CSV document and the number of data rows under its header.
///
/// `rows` is counted while rendering, so quoted fields that contain line
/// breaks do not change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub content: Vec<u8>,
    pub rows: usize,
}

/// Always quoted; embedded quotes are doubled.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Every record of the course, oldest date first and submission order within
/// a date. Lines are joined with `\n` without a trailing newline.
pub fn export_attendance_csv(conn: &Connection, course_id: &str) -> AttendanceResult<CsvExport> {
    let mut stmt = conn.prepare(
        "SELECT r.date, st.full_name, r.status, se.topic
         FROM attendance_records r
         JOIN students st ON st.id = r.student_id
         JOIN attendance_sessions se ON se.id = r.session_id
         WHERE r.course_id = ?
         ORDER BY r.date ASC, r.rowid ASC",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, AttendanceStatus>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(AttendanceError::NoRecords);
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(ATTENDANCE_CSV_HEADER.to_string());
    for (date, full_name, status, topic) in &rows {
        lines.push(format!(
            "{},{},{},{}",
            date,
            quoted(full_name),
            status,
            quoted(topic)
        ));
    }
    tracing::debug!(course_id, rows = rows.len(), "attendance csv exported");
    Ok(CsvExport {
        content: lines.join("\n").into_bytes(),
        rows: rows.len(),
    })
}

/// Per-session rollups as CSV, in the order given. The long Spanish date
/// contains a comma, so it is quoted like the topic.
pub fn export_history_csv(rows: &[SessionRollup]) -> AttendanceResult<CsvExport> {
    if rows.is_empty() {
        return Err(AttendanceError::NoRecords);
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(HISTORY_CSV_HEADER.to_string());
    for r in rows {
        let date = dates::format_full_spanish_date(&r.date).unwrap_or_else(|_| r.date.clone());
        lines.push(format!(
            "{},{},{},{},{},{}",
            quoted(&date),
            quoted(&r.topic),
            r.presente,
            r.falta,
            r.tardanza,
            r.justificado
        ));
    }
    Ok(CsvExport {
        content: lines.join("\n").into_bytes(),
        rows: rows.len(),
    })
}
