//! Attendance sessions, their per-student records, and the reports built on them.

pub mod export;
pub mod records;
pub mod reports;
pub mod sessions;

use crate::error::AttendanceError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use export::{export_attendance_csv, export_history_csv, CsvExport, CSV_CONTENT_TYPE};
pub use records::{
    list_session_records, save_attendance, BatchPolicy, DroppedEntry, SaveAttendance,
    SavedAttendance,
};
pub use reports::{
    build_weekly_matrix, filter_history_by_month, get_attendance_history, get_attendance_summary,
    get_course_attendance_details, get_weekly_attendance, history_months, history_totals,
    summarize, summary_all_courses, summary_by_teacher, AttendanceSummary,
    CourseAttendanceDetail, CourseReportRow, CourseSummary, HistoryTotals, SessionRollup,
    WeeklyMatrix, WeeklyRow,
};
pub use sessions::{
    create_session, get_session, get_session_by_date, is_session_editable, list_sessions,
    session_status, SessionState, SessionStatus,
};

/// Hours after creation during which a session counts as editable.
pub const EDIT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Presente,
    Falta,
    Tardanza,
    Justificado,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Presente,
        AttendanceStatus::Falta,
        AttendanceStatus::Tardanza,
        AttendanceStatus::Justificado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Presente => "presente",
            AttendanceStatus::Falta => "falta",
            AttendanceStatus::Tardanza => "tardanza",
            AttendanceStatus::Justificado => "justificado",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    /// Case and surrounding whitespace are ignored; anything outside the
    /// four tokens is rejected.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "presente" => Ok(AttendanceStatus::Presente),
            "falta" => Ok(AttendanceStatus::Falta),
            "tardanza" => Ok(AttendanceStatus::Tardanza),
            "justificado" => Ok(AttendanceStatus::Justificado),
            _ => Err(AttendanceError::Validation(format!(
                "invalid attendance status {raw:?}"
            ))),
        }
    }
}

impl ToSql for AttendanceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AttendanceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AttendanceError| FromSqlError::Other(Box::new(e)))
    }
}

/// One taken-attendance event. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: String,
    course_id: String,
    teacher_id: String,
    date: String,
    topic: String,
    created_at: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn teacher_id(&self) -> &str {
        &self.teacher_id
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }
}

/// One student's status within a session. `course_id` and `date` are copies
/// of the session's values, taken when the record is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub session_id: String,
    pub course_id: String,
    pub student_id: String,
    pub full_name: String,
    pub date: String,
    pub status: AttendanceStatus,
}
