//! Aggregations over raw attendance records. Nothing here is cached or stored;
//! every figure is recomputed from the records on each call.

use super::AttendanceStatus;
use crate::dates;
use crate::error::{AttendanceError, AttendanceResult};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// 1-decimal rounding used for displayed rates: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// `presente / total * 100`, rounded to one decimal; `0.0` for an empty total.
pub fn attendance_rate(presente: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_off_1_decimal(presente as f64 / total as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub presente: usize,
    pub falta: usize,
    pub tardanza: usize,
    pub justificado: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Presente => self.presente += 1,
            AttendanceStatus::Falta => self.falta += 1,
            AttendanceStatus::Tardanza => self.tardanza += 1,
            AttendanceStatus::Justificado => self.justificado += 1,
        }
    }

    pub fn get(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::Presente => self.presente,
            AttendanceStatus::Falta => self.falta,
            AttendanceStatus::Tardanza => self.tardanza,
            AttendanceStatus::Justificado => self.justificado,
        }
    }

    pub fn total(&self) -> usize {
        self.presente + self.falta + self.tardanza + self.justificado
    }

    pub fn attendance_rate(&self) -> f64 {
        attendance_rate(self.presente, self.total())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusPercentages {
    pub presente: f64,
    pub falta: f64,
    pub tardanza: f64,
    pub justificado: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub presente: usize,
    pub falta: usize,
    pub tardanza: usize,
    pub justificado: usize,
    pub porcentajes: StatusPercentages,
}

/// Tally statuses into a summary. Percentages are `count / total * 100`,
/// unrounded, and all zero when there is nothing to count.
pub fn summarize<I>(statuses: I) -> AttendanceSummary
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut counts = StatusCounts::default();
    for s in statuses {
        counts.add(s);
    }
    let total = counts.total();
    let pct = |n: usize| {
        if total == 0 {
            0.0
        } else {
            n as f64 / total as f64 * 100.0
        }
    };
    AttendanceSummary {
        total,
        presente: counts.presente,
        falta: counts.falta,
        tardanza: counts.tardanza,
        justificado: counts.justificado,
        porcentajes: StatusPercentages {
            presente: pct(counts.presente),
            falta: pct(counts.falta),
            tardanza: pct(counts.tardanza),
            justificado: pct(counts.justificado),
        },
    }
}

/// Summary over every record of a course, across all sessions and dates.
pub fn get_attendance_summary(
    conn: &Connection,
    course_id: &str,
) -> AttendanceResult<AttendanceSummary> {
    let mut stmt = conn.prepare("SELECT status FROM attendance_records WHERE course_id = ?")?;
    let statuses = stmt
        .query_map([course_id], |r| r.get::<_, AttendanceStatus>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summarize(statuses))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_id: String,
    pub course_name: String,
    pub summary: AttendanceSummary,
    /// Presente share, rounded to one decimal.
    pub attendance_rate: f64,
    /// Most recent session date, if the course has any.
    pub last_session: Option<String>,
}

fn last_session_date(conn: &Connection, course_id: &str) -> AttendanceResult<Option<String>> {
    Ok(conn.query_row(
        "SELECT MAX(date) FROM attendance_sessions WHERE course_id = ?",
        [course_id],
        |r| r.get::<_, Option<String>>(0),
    )?)
}

fn course_summary(
    conn: &Connection,
    course_id: String,
    course_name: String,
) -> AttendanceResult<CourseSummary> {
    let summary = get_attendance_summary(conn, &course_id)?;
    let last_session = last_session_date(conn, &course_id)?;
    Ok(CourseSummary {
        attendance_rate: attendance_rate(summary.presente, summary.total),
        course_id,
        course_name,
        summary,
        last_session,
    })
}

/// Per-course summaries for a teacher: courses they own plus courses they
/// have recorded sessions for.
pub fn summary_by_teacher(
    conn: &Connection,
    teacher_id: &str,
) -> AttendanceResult<Vec<CourseSummary>> {
    if teacher_id.trim().is_empty() {
        return Err(AttendanceError::validation("teacherId must not be empty"));
    }
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name
         FROM courses c
         WHERE c.teacher_id = ?1
            OR EXISTS (
              SELECT 1 FROM attendance_sessions s
              WHERE s.course_id = c.id AND s.teacher_id = ?1
            )
         ORDER BY c.name, c.id",
    )?;
    let courses = stmt
        .query_map([teacher_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    courses
        .into_iter()
        .map(|(course_id, course_name)| course_summary(conn, course_id, course_name))
        .collect()
}

/// One line of the school-wide report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReportRow {
    pub teacher_id: Option<String>,
    #[serde(flatten)]
    pub course: CourseSummary,
}

/// Every course with its totals, rate and last session, ordered by name.
/// Courses without records are listed with zero counts.
pub fn summary_all_courses(conn: &Connection) -> AttendanceResult<Vec<CourseReportRow>> {
    let mut stmt = conn.prepare("SELECT id, name, teacher_id FROM courses ORDER BY name, id")?;
    let courses = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    courses
        .into_iter()
        .map(|(course_id, course_name, teacher_id)| {
            Ok(CourseReportRow {
                teacher_id,
                course: course_summary(conn, course_id, course_name)?,
            })
        })
        .collect()
}

/// A record of a course with the student and session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAttendanceDetail {
    pub record_id: String,
    pub session_id: String,
    pub date: String,
    pub status: AttendanceStatus,
    pub student_id: String,
    pub full_name: String,
    pub dni: Option<String>,
    pub topic: String,
}

/// Every record of the course, most recent date first, then by student name.
pub fn get_course_attendance_details(
    conn: &Connection,
    course_id: &str,
) -> AttendanceResult<Vec<CourseAttendanceDetail>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.session_id, r.date, r.status, st.id, st.full_name, st.dni, se.topic
         FROM attendance_records r
         JOIN students st ON st.id = r.student_id
         JOIN attendance_sessions se ON se.id = r.session_id
         WHERE r.course_id = ?
         ORDER BY r.date DESC, st.full_name, r.rowid",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(CourseAttendanceDetail {
                record_id: r.get(0)?,
                session_id: r.get(1)?,
                date: r.get(2)?,
                status: r.get(3)?,
                student_id: r.get(4)?,
                full_name: r.get(5)?,
                dni: r.get(6)?,
                topic: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRow {
    pub student_id: String,
    pub full_name: String,
    pub date: String,
    pub status: AttendanceStatus,
}

fn parse_monday(monday: &str) -> AttendanceResult<NaiveDate> {
    let date = dates::parse_label(monday)?;
    if date.weekday() != Weekday::Mon {
        return Err(AttendanceError::Validation(format!(
            "{monday} is a {}, expected a Monday",
            dates::weekday_name(date)
        )));
    }
    Ok(date)
}

/// Records dated Monday..Friday of the given week, with student names.
pub fn get_weekly_attendance(
    conn: &Connection,
    course_id: &str,
    monday: &str,
) -> AttendanceResult<Vec<WeeklyRow>> {
    let start = parse_monday(monday)?;
    let end = start + Duration::days(4);
    let mut stmt = conn.prepare(
        "SELECT r.student_id, s.full_name, r.date, r.status
         FROM attendance_records r
         JOIN students s ON s.id = r.student_id
         WHERE r.course_id = ? AND r.date >= ? AND r.date <= ?
         ORDER BY r.date, s.full_name",
    )?;
    let rows = stmt
        .query_map(
            (course_id, dates::label(start), dates::label(end)),
            |r| {
                Ok(WeeklyRow {
                    student_id: r.get(0)?,
                    full_name: r.get(1)?,
                    date: r.get(2)?,
                    status: r.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekDayColumn {
    pub date: String,
    pub weekday: &'static str,
    pub short_name: &'static str,
    /// "dd/mm"
    pub header: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub student_id: String,
    pub full_name: String,
    /// Monday..Friday; `None` where the student has no record that day.
    pub cells: Vec<Option<AttendanceStatus>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyMatrix {
    pub monday: String,
    pub days: Vec<WeekDayColumn>,
    pub students: Vec<MatrixRow>,
    pub totals: StatusCounts,
    pub total: usize,
    pub attendance_rate: f64,
}

/// Pivot weekly rows into student × weekday. Rows outside Monday..Friday of
/// the week are left out.
pub fn build_weekly_matrix(monday: &str, rows: &[WeeklyRow]) -> AttendanceResult<WeeklyMatrix> {
    let start = parse_monday(monday)?;
    let days: Vec<WeekDayColumn> = (0..5)
        .map(|i| {
            let d = start + Duration::days(i);
            WeekDayColumn {
                date: dates::label(d),
                weekday: dates::weekday_name(d),
                short_name: dates::short_weekday_name(d),
                header: dates::format_day_slash_month(d),
            }
        })
        .collect();

    let mut by_student: HashMap<String, MatrixRow> = HashMap::new();
    for row in rows {
        let Ok(date) = dates::parse_label(&row.date) else {
            continue;
        };
        let offset = (date - start).num_days();
        if !(0..5).contains(&offset) || !dates::is_weekday_date(date) {
            continue;
        }
        let entry = by_student
            .entry(row.student_id.clone())
            .or_insert_with(|| MatrixRow {
                student_id: row.student_id.clone(),
                full_name: row.full_name.clone(),
                cells: vec![None; 5],
            });
        entry.cells[offset as usize] = Some(row.status);
    }

    let mut students: Vec<MatrixRow> = by_student.into_values().collect();
    students.sort_by(|a, b| {
        a.full_name
            .to_lowercase()
            .cmp(&b.full_name.to_lowercase())
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    let mut totals = StatusCounts::default();
    for status in students.iter().flat_map(|s| s.cells.iter().flatten()) {
        totals.add(*status);
    }
    Ok(WeeklyMatrix {
        monday: dates::label(start),
        days,
        students,
        total: totals.total(),
        attendance_rate: totals.attendance_rate(),
        totals,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRollup {
    pub session_id: String,
    pub date: String,
    pub topic: String,
    pub presente: usize,
    pub falta: usize,
    pub tardanza: usize,
    pub justificado: usize,
    pub total: usize,
    pub attendance_rate: f64,
}

/// One rollup per session of the course, most recent date first.
pub fn get_attendance_history(
    conn: &Connection,
    course_id: &str,
) -> AttendanceResult<Vec<SessionRollup>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.date, s.topic,
           COALESCE(SUM(CASE WHEN r.status = 'presente' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN r.status = 'falta' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN r.status = 'tardanza' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN r.status = 'justificado' THEN 1 ELSE 0 END), 0)
         FROM attendance_sessions s
         LEFT JOIN attendance_records r ON r.session_id = s.id
         WHERE s.course_id = ?
         GROUP BY s.id
         ORDER BY s.date DESC, s.created_at",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            let counts = StatusCounts {
                presente: r.get::<_, i64>(3)? as usize,
                falta: r.get::<_, i64>(4)? as usize,
                tardanza: r.get::<_, i64>(5)? as usize,
                justificado: r.get::<_, i64>(6)? as usize,
            };
            Ok(SessionRollup {
                session_id: r.get(0)?,
                date: r.get(1)?,
                topic: r.get(2)?,
                presente: counts.presente,
                falta: counts.falta,
                tardanza: counts.tardanza,
                justificado: counts.justificado,
                total: counts.total(),
                attendance_rate: counts.attendance_rate(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Distinct `YYYY-MM` months present in the history, most recent first.
pub fn history_months(rows: &[SessionRollup]) -> Vec<String> {
    let months: BTreeSet<String> = rows
        .iter()
        .filter_map(|r| dates::month_key(&r.date).ok())
        .collect();
    months.into_iter().rev().collect()
}

pub fn filter_history_by_month(
    rows: &[SessionRollup],
    month: &str,
) -> AttendanceResult<Vec<SessionRollup>> {
    dates::parse_label(&format!("{month}-01"))
        .map_err(|_| AttendanceError::Validation(format!("month {month:?} must be YYYY-MM")))?;
    Ok(rows
        .iter()
        .filter(|r| dates::month_key(&r.date).map(|m| m == month).unwrap_or(false))
        .cloned()
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTotals {
    pub sessions: usize,
    pub presente: usize,
    pub falta: usize,
    pub tardanza: usize,
    pub justificado: usize,
    pub total: usize,
    pub attendance_rate: f64,
}

pub fn history_totals(rows: &[SessionRollup]) -> HistoryTotals {
    let mut counts = StatusCounts::default();
    for r in rows {
        counts.presente += r.presente;
        counts.falta += r.falta;
        counts.tardanza += r.tardanza;
        counts.justificado += r.justificado;
    }
    HistoryTotals {
        sessions: rows.len(),
        presente: counts.presente,
        falta: counts.falta,
        tardanza: counts.tardanza,
        justificado: counts.justificado,
        total: counts.total(),
        attendance_rate: counts.attendance_rate(),
    }
}

#[cfg(test)]
mod tests {
    use super::AttendanceStatus::*;
    use super::*;

    fn row(student: &str, name: &str, date: &str, status: AttendanceStatus) -> WeeklyRow {
        WeeklyRow {
            student_id: student.to_string(),
            full_name: name.to_string(),
            date: date.to_string(),
            status,
        }
    }

    #[test]
    fn round_off_and_rate() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(66.66), 66.7);
        assert_eq!(round_off_1_decimal(33.34), 33.3);
        assert_eq!(attendance_rate(0, 0), 0.0);
        assert_eq!(attendance_rate(2, 3), 66.7);
        assert_eq!(attendance_rate(3, 3), 100.0);
    }

    #[test]
    fn summary_counts_and_percentages() {
        let s = summarize([Presente, Falta, Presente, Tardanza, Justificado, Presente]);
        assert_eq!(s.total, 6);
        assert_eq!(s.presente, 3);
        assert_eq!(s.falta, 1);
        assert_eq!(s.tardanza, 1);
        assert_eq!(s.justificado, 1);
        assert!((s.porcentajes.presente - 50.0).abs() < 1e-9);
        let sum = s.porcentajes.presente
            + s.porcentajes.falta
            + s.porcentajes.tardanza
            + s.porcentajes.justificado;
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn summary_of_nothing_is_all_zero() {
        let s = summarize(std::iter::empty());
        assert_eq!(s, AttendanceSummary::default());
        assert_eq!(s.porcentajes.presente, 0.0);
    }

    #[test]
    fn matrix_buckets_weekdays_only() {
        let rows = vec![
            row("s2", "Zoila", "2025-10-27", Presente),
            row("s1", "Ana", "2025-10-27", Falta),
            row("s1", "Ana", "2025-10-31", Tardanza),
            row("s1", "Ana", "2025-11-01", Presente),
            row("s1", "Ana", "2025-10-26", Presente),
            row("s3", "Beto", "2025-11-03", Presente),
        ];
        let m = build_weekly_matrix("2025-10-27", &rows).expect("matrix");
        assert_eq!(m.days.len(), 5);
        assert_eq!(m.days[0].weekday, "Lunes");
        assert_eq!(m.days[4].header, "31/10");
        let names: Vec<&str> = m.students.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Zoila"]);
        assert_eq!(
            m.students[0].cells,
            vec![Some(Falta), None, None, None, Some(Tardanza)]
        );
        assert_eq!(m.total, 3);
        assert_eq!(m.totals.presente, 1);
        assert_eq!(m.attendance_rate, 33.3);
    }

    #[test]
    fn matrix_requires_monday() {
        assert!(matches!(
            build_weekly_matrix("2025-10-28", &[]),
            Err(AttendanceError::Validation(_))
        ));
    }

    #[test]
    fn history_months_filter_and_totals() {
        let mk = |date: &str, p: usize, f: usize| SessionRollup {
            session_id: date.to_string(),
            date: date.to_string(),
            topic: "t".to_string(),
            presente: p,
            falta: f,
            tardanza: 0,
            justificado: 0,
            total: p + f,
            attendance_rate: attendance_rate(p, p + f),
        };
        let rows = vec![mk("2025-11-03", 2, 0), mk("2025-10-28", 1, 1), mk("2025-10-27", 0, 2)];
        assert_eq!(history_months(&rows), vec!["2025-11", "2025-10"]);
        let oct = filter_history_by_month(&rows, "2025-10").expect("filter");
        assert_eq!(oct.len(), 2);
        assert!(filter_history_by_month(&rows, "octubre").is_err());
        let totals = history_totals(&rows);
        assert_eq!(totals.sessions, 3);
        assert_eq!(totals.total, 6);
        assert_eq!(totals.attendance_rate, 50.0);
    }
}
