use super::{sessions, AttendanceStatus, Record, Session};
use crate::dates;
use crate::error::{AttendanceError, AttendanceResult};
use crate::roster;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

/// How a batch with unusable entries is treated. Neither policy ever writes
/// a session without records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Any invalid entry rejects the whole batch.
    #[default]
    Strict,
    /// Invalid entries are dropped; the rest is saved.
    Lenient,
}

impl FromStr for BatchPolicy {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(BatchPolicy::Strict),
            "lenient" => Ok(BatchPolicy::Lenient),
            other => Err(AttendanceError::Validation(format!(
                "policy must be strict or lenient, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveAttendance {
    pub course_id: String,
    /// Acting user; stamped on the session.
    pub teacher_id: String,
    pub date: String,
    pub topic: String,
    /// `(student_id, raw_status)` in submission order.
    pub statuses: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedEntry {
    pub student_id: String,
    pub status: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAttendance {
    pub session: Session,
    pub records_saved: usize,
    pub dropped: Vec<DroppedEntry>,
}

/// Collapse repeated student ids: the last status wins, the first position is kept.
fn dedupe_last_wins(statuses: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, String> = HashMap::new();
    for (student_id, status) in statuses {
        let student_id = student_id.trim().to_string();
        if latest.insert(student_id.clone(), status).is_none() {
            order.push(student_id);
        }
    }
    order
        .into_iter()
        .filter_map(|sid| latest.remove(&sid).map(|status| (sid, status)))
        .collect()
}

/// Save one day of attendance for a course.
///
/// The whole batch is validated before anything is written. The session and
/// every record are then inserted in one immediate transaction, so a failed
/// call leaves neither an empty session nor a partial batch behind.
pub fn save_attendance(
    conn: &mut Connection,
    input: SaveAttendance,
    policy: BatchPolicy,
    now: DateTime<Utc>,
) -> AttendanceResult<SavedAttendance> {
    if input.teacher_id.trim().is_empty() {
        return Err(AttendanceError::validation(
            "an authenticated teacher is required",
        ));
    }
    if input.topic.trim().is_empty() {
        return Err(AttendanceError::validation("topic must not be empty"));
    }
    if input.statuses.is_empty() {
        return Err(AttendanceError::validation("no attendance entries submitted"));
    }
    dates::parse_label(&input.date)?;
    roster::require_course(conn, &input.course_id)?;

    let enrolled: HashSet<String> = roster::list_students_by_course(conn, &input.course_id)?
        .into_iter()
        .map(|s| s.id)
        .collect();

    let mut valid: Vec<(String, AttendanceStatus)> = Vec::new();
    let mut dropped: Vec<DroppedEntry> = Vec::new();
    for (student_id, raw) in dedupe_last_wins(input.statuses) {
        if !enrolled.contains(&student_id) {
            dropped.push(DroppedEntry {
                student_id,
                status: raw,
                reason: "student not enrolled in course",
            });
            continue;
        }
        match raw.parse::<AttendanceStatus>() {
            Ok(status) => valid.push((student_id, status)),
            Err(_) => dropped.push(DroppedEntry {
                student_id,
                status: raw,
                reason: "invalid status",
            }),
        }
    }

    if policy == BatchPolicy::Strict && !dropped.is_empty() {
        let listed: Vec<String> = dropped
            .iter()
            .map(|d| format!("{} ({:?}: {})", d.student_id, d.status, d.reason))
            .collect();
        return Err(AttendanceError::Validation(format!(
            "rejected {} attendance entries: {}",
            dropped.len(),
            listed.join(", ")
        )));
    }
    if valid.is_empty() {
        tracing::warn!(
            course_id = %input.course_id,
            date = %input.date,
            dropped = dropped.len(),
            "every attendance entry was filtered out"
        );
        return Err(AttendanceError::EmptyBatch);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let session = sessions::create_session(
        &tx,
        &input.course_id,
        &input.teacher_id,
        &input.date,
        &input.topic,
        now,
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO attendance_records(id, session_id, course_id, student_id, date, status)
             VALUES(?, ?, ?, ?, ?, ?)",
        )?;
        // course_id and date always come from the session row.
        for (student_id, status) in &valid {
            stmt.execute((
                Uuid::new_v4().to_string(),
                session.id(),
                session.course_id(),
                student_id,
                session.date(),
                status,
            ))?;
        }
    }
    tx.commit()?;

    if !dropped.is_empty() {
        tracing::warn!(
            session_id = session.id(),
            dropped = dropped.len(),
            "attendance entries dropped"
        );
    }
    tracing::info!(
        session_id = session.id(),
        records = valid.len(),
        "attendance saved"
    );
    Ok(SavedAttendance {
        session,
        records_saved: valid.len(),
        dropped,
    })
}

/// Records of one session joined with student names, ordered by name.
pub fn list_session_records(conn: &Connection, session_id: &str) -> AttendanceResult<Vec<Record>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.session_id, r.course_id, r.student_id, s.full_name, r.date, r.status
         FROM attendance_records r
         JOIN students s ON s.id = r.student_id
         WHERE r.session_id = ?
         ORDER BY s.full_name, r.rowid",
    )?;
    let rows = stmt
        .query_map([session_id], |r| {
            Ok(Record {
                id: r.get(0)?,
                session_id: r.get(1)?,
                course_id: r.get(2)?,
                student_id: r.get(3)?,
                full_name: r.get(4)?,
                date: r.get(5)?,
                status: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn dedupe_keeps_first_position_and_last_status() {
        let out = dedupe_last_wins(pairs(&[
            ("s1", "presente"),
            ("s2", "falta"),
            ("s1", "tardanza"),
        ]));
        assert_eq!(out, pairs(&[("s1", "tardanza"), ("s2", "falta")]));
    }

    #[test]
    fn batch_policy_parses() {
        assert_eq!("Lenient".parse::<BatchPolicy>().unwrap(), BatchPolicy::Lenient);
        assert_eq!("strict".parse::<BatchPolicy>().unwrap(), BatchPolicy::Strict);
        assert!("loose".parse::<BatchPolicy>().is_err());
        assert_eq!(BatchPolicy::default(), BatchPolicy::Strict);
    }
}
