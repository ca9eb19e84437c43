use super::{Session, EDIT_WINDOW_HOURS};
use crate::dates;
use crate::error::{AttendanceError, AttendanceResult};
use crate::roster;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, course_id, teacher_id, date, topic, created_at";

/// Where a (course, date) slot stands for a caller about to take attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Nonexistent,
    Ready,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session: Option<Session>,
}

fn session_from_row(r: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: r.get(0)?,
        course_id: r.get(1)?,
        teacher_id: r.get(2)?,
        date: r.get(3)?,
        topic: r.get(4)?,
        created_at: r.get(5)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn get_session(conn: &Connection, session_id: &str) -> AttendanceResult<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ?");
    Ok(conn
        .query_row(&sql, [session_id], session_from_row)
        .optional()?)
}

/// Exact (course, date) lookup. Absence is `Ok(None)`.
pub fn get_session_by_date(
    conn: &Connection,
    course_id: &str,
    date: &str,
) -> AttendanceResult<Option<Session>> {
    dates::parse_label(date)?;
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE course_id = ? AND date = ?"
    );
    Ok(conn
        .query_row(&sql, (course_id, date), session_from_row)
        .optional()?)
}

/// Sessions of a course, most recent date first.
pub fn list_sessions(conn: &Connection, course_id: &str) -> AttendanceResult<Vec<Session>> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM attendance_sessions
         WHERE course_id = ?
         ORDER BY date DESC, created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([course_id], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn editable_at(session: &Session, now: DateTime<Utc>) -> Option<bool> {
    let created = DateTime::parse_from_rfc3339(session.created_at()).ok()?;
    let elapsed = now.signed_duration_since(created.with_timezone(&Utc));
    Some(elapsed <= Duration::hours(EDIT_WINDOW_HOURS))
}

/// Whether the session is still inside its edit window at `now`.
///
/// Never fails: a session that cannot be read, does not exist, or carries an
/// unreadable timestamp is reported as not editable.
pub fn is_session_editable(conn: &Connection, session_id: &str, now: DateTime<Utc>) -> bool {
    match get_session(conn, session_id) {
        Ok(Some(session)) => editable_at(&session, now).unwrap_or_else(|| {
            tracing::warn!(
                session_id,
                created_at = session.created_at(),
                "unparsable session timestamp, treating as locked"
            );
            false
        }),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(session_id, error = %e, "edit check failed, treating as locked");
            false
        }
    }
}

pub fn session_status(
    conn: &Connection,
    course_id: &str,
    date: &str,
    now: DateTime<Utc>,
) -> AttendanceResult<SessionStatus> {
    let Some(session) = get_session_by_date(conn, course_id, date)? else {
        return Ok(SessionStatus {
            state: SessionState::Nonexistent,
            session: None,
        });
    };
    let state = if editable_at(&session, now).unwrap_or(false) {
        SessionState::Ready
    } else {
        SessionState::Locked
    };
    Ok(SessionStatus {
        state,
        session: Some(session),
    })
}

/// Create the session for (course, date).
///
/// An existing session for the slot fails with `DuplicateSession` and
/// writes nothing. The pre-check gives the common case a clean error; the
/// `UNIQUE(course_id, date)` constraint settles races between connections.
pub fn create_session(
    conn: &Connection,
    course_id: &str,
    teacher_id: &str,
    date: &str,
    topic: &str,
    now: DateTime<Utc>,
) -> AttendanceResult<Session> {
    if teacher_id.trim().is_empty() {
        return Err(AttendanceError::validation(
            "an authenticated teacher is required",
        ));
    }
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(AttendanceError::validation("topic must not be empty"));
    }
    dates::parse_label(date)?;
    roster::require_course(conn, course_id)?;

    let duplicate = || AttendanceError::DuplicateSession {
        course_id: course_id.to_string(),
        date: date.to_string(),
    };
    if get_session_by_date(conn, course_id, date)?.is_some() {
        tracing::info!(course_id, date, "session already exists");
        return Err(duplicate());
    }

    let session = Session {
        id: Uuid::new_v4().to_string(),
        course_id: course_id.to_string(),
        teacher_id: teacher_id.trim().to_string(),
        date: date.to_string(),
        topic: topic.to_string(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    conn.execute(
        "INSERT INTO attendance_sessions(id, course_id, teacher_id, date, topic, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &session.id,
            &session.course_id,
            &session.teacher_id,
            &session.date,
            &session.topic,
            &session.created_at,
        ),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            tracing::info!(course_id, date, "session insert lost a race");
            duplicate()
        } else {
            AttendanceError::from(e)
        }
    })?;
    tracing::info!(session_id = %session.id, course_id, date, "attendance session created");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::roster::{create_course, NewCourse};
    use chrono::TimeZone;

    fn setup() -> (tempfile::TempDir, Connection, String) {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(dir.path()).expect("open");
        let course = create_course(&conn, NewCourse::named("C1")).expect("course");
        (dir, conn, course.id)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 27, 8, 0, 0).unwrap()
    }

    #[test]
    fn create_then_lookup_then_duplicate() {
        let (_dir, conn, course_id) = setup();
        assert!(get_session_by_date(&conn, &course_id, "2025-10-27")
            .expect("lookup")
            .is_none());

        let s = create_session(&conn, &course_id, "t1", "2025-10-27", " Intro ", t0())
            .expect("create");
        assert_eq!(s.topic(), "Intro");
        assert_eq!(s.date(), "2025-10-27");

        let found = get_session_by_date(&conn, &course_id, "2025-10-27")
            .expect("lookup")
            .expect("present");
        assert_eq!(found, s);

        let again = create_session(&conn, &course_id, "t1", "2025-10-27", "Otra", t0());
        assert!(matches!(again, Err(AttendanceError::DuplicateSession { .. })));
        assert_eq!(list_sessions(&conn, &course_id).expect("list").len(), 1);
    }

    #[test]
    fn create_validates_inputs() {
        let (_dir, conn, course_id) = setup();
        assert!(matches!(
            create_session(&conn, &course_id, "", "2025-10-27", "Intro", t0()),
            Err(AttendanceError::Validation(_))
        ));
        assert!(matches!(
            create_session(&conn, &course_id, "t1", "2025-10-27", "   ", t0()),
            Err(AttendanceError::Validation(_))
        ));
        assert!(matches!(
            create_session(&conn, &course_id, "t1", "27/10/2025", "Intro", t0()),
            Err(AttendanceError::Validation(_))
        ));
        assert!(matches!(
            create_session(&conn, "missing", "t1", "2025-10-27", "Intro", t0()),
            Err(AttendanceError::NotFound { .. })
        ));
    }

    #[test]
    fn edit_window_is_monotonic() {
        let (_dir, conn, course_id) = setup();
        let s = create_session(&conn, &course_id, "t1", "2025-10-27", "Intro", t0())
            .expect("create");

        assert!(is_session_editable(&conn, s.id(), t0()));
        assert!(is_session_editable(&conn, s.id(), t0() + Duration::hours(23)));
        assert!(is_session_editable(&conn, s.id(), t0() + Duration::hours(24)));

        for minutes in (0..=72 * 60).step_by(30) {
            let now = t0() + Duration::hours(24) + Duration::minutes(minutes + 1);
            assert!(
                !is_session_editable(&conn, s.id(), now),
                "editable again at +24h{minutes}m"
            );
        }
    }

    #[test]
    fn edit_check_fails_closed() {
        let (_dir, conn, _course_id) = setup();
        assert!(!is_session_editable(&conn, "no-such-session", t0()));
    }

    #[test]
    fn status_moves_from_nonexistent_to_ready_to_locked() {
        let (_dir, conn, course_id) = setup();
        let before = session_status(&conn, &course_id, "2025-10-27", t0()).expect("status");
        assert_eq!(before.state, SessionState::Nonexistent);

        create_session(&conn, &course_id, "t1", "2025-10-27", "Intro", t0()).expect("create");
        let ready = session_status(&conn, &course_id, "2025-10-27", t0() + Duration::hours(1))
            .expect("status");
        assert_eq!(ready.state, SessionState::Ready);
        let locked = session_status(&conn, &course_id, "2025-10-27", t0() + Duration::hours(25))
            .expect("status");
        assert_eq!(locked.state, SessionState::Locked);
    }
}
