use asistenciad::attendance::{self, BatchPolicy, SaveAttendance};
use asistenciad::db;
use asistenciad::error::AttendanceError;
use asistenciad::roster::{self, NewCourse};
use chrono::Utc;
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 8;

#[test]
fn concurrent_saves_create_at_most_one_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (course_id, student_id) = {
        let conn = db::open_db(dir.path()).expect("open db");
        let course = roster::create_course(&conn, NewCourse::named("Concurrencia")).expect("course");
        let student =
            roster::create_student(&conn, &course.id, "Alumno Uno", None).expect("student");
        (course.id, student.id)
    };

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let workspace = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            let course_id = course_id.clone();
            let student_id = student_id.clone();
            thread::spawn(move || {
                let mut conn = db::open_db(&workspace).expect("open db in thread");
                barrier.wait();
                attendance::save_attendance(
                    &mut conn,
                    SaveAttendance {
                        course_id,
                        teacher_id: format!("t{i}"),
                        date: "2025-10-27".to_string(),
                        topic: format!("Tema {i}"),
                        statuses: vec![(student_id, "presente".to_string())],
                    },
                    BatchPolicy::Strict,
                    Utc::now(),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("writer thread panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(AttendanceError::DuplicateSession { .. })))
        .count();
    assert_eq!(successes, 1, "results: {results:?}");
    assert_eq!(duplicates, WRITERS - 1, "results: {results:?}");

    let conn = db::open_db(dir.path()).expect("reopen");
    let sessions = attendance::list_sessions(&conn, &course_id).expect("sessions");
    assert_eq!(sessions.len(), 1);
    let records = attendance::list_session_records(&conn, sessions[0].id()).expect("records");
    assert_eq!(records.len(), 1);
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM attendance_records", [], |r| r.get(0))
        .expect("count");
    assert_eq!(total, 1);
}
