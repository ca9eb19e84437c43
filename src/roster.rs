//! Courses and students, as far as attendance needs them: enough to seed a
//! store and to join names into reports. There is no update or delete here.

use crate::error::{AttendanceError, AttendanceResult};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub level: Option<String>,
    pub area: Option<String>,
    pub year: Option<i64>,
    pub period: Option<String>,
    pub teacher_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub name: String,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub level: Option<String>,
    pub area: Option<String>,
    pub year: Option<i64>,
    pub period: Option<String>,
    pub teacher_id: Option<String>,
}

impl NewCourse {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub dni: Option<String>,
    pub course_id: String,
    pub created_at: String,
}

const COURSE_COLUMNS: &str =
    "id, name, grade, section, level, area, year, period, teacher_id, created_at";

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        name: r.get(1)?,
        grade: r.get(2)?,
        section: r.get(3)?,
        level: r.get(4)?,
        area: r.get(5)?,
        year: r.get(6)?,
        period: r.get(7)?,
        teacher_id: r.get(8)?,
        created_at: r.get(9)?,
    })
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        full_name: r.get(1)?,
        dni: r.get(2)?,
        course_id: r.get(3)?,
        created_at: r.get(4)?,
    })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn create_course(conn: &Connection, input: NewCourse) -> AttendanceResult<Course> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AttendanceError::validation("course name must not be empty"));
    }
    let course = Course {
        id: Uuid::new_v4().to_string(),
        name,
        grade: non_empty(input.grade),
        section: non_empty(input.section),
        level: non_empty(input.level),
        area: non_empty(input.area),
        year: input.year,
        period: non_empty(input.period),
        teacher_id: non_empty(input.teacher_id),
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO courses(id, name, grade, section, level, area, year, period, teacher_id, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            course.id,
            course.name,
            course.grade,
            course.section,
            course.level,
            course.area,
            course.year,
            course.period,
            course.teacher_id,
            course.created_at,
        ],
    )?;
    tracing::debug!(course_id = %course.id, "course created");
    Ok(course)
}

pub fn get_course(conn: &Connection, course_id: &str) -> AttendanceResult<Option<Course>> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?");
    Ok(conn
        .query_row(&sql, [course_id], course_from_row)
        .optional()?)
}

/// Like [`get_course`] but absence is an error.
pub fn require_course(conn: &Connection, course_id: &str) -> AttendanceResult<Course> {
    get_course(conn, course_id)?.ok_or_else(|| AttendanceError::NotFound {
        entity: "course",
        id: course_id.to_string(),
    })
}

pub fn list_courses(conn: &Connection, teacher_id: Option<&str>) -> AttendanceResult<Vec<Course>> {
    let rows = match teacher_id {
        Some(tid) => {
            let sql =
                format!("SELECT {COURSE_COLUMNS} FROM courses WHERE teacher_id = ? ORDER BY name");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([tid], course_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY name");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], course_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn create_student(
    conn: &Connection,
    course_id: &str,
    full_name: &str,
    dni: Option<String>,
) -> AttendanceResult<Student> {
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(AttendanceError::validation("student name must not be empty"));
    }
    require_course(conn, course_id)?;
    let student = Student {
        id: Uuid::new_v4().to_string(),
        full_name: full_name.to_string(),
        dni: non_empty(dni),
        course_id: course_id.to_string(),
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO students(id, course_id, full_name, dni, created_at) VALUES(?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.course_id,
            &student.full_name,
            &student.dni,
            &student.created_at,
        ),
    )?;
    Ok(student)
}

/// Students of a course, ordered by full name.
pub fn list_students_by_course(
    conn: &Connection,
    course_id: &str,
) -> AttendanceResult<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, dni, course_id, created_at
         FROM students
         WHERE course_id = ?
         ORDER BY full_name, rowid",
    )?;
    let rows = stmt
        .query_map([course_id], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
