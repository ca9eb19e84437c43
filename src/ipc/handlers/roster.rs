use crate::ipc::helpers::{get_optional_str, get_required_str, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, NewCourse};
use rusqlite::Connection;
use serde_json::{json, Value};

fn courses_create(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let year = match params.get("year") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| HandlerErr::bad_params("year must be an integer"))?,
        ),
    };
    let course = roster::create_course(
        conn,
        NewCourse {
            name: get_required_str(params, "name")?,
            grade: get_optional_str(params, "grade"),
            section: get_optional_str(params, "section"),
            level: get_optional_str(params, "level"),
            area: get_optional_str(params, "area"),
            year,
            period: get_optional_str(params, "period"),
            teacher_id: get_optional_str(params, "teacherId"),
        },
    )?;
    Ok(json!({ "courseId": course.id, "course": course }))
}

fn courses_list(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = get_optional_str(params, "teacherId");
    let courses = roster::list_courses(conn, teacher_id.as_deref())?;
    Ok(json!({ "courses": courses }))
}

fn students_create(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let full_name = get_required_str(params, "fullName")?;
    let student =
        roster::create_student(conn, &course_id, &full_name, get_optional_str(params, "dni"))?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_list(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let students = roster::list_students_by_course(conn, &course_id)?;
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "courses.create" => Some(with_db(state, req, courses_create)),
        "courses.list" => Some(with_db(state, req, courses_list)),
        "students.create" => Some(with_db(state, req, students_create)),
        "students.list" => Some(with_db(state, req, students_list)),
        _ => None,
    }
}
