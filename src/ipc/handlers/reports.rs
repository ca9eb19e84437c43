use crate::attendance::{self, CsvExport, SessionRollup, CSV_CONTENT_TYPE};
use crate::dates;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_db, write_text_file, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn summary(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let summary = attendance::get_attendance_summary(conn, &course_id)?;
    Ok(json!(summary))
}

fn summary_by_teacher(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let courses = attendance::summary_by_teacher(conn, &teacher_id)?;
    Ok(json!({ "courses": courses }))
}

fn summary_all(conn: &mut Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let courses = attendance::summary_all_courses(conn)?;
    Ok(json!({ "courses": courses }))
}

fn course_details(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let records = attendance::get_course_attendance_details(conn, &course_id)?;
    Ok(json!({ "records": records }))
}

fn weekly(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let monday = get_optional_str(params, "monday")
        .unwrap_or_else(dates::get_monday_of_current_week_local);
    let rows = attendance::get_weekly_attendance(conn, &course_id, &monday)?;
    let matrix = attendance::build_weekly_matrix(&monday, &rows)?;
    Ok(json!({
        "monday": monday,
        "rows": rows,
        "matrix": matrix,
    }))
}

fn select_month(
    all: Vec<SessionRollup>,
    params: &Value,
) -> Result<Vec<SessionRollup>, HandlerErr> {
    match get_optional_str(params, "month") {
        Some(month) => Ok(attendance::filter_history_by_month(&all, &month)?),
        None => Ok(all),
    }
}

fn history(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let all = attendance::get_attendance_history(conn, &course_id)?;
    let months = attendance::history_months(&all);
    let sessions = select_month(all, params)?;
    let totals = attendance::history_totals(&sessions);
    Ok(json!({
        "sessions": sessions,
        "totals": totals,
        "months": months,
    }))
}

/// Either write the CSV to `outPath` or hand it back inline.
fn deliver_csv(params: &Value, export: CsvExport) -> Result<Value, HandlerErr> {
    match get_optional_str(params, "outPath") {
        Some(out_path) => {
            write_text_file(&out_path, &export.content)?;
            tracing::info!(path = %out_path, rows = export.rows, "csv written");
            Ok(json!({
                "contentType": CSV_CONTENT_TYPE,
                "path": out_path,
                "rowsExported": export.rows,
            }))
        }
        None => Ok(json!({
            "contentType": CSV_CONTENT_TYPE,
            "csv": String::from_utf8_lossy(&export.content),
            "rowsExported": export.rows,
        })),
    }
}

fn export_csv(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let export = attendance::export_attendance_csv(conn, &course_id)?;
    deliver_csv(params, export)
}

fn export_history_csv(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let all = attendance::get_attendance_history(conn, &course_id)?;
    let sessions = select_month(all, params)?;
    let export = attendance::export_history_csv(&sessions)?;
    deliver_csv(params, export)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.summary" => Some(with_db(state, req, summary)),
        "attendance.summaryByTeacher" => Some(with_db(state, req, summary_by_teacher)),
        "attendance.summaryAll" => Some(with_db(state, req, summary_all)),
        "attendance.courseDetails" => Some(with_db(state, req, course_details)),
        "attendance.weekly" => Some(with_db(state, req, weekly)),
        "attendance.history" => Some(with_db(state, req, history)),
        "attendance.exportCsv" => Some(with_db(state, req, export_csv)),
        "attendance.exportHistoryCsv" => Some(with_db(state, req, export_history_csv)),
        _ => None,
    }
}
