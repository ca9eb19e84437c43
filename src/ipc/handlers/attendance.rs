use crate::attendance::{self, BatchPolicy, SaveAttendance};
use crate::ipc::helpers::{get_optional_str, get_required_str, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::{json, Value};

fn status_token(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `records` arrives either as `{studentId: status}` or as
/// `[{"studentId": .., "status": ..}]`. Both keep submission order.
fn parse_records(params: &Value) -> Result<Vec<(String, String)>, HandlerErr> {
    match params.get("records") {
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(sid, status)| (sid.clone(), status_token(status)))
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let sid = item
                    .get("studentId")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        HandlerErr::bad_params(format!("records[{i}].studentId must be a string"))
                    })?;
                let status = item.get("status").map(status_token).unwrap_or_default();
                Ok((sid.to_string(), status))
            })
            .collect(),
        Some(_) => Err(HandlerErr::bad_params(
            "records must be an object or an array",
        )),
        None => Err(HandlerErr::bad_params("missing records")),
    }
}

fn session_by_date(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let date = get_required_str(params, "date")?;
    let session = attendance::get_session_by_date(conn, &course_id, &date)?;
    Ok(json!({ "session": session }))
}

fn session_status(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let date = get_required_str(params, "date")?;
    let status = attendance::session_status(conn, &course_id, &date, Utc::now())?;
    Ok(json!({ "state": status.state, "session": status.session }))
}

fn is_editable(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let editable = attendance::is_session_editable(conn, &session_id, Utc::now());
    Ok(json!({ "editable": editable }))
}

fn save(
    conn: &mut Connection,
    params: &Value,
    default_policy: BatchPolicy,
) -> Result<Value, HandlerErr> {
    let policy = match get_optional_str(params, "policy") {
        Some(p) => p.parse::<BatchPolicy>()?,
        None => default_policy,
    };
    let input = SaveAttendance {
        course_id: get_required_str(params, "courseId")?,
        teacher_id: get_required_str(params, "teacherId")?,
        date: get_required_str(params, "date")?,
        topic: get_required_str(params, "topic")?,
        statuses: parse_records(params)?,
    };
    let saved = attendance::save_attendance(conn, input, policy, Utc::now())?;
    Ok(json!({
        "session": saved.session,
        "recordsSaved": saved.records_saved,
        "dropped": saved.dropped,
    }))
}

fn session_records(conn: &mut Connection, params: &Value) -> Result<Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let records = attendance::list_session_records(conn, &session_id)?;
    Ok(json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.sessionByDate" => Some(with_db(state, req, session_by_date)),
        "attendance.sessionStatus" => Some(with_db(state, req, session_status)),
        "attendance.isEditable" => Some(with_db(state, req, is_editable)),
        "attendance.save" => {
            let default_policy = state.default_policy;
            Some(with_db(state, req, |conn, params| {
                save(conn, params, default_policy)
            }))
        }
        "attendance.sessionRecords" => Some(with_db(state, req, session_records)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_and_array_records() {
        let obj = json!({ "records": { "s1": "presente", "s2": "falta" } });
        let parsed = parse_records(&obj).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&("s1".to_string(), "presente".to_string())));

        let arr = json!({ "records": [
            { "studentId": "s1", "status": "tardanza" },
            { "studentId": "s1", "status": "falta" }
        ]});
        assert_eq!(
            parse_records(&arr).unwrap(),
            vec![
                ("s1".to_string(), "tardanza".to_string()),
                ("s1".to_string(), "falta".to_string())
            ]
        );
    }

    #[test]
    fn object_records_keep_submission_order() {
        let params: Value = serde_json::from_str(
            r#"{"records": {"zz-student": "presente", "aa-student": "falta", "mm-student": "tardanza"}}"#,
        )
        .unwrap();
        let ids: Vec<String> = parse_records(&params)
            .unwrap()
            .into_iter()
            .map(|(sid, _)| sid)
            .collect();
        assert_eq!(ids, vec!["zz-student", "aa-student", "mm-student"]);
    }

    #[test]
    fn non_string_status_is_kept_for_validation() {
        let arr = json!({ "records": [{ "studentId": "s1", "status": 3 }] });
        assert_eq!(
            parse_records(&arr).unwrap(),
            vec![("s1".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn rejects_missing_or_scalar_records() {
        assert_eq!(parse_records(&json!({})).err().unwrap().code, "bad_params");
        assert_eq!(
            parse_records(&json!({ "records": "presente" }))
                .err()
                .unwrap()
                .code,
            "bad_params"
        );
    }
}
