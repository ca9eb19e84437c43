//! Response envelopes, written one per line to stdout.

use serde_json::{json, Map, Value};

pub fn ok(id: &str, result: Value) -> Value {
    json!({ "id": id, "ok": true, "result": result })
}

/// Failure envelope. `details` is left out entirely when there is nothing to add.
pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    json!({ "id": id, "ok": false, "error": error_body(code, message.into(), details) })
}

/// Reply to a line that did not parse as a request, so there is no id to echo.
pub fn bad_json(message: impl Into<String>) -> Value {
    json!({ "ok": false, "error": error_body("bad_json", message.into(), None) })
}

fn error_body(code: &str, message: String, details: Option<Value>) -> Value {
    let mut body = Map::new();
    body.insert("code".to_string(), Value::from(code));
    body.insert("message".to_string(), Value::from(message));
    if let Some(details) = details {
        body.insert("details".to_string(), details);
    }
    Value::Object(body)
}
