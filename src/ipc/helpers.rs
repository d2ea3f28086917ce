use crate::error::CoreError;
use crate::ipc::error::{core_err, ok};
use crate::sessions::SessionRef;
use crate::timeutil;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

pub fn respond(id: &str, result: Result<Value, CoreError>) -> Value {
    match result {
        Ok(r) => ok(id, r),
        Err(e) => core_err(id, &e),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

pub fn required_str(params: &Value, key: &'static str) -> Result<String, CoreError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CoreError::validation(key, "missing"))
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

pub fn optional_bool(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub fn required_date(params: &Value, key: &'static str) -> Result<NaiveDate, CoreError> {
    let raw = required_str(params, key)?;
    timeutil::parse_date(&raw).ok_or_else(|| CoreError::validation(key, "expected YYYY-MM-DD"))
}

pub fn optional_date(params: &Value, key: &'static str) -> Result<Option<NaiveDate>, CoreError> {
    match optional_str(params, key) {
        None => Ok(None),
        Some(raw) => timeutil::parse_date(&raw)
            .map(Some)
            .ok_or_else(|| CoreError::validation(key, "expected YYYY-MM-DD")),
    }
}

/// Write paths address a session by persisted id or by (slot, date)
/// occurrence; a virtual id alone is not resolvable.
pub fn session_ref(params: &Value) -> Result<SessionRef, CoreError> {
    if let Some(id) = optional_str(params, "sessionId") {
        return Ok(SessionRef::Id(id));
    }
    let slot_id = optional_str(params, "recurringSlotId");
    let date = optional_str(params, "date");
    match (slot_id, date) {
        (Some(recurring_slot_id), Some(date)) => Ok(SessionRef::Occurrence {
            recurring_slot_id,
            date,
        }),
        _ => Err(CoreError::validation(
            "sessionId",
            "pass sessionId, or recurringSlotId and date",
        )),
    }
}
