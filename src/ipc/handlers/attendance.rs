use crate::attendance::{self, BulkEntry};
use crate::error::CoreError;
use crate::ipc::error::err;
use crate::ipc::helpers::{
    optional_date, optional_str, required_str, respond, session_ref, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::DocumentStore;
use serde_json::{json, Value};

fn bulk_mark(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let sref = session_ref(params)?;
    let marked_by = required_str(params, "markedBy")?;
    let entries_raw = params
        .get("entries")
        .cloned()
        .ok_or_else(|| CoreError::validation("entries", "missing"))?;
    let entries: Vec<BulkEntry> = serde_json::from_value(entries_raw)
        .map_err(|e| CoreError::validation("entries", e.to_string()))?;

    let (session, outcomes) = attendance::bulk_mark(store, &sref, &entries, &marked_by)?;
    Ok(json!({
        "sessionId": session.id,
        "results": outcomes.iter().map(|o| to_json(o)).collect::<Vec<_>>()
    }))
}

fn session_stats(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let session_id = required_str(params, "sessionId")?;
    let stats = attendance::stats_for_session(store, &session_id)?;
    Ok(to_json(&stats))
}

fn student_stats(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let student_id = required_str(params, "studentId")?;
    let from = optional_date(params, "from")?;
    let to = optional_date(params, "to")?;
    let subject_id = optional_str(params, "subjectId");
    let stats =
        attendance::stats_for_student(store, &student_id, from, to, subject_id.as_deref())?;
    Ok(to_json(&stats))
}

fn sheet(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let sref = session_ref(params)?;
    let (record, rows) = attendance::session_sheet(store, &sref)?;
    Ok(json!({
        "session": record.to_wire(),
        "rows": rows.iter().map(|r| to_json(r)).collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handled = matches!(
        req.method.as_str(),
        "attendance.bulkMark" | "attendance.sessionStats" | "attendance.studentStats"
            | "attendance.sheet"
    );
    if !handled {
        return None;
    }
    let Some(store) = state.store.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let result = match req.method.as_str() {
        "attendance.bulkMark" => bulk_mark(store, &req.params),
        "attendance.sessionStats" => session_stats(store, &req.params),
        "attendance.studentStats" => student_stats(store, &req.params),
        "attendance.sheet" => sheet(store, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
