use crate::error::CoreError;
use crate::ipc::error::err;
use crate::ipc::helpers::{
    optional_bool, optional_str, required_date, required_str, respond, session_ref,
};
use crate::ipc::types::{AppState, Request};
use crate::model::SessionRecord;
use crate::sessions::{self, Owner};
use crate::store::DocumentStore;
use crate::timeutil;
use serde_json::{json, Value};

fn owner_from_params(params: &Value) -> Result<(String, bool), CoreError> {
    let teacher = optional_str(params, "teacherId");
    let group = optional_str(params, "groupId");
    match (teacher, group) {
        (Some(t), None) => Ok((t, true)),
        (None, Some(g)) => Ok((g, false)),
        _ => Err(CoreError::validation(
            "teacherId",
            "pass exactly one of teacherId or groupId",
        )),
    }
}

fn sessions_for_date(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let (owner_id, is_teacher) = owner_from_params(params)?;
    let date = required_date(params, "date")?;
    let owner = if is_teacher {
        Owner::Teacher(&owner_id)
    } else {
        Owner::Group(&owner_id)
    };
    let records = sessions::sessions_for_date(store, owner, date)?;
    Ok(json!({
        "date": timeutil::format_date(date),
        "sessions": records.iter().map(|r| r.to_wire()).collect::<Vec<_>>()
    }))
}

fn sessions_get(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let session_id = required_str(params, "sessionId")?;
    let session = sessions::get_session(store, &session_id)?;
    Ok(json!({ "session": SessionRecord::Persisted(session).to_wire() }))
}

fn sessions_update(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let sref = session_ref(params)?;
    let topic = optional_str(params, "topic");
    let notes = optional_str(params, "notes");
    let session =
        sessions::update_details(store, &sref, topic.as_deref(), notes.as_deref())?;
    Ok(json!({ "session": SessionRecord::Persisted(session).to_wire() }))
}

fn sessions_complete(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let sref = session_ref(params)?;
    let completed = optional_bool(params, "completed", true);
    let session = sessions::set_completed(store, &sref, completed)?;
    Ok(json!({ "session": SessionRecord::Persisted(session).to_wire() }))
}

fn sessions_cancel(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let sref = session_ref(params)?;
    let canceled = optional_bool(params, "canceled", true);
    let session = sessions::set_canceled(store, &sref, canceled)?;
    Ok(json!({ "session": SessionRecord::Persisted(session).to_wire() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handled = matches!(
        req.method.as_str(),
        "sessions.forDate" | "sessions.get" | "sessions.update" | "sessions.complete"
            | "sessions.cancel"
    );
    if !handled {
        return None;
    }
    let Some(store) = state.store.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let result = match req.method.as_str() {
        "sessions.forDate" => sessions_for_date(store, &req.params),
        "sessions.get" => sessions_get(store, &req.params),
        "sessions.update" => sessions_update(store, &req.params),
        "sessions.complete" => sessions_complete(store, &req.params),
        "sessions.cancel" => sessions_cancel(store, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
