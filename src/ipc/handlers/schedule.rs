use crate::error::CoreError;
use crate::ipc::error::err;
use crate::ipc::helpers::{optional_bool, optional_str, required_str, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::DayOfWeek;
use crate::schedule::{self, SlotInput};
use crate::store::DocumentStore;
use serde_json::{json, Value};

/// Slot fields may arrive nested under `slot` (or `candidate` for the
/// check-only path) or flat in params; both shapes are accepted.
fn slot_input(params: &Value) -> Result<SlotInput, CoreError> {
    let source = params
        .get("slot")
        .or_else(|| params.get("candidate"))
        .unwrap_or(params);
    serde_json::from_value(source.clone())
        .map_err(|e| CoreError::validation("slot", e.to_string()))
}

fn slots_create(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let input = slot_input(params)?;
    let force = optional_bool(params, "force", false);
    let (slot, report) = schedule::create_slot(store, &input, force)?;
    Ok(json!({ "slot": to_json(&slot), "conflicts": to_json(&report) }))
}

fn slots_update(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let slot_id = required_str(params, "slotId")?;
    let patch = params
        .get("patch")
        .cloned()
        .ok_or_else(|| CoreError::validation("patch", "missing"))?;
    if !patch.is_object() {
        return Err(CoreError::validation("patch", "must be an object"));
    }
    let force = optional_bool(params, "force", false);
    let (slot, report) = schedule::update_slot(store, &slot_id, &patch, force)?;
    Ok(json!({ "slot": to_json(&slot), "conflicts": to_json(&report) }))
}

fn slots_get(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let slot_id = required_str(params, "slotId")?;
    let slot = schedule::get_slot(store, &slot_id)?;
    Ok(json!({ "slot": to_json(&slot) }))
}

fn slots_list(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let teacher_id = optional_str(params, "teacherId");
    let group_id = optional_str(params, "groupId");
    let day_of_week: Option<DayOfWeek> = match optional_str(params, "dayOfWeek") {
        None => None,
        Some(raw) => Some(
            serde_json::from_value(json!(raw))
                .map_err(|_| CoreError::validation("dayOfWeek", "expected mon..sun"))?,
        ),
    };
    let include_inactive = optional_bool(params, "includeInactive", false);
    let slots = schedule::list_slots(
        store,
        teacher_id.as_deref(),
        group_id.as_deref(),
        day_of_week,
        include_inactive,
    )?;
    Ok(json!({ "slots": slots.iter().map(|s| to_json(s)).collect::<Vec<_>>() }))
}

fn slots_delete(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let slot_id = required_str(params, "slotId")?;
    let deactivated = schedule::delete_slot(store, &slot_id)?;
    Ok(json!({ "ok": true, "deactivated": deactivated }))
}

fn slots_check_conflict(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let input = slot_input(params)?;
    let exclude_id = optional_str(params, "excludeId");
    let candidate = schedule::candidate_from_input(&input)?;
    let report = schedule::check_conflict(store, &candidate, exclude_id.as_deref())?;
    Ok(to_json(&report))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handled = matches!(
        req.method.as_str(),
        "slots.create" | "slots.update" | "slots.get" | "slots.list" | "slots.delete"
            | "slots.checkConflict"
    );
    if !handled {
        return None;
    }
    let Some(store) = state.store.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let result = match req.method.as_str() {
        "slots.create" => slots_create(store, &req.params),
        "slots.update" => slots_update(store, &req.params),
        "slots.get" => slots_get(store, &req.params),
        "slots.list" => slots_list(store, &req.params),
        "slots.delete" => slots_delete(store, &req.params),
        "slots.checkConflict" => slots_check_conflict(store, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
