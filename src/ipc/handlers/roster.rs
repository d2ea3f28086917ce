use crate::error::CoreError;
use crate::ipc::error::err;
use crate::ipc::helpers::{optional_str, required_str, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{collections, from_doc, Role, User};
use crate::store::{DocumentStore, Filter};
use serde_json::{json, Value};

fn parse_role(params: &Value) -> Result<Role, CoreError> {
    let raw = required_str(params, "role")?;
    serde_json::from_value(json!(raw))
        .map_err(|_| CoreError::validation("role", "expected admin, teacher or student"))
}

fn users_create(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let first_name = required_str(params, "firstName")?;
    let last_name = required_str(params, "lastName")?;
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(CoreError::validation("lastName", "name must not be empty"));
    }
    let role = parse_role(params)?;
    let group_id = optional_str(params, "groupId");

    let doc = store.create(
        collections::USERS,
        None,
        &json!({
            "firstName": first_name,
            "lastName": last_name,
            "role": role,
            "groupId": group_id,
            "active": true
        }),
    )?;
    let user: User = from_doc(collections::USERS, &doc)?;
    Ok(json!({ "user": to_json(&user) }))
}

fn users_list(store: &dyn DocumentStore, params: &Value) -> Result<Value, CoreError> {
    let mut filters = Vec::new();
    if let Some(role) = optional_str(params, "role") {
        filters.push(Filter::Eq("role", json!(role)));
    }
    if let Some(group_id) = optional_str(params, "groupId") {
        filters.push(Filter::Eq("groupId", json!(group_id)));
    }
    let docs = store.list(collections::USERS, &filters, Some("lastName"))?;
    let mut users = Vec::with_capacity(docs.len());
    for doc in &docs {
        let user: User = from_doc(collections::USERS, doc)?;
        users.push(to_json(&user));
    }
    Ok(json!({ "users": users }))
}

fn named_create(
    store: &dyn DocumentStore,
    collection: &'static str,
    params: &Value,
) -> Result<Value, CoreError> {
    let name = required_str(params, "name")?;
    if name.trim().is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    let doc = store.create(collection, None, &json!({ "name": name.trim() }))?;
    Ok(json!({ "id": doc.id, "name": name.trim() }))
}

fn named_list(
    store: &dyn DocumentStore,
    collection: &'static str,
    key: &str,
) -> Result<Value, CoreError> {
    let docs = store.list(collection, &[], Some("name"))?;
    let rows: Vec<Value> = docs
        .iter()
        .map(|d| json!({ "id": d.id, "name": d.fields.get("name").cloned().unwrap_or(Value::Null) }))
        .collect();
    Ok(json!({ key: rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handled = matches!(
        req.method.as_str(),
        "users.create" | "users.list" | "groups.create" | "groups.list" | "subjects.create"
            | "subjects.list"
    );
    if !handled {
        return None;
    }
    let Some(store) = state.store.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let result = match req.method.as_str() {
        "users.create" => users_create(store, &req.params),
        "users.list" => users_list(store, &req.params),
        "groups.create" => named_create(store, collections::GROUPS, &req.params),
        "groups.list" => named_list(store, collections::GROUPS, "groups"),
        "subjects.create" => named_create(store, collections::SUBJECTS, &req.params),
        "subjects.list" => named_list(store, collections::SUBJECTS, "subjects"),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
