use crate::error::CoreError;
use crate::model::{collections, from_doc, to_fields, DayOfWeek, RecurringSlot, WeekParity};
use crate::store::{DocumentStore, Filter};
use crate::timeutil;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Slots shorter than this are rejected on validated paths.
pub const MIN_SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInput {
    pub subject_id: String,
    pub group_id: String,
    pub teacher_id: String,
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub classroom: String,
    #[serde(default = "default_parity")]
    pub week_parity: WeekParity,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_parity() -> WeekParity {
    WeekParity::All
}

fn default_active() -> bool {
    true
}

/// Day + time window + the three contended resources. Built from either a
/// recurring slot or an ad-hoc session candidate.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub day_of_week: DayOfWeek,
    pub start_min: u32,
    pub end_min: u32,
    pub group_id: &'a str,
    pub teacher_id: &'a str,
    pub classroom: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicts: Vec<RecurringSlot>,
}

fn require_ref(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "missing required reference id"));
    }
    Ok(())
}

/// Parses and orders the time pair; returns (start, end) in minutes.
pub fn validate_slot_times(start: &str, end: &str) -> Result<(u32, u32), CoreError> {
    let s = timeutil::parse_time(start)
        .ok_or_else(|| CoreError::validation("startTime", "expected HH:MM"))?;
    let e = timeutil::parse_time(end)
        .ok_or_else(|| CoreError::validation("endTime", "expected HH:MM"))?;
    let (s, e) = (timeutil::to_minutes(s), timeutil::to_minutes(e));
    if e <= s {
        return Err(CoreError::validation(
            "endTime",
            "endTime must be after startTime",
        ));
    }
    if e - s < MIN_SLOT_MINUTES {
        return Err(CoreError::validation(
            "endTime",
            format!("slot must be at least {} minutes", MIN_SLOT_MINUTES),
        ));
    }
    Ok((s, e))
}

pub fn validate_slot(input: &SlotInput) -> Result<(), CoreError> {
    require_ref("subjectId", &input.subject_id)?;
    require_ref("groupId", &input.group_id)?;
    require_ref("teacherId", &input.teacher_id)?;
    if input.classroom.trim().is_empty() {
        return Err(CoreError::validation("classroom", "must not be empty"));
    }
    validate_slot_times(&input.start_time, &input.end_time)?;
    Ok(())
}

pub fn candidate_from_input(input: &SlotInput) -> Result<Candidate<'_>, CoreError> {
    let (start_min, end_min) = validate_slot_times(&input.start_time, &input.end_time)?;
    Ok(Candidate {
        day_of_week: input.day_of_week,
        start_min,
        end_min,
        group_id: &input.group_id,
        teacher_id: &input.teacher_id,
        classroom: &input.classroom,
    })
}

/// Scans active slots on the candidate's day and reports every
/// time-overlapping slot that shares a group, teacher or classroom.
///
/// Week parity never narrows the result: an odd and an even slot at the same
/// day/time/resource are still reported. Only recurring slots are consulted,
/// never materialized sessions. Two concurrent creates can both pass this
/// check; the store has no transactions to close that race.
pub fn check_conflict(
    store: &dyn DocumentStore,
    candidate: &Candidate<'_>,
    exclude_id: Option<&str>,
) -> Result<ConflictReport, CoreError> {
    let docs = store.list(
        collections::RECURRING_SLOTS,
        &[Filter::Eq("dayOfWeek", json!(candidate.day_of_week))],
        Some("startTime"),
    )?;

    let mut conflicts = Vec::new();
    for doc in &docs {
        if exclude_id == Some(doc.id.as_str()) {
            continue;
        }
        let slot: RecurringSlot = from_doc(collections::RECURRING_SLOTS, doc)?;
        if !slot.active {
            continue;
        }
        let (Some(s), Some(e)) = (
            timeutil::parse_time(&slot.start_time),
            timeutil::parse_time(&slot.end_time),
        ) else {
            continue;
        };
        let (s, e) = (timeutil::to_minutes(s), timeutil::to_minutes(e));
        if !timeutil::ranges_overlap(candidate.start_min, candidate.end_min, s, e) {
            continue;
        }
        let shares_resource = slot.group_id == candidate.group_id
            || slot.teacher_id == candidate.teacher_id
            || slot.classroom == candidate.classroom;
        if shares_resource {
            conflicts.push(slot);
        }
    }
    Ok(ConflictReport {
        has_conflict: !conflicts.is_empty(),
        conflicts,
    })
}

/// Validates, checks conflicts, creates. With `force` the slot is created
/// anyway and the report is returned as a warning.
pub fn create_slot(
    store: &dyn DocumentStore,
    input: &SlotInput,
    force: bool,
) -> Result<(RecurringSlot, ConflictReport), CoreError> {
    validate_slot(input)?;
    let report = check_conflict(store, &candidate_from_input(input)?, None)?;
    if report.has_conflict && !force {
        return Err(CoreError::Conflict {
            conflicts: report.conflicts,
        });
    }
    let doc = store.create(collections::RECURRING_SLOTS, None, &to_fields(input))?;
    let slot = from_doc(collections::RECURRING_SLOTS, &doc)?;
    Ok((slot, report))
}

pub fn get_slot(store: &dyn DocumentStore, id: &str) -> Result<RecurringSlot, CoreError> {
    let doc = store
        .get(collections::RECURRING_SLOTS, id)?
        .ok_or_else(|| CoreError::not_found("recurring slot", id))?;
    from_doc(collections::RECURRING_SLOTS, &doc)
}

/// Merges a field patch over the existing slot, re-validates the result as a
/// whole and re-checks conflicts with the edited slot excluded.
pub fn update_slot(
    store: &dyn DocumentStore,
    id: &str,
    patch: &Value,
    force: bool,
) -> Result<(RecurringSlot, ConflictReport), CoreError> {
    let existing = get_slot(store, id)?;

    let mut fields = to_fields(&existing);
    if let (Value::Object(base), Value::Object(p)) = (&mut fields, patch) {
        for (k, v) in p {
            base.insert(k.clone(), v.clone());
        }
        base.remove("id");
    }
    let merged: SlotInput = serde_json::from_value(fields.clone())
        .map_err(|e| CoreError::validation("patch", e.to_string()))?;
    validate_slot(&merged)?;

    let report = check_conflict(store, &candidate_from_input(&merged)?, Some(id))?;
    if report.has_conflict && !force {
        return Err(CoreError::Conflict {
            conflicts: report.conflicts,
        });
    }
    let doc = store.update(collections::RECURRING_SLOTS, id, &fields)?;
    Ok((from_doc(collections::RECURRING_SLOTS, &doc)?, report))
}

pub fn list_slots(
    store: &dyn DocumentStore,
    teacher_id: Option<&str>,
    group_id: Option<&str>,
    day_of_week: Option<DayOfWeek>,
    include_inactive: bool,
) -> Result<Vec<RecurringSlot>, CoreError> {
    let mut filters = Vec::new();
    if let Some(t) = teacher_id {
        filters.push(Filter::Eq("teacherId", json!(t)));
    }
    if let Some(g) = group_id {
        filters.push(Filter::Eq("groupId", json!(g)));
    }
    if let Some(d) = day_of_week {
        filters.push(Filter::Eq("dayOfWeek", json!(d)));
    }
    let docs = store.list(collections::RECURRING_SLOTS, &filters, Some("startTime"))?;
    let mut slots = Vec::new();
    for doc in &docs {
        let slot: RecurringSlot = from_doc(collections::RECURRING_SLOTS, doc)?;
        if include_inactive || slot.active {
            slots.push(slot);
        }
    }
    Ok(slots)
}

/// Soft-deletes (active=false) when any persisted session references the
/// slot, preserving historical provenance; hard-deletes otherwise. Returns
/// true when the slot was deactivated rather than removed.
pub fn delete_slot(store: &dyn DocumentStore, id: &str) -> Result<bool, CoreError> {
    let _ = get_slot(store, id)?;
    let sessions = store.list(
        collections::SESSIONS,
        &[Filter::Eq("recurringSlotId", json!(id))],
        None,
    )?;
    if sessions.is_empty() {
        store.delete(collections::RECURRING_SLOTS, id)?;
        Ok(false)
    } else {
        store.update(
            collections::RECURRING_SLOTS,
            id,
            &json!({ "active": false }),
        )?;
        Ok(true)
    }
}
