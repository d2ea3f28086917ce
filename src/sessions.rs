use crate::error::CoreError;
use crate::model::{collections, from_doc, to_fields, RecurringSlot, Session, SessionRecord};
use crate::schedule;
use crate::store::{DocumentStore, Filter};
use crate::timeutil;
use chrono::NaiveDate;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const VIRTUAL_ID_PREFIX: &str = "v-";

pub fn is_virtual_id(id: &str) -> bool {
    id.starts_with(VIRTUAL_ID_PREFIX)
}

/// Stable identity for a not-yet-persisted occurrence: the same
/// (slot, date) pair always hashes to the same id, so repeated
/// materialization is idempotent and the UI can correlate across reads.
pub fn virtual_session_id(slot_id: &str, date: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(slot_id.as_bytes());
    hasher.update(b":");
    hasher.update(timeutil::format_date(date).as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!("{}{}", VIRTUAL_ID_PREFIX, &hex[..32])
}

/// Whose timetable is being asked for.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    Teacher(&'a str),
    Group(&'a str),
}

impl Owner<'_> {
    fn field(&self) -> &'static str {
        match self {
            Owner::Teacher(_) => "teacherId",
            Owner::Group(_) => "groupId",
        }
    }

    fn id(&self) -> &str {
        match self {
            Owner::Teacher(id) | Owner::Group(id) => id,
        }
    }
}

fn session_from_slot(slot: &RecurringSlot, date: &str, id: String) -> Session {
    Session {
        id,
        recurring_slot_id: slot.id.clone(),
        subject_id: slot.subject_id.clone(),
        group_id: slot.group_id.clone(),
        teacher_id: slot.teacher_id.clone(),
        date: date.to_string(),
        start_time: slot.start_time.clone(),
        end_time: slot.end_time.clone(),
        classroom: slot.classroom.clone(),
        topic: None,
        completed: false,
        canceled: false,
        notes: None,
    }
}

/// Read-only materialization: persisted sessions for the owner and exact
/// date win outright; otherwise active slots matching day-of-week and week
/// parity are synthesized as virtual sessions. An empty result is the
/// normal outcome for weekends and holidays.
pub fn sessions_for_date(
    store: &dyn DocumentStore,
    owner: Owner<'_>,
    date: NaiveDate,
) -> Result<Vec<SessionRecord>, CoreError> {
    let date_str = timeutil::format_date(date);

    let persisted = store.list(
        collections::SESSIONS,
        &[
            Filter::Eq(owner.field(), json!(owner.id())),
            Filter::Eq("date", json!(date_str)),
        ],
        Some("startTime"),
    )?;
    if !persisted.is_empty() {
        return persisted
            .iter()
            .map(|doc| Ok(SessionRecord::Persisted(from_doc(collections::SESSIONS, doc)?)))
            .collect();
    }

    let dow = timeutil::day_of_week(date);
    let odd = timeutil::is_odd_week(date);
    let docs = store.list(
        collections::RECURRING_SLOTS,
        &[
            Filter::Eq(owner.field(), json!(owner.id())),
            Filter::Eq("dayOfWeek", json!(dow)),
        ],
        Some("startTime"),
    )?;

    let mut out = Vec::new();
    for doc in &docs {
        let slot: RecurringSlot = from_doc(collections::RECURRING_SLOTS, doc)?;
        if !slot.active || !slot.week_parity.applies_on(odd) {
            continue;
        }
        let id = virtual_session_id(&slot.id, date);
        out.push(SessionRecord::Virtual(session_from_slot(
            &slot, &date_str, id,
        )));
    }
    out.sort_by(|a, b| a.session().start_time.cmp(&b.session().start_time));
    Ok(out)
}

/// How callers address a session on write paths: a persisted id, or the
/// (slot, date) occurrence when the session may still be virtual. Virtual
/// ids are hashes and cannot be resolved back to their occurrence.
#[derive(Debug, Clone)]
pub enum SessionRef {
    Id(String),
    Occurrence {
        recurring_slot_id: String,
        date: String,
    },
}

pub fn get_session(store: &dyn DocumentStore, id: &str) -> Result<Session, CoreError> {
    let doc = store
        .get(collections::SESSIONS, id)?
        .ok_or_else(|| CoreError::not_found("session", id))?;
    from_doc(collections::SESSIONS, &doc)
}

/// Resolves a reference without writing: persisted record when one exists,
/// virtual synthesis otherwise.
pub fn resolve_session(
    store: &dyn DocumentStore,
    sref: &SessionRef,
) -> Result<SessionRecord, CoreError> {
    match sref {
        SessionRef::Id(id) => {
            if is_virtual_id(id) {
                return Err(CoreError::validation(
                    "sessionId",
                    "virtual session ids cannot be resolved; pass recurringSlotId and date",
                ));
            }
            Ok(SessionRecord::Persisted(get_session(store, id)?))
        }
        SessionRef::Occurrence {
            recurring_slot_id,
            date,
        } => {
            let parsed = timeutil::parse_date(date)
                .ok_or_else(|| CoreError::validation("date", "expected YYYY-MM-DD"))?;
            let date_str = timeutil::format_date(parsed);
            if let Some(doc) = find_occurrence(store, recurring_slot_id, &date_str)? {
                return Ok(SessionRecord::Persisted(from_doc(
                    collections::SESSIONS,
                    &doc,
                )?));
            }
            let slot = schedule::get_slot(store, recurring_slot_id)?;
            let id = virtual_session_id(&slot.id, parsed);
            Ok(SessionRecord::Virtual(session_from_slot(
                &slot, &date_str, id,
            )))
        }
    }
}

fn find_occurrence(
    store: &dyn DocumentStore,
    slot_id: &str,
    date: &str,
) -> Result<Option<crate::store::Document>, CoreError> {
    let existing = store.list(
        collections::SESSIONS,
        &[
            Filter::Eq("recurringSlotId", json!(slot_id)),
            Filter::Eq("date", json!(date)),
        ],
        None,
    )?;
    Ok(existing.into_iter().next())
}

/// Materialize-on-write: first interaction with a virtual occurrence turns
/// it into a stored record with a store-assigned id. At most one persisted
/// session exists per (slot, date); an existing record is returned as-is.
pub fn ensure_persisted(
    store: &dyn DocumentStore,
    sref: &SessionRef,
) -> Result<Session, CoreError> {
    match resolve_session(store, sref)? {
        SessionRecord::Persisted(session) => Ok(session),
        SessionRecord::Virtual(session) => {
            let doc = store.create(collections::SESSIONS, None, &to_fields(&session))?;
            from_doc(collections::SESSIONS, &doc)
        }
    }
}

pub fn set_canceled(
    store: &dyn DocumentStore,
    sref: &SessionRef,
    canceled: bool,
) -> Result<Session, CoreError> {
    let session = ensure_persisted(store, sref)?;
    let doc = store.update(
        collections::SESSIONS,
        &session.id,
        &json!({ "canceled": canceled }),
    )?;
    from_doc(collections::SESSIONS, &doc)
}

pub fn set_completed(
    store: &dyn DocumentStore,
    sref: &SessionRef,
    completed: bool,
) -> Result<Session, CoreError> {
    let session = ensure_persisted(store, sref)?;
    let doc = store.update(
        collections::SESSIONS,
        &session.id,
        &json!({ "completed": completed }),
    )?;
    from_doc(collections::SESSIONS, &doc)
}

/// An update carrying neither topic nor notes is rejected up front so a
/// no-op request does not persist a virtual occurrence.
pub fn update_details(
    store: &dyn DocumentStore,
    sref: &SessionRef,
    topic: Option<&str>,
    notes: Option<&str>,
) -> Result<Session, CoreError> {
    let mut patch = serde_json::Map::new();
    if let Some(t) = topic {
        patch.insert("topic".to_string(), json!(t));
    }
    if let Some(n) = notes {
        patch.insert("notes".to_string(), json!(n));
    }
    if patch.is_empty() {
        return Err(CoreError::validation("topic", "pass topic or notes"));
    }
    let session = ensure_persisted(store, sref)?;
    let doc = store.update(collections::SESSIONS, &session.id, &Value::Object(patch))?;
    from_doc(collections::SESSIONS, &doc)
}
