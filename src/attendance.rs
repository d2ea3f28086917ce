use crate::error::CoreError;
use crate::model::{
    collections, from_doc, AttendanceMark, AttendanceStatus, Session, SessionRecord, User,
};
use crate::sessions::{self, is_virtual_id, SessionRef};
use crate::store::{DocumentStore, Filter};
use crate::timeutil;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub rate: f64,
}

/// Rate counts late as attended; excused stays in the denominator only.
/// This is what "attendance rate" means to end users, so keep it exact.
fn stats_from_marks<'a, I>(marks: I) -> AttendanceStats
where
    I: IntoIterator<Item = &'a AttendanceMark>,
{
    let mut stats = AttendanceStats::default();
    for mark in marks {
        stats.total += 1;
        match mark.status {
            AttendanceStatus::Present => stats.present += 1,
            AttendanceStatus::Absent => stats.absent += 1,
            AttendanceStatus::Late => stats.late += 1,
            AttendanceStatus::Excused => stats.excused += 1,
        }
    }
    stats.rate = if stats.total > 0 {
        (stats.present + stats.late) as f64 / stats.total as f64 * 100.0
    } else {
        0.0
    };
    stats
}

fn marks_for_session(
    store: &dyn DocumentStore,
    session_id: &str,
) -> Result<Vec<AttendanceMark>, CoreError> {
    let docs = store.list(
        collections::ATTENDANCE_MARKS,
        &[Filter::Eq("sessionId", json!(session_id))],
        None,
    )?;
    docs.iter()
        .map(|doc| from_doc(collections::ATTENDANCE_MARKS, doc))
        .collect()
}

/// A virtual session id yields the empty stats: marks only ever attach to
/// persisted sessions, so "nothing marked yet" is the expected answer. A
/// non-virtual id must name a stored session; a broken reference is
/// `not_found`, not an empty aggregate.
pub fn stats_for_session(
    store: &dyn DocumentStore,
    session_id: &str,
) -> Result<AttendanceStats, CoreError> {
    if is_virtual_id(session_id) {
        return Ok(AttendanceStats::default());
    }
    let _ = sessions::get_session(store, session_id)?;
    let marks = marks_for_session(store, session_id)?;
    Ok(stats_from_marks(&marks))
}

/// Aggregates one student's marks, joined in memory against the sessions
/// collection for optional date-range (inclusive) and subject filtering.
pub fn stats_for_student(
    store: &dyn DocumentStore,
    student_id: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    subject_id: Option<&str>,
) -> Result<AttendanceStats, CoreError> {
    let docs = store.list(
        collections::ATTENDANCE_MARKS,
        &[Filter::Eq("studentId", json!(student_id))],
        None,
    )?;
    if docs.is_empty() {
        return Ok(AttendanceStats::default());
    }

    // The store has no joins; build the session map ourselves.
    let session_docs = store.list(collections::SESSIONS, &[], None)?;
    let mut sessions_by_id: HashMap<String, Session> = HashMap::new();
    for doc in &session_docs {
        let session: Session = from_doc(collections::SESSIONS, doc)?;
        sessions_by_id.insert(session.id.clone(), session);
    }

    let mut kept = Vec::new();
    for doc in &docs {
        let mark: AttendanceMark = from_doc(collections::ATTENDANCE_MARKS, doc)?;
        // Orphaned marks (session record gone) stay out of the statistics.
        let Some(session) = sessions_by_id.get(&mark.session_id) else {
            continue;
        };
        let Some(session_date) = timeutil::parse_date(&session.date) else {
            continue;
        };
        if let Some(from) = from {
            if session_date < from {
                continue;
            }
        }
        if let Some(to) = to {
            if session_date > to {
                continue;
            }
        }
        if let Some(subject_id) = subject_id {
            if session.subject_id != subject_id {
                continue;
            }
        }
        kept.push(mark);
    }
    Ok(stats_from_marks(&kept))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemOutcome {
    pub student_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn upsert_mark(
    store: &dyn DocumentStore,
    session_id: &str,
    entry: &BulkEntry,
    marked_by: &str,
) -> Result<AttendanceMark, CoreError> {
    if entry.student_id.trim().is_empty() {
        return Err(CoreError::validation("studentId", "must not be empty"));
    }
    if store.get(collections::USERS, &entry.student_id)?.is_none() {
        return Err(CoreError::not_found("student", &entry.student_id));
    }

    let marked_at = chrono::Utc::now().to_rfc3339();
    let existing = store.list(
        collections::ATTENDANCE_MARKS,
        &[
            Filter::Eq("sessionId", json!(session_id)),
            Filter::Eq("studentId", json!(entry.student_id)),
        ],
        None,
    )?;
    let doc = if let Some(doc) = existing.first() {
        store.update(
            collections::ATTENDANCE_MARKS,
            &doc.id,
            &json!({
                "status": entry.status,
                "notes": entry.notes.clone(),
                "markedAt": marked_at,
                "markedBy": marked_by,
            }),
        )?
    } else {
        store.create(
            collections::ATTENDANCE_MARKS,
            None,
            &json!({
                "sessionId": session_id,
                "studentId": entry.student_id,
                "status": entry.status,
                "notes": entry.notes.clone(),
                "markedAt": marked_at,
                "markedBy": marked_by,
            }),
        )?
    };
    from_doc(collections::ATTENDANCE_MARKS, &doc)
}

/// Persists the session if needed, then upserts one mark per entry keyed by
/// (session, student). The batch is a list of independent writes, not a
/// transaction: each entry reports its own outcome and a partial failure
/// leaves the earlier marks in place.
pub fn bulk_mark(
    store: &dyn DocumentStore,
    sref: &SessionRef,
    entries: &[BulkEntry],
    marked_by: &str,
) -> Result<(Session, Vec<BulkItemOutcome>), CoreError> {
    if marked_by.trim().is_empty() {
        return Err(CoreError::validation("markedBy", "must not be empty"));
    }
    let session = sessions::ensure_persisted(store, sref)?;

    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        match upsert_mark(store, &session.id, entry, marked_by) {
            Ok(mark) => outcomes.push(BulkItemOutcome {
                student_id: entry.student_id.clone(),
                ok: true,
                mark_id: Some(mark.id),
                error: None,
            }),
            Err(e) => outcomes.push(BulkItemOutcome {
                student_id: entry.student_id.clone(),
                ok: false,
                mark_id: None,
                error: Some(e.message()),
            }),
        }
    }
    Ok((session, outcomes))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub student_id: String,
    pub display_name: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AttendanceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Roster merge for one session: the session's group students with any
/// existing marks folded in. Read-only; a virtual occurrence stays virtual.
pub fn session_sheet(
    store: &dyn DocumentStore,
    sref: &SessionRef,
) -> Result<(SessionRecord, Vec<SheetRow>), CoreError> {
    let record = sessions::resolve_session(store, sref)?;
    let session = record.session();

    let user_docs = store.list(
        collections::USERS,
        &[
            Filter::Eq("groupId", json!(session.group_id)),
            Filter::Eq("role", json!("student")),
        ],
        Some("lastName"),
    )?;

    let mut marks_by_student: HashMap<String, AttendanceMark> = HashMap::new();
    if !record.is_virtual() {
        for mark in marks_for_session(store, &session.id)? {
            marks_by_student.insert(mark.student_id.clone(), mark);
        }
    }

    let mut rows = Vec::with_capacity(user_docs.len());
    for doc in &user_docs {
        let user: User = from_doc(collections::USERS, doc)?;
        let mark = marks_by_student.get(&user.id);
        rows.push(SheetRow {
            student_id: user.id.clone(),
            display_name: user.display_name(),
            active: user.active,
            status: mark.map(|m| m.status),
            notes: mark.and_then(|m| m.notes.clone()),
        });
    }
    Ok((record, rows))
}
