use crate::model::RecurringSlot;
use crate::store::StoreError;
use serde_json::json;

/// Core-level failures. The IPC layer maps these onto wire error codes;
/// nothing in here knows about request ids or response framing.
#[derive(Debug)]
pub enum CoreError {
    /// Rejected before any store call; `field` names the offending input.
    Validation { field: &'static str, reason: String },
    /// A candidate recurring slot collides with existing active slots.
    /// Not a hard stop by itself; callers opt into blocking on it.
    Conflict { conflicts: Vec<RecurringSlot> },
    /// A referenced record is genuinely absent (broken reference).
    NotFound { what: &'static str, id: String },
    /// A stored document is missing required fields or has the wrong shape.
    BadRecord {
        collection: &'static str,
        id: String,
        reason: String,
    },
    Store(StoreError),
}

impl CoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "bad_params",
            CoreError::Conflict { .. } => "slot_conflict",
            CoreError::NotFound { .. } => "not_found",
            CoreError::BadRecord { .. } => "bad_record",
            CoreError::Store(_) => "store_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            CoreError::Validation { field, reason } => format!("{}: {}", field, reason),
            CoreError::Conflict { conflicts } => format!(
                "slot conflicts with {} existing slot(s)",
                conflicts.len()
            ),
            CoreError::NotFound { what, id } => format!("{} not found: {}", what, id),
            CoreError::BadRecord { collection, id, .. } => {
                format!("malformed {} record: {}", collection, id)
            }
            CoreError::Store(e) => e.to_string(),
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::Validation { field, .. } => Some(json!({ "field": field })),
            CoreError::Conflict { conflicts } => {
                serde_json::to_value(conflicts)
                    .ok()
                    .map(|c| json!({ "conflicts": c }))
            }
            CoreError::NotFound { id, .. } => Some(json!({ "id": id })),
            CoreError::BadRecord { id, reason, .. } => {
                Some(json!({ "id": id, "reason": reason }))
            }
            CoreError::Store(_) => None,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Store(e)
    }
}
