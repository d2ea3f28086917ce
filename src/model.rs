use crate::error::CoreError;
use crate::store::Document;
use chrono::Weekday;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod collections {
    pub const USERS: &str = "users";
    pub const GROUPS: &str = "groups";
    pub const SUBJECTS: &str = "subjects";
    pub const RECURRING_SLOTS: &str = "recurring_slots";
    pub const SESSIONS: &str = "sessions";
    pub const ATTENDANCE_MARKS: &str = "attendance_marks";
}

/// Monday-first weekday enum used on the wire ("mon".."sun").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn from_weekday(w: Weekday) -> Self {
        match w {
            Weekday::Mon => DayOfWeek::Mon,
            Weekday::Tue => DayOfWeek::Tue,
            Weekday::Wed => DayOfWeek::Wed,
            Weekday::Thu => DayOfWeek::Thu,
            Weekday::Fri => DayOfWeek::Fri,
            Weekday::Sat => DayOfWeek::Sat,
            Weekday::Sun => DayOfWeek::Sun,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Mon => "mon",
            DayOfWeek::Tue => "tue",
            DayOfWeek::Wed => "wed",
            DayOfWeek::Thu => "thu",
            DayOfWeek::Fri => "fri",
            DayOfWeek::Sat => "sat",
            DayOfWeek::Sun => "sun",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekParity {
    All,
    Odd,
    Even,
}

impl WeekParity {
    /// Whether a slot with this parity runs during a week classified odd/even.
    pub fn applies_on(&self, odd_week: bool) -> bool {
        match self {
            WeekParity::All => true,
            WeekParity::Odd => odd_week,
            WeekParity::Even => !odd_week,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringSlot {
    pub id: String,
    pub subject_id: String,
    pub group_id: String,
    pub teacher_id: String,
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub classroom: String,
    pub week_parity: WeekParity,
    pub active: bool,
}

/// One dated occurrence of a recurring slot. Whether it is virtual or
/// persisted is carried by `SessionRecord`, not duplicated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub recurring_slot_id: String,
    pub subject_id: String,
    pub group_id: String,
    pub teacher_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub classroom: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Tagged virtual-vs-persisted variant so callers can match exhaustively
/// instead of sniffing the id prefix.
#[derive(Debug, Clone)]
pub enum SessionRecord {
    Virtual(Session),
    Persisted(Session),
}

impl SessionRecord {
    pub fn session(&self) -> &Session {
        match self {
            SessionRecord::Virtual(s) | SessionRecord::Persisted(s) => s,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, SessionRecord::Virtual(_))
    }

    /// Wire shape: the flat session plus a `virtual` flag. The id prefix
    /// convention already distinguishes the two, the flag just saves
    /// callers the string check.
    pub fn to_wire(&self) -> Value {
        let mut v = match serde_json::to_value(self.session()) {
            Ok(v) => v,
            Err(_) => return Value::Null,
        };
        if let Value::Object(map) = &mut v {
            map.insert("virtual".to_string(), Value::Bool(self.is_virtual()));
        }
        v
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub marked_at: String,
    pub marked_by: String,
}

fn default_true() -> bool {
    true
}

/// Maps a loosely-typed store document into a strict domain type, failing
/// fast on missing or malformed required fields.
pub fn from_doc<T: DeserializeOwned>(
    collection: &'static str,
    doc: &Document,
) -> Result<T, CoreError> {
    let mut fields = doc.fields.clone();
    if let Value::Object(map) = &mut fields {
        map.insert("id".to_string(), Value::String(doc.id.clone()));
    }
    serde_json::from_value(fields).map_err(|e| CoreError::BadRecord {
        collection,
        id: doc.id.clone(),
        reason: e.to_string(),
    })
}

/// Serializes a domain value into store fields, dropping the id (the store
/// keys documents by id separately).
pub fn to_fields<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut map)) => {
            map.remove("id");
            Value::Object(map)
        }
        Ok(other) => other,
        Err(_) => Value::Null,
    }
}
