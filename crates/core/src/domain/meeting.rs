use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::deadline;
use crate::errors::DomainError;

/// Header metadata extracted from the opening segment of a transcript.
/// `time` is the meeting start in ISO format as produced by the extraction
/// capability; parsing into a timestamp happens at persistence time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicInfo {
    pub attendees: Vec<String>,
    pub time: String,
    pub subject: String,
    pub duration: String,
}

impl BasicInfo {
    /// Meeting start as a timestamp. The extraction prompt asks for ISO
    /// format; anything unparseable is a domain error, not a default.
    pub fn start_time(&self) -> Result<NaiveDateTime, DomainError> {
        deadline::parse_timestamp(self.time.trim())
            .ok_or_else(|| DomainError::InvalidMeetingTime(self.time.clone()))
    }

    /// Meeting length in minutes when `duration` carries a plain number.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.duration.trim().parse().ok()
    }
}

/// One agenda point and the conclusion reached on it. A conclusion may be an
/// empty string when the discussion genuinely ended without one, but the
/// field is never omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgendaConclusion {
    pub agenda: String,
    pub conclusion: String,
}

/// An action item as extracted. `deadline` is either an absolute
/// `YYYY-MM-DD HH:MM` style string (bare dates allowed) or the exact
/// unresolved sentinel; see [`crate::deadline`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TodoItem {
    pub owner: String,
    pub task: String,
    pub deadline: String,
}

/// An unresolved or contested point that needs work after the meeting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowUp {
    pub topic: String,
    pub reason: String,
}

/// Aggregate built transiently during one extraction session and persisted
/// atomically (meeting plus all children) or not at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub basic_info: BasicInfo,
    pub agendas: Vec<AgendaConclusion>,
    pub todos: Vec<TodoItem>,
    pub follow_ups: Vec<FollowUp>,
    pub raw_text: String,
    pub user_id: i64,
}
