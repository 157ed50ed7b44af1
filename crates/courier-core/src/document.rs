//! The persisted document model — recipients, templates, schedule
//! records, message history, and aggregate stats. One JSON document
//! holds all of it; every mutation rewrites the whole document.

use serde::{Deserialize, Serialize};

/// The whole persisted state of the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default, rename = "message_templates")]
    pub templates: Vec<Template>,
    #[serde(default, rename = "scheduled_messages")]
    pub schedules: Vec<ScheduleRecord>,
    #[serde(default, rename = "message_history")]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub stats: Stats,
}

/// Someone we send messages to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Unique id within the document.
    pub id: String,
    pub name: String,
    /// Digit-only phone number.
    pub phone: String,
}

/// A message template with `{name}`-style placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    /// Unique case-insensitively.
    pub name: String,
    pub content: String,
}

/// When and what to send to whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ScheduleKind,
    /// Local wall-clock time, "HH:MM".
    pub time: String,
    /// "YYYY-MM-DD" — one-time schedules only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Weekday name (weekly) or day-of-month (monthly).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<ScheduleDay>,
    pub recipient_id: String,
    pub template_id: String,
    /// Inactive records are kept but never re-armed.
    #[serde(default = "bool_true")]
    pub active: bool,
}

fn bool_true() -> bool {
    true
}

/// Schedule cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    OneTime,
    Daily,
    Weekly,
    Monthly,
}

/// The `day` field carries a weekday name for weekly schedules and a
/// day-of-month number for monthly ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleDay {
    DayOfMonth(u32),
    Weekday(String),
}

/// One attempted send, appended to the history after every dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Recipient display name at send time.
    pub recipient: String,
    pub message: String,
    pub status: SendStatus,
    /// "YYYY-MM-DD HH:MM:SS", local time.
    pub timestamp: String,
}

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Success,
    Error,
}

/// Aggregate send counters. Monotonic — the recorder only increments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
    /// Persisted for document compatibility; the dispatch path never
    /// touches it. Live armed-trigger counts come from the engine.
    #[serde(default)]
    pub pending: u64,
}

impl Document {
    pub fn recipient_by_id(&self, id: &str) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.id == id)
    }

    pub fn template_by_id(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn has_phone(&self, phone: &str) -> bool {
        self.recipients.iter().any(|r| r.phone == phone)
    }

    pub fn has_template_name(&self, name: &str) -> bool {
        self.templates
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Next id for a collection: length + 1, stringified.
    pub fn next_id(len: usize) -> String {
        (len + 1).to_string()
    }
}
