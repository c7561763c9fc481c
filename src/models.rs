use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of moods a student can pick. Parsing is exact-match:
/// case variants and padded strings are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Neutral,
    Normal,
    Stressed,
    Sleepy,
}

impl Emotion {
    pub const ALL: [Emotion; 5] = [
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Normal,
        Emotion::Stressed,
        Emotion::Sleepy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Normal => "normal",
            Emotion::Stressed => "stressed",
            Emotion::Sleepy => "sleepy",
        }
    }

    pub fn parse(raw: &str) -> Option<Emotion> {
        match raw {
            "happy" => Some(Emotion::Happy),
            "neutral" => Some(Emotion::Neutral),
            "normal" => Some(Emotion::Normal),
            "stressed" => Some(Emotion::Stressed),
            "sleepy" => Some(Emotion::Sleepy),
            _ => None,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored check-in. Immutable once written; the timestamp is assigned
/// by the database.
#[derive(Debug, Clone, Serialize)]
pub struct CheckinRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub emotion: Emotion,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A validated submission, ready to insert.
#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub student_id: Uuid,
    pub emotion: Emotion,
    pub note: Option<String>,
}

/// Student identity joined to the owning class, as needed for alert
/// messages.
#[derive(Debug, Clone)]
pub struct StudentContext {
    pub student_name: String,
    pub class_name: String,
}

#[derive(Debug, Clone)]
pub struct ClassRef {
    pub id: Uuid,
    pub name: String,
}

/// One of today's check-ins for a class, joined with the student's name
/// for dashboard display.
#[derive(Debug, Clone, Serialize)]
pub struct ClassCheckin {
    pub student_id: Uuid,
    pub student_name: String,
    pub emotion: Emotion,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

/// The transient result of one detection pass. Lives only for the
/// duration of the evaluation; never persisted.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub student_id: Uuid,
    pub pattern: Emotion,
    pub priority: Priority,
    pub label: &'static str,
    pub window: Vec<CheckinRecord>,
}
