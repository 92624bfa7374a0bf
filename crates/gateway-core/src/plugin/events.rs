//! The closed set of events plugins can observe, grounded in
//! `agent::events::AgentEventKind` (a tagged enum rather than the source's
//! untyped keyword arguments -- see spec.md §9 "Event bus payload typing").

use serde::{Deserialize, Serialize};

/// One of the events named in spec.md §4.6 as the minimum required set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventKind {
    PersonMessageReceived { sender_id: String, text: String },
    GroupMessageReceived { group_id: String, sender_id: String, text: String },
    NormalMessageResponded { session_id: String, reply_text: String },
    SessionFirstMessage { session_id: String },
    SessionExpired { session_id: String },
    SessionReset { session_id: String, reason: ResetReason },
    PromptPreProcess { session_id: String, prompt: String },
    StageBefore { stage: String },
    StageAfter { stage: String },
    UnhandledException { stage: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetReason {
    Expired,
    Explicit,
}

impl EventKind {
    /// Stable string identifier, e.g. for metrics or routing tables keyed
    /// by event name rather than the full payload.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PersonMessageReceived { .. } => "person_message_received",
            EventKind::GroupMessageReceived { .. } => "group_message_received",
            EventKind::NormalMessageResponded { .. } => "normal_message_responded",
            EventKind::SessionFirstMessage { .. } => "session.first_message",
            EventKind::SessionExpired { .. } => "session.expired",
            EventKind::SessionReset { .. } => "session.reset",
            EventKind::PromptPreProcess { .. } => "prompt.pre_process",
            EventKind::StageBefore { .. } => "stage.before",
            EventKind::StageAfter { .. } => "stage.after",
            EventKind::UnhandledException { .. } => "unhandled_exception",
        }
    }
}

/// A dispatched event plus whatever listeners wrote back.
///
/// `returns` accumulates listener output under a small closed set of keys
/// (e.g. `"reply"`) -- the core only reads well-known keys at well-defined
/// points (spec.md §3, `Event`).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub prevented_default: bool,
    pub returns: std::collections::HashMap<String, Vec<serde_json::Value>>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            prevented_default: false,
            returns: std::collections::HashMap::new(),
        }
    }

    pub fn add_return(&mut self, key: &str, value: serde_json::Value) {
        self.returns.entry(key.to_string()).or_default().push(value);
    }

    pub fn prevent_default(&mut self) {
        self.prevented_default = true;
    }

    /// Convenience accessor for the common `"reply"` key, used by the
    /// `person_message_received`/`group_message_received` handlers when a
    /// plugin wants to short-circuit the LLM call entirely.
    pub fn reply_strings(&self) -> Vec<String> {
        self.returns
            .get("reply")
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    }
}
