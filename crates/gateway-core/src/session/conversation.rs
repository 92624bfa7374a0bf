//! `Conversation` -- a prompt-bounded thread inside a session.

use crate::message::Message;

/// A single prompt-bounded thread with a message history.
///
/// Invariant: history is append-only within a conversation; truncation for
/// building an LLM request happens only in the runner and never mutates
/// stored history (spec.md §3).
#[derive(Clone)]
pub struct Conversation {
    /// System instructions, already expanded from the pipeline's prompt
    /// template at creation time.
    pub prompt: String,
    /// The default (un-customized) prompt, kept so a reset can restore it
    /// without re-expanding the template.
    pub default_prompt: String,
    pub history: Vec<Message>,
    /// Name of the `LLMModelInfo` selected for this conversation, frozen
    /// at creation time (spec.md §4.5).
    pub model: String,
    pub tool_set: Vec<String>,
    /// Set when this conversation is driven by an external-bridge runner
    /// that tracks its own upstream conversation identity.
    pub remote_conversation_id: Option<String>,
}

impl Conversation {
    pub fn new(prompt: String, model: String, tool_set: Vec<String>) -> Self {
        Self {
            default_prompt: prompt.clone(),
            prompt,
            history: Vec::new(),
            model,
            tool_set,
            remote_conversation_id: None,
        }
    }

    /// Append one turn. The only mutation method on `history` -- enforces
    /// the append-only invariant at the type level by not exposing a
    /// mutable accessor to the vector itself elsewhere in this crate.
    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Clear history and restore the default prompt; used by both
    /// explicit reset and expiry-driven reset (spec.md §4.3).
    pub fn reset(&mut self) {
        self.history.clear();
        self.prompt = self.default_prompt.clone();
    }

    /// Validate that history is a sequence of user/assistant pairs,
    /// optionally followed by tool blocks -- the open question spec.md §9
    /// resolves explicitly: before truncation, verify pairing and reset to
    /// the default prompt on failure rather than stepping blindly by two.
    pub fn validate_pairing(&self) -> bool {
        use crate::message::Role;
        let mut iter = self.history.iter().peekable();
        while let Some(msg) = iter.next() {
            match msg.role {
                Role::System => continue,
                Role::User => {
                    match iter.peek() {
                        Some(next) if next.role == Role::Assistant => {
                            iter.next();
                        }
                        _ => return false,
                    }
                }
                Role::Assistant => {
                    // An assistant turn may be followed by any number of
                    // tool-result turns (from a prior tool-call round) --
                    // skip them before the pairing check resumes.
                    while matches!(iter.peek().map(|m| m.role), Some(Role::Tool)) {
                        iter.next();
                    }
                }
                Role::Tool => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_well_formed_pairing() {
        let mut conv = Conversation::new("sys".into(), "m".into(), vec![]);
        conv.push(Message::user("hi"));
        conv.push(Message::assistant("hello"));
        assert!(conv.validate_pairing());
    }

    #[test]
    fn validates_pairing_with_tool_round_trip() {
        let mut conv = Conversation::new("sys".into(), "m".into(), vec![]);
        conv.push(Message::user("weather?"));
        conv.push(Message::assistant_tool_calls(vec![]));
        conv.push(Message::tool_result("call-1", "sunny"));
        conv.push(Message::assistant("It's sunny"));
        assert!(conv.validate_pairing());
    }

    #[test]
    fn rejects_dangling_user_turn() {
        let mut conv = Conversation::new("sys".into(), "m".into(), vec![]);
        conv.push(Message::user("hi"));
        assert!(!conv.validate_pairing());
    }

    #[test]
    fn reset_clears_history_and_restores_default_prompt() {
        let mut conv = Conversation::new("sys".into(), "m".into(), vec![]);
        conv.prompt = "customized".into();
        conv.push(Message::user("hi"));
        conv.reset();
        assert!(conv.history.is_empty());
        assert_eq!(conv.prompt, "sys");
    }
}
