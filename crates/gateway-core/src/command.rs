//! Shared command-authority types.
//!
//! The dispatcher, registry and built-in commands live in `gateway-runner`
//! (behavior); the privilege model and the wire shape of a command's output
//! live here (data) so the pipeline's `Processor` stage and its error
//! taxonomy can refer to them without depending on the runner crate.

use serde::{Deserialize, Serialize};

/// Required privilege level to invoke a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Privilege {
    Everyone,
    GroupAdmin,
    BotAdmin,
}

/// One element of a command's asynchronous output sequence.
///
/// Each element assembled by the dispatcher becomes one entry appended to
/// `Query::resp_messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandReturn {
    pub text: Option<String>,
    pub error: Option<String>,
    pub image: Option<String>,
}

impl CommandReturn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
