//! Uniform error taxonomy for the pipeline.
//!
//! Every stage, the session manager, the plugin host, and the command
//! dispatcher report failures through `PipelineError`. Each variant carries
//! typed context rather than a bare string, and an optional `cause` chain
//! for logging.

use thiserror::Error;

/// A single error flowing through the pipeline.
///
/// `kind` groups the variant for routing/metrics purposes; the `Display`
/// impl is what a stage converts into a user-visible reply when no plugin
/// intercepts it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("adapter '{adapter}' failed: {reason}")]
    Adapter { adapter: String, reason: String },

    #[error("provider request failed ({code}): {message}")]
    Requester { code: String, message: String },

    #[error("tool '{tool}' failed: {reason}")]
    Tool { tool: String, reason: String },

    #[error("command error: {0}")]
    Command(#[from] crate::error::CommandError),

    #[error("plugin '{plugin}' raised an error: {reason}")]
    Plugin { plugin: String, reason: String },

    #[error("session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::Config(_) => PipelineErrorKind::Config,
            PipelineError::Adapter { .. } => PipelineErrorKind::Adapter,
            PipelineError::Requester { .. } => PipelineErrorKind::Requester,
            PipelineError::Tool { .. } => PipelineErrorKind::Tool,
            PipelineError::Command(_) => PipelineErrorKind::Command,
            PipelineError::Plugin { .. } => PipelineErrorKind::Plugin,
            PipelineError::Session(_) => PipelineErrorKind::Session,
            PipelineError::Internal(_) => PipelineErrorKind::Internal,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PipelineError::Internal(msg.into())
    }
}

/// The closed set of error kinds named in the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    Config,
    Adapter,
    Requester,
    Tool,
    Command,
    Plugin,
    Session,
    Internal,
}

/// Errors raised while parsing or authorizing a command invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    NotFound(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("unauthorized: requires {required:?}, caller has {actual:?}")]
    Unauthorized {
        required: crate::command::Privilege,
        actual: crate::command::Privilege,
    },

    #[error("bad arguments: {0}")]
    BadArguments(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        PipelineError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Internal(format!("serialization error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let e = PipelineError::Adapter {
            adapter: "qq".into(),
            reason: "timeout".into(),
        };
        assert_eq!(e.kind(), PipelineErrorKind::Adapter);
        assert!(e.to_string().contains("qq"));
    }

    #[test]
    fn session_error_converts() {
        let e: PipelineError = crate::session::SessionError::NotFound {
            launcher_type: crate::query::LauncherType::Person,
            launcher_id: "1001".into(),
        }
        .into();
        assert_eq!(e.kind(), PipelineErrorKind::Session);
    }
}
