use crate::query::LauncherType;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("no session for launcher {launcher_type:?}/{launcher_id}")]
    NotFound {
        launcher_type: LauncherType,
        launcher_id: String,
    },

    #[error("session expired mid-query")]
    ExpiredMidQuery,

    #[error("session concurrency exhausted")]
    CapacityExhausted,

    #[error("conversation history is corrupted and failed prompt validation")]
    CorruptedHistory,
}
