mod conversation;
mod error;
mod manager;
mod session;
mod store;

pub use conversation::Conversation;
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionRef, SessionStatus};
pub use store::{NullSessionStore, PersistedSession, PersistedStatus, SessionStore, StoreError};
