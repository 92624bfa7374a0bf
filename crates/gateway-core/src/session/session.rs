//! `Session` -- per-launcher state, keyed uniquely by
//! `(launcher_type, launcher_id)`.

use crate::query::Launcher;
use crate::session::conversation::Conversation;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Persisted session status, matching the shape named in spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    OnGoing,
    ExplicitlyClosed,
    Expired,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

struct SessionInner {
    conversations: Vec<Conversation>,
    using: Option<usize>,
    status: SessionStatus,
}

/// Long-lived per-launcher state holding one or more conversations.
///
/// The concurrency semaphore is read from config at creation and lives for
/// the session's lifetime; the pipeline acquires one permit for the
/// duration of a query, which both caps per-launcher parallelism and (at
/// the common default of one permit) preserves reply ordering.
pub struct Session {
    pub launcher: Launcher,
    pub create_ts: i64,
    last_interact_ts: AtomicI64,
    semaphore: Arc<Semaphore>,
    permits: usize,
    inner: Mutex<SessionInner>,
}

pub type SessionRef = Arc<Session>;

impl Session {
    pub fn new(launcher: Launcher, permits: usize) -> Self {
        let now = now_unix();
        Self {
            launcher,
            create_ts: now,
            last_interact_ts: AtomicI64::new(now),
            semaphore: Arc::new(Semaphore::new(permits)),
            permits,
            inner: Mutex::new(SessionInner {
                conversations: Vec::new(),
                using: None,
                status: SessionStatus::OnGoing,
            }),
        }
    }

    pub fn last_interact_ts(&self) -> i64 {
        self.last_interact_ts.load(Ordering::Relaxed)
    }

    pub fn touch(&self) {
        self.last_interact_ts.store(now_unix(), Ordering::Relaxed);
    }

    pub fn is_expired(&self, expire_secs: u64) -> bool {
        now_unix() - self.last_interact_ts() > expire_secs as i64
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    pub fn set_status(&self, status: SessionStatus) {
        self.inner.lock().status = status;
    }

    /// Acquire one concurrency permit for the lifetime of a query. The
    /// permit is owned rather than borrowed from `&self` so it can be
    /// stashed on the `Query` that is carrying an `Arc<Session>` around,
    /// and held across the full pipeline dispatch; dropping it (including
    /// on cancellation) always releases it -- the scoped-acquisition
    /// pattern named in spec.md §9.
    pub async fn acquire_owned(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("session semaphore is never closed while the session is live")
    }

    /// Permits currently available; used by the cancellation-leakproofness
    /// test (spec.md §8) to observe that the count returns to `permits`.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn configured_permits(&self) -> usize {
        self.permits
    }

    /// The conversation currently in use, if any.
    pub fn with_using<R>(&self, f: impl FnOnce(Option<&Conversation>) -> R) -> R {
        let inner = self.inner.lock();
        f(inner.using.and_then(|i| inner.conversations.get(i)))
    }

    pub fn with_using_mut<R>(&self, f: impl FnOnce(Option<&mut Conversation>) -> R) -> R {
        let mut inner = self.inner.lock();
        let using = inner.using;
        f(using.and_then(move |i| inner.conversations.get_mut(i)))
    }

    /// Make `conversation` the "using" one, appending it if it isn't
    /// already tracked. Returns its index.
    pub fn push_and_use(&self, conversation: Conversation) -> usize {
        let mut inner = self.inner.lock();
        inner.conversations.push(conversation);
        let idx = inner.conversations.len() - 1;
        inner.using = Some(idx);
        idx
    }

    pub fn has_conversation(&self) -> bool {
        let inner = self.inner.lock();
        inner.using.is_some()
    }

    pub fn conversation_count(&self) -> usize {
        self.inner.lock().conversations.len()
    }

    /// Switch the "using" pointer to `index`, preserving both
    /// conversations (neither is dropped or cleared).
    pub fn switch_to(&self, index: usize) -> bool {
        let mut inner = self.inner.lock();
        if index < inner.conversations.len() {
            inner.using = Some(index);
            true
        } else {
            false
        }
    }

    pub fn reset_using(&self) {
        self.with_using_mut(|conv| {
            if let Some(c) = conv {
                c.reset();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::LauncherType;

    fn launcher() -> Launcher {
        Launcher::new(LauncherType::Person, "1001")
    }

    #[tokio::test]
    async fn acquiring_and_releasing_restores_permit_count() {
        let session = Session::new(launcher(), 1);
        assert_eq!(session.available_permits(), 1);
        {
            let _permit = session.acquire_owned().await;
            assert_eq!(session.available_permits(), 0);
        }
        assert_eq!(session.available_permits(), 1);
    }

    #[test]
    fn push_and_use_sets_using_pointer() {
        let session = Session::new(launcher(), 1);
        assert!(!session.has_conversation());
        let conv = Conversation::new("sys".into(), "m".into(), vec![]);
        let idx = session.push_and_use(conv);
        assert_eq!(idx, 0);
        assert!(session.has_conversation());
    }

    #[test]
    fn switching_preserves_both_conversations() {
        let session = Session::new(launcher(), 1);
        session.push_and_use(Conversation::new("a".into(), "m".into(), vec![]));
        session.push_and_use(Conversation::new("b".into(), "m".into(), vec![]));
        assert_eq!(session.conversation_count(), 2);
        assert!(session.switch_to(0));
        session.with_using(|c| assert_eq!(c.unwrap().prompt, "a"));
        assert!(session.switch_to(1));
        session.with_using(|c| assert_eq!(c.unwrap().prompt, "b"));
        assert_eq!(session.conversation_count(), 2);
    }

    #[test]
    fn is_expired_reflects_last_interact_ts() {
        let session = Session::new(launcher(), 1);
        assert!(!session.is_expired(3600));
        session
            .last_interact_ts
            .store(now_unix() - 10_000, Ordering::Relaxed);
        assert!(session.is_expired(60));
    }
}
