//! The plugin host / event bus.
//!
//! Grounded in `agent::event_bus::EventBus` for the registration/removal
//! bookkeeping (token-keyed `Vec`, `parking_lot::Mutex`), but redesigned per
//! spec.md §4.6 and §9 ("Event bus payload typing"): listeners run
//! **in registration order** and may mutate the event (write `returns`,
//! call `prevent_default`), rather than fire-and-forget broadcast. A
//! listener's failure is caught, logged, and does not stop dispatch for
//! the rest -- mirroring `EventBus`'s "observer failure does not block
//! other observers" guarantee, just synchronously ordered instead of
//! spawned.

use super::events::{Event, EventKind};
use async_trait::async_trait;
use log::error;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type ListenerToken = u64;

/// A plugin's handler for one or more event kinds.
///
/// Mirrors the "visitor-style interface" called for in spec.md §9: a
/// listener declares interest by matching on `event.kind` and returning
/// early for kinds it doesn't care about.
#[async_trait]
pub trait PluginListener: Send + Sync {
    /// Human-readable name used in error logs.
    fn name(&self) -> &str;

    async fn on_event(&self, event: &mut Event) -> Result<(), anyhow::Error>;
}

struct Registration {
    token: ListenerToken,
    listener: Arc<dyn PluginListener>,
}

pub struct PluginHost {
    listeners: Mutex<Vec<Registration>>,
    next_token: AtomicU64,
}

impl PluginHost {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register at boot. Mutations after boot are technically supported
    /// (the lock is cheap) but the rest of the system assumes the set is
    /// read-mostly per spec.md §5.
    pub fn register(&self, listener: Arc<dyn PluginListener>) -> ListenerToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Registration { token, listener });
        token
    }

    pub fn unregister(&self, token: ListenerToken) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|r| r.token != token);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// `(token, name)` pairs for every registered listener, in registration
    /// order -- used by the `plugin-list`/`plugin-enable`/`plugin-disable`
    /// built-in commands.
    pub fn list_registrations(&self) -> Vec<(ListenerToken, String)> {
        self.listeners
            .lock()
            .iter()
            .map(|r| (r.token, r.listener.name().to_string()))
            .collect()
    }

    /// Dispatch `kind` to every registered listener in registration order,
    /// returning the accumulated `Event` (returns + prevented_default) for
    /// the caller to act on.
    pub async fn dispatch(&self, kind: EventKind) -> Event {
        let mut event = Event::new(kind);
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|r| Arc::clone(&r.listener))
            .collect();

        for listener in listeners {
            if let Err(err) = listener.on_event(&mut event).await {
                error!(
                    "plugin '{}' raised an error handling '{}': {:#}",
                    listener.name(),
                    event.kind.name(),
                    err
                );
            }
        }

        event
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}
