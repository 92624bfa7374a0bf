mod events;
mod host;

pub use events::{Event, EventKind, ResetReason};
pub use host::{ListenerToken, PluginHost, PluginListener};
