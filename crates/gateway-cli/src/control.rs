//! Extension point for the out-of-scope HTTP control plane (router, static
//! console, self-update) named as a non-goal in spec.md §1. An adjacent
//! crate that does implement it constructs an `Arc<Application>` the same
//! way `main` does and drives it through this trait; nothing in the
//! gateway's own boot path depends on a concrete implementation existing.

use gateway_core::Application;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    /// Serve the control plane until cancelled. Implementations own their
    /// own listener and shut down cleanly when the future is dropped.
    async fn serve(&self, app: Arc<Application>) -> anyhow::Result<()>;
}
