//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use wayfarer_chat::{DialogueOrchestrator, SessionStore};
use wayfarer_core::config::WayfarerConfig;

/// Shared application state, cloned into every handler task.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub config: Arc<WayfarerConfig>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<DialogueOrchestrator>, config: WayfarerConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.orchestrator.store()
    }
}
