use std::sync::Arc;

use sqlx::PgPool;

use crate::completion::CompletionService;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Completion backend. Production wires `GeminiCompletion`; tests swap in
    /// a scripted stub through the same trait object.
    pub completion: Arc<dyn CompletionService>,
    pub config: Config,
}
