use std::sync::Arc;

use sqlx::PgPool;

use crate::assessment::generation::StageGenerator;
use crate::assessment::store::ProgressStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Run persistence. Production wires `PgProgressStore`; tests swap in an
    /// in-memory store.
    pub store: Arc<dyn ProgressStore>,
    /// Stage content generator. Production wires `LlmGenerator`; tests swap in
    /// a scripted one.
    pub generator: Arc<dyn StageGenerator>,
    pub config: Config,
}
