use axum::{
    routing::{get, post},
    Router,
};
use rollcall_core::RollcallConfig;
use rollcall_seeding::SeedRequest;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared handler state, passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: RollcallConfig,
    /// Queue into the seed-request worker.
    pub seed_requests: mpsc::Sender<SeedRequest>,
}

impl AppState {
    pub fn new(config: RollcallConfig, seed_requests: mpsc::Sender<SeedRequest>) -> Self {
        Self {
            config,
            seed_requests,
        }
    }

    /// Requests waiting for the worker to pick them up.
    pub fn queued_requests(&self) -> usize {
        self.seed_requests.max_capacity() - self.seed_requests.capacity()
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/v1/attendance/sessions/{session_id}/seed",
            post(crate::http::seed::seed_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
