use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with build and queue metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("ROLLCALL_GIT_SHA"),
        "seeding_enabled": state.config.seeding.enabled,
        "queued_seed_requests": state.queued_requests(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rollcall_core::RollcallConfig;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::app::build_router;

    #[tokio::test]
    async fn reports_seeding_flag_and_empty_queue() {
        let (tx, _rx) = mpsc::channel(4);
        let router = build_router(Arc::new(AppState::new(RollcallConfig::default(), tx)));

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["seeding_enabled"], true);
        assert_eq!(body["queued_seed_requests"], 0);
    }
}
