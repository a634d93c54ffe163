//! Seed-now ingress: POST /v1/attendance/sessions/{session_id}/seed
//!
//! Lets a handler elsewhere in the service guarantee placeholder rows exist
//! before it serves attendance for a session. The tenant comes from the
//! `X-Tenant-Id` header set by the authenticating proxy.
//!
//! Response: `{"session_id": 1, "tenant_id": 2, "inserted": 25, "opened": true}`
//! Error:    `{"error": "...", "code": "..."}`

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rollcall_core::{SessionId, TenantId};
use rollcall_seeding::{request_seed, SeedingError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// POST /v1/attendance/sessions/{session_id}/seed
///
/// Returns 200 with the seed outcome, 400 without a usable tenant header,
/// 503 when the store is busy or the worker is gone, 500 otherwise.
pub async fn seed_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let tenant_id = tenant_from_headers(&headers).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "missing or invalid X-Tenant-Id header",
                "code": "BAD_REQUEST",
            })),
        )
    })?;
    let session_id = SessionId(session_id);

    match request_seed(&state.seed_requests, session_id, tenant_id).await {
        Ok(outcome) => {
            info!(
                %session_id,
                %tenant_id,
                inserted = outcome.inserted,
                opened = outcome.opened,
                "seed request served"
            );
            Ok(Json(json!({
                "session_id": session_id,
                "tenant_id": tenant_id,
                "inserted": outcome.inserted,
                "opened": outcome.opened,
            })))
        }
        Err(e) => {
            warn!(%session_id, %tenant_id, error = %e, "seed request failed");
            let (status, code) = if e.is_transient() || matches!(e, SeedingError::Unavailable) {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, "SEED_FAILED")
            };
            Err((status, Json(json!({"error": e.to_string(), "code": code}))))
        }
    }
}

fn tenant_from_headers(headers: &HeaderMap) -> Option<TenantId> {
    headers
        .get(TENANT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(TenantId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use rollcall_core::RollcallConfig;
    use rollcall_seeding::{db::init_db, serve_requests, OnDemandSeeder};
    use rusqlite::Connection;
    use tokio::sync::{mpsc, watch};
    use tower::ServiceExt;

    use crate::app::build_router;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, value.parse().unwrap());
        headers
    }

    #[test]
    fn tenant_header_parsing() {
        assert_eq!(tenant_from_headers(&headers_with("12")), Some(TenantId(12)));
        assert_eq!(tenant_from_headers(&headers_with(" 3 ")), Some(TenantId(3)));
        assert_eq!(tenant_from_headers(&headers_with("0")), None);
        assert_eq!(tenant_from_headers(&headers_with("abc")), None);
        assert_eq!(tenant_from_headers(&HeaderMap::new()), None);
    }

    /// One tenant-2 session (id 1) with three active students.
    fn seeded_store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO class_sections (id, tenant_id, name, created_at)
                 VALUES (1, 2, 'Fiqh', 'x');
             INSERT INTO class_section_students
                 (tenant_id, class_section_id, student_id, is_active, created_at)
                 VALUES (2, 1, 10, 1, 'x'), (2, 1, 11, 1, 'x'), (2, 1, 12, 1, 'x');
             INSERT INTO class_attendance_sessions
                 (id, tenant_id, class_section_id, starts_at, status, created_at, updated_at)
                 VALUES (1, 2, 1, NULL, 'scheduled', 'x', 'x');",
        )
        .unwrap();
        conn
    }

    fn app() -> (axum::Router, watch::Sender<bool>) {
        let (tx, rx) = mpsc::channel(8);
        let (stop, shutdown) = watch::channel(false);
        tokio::spawn(serve_requests(
            OnDemandSeeder::new(seeded_store()),
            true,
            rx,
            shutdown,
        ));
        let state = Arc::new(AppState::new(RollcallConfig::default(), tx));
        (build_router(state), stop)
    }

    fn seed_request(tenant: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/v1/attendance/sessions/1/seed");
        if let Some(tenant) = tenant {
            builder = builder.header(TENANT_HEADER, tenant);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn seeds_session_for_tenant() {
        let (router, _stop) = app();

        let response = router.clone().oneshot(seed_request(Some("2"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["inserted"], 3);
        assert_eq!(body["opened"], true);

        let response = router.oneshot(seed_request(Some("2"))).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["inserted"], 0);
        assert_eq!(body["opened"], false);
    }

    #[tokio::test]
    async fn other_tenant_gets_empty_outcome() {
        let (router, _stop) = app();

        let response = router.oneshot(seed_request(Some("5"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["inserted"], 0);
    }

    #[tokio::test]
    async fn missing_tenant_is_rejected() {
        let (router, _stop) = app();

        let response = router.oneshot(seed_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stopped_worker_yields_503() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let router = build_router(Arc::new(AppState::new(RollcallConfig::default(), tx)));

        let response = router.oneshot(seed_request(Some("2"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["code"], "UNAVAILABLE");
    }
}
