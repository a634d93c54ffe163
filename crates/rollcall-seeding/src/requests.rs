//! "Seed now" requests arriving from request handlers.
//!
//! Handlers push a [`SeedRequest`] into a bounded mpsc channel and await the
//! reply. [`serve_requests`] drains the channel and runs each request on the
//! blocking pool, so slow store I/O never stalls the async runtime.

use rollcall_core::{SessionId, TenantId};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{Result, SeedingError};
use crate::on_demand::OnDemandSeeder;
use crate::types::SeedOutcome;

/// One request to seed a session right away.
#[derive(Debug)]
pub struct SeedRequest {
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    /// Where the outcome goes. Dropped receivers are tolerated.
    pub reply: oneshot::Sender<Result<SeedOutcome>>,
}

/// Send a request and wait for its outcome.
///
/// Returns [`SeedingError::Unavailable`] if the worker is not running or
/// exits before answering.
pub async fn request_seed(
    requests: &mpsc::Sender<SeedRequest>,
    session_id: SessionId,
    tenant_id: TenantId,
) -> Result<SeedOutcome> {
    let (reply, outcome) = oneshot::channel();
    requests
        .send(SeedRequest {
            session_id,
            tenant_id,
            reply,
        })
        .await
        .map_err(|_| SeedingError::Unavailable)?;
    outcome.await.map_err(|_| SeedingError::Unavailable)?
}

/// Drain `requests` until `shutdown` broadcasts `true`, every sender is
/// dropped, or the shutdown sender goes away.
///
/// Requests are handled concurrently; the seeder's connection mutex orders
/// them against each other and the store orders them against the scheduler.
pub async fn serve_requests(
    seeder: OnDemandSeeder,
    auto_open: bool,
    mut requests: mpsc::Receiver<SeedRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("seed request worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = requests.recv() => {
                let Some(request) = next else { break };
                let seeder = seeder.clone();
                tokio::spawn(handle(seeder, auto_open, request));
            }
        }
    }
    info!("seed request worker shutting down");
}

async fn handle(seeder: OnDemandSeeder, auto_open: bool, request: SeedRequest) {
    let SeedRequest {
        session_id,
        tenant_id,
        reply,
    } = request;

    let outcome = tokio::task::spawn_blocking(move || {
        seeder.ensure_seeded(session_id, tenant_id, auto_open)
    })
    .await
    .unwrap_or_else(|e| Err(SeedingError::Worker(e.to_string())));

    if let Err(ref e) = outcome {
        warn!(%session_id, %tenant_id, error = %e, "on-demand seed failed");
    }
    if reply.send(outcome).is_err() {
        debug!(%session_id, "seed requester went away before the reply");
    }
}
