use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rollcall_core::{RollcallConfig, SeedSettings, SessionId, TenantId};
use rollcall_seeding::{serve_requests, store, OnDemandSeeder, SeedScheduler};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

mod app;
mod http;

#[derive(Parser)]
#[command(name = "rollcall-gateway", version, about = "Attendance seeding service")]
struct Cli {
    /// Config file; falls back to $ROLLCALL_CONFIG, then ~/.rollcall/rollcall.toml
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the seed scheduler and the HTTP ingress until ctrl-c (default)
    Serve,
    /// Seed one session now and print the outcome
    Seed {
        #[arg(long)]
        session: i64,
        #[arg(long)]
        tenant: i64,
    },
    /// Run a single scheduler cycle and print its report
    Cycle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rollcall_gateway=info,rollcall_seeding=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // explicit flag > ROLLCALL_CONFIG env > ~/.rollcall/rollcall.toml
    let config_path = cli.config.or_else(|| std::env::var("ROLLCALL_CONFIG").ok());
    let config = RollcallConfig::load(config_path.as_deref())?;
    // a bad window must stop startup, not run the scheduler with nonsense
    let settings = config.seeding.validate()?;

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path)?;
    info!(path = %db_path, "opening SQLite database");

    let db = store::open_connection(&db_path, settings.lock_timeout)?;
    rollcall_seeding::db::init_db(&db)?;
    info!("database migrations complete");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, settings, db).await,
        Command::Seed { session, tenant } => {
            let seeder = OnDemandSeeder::new(db);
            let outcome =
                seeder.ensure_seeded(SessionId(session), TenantId(tenant), settings.auto_open)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Command::Cycle => {
            if !settings.enabled {
                warn!("seeding.enabled is false, cycle will be skipped");
            }
            let mut scheduler = SeedScheduler::new(db, settings)?;
            let report = scheduler.run_cycle()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(
    config: RollcallConfig,
    settings: SeedSettings,
    db: rusqlite::Connection,
) -> anyhow::Result<()> {
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // each subsystem gets its own connection; the store does the coordination
    let scheduler = SeedScheduler::new(
        store::open_connection(&config.database.path, settings.lock_timeout)?,
        settings.clone(),
    )?;
    let seeder = OnDemandSeeder::new(db);

    let (seed_tx, seed_rx) = mpsc::channel(config.gateway.request_queue.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let worker_task = tokio::spawn(serve_requests(
        seeder,
        settings.auto_open,
        seed_rx,
        shutdown_rx,
    ));

    let state = Arc::new(app::AppState::new(config, seed_tx));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Rollcall gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    let (scheduler_done, worker_done) = tokio::join!(scheduler_task, worker_task);
    scheduler_done?;
    worker_done?;
    info!("Rollcall gateway stopped");
    Ok(())
}

/// Resolve on ctrl-c and tell the background tasks to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("ctrl-c handler failed ({e}), shutting down");
    }
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) -> rollcall_core::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
