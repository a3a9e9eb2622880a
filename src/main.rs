use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use slotline::command::Interpreter;
use slotline::engine::Allocator;
use slotline::model::format_date;
use slotline::policy::SlotPolicy;
use slotline::seeder;
use slotline::store::SlotStore;
use slotline::webhook::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("SLOTLINE_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    slotline::observability::init(metrics_port);

    let port = std::env::var("SLOTLINE_PORT").unwrap_or_else(|_| "3000".into());
    let bind = std::env::var("SLOTLINE_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let db_path = PathBuf::from(
        std::env::var("SLOTLINE_DB").unwrap_or_else(|_| "slotline.db".into()),
    );
    let seed_interval: u64 = std::env::var("SLOTLINE_SEED_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3600);
    let policy = match std::env::var("SLOTLINE_SLOT_TIMES") {
        Ok(spec) => SlotPolicy::from_spec(&spec)
            .ok_or("SLOTLINE_SLOT_TIMES must be a comma-separated list of HH:MM labels")?,
        Err(_) => SlotPolicy::default(),
    };

    let store = SlotStore::open(&db_path)?;
    let date = policy.bookable_date();
    let seeded = store.ensure_day_seeded(date, &policy.times).await?;
    info!("seeded {seeded} slots for {}", format_date(date));

    tokio::spawn(seeder::run_seeder(
        store.clone(),
        policy.clone(),
        Duration::from_secs(seed_interval),
    ));

    let allocator = Allocator::new(store);
    let state = AppState {
        interpreter: Interpreter::new(allocator.clone()),
        allocator,
        policy,
    };
    let app = webhook::router(state);

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("slotline listening on {addr}");
    info!("  db: {}", db_path.display());
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("slotline stopped");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c so in-flight replies drain before exit.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
