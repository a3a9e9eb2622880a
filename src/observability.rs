use std::net::SocketAddr;

use crate::command::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: inbound SMS commands handled. Labels: command.
pub const COMMANDS_TOTAL: &str = "slotline_commands_total";

/// Histogram: command handling latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "slotline_command_duration_seconds";

/// Counter: claims lost to contention (book and reschedule).
pub const CLAIM_CONFLICTS_TOTAL: &str = "slotline_claim_conflicts_total";

// ── USE metrics (resource-driven) ───────────────────────────────

/// Counter: slots inserted by the seeder.
pub const SLOTS_SEEDED_TOTAL: &str = "slotline_slots_seeded_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::ListSlots => "list_slots",
        Command::ShowBooking => "show_booking",
        Command::PickTime(_) => "pick_time",
        Command::Help => "help",
    }
}
