use std::time::Duration;

use tracing::{debug, error, info};

use crate::model::format_date;
use crate::observability;
use crate::policy::SlotPolicy;
use crate::store::SlotStore;

/// Background task that keeps the bookable date seeded. Seeding is
/// idempotent, so running it on an interval rolls the calendar over to the
/// next day without touching claimed slots.
pub async fn run_seeder(store: SlotStore, policy: SlotPolicy, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let date = policy.bookable_date();
        match store.ensure_day_seeded(date, &policy.times).await {
            Ok(0) => debug!("slots for {} already seeded", format_date(date)),
            Ok(n) => {
                metrics::counter!(observability::SLOTS_SEEDED_TOTAL).increment(n as u64);
                info!("seeded {n} slots for {}", format_date(date));
            }
            Err(e) => error!("seeding {} failed: {e}", format_date(date)),
        }
    }
}
