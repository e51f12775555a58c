use std::sync::Arc;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info};

use crate::{
    infrastructure::state::AppState,
    services::{progress::TracingProgress, sync::SyncService},
};

/// Spawns the periodic sync loop. Returns `None` when neither an interval nor
/// a startup run is configured.
pub fn spawn_sync_worker(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let interval = state.config.sync_interval();
    let run_on_startup = state.config.sync.run_on_startup;
    if interval.is_none() && !run_on_startup {
        info!("scheduled sync disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let service = SyncService::from_state(&state);
        if run_on_startup {
            run_once(&service, "startup").await;
        }

        let Some(period) = interval else {
            return;
        };
        info!(interval_seconds = period.as_secs(), "scheduled sync enabled");
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_once(&service, "scheduled").await;
        }
    }))
}

async fn run_once(service: &SyncService, trigger: &'static str) {
    match service.run(&TracingProgress).await {
        Ok(stats) => info!(
            trigger,
            added = stats.added_count,
            removed = stats.removed_count,
            total_unpaid = stats.total_unpaid,
            "sync completed"
        ),
        Err(err) => error!(trigger, error = %err, "sync failed"),
    }
}
