//! Daily tick scheduling.

use std::sync::Arc;

use chrono::TimeZone;
use chrono::Utc;
use driftfx_common::{now, DurationExt, Timestamp};
use driftfx_market::{RateSimulator, RateStore, TickReport};
use tracing::{debug, info, instrument, warn};

use crate::config::SchedulerConfig;
use crate::notifier::NotificationSink;

/// Fires one simulator tick per calendar day at the configured hour,
/// then publishes the daily digest.
///
/// Advancing rates and publishing the digest are independent: the tick
/// runs whether or not a digest channel exists, and the digest goes out
/// only when both a sink and a channel are configured. The legacy
/// skip-when-unconfigured policy is available behind
/// `tick_requires_channel`.
pub struct DailyScheduler {
    store: Arc<RateStore>,
    simulator: RateSimulator,
    sink: Option<Arc<dyn NotificationSink>>,
    config: SchedulerConfig,
}

impl DailyScheduler {
    pub fn new(
        store: Arc<RateStore>,
        simulator: RateSimulator,
        sink: Option<Arc<dyn NotificationSink>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            simulator,
            sink,
            config,
        }
    }

    /// Next moment the daily tick fires, strictly after `now`.
    ///
    /// An out-of-range configured hour clamps to 23.
    pub fn next_fire(&self, now: Timestamp) -> Timestamp {
        let hour = self.config.tick_hour.min(23);
        let today = now
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .expect("hour clamped below 24");
        let candidate = Utc.from_utc_datetime(&today);
        if candidate > now {
            candidate
        } else {
            candidate + chrono::Duration::days(1)
        }
    }

    /// Run the scheduler loop until the task is dropped.
    pub async fn run(&self) {
        loop {
            let fire_at = self.next_fire(now());
            debug!(fire_at = %fire_at, "Scheduler sleeping until next tick");
            tokio::time::sleep((fire_at - now()).as_std()).await;
            self.run_once().await;
        }
    }

    /// Run one tick-and-publish cycle.
    ///
    /// Returns `None` when the legacy channel policy skipped the tick.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Option<TickReport> {
        let channel = self.store.settings().await.channel_id;

        if self.config.tick_requires_channel && channel.is_none() {
            info!("No digest channel configured, skipping tick");
            return None;
        }

        let report = self.simulator.tick().await;
        info!(
            moves = report.moves.len(),
            failures = report.failures.len(),
            "Daily tick complete"
        );

        match (&self.sink, &channel) {
            (Some(sink), Some(channel)) => {
                let digest = self.store.digest().await;
                if let Err(error) = sink.publish(&digest).await {
                    warn!(
                        sink = sink.name(),
                        channel = %channel,
                        error = %error,
                        "Digest publish failed"
                    );
                }
            }
            _ => debug!("No sink or channel configured, digest not published"),
        }

        Some(report)
    }
}
