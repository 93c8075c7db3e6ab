//! Notification sink trait and implementations.

use async_trait::async_trait;
use driftfx_market::MarketResult;
use tracing::info;

/// Destination for the daily rate digest.
///
/// The real chat-channel publisher lives in the platform layer above;
/// the daemon only sees this trait. Publish failures are logged by the
/// scheduler and not retried within the same tick.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Get the sink name.
    fn name(&self) -> &str;

    /// Publish one digest text.
    async fn publish(&self, text: &str) -> MarketResult<()>;
}

/// Sink that writes the digest to the structured log.
#[derive(Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, text: &str) -> MarketResult<()> {
        info!(digest = text, "Daily rate digest");
        Ok(())
    }
}
