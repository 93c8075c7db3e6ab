//! Time utilities and constants for the DriftFX market.

use chrono::{DateTime, Duration, Utc};

/// Market timing constants.
pub mod constants {
    /// Number of rate observations retained per currency.
    pub const HISTORY_WINDOW: usize = 7;

    /// Hour of day (UTC) at which the daily tick fires by default.
    pub const DEFAULT_TICK_HOUR: u32 = 12;
}

/// A timestamp with timezone (always UTC for DriftFX).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Calculate a timestamp n whole days before now.
pub fn days_ago(days: u32) -> Timestamp {
    now() - Duration::days(i64::from(days))
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_ago() {
        let then = days_ago(3);
        let diff = now() - then;
        assert_eq!(diff.num_days(), 3);
    }

    #[test]
    fn test_duration_as_std() {
        assert_eq!(
            Duration::seconds(2).as_std(),
            std::time::Duration::from_secs(2)
        );
        // Negative durations clamp to zero
        assert_eq!(Duration::seconds(-2).as_std(), std::time::Duration::ZERO);
    }
}
