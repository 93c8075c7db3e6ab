//! DriftFX Daemon
//!
//! Runs the synthetic market as a long-lived service: opens the rate
//! store, fires the daily simulation tick, and hands the rate digest to
//! a notification sink.

pub mod config;
pub mod daemon;
pub mod notifier;
pub mod scheduler;
pub mod state;

pub use config::{DaemonConfig, SchedulerConfig};
pub use daemon::MarketDaemon;
pub use notifier::{LogSink, NotificationSink};
pub use scheduler::DailyScheduler;
pub use state::DaemonState;
