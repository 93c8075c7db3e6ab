//! Daemon state definitions.

/// Daemon operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Daemon is starting up.
    Starting,
    /// Daemon is running; the scheduler is armed.
    Running,
    /// Daemon is shutting down.
    ShuttingDown,
    /// Daemon is stopped.
    Stopped,
}

impl DaemonState {
    /// Check if the daemon is operational.
    pub fn is_running(&self) -> bool {
        matches!(self, DaemonState::Running)
    }

    /// Check if the daemon is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DaemonState::Stopped)
    }
}
