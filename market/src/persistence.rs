//! Persistence adapter trait and the in-memory implementation.
//!
//! The engine only ever talks to durable storage through
//! [`PersistenceAdapter`]; the concrete backend (SQLite or otherwise) is a
//! deployment concern. [`MemoryAdapter`] serves channel-less deployments
//! and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use driftfx_common::{days_ago, Symbol, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MarketError;

/// Error raised by a persistence backend.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PersistenceError(pub String);

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<PersistenceError> for MarketError {
    fn from(err: PersistenceError) -> Self {
        MarketError::PersistenceFailure(err.0)
    }
}

/// Result type for persistence calls.
pub type PersistResult<T> = std::result::Result<T, PersistenceError>;

/// A persisted currency row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRow {
    pub symbol: Symbol,
    pub rate: f64,
    pub volatility: f64,
    pub name: Option<String>,
}

/// Narrow contract the engine requires from durable storage.
///
/// Implementations must be safe to call concurrently; the engine
/// serializes mutations itself, so calls never race on the same row.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Load every persisted currency row.
    async fn load_all_currencies(&self) -> PersistResult<Vec<CurrencyRow>>;

    /// Insert or update a currency row.
    async fn upsert_currency(&self, row: &CurrencyRow) -> PersistResult<()>;

    /// Delete a currency row and its history.
    async fn delete_currency(&self, symbol: &Symbol) -> PersistResult<()>;

    /// Append a rate observation to a currency's history.
    async fn append_history(&self, symbol: &Symbol, rate: f64, at: Timestamp) -> PersistResult<()>;

    /// Load per-currency rate history within the last `n` days,
    /// ordered oldest first.
    async fn load_recent_history(&self, within_last_days: u32)
        -> PersistResult<HashMap<Symbol, Vec<f64>>>;

    /// Load a setting value, if present.
    async fn load_setting(&self, key: &str) -> PersistResult<Option<String>>;

    /// Save a setting value.
    async fn save_setting(&self, key: &str, value: &str) -> PersistResult<()>;
}

#[derive(Default)]
struct MemoryInner {
    currencies: HashMap<Symbol, CurrencyRow>,
    history: HashMap<Symbol, Vec<(Timestamp, f64)>>,
    settings: HashMap<String, String>,
}

/// In-memory [`PersistenceAdapter`].
///
/// Writes can be armed to fail, and a write delay can be injected, to
/// exercise the engine's rollback and timeout paths.
#[derive(Default)]
pub struct MemoryAdapter {
    inner: Mutex<MemoryInner>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<std::time::Duration>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm or disarm write failures.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Inject a delay before every write completes.
    pub fn set_write_delay(&self, delay: Option<std::time::Duration>) {
        *self.write_delay.lock() = delay;
    }

    async fn gate_write(&self) -> PersistResult<()> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::new("memory adapter: writes disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    async fn load_all_currencies(&self) -> PersistResult<Vec<CurrencyRow>> {
        let inner = self.inner.lock();
        let mut rows: Vec<CurrencyRow> = inner.currencies.values().cloned().collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(rows)
    }

    async fn upsert_currency(&self, row: &CurrencyRow) -> PersistResult<()> {
        self.gate_write().await?;
        self.inner
            .lock()
            .currencies
            .insert(row.symbol.clone(), row.clone());
        Ok(())
    }

    async fn delete_currency(&self, symbol: &Symbol) -> PersistResult<()> {
        self.gate_write().await?;
        let mut inner = self.inner.lock();
        inner.currencies.remove(symbol);
        inner.history.remove(symbol);
        Ok(())
    }

    async fn append_history(&self, symbol: &Symbol, rate: f64, at: Timestamp) -> PersistResult<()> {
        self.gate_write().await?;
        self.inner
            .lock()
            .history
            .entry(symbol.clone())
            .or_default()
            .push((at, rate));
        Ok(())
    }

    async fn load_recent_history(
        &self,
        within_last_days: u32,
    ) -> PersistResult<HashMap<Symbol, Vec<f64>>> {
        let cutoff = days_ago(within_last_days);
        let inner = self.inner.lock();
        let mut result = HashMap::new();
        for (symbol, entries) in &inner.history {
            let rates: Vec<f64> = entries
                .iter()
                .filter(|(at, _)| *at >= cutoff)
                .map(|(_, rate)| *rate)
                .collect();
            if !rates.is_empty() {
                result.insert(symbol.clone(), rates);
            }
        }
        Ok(result)
    }

    async fn load_setting(&self, key: &str) -> PersistResult<Option<String>> {
        Ok(self.inner.lock().settings.get(key).cloned())
    }

    async fn save_setting(&self, key: &str, value: &str) -> PersistResult<()> {
        self.gate_write().await?;
        self.inner
            .lock()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
