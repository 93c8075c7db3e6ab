//! Currency records and the bounded rate history window.

use driftfx_common::{constants::HISTORY_WINDOW, round_rate, Symbol, MIN_RATE};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};

/// Volatility applied when `add` omits one.
pub const DEFAULT_VOLATILITY: f64 = 0.05;

/// Snapshot of a single currency's state, relative to the current base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// Unique uppercase symbol.
    pub symbol: Symbol,
    /// Exchange rate against the current base (always > 0).
    pub rate: f64,
    /// Maximum relative magnitude of one simulated daily move, in [0, 1).
    pub volatility: f64,
    /// Optional display name.
    pub name: Option<String>,
}

/// Bounded per-currency record of recent rate observations, oldest first.
///
/// Holds between 1 and [`HISTORY_WINDOW`] entries; appending beyond the
/// cap evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryWindow {
    entries: Vec<f64>,
}

impl HistoryWindow {
    /// Seed a new window with a single observation.
    pub fn seeded(initial: f64) -> Self {
        Self {
            entries: vec![initial],
        }
    }

    /// Build a window from loaded observations, keeping the newest entries.
    ///
    /// Falls back to seeding with `fallback` when `entries` is empty, so
    /// the 1..=7 length invariant holds even for freshly loaded rows.
    pub fn from_entries(entries: Vec<f64>, fallback: f64) -> Self {
        if entries.is_empty() {
            return Self::seeded(fallback);
        }
        let skip = entries.len().saturating_sub(HISTORY_WINDOW);
        Self {
            entries: entries.into_iter().skip(skip).collect(),
        }
    }

    /// Append an observation, evicting the oldest beyond the cap.
    pub fn push(&mut self, rate: f64) {
        self.entries.push(rate);
        if self.entries.len() > HISTORY_WINDOW {
            self.entries.remove(0);
        }
    }

    /// Divide every entry by `k`, rounding to rate precision.
    ///
    /// Entries floor at [`MIN_RATE`] so a tiny rate never rescales to zero.
    pub fn rescale(&mut self, k: f64) {
        for entry in &mut self.entries {
            *entry = round_rate(*entry / k).max(MIN_RATE);
        }
    }

    /// Most recent observation.
    pub fn latest(&self) -> f64 {
        // Non-empty by construction
        *self.entries.last().expect("history window is never empty")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Observations oldest first.
    pub fn as_slice(&self) -> &[f64] {
        &self.entries
    }
}

/// Internal per-currency state held by the store.
#[derive(Debug, Clone)]
pub(crate) struct CurrencyRecord {
    pub rate: f64,
    pub volatility: f64,
    pub name: Option<String>,
    pub history: HistoryWindow,
}

impl CurrencyRecord {
    pub fn snapshot(&self, symbol: &Symbol) -> Currency {
        Currency {
            symbol: symbol.clone(),
            rate: self.rate,
            volatility: self.volatility,
            name: self.name.clone(),
        }
    }
}

/// Validate a rate value at the administrative boundary.
pub fn validate_rate(rate: f64) -> MarketResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(MarketError::InvalidValue {
            field: "rate",
            message: format!("must be a positive number, got {rate}"),
        });
    }
    Ok(())
}

/// Validate a volatility value at the administrative boundary.
///
/// Out-of-range values are rejected here, never clamped internally.
pub fn validate_volatility(volatility: f64) -> MarketResult<()> {
    if !volatility.is_finite() || volatility < 0.0 || volatility >= 1.0 {
        return Err(MarketError::InvalidValue {
            field: "volatility",
            message: format!("must be in [0, 1), got {volatility}"),
        });
    }
    Ok(())
}
