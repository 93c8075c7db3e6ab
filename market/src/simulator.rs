//! Stochastic daily rate simulation.

use std::sync::Arc;

use driftfx_common::{now, round_rate, Symbol, Timestamp, MIN_RATE};
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::error::MarketError;
use crate::persistence::CurrencyRow;
use crate::store::RateStore;

/// One applied rate move.
#[derive(Debug, Clone, PartialEq)]
pub struct TickMove {
    pub symbol: Symbol,
    pub previous: f64,
    pub current: f64,
}

impl TickMove {
    /// Relative change of this move.
    pub fn relative_change(&self) -> f64 {
        self.current / self.previous - 1.0
    }
}

/// One currency whose update was aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct TickFailure {
    pub symbol: Symbol,
    pub error: MarketError,
}

/// Outcome of one simulator tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub moves: Vec<TickMove>,
    pub failures: Vec<TickFailure>,
    pub ticked_at: Timestamp,
}

/// Advances every non-base currency by one geometric random-walk step.
///
/// Each step draws a relative move uniformly from
/// `[-volatility, +volatility]`, so one tick never moves a rate by more
/// than its volatility. Every update is persisted before it becomes
/// visible in memory; a persistence failure aborts only that currency's
/// update and is reported in the tick report.
pub struct RateSimulator {
    store: Arc<RateStore>,
}

impl RateSimulator {
    pub fn new(store: Arc<RateStore>) -> Self {
        Self { store }
    }

    /// Run one tick over the whole market.
    ///
    /// Holds the exclusive market lock for the duration, so a tick never
    /// interleaves with a rebase or an administrative mutation.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let mut state = self.store.state.write().await;
        let base = state.settings.base.clone();

        let mut symbols: Vec<Symbol> = state
            .currencies
            .keys()
            .filter(|symbol| **symbol != base)
            .cloned()
            .collect();
        symbols.sort();

        let mut report = TickReport {
            moves: Vec::with_capacity(symbols.len()),
            failures: Vec::new(),
            ticked_at: now(),
        };

        for symbol in symbols {
            let (previous, volatility, name) = {
                let record = &state.currencies[&symbol];
                (record.rate, record.volatility, record.name.clone())
            };

            let delta = {
                let mut rng = rand::thread_rng();
                if volatility > 0.0 {
                    rng.gen_range(-volatility..=volatility)
                } else {
                    0.0
                }
            };
            // Floor at rate precision keeps rates positive
            let current = round_rate(previous * (1.0 + delta)).max(MIN_RATE);

            let row = CurrencyRow {
                symbol: symbol.clone(),
                rate: current,
                volatility,
                name,
            };
            if let Err(error) = self.store.persist_rate(&row).await {
                warn!(symbol = %symbol, error = %error, "Tick update aborted");
                report.failures.push(TickFailure { symbol, error });
                continue;
            }

            if let Some(record) = state.currencies.get_mut(&symbol) {
                record.rate = current;
                record.history.push(current);
            }
            debug!(symbol = %symbol, previous, current, "Rate advanced");
            report.moves.push(TickMove {
                symbol,
                previous,
                current,
            });
        }

        report
    }
}
