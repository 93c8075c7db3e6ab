//! Changing the numeraire currency.

use std::sync::Arc;

use driftfx_common::{round_rate, Symbol, MIN_RATE};
use tracing::{debug, info, instrument};

use crate::error::{MarketError, MarketResult};
use crate::persistence::CurrencyRow;
use crate::settings::keys;
use crate::store::RateStore;

/// Rescales the whole market so a different currency is pinned at 1.0.
///
/// Relative rates between every pair of non-base currencies are
/// preserved; every rate and every history entry is divided by the new
/// base's old rate. This is the only operation that touches every
/// currency and its full history, so it runs as a single whole-market
/// transaction: rescaled rows are persisted first, then applied under
/// the exclusive lock, never observable half-done.
pub struct RebaseEngine {
    store: Arc<RateStore>,
}

impl RebaseEngine {
    pub fn new(store: Arc<RateStore>) -> Self {
        Self { store }
    }

    /// Make `new_base` the base currency.
    #[instrument(skip(self), fields(new_base = %new_base))]
    pub async fn rebase(&self, new_base: &Symbol) -> MarketResult<()> {
        let mut state = self.store.state.write().await;

        if state.settings.base == *new_base {
            debug!("Already the base currency, nothing to do");
            return Ok(());
        }
        let k = state
            .currencies
            .get(new_base)
            .map(|record| record.rate)
            .ok_or_else(|| MarketError::NotFound(new_base.clone()))?;
        if k <= 0.0 || !k.is_finite() {
            return Err(MarketError::InvalidValue {
                field: "rate",
                message: format!("base candidate {new_base} has non-positive rate {k}"),
            });
        }

        // Rescale into a staging copy; nothing is applied until every
        // row has been persisted.
        let mut staged: Vec<(Symbol, f64)> = Vec::with_capacity(state.currencies.len());
        for (symbol, record) in &state.currencies {
            // Exact 1.0 for the new base, never left to division; other
            // rates floor at rate precision so none rounds down to zero
            let rate = if symbol == new_base {
                1.0
            } else {
                round_rate(record.rate / k).max(MIN_RATE)
            };
            staged.push((symbol.clone(), rate));
        }

        for (symbol, rate) in &staged {
            let record = &state.currencies[symbol];
            let row = CurrencyRow {
                symbol: symbol.clone(),
                rate: *rate,
                volatility: record.volatility,
                name: record.name.clone(),
            };
            self.store.persist_row(&row).await?;
        }
        self.store
            .save_setting(keys::BASE_CURRENCY, new_base.as_str())
            .await?;

        let old_base = state.settings.base.clone();
        for (symbol, rate) in staged {
            if let Some(record) = state.currencies.get_mut(&symbol) {
                record.rate = rate;
                record.history.rescale(k);
            }
        }
        state.settings.base = new_base.clone();

        info!(old_base = %old_base, factor = k, "Market rebased");
        Ok(())
    }
}
