//! The authoritative market state store.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use driftfx_common::{constants::HISTORY_WINDOW, now, round_rate, Symbol};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::currency::{
    validate_rate, validate_volatility, Currency, CurrencyRecord, HistoryWindow,
    DEFAULT_VOLATILITY,
};
use crate::error::{MarketError, MarketResult};
use crate::persistence::{CurrencyRow, PersistResult, PersistenceAdapter};
use crate::settings::{keys, MarketSettings};

/// Currencies seeded into an empty backing store: (symbol, rate, volatility).
const SEED_MARKET: [(&str, f64, f64); 4] = [
    ("SOL", 1.0, 0.01),
    ("LUN", 3.5, 0.02),
    ("TAR", 0.8, 0.04),
    ("VEX", 5.2, 0.1),
];

const SEED_BASE: &str = "SOL";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Deadline for a single persistence call.
    pub persist_timeout: Duration,
    /// Seed the default market when the backing store is empty.
    pub seed_default_market: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_secs(5),
            seed_default_market: true,
        }
    }
}

/// Whole-market state guarded by a single lock.
pub(crate) struct MarketState {
    pub currencies: HashMap<Symbol, CurrencyRecord>,
    pub settings: MarketSettings,
}

/// Single authoritative source of currency state.
///
/// Reads take the shared lock and may run concurrently; every mutation
/// takes the exclusive lock for its whole duration, including the
/// write-through persistence call, so no reader ever observes a
/// half-applied change. Persistence happens before the in-memory apply:
/// a failed or timed-out write leaves memory untouched.
pub struct RateStore {
    pub(crate) state: RwLock<MarketState>,
    pub(crate) adapter: Arc<dyn PersistenceAdapter>,
    pub(crate) config: StoreConfig,
}

// The adapter is a trait object, so Debug is hand-written
impl fmt::Debug for RateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run a persistence call under the configured deadline.
pub(crate) async fn persisted<T>(
    timeout: Duration,
    op: &'static str,
    fut: impl Future<Output = PersistResult<T>>,
) -> MarketResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(MarketError::PersistenceFailure(err.to_string())),
        Err(_) => Err(MarketError::Timeout(op.to_string())),
    }
}

impl RateStore {
    /// Open the store over a persistence adapter, loading currencies,
    /// recent history, and settings.
    ///
    /// An empty backing store is seeded with the default market unless
    /// seeding is disabled in the config.
    pub async fn open(
        adapter: Arc<dyn PersistenceAdapter>,
        config: StoreConfig,
    ) -> MarketResult<Self> {
        let timeout = config.persist_timeout;

        let mut rows = persisted(
            timeout,
            "load_all_currencies",
            adapter.load_all_currencies(),
        )
        .await?;

        if rows.is_empty() && config.seed_default_market {
            rows = seed_market(adapter.as_ref(), timeout).await?;
            info!(currencies = rows.len(), base = SEED_BASE, "Seeded default market");
        }
        if rows.is_empty() {
            return Err(MarketError::InvalidValue {
                field: "market",
                message: "backing store is empty and seeding is disabled".to_string(),
            });
        }

        let mut histories = persisted(
            timeout,
            "load_recent_history",
            adapter.load_recent_history(HISTORY_WINDOW as u32),
        )
        .await?;

        let base = match load_setting(adapter.as_ref(), timeout, keys::BASE_CURRENCY).await? {
            Some(symbol) => Symbol::new(symbol),
            None => rows
                .iter()
                .find(|row| row.rate == 1.0)
                .map(|row| row.symbol.clone())
                .ok_or_else(|| MarketError::InvalidValue {
                    field: "base",
                    message: "no base currency recorded".to_string(),
                })?,
        };

        let mut settings = MarketSettings::new(base.clone());
        settings.channel_id = load_setting(adapter.as_ref(), timeout, keys::CHANNEL_ID).await?;
        settings.manager_role_id =
            load_setting(adapter.as_ref(), timeout, keys::MANAGER_ROLE_ID).await?;

        let mut currencies = HashMap::with_capacity(rows.len());
        for row in rows {
            let history = HistoryWindow::from_entries(
                histories.remove(&row.symbol).unwrap_or_default(),
                row.rate,
            );
            currencies.insert(
                row.symbol,
                CurrencyRecord {
                    rate: row.rate,
                    volatility: row.volatility,
                    name: row.name,
                    history,
                },
            );
        }

        match currencies.get_mut(&base) {
            Some(record) => {
                if record.rate != 1.0 {
                    warn!(base = %base, rate = record.rate, "Pinning drifted base rate to 1.0");
                    record.rate = 1.0;
                }
            }
            None => {
                return Err(MarketError::NotFound(base));
            }
        }

        info!(currencies = currencies.len(), base = %base, "Market store opened");

        Ok(Self {
            state: RwLock::new(MarketState {
                currencies,
                settings,
            }),
            adapter,
            config,
        })
    }

    /// Flush settings and end the store lifecycle.
    ///
    /// Currency rows are write-through and already durable.
    #[instrument(skip(self))]
    pub async fn close(&self) -> MarketResult<()> {
        let state = self.state.read().await;
        self.save_setting(keys::BASE_CURRENCY, state.settings.base.as_str())
            .await?;
        self.save_setting(
            keys::CHANNEL_ID,
            state.settings.channel_id.as_deref().unwrap_or(""),
        )
        .await?;
        self.save_setting(
            keys::MANAGER_ROLE_ID,
            state.settings.manager_role_id.as_deref().unwrap_or(""),
        )
        .await?;
        info!("Market store closed");
        Ok(())
    }

    /// Get a snapshot of one currency.
    pub async fn get(&self, symbol: &Symbol) -> MarketResult<Currency> {
        let state = self.state.read().await;
        state
            .currencies
            .get(symbol)
            .map(|record| record.snapshot(symbol))
            .ok_or_else(|| MarketError::NotFound(symbol.clone()))
    }

    /// Snapshot every currency, ordered by symbol.
    pub async fn list(&self) -> Vec<Currency> {
        let state = self.state.read().await;
        let mut currencies: Vec<Currency> = state
            .currencies
            .iter()
            .map(|(symbol, record)| record.snapshot(symbol))
            .collect();
        currencies.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        currencies
    }

    /// Rate history for one currency, oldest first.
    pub async fn history(&self, symbol: &Symbol) -> MarketResult<Vec<f64>> {
        let state = self.state.read().await;
        state
            .currencies
            .get(symbol)
            .map(|record| record.history.as_slice().to_vec())
            .ok_or_else(|| MarketError::NotFound(symbol.clone()))
    }

    /// Current base currency symbol.
    pub async fn base(&self) -> Symbol {
        self.state.read().await.settings.base.clone()
    }

    /// Snapshot of the market settings.
    pub async fn settings(&self) -> MarketSettings {
        self.state.read().await.settings.clone()
    }

    /// Set a currency's rate, appending the new value to its history.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn set_rate(&self, symbol: &Symbol, new_rate: f64) -> MarketResult<()> {
        validate_rate(new_rate)?;
        let rounded = round_rate(new_rate);
        validate_rate(rounded)?;

        let mut state = self.state.write().await;
        let row = {
            let record = state
                .currencies
                .get(symbol)
                .ok_or_else(|| MarketError::NotFound(symbol.clone()))?;
            CurrencyRow {
                symbol: symbol.clone(),
                rate: rounded,
                volatility: record.volatility,
                name: record.name.clone(),
            }
        };

        self.persist_rate(&row).await?;

        let record = state
            .currencies
            .get_mut(symbol)
            .ok_or_else(|| MarketError::NotFound(symbol.clone()))?;
        record.rate = rounded;
        record.history.push(rounded);
        info!(rate = rounded, "Rate set");
        Ok(())
    }

    /// Set a currency's volatility.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn set_volatility(&self, symbol: &Symbol, new_volatility: f64) -> MarketResult<()> {
        validate_volatility(new_volatility)?;

        let mut state = self.state.write().await;
        let row = {
            let record = state
                .currencies
                .get(symbol)
                .ok_or_else(|| MarketError::NotFound(symbol.clone()))?;
            CurrencyRow {
                symbol: symbol.clone(),
                rate: record.rate,
                volatility: new_volatility,
                name: record.name.clone(),
            }
        };

        self.persist_row(&row).await?;

        let record = state
            .currencies
            .get_mut(symbol)
            .ok_or_else(|| MarketError::NotFound(symbol.clone()))?;
        record.volatility = new_volatility;
        info!(volatility = new_volatility, "Volatility set");
        Ok(())
    }

    /// Add a new currency, seeding its history with the initial rate.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn add(
        &self,
        symbol: &Symbol,
        rate: f64,
        volatility: Option<f64>,
        name: Option<String>,
    ) -> MarketResult<()> {
        if !symbol.is_valid() {
            return Err(MarketError::InvalidValue {
                field: "symbol",
                message: format!("not a valid symbol: {symbol:?}"),
            });
        }
        validate_rate(rate)?;
        let rounded = round_rate(rate);
        validate_rate(rounded)?;
        let volatility = volatility.unwrap_or(DEFAULT_VOLATILITY);
        validate_volatility(volatility)?;

        let mut state = self.state.write().await;
        if state.currencies.contains_key(symbol) {
            return Err(MarketError::AlreadyExists(symbol.clone()));
        }

        let row = CurrencyRow {
            symbol: symbol.clone(),
            rate: rounded,
            volatility,
            name: name.clone(),
        };
        self.persist_rate(&row).await?;

        state.currencies.insert(
            symbol.clone(),
            CurrencyRecord {
                rate: rounded,
                volatility,
                name,
                history: HistoryWindow::seeded(rounded),
            },
        );
        info!(rate = rounded, volatility, "Currency added");
        Ok(())
    }

    /// Remove a currency and its history. The base currency cannot be removed.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn remove(&self, symbol: &Symbol) -> MarketResult<()> {
        let mut state = self.state.write().await;
        if *symbol == state.settings.base {
            return Err(MarketError::IsBaseCurrency(symbol.clone()));
        }
        if !state.currencies.contains_key(symbol) {
            return Err(MarketError::NotFound(symbol.clone()));
        }

        persisted(
            self.config.persist_timeout,
            "delete_currency",
            self.adapter.delete_currency(symbol),
        )
        .await?;

        state.currencies.remove(symbol);
        info!("Currency removed");
        Ok(())
    }

    /// Cross rate between two currencies: how much of `to` one unit of
    /// `from` buys.
    pub async fn cross_rate(&self, from: &Symbol, to: &Symbol) -> MarketResult<f64> {
        let state = self.state.read().await;
        let from_rate = state
            .currencies
            .get(from)
            .map(|record| record.rate)
            .ok_or_else(|| MarketError::NotFound(from.clone()))?;
        let to_rate = state
            .currencies
            .get(to)
            .map(|record| record.rate)
            .ok_or_else(|| MarketError::NotFound(to.clone()))?;
        Ok(round_rate(to_rate / from_rate))
    }

    /// Convert an amount between two currencies at the current cross rate.
    pub async fn convert(&self, from: &Symbol, to: &Symbol, amount: f64) -> MarketResult<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(MarketError::InvalidValue {
                field: "amount",
                message: format!("must be a positive number, got {amount}"),
            });
        }
        let rate = self.cross_rate(from, to).await?;
        Ok(round_rate(amount * rate))
    }

    /// Human-readable daily rate summary against the base currency.
    pub async fn digest(&self) -> String {
        let state = self.state.read().await;
        let base = &state.settings.base;
        let mut symbols: Vec<&Symbol> = state
            .currencies
            .keys()
            .filter(|symbol| *symbol != base)
            .collect();
        symbols.sort();

        let mut lines = vec![format!("Exchange rates for {base} today:")];
        for symbol in symbols {
            let rate = state.currencies[symbol].rate;
            lines.push(format!("1 {base} = {rate} {symbol}"));
        }
        lines.join("\n")
    }

    /// Set or clear the digest channel identifier.
    #[instrument(skip(self))]
    pub async fn set_channel(&self, channel: Option<String>) -> MarketResult<()> {
        let channel = channel.filter(|value| !value.is_empty());
        let mut state = self.state.write().await;
        self.save_setting(keys::CHANNEL_ID, channel.as_deref().unwrap_or(""))
            .await?;
        state.settings.channel_id = channel;
        info!("Digest channel updated");
        Ok(())
    }

    /// Set or clear the currency-manager role identifier.
    #[instrument(skip(self))]
    pub async fn set_manager_role(&self, role: Option<String>) -> MarketResult<()> {
        let role = role.filter(|value| !value.is_empty());
        let mut state = self.state.write().await;
        self.save_setting(keys::MANAGER_ROLE_ID, role.as_deref().unwrap_or(""))
            .await?;
        state.settings.manager_role_id = role;
        info!("Manager role updated");
        Ok(())
    }

    /// Persist a row change without touching the stored history.
    pub(crate) async fn persist_row(&self, row: &CurrencyRow) -> MarketResult<()> {
        persisted(
            self.config.persist_timeout,
            "upsert_currency",
            self.adapter.upsert_currency(row),
        )
        .await
    }

    /// Persist a rate change: row upsert plus history append.
    pub(crate) async fn persist_rate(&self, row: &CurrencyRow) -> MarketResult<()> {
        self.persist_row(row).await?;
        persisted(
            self.config.persist_timeout,
            "append_history",
            self.adapter.append_history(&row.symbol, row.rate, now()),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn save_setting(&self, key: &str, value: &str) -> MarketResult<()> {
        persisted(
            self.config.persist_timeout,
            "save_setting",
            self.adapter.save_setting(key, value),
        )
        .await
    }
}

async fn load_setting(
    adapter: &dyn PersistenceAdapter,
    timeout: Duration,
    key: &str,
) -> MarketResult<Option<String>> {
    let value = persisted(timeout, "load_setting", adapter.load_setting(key)).await?;
    Ok(value.filter(|value| !value.is_empty()))
}

/// Write the default market into an empty backing store.
async fn seed_market(
    adapter: &dyn PersistenceAdapter,
    timeout: Duration,
) -> MarketResult<Vec<CurrencyRow>> {
    let mut rows = Vec::with_capacity(SEED_MARKET.len());
    for (symbol, rate, volatility) in SEED_MARKET {
        let row = CurrencyRow {
            symbol: Symbol::new(symbol),
            rate,
            volatility,
            name: None,
        };
        persisted(timeout, "upsert_currency", adapter.upsert_currency(&row)).await?;
        persisted(
            timeout,
            "append_history",
            adapter.append_history(&row.symbol, rate, now()),
        )
        .await?;
        rows.push(row);
    }
    persisted(
        timeout,
        "save_setting",
        adapter.save_setting(keys::BASE_CURRENCY, SEED_BASE),
    )
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryAdapter;

    async fn open_default() -> (Arc<MemoryAdapter>, Arc<RateStore>) {
        let adapter = Arc::new(MemoryAdapter::new());
        let store = RateStore::open(adapter.clone(), StoreConfig::default())
            .await
            .unwrap();
        (adapter, Arc::new(store))
    }

    #[tokio::test]
    async fn test_open_seeds_default_market() {
        let (_, store) = open_default().await;

        let currencies = store.list().await;
        assert_eq!(currencies.len(), 4);
        assert_eq!(store.base().await.as_str(), "SOL");

        let sol = store.get(&Symbol::new("SOL")).await.unwrap();
        assert_eq!(sol.rate, 1.0);
        let lun = store.get(&Symbol::new("LUN")).await.unwrap();
        assert_eq!(lun.rate, 3.5);
        assert_eq!(store.history(&Symbol::new("LUN")).await.unwrap(), vec![3.5]);
    }

    #[tokio::test]
    async fn test_open_without_seeding_fails_on_empty_store() {
        let adapter = Arc::new(MemoryAdapter::new());
        let config = StoreConfig {
            seed_default_market: false,
            ..Default::default()
        };
        let err = RateStore::open(adapter, config).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }

    #[tokio::test]
    async fn test_reopen_restores_state() {
        let (adapter, store) = open_default().await;
        let foo = Symbol::new("FOO");
        store.add(&foo, 2.0, Some(0.05), None).await.unwrap();
        store.set_rate(&foo, 2.5).await.unwrap();
        store.set_channel(Some("general".to_string())).await.unwrap();
        store.close().await.unwrap();
        drop(store);

        let reopened = RateStore::open(adapter, StoreConfig::default())
            .await
            .unwrap();
        let loaded = reopened.get(&foo).await.unwrap();
        assert_eq!(loaded.rate, 2.5);
        assert_eq!(reopened.history(&foo).await.unwrap(), vec![2.0, 2.5]);
        assert_eq!(
            reopened.settings().await.channel_id,
            Some("general".to_string())
        );
    }

    #[tokio::test]
    async fn test_add_get_and_history_scenario() {
        let (_, store) = open_default().await;
        let foo = Symbol::new("FOO");

        store.add(&foo, 2.0, Some(0.05), None).await.unwrap();
        let currency = store.get(&foo).await.unwrap();
        assert_eq!(currency.rate, 2.0);
        assert_eq!(currency.volatility, 0.05);
        assert_eq!(store.history(&foo).await.unwrap(), vec![2.0]);

        store.set_rate(&foo, 2.5).await.unwrap();
        assert_eq!(store.history(&foo).await.unwrap(), vec![2.0, 2.5]);
    }

    #[tokio::test]
    async fn test_add_duplicate_rejected() {
        let (_, store) = open_default().await;
        let err = store
            .add(&Symbol::new("LUN"), 1.0, None, None)
            .await
            .unwrap_err();
        assert_eq!(err, MarketError::AlreadyExists(Symbol::new("LUN")));
    }

    #[tokio::test]
    async fn test_add_defaults_volatility() {
        let (_, store) = open_default().await;
        let bar = Symbol::new("BAR");
        store.add(&bar, 1.5, None, Some("Barium".to_string())).await.unwrap();

        let currency = store.get(&bar).await.unwrap();
        assert_eq!(currency.volatility, DEFAULT_VOLATILITY);
        assert_eq!(currency.name.as_deref(), Some("Barium"));
    }

    #[tokio::test]
    async fn test_add_invalid_symbol_rejected() {
        let (_, store) = open_default().await;
        let err = store
            .add(&Symbol::new("BAD-SYM"), 1.0, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }

    #[tokio::test]
    async fn test_set_rate_unknown_symbol() {
        let (_, store) = open_default().await;
        let err = store.set_rate(&Symbol::new("XYZ"), 1.0).await.unwrap_err();
        assert_eq!(err, MarketError::NotFound(Symbol::new("XYZ")));
    }

    #[tokio::test]
    async fn test_set_rate_rounds_to_four_decimals() {
        let (_, store) = open_default().await;
        let lun = Symbol::new("LUN");
        store.set_rate(&lun, 3.14159).await.unwrap();
        assert_eq!(store.get(&lun).await.unwrap().rate, 3.1416);
    }

    #[tokio::test]
    async fn test_set_volatility_bounds() {
        let (_, store) = open_default().await;
        let lun = Symbol::new("LUN");

        store.set_volatility(&lun, 0.3).await.unwrap();
        assert_eq!(store.get(&lun).await.unwrap().volatility, 0.3);

        assert!(store.set_volatility(&lun, -0.1).await.is_err());
        assert!(store.set_volatility(&lun, 1.0).await.is_err());
        // Rejected values never applied
        assert_eq!(store.get(&lun).await.unwrap().volatility, 0.3);
    }

    #[tokio::test]
    async fn test_remove_base_rejected() {
        let (_, store) = open_default().await;
        let before = store.list().await;

        let err = store.remove(&Symbol::new("SOL")).await.unwrap_err();
        assert_eq!(err, MarketError::IsBaseCurrency(Symbol::new("SOL")));
        assert_eq!(store.list().await, before);
    }

    #[tokio::test]
    async fn test_remove_unknown_and_present() {
        let (_, store) = open_default().await;
        assert_eq!(
            store.remove(&Symbol::new("XYZ")).await.unwrap_err(),
            MarketError::NotFound(Symbol::new("XYZ"))
        );

        store.remove(&Symbol::new("VEX")).await.unwrap();
        assert!(store.get(&Symbol::new("VEX")).await.is_err());
    }

    #[tokio::test]
    async fn test_persistence_failure_rolls_back() {
        let (adapter, store) = open_default().await;
        let lun = Symbol::new("LUN");

        adapter.set_fail_writes(true);
        let err = store.set_rate(&lun, 9.9).await.unwrap_err();
        assert_eq!(err.error_code(), "PERSISTENCE_FAILURE");

        // In-memory state untouched
        assert_eq!(store.get(&lun).await.unwrap().rate, 3.5);
        assert_eq!(store.history(&lun).await.unwrap(), vec![3.5]);
    }

    #[tokio::test]
    async fn test_persistence_timeout_rolls_back() {
        let adapter = Arc::new(MemoryAdapter::new());
        let config = StoreConfig {
            persist_timeout: Duration::from_millis(10),
            ..Default::default()
        };
        let store = RateStore::open(adapter.clone(), config).await.unwrap();
        adapter.set_write_delay(Some(Duration::from_millis(100)));

        let lun = Symbol::new("LUN");
        let err = store.set_rate(&lun, 9.9).await.unwrap_err();
        assert_eq!(err.error_code(), "TIMEOUT");
        assert_eq!(store.get(&lun).await.unwrap().rate, 3.5);
    }

    #[tokio::test]
    async fn test_cross_rate_and_convert() {
        let (_, store) = open_default().await;
        let sol = Symbol::new("SOL");
        let lun = Symbol::new("LUN");

        assert_eq!(store.cross_rate(&sol, &lun).await.unwrap(), 3.5);
        assert_eq!(store.cross_rate(&lun, &sol).await.unwrap(), 0.2857);
        assert_eq!(store.convert(&sol, &lun, 2.0).await.unwrap(), 7.0);

        assert!(store.convert(&sol, &lun, 0.0).await.is_err());
        assert!(store.convert(&sol, &lun, f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_digest_lists_non_base_rates() {
        let (_, store) = open_default().await;
        let digest = store.digest().await;

        assert!(digest.starts_with("Exchange rates for SOL today:"));
        assert!(digest.contains("1 SOL = 3.5 LUN"));
        assert!(digest.contains("1 SOL = 0.8 TAR"));
        assert!(!digest.contains("= 1 SOL"));
    }

    #[tokio::test]
    async fn test_concurrent_set_rates_all_applied() {
        let (_, store) = open_default().await;

        let symbols = ["LUN", "TAR", "VEX"];
        let mut handles = Vec::new();
        for (i, name) in symbols.iter().enumerate() {
            let store = store.clone();
            let symbol = Symbol::new(*name);
            let rate = 10.0 + i as f64;
            handles.push(tokio::spawn(async move {
                store.set_rate(&symbol, rate).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for (i, name) in symbols.iter().enumerate() {
            let currency = store.get(&Symbol::new(*name)).await.unwrap();
            assert_eq!(currency.rate, 10.0 + i as f64);
        }
    }
}
