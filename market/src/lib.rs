//! DriftFX Market Engine
//!
//! Authoritative in-memory model of a small simulated FX market: a set of
//! synthetic currencies, each with a floating rate against a designated
//! base currency, evolving daily by bounded random perturbation.
//!
//! # Features
//!
//! - Whole-market transactional rate store with write-through persistence
//! - Geometric random-walk daily rate simulation
//! - Base-currency rebasing that preserves all relative rates
//! - Cross-rate series preparation with spline smoothing for charts
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use driftfx_market::{MemoryAdapter, RateStore, StoreConfig};
//!
//! let adapter = Arc::new(MemoryAdapter::new());
//! let store = Arc::new(RateStore::open(adapter, StoreConfig::default()).await?);
//!
//! let lun = "LUN".into();
//! let currency = store.get(&lun).await?;
//! println!("1 {} = {} {}", store.base().await, currency.rate, lun);
//! ```

pub mod currency;
pub mod error;
pub mod persistence;
pub mod rebase;
pub mod series;
pub mod settings;
pub mod simulator;
pub mod store;

pub use currency::{Currency, HistoryWindow, DEFAULT_VOLATILITY};
pub use error::{MarketError, MarketResult};
pub use persistence::{CurrencyRow, MemoryAdapter, PersistenceAdapter, PersistenceError};
pub use rebase::RebaseEngine;
pub use series::{ChartData, CrossSeries, CurvePoint, SeriesBuilder, SeriesPoint};
pub use settings::MarketSettings;
pub use simulator::{RateSimulator, TickFailure, TickMove, TickReport};
pub use store::{RateStore, StoreConfig};
