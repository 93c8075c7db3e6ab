//! Market-wide settings persisted as key/value pairs.

use driftfx_common::Symbol;
use serde::{Deserialize, Serialize};

/// Keys under which settings are persisted.
pub mod keys {
    pub const BASE_CURRENCY: &str = "base_currency";
    pub const CHANNEL_ID: &str = "channel_id";
    pub const MANAGER_ROLE_ID: &str = "manager_role_id";
}

/// Administrative settings for the market.
///
/// Exactly one currency is the base; its rate is pinned at 1.0. The
/// channel and role identifiers are opaque to the engine and only
/// meaningful to the chat-platform layer above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Symbol of the base currency.
    pub base: Symbol,
    /// Identifier of the channel the daily digest is published to.
    pub channel_id: Option<String>,
    /// Identifier of the role allowed to manage currencies.
    pub manager_role_id: Option<String>,
}

impl MarketSettings {
    /// Settings for a fresh market with the given base.
    pub fn new(base: Symbol) -> Self {
        Self {
            base,
            channel_id: None,
            manager_role_id: None,
        }
    }
}
