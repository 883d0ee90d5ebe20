//! Core domain types shared by the order book, graph and detector modules.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Currencies
// =============================================================================

/// Supported currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "GBP")]
    Gbp,
    #[serde(rename = "CHF")]
    Chf,
}

impl Currency {
    /// ISO code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Chf => "CHF",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Supported instruments, ordered `(base, quote)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CurrencyPair {
    #[serde(rename = "EUR_USD")]
    EurUsd,
    #[serde(rename = "EUR_GBP")]
    EurGbp,
    #[serde(rename = "USD_GBP")]
    UsdGbp,
    #[serde(rename = "EUR_CHF")]
    EurChf,
    #[serde(rename = "GBP_CHF")]
    GbpChf,
    #[serde(rename = "USD_CHF")]
    UsdChf,
}

impl CurrencyPair {
    /// Every enumerated instrument, in declaration order
    pub const ALL: [CurrencyPair; 6] = [
        CurrencyPair::EurUsd,
        CurrencyPair::EurGbp,
        CurrencyPair::UsdGbp,
        CurrencyPair::EurChf,
        CurrencyPair::GbpChf,
        CurrencyPair::UsdChf,
    ];

    pub fn base(&self) -> Currency {
        match self {
            CurrencyPair::EurUsd | CurrencyPair::EurGbp | CurrencyPair::EurChf => Currency::Eur,
            CurrencyPair::UsdGbp | CurrencyPair::UsdChf => Currency::Usd,
            CurrencyPair::GbpChf => Currency::Gbp,
        }
    }

    pub fn quote(&self) -> Currency {
        match self {
            CurrencyPair::EurUsd => Currency::Usd,
            CurrencyPair::EurGbp | CurrencyPair::UsdGbp => Currency::Gbp,
            CurrencyPair::EurChf | CurrencyPair::GbpChf | CurrencyPair::UsdChf => Currency::Chf,
        }
    }

    /// The other side of the pair, or `None` if `currency` is not part of it
    pub fn opposing(&self, currency: Currency) -> Option<Currency> {
        if currency == self.base() {
            Some(self.quote())
        } else if currency == self.quote() {
            Some(self.base())
        } else {
            None
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base(), self.quote())
    }
}

// =============================================================================
// Pair lookup
// =============================================================================

/// Resolves a `(start, end)` currency name pair to its instrument.
///
/// Both `BASE_QUOTE` and `QUOTE_BASE` keys are registered because a cycle can
/// traverse an instrument in either direction. Read-only after construction,
/// shared across detector runs behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CurrencyPairLookup {
    by_key: HashMap<String, CurrencyPair>,
}

impl CurrencyPairLookup {
    /// Lookup over every enumerated instrument
    pub fn new() -> Self {
        Self::from_pairs(&CurrencyPair::ALL)
    }

    /// Lookup restricted to `pairs`; other instruments do not resolve
    pub fn from_pairs(pairs: &[CurrencyPair]) -> Self {
        let mut by_key = HashMap::with_capacity(pairs.len() * 2);
        for pair in pairs {
            by_key.insert(format!("{}_{}", pair.base(), pair.quote()), *pair);
            by_key.insert(format!("{}_{}", pair.quote(), pair.base()), *pair);
        }
        Self { by_key }
    }

    pub fn resolve(&self, start: Currency, end: Currency) -> Option<CurrencyPair> {
        self.by_key.get(&format!("{}_{}", start, end)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Default for CurrencyPairLookup {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Price levels
// =============================================================================

/// Order book mutation requested by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Insert,
    Modify,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert => write!(f, "INSERT"),
            Action::Modify => write!(f, "MODIFY"),
            Action::Delete => write!(f, "DELETE"),
        }
    }
}

/// Book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

/// A single resting price level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Unique within one side of one instrument's book
    pub id: u64,
    pub instrument: CurrencyPair,
    pub is_ask: bool,
    pub quantity: u32,
    pub price: Decimal,
}

impl PriceLevel {
    pub fn new(id: u64, instrument: CurrencyPair, is_ask: bool, quantity: u32, price: Decimal) -> Self {
        Self {
            id,
            instrument,
            is_ask,
            quantity,
            price,
        }
    }

    pub fn side(&self) -> Side {
        if self.is_ask {
            Side::Ask
        } else {
            Side::Bid
        }
    }
}

/// Feed message carried over the update channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub action: Action,
    pub level: PriceLevel,
}

impl PriceUpdate {
    pub fn new(action: Action, level: PriceLevel) -> Self {
        Self { action, level }
    }
}
