//! Per-instrument top-of-book state
//!
//! Every enumerated instrument owns one `InstrumentBook` (bid side + ask side)
//! behind its own `RwLock`. The map of locks is built once at startup and never
//! mutated afterwards, so updates to different instruments never contend.
//!
//! # Best value maintenance
//! After every mutation the affected side re-derives its best level over all
//! remaining levels. This is O(n) per update; n is the number of resting levels
//! on one side (a handful), so a full scan is kept instead of incremental
//! bookkeeping.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{Action, CurrencyPair, PriceLevel, Side};

/// Decimal places of a synthesized counter price
const SYNTHETIC_PRICE_DP: u32 = 3;

/// Error type for order book ingestion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderBookError {
    #[error("Invalid price {price} for level {id} on {instrument}: price must be > 0")]
    InvalidPrice {
        instrument: CurrencyPair,
        id: u64,
        price: Decimal,
    },

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(CurrencyPair),
}

/// What an applied update did to the book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Level inserted or replaced
    Upserted,
    /// Level removed
    Removed,
    /// MODIFY/DELETE referenced an id that is not resting on that side
    MissingLevel,
}

// =============================================================================
// OrderBookSide
// =============================================================================

/// One side of one instrument's book
#[derive(Debug, Clone)]
pub struct OrderBookSide {
    side: Side,
    levels: BTreeMap<u64, PriceLevel>,
    best: Option<PriceLevel>,
}

impl OrderBookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            best: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&PriceLevel> {
        self.levels.get(&id)
    }

    /// Best resting level (min price for asks, max price for bids)
    pub fn best(&self) -> Option<&PriceLevel> {
        self.best.as_ref()
    }

    fn apply(&mut self, action: Action, level: PriceLevel) -> UpdateOutcome {
        let outcome = match action {
            Action::Insert => {
                self.levels.insert(level.id, level);
                UpdateOutcome::Upserted
            }
            Action::Modify => match self.levels.get_mut(&level.id) {
                Some(existing) => {
                    *existing = level;
                    UpdateOutcome::Upserted
                }
                None => UpdateOutcome::MissingLevel,
            },
            Action::Delete => match self.levels.remove(&level.id) {
                Some(_) => UpdateOutcome::Removed,
                None => UpdateOutcome::MissingLevel,
            },
        };

        if outcome != UpdateOutcome::MissingLevel {
            self.recompute_best();
        }
        outcome
    }

    /// Full re-derivation of the best level. Ties go to the lowest id.
    fn recompute_best(&mut self) {
        let side = self.side;
        self.best = self
            .levels
            .values()
            .fold(None::<&PriceLevel>, |best, level| match best {
                None => Some(level),
                Some(current) => {
                    let better = match side {
                        Side::Ask => level.price < current.price,
                        Side::Bid => level.price > current.price,
                    };
                    if better {
                        Some(level)
                    } else {
                        Some(current)
                    }
                }
            })
            .cloned();
    }
}

// =============================================================================
// InstrumentBook
// =============================================================================

/// Both sides of one instrument
#[derive(Debug, Clone)]
pub struct InstrumentBook {
    instrument: CurrencyPair,
    bids: OrderBookSide,
    asks: OrderBookSide,
}

impl InstrumentBook {
    pub fn new(instrument: CurrencyPair) -> Self {
        Self {
            instrument,
            bids: OrderBookSide::new(Side::Bid),
            asks: OrderBookSide::new(Side::Ask),
        }
    }

    pub fn instrument(&self) -> CurrencyPair {
        self.instrument
    }

    pub fn bids(&self) -> &OrderBookSide {
        &self.bids
    }

    pub fn asks(&self) -> &OrderBookSide {
        &self.asks
    }

    pub fn apply(&mut self, action: Action, level: PriceLevel) -> UpdateOutcome {
        match level.side() {
            Side::Bid => self.bids.apply(action, level),
            Side::Ask => self.asks.apply(action, level),
        }
    }

    /// Best bid, synthesized from the best ask when no bid is resting
    pub fn best_bid(&self) -> Option<PriceLevel> {
        match self.bids.best() {
            Some(level) => Some(level.clone()),
            None => self.asks.best().and_then(synthesize_counter_level),
        }
    }

    /// Best ask, synthesized from the best bid when no ask is resting
    pub fn best_ask(&self) -> Option<PriceLevel> {
        match self.asks.best() {
            Some(level) => Some(level.clone()),
            None => self.bids.best().and_then(synthesize_counter_level),
        }
    }

    /// Both best values read together, `None` unless both are available
    pub fn best_prices(&self) -> Option<BestPrices> {
        Some(BestPrices {
            bid: self.best_bid()?,
            ask: self.best_ask()?,
        })
    }
}

/// Cold-start counter price: same id and quantity, flipped side,
/// price = 1 / opposite price rounded half-up to 3 dp.
fn synthesize_counter_level(opposite: &PriceLevel) -> Option<PriceLevel> {
    if opposite.price <= Decimal::ZERO {
        return None;
    }
    let price = (Decimal::ONE / opposite.price)
        .round_dp_with_strategy(SYNTHETIC_PRICE_DP, RoundingStrategy::MidpointAwayFromZero);
    if price.is_zero() {
        return None;
    }
    Some(PriceLevel {
        id: opposite.id,
        instrument: opposite.instrument,
        is_ask: !opposite.is_ask,
        quantity: opposite.quantity,
        price,
    })
}

/// Best bid/ask pair of one instrument at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPrices {
    pub bid: PriceLevel,
    pub ask: PriceLevel,
}

// =============================================================================
// OrderBookStore
// =============================================================================

/// Concurrency-safe store of every enumerated instrument's book
#[derive(Debug)]
pub struct OrderBookStore {
    books: HashMap<CurrencyPair, RwLock<InstrumentBook>>,
}

impl OrderBookStore {
    /// Create one empty book per enumerated instrument
    pub fn new() -> Self {
        let books = CurrencyPair::ALL
            .iter()
            .map(|pair| (*pair, RwLock::new(InstrumentBook::new(*pair))))
            .collect();
        Self { books }
    }

    fn book(&self, instrument: CurrencyPair) -> Result<&RwLock<InstrumentBook>, OrderBookError> {
        self.books
            .get(&instrument)
            .ok_or(OrderBookError::UnknownInstrument(instrument))
    }

    /// Apply one feed update to the level's instrument and side.
    ///
    /// The mutation and the best-value re-derivation happen under the same
    /// write guard, so readers never see a stale best for a committed update.
    pub async fn apply_update(&self, action: Action, level: PriceLevel) -> Result<UpdateOutcome, OrderBookError> {
        if action != Action::Delete && level.price <= Decimal::ZERO {
            return Err(OrderBookError::InvalidPrice {
                instrument: level.instrument,
                id: level.id,
                price: level.price,
            });
        }

        let instrument = level.instrument;
        let id = level.id;
        let side = level.side();
        let outcome = {
            let mut book = self.book(instrument)?.write().await;
            book.apply(action, level)
        };

        if outcome == UpdateOutcome::MissingLevel {
            match action {
                Action::Modify => warn!(
                    pair = %instrument,
                    id = id,
                    side = ?side,
                    "MODIFY for unknown price level ignored - feed and book diverged"
                ),
                _ => debug!(pair = %instrument, id = id, side = ?side, "DELETE for unknown price level ignored"),
            }
        }

        Ok(outcome)
    }

    pub async fn best_bid(&self, instrument: CurrencyPair) -> Option<PriceLevel> {
        self.books.get(&instrument)?.read().await.best_bid()
    }

    pub async fn best_ask(&self, instrument: CurrencyPair) -> Option<PriceLevel> {
        self.books.get(&instrument)?.read().await.best_ask()
    }

    /// Bid and ask of one instrument under a single read guard
    pub async fn best_prices(&self, instrument: CurrencyPair) -> Option<BestPrices> {
        self.books.get(&instrument)?.read().await.best_prices()
    }

    /// Best prices of every instrument priced on both sides.
    ///
    /// Instruments are read one at a time; tearing across instruments is
    /// accepted, tearing within one instrument is not.
    pub async fn snapshot(&self) -> BTreeMap<CurrencyPair, BestPrices> {
        let mut snapshot = BTreeMap::new();
        for pair in CurrencyPair::ALL {
            if let Some(prices) = self.best_prices(pair).await {
                snapshot.insert(pair, prices);
            }
        }
        snapshot
    }

    /// Clone of one instrument's book (diagnostics/tests)
    pub async fn book_snapshot(&self, instrument: CurrencyPair) -> Option<InstrumentBook> {
        Some(self.books.get(&instrument)?.read().await.clone())
    }
}

impl Default for OrderBookStore {
    fn default() -> Self {
        Self::new()
    }
}
