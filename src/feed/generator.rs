//! Synthetic price generator
//!
//! Keeps a small aggregated book per instrument around a drifting mid price
//! and produces a deterministic (seeded) stream of INSERT/MODIFY/DELETE
//! updates. Prices are 3 dp and unique per side, so every level is a
//! distinct price point.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::OrderbookListener;
use crate::config::FeedConfig;
use crate::core::types::{Action, CurrencyPair, PriceLevel, PriceUpdate};

/// Decimal places of generated prices
const PRICE_DP: u32 = 3;

/// Draws allowed when looking for a free price point on one side
const MAX_PRICE_ATTEMPTS: usize = 1_000;

/// Starting mid price per instrument
pub fn initial_mid(pair: CurrencyPair) -> Decimal {
    match pair {
        CurrencyPair::EurUsd => Decimal::new(1083, 3),
        CurrencyPair::EurGbp => Decimal::new(887, 3),
        CurrencyPair::UsdGbp => Decimal::new(818, 3),
        CurrencyPair::EurChf => Decimal::new(1003, 3),
        CurrencyPair::GbpChf => Decimal::new(1131, 3),
        CurrencyPair::UsdChf => Decimal::new(926, 3),
    }
}

// =============================================================================
// Generated book
// =============================================================================

#[derive(Debug, Clone)]
struct GeneratedSide {
    is_ask: bool,
    levels: BTreeMap<u64, PriceLevel>,
    prices: HashSet<Decimal>,
}

impl GeneratedSide {
    fn new(is_ask: bool) -> Self {
        Self {
            is_ask,
            levels: BTreeMap::new(),
            prices: HashSet::new(),
        }
    }

    /// Best level: lowest ask / highest bid
    fn top(&self) -> Option<&PriceLevel> {
        let levels = self.levels.values();
        if self.is_ask {
            levels.min_by(|a, b| a.price.cmp(&b.price))
        } else {
            levels.max_by(|a, b| a.price.cmp(&b.price))
        }
    }

    fn pop_top(&mut self) -> Option<PriceLevel> {
        let id = self.top()?.id;
        let level = self.levels.remove(&id)?;
        self.prices.remove(&level.price);
        Some(level)
    }

    fn insert(&mut self, level: PriceLevel) {
        self.prices.insert(level.price);
        self.levels.insert(level.id, level);
    }
}

#[derive(Debug, Clone)]
struct GeneratedBook {
    mid: Decimal,
    bids: GeneratedSide,
    asks: GeneratedSide,
}

impl GeneratedBook {
    fn side_mut(&mut self, is_ask: bool) -> &mut GeneratedSide {
        if is_ask {
            &mut self.asks
        } else {
            &mut self.bids
        }
    }
}

// =============================================================================
// PriceGenerator
// =============================================================================

/// Seeded generator of order book updates for every enumerated instrument
#[derive(Debug)]
pub struct PriceGenerator {
    rng: StdRng,
    levels_per_side: usize,
    price_range: f64,
    max_quantity: u32,
    next_id: u64,
    books: BTreeMap<CurrencyPair, GeneratedBook>,
}

impl PriceGenerator {
    /// Build the initial books: `levels_per_side` levels on each side
    pub fn new(config: &FeedConfig) -> Self {
        let mut generator = Self {
            rng: StdRng::seed_from_u64(config.seed),
            levels_per_side: config.levels_per_side,
            price_range: config.price_range,
            max_quantity: config.max_quantity,
            next_id: 0,
            books: BTreeMap::new(),
        };

        for pair in CurrencyPair::ALL {
            let mut book = GeneratedBook {
                mid: initial_mid(pair),
                bids: GeneratedSide::new(false),
                asks: GeneratedSide::new(true),
            };
            for is_ask in [false, true] {
                for _ in 0..generator.levels_per_side {
                    if let Some(level) = generator.fresh_level(pair, &book, is_ask) {
                        book.side_mut(is_ask).insert(level);
                    }
                }
            }
            generator.books.insert(pair, book);
        }
        generator
    }

    /// Current mid of an instrument
    pub fn mid(&self, pair: CurrencyPair) -> Option<Decimal> {
        self.books.get(&pair).map(|b| b.mid)
    }

    /// Current levels of one side, sorted by id
    pub fn levels(&self, pair: CurrencyPair, is_ask: bool) -> Vec<PriceLevel> {
        self.books
            .get(&pair)
            .map(|book| {
                let side = if is_ask { &book.asks } else { &book.bids };
                side.levels.values().cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Every current level as an INSERT, in shuffled order
    pub fn initial_updates(&mut self) -> Vec<PriceUpdate> {
        let mut updates: Vec<PriceUpdate> = self
            .books
            .values()
            .flat_map(|book| book.asks.levels.values().chain(book.bids.levels.values()))
            .cloned()
            .map(|level| PriceUpdate::new(Action::Insert, level))
            .collect();
        updates.shuffle(&mut self.rng);
        updates
    }

    /// Advance every book by one step.
    ///
    /// Per instrument: DELETE the top of both sides, MODIFY the next top of
    /// both sides around a mid recomputed from what is left, then INSERT one
    /// new level per side.
    pub fn tick(&mut self) -> Vec<PriceUpdate> {
        let mut updates = Vec::with_capacity(CurrencyPair::ALL.len() * 6);
        for pair in CurrencyPair::ALL {
            let Some(mut book) = self.books.remove(&pair) else {
                continue;
            };
            self.tick_book(pair, &mut book, &mut updates);
            self.books.insert(pair, book);
        }
        updates
    }

    fn tick_book(&mut self, pair: CurrencyPair, book: &mut GeneratedBook, updates: &mut Vec<PriceUpdate>) {
        for is_ask in [false, true] {
            if let Some(deleted) = book.side_mut(is_ask).pop_top() {
                updates.push(PriceUpdate::new(Action::Delete, deleted));
            }
        }

        let to_modify = [book.bids.pop_top(), book.asks.pop_top()];
        if let (Some(bid), Some(ask)) = (book.bids.top(), book.asks.top()) {
            book.mid = ((bid.price + ask.price) / Decimal::TWO)
                .round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero);
        }
        for previous in to_modify.into_iter().flatten() {
            match self.fresh_level(pair, book, previous.is_ask) {
                Some(fresh) => {
                    let modified = PriceLevel {
                        id: previous.id,
                        ..fresh
                    };
                    book.side_mut(modified.is_ask).insert(modified.clone());
                    updates.push(PriceUpdate::new(Action::Modify, modified));
                }
                // Already off the side; tell the listener it is gone
                None => updates.push(PriceUpdate::new(Action::Delete, previous)),
            }
        }

        for is_ask in [false, true] {
            if let Some(level) = self.fresh_level(pair, book, is_ask) {
                book.side_mut(is_ask).insert(level.clone());
                updates.push(PriceUpdate::new(Action::Insert, level));
            }
        }
    }

    /// New level at a price not yet used on this side, or `None` when no
    /// free price point turned up.
    fn fresh_level(&mut self, pair: CurrencyPair, book: &GeneratedBook, is_ask: bool) -> Option<PriceLevel> {
        let side = if is_ask { &book.asks } else { &book.bids };
        for _ in 0..MAX_PRICE_ATTEMPTS {
            let offset = self.rng.gen_range(0.001..self.price_range);
            let Some(offset) = Decimal::from_f64(offset) else {
                continue;
            };
            let raw = if is_ask { book.mid + offset } else { book.mid - offset };
            let price = raw.round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero);
            let quantity = self.rng.gen_range(1..self.max_quantity);
            if price <= Decimal::ZERO || side.prices.contains(&price) {
                continue;
            }
            self.next_id += 1;
            return Some(PriceLevel::new(self.next_id, pair, is_ask, quantity, price));
        }
        warn!(pair = %pair, is_ask, mid = %book.mid, "No free price point found, level skipped");
        None
    }

    /// Replay the current books to `listener` as INSERTs
    pub async fn subscribe(&mut self, listener: &dyn OrderbookListener) -> usize {
        let updates = self.initial_updates();
        let count = updates.len();
        for update in updates {
            listener.on_price_update(update.action, update.level).await;
        }
        debug!(levels = count, "Initial books replayed");
        count
    }

    /// Replay the books, then tick every `period` until shutdown.
    ///
    /// Returns the number of ticks produced.
    pub async fn run(
        mut self,
        listener: Arc<dyn OrderbookListener>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> u64 {
        self.subscribe(listener.as_ref()).await;

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        info!(period_ms = period.as_millis() as u64, "Price generator started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Price generator shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    for update in self.tick() {
                        listener.on_price_update(update.action, update.level).await;
                    }
                    ticks += 1;
                }
            }
        }
        info!(ticks, "Price generator stopped");
        ticks
    }
}
