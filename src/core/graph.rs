//! Currency conversion graph
//!
//! Vertices are currencies, edges are conversions weighted by `-log(rate)`.
//! Multiplying rates along a path equals summing their logarithms, so a loop
//! whose rate product exceeds 1 shows up as a negative-weight cycle.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::orderbook::BestPrices;
use super::types::{Currency, CurrencyPair};

/// Decimal places kept for rates and edge weights
pub const GRAPH_DECIMAL_PLACES: u32 = 4;

/// A graph node is a currency
pub type Vertex = Currency;

/// Snapshot fed to the graph builder
pub type BestPriceSnapshot = BTreeMap<CurrencyPair, BestPrices>;

// =============================================================================
// LogBase
// =============================================================================

/// Logarithm base used to encode rates as weights and to decode them back.
///
/// Both directions read the same value (the graph carries the base it was
/// built with), so encoding and decoding can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogBase {
    #[default]
    Natural,
    Binary,
}

impl LogBase {
    /// `-log(rate)`; `None` for non-positive or non-finite input
    pub fn weight(&self, rate: f64) -> Option<f64> {
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        let log = match self {
            LogBase::Natural => rate.ln(),
            LogBase::Binary => rate.log2(),
        };
        Some(-log)
    }

    /// Inverse of [`LogBase::weight`]: `base^(-weight)`
    pub fn rate(&self, weight: f64) -> f64 {
        match self {
            LogBase::Natural => (-weight).exp(),
            LogBase::Binary => (-weight).exp2(),
        }
    }
}

impl fmt::Display for LogBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogBase::Natural => write!(f, "natural"),
            LogBase::Binary => write!(f, "binary"),
        }
    }
}

// =============================================================================
// Graph
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub start: Vertex,
    pub end: Vertex,
    pub weight: Decimal,
}

impl Edge {
    pub fn new(start: Vertex, end: Vertex, weight: Decimal) -> Self {
        Self { start, end, weight }
    }
}

/// Immutable graph built fresh for every evaluation
#[derive(Debug, Clone)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    adjacency: BTreeMap<Vertex, Vec<Edge>>,
    log_base: LogBase,
}

impl Graph {
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn adjacency(&self) -> &BTreeMap<Vertex, Vec<Edge>> {
        &self.adjacency
    }

    pub fn outgoing(&self, vertex: Vertex) -> &[Edge] {
        self.adjacency.get(&vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First edge `start -> end` in adjacency order
    pub fn edge_between(&self, start: Vertex, end: Vertex) -> Option<&Edge> {
        self.outgoing(start).iter().find(|e| e.end == end)
    }

    pub fn index_of(&self, vertex: Vertex) -> Option<usize> {
        self.vertices.iter().position(|v| *v == vertex)
    }

    pub fn log_base(&self) -> LogBase {
        self.log_base
    }
}

// =============================================================================
// GraphBuilder
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Non-positive rate {rate} on {pair}: logarithm undefined")]
    NonPositiveRate { pair: CurrencyPair, rate: Decimal },

    #[error("Weight for rate {rate} on {pair} is not representable")]
    UnrepresentableWeight { pair: CurrencyPair, rate: Decimal },
}

/// Turns a best-price snapshot into a conversion graph
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    log_base: LogBase,
}

impl GraphBuilder {
    pub fn new(log_base: LogBase) -> Self {
        Self { log_base }
    }

    pub fn log_base(&self) -> LogBase {
        self.log_base
    }

    /// Build the graph: per pair `base -> quote` weighted by the best bid and
    /// `quote -> base` weighted by the best ask.
    pub fn build(&self, snapshot: &BestPriceSnapshot) -> Result<Graph, GraphError> {
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut edges: Vec<Edge> = Vec::with_capacity(snapshot.len() * 2);
        let mut adjacency: BTreeMap<Vertex, Vec<Edge>> = BTreeMap::new();

        for (pair, prices) in snapshot {
            let base = pair.base();
            let quote = pair.quote();
            for currency in [base, quote] {
                if !vertices.contains(&currency) {
                    vertices.push(currency);
                }
            }

            let forward = Edge::new(base, quote, self.encode(*pair, prices.bid.price)?);
            let backward = Edge::new(quote, base, self.encode(*pair, prices.ask.price)?);
            for edge in [forward, backward] {
                adjacency.entry(edge.start).or_default().push(edge.clone());
                edges.push(edge);
            }
        }

        Ok(Graph {
            vertices,
            edges,
            adjacency,
            log_base: self.log_base,
        })
    }

    /// Round the rate to 4 dp, take `-log`, round the weight to 4 dp
    fn encode(&self, pair: CurrencyPair, price: Decimal) -> Result<Decimal, GraphError> {
        let rate = round_half_up(price);
        if rate <= Decimal::ZERO {
            return Err(GraphError::NonPositiveRate { pair, rate });
        }
        let weight = rate
            .to_f64()
            .and_then(|r| self.log_base.weight(r))
            .and_then(Decimal::from_f64)
            .ok_or(GraphError::UnrepresentableWeight { pair, rate })?;
        Ok(round_half_up(weight))
    }
}

fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(GRAPH_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PriceLevel;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn prices(pair: CurrencyPair, bid: Decimal, ask: Decimal) -> BestPrices {
        BestPrices {
            bid: PriceLevel::new(1, pair, false, 1, bid),
            ask: PriceLevel::new(2, pair, true, 1, ask),
        }
    }

    fn snapshot(entries: &[(CurrencyPair, &str, &str)]) -> BestPriceSnapshot {
        entries
            .iter()
            .map(|(pair, bid, ask)| (*pair, prices(*pair, dec(bid), dec(ask))))
            .collect()
    }

    #[test]
    fn test_edge_and_vertex_counts() {
        let snap = snapshot(&[
            (CurrencyPair::UsdGbp, "1.24", "1.22"),
            (CurrencyPair::EurUsd, "1.08", "1.10"),
            (CurrencyPair::EurGbp, "0.84", "0.86"),
            (CurrencyPair::EurChf, "1.003", "1.004"),
        ]);
        let graph = GraphBuilder::default().build(&snap).unwrap();

        assert_eq!(graph.edges().len(), 2 * snap.len());
        assert!(graph.vertices().len() <= 2 * snap.len());
        assert_eq!(graph.vertices().len(), 4);
        let adjacency_edges: usize = graph.adjacency().values().map(Vec::len).sum();
        assert_eq!(adjacency_edges, graph.edges().len());
    }

    #[test]
    fn test_edge_direction_and_weights() {
        let snap = snapshot(&[(CurrencyPair::UsdGbp, "1.24", "1.22")]);
        let graph = GraphBuilder::new(LogBase::Natural).build(&snap).unwrap();

        // -ln(1.24) = -0.215111 -> -0.2151 ; -ln(1.22) = -0.198851 -> -0.1989
        let forward = graph.edge_between(Currency::Usd, Currency::Gbp).unwrap();
        let backward = graph.edge_between(Currency::Gbp, Currency::Usd).unwrap();
        assert_eq!(forward.weight, dec("-0.2151"));
        assert_eq!(backward.weight, dec("-0.1989"));
    }

    #[test]
    fn test_rates_rounded_before_logarithm() {
        // 1/1.24 = 0.806451... rounds to 0.8065 before the logarithm
        let snap: BestPriceSnapshot = [(
            CurrencyPair::UsdGbp,
            prices(CurrencyPair::UsdGbp, dec("1.24"), Decimal::ONE / dec("1.24")),
        )]
        .into_iter()
        .collect();
        let graph = GraphBuilder::default().build(&snap).unwrap();

        let backward = graph.edge_between(Currency::Gbp, Currency::Usd).unwrap();
        assert_eq!(backward.weight, dec("0.2151"));
    }

    #[test]
    fn test_binary_base_weights() {
        let snap = snapshot(&[(CurrencyPair::EurUsd, "2", "0.5")]);
        let graph = GraphBuilder::new(LogBase::Binary).build(&snap).unwrap();

        assert_eq!(graph.log_base(), LogBase::Binary);
        assert_eq!(graph.edge_between(Currency::Eur, Currency::Usd).unwrap().weight, dec("-1"));
        assert_eq!(graph.edge_between(Currency::Usd, Currency::Eur).unwrap().weight, dec("1"));
    }

    #[test]
    fn test_rate_rounding_to_zero_is_rejected() {
        let snap = snapshot(&[(CurrencyPair::EurUsd, "0.00001", "1.1")]);
        let result = GraphBuilder::default().build(&snap);
        assert!(matches!(result, Err(GraphError::NonPositiveRate { .. })));
    }

    #[test]
    fn test_empty_snapshot_builds_empty_graph() {
        let graph = GraphBuilder::default().build(&BestPriceSnapshot::new()).unwrap();
        assert!(graph.vertices().is_empty());
        assert!(graph.edges().is_empty());
        assert!(graph.outgoing(Currency::Eur).is_empty());
    }

    #[test]
    fn test_log_base_rejects_non_positive() {
        assert!(LogBase::Natural.weight(0.0).is_none());
        assert!(LogBase::Binary.weight(-2.0).is_none());
        assert!(LogBase::Natural.weight(f64::NAN).is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn weight_round_trip_recovers_rate(bid_ticks in 1_000i64..50_000, ask_ticks in 1_000i64..50_000) {
                // Rates in [0.1, 5.0) with 4 dp
                let bid = Decimal::new(bid_ticks, 4);
                let ask = Decimal::new(ask_ticks, 4);
                let snap: BestPriceSnapshot = [(CurrencyPair::EurUsd, prices(CurrencyPair::EurUsd, bid, ask))]
                    .into_iter()
                    .collect();

                for base in [LogBase::Natural, LogBase::Binary] {
                    let graph = GraphBuilder::new(base).build(&snap).unwrap();
                    for (edge, rate) in graph.edges().iter().zip([bid, ask]) {
                        let decoded = base.rate(edge.weight.to_f64().unwrap());
                        let original = rate.to_f64().unwrap();
                        // 4 dp weight rounding bounds the relative error by ~5e-5 (natural) / ~3.5e-5 (binary)
                        prop_assert!(((decoded - original) / original).abs() < 1e-4,
                            "rate {} decoded as {}", original, decoded);
                    }
                }
            }

            #[test]
            fn graph_shape_for_any_subset(mask in 1u8..64) {
                let snap: BestPriceSnapshot = CurrencyPair::ALL
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, pair)| (*pair, prices(*pair, dec("1.01"), dec("0.99"))))
                    .collect();
                let graph = GraphBuilder::default().build(&snap).unwrap();
                prop_assert_eq!(graph.edges().len(), 2 * snap.len());
                prop_assert!(graph.vertices().len() <= 2 * snap.len());
            }
        }
    }
}
