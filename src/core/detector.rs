//! Negative-cycle detector.
//!
//! Bellman–Ford run from every vertex of a conversion graph. A negative cycle
//! in `-log(rate)` space is a loop whose rate product exceeds 1. Each loop is
//! priced with [`FactorCalculator`] and attributed to the instrument of the
//! edge that witnessed it; the best factor per instrument wins.
//!
//! The detector holds no mutable state. Distance and predecessor tables are
//! allocated per source run, so concurrent evaluations never share scratch
//! memory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::factor::{FactorCalculator, FactorError};
use super::graph::{Graph, Vertex};
use super::types::{CurrencyPair, CurrencyPairLookup};

/// Minimum improvement for a relaxation to count.
///
/// Weights are 4 dp decimals; loops that sum to exactly zero must not be
/// reported because of floating point noise.
pub const RELAX_EPSILON: f64 = 1e-9;

/// Configuration for the negative-cycle detector.
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    /// Abort a detection that runs longer than this (None = unbounded)
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectError {
    #[error("Detection exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Factor calculation failed: {0}")]
    Factor(#[from] FactorError),
}

/// One priced loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbitrageCycle {
    /// Instrument of the witnessing edge
    pub pair: CurrencyPair,
    /// Closed loop, first == last
    pub vertices: Vec<Vertex>,
    pub factor: Decimal,
}

/// Result of one detection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    /// Best positive factor per instrument
    pub factors: BTreeMap<CurrencyPair, Decimal>,
    /// Every positive loop found, in discovery order
    pub cycles: Vec<ArbitrageCycle>,
}

impl DetectionReport {
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    fn record(&mut self, cycle: ArbitrageCycle) {
        self.factors
            .entry(cycle.pair)
            .and_modify(|best| {
                if cycle.factor > *best {
                    *best = cycle.factor;
                }
            })
            .or_insert(cycle.factor);
        self.cycles.push(cycle);
    }
}

/// Bellman–Ford negative-cycle detector
#[derive(Debug, Clone)]
pub struct NegativeCycleDetector {
    config: DetectorConfig,
    lookup: Arc<CurrencyPairLookup>,
    factor: FactorCalculator,
}

impl NegativeCycleDetector {
    pub fn new(lookup: Arc<CurrencyPairLookup>) -> Self {
        Self::with_config(DetectorConfig::default(), lookup)
    }

    pub fn with_config(config: DetectorConfig, lookup: Arc<CurrencyPairLookup>) -> Self {
        Self {
            config,
            lookup,
            factor: FactorCalculator::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Scan the graph from every vertex and price each negative loop found.
    pub fn detect(&self, graph: &Graph) -> Result<DetectionReport, DetectError> {
        let deadline = Deadline::start(self.config.deadline);
        let mut report = DetectionReport::default();

        let vertex_count = graph.vertices().len();
        let edges = IndexedEdges::from_graph(graph);

        for source in 0..vertex_count {
            deadline.check()?;
            self.scan_from(graph, &edges, source, &deadline, &mut report)?;
        }

        debug!(
            vertices = vertex_count,
            edges = edges.len(),
            cycles = report.cycles.len(),
            pairs = report.factors.len(),
            "Negative-cycle scan complete"
        );
        Ok(report)
    }

    fn scan_from(
        &self,
        graph: &Graph,
        edges: &IndexedEdges,
        source: usize,
        deadline: &Deadline,
        report: &mut DetectionReport,
    ) -> Result<(), DetectError> {
        let n = edges.vertices.len();
        let mut distance = vec![f64::INFINITY; n];
        let mut predecessor: Vec<usize> = (0..n).collect();
        // Loops already reported from this source
        let mut seen = vec![false; n];
        distance[source] = 0.0;

        for _ in 1..n {
            let mut relaxed = false;
            for edge in &edges.items {
                if let Some(candidate) = improvement(&distance, edge) {
                    distance[edge.end] = candidate;
                    predecessor[edge.end] = edge.start;
                    relaxed = true;
                }
            }
            deadline.check()?;
            if !relaxed {
                return Ok(());
            }
        }

        for edge in &edges.items {
            if seen[edge.end] {
                continue;
            }
            let Some(candidate) = improvement(&distance, edge) else {
                continue;
            };
            distance[edge.end] = candidate;
            predecessor[edge.end] = edge.start;

            let Some(loop_indices) = trace_loop(&predecessor, edge.end) else {
                trace!(source, "Rewind ended on source, no loop");
                continue;
            };
            if loop_indices.iter().any(|&i| seen[i]) {
                continue;
            }
            for &i in &loop_indices {
                seen[i] = true;
            }

            let start = edges.vertex(edge.start);
            let end = edges.vertex(edge.end);
            let Some(pair) = self.lookup.resolve(start, end) else {
                warn!(start = %start, end = %end, "Cycle edge does not map to a known pair, dropping");
                continue;
            };

            let vertices: Vec<Vertex> = loop_indices.iter().map(|&i| edges.vertex(i)).collect();
            let factor = self.factor.find_factor(graph, &vertices)?;
            if factor <= Decimal::ZERO {
                debug!(pair = %pair, factor = %factor, "Loop not profitable, discarded");
                continue;
            }

            debug!(pair = %pair, factor = %factor, cycle = ?vertices, "Arbitrage cycle found");
            report.record(ArbitrageCycle {
                pair,
                vertices,
                factor,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Internals
// =============================================================================

struct IndexedEdge {
    start: usize,
    end: usize,
    weight: f64,
}

/// Graph edges with vertices replaced by their index, in graph edge order
struct IndexedEdges {
    vertices: Vec<Vertex>,
    items: Vec<IndexedEdge>,
}

impl IndexedEdges {
    fn from_graph(graph: &Graph) -> Self {
        let vertices = graph.vertices().to_vec();
        let items = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                Some(IndexedEdge {
                    start: graph.index_of(edge.start)?,
                    end: graph.index_of(edge.end)?,
                    weight: edge.weight.to_f64()?,
                })
            })
            .collect();
        Self { vertices, items }
    }

    fn vertex(&self, index: usize) -> Vertex {
        self.vertices[index]
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// New distance for `edge.end` if relaxing `edge` beats it by more than epsilon
fn improvement(distance: &[f64], edge: &IndexedEdge) -> Option<f64> {
    let from = distance[edge.start];
    if !from.is_finite() {
        return None;
    }
    let candidate = from + edge.weight;
    (candidate < distance[edge.end] - RELAX_EPSILON).then_some(candidate)
}

/// Rewind `|V|` predecessor steps from `start`, then walk predecessor links
/// until a vertex repeats. Returns the closed loop in edge direction (each
/// step `loop[i-1] -> loop[i]` is a relaxed edge), or `None` when the walk
/// collapses onto a single vertex.
fn trace_loop(predecessor: &[usize], start: usize) -> Option<Vec<usize>> {
    let mut anchor = start;
    for _ in 0..predecessor.len() {
        anchor = predecessor[anchor];
    }

    let mut walk = vec![anchor];
    let mut current = predecessor[anchor];
    loop {
        if let Some(pos) = walk.iter().position(|&v| v == current) {
            let mut closed = walk.split_off(pos);
            closed.push(current);
            closed.reverse();
            return (closed.len() >= 3).then_some(closed);
        }
        walk.push(current);
        current = predecessor[current];
    }
}

struct Deadline {
    limit: Option<(Instant, Duration)>,
}

impl Deadline {
    fn start(budget: Option<Duration>) -> Self {
        Self {
            limit: budget.map(|b| (Instant::now() + b, b)),
        }
    }

    fn check(&self) -> Result<(), DetectError> {
        match self.limit {
            Some((at, budget)) if Instant::now() >= at => Err(DetectError::DeadlineExceeded(budget)),
            _ => Ok(()),
        }
    }
}
