//! Arbitrage factor calculation
//!
//! Turns a closed vertex loop back into a profit factor: the summed edge
//! weights are decoded with the graph's logarithm base and the unit stake is
//! subtracted, leaving `product(rates) - 1`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::graph::{Graph, Vertex};

/// Decimal places of a reported factor
pub const FACTOR_DECIMAL_PLACES: u32 = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactorError {
    #[error("No edge {from} -> {to} in graph")]
    MissingEdge { from: Vertex, to: Vertex },

    #[error("Cycle needs at least two edges, got {0} vertices")]
    TooShort(usize),

    #[error("Factor for weight sum {0} is not finite")]
    NonFinite(Decimal),
}

/// Stateless; reads the logarithm base from the graph it prices against
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorCalculator;

impl FactorCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Sum of the weights of `cycle[i-1] -> cycle[i]` over the loop
    pub fn weight_sum(&self, graph: &Graph, cycle: &[Vertex]) -> Result<Decimal, FactorError> {
        if cycle.len() < 3 {
            return Err(FactorError::TooShort(cycle.len()));
        }
        cycle.windows(2).try_fold(Decimal::ZERO, |sum, step| {
            graph
                .edge_between(step[0], step[1])
                .map(|edge| sum + edge.weight)
                .ok_or(FactorError::MissingEdge {
                    from: step[0],
                    to: step[1],
                })
        })
    }

    /// `base^(-sum) - 1`, rounded up to 3 decimal places.
    ///
    /// May be zero or negative; callers only keep positive factors.
    pub fn find_factor(&self, graph: &Graph, cycle: &[Vertex]) -> Result<Decimal, FactorError> {
        let sum = self.weight_sum(graph, cycle)?;
        let factor = sum
            .to_f64()
            .map(|s| graph.log_base().rate(s) - 1.0)
            .filter(|f| f.is_finite())
            .and_then(Decimal::from_f64)
            .ok_or(FactorError::NonFinite(sum))?;
        Ok(factor.round_dp_with_strategy(FACTOR_DECIMAL_PLACES, RoundingStrategy::ToPositiveInfinity))
    }
}
