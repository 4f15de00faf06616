//! Aggregate recomputation and drift detection.
//!
//! The ledger updates its cached count and mass incrementally. This module
//! holds the ground truth: a full walk over the stored stacks, plus the
//! comparison used to detect drift between the two.
//!
//! Counts must match exactly. Mass is accumulated in floating point on both
//! sides, so it is compared within [`WEIGHT_TOLERANCE`] scaled by magnitude.

use hoard_types::ItemStack;

use crate::AggregateDrift;

/// Absolute slack allowed between cached and recomputed mass, per unit of
/// magnitude (with a floor of 1.0).
pub const WEIGHT_TOLERANCE: f64 = 1e-4;

/// Total unit count and total mass of a set of stacks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aggregates {
    /// Sum of stack counts.
    pub count: u64,
    /// Sum of stack masses.
    pub weight: f64,
}

impl Aggregates {
    /// No units, no mass.
    pub const ZERO: Self = Self {
        count: 0,
        weight: 0.0,
    };

    /// Fold one stack into the totals.
    #[must_use]
    pub fn with(self, stack: &ItemStack) -> Self {
        Self {
            count: self.count.saturating_add(u64::from(stack.count)),
            weight: self.weight + mass(stack),
        }
    }
}

/// Mass of a stack in double precision.
///
/// The product of an `f32` unit mass and a `u32` count is exact in `f64`,
/// so incremental updates and recomputes agree up to summation order.
pub fn mass(stack: &ItemStack) -> f64 {
    f64::from(stack.def.unit_mass) * f64::from(stack.count)
}

/// Outcome of comparing cached aggregates against a recompute.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateCheck {
    /// Cache matches the stored stacks.
    Consistent,
    /// Cache disagrees with the stored stacks.
    Drift(AggregateDrift),
}

impl AggregateCheck {
    /// Whether the check found no drift.
    pub const fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

/// Sum count and mass over `stacks`.
pub fn tally<'a, I>(stacks: I) -> Aggregates
where
    I: IntoIterator<Item = &'a ItemStack>,
{
    stacks.into_iter().fold(Aggregates::ZERO, Aggregates::with)
}

/// Compare `cached` against a fresh tally of `stacks`.
pub fn verify<'a, I>(cached: Aggregates, stacks: I) -> AggregateCheck
where
    I: IntoIterator<Item = &'a ItemStack>,
{
    let actual = tally(stacks);
    let slack = WEIGHT_TOLERANCE * actual.weight.abs().max(1.0);
    let weight_ok = (cached.weight - actual.weight).abs() <= slack;

    if cached.count == actual.count && weight_ok {
        return AggregateCheck::Consistent;
    }

    AggregateCheck::Drift(AggregateDrift {
        cached,
        actual,
        message: format!(
            "AGGREGATE_DRIFT: cached count {} weight {:.4}, actual count {} weight {:.4}",
            cached.count, cached.weight, actual.count, actual.weight,
        ),
    })
}
