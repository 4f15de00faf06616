//! Per-type stack ledger and entry database for hoard warehouses.
//!
//! A warehouse stores an unbounded number of item stacks. The ledger keeps
//! them grouped by [`TypeKey`](hoard_types::TypeKey) so lookups, merges, and
//! withdrawals only touch stacks of one type, and caches the total unit count
//! and total mass so readers never walk the whole store.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`StackLedger`]: add-with-merge, withdrawal by type or
//!   by identity, and cached aggregates.
//! - [`aggregate`] -- Aggregate recomputation and drift detection.
//! - [`entry`] -- The [`EntryDb`]: a compact per-type view that collapses
//!   stackable types into a counter and keeps unique items individually.
//!
//! # Aggregate invariant
//!
//! After every completed operation:
//!
//! ```text
//! cached count  == sum(stack.count)
//! cached weight ~= sum(stack.mass)   (floating-point tolerance)
//! ```
//!
//! A cached value that would go negative is never stored; the ledger falls
//! back to a full recompute and logs a warning instead. Ledger operations
//! never fail and never panic.
//!
//! # Usage
//!
//! ```
//! use hoard_ledger::{AddOutcome, StackLedger};
//! use hoard_types::{ItemDef, ItemFilter, ItemStack};
//!
//! let steel = ItemDef::new("Steel", 75, 0.5);
//! let mut ledger = StackLedger::new();
//! let filter = ItemFilter::allow_all();
//!
//! ledger.add(ItemStack::new(steel.clone(), 40), &filter, false).ok();
//! let outcome = ledger.add(ItemStack::new(steel.clone(), 50), &filter, false);
//! assert_eq!(outcome.ok(), Some(AddOutcome::MergedWithRemainder));
//! assert_eq!(ledger.count(), 90);
//!
//! let taken = ledger.remove(&steel.key(), 80);
//! assert_eq!(taken.iter().map(|s| s.count).sum::<u32>(), 80);
//! assert_eq!(ledger.count(), 10);
//! ```

pub mod aggregate;
pub mod entry;
pub mod ledger;

// Re-export primary types at crate root.
pub use aggregate::{AggregateCheck, Aggregates};
pub use entry::{Entry, EntryDb};
pub use ledger::{AddOutcome, RejectReason, Rejected, StackLedger};

// ---------------------------------------------------------------------------
// Drift type
// ---------------------------------------------------------------------------

/// A mismatch between cached aggregates and the stacks actually held.
///
/// Produced by [`StackLedger::verify_aggregates`]. Drift is expected to be
/// transient: the ledger repairs it by recomputing from scratch whenever a
/// cached value would turn negative.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateDrift {
    /// What the ledger had cached.
    pub cached: Aggregates,
    /// What a full recompute yields.
    pub actual: Aggregates,
    /// Human-readable description of the mismatch.
    pub message: String,
}

impl core::fmt::Display for AggregateDrift {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}
