//! The stack ledger: every stack a warehouse holds, grouped by type.
//!
//! The [`StackLedger`] maps each [`TypeKey`] to an ordered sequence of
//! stacks. New material is merged into existing stacks of the same key
//! (oldest first) before anything is appended, so a type's stacks stay as
//! full as possible. Withdrawals walk the same order.
//!
//! # Design
//!
//! - **No empty keys**: a key whose last stack leaves is removed.
//! - **No empty stacks**: zero-count stacks are pruned whenever touched.
//! - **Bounded stacks**: no stored stack exceeds its definition's
//!   `max_stack`; oversized input is split on arrival.
//! - **Unique instances**: an item id is stored at most once.
//! - **Cached aggregates**: count and mass are maintained incrementally and
//!   recomputed from scratch if a cached value would go negative.

use std::collections::{BTreeMap, VecDeque};

use hoard_types::{ItemFilter, ItemId, ItemStack, TypeKey};

use crate::aggregate::{self, AggregateCheck, Aggregates};

// ---------------------------------------------------------------------------
// Add results
// ---------------------------------------------------------------------------

/// How an accepted stack ended up in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended as one or more new stacks; nothing merged.
    Stored,
    /// Fully absorbed into existing stacks.
    Merged,
    /// Partly absorbed; the remainder was appended.
    MergedWithRemainder,
    /// The same item instance is already stored; nothing changed.
    AlreadyPresent,
    /// Zero-count input; nothing changed.
    Empty,
}

/// Why a stack was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The acceptance filter disallows it and the add was not forced.
    Filtered,
}

/// A stack the ledger refused, handed back to the caller untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// The refused stack.
    pub stack: ItemStack,
    /// Why it was refused.
    pub reason: RejectReason,
}

// ---------------------------------------------------------------------------
// StackLedger
// ---------------------------------------------------------------------------

/// Per-type ordered stacks with cached count and mass.
#[derive(Debug, Clone, Default)]
pub struct StackLedger {
    /// Stacks grouped by type key, oldest first within each key.
    stacks: BTreeMap<TypeKey, VecDeque<ItemStack>>,
    /// Cached total unit count.
    count: u64,
    /// Cached total mass.
    weight: f64,
}

impl StackLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            stacks: BTreeMap::new(),
            count: 0,
            weight: 0.0,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Store a stack, merging into existing stacks of the same type first.
    ///
    /// Unless `forced`, the stack must pass `filter`. A rejected stack is
    /// returned unchanged inside [`Rejected`].
    pub fn add(
        &mut self,
        mut stack: ItemStack,
        filter: &ItemFilter,
        forced: bool,
    ) -> Result<AddOutcome, Rejected> {
        if !forced && !filter.allows(&stack) {
            tracing::debug!(key = %stack.key(), count = stack.count, "stack rejected by filter");
            return Err(Rejected {
                stack,
                reason: RejectReason::Filtered,
            });
        }
        if stack.is_empty() {
            return Ok(AddOutcome::Empty);
        }
        if self.contains(stack.id) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        let added = Aggregates::ZERO.with(&stack);
        let list = self.stacks.entry(stack.key()).or_default();

        let mut merged = false;
        if stack.def.is_stackable() {
            for existing in list.iter_mut() {
                if stack.is_empty() {
                    break;
                }
                if existing.try_absorb(&mut stack) > 0 {
                    merged = true;
                }
            }
        }

        let outcome = if stack.is_empty() {
            AddOutcome::Merged
        } else {
            push_bounded(list, stack);
            if merged {
                AddOutcome::MergedWithRemainder
            } else {
                AddOutcome::Stored
            }
        };

        self.record_added(added);
        Ok(outcome)
    }

    /// Withdraw up to `quantity` units of `key`, oldest stacks first.
    ///
    /// Whole stacks are handed over as-is; the last one is split if it holds
    /// more than still needed. Returns fewer units than asked when the
    /// ledger runs out, and nothing for an unknown key.
    pub fn remove(&mut self, key: &TypeKey, quantity: u32) -> Vec<ItemStack> {
        let mut taken = Vec::new();
        if quantity == 0 {
            return taken;
        }
        let Some(list) = self.stacks.get_mut(key) else {
            tracing::debug!(key = %key, quantity, "remove for unknown key");
            return taken;
        };

        list.retain(|s| !s.is_empty());
        let mut need = quantity;
        while need > 0 {
            let Some(front) = list.front_mut() else {
                break;
            };
            if let Some(part) = front.split_off(need) {
                need = 0;
                taken.push(part);
            } else if let Some(whole) = list.pop_front() {
                need = need.saturating_sub(whole.count);
                taken.push(whole);
            }
        }

        if list.is_empty() {
            self.stacks.remove(key);
        }
        self.record_removed(aggregate::tally(&taken));
        taken
    }

    /// Withdraw one specific stack by identity.
    pub fn remove_exact(&mut self, id: ItemId) -> Option<ItemStack> {
        let (key, index) = self.locate(id)?;
        let list = self.stacks.get_mut(&key)?;
        let stack = list.remove(index)?;
        if list.is_empty() {
            self.stacks.remove(&key);
        }
        self.record_removed(Aggregates::ZERO.with(&stack));
        Some(stack)
    }

    /// Withdraw `count` units from one specific stack.
    ///
    /// Takes the whole stack (keeping its id) when `count` covers it,
    /// otherwise splits a new stack off. `None` for an unknown id or a zero
    /// count.
    pub fn take_from_stack(&mut self, id: ItemId, count: u32) -> Option<ItemStack> {
        if count == 0 {
            return None;
        }
        let (key, index) = self.locate(id)?;
        let part = self
            .stacks
            .get_mut(&key)
            .and_then(|list| list.get_mut(index))
            .and_then(|stack| stack.split_off(count));
        match part {
            Some(part) => {
                self.record_removed(Aggregates::ZERO.with(&part));
                Some(part)
            }
            None => self.remove_exact(id),
        }
    }

    /// Remove and return every stack, in key order. Aggregates reset to zero.
    pub fn empty(&mut self) -> Vec<ItemStack> {
        let drained: Vec<ItemStack> = core::mem::take(&mut self.stacks)
            .into_values()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        self.count = 0;
        self.weight = 0.0;
        drained
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Cached total unit count.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Cached total mass.
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Units stored under `key`.
    pub fn count_of(&self, key: &TypeKey) -> u64 {
        self.stacks
            .get(key)
            .map_or(0, |list| aggregate::tally(list).count)
    }

    /// Units across all stacks that pass `filter`.
    pub fn count_matching(&self, filter: &ItemFilter) -> u64 {
        aggregate::tally(self.stacks().filter(|s| filter.allows(s))).count
    }

    /// Whether a stack with this id is stored.
    pub fn contains(&self, id: ItemId) -> bool {
        self.locate(id).is_some()
    }

    /// Look up a stored stack by id.
    pub fn get(&self, id: ItemId) -> Option<&ItemStack> {
        self.stacks().find(|s| s.id == id)
    }

    /// Every stored stack, in key order then age order.
    pub fn stacks(&self) -> impl Iterator<Item = &ItemStack> {
        self.stacks.values().flatten()
    }

    /// Stacks stored under one key, oldest first.
    pub fn stacks_of<'a>(&'a self, key: &TypeKey) -> impl Iterator<Item = &'a ItemStack> {
        self.stacks.get(key).into_iter().flatten()
    }

    /// Type keys currently present.
    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.stacks.keys()
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Compare the cached aggregates against a full recompute.
    pub fn verify_aggregates(&self) -> AggregateCheck {
        aggregate::verify(
            Aggregates {
                count: self.count,
                weight: self.weight,
            },
            self.stacks(),
        )
    }

    /// Drop the cached aggregates and rebuild them from the stored stacks.
    pub fn recompute_aggregates(&mut self) {
        let totals = aggregate::tally(self.stacks());
        self.count = totals.count;
        self.weight = totals.weight;
    }

    fn record_added(&mut self, added: Aggregates) {
        self.count = self.count.saturating_add(added.count);
        self.weight += added.weight;
    }

    fn record_removed(&mut self, removed: Aggregates) {
        let count = self.count.checked_sub(removed.count);
        let weight = self.weight - removed.weight;
        match count {
            Some(count) if weight >= 0.0 => {
                self.count = count;
                self.weight = weight;
            }
            _ => {
                tracing::warn!(
                    cached_count = self.count,
                    cached_weight = self.weight,
                    removed_count = removed.count,
                    removed_weight = removed.weight,
                    "aggregate underflow, recomputing from stored stacks"
                );
                self.recompute_aggregates();
            }
        }
    }

    fn locate(&self, id: ItemId) -> Option<(TypeKey, usize)> {
        self.stacks.iter().find_map(|(key, list)| {
            list.iter()
                .position(|s| s.id == id)
                .map(|index| (key.clone(), index))
        })
    }

    /// Overwrite the cached aggregates without touching the stacks.
    #[cfg(test)]
    pub(crate) const fn skew_aggregates(&mut self, count: u64, weight: f64) {
        self.count = count;
        self.weight = weight;
    }
}

/// Append a stack, splitting it into `max_stack`-sized pieces if needed.
fn push_bounded(list: &mut VecDeque<ItemStack>, mut stack: ItemStack) {
    let limit = stack.def.max_stack.max(1);
    while stack.count > limit {
        let Some(chunk) = stack.split_off(limit) else {
            break;
        };
        list.push_back(chunk);
    }
    list.push_back(stack);
}
