//! Compact per-type storage entries.
//!
//! An [`EntryDb`] is an alternative to the stack ledger for stores holding
//! very large quantities of stackable material. Stackable types collapse
//! into a single counter ([`Entry::Stackable`]); stacks are manufactured on
//! withdrawal, each capped at the type's `max_stack`. Types that do not
//! stack keep every instance individually ([`Entry::Singular`]), because
//! each carries its own durability and quality.
//!
//! Both variants answer the same queries: count, mass, how many units
//! match a filter, and filtered withdrawal with or without partial
//! fulfilment.
//!
//! A stackable entry is lossy. Only the unit count survives an add, so
//! hit points and quality are dropped, filters are checked against the
//! type alone, and every withdrawn stack comes out pristine.
//!
//! The database serializes as a flat list of entries and tolerates
//! missing collections on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hoard_types::{ItemDef, ItemFilter, ItemStack, TypeKey};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Everything an [`EntryDb`] holds of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    /// A stackable type reduced to a unit counter. Per-stack hit points
    /// and quality are not kept.
    Stackable {
        /// The stored type.
        def: ItemDef,
        /// Units held.
        #[serde(default)]
        count: u64,
    },
    /// A non-stacking type kept as distinct instances.
    Singular {
        /// The stored type.
        def: ItemDef,
        /// Held instances, unique by id.
        #[serde(default)]
        items: Vec<ItemStack>,
    },
}

impl Entry {
    /// An empty entry of the right variant for `def`.
    pub fn for_def(def: ItemDef) -> Self {
        if def.is_stackable() {
            Self::Stackable { def, count: 0 }
        } else {
            Self::Singular {
                def,
                items: Vec::new(),
            }
        }
    }

    /// The type this entry holds.
    pub const fn def(&self) -> &ItemDef {
        match self {
            Self::Stackable { def, .. } | Self::Singular { def, .. } => def,
        }
    }

    /// Fold a stack into the entry.
    ///
    /// Hands the stack back when it is empty, belongs to another type, or
    /// (for singular entries) is already held.
    pub fn add(&mut self, stack: ItemStack) -> Result<(), ItemStack> {
        if stack.is_empty() || stack.key() != self.def().key() {
            return Err(stack);
        }
        match self {
            Self::Stackable { count, .. } => {
                *count = count.saturating_add(u64::from(stack.count));
                Ok(())
            }
            Self::Singular { items, .. } => {
                if items.iter().any(|held| held.id == stack.id) {
                    return Err(stack);
                }
                items.push(stack);
                Ok(())
            }
        }
    }

    /// Units held.
    pub fn count(&self) -> u64 {
        match self {
            Self::Stackable { count, .. } => *count,
            Self::Singular { items, .. } => items
                .iter()
                .fold(0_u64, |acc, s| acc.saturating_add(u64::from(s.count))),
        }
    }

    /// Total mass, computed on demand.
    #[allow(clippy::cast_precision_loss)] // Counts above 2^53 units are not a realistic store.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Stackable { def, count } => f64::from(def.unit_mass) * *count as f64,
            Self::Singular { items, .. } => items.iter().map(crate::aggregate::mass).sum(),
        }
    }

    /// Units that pass `filter`.
    ///
    /// A stackable entry only consults the filter's type gate: it holds no
    /// durability or quality to compare, so every unit of an allowed type
    /// counts.
    pub fn count_matching(&self, filter: &ItemFilter) -> u64 {
        match self {
            Self::Stackable { def, count } => {
                if filter.allows_def(def) {
                    *count
                } else {
                    0
                }
            }
            Self::Singular { items, .. } => items
                .iter()
                .filter(|s| filter.allows(s))
                .fold(0_u64, |acc, s| acc.saturating_add(u64::from(s.count))),
        }
    }

    /// Withdraw up to `count` units as stacks, ignoring any filter.
    ///
    /// Stackable entries manufacture fresh stacks of at most `max_stack`
    /// units; singular entries hand over held instances oldest first.
    pub fn remove(&mut self, count: u64) -> Vec<ItemStack> {
        match self {
            Self::Stackable { def, count: held } => {
                let wanted = count.min(*held);
                *held = held.saturating_sub(wanted);
                manufacture(def, wanted)
            }
            Self::Singular { items, .. } => {
                let take = usize::try_from(count).unwrap_or(usize::MAX).min(items.len());
                items.drain(..take).collect()
            }
        }
    }

    /// Withdraw `count` units that pass `filter`.
    ///
    /// Unless `allow_partial`, succeeds only when the full count is
    /// available. Returns `None` and changes nothing on failure.
    pub fn try_remove(
        &mut self,
        filter: &ItemFilter,
        count: u64,
        allow_partial: bool,
    ) -> Option<Vec<ItemStack>> {
        if count == 0 {
            return None;
        }
        let available = self.count_matching(filter);
        if available == 0 || (available < count && !allow_partial) {
            return None;
        }
        let wanted = count.min(available);
        if let Self::Singular { items, .. } = self {
            let mut taken = Vec::new();
            let mut kept = Vec::with_capacity(items.len());
            let mut need = wanted;
            for item in items.drain(..) {
                if need > 0 && filter.allows(&item) {
                    need = need.saturating_sub(u64::from(item.count));
                    taken.push(item);
                } else {
                    kept.push(item);
                }
            }
            *items = kept;
            return Some(taken);
        }
        Some(self.remove(wanted))
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Cut `total` units of `def` into stacks no larger than `max_stack`.
fn manufacture(def: &ItemDef, total: u64) -> Vec<ItemStack> {
    let limit = u64::from(def.max_stack.max(1));
    let mut stacks = Vec::new();
    let mut left = total;
    while left > 0 {
        let size = left.min(limit);
        left = left.saturating_sub(size);
        let count = u32::try_from(size).unwrap_or(u32::MAX);
        stacks.push(ItemStack::new(def.clone(), count));
    }
    stacks
}

// ---------------------------------------------------------------------------
// EntryDb
// ---------------------------------------------------------------------------

/// Entries keyed by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryList", into = "EntryList")]
pub struct EntryDb {
    entries: BTreeMap<TypeKey, Entry>,
}

/// Wire form of [`EntryDb`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EntryList {
    #[serde(default)]
    entries: Option<Vec<Entry>>,
}

impl From<EntryList> for EntryDb {
    fn from(list: EntryList) -> Self {
        let mut db = Self::new();
        for entry in list.entries.unwrap_or_default() {
            let key = entry.def().key();
            match db.entries.get_mut(&key) {
                Some(existing) => {
                    for stack in entry_into_stacks(entry) {
                        existing.add(stack).ok();
                    }
                }
                None => {
                    db.entries.insert(key, entry);
                }
            }
        }
        db
    }
}

impl From<EntryDb> for EntryList {
    fn from(db: EntryDb) -> Self {
        Self {
            entries: Some(db.entries.into_values().collect()),
        }
    }
}

fn entry_into_stacks(mut entry: Entry) -> Vec<ItemStack> {
    let all = entry.count();
    entry.remove(all)
}

impl EntryDb {
    /// Create an empty database.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Store a stack, creating the type's entry on first sight.
    ///
    /// Hands the stack back if its entry refuses it.
    pub fn add(&mut self, stack: ItemStack) -> Result<(), ItemStack> {
        let key = stack.key();
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Entry::for_def(stack.def.clone()));
        entry.add(stack)
    }

    /// The entry for `key`, if any units of that type are held.
    pub fn get(&self, key: &TypeKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// All entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Units held across all types.
    pub fn count(&self) -> u64 {
        self.entries
            .values()
            .fold(0_u64, |acc, e| acc.saturating_add(e.count()))
    }

    /// Mass across all types.
    pub fn weight(&self) -> f64 {
        self.entries.values().map(Entry::weight).sum()
    }

    /// Units across all types that pass `filter`.
    pub fn count_matching(&self, filter: &ItemFilter) -> u64 {
        self.entries
            .values()
            .fold(0_u64, |acc, e| acc.saturating_add(e.count_matching(filter)))
    }

    /// Withdraw `count` units of `key` that pass `filter`.
    ///
    /// See [`Entry::try_remove`]. Entries left empty are dropped.
    pub fn try_remove(
        &mut self,
        key: &TypeKey,
        filter: &ItemFilter,
        count: u64,
        allow_partial: bool,
    ) -> Option<Vec<ItemStack>> {
        let entry = self.entries.get_mut(key)?;
        let taken = entry.try_remove(filter, count, allow_partial);
        if entry.is_empty() {
            self.entries.remove(key);
        }
        taken
    }

    /// Withdraw everything as stacks, in key order.
    pub fn remove_all(&mut self) -> Vec<ItemStack> {
        core::mem::take(&mut self.entries)
            .into_values()
            .flat_map(entry_into_stacks)
            .collect()
    }
}
