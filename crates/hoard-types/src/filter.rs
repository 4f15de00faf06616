//! Acceptance filters over item type, durability, and quality.
//!
//! The same [`ItemFilter`] type serves as a warehouse's admission policy
//! and as the acceptance filter of a resolver requirement.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::item::{ItemDef, ItemStack, Quality, TypeKey};

/// A predicate over item type, hit-point fraction, and quality tier.
///
/// `allowed == None` allows every type; `Some(set)` allows only the listed
/// keys (an empty set allows nothing). Items without a quality tier pass
/// the quality bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Allowed type keys; `None` means any type.
    #[serde(default)]
    allowed: Option<BTreeSet<TypeKey>>,
    /// Inclusive lower bound on the hit-point fraction.
    #[serde(default = "zero")]
    min_hit_points: f32,
    /// Inclusive upper bound on the hit-point fraction.
    #[serde(default = "one")]
    max_hit_points: f32,
    /// Lowest accepted quality tier.
    #[serde(default = "lowest_quality")]
    min_quality: Quality,
    /// Highest accepted quality tier.
    #[serde(default = "highest_quality")]
    max_quality: Quality,
}

const fn zero() -> f32 {
    0.0
}

const fn one() -> f32 {
    1.0
}

const fn lowest_quality() -> Quality {
    Quality::Awful
}

const fn highest_quality() -> Quality {
    Quality::Legendary
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl ItemFilter {
    /// A filter that accepts every item.
    pub const fn allow_all() -> Self {
        Self {
            allowed: None,
            min_hit_points: 0.0,
            max_hit_points: 1.0,
            min_quality: Quality::Awful,
            max_quality: Quality::Legendary,
        }
    }

    /// A filter that accepts nothing until types are allowed.
    pub const fn deny_all() -> Self {
        Self {
            allowed: Some(BTreeSet::new()),
            min_hit_points: 0.0,
            max_hit_points: 1.0,
            min_quality: Quality::Awful,
            max_quality: Quality::Legendary,
        }
    }

    /// A filter that accepts exactly the given type keys.
    pub fn only<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<TypeKey>,
    {
        let mut filter = Self::deny_all();
        filter.allowed = Some(keys.into_iter().map(Into::into).collect());
        filter
    }

    /// Allow one more type key. No effect on an allow-all filter.
    pub fn allow(&mut self, key: TypeKey) {
        if let Some(set) = self.allowed.as_mut() {
            set.insert(key);
        }
    }

    /// Stop allowing a type key. An allow-all filter becomes an explicit
    /// list only when it is first restricted via [`ItemFilter::only`].
    pub fn disallow(&mut self, key: &TypeKey) {
        if let Some(set) = self.allowed.as_mut() {
            set.remove(key);
        }
    }

    /// Restrict accepted durability to `min..=max` (fractions).
    #[must_use]
    pub const fn with_hit_points(mut self, min: f32, max: f32) -> Self {
        self.min_hit_points = min;
        self.max_hit_points = max;
        self
    }

    /// Restrict accepted quality to `min..=max`.
    #[must_use]
    pub const fn with_quality(mut self, min: Quality, max: Quality) -> Self {
        self.min_quality = min;
        self.max_quality = max;
        self
    }

    /// Whether the type key is allowed, ignoring per-instance state.
    pub fn allows_key(&self, key: &TypeKey) -> bool {
        self.allowed.as_ref().is_none_or(|set| set.contains(key))
    }

    /// Whether the definition's type is allowed.
    pub fn allows_def(&self, def: &ItemDef) -> bool {
        self.allows_key(&def.key())
    }

    /// Whether a concrete stack passes type, durability, and quality checks.
    pub fn allows(&self, stack: &ItemStack) -> bool {
        if !self.allows_def(&stack.def) {
            return false;
        }
        if !(self.min_hit_points..=self.max_hit_points).contains(&stack.hit_points) {
            return false;
        }
        stack
            .quality
            .is_none_or(|q| q >= self.min_quality && q <= self.max_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steel(count: u32) -> ItemStack {
        ItemStack::new(ItemDef::new("Steel", 75, 0.5), count)
    }

    #[test]
    fn allow_all_accepts_anything() {
        assert!(ItemFilter::allow_all().allows(&steel(1)));
    }

    #[test]
    fn deny_all_then_allow() {
        let mut filter = ItemFilter::deny_all();
        assert!(!filter.allows(&steel(1)));
        filter.allow(TypeKey::from("Steel"));
        assert!(filter.allows(&steel(1)));
        filter.disallow(&TypeKey::from("Steel"));
        assert!(!filter.allows(&steel(1)));
    }

    #[test]
    fn hit_point_bounds_apply() {
        let filter = ItemFilter::allow_all().with_hit_points(0.5, 1.0);
        assert!(filter.allows(&steel(1).with_hit_points(0.9)));
        assert!(!filter.allows(&steel(1).with_hit_points(0.2)));
    }

    #[test]
    fn nan_hit_points_never_pass_a_durability_floor() {
        let filter = ItemFilter::allow_all().with_hit_points(0.5, 1.0);
        let built = steel(1).with_hit_points(f32::NAN);
        assert!(built.hit_points.abs() < f32::EPSILON);
        assert!(!filter.allows(&built));

        let mut raw = steel(1);
        raw.hit_points = f32::NAN;
        assert!(!ItemFilter::allow_all().allows(&raw));
    }

    #[test]
    fn quality_bounds_skip_unrated_items() {
        let filter = ItemFilter::allow_all().with_quality(Quality::Good, Quality::Legendary);
        let sword = ItemStack::new(ItemDef::new("Sword", 1, 2.0), 1);
        assert!(filter.allows(&sword));
        assert!(!filter.allows(&sword.clone().with_quality(Quality::Poor)));
        assert!(filter.allows(&sword.with_quality(Quality::Masterwork)));
    }

    #[test]
    fn only_lists_keys() {
        let filter = ItemFilter::only(["Steel", "Wood"]);
        assert!(filter.allows_key(&TypeKey::from("Wood")));
        assert!(!filter.allows_key(&TypeKey::from("Gold")));
    }
}
