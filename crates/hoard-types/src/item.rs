//! Item definitions and item stacks.
//!
//! An [`ItemDef`] describes *what* something is (name, optional material,
//! stack limit, mass per unit). An [`ItemStack`] is one concrete instance:
//! a quantity of a definition plus its mutable physical state.
//!
//! Two stacks can merge only when they share a [`TypeKey`], the definition
//! stacks (`max_stack > 1`), and their quality tiers agree. Merging never
//! exceeds `max_stack`; whatever does not fit stays in the donor stack.

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;

// ---------------------------------------------------------------------------
// TypeKey
// ---------------------------------------------------------------------------

/// Identity of an item type, including its "made-of" material qualifier.
///
/// Displayed as `name` for plain types and `name[stuff]` for types made
/// from a material, so `Chair[Wood]` and `Chair[Steel]` never merge. The
/// parts are kept separate, so a name that itself contains brackets never
/// collides with a qualified key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeKey {
    name: String,
    #[serde(default)]
    stuff: Option<String>,
}

impl TypeKey {
    /// Build a key from a definition name and optional material.
    pub fn from_parts(name: &str, stuff: Option<&str>) -> Self {
        Self {
            name: name.to_owned(),
            stuff: stuff.map(str::to_owned),
        }
    }

    /// The definition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The material qualifier, if any.
    pub fn stuff(&self) -> Option<&str> {
        self.stuff.as_deref()
    }
}

impl core::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.stuff {
            Some(stuff) => write!(f, "{}[{stuff}]", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::from_parts(name, None)
    }
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Craftsmanship tier of an item, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// Barely functional.
    Awful,
    /// Below average.
    Poor,
    /// Baseline.
    Normal,
    /// Above average.
    Good,
    /// Very well made.
    Excellent,
    /// Exceptional.
    Masterwork,
    /// One of a kind.
    Legendary,
}

// ---------------------------------------------------------------------------
// ItemDef
// ---------------------------------------------------------------------------

/// Static description of an item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    /// Definition name, e.g. `"Steel"`.
    pub name: String,
    /// Optional "made-of" material, e.g. `Some("Wood")` for a wooden chair.
    #[serde(default)]
    pub stuff: Option<String>,
    /// Maximum quantity a single stack may hold. `1` means unique items.
    pub max_stack: u32,
    /// Mass of a single unit.
    pub unit_mass: f32,
}

impl ItemDef {
    /// Create a definition without a material qualifier.
    pub fn new(name: &str, max_stack: u32, unit_mass: f32) -> Self {
        Self {
            name: name.to_owned(),
            stuff: None,
            max_stack,
            unit_mass,
        }
    }

    /// Return a copy of this definition made from the given material.
    #[must_use]
    pub fn made_of(mut self, stuff: &str) -> Self {
        self.stuff = Some(stuff.to_owned());
        self
    }

    /// The identity key for stacks of this definition.
    pub fn key(&self) -> TypeKey {
        TypeKey::from_parts(&self.name, self.stuff.as_deref())
    }

    /// Whether stacks of this type can hold more than one unit.
    pub const fn is_stackable(&self) -> bool {
        self.max_stack > 1
    }

    /// Mass of `count` units.
    #[allow(clippy::cast_precision_loss)] // Stack counts are far below f32's exact integer range.
    pub fn mass_of(&self, count: u32) -> f32 {
        self.unit_mass * count as f32
    }
}

// ---------------------------------------------------------------------------
// ItemStack
// ---------------------------------------------------------------------------

/// One concrete, quantified instance of an item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Instance identity.
    pub id: ItemId,
    /// What this stack is.
    pub def: ItemDef,
    /// How many units the stack holds.
    pub count: u32,
    /// Remaining durability as a fraction in `0.0..=1.0`.
    #[serde(default = "full_hit_points")]
    pub hit_points: f32,
    /// Craftsmanship tier, if the type has one.
    #[serde(default)]
    pub quality: Option<Quality>,
}

const fn full_hit_points() -> f32 {
    1.0
}

impl ItemStack {
    /// Create a pristine stack with a fresh id.
    pub fn new(def: ItemDef, count: u32) -> Self {
        Self {
            id: ItemId::new(),
            def,
            count,
            hit_points: 1.0,
            quality: None,
        }
    }

    /// Set the durability fraction (clamped to `0.0..=1.0`; NaN counts as
    /// destroyed).
    #[must_use]
    pub fn with_hit_points(mut self, hit_points: f32) -> Self {
        self.hit_points = if hit_points.is_nan() {
            0.0
        } else {
            hit_points.clamp(0.0, 1.0)
        };
        self
    }

    /// Set the quality tier.
    #[must_use]
    pub const fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// The identity key of this stack's type.
    pub fn key(&self) -> TypeKey {
        self.def.key()
    }

    /// Whether the stack holds no units.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total mass of the stack.
    pub fn mass(&self) -> f32 {
        self.def.mass_of(self.count)
    }

    /// Units that can still be merged into this stack.
    pub const fn room(&self) -> u32 {
        self.def.max_stack.saturating_sub(self.count)
    }

    /// Whether `other` could be merged into this stack.
    pub fn can_stack_with(&self, other: &Self) -> bool {
        self.id != other.id
            && self.def.is_stackable()
            && self.quality == other.quality
            && self.key() == other.key()
    }

    /// Merge as much of `other` into this stack as fits.
    ///
    /// Returns the number of units moved. `other` keeps whatever did not
    /// fit; durability becomes the count-weighted average of both parts.
    pub fn try_absorb(&mut self, other: &mut Self) -> u32 {
        if !self.can_stack_with(other) {
            return 0;
        }
        let moved = self.room().min(other.count);
        if moved == 0 {
            return 0;
        }
        self.hit_points = weighted_hit_points(self.hit_points, self.count, other.hit_points, moved);
        self.count = self.count.saturating_add(moved);
        other.count = other.count.saturating_sub(moved);
        moved
    }

    /// Split `count` units off into a new stack with a fresh id.
    ///
    /// Returns `None` when `count` is zero or would consume the whole
    /// stack; callers take the stack itself in that case.
    pub fn split_off(&mut self, count: u32) -> Option<Self> {
        if count == 0 || count >= self.count {
            return None;
        }
        self.count = self.count.saturating_sub(count);
        Some(Self {
            id: ItemId::new(),
            def: self.def.clone(),
            count,
            hit_points: self.hit_points,
            quality: self.quality,
        })
    }
}

#[allow(clippy::cast_precision_loss)] // Stack counts are far below f32's exact integer range.
fn weighted_hit_points(a: f32, a_count: u32, b: f32, b_count: u32) -> f32 {
    let total = a_count.saturating_add(b_count);
    if total == 0 {
        return a;
    }
    let mixed = a.mul_add(a_count as f32, b * b_count as f32) / total as f32;
    mixed.clamp(0.0, 1.0)
}
