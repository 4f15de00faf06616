//! Index of live warehouses, partitioned by region.
//!
//! The registry is derived data: it is filled by spawns, emptied by
//! despawns, and rebuilt from scratch on world load. Each region keeps its
//! members in insertion order, which is the order every query returns.
//!
//! Warehouses fall into two visibility classes. [`Visibility::Global`]
//! members take part in world-spanning work (ingredient search, trade) and
//! are listed by [`WarehouseRegistry::global_in_region`];
//! [`Visibility::LocalOnly`] members are only listed by
//! [`WarehouseRegistry::all_in_region`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hoard_types::{Cell, RegionId, WarehouseId};

/// Which queries a registered warehouse shows up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Visible to world-spanning queries.
    #[default]
    Global,
    /// Visible only to queries scoped to its own region.
    LocalOnly,
}

/// One registered warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// The warehouse.
    pub id: WarehouseId,
    /// Where it stands.
    pub cell: Cell,
}

/// Members of one region, split by visibility.
#[derive(Debug, Clone, Default)]
struct RegionMembers {
    global: Vec<Member>,
    local: Vec<Member>,
}

impl RegionMembers {
    const fn is_empty(&self) -> bool {
        self.global.is_empty() && self.local.is_empty()
    }

    fn contains(&self, id: WarehouseId) -> bool {
        self.global.iter().chain(&self.local).any(|m| m.id == id)
    }
}

/// Region-partitioned index of spawned warehouses.
#[derive(Debug, Clone, Default)]
pub struct WarehouseRegistry {
    regions: BTreeMap<RegionId, RegionMembers>,
}

impl WarehouseRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }

    /// Register a warehouse in `region`. Re-adding a present member is a
    /// no-op and returns `false`.
    pub fn add(
        &mut self,
        region: RegionId,
        id: WarehouseId,
        cell: Cell,
        visibility: Visibility,
    ) -> bool {
        let members = self.regions.entry(region).or_default();
        if members.contains(id) {
            return false;
        }
        let member = Member { id, cell };
        match visibility {
            Visibility::Global => members.global.push(member),
            Visibility::LocalOnly => members.local.push(member),
        }
        tracing::debug!(region = %region, warehouse = %id, ?visibility, "warehouse registered");
        true
    }

    /// Deregister a warehouse. Idempotent; a region left without members is
    /// pruned. Returns whether anything was removed.
    pub fn remove(&mut self, region: RegionId, id: WarehouseId) -> bool {
        let Some(members) = self.regions.get_mut(&region) else {
            return false;
        };
        let before = members.global.len().saturating_add(members.local.len());
        members.global.retain(|m| m.id != id);
        members.local.retain(|m| m.id != id);
        let after = members.global.len().saturating_add(members.local.len());
        if members.is_empty() {
            self.regions.remove(&region);
        }
        let removed = after < before;
        if removed {
            tracing::debug!(region = %region, warehouse = %id, "warehouse deregistered");
        }
        removed
    }

    /// Every member of `region`: global ones first, then local-only, each
    /// in insertion order.
    pub fn all_in_region(&self, region: RegionId) -> Vec<WarehouseId> {
        self.regions
            .get(&region)
            .map(|m| m.global.iter().chain(&m.local).map(|m| m.id).collect())
            .unwrap_or_default()
    }

    /// Globally visible members of `region`, in insertion order.
    pub fn global_in_region(&self, region: RegionId) -> Vec<WarehouseId> {
        self.regions
            .get(&region)
            .map(|m| m.global.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    /// Every globally visible member, region by region.
    pub fn all_global(&self) -> Vec<(RegionId, WarehouseId)> {
        self.regions
            .iter()
            .flat_map(|(region, m)| m.global.iter().map(move |m| (*region, m.id)))
            .collect()
    }

    /// Globally visible members of `region` within `radius` of `point`, in
    /// insertion order. A linear scan over the region's members.
    pub fn within_radius(&self, region: RegionId, point: Cell, radius: f32) -> Vec<WarehouseId> {
        self.regions
            .get(&region)
            .map(|m| {
                m.global
                    .iter()
                    .filter(|m| point.within_radius(m.cell, radius))
                    .map(|m| m.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `id` is registered anywhere.
    pub fn contains(&self, id: WarehouseId) -> bool {
        self.regions.values().any(|m| m.contains(id))
    }

    /// Regions that currently have members.
    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    /// Number of registered warehouses.
    pub fn len(&self) -> usize {
        self.regions
            .values()
            .map(|m| m.global.len().saturating_add(m.local.len()))
            .fold(0_usize, usize::saturating_add)
    }

    /// Whether no warehouse is registered.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Forget every membership.
    pub fn clear(&mut self) {
        self.regions.clear();
    }
}
