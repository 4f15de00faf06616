//! The depot: every warehouse of a world plus the registry over them.
//!
//! The depot is the explicit context callers pass around instead of a
//! process-wide singleton. It keeps the registry in step with warehouse
//! lifecycles (spawn registers, despawn and destroy deregister) and owns
//! the random source used to scatter materialized items.
//!
//! On world load the depot is reset and rebuilt from a [`DepotSnapshot`];
//! registry membership is never persisted, only re-derived by spawning.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use hoard_types::{ItemId, ItemStack, RegionId, WarehouseId};

use crate::error::WorldError;
use crate::placement::{Placed, WorldPlacement};
use crate::registry::WarehouseRegistry;
use crate::warehouse::{Emptied, TickPolicy, TickReport, Warehouse, WarehouseSnapshot};

/// Persistent form of a [`Depot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepotSnapshot {
    /// Warehouses, spawned ones in registry order first.
    #[serde(default)]
    pub warehouses: Vec<WarehouseSnapshot>,
}

/// Owner of all warehouses and their registry.
#[derive(Debug, Clone)]
pub struct Depot {
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    registry: WarehouseRegistry,
    rng: SmallRng,
}

impl Default for Depot {
    fn default() -> Self {
        Self::new()
    }
}

impl Depot {
    /// An empty depot seeded from the OS.
    pub fn new() -> Self {
        Self {
            warehouses: BTreeMap::new(),
            registry: WarehouseRegistry::new(),
            rng: SmallRng::from_os_rng(),
        }
    }

    /// An empty depot with a fixed seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            warehouses: BTreeMap::new(),
            registry: WarehouseRegistry::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Take ownership of a warehouse. It stays unregistered until spawned.
    pub fn insert(&mut self, warehouse: Warehouse) -> Result<WarehouseId, WorldError> {
        let id = warehouse.id();
        if self.warehouses.contains_key(&id) {
            return Err(WorldError::DuplicateWarehouse(id));
        }
        self.warehouses.insert(id, warehouse);
        Ok(id)
    }

    /// Spawn a held warehouse into `region` and register it.
    pub fn spawn(
        &mut self,
        id: WarehouseId,
        region: RegionId,
        world: &mut impl WorldPlacement,
    ) -> Result<Vec<Placed>, WorldError> {
        let warehouse = self
            .warehouses
            .get_mut(&id)
            .ok_or(WorldError::UnknownWarehouse(id))?;
        let placed = warehouse.spawn(region, world, &mut self.rng)?;
        self.registry
            .add(region, id, warehouse.cell(), warehouse.visibility());
        Ok(placed)
    }

    /// Despawn a warehouse, ejecting its contents, and deregister it.
    pub fn despawn(
        &mut self,
        id: WarehouseId,
        world: &mut impl WorldPlacement,
        forbid: bool,
    ) -> Result<Emptied, WorldError> {
        let warehouse = self
            .warehouses
            .get_mut(&id)
            .ok_or(WorldError::UnknownWarehouse(id))?;
        let region = warehouse.region();
        let emptied = warehouse.despawn(world, &mut self.rng, forbid)?;
        if let Some(region) = region {
            self.registry.remove(region, id);
        }
        Ok(emptied)
    }

    /// Destroy a warehouse, ejecting its contents, deregistering it, and
    /// dropping it from the depot.
    pub fn destroy(
        &mut self,
        id: WarehouseId,
        world: &mut impl WorldPlacement,
        forbid: bool,
    ) -> Result<Emptied, WorldError> {
        let mut warehouse = self
            .warehouses
            .remove(&id)
            .ok_or(WorldError::UnknownWarehouse(id))?;
        let region = warehouse.region();
        let emptied = warehouse.destroy(world, &mut self.rng, forbid)?;
        if let Some(region) = region {
            self.registry.remove(region, id);
        }
        Ok(emptied)
    }

    /// Run one warehouse's periodic update.
    pub fn tick(
        &mut self,
        id: WarehouseId,
        now: u64,
        policy: &TickPolicy,
        world: &mut impl WorldPlacement,
        exclusions: &BTreeSet<ItemId>,
    ) -> Result<TickReport, WorldError> {
        let warehouse = self
            .warehouses
            .get_mut(&id)
            .ok_or(WorldError::UnknownWarehouse(id))?;
        warehouse.tick(now, policy, world, &mut self.rng, exclusions)
    }

    /// Empty one warehouse into the world.
    pub fn empty(
        &mut self,
        id: WarehouseId,
        world: &mut impl WorldPlacement,
        force: bool,
        forbid: bool,
    ) -> Result<Emptied, WorldError> {
        let warehouse = self
            .warehouses
            .get_mut(&id)
            .ok_or(WorldError::UnknownWarehouse(id))?;
        Ok(warehouse.empty(world, &mut self.rng, force, forbid))
    }

    /// Place a stack next to a warehouse. See [`Warehouse::materialize`].
    pub fn materialize(
        &mut self,
        id: WarehouseId,
        stack: ItemStack,
        world: &mut impl WorldPlacement,
        forbid: bool,
    ) -> Result<Vec<Placed>, Vec<ItemStack>> {
        match self.warehouses.get(&id) {
            Some(warehouse) => warehouse.materialize(stack, world, &mut self.rng, forbid),
            None => Err(vec![stack]),
        }
    }

    /// A held warehouse.
    pub fn get(&self, id: WarehouseId) -> Option<&Warehouse> {
        self.warehouses.get(&id)
    }

    /// A held warehouse, mutably.
    pub fn get_mut(&mut self, id: WarehouseId) -> Option<&mut Warehouse> {
        self.warehouses.get_mut(&id)
    }

    /// Every held warehouse, in id order.
    pub fn warehouses(&self) -> impl Iterator<Item = &Warehouse> {
        self.warehouses.values()
    }

    /// Ids of every held warehouse, in id order.
    pub fn ids(&self) -> Vec<WarehouseId> {
        self.warehouses.keys().copied().collect()
    }

    /// The registry over spawned warehouses.
    pub const fn registry(&self) -> &WarehouseRegistry {
        &self.registry
    }

    /// Number of held warehouses.
    pub fn len(&self) -> usize {
        self.warehouses.len()
    }

    /// Whether the depot holds no warehouses.
    pub fn is_empty(&self) -> bool {
        self.warehouses.is_empty()
    }

    /// Drop every warehouse and clear the registry (world unload).
    pub fn reset(&mut self) {
        self.warehouses.clear();
        self.registry.clear();
        tracing::info!("depot reset");
    }

    /// Re-derive registry membership from the spawned warehouses.
    pub fn rebuild_registry(&mut self) {
        self.registry.clear();
        for warehouse in self.warehouses.values() {
            if let Some(region) = warehouse.region() {
                self.registry
                    .add(region, warehouse.id(), warehouse.cell(), warehouse.visibility());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Capture every warehouse. Spawned ones come first, in registry order,
    /// so a restore re-registers them in the same order.
    pub fn snapshot(&self) -> DepotSnapshot {
        let mut seen = BTreeSet::new();
        let mut warehouses = Vec::with_capacity(self.warehouses.len());
        for region in self.registry.regions() {
            for id in self.registry.all_in_region(region) {
                if let Some(w) = self.warehouses.get(&id) {
                    seen.insert(id);
                    warehouses.push(w.snapshot());
                }
            }
        }
        warehouses.extend(
            self.warehouses
                .values()
                .filter(|w| !seen.contains(&w.id()))
                .map(Warehouse::snapshot),
        );
        DepotSnapshot { warehouses }
    }

    /// Replace the depot's contents with a snapshot, respawning every
    /// warehouse that was spawned when saved.
    ///
    /// Returns the pending-dump items ejected by those spawns.
    pub fn restore(
        &mut self,
        snapshot: DepotSnapshot,
        world: &mut impl WorldPlacement,
    ) -> Result<Vec<Placed>, WorldError> {
        self.reset();
        let mut to_spawn = Vec::new();
        for saved in snapshot.warehouses {
            let region = saved.region;
            let id = self.insert(Warehouse::restore(saved))?;
            if let Some(region) = region {
                to_spawn.push((id, region));
            }
        }
        let mut placed = Vec::new();
        for (id, region) in to_spawn {
            placed.extend(self.spawn(id, region, world)?);
        }
        tracing::info!(
            warehouses = self.warehouses.len(),
            spawned = self.registry.len(),
            "depot restored"
        );
        Ok(placed)
    }

    /// Encode a snapshot as JSON.
    pub fn to_json(&self) -> Result<String, WorldError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Decode a JSON snapshot and [`Depot::restore`] it.
    pub fn load_json(
        &mut self,
        json: &str,
        world: &mut impl WorldPlacement,
    ) -> Result<Vec<Placed>, WorldError> {
        let snapshot: DepotSnapshot = serde_json::from_str(json)?;
        self.restore(snapshot, world)
    }
}

#[cfg(test)]
mod tests {
    use hoard_types::{Cell, ItemDef, ItemFilter};

    use super::*;
    use crate::placement::GridWorld;
    use crate::registry::Visibility;

    fn world() -> (GridWorld, RegionId) {
        let mut w = GridWorld::new();
        let region = RegionId::new();
        w.add_region(region, 30, 30);
        (w, region)
    }

    #[test]
    fn spawn_and_despawn_track_registry() {
        let (mut world, region) = world();
        let mut depot = Depot::with_seed(1);
        let id = depot
            .insert(Warehouse::new(Cell::new(5, 5), ItemFilter::allow_all()))
            .unwrap_or_default();
        assert!(depot.registry().is_empty());

        assert!(depot.spawn(id, region, &mut world).is_ok());
        assert_eq!(depot.registry().all_in_region(region), vec![id]);

        assert!(depot.despawn(id, &mut world, true).is_ok());
        assert!(depot.registry().is_empty());
        assert!(depot.get(id).is_some());
    }

    #[test]
    fn destroy_drops_warehouse_and_ejects_contents() {
        let (mut world, region) = world();
        let mut depot = Depot::with_seed(2);
        let id = depot
            .insert(Warehouse::new(Cell::new(5, 5), ItemFilter::allow_all()))
            .unwrap_or_default();
        depot.spawn(id, region, &mut world).ok();
        if let Some(w) = depot.get_mut(id) {
            w.add(ItemStack::new(ItemDef::new("Steel", 75, 0.5), 30), false).ok();
        }

        let emptied = depot.destroy(id, &mut world, true);
        assert_eq!(emptied.map(|e| e.placed_units()).ok(), Some(30));
        assert!(depot.get(id).is_none());
        assert!(depot.registry().is_empty());
        assert!(matches!(
            depot.destroy(id, &mut world, true),
            Err(WorldError::UnknownWarehouse(_))
        ));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut depot = Depot::with_seed(3);
        let w = Warehouse::new(Cell::new(0, 0), ItemFilter::allow_all());
        assert!(depot.insert(w.clone()).is_ok());
        assert!(matches!(depot.insert(w), Err(WorldError::DuplicateWarehouse(_))));
    }

    #[test]
    fn reset_and_rebuild_registry() {
        let (mut world, region) = world();
        let mut depot = Depot::with_seed(4);
        let a = depot
            .insert(Warehouse::new(Cell::new(1, 1), ItemFilter::allow_all()))
            .unwrap_or_default();
        let b = depot
            .insert(
                Warehouse::new(Cell::new(2, 2), ItemFilter::allow_all())
                    .with_visibility(Visibility::LocalOnly),
            )
            .unwrap_or_default();
        depot.spawn(a, region, &mut world).ok();
        depot.spawn(b, region, &mut world).ok();

        depot.rebuild_registry();
        assert_eq!(depot.registry().len(), 2);
        assert_eq!(depot.registry().all_global(), vec![(region, a)]);

        depot.reset();
        assert!(depot.is_empty());
        assert!(depot.registry().is_empty());
    }

    #[test]
    fn malformed_json_is_a_snapshot_error() {
        let (mut world, _) = world();
        let mut depot = Depot::with_seed(5);
        assert!(matches!(
            depot.load_json("{not json", &mut world),
            Err(WorldError::Snapshot { .. })
        ));
    }
}
