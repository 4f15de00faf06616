//! Demo world seeding for the engine binary.
//!
//! Builds one region with three warehouses (a powered general store, a
//! lumber yard that only takes wood, and a local-only armory), stocks them,
//! and scatters loose stacks around each so automatic collection has
//! something to do.

use hoard_core::{ResolutionRequest, StorageConfig};
use hoard_types::{Cell, ItemDef, ItemFilter, ItemStack, RegionId, WarehouseId};
use hoard_world::{Depot, GridWorld, PowerLink, Visibility, Warehouse};
use rand::Rng;
use tracing::{debug, info};

use crate::error::EngineError;

/// Width and height of the demo region.
pub const REGION_SIZE: i32 = 64;

/// Where the demo crafting job happens.
pub const WORKBENCH: Cell = Cell::new(28, 28);

/// Grid power available to the general store.
pub const STORE_SUPPLY: f64 = 400.0;

/// Loose stacks scattered around each warehouse.
const SCATTER_PER_WAREHOUSE: u32 = 6;

// -----------------------------------------------------------------------
// Item catalogue
// -----------------------------------------------------------------------

/// Steel bars.
pub fn steel() -> ItemDef {
    ItemDef::new("Steel", 75, 0.5)
}

/// Wood logs.
pub fn wood() -> ItemDef {
    ItemDef::new("Wood", 75, 0.4)
}

/// Industrial components.
pub fn components() -> ItemDef {
    ItemDef::new("ComponentIndustrial", 50, 0.6)
}

/// A non-stacking weapon.
pub fn rifle() -> ItemDef {
    ItemDef::new("Rifle", 1, 3.5)
}

/// A non-stacking art piece whose material is part of its identity.
pub fn sculpture() -> ItemDef {
    ItemDef::new("Sculpture", 1, 2.0).made_of("Marble")
}

// -----------------------------------------------------------------------
// Scenario
// -----------------------------------------------------------------------

/// The seeded demo world.
#[derive(Debug)]
pub struct Scenario {
    /// The map.
    pub world: GridWorld,
    /// Every warehouse plus the registry.
    pub depot: Depot,
    /// The single demo region.
    pub region: RegionId,
    /// The powered general store.
    pub store: WarehouseId,
    /// The wood-only lumber yard.
    pub lumber_yard: WarehouseId,
    /// The local-only armory.
    pub armory: WarehouseId,
}

impl Scenario {
    /// Build, spawn, and stock the demo warehouses.
    pub fn seed(config: &StorageConfig, rng: &mut impl Rng) -> Result<Self, EngineError> {
        let mut world = GridWorld::new();
        let region = RegionId::new();
        world.add_region(region, REGION_SIZE, REGION_SIZE);
        let mut depot = Depot::with_seed(config.engine.seed);

        let energy_factor = f64::from(config.storage.energy_factor);
        let store = depot.insert(
            Warehouse::new(Cell::new(16, 16), ItemFilter::allow_all())
                .with_power(PowerLink::new(STORE_SUPPLY, energy_factor)),
        )?;
        let lumber_yard =
            depot.insert(Warehouse::new(Cell::new(40, 16), ItemFilter::only(["Wood"])))?;
        let mut armory = Warehouse::new(Cell::new(40, 40), ItemFilter::only(["Rifle"]))
            .with_visibility(Visibility::LocalOnly);
        armory.set_include_in_trade_deals(false);
        let armory = depot.insert(armory)?;

        for id in [store, lumber_yard, armory] {
            depot.spawn(id, region, &mut world)?;
        }

        stock(&mut depot, store, [(steel(), 120), (components(), 30), (wood(), 40)]);
        stock(&mut depot, lumber_yard, [(wood(), 200)]);
        stock(&mut depot, armory, [(rifle(), 1), (rifle(), 1), (rifle(), 1)]);

        let mut scenario = Self {
            world,
            depot,
            region,
            store,
            lumber_yard,
            armory,
        };
        scenario.scatter(rng);

        info!(
            region = %region,
            warehouses = scenario.depot.len(),
            loose = scenario.world.loose_items().count(),
            "demo world seeded"
        );
        Ok(scenario)
    }

    /// Drop random loose stacks within two cells of every warehouse.
    fn scatter(&mut self, rng: &mut impl Rng) {
        let catalogue = [steel(), wood(), components(), rifle(), sculpture()];
        let cells: Vec<Cell> = self.depot.warehouses().map(Warehouse::cell).collect();
        for centre in cells {
            for _ in 0..SCATTER_PER_WAREHOUSE {
                let Some(def) = catalogue.get(rng.random_range(0..catalogue.len())) else {
                    continue;
                };
                let count = if def.is_stackable() {
                    rng.random_range(1..=def.max_stack)
                } else {
                    1
                };
                let cell = Cell::new(
                    centre.x.saturating_add(rng.random_range(-2..=2)),
                    centre.z.saturating_add(rng.random_range(-2..=2)),
                );
                let stack = ItemStack::new(def.clone(), count)
                    .with_hit_points(rng.random_range(0.5..=1.0));
                if self.world.place(self.region, stack, cell).is_err() {
                    debug!(cell = %cell, "scatter cell taken, skipped");
                }
            }
        }
    }

    /// The demo crafting job: steel and components for a machine.
    pub fn job(&self, radius: f32) -> ResolutionRequest {
        ResolutionRequest::new(self.region, WORKBENCH, radius)
            .require(ItemFilter::only(["Steel"]), 90)
            .require(ItemFilter::only(["ComponentIndustrial"]), 10)
    }
}

fn stock<const N: usize>(depot: &mut Depot, id: WarehouseId, items: [(ItemDef, u32); N]) {
    let Some(warehouse) = depot.get_mut(id) else {
        return;
    };
    for (def, count) in items {
        if let Err(refused) = warehouse.add(ItemStack::new(def, count), false) {
            debug!(warehouse = %id, refusal = ?refused.refusal, "initial stock refused");
        }
    }
}
