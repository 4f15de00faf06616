//! Per-tick driver: runs every spawned warehouse's periodic update.
//!
//! The host scheduler calls [`tick_all`] once per turn. Each warehouse's
//! update refreshes its power draw, empties it on power loss when the
//! configuration asks for that, and otherwise runs automatic collection
//! once the collection interval has elapsed. A failing warehouse is logged
//! and skipped; the rest still tick.

use std::collections::{BTreeMap, BTreeSet};

use hoard_types::{ItemId, WarehouseId};
use hoard_world::{Depot, TickReport, WorldPlacement};
use tracing::{debug, info, warn};

use crate::config::StorageConfig;

/// Summary of a single tick across the depot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Warehouses that ran their update.
    pub warehouses_ticked: usize,
    /// Loose stacks pulled in by automatic collection.
    pub collected: usize,
    /// Warehouses emptied by power loss, with units placed into the world.
    pub emptied: BTreeMap<WarehouseId, u64>,
    /// Sum of power requested by powered warehouses.
    pub total_draw: f64,
}

impl TickSummary {
    fn record(&mut self, id: WarehouseId, report: &TickReport) {
        self.warehouses_ticked = self.warehouses_ticked.saturating_add(1);
        self.collected = self.collected.saturating_add(report.collected);
        if let Some(emptied) = &report.emptied {
            self.emptied.insert(id, emptied.placed_units());
        }
        if let Some(draw) = report.draw {
            self.total_draw += draw;
        }
    }
}

/// Tick every spawned warehouse in the depot, in id order.
///
/// Unspawned and despawned warehouses are skipped. Loose items in
/// `exclusions` are never auto-collected.
pub fn tick_all(
    depot: &mut Depot,
    world: &mut impl WorldPlacement,
    now: u64,
    config: &StorageConfig,
    exclusions: &BTreeSet<ItemId>,
) -> TickSummary {
    let policy = config.tick_policy();
    let spawned: Vec<WarehouseId> = depot
        .warehouses()
        .filter(|w| w.region().is_some())
        .map(hoard_world::Warehouse::id)
        .collect();

    let mut summary = TickSummary {
        tick: now,
        ..TickSummary::default()
    };
    for id in spawned {
        match depot.tick(id, now, &policy, world, exclusions) {
            Ok(report) => summary.record(id, &report),
            Err(e) => warn!(warehouse = %id, error = %e, "warehouse tick failed"),
        }
    }

    if !summary.emptied.is_empty() {
        info!(
            tick = now,
            emptied = summary.emptied.len(),
            "warehouses emptied by power loss"
        );
    }
    debug!(
        tick = now,
        warehouses = summary.warehouses_ticked,
        collected = summary.collected,
        draw = summary.total_draw,
        "tick complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use hoard_types::{Cell, ItemDef, ItemFilter, ItemStack, RegionId};
    use hoard_world::{GridWorld, PowerLink, Warehouse, WorldPlacement};

    use super::*;

    fn steel(count: u32) -> ItemStack {
        ItemStack::new(ItemDef::new("Steel", 75, 0.5), count)
    }

    #[test]
    fn collects_neighbouring_items_and_skips_unspawned() {
        let mut world = GridWorld::new();
        let region = RegionId::new();
        world.add_region(region, 20, 20);
        let mut depot = Depot::with_seed(42);

        let spawned = depot
            .insert(Warehouse::new(Cell::new(5, 5), ItemFilter::allow_all()))
            .unwrap_or_default();
        depot.spawn(spawned, region, &mut world).ok();
        depot
            .insert(Warehouse::new(Cell::new(10, 10), ItemFilter::allow_all()))
            .ok();
        let loose = world.place(region, steel(12), Cell::new(5, 6)).ok();

        let summary = tick_all(
            &mut depot,
            &mut world,
            0,
            &StorageConfig::default(),
            &BTreeSet::new(),
        );
        assert_eq!(summary.warehouses_ticked, 1);
        assert_eq!(summary.collected, 1);
        assert!(loose.is_some_and(|id| world.item(id).is_none()));
        assert_eq!(depot.get(spawned).map(Warehouse::count), Some(12));
    }

    #[test]
    fn power_loss_empties_when_configured() {
        let mut world = GridWorld::new();
        let region = RegionId::new();
        world.add_region(region, 20, 20);
        let mut depot = Depot::with_seed(42);
        let id = depot
            .insert(
                Warehouse::new(Cell::new(5, 5), ItemFilter::allow_all())
                    .with_power(PowerLink::new(100.0, 1.0)),
            )
            .unwrap_or_default();
        depot.spawn(id, region, &mut world).ok();
        if let Some(w) = depot.get_mut(id) {
            w.add(steel(30), false).ok();
            w.set_power_supply(0.0);
        }

        let mut config = StorageConfig::default();
        config.storage.empty_on_power_loss = true;
        let summary = tick_all(&mut depot, &mut world, 1, &config, &BTreeSet::new());

        assert_eq!(summary.emptied.get(&id), Some(&30));
        assert_eq!(depot.get(id).map(Warehouse::count), Some(0));
        assert!(summary.total_draw.abs() < f64::EPSILON);
    }
}
