//! Entry points for host systems that should see warehouse stock as if it
//! were lying loose in the world.
//!
//! Hosts tally resources, gather goods for trade, and select build
//! materials through these functions instead of reaching into warehouses.

use std::collections::{BTreeMap, BTreeSet};

use hoard_types::{ItemFilter, ItemId, ItemStack, RegionId, TypeKey, WarehouseId};
use hoard_world::{Depot, Placed, WorldPlacement};
use tracing::{debug, info};

/// Stored units per type across every warehouse registered in `region`.
pub fn resource_tally(depot: &Depot, region: RegionId) -> BTreeMap<TypeKey, u64> {
    let mut tally = BTreeMap::new();
    for id in depot.registry().all_in_region(region) {
        let Some(warehouse) = depot.get(id) else {
            continue;
        };
        for stack in warehouse.stored_items() {
            let total = tally.entry(stack.key()).or_insert(0_u64);
            *total = total.saturating_add(u64::from(stack.count));
        }
    }
    tally
}

/// Every stored stack in `region`, tagged with its warehouse.
pub fn stored_things(depot: &Depot, region: RegionId) -> Vec<(WarehouseId, &ItemStack)> {
    depot
        .registry()
        .all_in_region(region)
        .into_iter()
        .filter_map(|id| depot.get(id))
        .flat_map(|w| {
            let id = w.id();
            w.stored_items().map(move |s| (id, s))
        })
        .collect()
}

/// Stored units in `region` passing `filter`.
pub fn stored_thing_count(depot: &Depot, region: RegionId, filter: &ItemFilter) -> u64 {
    depot
        .registry()
        .all_in_region(region)
        .into_iter()
        .filter_map(|id| depot.get(id))
        .fold(0_u64, |acc, w| acc.saturating_add(w.stored_count(filter)))
}

/// Empty every globally visible, trade-participating, operational
/// warehouse in `region` into the world so a trade screen can see its
/// goods. Local-only warehouses never take part.
///
/// Items are placed unforbidden and auto-collection is paused on each
/// emptied warehouse so the goods stay out until [`reclaim_all`] runs.
pub fn gather_for_trade(
    depot: &mut Depot,
    region: RegionId,
    world: &mut impl WorldPlacement,
) -> Vec<Placed> {
    let mut placed = Vec::new();
    for id in depot.registry().global_in_region(region) {
        let participates = depot
            .get(id)
            .is_some_and(|w| w.include_in_trade_deals() && w.is_operational());
        if !participates {
            continue;
        }
        if let Ok(emptied) = depot.empty(id, world, false, false) {
            placed.extend(emptied.placed);
        }
        if let Some(w) = depot.get_mut(id) {
            w.pause_auto_collect();
        }
    }
    info!(region = %region, stacks = placed.len(), "gathered warehouse stock for trade");
    placed
}

/// Resume auto-collection on every warehouse in `region` and reclaim
/// whatever lies next to each of them.
///
/// Returns the number of loose stacks absorbed.
pub fn reclaim_all(
    depot: &mut Depot,
    region: RegionId,
    world: &mut impl WorldPlacement,
    now: u64,
    exclusions: &BTreeSet<ItemId>,
) -> usize {
    let mut absorbed = 0_usize;
    for id in depot.registry().all_in_region(region) {
        if let Some(w) = depot.get_mut(id) {
            absorbed = absorbed.saturating_add(w.resume_auto_collect(world, now, exclusions));
        }
    }
    debug!(region = %region, absorbed, "reclaimed around every warehouse");
    absorbed
}
