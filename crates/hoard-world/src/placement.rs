//! The world placement collaborator.
//!
//! Warehouses never own the map. They reach it through [`WorldPlacement`]:
//! look up loose items near a cell, pull an item out of the world, drop a
//! stack near a cell, and move or forbid a placed item. Hosts implement the
//! trait over their own map; [`GridWorld`] is a self-contained in-memory
//! implementation used by the engine binary and the tests.
//!
//! All operations are idempotent on items that are already gone.

use std::collections::{BTreeMap, BTreeSet};

use hoard_types::{Cell, ItemId, ItemStack, RegionId, TypeKey};

/// Where a materialized stack ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    /// Id of the stack now lying in the world.
    pub id: ItemId,
    /// Region it was placed in.
    pub region: RegionId,
    /// Final cell.
    pub cell: Cell,
    /// Units in the placed stack.
    pub count: u32,
}

/// Map primitives a warehouse needs from its host world.
pub trait WorldPlacement {
    /// Ids of loose stacks lying on `cell`.
    fn items_at(&self, region: RegionId, cell: Cell) -> Vec<ItemId>;

    /// A loose stack by id, if it is still in the world.
    fn item(&self, id: ItemId) -> Option<&ItemStack>;

    /// Whether a loose stack is forbidden for pickup.
    fn is_forbidden(&self, id: ItemId) -> bool;

    /// Take a loose stack out of the world. `None` if it is already gone.
    fn despawn(&mut self, id: ItemId) -> Option<ItemStack>;

    /// Drop `stack` on or near `origin`. Hands the stack back when there is
    /// no room.
    fn try_spawn_near(
        &mut self,
        region: RegionId,
        stack: ItemStack,
        origin: Cell,
    ) -> Result<Placed, ItemStack>;

    /// Move a loose stack. `false` if the item is gone or the cell is
    /// unusable.
    fn set_position(&mut self, id: ItemId, cell: Cell) -> bool;

    /// Mark a loose stack as forbidden (or not) for pickup.
    fn set_forbidden(&mut self, id: ItemId, forbidden: bool) -> bool;
}

// ---------------------------------------------------------------------------
// GridWorld
// ---------------------------------------------------------------------------

/// How far from the origin [`GridWorld::try_spawn_near`] searches.
pub const SPAWN_SEARCH_RADIUS: i32 = 3;

/// A stack lying loose in a [`GridWorld`].
#[derive(Debug, Clone, PartialEq)]
pub struct LooseItem {
    /// The stack itself.
    pub stack: ItemStack,
    /// Region it lies in.
    pub region: RegionId,
    /// Cell it lies on.
    pub cell: Cell,
    /// Whether hauling logic must leave it alone.
    pub forbidden: bool,
}

#[derive(Debug, Clone)]
struct RegionGrid {
    width: i32,
    height: i32,
    blocked: BTreeSet<Cell>,
    occupied: BTreeMap<Cell, ItemId>,
}

impl RegionGrid {
    const fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.z >= 0 && cell.x < self.width && cell.z < self.height
    }

    fn is_free(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && !self.blocked.contains(&cell) && !self.occupied.contains_key(&cell)
    }
}

/// In-memory rectangular regions holding at most one loose stack per cell.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    regions: BTreeMap<RegionId, RegionGrid>,
    items: BTreeMap<ItemId, LooseItem>,
}

impl GridWorld {
    /// Create a world with no regions.
    pub const fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }

    /// Add an empty `width` x `height` region. Replaces any region with the
    /// same id, dropping its items.
    pub fn add_region(&mut self, region: RegionId, width: i32, height: i32) {
        self.items.retain(|_, item| item.region != region);
        self.regions.insert(
            region,
            RegionGrid {
                width: width.max(0),
                height: height.max(0),
                blocked: BTreeSet::new(),
                occupied: BTreeMap::new(),
            },
        );
    }

    /// Make a cell unusable for items (a wall, a building).
    pub fn block(&mut self, region: RegionId, cell: Cell) {
        if let Some(grid) = self.regions.get_mut(&region) {
            grid.blocked.insert(cell);
        }
    }

    /// Put `stack` exactly on `cell`. Hands it back if the cell is taken.
    pub fn place(
        &mut self,
        region: RegionId,
        stack: ItemStack,
        cell: Cell,
    ) -> Result<ItemId, ItemStack> {
        let Some(grid) = self.regions.get_mut(&region) else {
            return Err(stack);
        };
        if !grid.is_free(cell) {
            return Err(stack);
        }
        let id = stack.id;
        grid.occupied.insert(cell, id);
        self.items.insert(
            id,
            LooseItem {
                stack,
                region,
                cell,
                forbidden: false,
            },
        );
        Ok(id)
    }

    /// A loose item with its placement details.
    pub fn loose(&self, id: ItemId) -> Option<&LooseItem> {
        self.items.get(&id)
    }

    /// Every loose item, in id order.
    pub fn loose_items(&self) -> impl Iterator<Item = &LooseItem> {
        self.items.values()
    }

    /// Loose units of `key` in `region`.
    pub fn count_loose(&self, region: RegionId, key: &TypeKey) -> u64 {
        self.items
            .values()
            .filter(|i| i.region == region && &i.stack.key() == key)
            .fold(0_u64, |acc, i| acc.saturating_add(u64::from(i.stack.count)))
    }

    fn free_cell_near(&self, region: RegionId, origin: Cell) -> Option<Cell> {
        let grid = self.regions.get(&region)?;
        (0..=SPAWN_SEARCH_RADIUS).find_map(|r| {
            ring(origin, r).into_iter().find(|c| grid.is_free(*c))
        })
    }
}

/// Cells at Chebyshev distance exactly `r` from `origin`, row by row.
fn ring(origin: Cell, r: i32) -> Vec<Cell> {
    let mut cells = Vec::new();
    for dz in -r..=r {
        for dx in -r..=r {
            if dx.abs().max(dz.abs()) == r {
                cells.push(Cell::new(
                    origin.x.saturating_add(dx),
                    origin.z.saturating_add(dz),
                ));
            }
        }
    }
    cells
}

impl WorldPlacement for GridWorld {
    fn items_at(&self, region: RegionId, cell: Cell) -> Vec<ItemId> {
        self.regions
            .get(&region)
            .and_then(|grid| grid.occupied.get(&cell))
            .copied()
            .into_iter()
            .collect()
    }

    fn item(&self, id: ItemId) -> Option<&ItemStack> {
        self.items.get(&id).map(|i| &i.stack)
    }

    fn is_forbidden(&self, id: ItemId) -> bool {
        self.items.get(&id).is_some_and(|i| i.forbidden)
    }

    fn despawn(&mut self, id: ItemId) -> Option<ItemStack> {
        let item = self.items.remove(&id)?;
        if let Some(grid) = self.regions.get_mut(&item.region) {
            grid.occupied.remove(&item.cell);
        }
        Some(item.stack)
    }

    fn try_spawn_near(
        &mut self,
        region: RegionId,
        stack: ItemStack,
        origin: Cell,
    ) -> Result<Placed, ItemStack> {
        let Some(cell) = self.free_cell_near(region, origin) else {
            tracing::debug!(region = %region, origin = %origin, key = %stack.key(), "no free cell near origin");
            return Err(stack);
        };
        let count = stack.count;
        let id = self.place(region, stack, cell)?;
        Ok(Placed {
            id,
            region,
            cell,
            count,
        })
    }

    fn set_position(&mut self, id: ItemId, cell: Cell) -> bool {
        let Some(item) = self.items.get_mut(&id) else {
            return false;
        };
        let Some(grid) = self.regions.get_mut(&item.region) else {
            return false;
        };
        if item.cell == cell {
            return true;
        }
        if !grid.is_free(cell) {
            return false;
        }
        grid.occupied.remove(&item.cell);
        grid.occupied.insert(cell, id);
        item.cell = cell;
        true
    }

    fn set_forbidden(&mut self, id: ItemId, forbidden: bool) -> bool {
        self.items
            .get_mut(&id)
            .map(|i| i.forbidden = forbidden)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use hoard_types::ItemDef;

    use super::*;

    fn world() -> (GridWorld, RegionId) {
        let mut w = GridWorld::new();
        let region = RegionId::new();
        w.add_region(region, 10, 10);
        (w, region)
    }

    fn wood(count: u32) -> ItemStack {
        ItemStack::new(ItemDef::new("Wood", 75, 0.4), count)
    }

    #[test]
    fn spawn_prefers_origin_then_rings() {
        let (mut w, region) = world();
        let first = w.try_spawn_near(region, wood(5), Cell::new(5, 5));
        assert_eq!(first.map(|p| p.cell).ok(), Some(Cell::new(5, 5)));
        let second = w.try_spawn_near(region, wood(5), Cell::new(5, 5));
        let cell = second.map(|p| p.cell).ok();
        assert!(cell.is_some_and(|c| c != Cell::new(5, 5) && c.distance_squared(Cell::new(5, 5)) <= 2));
    }

    #[test]
    fn full_neighbourhood_hands_stack_back() {
        let (mut w, region) = world();
        for x in 0..10 {
            for z in 0..10 {
                w.block(region, Cell::new(x, z));
            }
        }
        let stack = wood(5);
        let id = stack.id;
        let result = w.try_spawn_near(region, stack, Cell::new(5, 5));
        assert_eq!(result.err().map(|s| s.id), Some(id));
    }

    #[test]
    fn despawn_is_idempotent() {
        let (mut w, region) = world();
        let id = w.place(region, wood(5), Cell::new(1, 1)).ok();
        assert!(id.is_some());
        let id = id.unwrap_or_default();
        assert!(w.despawn(id).is_some());
        assert!(w.despawn(id).is_none());
        assert!(w.items_at(region, Cell::new(1, 1)).is_empty());
    }

    #[test]
    fn set_position_respects_occupancy() {
        let (mut w, region) = world();
        let a = w.place(region, wood(1), Cell::new(1, 1)).unwrap_or_default();
        w.place(region, wood(1), Cell::new(2, 1)).ok();
        assert!(!w.set_position(a, Cell::new(2, 1)));
        assert!(w.set_position(a, Cell::new(1, 2)));
        assert_eq!(w.items_at(region, Cell::new(1, 2)), vec![a]);
        assert!(!w.set_position(a, Cell::new(-1, 0)));
    }

    #[test]
    fn forbidden_flag_round_trips() {
        let (mut w, region) = world();
        let a = w.place(region, wood(1), Cell::new(1, 1)).unwrap_or_default();
        assert!(!w.is_forbidden(a));
        assert!(w.set_forbidden(a, true));
        assert!(w.is_forbidden(a));
        assert!(!w.set_forbidden(ItemId::new(), true));
    }

    #[test]
    fn count_loose_sums_by_key() {
        let (mut w, region) = world();
        w.place(region, wood(5), Cell::new(1, 1)).ok();
        w.place(region, wood(7), Cell::new(2, 2)).ok();
        assert_eq!(w.count_loose(region, &wood(1).key()), 12);
    }
}
