//! The warehouse facade: one stack ledger plus admission policy, power,
//! auto-collection, and lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! Unspawned --spawn--> Spawned --despawn--> Despawned --spawn--> Spawned
//!     |                   |
//!     +------destroy------+-----destroy-----> Destroyed
//! ```
//!
//! A spawned warehouse is *operational* unless it depends on power and the
//! grid does not cover its draw. Despawning or destroying forces every
//! stored stack back into the world first.
//!
//! An item is never in the world and in the ledger at once: absorbing a
//! loose item despawns it before it is stored, and materializing a stored
//! stack withdraws it before it is placed.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use hoard_ledger::{AddOutcome, Rejected, StackLedger};
use hoard_types::{Cell, ItemFilter, ItemId, ItemStack, RegionId, TypeKey, WarehouseId};

use crate::error::WorldError;
use crate::placement::{Placed, WorldPlacement};
use crate::power::PowerLink;
use crate::registry::Visibility;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Where a warehouse is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built or loaded, not yet placed.
    Unspawned,
    /// Placed in a region.
    Spawned {
        /// The region it stands in.
        region: RegionId,
    },
    /// Taken off the map; may be spawned again.
    Despawned,
    /// Gone for good.
    Destroyed,
}

/// Settings the per-tick update runs under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPolicy {
    /// Power draw per unit of stored mass.
    pub energy_factor: f64,
    /// Whether warehouses pull in nearby loose items on their own.
    pub collect_automatically: bool,
    /// Ticks between automatic collections.
    pub auto_collect_interval: u64,
    /// Whether a starved warehouse dumps its contents.
    pub empty_on_power_loss: bool,
    /// Whether dumped items are forbidden for pickup.
    pub forbid_emptied_items: bool,
}

impl Default for TickPolicy {
    fn default() -> Self {
        Self {
            energy_factor: 1.0,
            collect_automatically: true,
            auto_collect_interval: 600,
            empty_on_power_loss: false,
            forbid_emptied_items: true,
        }
    }
}

/// Why a warehouse turned an item away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The admission filter disallows the item.
    Filtered,
    /// The warehouse is emptying and takes nothing in.
    AddsPaused,
    /// Not spawned, or starved of power.
    NotOperational,
    /// Storing the item would push the power draw past the supply.
    InsufficientPower,
    /// The warehouse has been destroyed.
    Destroyed,
    /// The loose item is no longer in the world.
    Missing,
}

/// An item the warehouse refused, handed back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Refused {
    /// The refused stack.
    pub stack: ItemStack,
    /// Why it was refused.
    pub refusal: Refusal,
}

impl From<Rejected> for Refused {
    fn from(rejected: Rejected) -> Self {
        Self {
            stack: rejected.stack,
            refusal: Refusal::Filtered,
        }
    }
}

/// What an empty pass moved out of the ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emptied {
    /// Stacks now lying in the world.
    pub placed: Vec<Placed>,
    /// Units the world had no room for that went back into storage.
    pub retained: u64,
    /// Stacks the world had no room for, when there is no storage left to
    /// return them to (despawn, destroy).
    pub stranded: Vec<ItemStack>,
}

impl Emptied {
    /// Units placed into the world.
    pub fn placed_units(&self) -> u64 {
        self.placed
            .iter()
            .fold(0_u64, |acc, p| acc.saturating_add(u64::from(p.count)))
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Loose stacks pulled in by automatic collection.
    pub collected: usize,
    /// Set when power loss forced an empty.
    pub emptied: Option<Emptied>,
    /// Power requested after the tick, for powered warehouses.
    pub draw: Option<f64>,
}

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

/// One storage unit.
#[derive(Debug, Clone)]
pub struct Warehouse {
    id: WarehouseId,
    cell: Cell,
    filter: ItemFilter,
    ledger: StackLedger,
    power: Option<PowerLink>,
    visibility: Visibility,
    include_in_trade_deals: bool,
    can_auto_collect: bool,
    allow_adds: bool,
    last_auto_collect: Option<u64>,
    lifecycle: Lifecycle,
    /// Loaded items the filter refused, ejected on the next spawn.
    pending_dump: Vec<ItemStack>,
}

impl Warehouse {
    /// A new, unspawned, unpowered warehouse at `cell`.
    pub fn new(cell: Cell, filter: ItemFilter) -> Self {
        Self {
            id: WarehouseId::new(),
            cell,
            filter,
            ledger: StackLedger::new(),
            power: None,
            visibility: Visibility::Global,
            include_in_trade_deals: true,
            can_auto_collect: true,
            allow_adds: true,
            last_auto_collect: None,
            lifecycle: Lifecycle::Unspawned,
            pending_dump: Vec::new(),
        }
    }

    /// Make the warehouse depend on power.
    #[must_use]
    pub const fn with_power(mut self, link: PowerLink) -> Self {
        self.power = Some(link);
        self
    }

    /// Set which registry queries the warehouse shows up in.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Identity.
    pub const fn id(&self) -> WarehouseId {
        self.id
    }

    /// Cell it stands on.
    pub const fn cell(&self) -> Cell {
        self.cell
    }

    /// Current lifecycle state.
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Region while spawned.
    pub const fn region(&self) -> Option<RegionId> {
        match self.lifecycle {
            Lifecycle::Spawned { region } => Some(region),
            Lifecycle::Unspawned | Lifecycle::Despawned | Lifecycle::Destroyed => None,
        }
    }

    /// Registry visibility class.
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Admission filter.
    pub const fn filter(&self) -> &ItemFilter {
        &self.filter
    }

    /// Replace the admission filter. Stored items are kept.
    pub fn set_filter(&mut self, filter: ItemFilter) {
        self.filter = filter;
    }

    /// The underlying ledger.
    pub const fn ledger(&self) -> &StackLedger {
        &self.ledger
    }

    /// Power link, for powered warehouses.
    pub const fn power(&self) -> Option<&PowerLink> {
        self.power.as_ref()
    }

    /// Whether the warehouse depends on power.
    pub const fn uses_power(&self) -> bool {
        self.power.is_some()
    }

    /// Report how much power the grid now delivers. Returns `false` for
    /// unpowered warehouses.
    pub fn set_power_supply(&mut self, supply: f64) -> bool {
        match self.power.as_mut() {
            Some(link) => {
                link.supply = supply;
                true
            }
            None => false,
        }
    }

    /// Spawned and, if powered, supplied.
    pub fn is_operational(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Spawned { .. })
            && self.power.as_ref().is_none_or(PowerLink::is_powered)
    }

    /// Whether adds are currently allowed (false while emptying).
    pub const fn allows_adds(&self) -> bool {
        self.allow_adds
    }

    /// Whether world-spanning trade gathering may empty this warehouse.
    pub const fn include_in_trade_deals(&self) -> bool {
        self.include_in_trade_deals
    }

    /// Toggle trade participation.
    pub fn set_include_in_trade_deals(&mut self, include: bool) {
        self.include_in_trade_deals = include;
    }

    /// Whether automatic collection is currently allowed.
    pub const fn can_auto_collect(&self) -> bool {
        self.can_auto_collect
    }

    /// Suspend automatic collection.
    pub fn pause_auto_collect(&mut self) {
        self.can_auto_collect = false;
    }

    /// Resume automatic collection and reclaim right away.
    pub fn resume_auto_collect(
        &mut self,
        world: &mut impl WorldPlacement,
        now: u64,
        exclusions: &BTreeSet<ItemId>,
    ) -> usize {
        self.can_auto_collect = true;
        self.reclaim(world, now, exclusions)
    }

    /// Tick of the last collection pass.
    pub const fn last_auto_collect(&self) -> Option<u64> {
        self.last_auto_collect
    }

    /// Loaded items awaiting ejection on the next spawn.
    pub fn pending_dump(&self) -> &[ItemStack] {
        &self.pending_dump
    }

    // -----------------------------------------------------------------------
    // Stored contents
    // -----------------------------------------------------------------------

    /// Every stored stack.
    pub fn stored_items(&self) -> impl Iterator<Item = &ItemStack> {
        self.ledger.stacks()
    }

    /// Stored units passing `filter`.
    pub fn stored_count(&self, filter: &ItemFilter) -> u64 {
        self.ledger.count_matching(filter)
    }

    /// Stored units of one type.
    pub fn count_of(&self, key: &TypeKey) -> u64 {
        self.ledger.count_of(key)
    }

    /// Total stored units.
    pub const fn count(&self) -> u64 {
        self.ledger.count()
    }

    /// Total stored mass.
    pub const fn weight(&self) -> f64 {
        self.ledger.weight()
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    fn refusal(&self, stack: &ItemStack) -> Option<Refusal> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Some(Refusal::Destroyed);
        }
        if !self.allow_adds {
            return Some(Refusal::AddsPaused);
        }
        if !self.is_operational() {
            return Some(Refusal::NotOperational);
        }
        if !self.filter.allows(stack) {
            return Some(Refusal::Filtered);
        }
        let projected = self.ledger.weight() + hoard_ledger::aggregate::mass(stack);
        if let Some(link) = &self.power {
            if !link.can_support(projected) {
                return Some(Refusal::InsufficientPower);
            }
        }
        None
    }

    /// Whether an unforced add of `stack` would succeed.
    pub fn accepts(&self, stack: &ItemStack) -> bool {
        self.refusal(stack).is_none()
    }

    /// Store a stack the caller holds.
    ///
    /// Unless `force`, the stack must pass [`Warehouse::accepts`]. Forced
    /// adds only fail on a destroyed warehouse.
    pub fn add(&mut self, stack: ItemStack, force: bool) -> Result<AddOutcome, Refused> {
        let refusal = if force {
            (self.lifecycle == Lifecycle::Destroyed).then_some(Refusal::Destroyed)
        } else {
            self.refusal(&stack)
        };
        if let Some(refusal) = refusal {
            tracing::debug!(warehouse = %self.id, key = %stack.key(), ?refusal, "add refused");
            return Err(Refused { stack, refusal });
        }
        let outcome = self.ledger.add(stack, &self.filter, true).map_err(Refused::from);
        self.refresh_draw();
        outcome
    }

    /// Pull a loose item out of the world and store it.
    ///
    /// The item is checked first and despawned only once accepted, so a
    /// refused item stays where it lies.
    pub fn absorb_from_world(
        &mut self,
        world: &mut impl WorldPlacement,
        id: ItemId,
        force: bool,
    ) -> Result<AddOutcome, Refusal> {
        let Some(stack) = world.item(id) else {
            return Err(Refusal::Missing);
        };
        if !force {
            if let Some(refusal) = self.refusal(stack) {
                return Err(refusal);
            }
        }
        let Some(stack) = world.despawn(id) else {
            return Err(Refusal::Missing);
        };
        self.add(stack, true).map_err(|refused| refused.refusal)
    }

    /// Pull in loose, unforbidden items lying on the warehouse's cell or an
    /// orthogonal neighbour, skipping ids in `exclusions`.
    ///
    /// Returns how many stacks were absorbed. Restarts the auto-collect
    /// timer even when nothing was found.
    pub fn reclaim(
        &mut self,
        world: &mut impl WorldPlacement,
        now: u64,
        exclusions: &BTreeSet<ItemId>,
    ) -> usize {
        let Some(region) = self.region() else {
            return 0;
        };
        if !self.is_operational() {
            return 0;
        }
        self.last_auto_collect = Some(now);

        let mut cells = vec![self.cell];
        cells.extend(self.cell.orthogonal_neighbours());

        let mut absorbed = 0_usize;
        for cell in cells {
            for id in world.items_at(region, cell) {
                if exclusions.contains(&id) || world.is_forbidden(id) {
                    continue;
                }
                if self.absorb_from_world(world, id, false).is_ok() {
                    absorbed = absorbed.saturating_add(1);
                }
            }
        }
        if absorbed > 0 {
            tracing::debug!(warehouse = %self.id, absorbed, "reclaimed loose items");
        }
        absorbed
    }

    // -----------------------------------------------------------------------
    // Withdrawal
    // -----------------------------------------------------------------------

    /// Withdraw `count` units passing `filter`, across types, in ledger
    /// order.
    ///
    /// Unless `allow_partial`, nothing is withdrawn when fewer than `count`
    /// units match.
    pub fn try_remove(
        &mut self,
        filter: &ItemFilter,
        count: u32,
        allow_partial: bool,
    ) -> Option<Vec<ItemStack>> {
        let available = self.ledger.count_matching(filter);
        if count == 0 || available == 0 || (available < u64::from(count) && !allow_partial) {
            return None;
        }
        let candidates: Vec<(ItemId, u32)> = self
            .ledger
            .stacks()
            .filter(|s| filter.allows(s))
            .map(|s| (s.id, s.count))
            .collect();

        let mut need = count;
        let mut taken = Vec::new();
        for (id, held) in candidates {
            if need == 0 {
                break;
            }
            if let Some(stack) = self.ledger.take_from_stack(id, held.min(need)) {
                need = need.saturating_sub(stack.count);
                taken.push(stack);
            }
        }
        self.refresh_draw();
        Some(taken)
    }

    /// Withdraw at most one full stack of the first type passing `filter`.
    pub fn try_remove_one(&mut self, filter: &ItemFilter) -> Option<ItemStack> {
        let (id, count) = self
            .ledger
            .stacks()
            .find(|s| filter.allows(s))
            .map(|s| (s.id, s.count.min(s.def.max_stack.max(1))))?;
        let taken = self.ledger.take_from_stack(id, count);
        self.refresh_draw();
        taken
    }

    /// Withdraw `count` units from one specific stored stack.
    pub fn take_from_stack(&mut self, id: ItemId, count: u32) -> Option<ItemStack> {
        let taken = self.ledger.take_from_stack(id, count);
        self.refresh_draw();
        taken
    }

    /// Keep the power draw in step with stored mass between ticks.
    fn refresh_draw(&mut self) {
        let weight = self.ledger.weight();
        if let Some(link) = self.power.as_mut() {
            link.update_draw(weight);
        }
    }

    // -----------------------------------------------------------------------
    // Materialization
    // -----------------------------------------------------------------------

    /// Place a withdrawn stack into the world next to the warehouse.
    ///
    /// Stacks larger than their type's `max_stack` go out as several
    /// chunks. A chunk landing on the warehouse's own cell is nudged to a
    /// random free orthogonal neighbour. If any chunk finds no room, the
    /// chunks already placed are taken back and every piece is returned.
    pub fn materialize(
        &self,
        stack: ItemStack,
        world: &mut impl WorldPlacement,
        rng: &mut impl Rng,
        forbid: bool,
    ) -> Result<Vec<Placed>, Vec<ItemStack>> {
        let Some(region) = self.region() else {
            return Err(vec![stack]);
        };
        let mut pieces = chunk(stack).into_iter();
        let mut placed = Vec::new();

        while let Some(piece) = pieces.next() {
            match world.try_spawn_near(region, piece, self.cell) {
                Ok(p) => {
                    let p = self.nudge(p, world, rng);
                    world.set_forbidden(p.id, forbid);
                    placed.push(p);
                }
                Err(piece) => {
                    tracing::warn!(
                        warehouse = %self.id,
                        key = %piece.key(),
                        count = piece.count,
                        "no room to materialize stack"
                    );
                    let mut back: Vec<ItemStack> =
                        placed.iter().filter_map(|p| world.despawn(p.id)).collect();
                    back.push(piece);
                    back.extend(pieces);
                    return Err(back);
                }
            }
        }
        Ok(placed)
    }

    fn nudge(&self, placed: Placed, world: &mut impl WorldPlacement, rng: &mut impl Rng) -> Placed {
        if placed.cell != self.cell {
            return placed;
        }
        let mut neighbours = self.cell.orthogonal_neighbours();
        neighbours.shuffle(rng);
        for cell in neighbours {
            if world.set_position(placed.id, cell) {
                return Placed { cell, ..placed };
            }
        }
        placed
    }

    /// Move every stored stack into the world.
    ///
    /// Without `force` this only runs on an operational warehouse. Stacks
    /// the world has no room for go back into storage. Adds are refused
    /// for the duration so ejected items are not absorbed again.
    pub fn empty(
        &mut self,
        world: &mut impl WorldPlacement,
        rng: &mut impl Rng,
        force: bool,
        forbid: bool,
    ) -> Emptied {
        if !force && !self.is_operational() {
            return Emptied::default();
        }
        let mut emptied = self.drain(world, rng, forbid);
        for stack in core::mem::take(&mut emptied.stranded) {
            emptied.retained = emptied.retained.saturating_add(u64::from(stack.count));
            self.ledger.add(stack, &self.filter, true).ok();
        }
        self.refresh_draw();
        tracing::info!(
            warehouse = %self.id,
            placed = emptied.placed_units(),
            retained = emptied.retained,
            "warehouse emptied"
        );
        emptied
    }

    fn drain(&mut self, world: &mut impl WorldPlacement, rng: &mut impl Rng, forbid: bool) -> Emptied {
        let mut emptied = Emptied::default();
        self.allow_adds = false;
        for stack in self.ledger.empty() {
            match self.materialize(stack, world, rng, forbid) {
                Ok(placed) => emptied.placed.extend(placed),
                Err(pieces) => emptied.stranded.extend(pieces),
            }
        }
        self.allow_adds = true;
        if let Some(link) = self.power.as_mut() {
            link.update_draw(0.0);
        }
        emptied
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Place the warehouse in `region` and eject any pending dump.
    ///
    /// Pending items the world has no room for stay pending.
    pub fn spawn(
        &mut self,
        region: RegionId,
        world: &mut impl WorldPlacement,
        rng: &mut impl Rng,
    ) -> Result<Vec<Placed>, WorldError> {
        match self.lifecycle {
            Lifecycle::Destroyed => return Err(WorldError::Destroyed(self.id)),
            Lifecycle::Spawned { .. } => return Err(WorldError::AlreadySpawned(self.id)),
            Lifecycle::Unspawned | Lifecycle::Despawned => {}
        }
        self.lifecycle = Lifecycle::Spawned { region };
        self.refresh_draw();

        let mut placed = Vec::new();
        let mut still_pending = Vec::new();
        for stack in core::mem::take(&mut self.pending_dump) {
            match self.materialize(stack, world, rng, false) {
                Ok(p) => placed.extend(p),
                Err(pieces) => still_pending.extend(pieces),
            }
        }
        self.pending_dump = still_pending;

        tracing::info!(
            warehouse = %self.id,
            region = %region,
            cell = %self.cell,
            stored = self.ledger.count(),
            dumped = placed.len(),
            "warehouse spawned"
        );
        Ok(placed)
    }

    /// Periodic update.
    ///
    /// Refreshes the power draw from stored mass, dumps everything when
    /// starved under an empty-on-power-loss policy, and otherwise runs
    /// automatic collection once the interval has elapsed.
    pub fn tick(
        &mut self,
        now: u64,
        policy: &TickPolicy,
        world: &mut impl WorldPlacement,
        rng: &mut impl Rng,
        exclusions: &BTreeSet<ItemId>,
    ) -> Result<TickReport, WorldError> {
        match self.lifecycle {
            Lifecycle::Spawned { .. } => {}
            Lifecycle::Destroyed => return Err(WorldError::Destroyed(self.id)),
            Lifecycle::Unspawned | Lifecycle::Despawned => {
                return Err(WorldError::NotSpawned(self.id));
            }
        }

        let weight = self.ledger.weight();
        if let Some(link) = self.power.as_mut() {
            link.energy_factor = policy.energy_factor;
            link.update_draw(weight);
        }

        let mut report = TickReport::default();
        let operational = self.is_operational();
        if !operational && policy.empty_on_power_loss && !self.ledger.is_empty() {
            tracing::info!(warehouse = %self.id, weight, "power lost, emptying");
            report.emptied = Some(self.empty(world, rng, true, policy.forbid_emptied_items));
        } else if operational
            && policy.collect_automatically
            && self.can_auto_collect
            && self.collect_due(now, policy.auto_collect_interval)
        {
            report.collected = self.reclaim(world, now, exclusions);
        }

        report.draw = self.power.as_ref().map(|link| link.draw);
        Ok(report)
    }

    fn collect_due(&self, now: u64, interval: u64) -> bool {
        self.last_auto_collect
            .is_none_or(|last| now.saturating_sub(last) >= interval)
    }

    /// Take the warehouse off the map, ejecting everything it holds.
    pub fn despawn(
        &mut self,
        world: &mut impl WorldPlacement,
        rng: &mut impl Rng,
        forbid: bool,
    ) -> Result<Emptied, WorldError> {
        let Some(region) = self.region() else {
            return Err(match self.lifecycle {
                Lifecycle::Destroyed => WorldError::Destroyed(self.id),
                _ => WorldError::NotSpawned(self.id),
            });
        };
        let emptied = self.drain(world, rng, forbid);
        self.lifecycle = Lifecycle::Despawned;
        tracing::info!(
            warehouse = %self.id,
            region = %region,
            placed = emptied.placed_units(),
            stranded = emptied.stranded.len(),
            "warehouse despawned"
        );
        Ok(emptied)
    }

    /// Destroy the warehouse, ejecting everything it holds.
    ///
    /// An unplaced warehouse cannot eject anything: its contents and any
    /// pending dump are handed back as stranded.
    pub fn destroy(
        &mut self,
        world: &mut impl WorldPlacement,
        rng: &mut impl Rng,
        forbid: bool,
    ) -> Result<Emptied, WorldError> {
        let mut emptied = match self.lifecycle {
            Lifecycle::Destroyed => return Err(WorldError::Destroyed(self.id)),
            Lifecycle::Spawned { .. } => self.drain(world, rng, forbid),
            Lifecycle::Unspawned | Lifecycle::Despawned => Emptied {
                stranded: self.ledger.empty(),
                ..Emptied::default()
            },
        };
        emptied.stranded.append(&mut self.pending_dump);
        self.lifecycle = Lifecycle::Destroyed;
        tracing::info!(
            warehouse = %self.id,
            placed = emptied.placed_units(),
            stranded = emptied.stranded.len(),
            "warehouse destroyed"
        );
        Ok(emptied)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Capture the warehouse's persistent state.
    pub fn snapshot(&self) -> WarehouseSnapshot {
        WarehouseSnapshot {
            id: self.id,
            cell: self.cell,
            filter: self.filter.clone(),
            items: self.ledger.stacks().cloned().collect(),
            pending_dump: self.pending_dump.clone(),
            include_in_trade_deals: self.include_in_trade_deals,
            can_auto_collect: self.can_auto_collect,
            power: self.power,
            visibility: self.visibility,
            region: self.region(),
            last_auto_collect: self.last_auto_collect,
        }
    }

    /// Rebuild an unspawned warehouse from a snapshot.
    ///
    /// Items are replayed through the admission filter; whatever it now
    /// refuses joins the pending dump.
    pub fn restore(snapshot: WarehouseSnapshot) -> Self {
        let WarehouseSnapshot {
            id,
            cell,
            filter,
            items,
            pending_dump,
            include_in_trade_deals,
            can_auto_collect,
            power,
            visibility,
            region: _,
            last_auto_collect,
        } = snapshot;

        let mut warehouse = Self {
            id,
            cell,
            filter,
            ledger: StackLedger::new(),
            power,
            visibility,
            include_in_trade_deals,
            can_auto_collect,
            allow_adds: true,
            last_auto_collect,
            lifecycle: Lifecycle::Unspawned,
            pending_dump,
        };
        for stack in items {
            if let Err(rejected) = warehouse.ledger.add(stack, &warehouse.filter, false) {
                warehouse.pending_dump.push(rejected.stack);
            }
        }
        if !warehouse.pending_dump.is_empty() {
            tracing::debug!(
                warehouse = %id,
                pending = warehouse.pending_dump.len(),
                "restored items refused by filter, queued for dump"
            );
        }
        warehouse
    }
}

/// Cut a stack into pieces no larger than its type's `max_stack`.
fn chunk(mut stack: ItemStack) -> Vec<ItemStack> {
    let limit = stack.def.max_stack.max(1);
    let mut pieces = Vec::new();
    while stack.count > limit {
        match stack.split_off(limit) {
            Some(piece) => pieces.push(piece),
            None => break,
        }
    }
    pieces.push(stack);
    pieces
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

const fn yes() -> bool {
    true
}

/// Persistent form of a [`Warehouse`]: a flat list of stored stacks plus
/// flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSnapshot {
    /// Identity.
    pub id: WarehouseId,
    /// Cell it stands on.
    pub cell: Cell,
    /// Admission filter.
    #[serde(default)]
    pub filter: ItemFilter,
    /// Every stored stack.
    #[serde(default)]
    pub items: Vec<ItemStack>,
    /// Items still waiting to be ejected.
    #[serde(default)]
    pub pending_dump: Vec<ItemStack>,
    /// Trade participation.
    #[serde(default = "yes")]
    pub include_in_trade_deals: bool,
    /// Automatic collection allowed.
    #[serde(default = "yes")]
    pub can_auto_collect: bool,
    /// Power link, for powered warehouses.
    #[serde(default)]
    pub power: Option<PowerLink>,
    /// Registry visibility class.
    #[serde(default)]
    pub visibility: Visibility,
    /// Region it stood in when saved, if spawned.
    #[serde(default)]
    pub region: Option<RegionId>,
    /// Tick of the last collection pass.
    #[serde(default)]
    pub last_auto_collect: Option<u64>,
}
