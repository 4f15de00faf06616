//! Warehouses, the warehouse registry, and world placement for hoard.
//!
//! This crate models the parts of the engine that touch the map: warehouse
//! lifecycles, the region-partitioned registry used for radius searches,
//! power gating, and the narrow placement interface through which stored
//! stacks leave and re-enter the world.
//!
//! # Modules
//!
//! - [`warehouse`] -- The [`Warehouse`] facade: admission, reclaim, empty,
//!   materialization, lifecycle, and snapshots.
//! - [`depot`] -- [`Depot`]: owns every warehouse and keeps the registry in
//!   step with spawns and despawns.
//! - [`registry`] -- [`WarehouseRegistry`]: region to warehouses, in
//!   insertion order, with global and local-only visibility classes.
//! - [`placement`] -- The [`WorldPlacement`] collaborator trait and the
//!   in-memory [`GridWorld`].
//! - [`power`] -- [`PowerLink`]: supply, draw, and projected margin.
//! - [`error`] -- Error types for lifecycle and depot operations.

pub mod depot;
pub mod error;
pub mod placement;
pub mod power;
pub mod registry;
pub mod warehouse;

// Re-export primary types at crate root.
pub use depot::{Depot, DepotSnapshot};
pub use error::WorldError;
pub use placement::{GridWorld, LooseItem, Placed, WorldPlacement};
pub use power::PowerLink;
pub use registry::{Visibility, WarehouseRegistry};
pub use warehouse::{
    Emptied, Lifecycle, Refusal, Refused, TickPolicy, TickReport, Warehouse, WarehouseSnapshot,
};
