//! Shared type definitions for the hoard warehouse engine.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace: identifiers, item definitions and stacks, acceptance
//! filters, and grid geometry.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for warehouses, items, and regions
//! - [`item`] -- [`ItemDef`], [`ItemStack`], [`TypeKey`], and [`Quality`]
//! - [`filter`] -- [`ItemFilter`] over type, durability, and quality
//! - [`geometry`] -- [`Cell`] coordinates and radius checks

pub mod filter;
pub mod geometry;
pub mod ids;
pub mod item;

// Re-export all public types at crate root for convenience.
pub use filter::ItemFilter;
pub use geometry::Cell;
pub use ids::{ItemId, RegionId, WarehouseId};
pub use item::{ItemDef, ItemStack, Quality, TypeKey};
