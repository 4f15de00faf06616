//! Power dependency of a warehouse.
//!
//! A powered warehouse draws `energy_factor` units of power per unit of
//! stored mass. The host grid reports how much supply reaches the
//! warehouse; when supply falls short of the draw the warehouse is
//! starved and stops operating.

use serde::{Deserialize, Serialize};

/// Supply and draw bookkeeping for one powered warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLink {
    /// Power currently delivered by the host grid.
    pub supply: f64,
    /// Power currently requested, set on every tick.
    pub draw: f64,
    /// Draw per unit of stored mass.
    pub energy_factor: f64,
}

impl PowerLink {
    /// A link with the given supply and nothing drawn yet.
    pub const fn new(supply: f64, energy_factor: f64) -> Self {
        Self {
            supply,
            draw: 0.0,
            energy_factor,
        }
    }

    /// Draw needed to hold `weight` of stored mass.
    pub fn draw_for(&self, weight: f64) -> f64 {
        self.energy_factor.max(0.0) * weight.max(0.0)
    }

    /// Recompute the draw for the current stored mass.
    pub fn update_draw(&mut self, weight: f64) {
        self.draw = self.draw_for(weight);
    }

    /// Whether the grid covers the current draw.
    pub fn is_powered(&self) -> bool {
        self.supply > 0.0 && self.supply >= self.draw
    }

    /// Whether the grid would still cover the draw at `projected_weight`.
    pub fn can_support(&self, projected_weight: f64) -> bool {
        self.supply > 0.0 && self.supply >= self.draw_for(projected_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_scales_with_weight() {
        let mut link = PowerLink::new(100.0, 2.0);
        link.update_draw(30.0);
        assert!((link.draw - 60.0).abs() < 1e-9);
        assert!(link.is_powered());
    }

    #[test]
    fn starved_when_supply_short() {
        let mut link = PowerLink::new(10.0, 1.0);
        link.update_draw(11.0);
        assert!(!link.is_powered());
    }

    #[test]
    fn no_supply_is_never_powered() {
        let link = PowerLink::new(0.0, 1.0);
        assert!(!link.is_powered());
        assert!(!link.can_support(0.0));
    }

    #[test]
    fn projected_margin() {
        let link = PowerLink::new(50.0, 1.0);
        assert!(link.can_support(50.0));
        assert!(!link.can_support(50.5));
    }
}
