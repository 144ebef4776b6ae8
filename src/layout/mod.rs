pub mod force;
pub mod hierarchy;
pub mod scatter;

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};

pub use force::{ForceConfig, ForceSimulation, LayoutNode, SimulationState};
pub use hierarchy::{HierarchyConfig, HierarchyInput, HierarchyLayout, HierarchyNode, ROOT_LABEL};
pub use scatter::{ScatterLayout, ScatterPoint};

/// Drawing surface size in pixels. Both sides are at least one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        let sanitize = |side: f32| if side.is_finite() { side.max(1.0) } else { 1.0 };
        Self {
            width: sanitize(width),
            height: sanitize(height),
        }
    }

    pub fn center(self) -> Vec2 {
        vec2(self.width * 0.5, self.height * 0.5)
    }

    pub fn min_side(self) -> f32 {
        self.width.min(self.height)
    }

    /// Keeps a circle fully inside the viewport, or on the center line of an
    /// axis the circle is too wide for.
    pub fn clamp_circle(self, position: Vec2, radius: f32) -> Vec2 {
        let clamp_axis = |value: f32, extent: f32| {
            if radius * 2.0 >= extent {
                extent * 0.5
            } else {
                value.clamp(radius, extent - radius)
            }
        };
        vec2(
            clamp_axis(position.x, self.width),
            clamp_axis(position.y, self.height),
        )
    }

    pub fn contains_circle(self, position: Vec2, radius: f32, tolerance: f32) -> bool {
        let fits_axis = |value: f32, extent: f32| {
            if radius * 2.0 >= extent {
                (value - extent * 0.5).abs() <= tolerance
            } else {
                value >= radius - tolerance && value <= extent - radius + tolerance
            }
        };
        fits_axis(position.x, self.width) && fits_axis(position.y, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 400.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margin {
    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn inner(self, viewport: Viewport) -> Vec2 {
        vec2(
            (viewport.width - self.left - self.right).max(0.0),
            (viewport.height - self.top - self.bottom).max(0.0),
        )
    }
}
