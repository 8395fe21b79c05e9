//! Frame planning for multipart cells.
//!
//! Decides, for one cell and one render pass, which tiles draw through the
//! batched fast path, which draw individually, and which single part gets
//! the breaking overlay. Planning only reads the cell; it never touches the
//! part map.
//!
//! # Usage
//!
//! ```ignore
//! let view = RenderView::of(grid.representation(cell)?);
//! let plan = plan_frame(&view, pass, breaking);
//! for slot in &plan.fast { /* batch */ }
//! for slot in &plan.slow { /* draw individually */ }
//! ```

use multipart_core::descriptor::{DEFAULT_RENDER_DISTANCE_SQ, Tile};
use multipart_core::occlusion::Aabb;
use multipart_core::part::PartInfo;
use multipart_core::representation::Representation;
use multipart_core::slot::Slot;
use tracing::trace;

/// The pass in which part models, rather than tiles, receive the breaking
/// overlay.
pub const MODEL_PASS: u8 = 1;

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Read-only snapshot of the parts in one cell, in slot order.
#[derive(Debug, Clone, Default)]
pub struct RenderView<'a> {
    parts: Vec<&'a PartInfo>,
}

impl<'a> RenderView<'a> {
    pub fn of(representation: &'a Representation) -> Self {
        Self {
            parts: representation.parts().collect(),
        }
    }

    pub fn from_parts(parts: impl IntoIterator<Item = &'a PartInfo>) -> Self {
        let mut parts: Vec<_> = parts.into_iter().collect();
        parts.sort_by_key(|p| p.slot());
        Self { parts }
    }

    pub fn get(&self, slot: Slot) -> Option<&'a PartInfo> {
        self.parts.iter().copied().find(|p| p.slot() == slot)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn tiles(&self) -> impl Iterator<Item = (Slot, &'a dyn Tile)> + '_ {
        self.parts
            .iter()
            .filter_map(|p| p.tile().map(|tile| (p.slot(), tile)))
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A part being mined, and how far along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakingTarget {
    pub slot: Slot,
    pub stage: u8,
}

/// How the breaking overlay is drawn this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakingDraw {
    /// The tile draws its own overlay.
    Tile,
    /// The part's model is redrawn with the destroy texture.
    Model,
    /// Nothing to draw in this pass.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakingPlan {
    pub slot: Slot,
    pub stage: u8,
    pub draw: BreakingDraw,
}

/// What to draw for one cell in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPlan {
    /// Tiles drawn through the batched fast path.
    pub fast: Vec<Slot>,
    /// Tiles drawn one by one.
    pub slow: Vec<Slot>,
    /// Set when a breaking overlay replaces normal drawing.
    pub breaking: Option<BreakingPlan>,
}

impl RenderPlan {
    pub fn is_empty(&self) -> bool {
        self.fast.is_empty() && self.slow.is_empty() && self.breaking.is_none()
    }
}

/// Plan one pass for one cell.
///
/// If `breaking` names an occupied slot, only that part is drawn. Otherwise
/// every tile that wants `pass` goes into the fast or slow list.
pub fn plan_frame(view: &RenderView<'_>, pass: u8, breaking: Option<BreakingTarget>) -> RenderPlan {
    if let Some(target) = breaking {
        if let Some(part) = view.get(target.slot) {
            let draw = match part.tile() {
                Some(tile) if tile.can_render_breaking() => BreakingDraw::Tile,
                _ if pass == MODEL_PASS => BreakingDraw::Model,
                _ => BreakingDraw::Skip,
            };
            trace!(slot = %target.slot, stage = target.stage, ?draw, "breaking overlay");
            return RenderPlan {
                breaking: Some(BreakingPlan {
                    slot: target.slot,
                    stage: target.stage,
                    draw,
                }),
                ..RenderPlan::default()
            };
        }
    }

    let mut plan = RenderPlan::default();
    for (slot, tile) in view.tiles() {
        if !tile.should_render_in_pass(pass) {
            continue;
        }
        if tile.has_fast_renderer() {
            plan.fast.push(slot);
        } else {
            plan.slow.push(slot);
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// Cell-level hints
// ---------------------------------------------------------------------------

/// Union of the cell's unit box and every tile's render bounds.
pub fn render_bounds(view: &RenderView<'_>) -> Aabb {
    view.tiles()
        .fold(Aabb::unit(), |acc, (_, tile)| acc.union(&tile.render_bounds()))
}

/// Largest render distance any tile asks for, or the default with no tiles.
pub fn max_render_distance_sq(view: &RenderView<'_>) -> f64 {
    view.tiles()
        .map(|(_, tile)| tile.max_render_distance_sq())
        .reduce(f64::max)
        .unwrap_or(DEFAULT_RENDER_DISTANCE_SQ)
}

/// Whether the whole cell can go through the fast path.
pub fn has_fast_renderer(view: &RenderView<'_>) -> bool {
    view.tiles().all(|(_, tile)| tile.has_fast_renderer())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
