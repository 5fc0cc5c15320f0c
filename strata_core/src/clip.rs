// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clip zones, clip states and the stack-discipline clipping manager.
//!
//! Draw elements never own clip geometry. They store the index of the
//! [`ClippingState`] that was current when they were recorded, so that a
//! recorded list can be spliced into another list by rebasing indices (see
//! [`ClippingManager::merge_clipping_states`]).
//!
//! Axis-aligned clips intersect into a single scissor rectangle. As soon as a
//! rotated or skewed zone enters the stack, the state becomes a list of quads
//! that must be rasterized into the stencil buffer.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

/// Tolerance for deciding whether a zone's edges are axis aligned.
const AXIS_ALIGN_EPSILON: f64 = 1e-4;

/// A convex quad in window space, in top-left, top-right, bottom-left,
/// bottom-right corner order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClippingZone {
    /// Top-left corner.
    pub top_left: Point,
    /// Top-right corner.
    pub top_right: Point,
    /// Bottom-left corner.
    pub bottom_left: Point,
    /// Bottom-right corner.
    pub bottom_right: Point,
    /// Whether this zone is intersected with the currently active clip.
    pub intersect_parent: bool,
}

impl ClippingZone {
    /// An axis-aligned zone.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            top_left: Point::new(rect.x0, rect.y0),
            top_right: Point::new(rect.x1, rect.y0),
            bottom_left: Point::new(rect.x0, rect.y1),
            bottom_right: Point::new(rect.x1, rect.y1),
            intersect_parent: true,
        }
    }

    /// The render-transformed local rect of a widget.
    #[must_use]
    pub fn from_geometry(geometry: &crate::geometry::Geometry) -> Self {
        let t = geometry.render_transform;
        let s = geometry.local_size;
        Self {
            top_left: t * Point::ZERO,
            top_right: t * Point::new(s.width, 0.0),
            bottom_left: t * Point::new(0.0, s.height),
            bottom_right: t * Point::new(s.width, s.height),
            intersect_parent: true,
        }
    }

    /// Replaces [`intersect_parent`](Self::intersect_parent).
    #[must_use]
    pub fn with_intersect_parent(mut self, intersect: bool) -> Self {
        self.intersect_parent = intersect;
        self
    }

    /// Whether the quad is an axis-aligned rectangle.
    #[must_use]
    pub fn is_axis_aligned(&self) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < AXIS_ALIGN_EPSILON;
        close(self.top_left.y, self.top_right.y)
            && close(self.bottom_left.y, self.bottom_right.y)
            && close(self.top_left.x, self.bottom_left.x)
            && close(self.top_right.x, self.bottom_right.x)
    }

    /// The window-space bounding box of the quad.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        Rect::from_points(self.top_left, self.bottom_right)
            .union_pt(self.top_right)
            .union_pt(self.bottom_left)
    }

    /// Intersects two axis-aligned zones.
    ///
    /// The result is empty (zero area) when the zones do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let a = self.bounding_rect();
        let b = other.bounding_rect();
        let r = a.intersect(b);
        let mut zone = Self::from_rect(r);
        zone.intersect_parent = other.intersect_parent;
        zone
    }

    /// Whether the quad covers no area.
    #[must_use]
    pub fn has_zero_area(&self) -> bool {
        let r = self.bounding_rect();
        r.width() <= 0.0 || r.height() <= 0.0
    }

    /// Translates the quad.
    pub fn offset(&mut self, delta: Vec2) {
        self.top_left += delta;
        self.top_right += delta;
        self.bottom_left += delta;
        self.bottom_right += delta;
    }
}

/// How a clip state is enforced at draw time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClippingMethod {
    /// A scissor rectangle.
    Scissor,
    /// Quads rasterized into the stencil buffer.
    Stencil,
}

/// One entry of the clip registry.
#[derive(Clone, Debug, PartialEq)]
pub struct ClippingState {
    /// The scissor rectangle for axis-aligned states.
    pub scissor: Option<ClippingZone>,
    /// The quads to intersect in the stencil buffer for non-axis-aligned
    /// states.
    pub stencil_quads: Vec<ClippingZone>,
}

impl ClippingState {
    /// A scissor state.
    #[must_use]
    pub fn scissor(zone: ClippingZone) -> Self {
        Self {
            scissor: Some(zone),
            stencil_quads: Vec::new(),
        }
    }

    /// A stencil state from a list of quads.
    #[must_use]
    pub fn stencil(quads: Vec<ClippingZone>) -> Self {
        Self {
            scissor: None,
            stencil_quads: quads,
        }
    }

    /// How the state is enforced.
    #[must_use]
    pub fn method(&self) -> ClippingMethod {
        if self.scissor.is_some() {
            ClippingMethod::Scissor
        } else {
            ClippingMethod::Stencil
        }
    }

    /// The window-space box that conservatively bounds the clip.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        if let Some(zone) = &self.scissor {
            return zone.bounding_rect();
        }
        let mut quads = self.stencil_quads.iter();
        let Some(first) = quads.next() else {
            return Rect::ZERO;
        };
        quads.fold(first.bounding_rect(), |acc, q| {
            acc.intersect(q.bounding_rect())
        })
    }

    /// Whether nothing can pass the clip.
    #[must_use]
    pub fn has_zero_area(&self) -> bool {
        let r = self.bounding_rect();
        r.width() <= 0.0 || r.height() <= 0.0
    }

    /// Translates every zone of the state.
    pub fn offset(&mut self, delta: Vec2) {
        if let Some(zone) = &mut self.scissor {
            zone.offset(delta);
        }
        for quad in &mut self.stencil_quads {
            quad.offset(delta);
        }
    }

    fn zones(&self) -> impl Iterator<Item = &ClippingZone> {
        self.scissor.iter().chain(&self.stencil_quads)
    }

    /// This state as if it had been pushed while `parent` was active.
    ///
    /// A state whose outermost zone opts out of
    /// [`intersect_parent`](ClippingZone::intersect_parent) is returned
    /// unchanged.
    #[must_use]
    pub fn nested_in(&self, parent: &Self) -> Self {
        if self.zones().next().is_some_and(|z| !z.intersect_parent) {
            return self.clone();
        }
        match (&parent.scissor, &self.scissor) {
            (Some(outer), Some(inner)) => Self::scissor(outer.intersect(inner)),
            _ => Self::stencil(parent.zones().chain(self.zones()).copied().collect()),
        }
    }
}

/// Registry of clip states with a stack of currently active indices.
///
/// States are append-only for the lifetime of a frame so that indices stay
/// stable; [`pop_clip`](Self::pop_clip) only moves the current index back.
#[derive(Clone, Debug, Default)]
pub struct ClippingManager {
    states: Vec<ClippingState>,
    stack: Vec<u32>,
}

impl ClippingManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a zone, intersected with the current state unless the zone
    /// opts out, and makes it current. Returns the new state's index.
    pub fn push_clip(&mut self, zone: ClippingZone) -> u32 {
        let parent = if zone.intersect_parent {
            self.active_state()
        } else {
            None
        };
        let state = match parent {
            None if zone.is_axis_aligned() => ClippingState::scissor(zone),
            None => ClippingState::stencil(alloc::vec![zone]),
            Some(parent) => match &parent.scissor {
                Some(scissor) if zone.is_axis_aligned() => {
                    ClippingState::scissor(scissor.intersect(&zone))
                }
                Some(scissor) => ClippingState::stencil(alloc::vec![*scissor, zone]),
                None => {
                    let mut quads = parent.stencil_quads.clone();
                    quads.push(zone);
                    ClippingState::stencil(quads)
                }
            },
        };
        self.push_clipping_state(state)
    }

    /// Pushes an already-built state and makes it current.
    pub fn push_clipping_state(&mut self, state: ClippingState) -> u32 {
        let idx = u32::try_from(self.states.len()).unwrap_or(u32::MAX);
        self.states.push(state);
        self.stack.push(idx);
        idx
    }

    /// Restores the previously current state.
    ///
    /// # Panics
    ///
    /// Panics if no clip is active.
    pub fn pop_clip(&mut self) {
        assert!(
            self.stack.pop().is_some(),
            "pop_clip called with an empty clip stack"
        );
    }

    /// Index of the current clip state, or `None` when unclipped.
    #[must_use]
    pub fn clipping_index(&self) -> Option<u32> {
        self.stack.last().copied()
    }

    /// The current clip state, or `None` when unclipped.
    #[must_use]
    pub fn active_state(&self) -> Option<&ClippingState> {
        self.clipping_index().map(|idx| &self.states[idx as usize])
    }

    /// The state at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn state(&self, index: u32) -> &ClippingState {
        &self.states[index as usize]
    }

    /// Every state registered this frame, in push order.
    #[must_use]
    pub fn states(&self) -> &[ClippingState] {
        &self.states
    }

    /// Number of active (pushed, not yet popped) clips.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Appends states recorded elsewhere, translated by `offset` and nested
    /// in the current state (see [`ClippingState::nested_in`]).
    ///
    /// Returns the index the first appended state lands at; elements recorded
    /// against `states` rebase their clip index by adding it.
    pub fn merge_clipping_states(&mut self, states: &[ClippingState], offset: Vec2) -> u32 {
        let base = u32::try_from(self.states.len()).unwrap_or(u32::MAX);
        let parent = self.active_state().cloned();
        self.states.extend(states.iter().map(|s| {
            let mut s = s.clone();
            if offset != Vec2::ZERO {
                s.offset(offset);
            }
            match &parent {
                Some(parent) => s.nested_in(parent),
                None => s,
            }
        }));
        base
    }

    /// Whether any registered state needs the stencil buffer.
    #[must_use]
    pub fn is_stencil_clipping_required(&self) -> bool {
        self.states
            .iter()
            .any(|s| s.method() == ClippingMethod::Stencil)
    }

    /// Clears all states and the stack.
    pub fn reset(&mut self) {
        self.states.clear();
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Affine, Size};

    use crate::geometry::Geometry;

    #[test]
    fn nested_axis_aligned_clips_intersect() {
        let mut mgr = ClippingManager::new();
        assert_eq!(mgr.clipping_index(), None);
        let a = mgr.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let b = mgr.push_clip(ClippingZone::from_rect(Rect::new(50.0, 50.0, 200.0, 200.0)));
        assert_eq!((a, b), (0, 1));
        assert_eq!(mgr.clipping_index(), Some(1));
        let state = mgr.active_state().unwrap();
        assert_eq!(state.method(), ClippingMethod::Scissor);
        assert_eq!(state.bounding_rect(), Rect::new(50.0, 50.0, 100.0, 100.0));
        mgr.pop_clip();
        assert_eq!(mgr.clipping_index(), Some(0));
        mgr.pop_clip();
        assert_eq!(mgr.clipping_index(), None);
        assert_eq!(mgr.states().len(), 2);
    }

    #[test]
    fn disjoint_clips_have_zero_area() {
        let mut mgr = ClippingManager::new();
        mgr.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        mgr.push_clip(ClippingZone::from_rect(Rect::new(20.0, 20.0, 30.0, 30.0)));
        assert!(mgr.active_state().unwrap().has_zero_area());
    }

    #[test]
    fn rotated_zone_requires_stencil() {
        let mut mgr = ClippingManager::new();
        mgr.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let geometry = Geometry::new(Size::new(10.0, 10.0), kurbo::Point::ZERO, 1.0)
            .with_render_transform(Affine::translate((50.0, 50.0)) * Affine::rotate(0.5));
        let zone = ClippingZone::from_geometry(&geometry);
        assert!(!zone.is_axis_aligned());
        mgr.push_clip(zone);
        let state = mgr.active_state().unwrap();
        assert_eq!(state.method(), ClippingMethod::Stencil);
        assert_eq!(state.stencil_quads.len(), 2);
        assert!(mgr.is_stencil_clipping_required());
    }

    #[test]
    fn zone_can_opt_out_of_parent_intersection() {
        let mut mgr = ClippingManager::new();
        mgr.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        mgr.push_clip(
            ClippingZone::from_rect(Rect::new(20.0, 20.0, 30.0, 30.0)).with_intersect_parent(false),
        );
        assert!(!mgr.active_state().unwrap().has_zero_area());
    }

    #[test]
    fn merged_states_are_offset_and_rebased() {
        let mut mgr = ClippingManager::new();
        mgr.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let recorded = [ClippingState::scissor(ClippingZone::from_rect(Rect::new(
            0.0, 0.0, 5.0, 5.0,
        )))];
        let base = mgr.merge_clipping_states(&recorded, Vec2::new(3.0, 0.0));
        assert_eq!(base, 1);
        assert_eq!(
            mgr.state(1).bounding_rect(),
            Rect::new(3.0, 0.0, 8.0, 5.0)
        );
        // Merging does not change the current clip.
        assert_eq!(mgr.clipping_index(), Some(0));
    }

    #[test]
    fn merged_states_nest_in_the_current_clip() {
        let mut mgr = ClippingManager::new();
        mgr.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let recorded = [
            ClippingState::scissor(ClippingZone::from_rect(Rect::new(5.0, 5.0, 20.0, 20.0))),
            ClippingState::scissor(
                ClippingZone::from_rect(Rect::new(5.0, 5.0, 20.0, 20.0))
                    .with_intersect_parent(false),
            ),
        ];
        let base = mgr.merge_clipping_states(&recorded, Vec2::ZERO);
        assert_eq!(
            mgr.state(base).bounding_rect(),
            Rect::new(5.0, 5.0, 10.0, 10.0)
        );
        assert_eq!(
            mgr.state(base + 1).bounding_rect(),
            Rect::new(5.0, 5.0, 20.0, 20.0)
        );
    }

    #[test]
    fn nesting_a_rotated_state_keeps_every_quad() {
        let parent = ClippingState::scissor(ClippingZone::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let diamond = ClippingZone {
            top_left: Point::new(5.0, 0.0),
            top_right: Point::new(10.0, 5.0),
            bottom_left: Point::new(0.0, 5.0),
            bottom_right: Point::new(5.0, 10.0),
            intersect_parent: true,
        };
        let nested = ClippingState::stencil(alloc::vec![diamond]).nested_in(&parent);
        assert_eq!(nested.method(), ClippingMethod::Stencil);
        assert_eq!(nested.stencil_quads.len(), 2);
    }

    #[test]
    #[should_panic(expected = "pop_clip called with an empty clip stack")]
    fn pop_on_empty_stack_panics() {
        ClippingManager::new().pop_clip();
    }
}
