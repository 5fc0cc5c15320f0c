// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subtree caching with cache-validity heuristics.
//!
//! An [`InvalidationPanel`] sits above a subtree of widgets. The first time it
//! paints it *records*: the subtree paints into a private
//! [`WindowElementList`] and the panel stores a [`CacheFingerprint`] of the
//! conditions it painted under. On later frames it *replays* the recorded list
//! into the live one without painting the subtree, as long as:
//!
//! - nothing called [`invalidate`](InvalidationPanel::invalidate) since the
//!   last record,
//! - the geometry fingerprint still matches (absolute or relative mode, see
//!   [`StrataConfig::cache_relative_transforms`]),
//! - the clip fingerprint still matches (strict or relaxed, see
//!   [`StrataConfig::relaxed_clip_validation`]),
//! - the incoming layer id is at most the recorded one plus
//!   [`StrataConfig::layer_id_padding`].
//!
//! Volatile widgets inside the subtree are queued during recording and
//! painted every frame on top of the replayed content.
//!
//! The decision is split into a pure read ([`try_replay`]) and an explicit
//! mutation ([`record`]). [`Paintable::paint`] for the panel combines the two.
//!
//! [`try_replay`]: InvalidationPanel::try_replay
//! [`record`]: InvalidationPanel::record

use alloc::vec::Vec;
use core::fmt;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use hashbrown::HashSet;
use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::batch::BatchContext;
use crate::brush::ResourceId;
use crate::clip::{ClippingManager, ClippingState, ClippingZone};
use crate::config::StrataConfig;
use crate::element::DrawElement;
use crate::element_list::{ReferenceCollector, WindowElementList};
use crate::geometry::Geometry;
use crate::render_data::RenderDataHandle;
use crate::trace::{CacheDecision, CacheDecisionEvent};
use crate::widget::{PaintContext, Paintable, WidgetId};

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Why a panel could not replay its cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheMiss {
    /// Nothing has been recorded yet.
    NeverRecorded,
    /// The panel was explicitly invalidated.
    Invalidated,
    /// The allotted geometry changed.
    GeometryChanged,
    /// The culling rect size or the clip state changed.
    ClipChanged,
    /// The panel is painted too far above the layer it was recorded at.
    LayerOverflow,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NeverRecorded => "never recorded",
            Self::Invalidated => "explicitly invalidated",
            Self::GeometryChanged => "geometry changed",
            Self::ClipChanged => "clip changed",
            Self::LayerOverflow => "layer id exceeds recorded layer plus padding",
        })
    }
}

/// The conditions a subtree was painted under.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheFingerprint {
    relative: bool,
    position: Point,
    scale: f64,
    render_transform: Affine,
    local_size: Size,
    visible_size: Size,
    clip_rect_size: Size,
    clip_index: Option<u32>,
    clip_count: usize,
    /// The active clip state, in window space in both modes.
    clip_state: Option<ClippingState>,
}

impl CacheFingerprint {
    /// Captures the fingerprint of painting at `geometry` under the active
    /// clip of `clipping`.
    ///
    /// The clip is kept in window space: a relative-mode panel that scrolls
    /// inside a fixed clip still matches.
    #[must_use]
    pub fn capture(
        geometry: &Geometry,
        culling_rect: Rect,
        clipping: &ClippingManager,
        relative: bool,
    ) -> Self {
        let clip_state = clipping.active_state().cloned();
        Self {
            relative,
            position: geometry.absolute_position,
            scale: geometry.scale,
            render_transform: geometry.render_transform,
            local_size: geometry.local_size,
            visible_size: geometry.bounding_rect().intersect(culling_rect).size(),
            clip_rect_size: culling_rect.size(),
            clip_index: clipping.clipping_index(),
            clip_count: clipping.states().len(),
            clip_state,
        }
    }

    /// Whether this fingerprint was captured in relative mode.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Whether the geometry of `self` (current) matches `recorded`.
    #[must_use]
    pub fn geometry_matches(&self, recorded: &Self, tolerance: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= tolerance;
        let sizes = |a: Size, b: Size| close(a.width, b.width) && close(a.height, b.height);
        let [a, b, c, d, e, f] = self.render_transform.as_coeffs();
        let [ra, rb, rc, rd, re, rf] = recorded.render_transform.as_coeffs();
        let linear = close(a, ra) && close(b, rb) && close(c, rc) && close(d, rd);
        if self.relative {
            close(self.scale, recorded.scale)
                && linear
                && sizes(self.visible_size, recorded.visible_size)
        } else {
            close(self.position.x, recorded.position.x)
                && close(self.position.y, recorded.position.y)
                && close(self.scale, recorded.scale)
                && linear
                && close(e, re)
                && close(f, rf)
                && sizes(self.local_size, recorded.local_size)
        }
    }

    /// Whether the clip of `self` (current) matches `recorded`.
    ///
    /// Relaxed validation only compares the clip-state count and the current
    /// clip index.
    #[must_use]
    pub fn clip_matches(&self, recorded: &Self, relaxed: bool, tolerance: f64) -> bool {
        if relaxed {
            return self.clip_count == recorded.clip_count && self.clip_index == recorded.clip_index;
        }
        let close = |a: f64, b: f64| (a - b).abs() <= tolerance;
        close(self.clip_rect_size.width, recorded.clip_rect_size.width)
            && close(self.clip_rect_size.height, recorded.clip_rect_size.height)
            && match (&self.clip_state, &recorded.clip_state) {
                (None, None) => true,
                (Some(a), Some(b)) => clip_states_match(a, b, tolerance),
                _ => false,
            }
    }

    /// Translation from `recorded` to `self`, replayed as a dynamic offset.
    /// Zero in absolute mode.
    #[must_use]
    pub fn offset_from(&self, recorded: &Self) -> Vec2 {
        if self.relative {
            self.position - recorded.position
        } else {
            Vec2::ZERO
        }
    }
}

fn clip_states_match(a: &ClippingState, b: &ClippingState, tolerance: f64) -> bool {
    let close = |p: Point, q: Point| (p.x - q.x).abs() <= tolerance && (p.y - q.y).abs() <= tolerance;
    let zones = |z: &ClippingZone, w: &ClippingZone| {
        close(z.top_left, w.top_left)
            && close(z.top_right, w.top_right)
            && close(z.bottom_left, w.bottom_left)
            && close(z.bottom_right, w.bottom_right)
    };
    let scissor = match (&a.scissor, &b.scissor) {
        (None, None) => true,
        (Some(z), Some(w)) => zones(z, w),
        _ => false,
    };
    scissor
        && a.stencil_quads.len() == b.stencil_quads.len()
        && a.stencil_quads
            .iter()
            .zip(&b.stencil_quads)
            .all(|(z, w)| zones(z, w))
}

// ---------------------------------------------------------------------------
// InvalidationPanel
// ---------------------------------------------------------------------------

/// Where a panel is in its record/replay cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanelState {
    /// The cache must be recorded before it can replay.
    Invalidated,
    /// The subtree is painting into the cache.
    Recording,
    /// The cache is valid for its fingerprint.
    Cached,
}

/// How to replay a valid cache.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedReplay {
    /// Translation applied to the replayed content.
    pub dynamic_offset: Vec2,
    /// Highest layer id of the cached paint.
    pub output_layer: u32,
}

/// Caches the paint output of one child subtree.
#[derive(Debug)]
pub struct InvalidationPanel {
    child: WidgetId,
    state: PanelState,
    fingerprint: Option<CacheFingerprint>,
    last_geometry: Option<Geometry>,
    cache: WindowElementList,
    render_data: Option<RenderDataHandle>,
    retired_render_data: Vec<RenderDataHandle>,
    resources: HashSet<ResourceId>,
    recorded_layer: u32,
    output_layer: u32,
}

impl InvalidationPanel {
    /// Creates a panel caching the subtree rooted at `child`.
    #[must_use]
    pub fn new(child: WidgetId) -> Self {
        Self {
            child,
            state: PanelState::Invalidated,
            fingerprint: None,
            last_geometry: None,
            cache: WindowElementList::new(Size::ZERO),
            render_data: None,
            retired_render_data: Vec::new(),
            resources: HashSet::new(),
            recorded_layer: 0,
            output_layer: 0,
        }
    }

    /// Root of the cached subtree.
    #[must_use]
    pub fn child(&self) -> WidgetId {
        self.child
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PanelState {
        self.state
    }

    /// Geometry the cache was last recorded at.
    #[must_use]
    pub fn last_geometry(&self) -> Option<&Geometry> {
        self.last_geometry.as_ref()
    }

    /// Layer id the cache was last recorded at.
    #[must_use]
    pub fn recorded_layer(&self) -> u32 {
        self.recorded_layer
    }

    /// The recorded element list.
    #[must_use]
    pub fn cached_elements(&self) -> &WindowElementList {
        &self.cache
    }

    /// The packed render data of the last record, when render data caching
    /// is enabled.
    #[must_use]
    pub fn cached_render_data(&self) -> Option<&RenderDataHandle> {
        self.render_data.as_ref()
    }

    /// Number of replaced render data handles still in use by a frame.
    #[must_use]
    pub fn num_retired_render_data(&self) -> usize {
        self.retired_render_data.len()
    }

    /// Forces the next paint to re-record.
    pub fn invalidate(&mut self) {
        self.state = PanelState::Invalidated;
    }

    /// Reports the resources referenced by the cached content.
    pub fn add_referenced_objects(&self, collector: &mut dyn ReferenceCollector) {
        for &resource in &self.resources {
            collector.add_referenced_object(resource);
        }
    }

    fn check(
        &self,
        fingerprint: &CacheFingerprint,
        layer: u32,
        config: &StrataConfig,
    ) -> Result<CachedReplay, CacheMiss> {
        let Some(recorded) = &self.fingerprint else {
            return Err(CacheMiss::NeverRecorded);
        };
        if self.state != PanelState::Cached {
            return Err(CacheMiss::Invalidated);
        }
        if fingerprint.relative != recorded.relative
            || !fingerprint.geometry_matches(recorded, config.geometry_tolerance)
        {
            return Err(CacheMiss::GeometryChanged);
        }
        if !fingerprint.clip_matches(
            recorded,
            config.relaxed_clip_validation,
            config.geometry_tolerance,
        ) {
            return Err(CacheMiss::ClipChanged);
        }
        if layer > self.recorded_layer.saturating_add(config.layer_id_padding) {
            return Err(CacheMiss::LayerOverflow);
        }
        Ok(CachedReplay {
            dynamic_offset: fingerprint.offset_from(recorded),
            output_layer: self.output_layer,
        })
    }

    /// Why the cache cannot replay under `fingerprint` at `layer`, or `None`
    /// if it can.
    #[must_use]
    pub fn cache_miss(
        &self,
        fingerprint: &CacheFingerprint,
        layer: u32,
        config: &StrataConfig,
    ) -> Option<CacheMiss> {
        self.check(fingerprint, layer, config).err()
    }

    /// How to replay the cache under `fingerprint` at `layer`, if it is
    /// valid. Does not modify the panel.
    #[must_use]
    pub fn try_replay(
        &self,
        fingerprint: &CacheFingerprint,
        layer: u32,
        config: &StrataConfig,
    ) -> Option<CachedReplay> {
        self.check(fingerprint, layer, config).ok()
    }

    /// Paints the subtree into the cache and stores `fingerprint`. Returns
    /// the highest layer id painted.
    ///
    /// The cache is recorded without the clip active on `out`; replaying
    /// binds it to whatever clip is active then. Nothing is added to `out`;
    /// follow with [`replay`](Self::replay).
    pub fn record(
        &mut self,
        cx: &mut PaintContext<'_>,
        geometry: &Geometry,
        culling_rect: Rect,
        out: &WindowElementList,
        layer: u32,
        fingerprint: CacheFingerprint,
    ) -> u32 {
        self.state = PanelState::Recording;
        self.cache.reset();

        let previous = cx.begin_caching();
        let output_layer = cx.paint_child(self.child, geometry, culling_rect, &mut self.cache, layer);
        cx.end_caching(previous);

        self.resources.clear();
        self.cache.add_referenced_objects(&mut self.resources);

        let config = cx.config();
        let packed = config.cache_render_data.then(|| {
            let mut ctx = BatchContext::new(config, out.window_size());
            if let Some(atlas) = cx.atlas() {
                ctx = ctx.with_atlas(atlas);
            }
            self.cache.cache_render_data(ctx)
        });
        if let Some(old) = core::mem::replace(&mut self.render_data, packed) {
            self.retired_render_data.push(old);
        }

        self.fingerprint = Some(fingerprint);
        self.last_geometry = Some(*geometry);
        self.recorded_layer = layer;
        self.output_layer = output_layer;
        self.state = PanelState::Cached;
        output_layer
    }

    /// Draws the cached content into `out` and paints the queued volatile
    /// widgets on top. Returns the highest layer id painted.
    pub fn replay(
        &self,
        cx: &mut PaintContext<'_>,
        replay: &CachedReplay,
        out: &mut WindowElementList,
    ) -> u32 {
        let offset = replay.dynamic_offset;
        let volatile_layer = match &self.render_data {
            Some(handle) => {
                DrawElement::make_cached_buffer(out, self.recorded_layer, handle, offset);
                out.merge_resources(self.resources.iter().copied());
                self.cache.paint_volatile_root_layer(cx, out, offset)
            }
            None => {
                out.merge_element_list(&self.cache, offset);
                self.cache.paint_volatile(cx, out, offset)
            }
        };
        replay.output_layer.max(volatile_layer)
    }

    /// Drops replaced render data that no frame uses any more.
    pub fn release_unused_render_data(&mut self) {
        self.retired_render_data.retain(|handle| {
            let in_use = handle.is_in_use();
            if !in_use {
                handle.disconnect();
            }
            in_use
        });
    }
}

impl Paintable for InvalidationPanel {
    fn paint(
        &mut self,
        cx: &mut PaintContext<'_>,
        geometry: &Geometry,
        culling_rect: Rect,
        out: &mut WindowElementList,
        layer: u32,
    ) -> u32 {
        self.release_unused_render_data();
        let config = cx.config();
        if !config.caching_enabled {
            return cx.paint_child(self.child, geometry, culling_rect, out, layer);
        }

        let fingerprint = CacheFingerprint::capture(
            geometry,
            culling_rect,
            out.clipping_manager(),
            config.cache_relative_transforms,
        );
        let replay = match self.check(&fingerprint, layer, config) {
            Ok(replay) => {
                self.trace(cx, layer, CacheDecision::Replayed);
                replay
            }
            Err(miss) => {
                self.trace(cx, layer, CacheDecision::Recorded(miss));
                let output_layer = self.record(cx, geometry, culling_rect, out, layer, fingerprint);
                CachedReplay {
                    dynamic_offset: Vec2::ZERO,
                    output_layer,
                }
            }
        };
        self.replay(cx, &replay, out)
    }

    /// Empty while the cache is valid, so traversals skip the cached
    /// subtree.
    fn children(&self, out: &mut Vec<WidgetId>) {
        if self.state != PanelState::Cached {
            out.push(self.child);
        }
    }

    fn name(&self) -> &'static str {
        "invalidation_panel"
    }
}

impl InvalidationPanel {
    fn trace(&self, cx: &mut PaintContext<'_>, layer: u32, decision: CacheDecision) {
        let frame_index = cx.frame_index();
        cx.tracer().cache_decision(&CacheDecisionEvent {
            frame_index,
            child: self.child,
            layer,
            decision,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchDrawFlags, ShaderType};
    use crate::element::ElementKind;
    use crate::widget::WidgetArena;
    use crate::widget::tests::{Counter, geometry};

    const CULL: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    fn out() -> WindowElementList {
        WindowElementList::new(Size::new(800.0, 600.0))
    }

    fn paints(arena: &WidgetArena, id: WidgetId) -> u32 {
        arena.get::<Counter>(id).map_or(0, |c| c.paints)
    }

    /// Paints `panel` into a fresh list and returns the list.
    fn frame(
        arena: &mut WidgetArena,
        config: &StrataConfig,
        panel: &mut InvalidationPanel,
        geometry: &Geometry,
        layer: u32,
    ) -> WindowElementList {
        let mut list = out();
        let mut cx = PaintContext::new(arena, config);
        panel.paint(&mut cx, geometry, CULL, &mut list, layer);
        list
    }

    #[test]
    fn second_identical_paint_replays() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        let first = frame(&mut arena, &config, &mut panel, &geometry(), 0);
        let second = frame(&mut arena, &config, &mut panel, &geometry(), 0);
        assert_eq!(paints(&arena, child), 1);
        assert_eq!(first.root_elements().len(), 1);
        assert_eq!(second.root_elements().len(), 1);
        assert_eq!(panel.state(), PanelState::Cached);
    }

    #[test]
    fn size_change_repaints_once() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        let bigger = Geometry::new(Size::new(20.0, 10.0), Point::new(5.0, 5.0), 1.0);
        frame(&mut arena, &config, &mut panel, &bigger, 0);
        frame(&mut arena, &config, &mut panel, &bigger, 0);
        assert_eq!(paints(&arena, child), 2);
        assert_eq!(panel.last_geometry(), Some(&bigger));
    }

    #[test]
    fn invalidate_forces_one_record() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        panel.invalidate();
        assert_eq!(panel.state(), PanelState::Invalidated);
        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        assert_eq!(paints(&arena, child), 2);
    }

    #[test]
    fn disabled_caching_paints_through() {
        let config = StrataConfig {
            caching_enabled: false,
            ..StrataConfig::default()
        };
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        let a = frame(&mut arena, &config, &mut panel, &geometry(), 0);
        let b = frame(&mut arena, &config, &mut panel, &geometry(), 0);
        assert_eq!(paints(&arena, child), 2);
        assert_eq!(a.root_elements().len(), b.root_elements().len());
    }

    #[test]
    fn try_replay_is_pure() {
        let config = StrataConfig::default();
        let panel = InvalidationPanel::new(WidgetArena::new().insert(Counter::default()));
        let fp = CacheFingerprint::capture(&geometry(), CULL, out().clipping_manager(), false);
        assert!(panel.try_replay(&fp, 0, &config).is_none());
        assert_eq!(panel.cache_miss(&fp, 0, &config), Some(CacheMiss::NeverRecorded));
        assert_eq!(panel.state(), PanelState::Invalidated);
    }

    #[test]
    fn absolute_mode_repaints_on_move() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        frame(&mut arena, &config, &mut panel, &geometry().translated(Vec2::new(3.0, 0.0)), 0);
        assert_eq!(paints(&arena, child), 2);
    }

    #[test]
    fn relative_mode_replays_moves_with_offset() {
        let config = StrataConfig {
            cache_relative_transforms: true,
            ..StrataConfig::default()
        };
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        let moved = geometry().translated(Vec2::new(3.0, 4.0));
        let list = frame(&mut arena, &config, &mut panel, &moved, 0);
        assert_eq!(paints(&arena, child), 1);
        assert_eq!(list.root_elements()[0].position(), Point::new(8.0, 9.0));
    }

    #[test]
    fn layer_padding_bounds_replay() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        frame(&mut arena, &config, &mut panel, &geometry(), 10);
        assert_eq!(paints(&arena, child), 1);
        frame(&mut arena, &config, &mut panel, &geometry(), 11);
        assert_eq!(paints(&arena, child), 2);
        assert_eq!(panel.recorded_layer(), 11);
    }

    #[test]
    fn clip_change_repaints_unless_relaxed() {
        for (relaxed, expected) in [(false, 2), (true, 1)] {
            let config = StrataConfig {
                relaxed_clip_validation: relaxed,
                ..StrataConfig::default()
            };
            let mut arena = WidgetArena::new();
            let child = arena.insert(Counter::default());
            let mut panel = InvalidationPanel::new(child);

            for clip in [Rect::new(0.0, 0.0, 50.0, 50.0), Rect::new(0.0, 0.0, 40.0, 50.0)] {
                let mut list = out();
                list.push_clip(ClippingZone::from_rect(clip));
                let mut cx = PaintContext::new(&mut arena, &config);
                panel.paint(&mut cx, &geometry(), CULL, &mut list, 0);
                list.pop_clip();
            }
            assert_eq!(paints(&arena, child), expected, "relaxed = {relaxed}");
        }
    }

    #[test]
    fn replay_binds_unclipped_content_to_live_clip() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        for _ in 0..2 {
            let mut list = out();
            list.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 400.0, 400.0)));
            list.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 50.0, 50.0)));
            let mut cx = PaintContext::new(&mut arena, &config);
            panel.paint(&mut cx, &geometry(), CULL, &mut list, 0);
            list.pop_clip();
            list.pop_clip();
            assert_eq!(list.root_elements()[0].clipping_index(), Some(1));
            let clip = list.clipping_manager().state(1).bounding_rect();
            assert_eq!(clip, Rect::new(0.0, 0.0, 50.0, 50.0));
        }
        assert_eq!(paints(&arena, child), 1);
    }

    #[test]
    fn relative_mode_replays_scrolling_inside_a_fixed_clip() {
        let config = StrataConfig {
            cache_relative_transforms: true,
            ..StrataConfig::default()
        };
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        for step in 0..3_u32 {
            let scrolled = geometry().translated(Vec2::new(0.0, 10.0 * f64::from(step)));
            let mut list = out();
            let clip = list.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 400.0, 400.0)));
            let mut cx = PaintContext::new(&mut arena, &config);
            panel.paint(&mut cx, &scrolled, CULL, &mut list, 0);
            list.pop_clip();

            let e = &list.root_elements()[0];
            assert_eq!(e.position(), scrolled.absolute_position);
            assert_eq!(e.clipping_index(), Some(clip));
        }
        assert_eq!(paints(&arena, child), 1);
    }

    /// Pushes a clip around its own bounds and paints its child inside it.
    struct Clipped {
        child: WidgetId,
    }

    impl Paintable for Clipped {
        fn paint(
            &mut self,
            cx: &mut PaintContext<'_>,
            geometry: &Geometry,
            culling_rect: Rect,
            out: &mut WindowElementList,
            layer: u32,
        ) -> u32 {
            out.push_clip(ClippingZone::from_rect(geometry.bounding_rect()));
            let max_layer = cx.paint_child(self.child, geometry, culling_rect, out, layer);
            out.pop_clip();
            max_layer
        }

        fn children(&self, out: &mut Vec<WidgetId>) {
            out.push(self.child);
        }
    }

    /// outer panel -> a -> inner panel -> b -> clipped -> volatile leaf
    struct Nested {
        arena: WidgetArena,
        outer: WidgetId,
        inner: WidgetId,
        a: WidgetId,
        leaf: WidgetId,
    }

    fn nested() -> Nested {
        let mut arena = WidgetArena::new();
        let leaf = arena.insert(Counter {
            volatile: true,
            ..Counter::default()
        });
        let clipped = arena.insert(Clipped { child: leaf });
        let b = arena.insert(Counter {
            children: alloc::vec![clipped],
            ..Counter::default()
        });
        let inner = arena.insert(InvalidationPanel::new(b));
        let a = arena.insert(Counter {
            children: alloc::vec![inner],
            ..Counter::default()
        });
        let outer = arena.insert(InvalidationPanel::new(a));
        Nested {
            arena,
            outer,
            inner,
            a,
            leaf,
        }
    }

    /// Paints `root` under a window clip, then batches the list.
    fn batched_frame(arena: &mut WidgetArena, config: &StrataConfig, root: WidgetId) -> WindowElementList {
        let mut list = out();
        list.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 400.0, 400.0)));
        let mut cx = PaintContext::new(arena, config);
        cx.paint_child(root, &geometry(), CULL, &mut list, 0);
        list.pop_clip();
        list.batch(BatchContext::new(config, list.window_size()));
        list.create_render_batches(&mut crate::trace::Tracer::none());
        list
    }

    type BatchSummary = (u32, ShaderType, BatchDrawFlags, Option<ClippingState>, u32, u32);

    fn summary(list: &WindowElementList) -> Vec<BatchSummary> {
        list.batch_data()
            .render_batches()
            .iter()
            .map(|b| {
                (
                    b.layer,
                    b.shader_type,
                    b.flags,
                    b.clip_state.clone(),
                    b.num_vertices,
                    b.num_indices,
                )
            })
            .collect()
    }

    #[test]
    fn nested_volatile_widgets_paint_every_frame() {
        for cache_render_data in [false, true] {
            let config = StrataConfig {
                cache_render_data,
                ..StrataConfig::default()
            };
            let mut n = nested();
            for _ in 0..3 {
                batched_frame(&mut n.arena, &config, n.outer);
            }
            assert_eq!(paints(&n.arena, n.a), 1, "render data: {cache_render_data}");
            assert_eq!(paints(&n.arena, n.leaf), 3, "render data: {cache_render_data}");
        }
    }

    #[test]
    fn cached_frames_batch_like_uncached_ones() {
        let uncached_config = StrataConfig {
            caching_enabled: false,
            ..StrataConfig::default()
        };
        let mut uncached = nested();
        let expected = summary(&batched_frame(&mut uncached.arena, &uncached_config, uncached.outer));
        assert_eq!(expected.len(), 3);
        assert!(expected[2].3.is_some());

        let config = StrataConfig::default();
        let mut cached = nested();
        for frame in 0..3 {
            let list = batched_frame(&mut cached.arena, &config, cached.outer);
            assert_eq!(summary(&list), expected, "frame {frame}");
        }
        assert_eq!(paints(&cached.arena, cached.a), 1);
        assert_eq!(paints(&cached.arena, cached.leaf), 3);
    }

    #[test]
    fn cached_panels_hide_their_subtree_from_traversal() {
        use crate::fast_path::FastPathTree;

        let config = StrataConfig::default();
        let mut n = nested();
        let mut tree = FastPathTree::new();
        tree.build(&n.arena, n.outer);
        assert_eq!(tree.len(), 6);

        batched_frame(&mut n.arena, &config, n.outer);
        tree.build(&n.arena, n.outer);
        assert_eq!(tree.len(), 1);

        if let Some(panel) = n.arena.get_mut::<InvalidationPanel>(n.outer) {
            panel.invalidate();
        }
        tree.build(&n.arena, n.outer);
        // The inner panel is still cached.
        assert_eq!(tree.len(), 3);
        assert!(tree.find(n.inner).is_some());
        assert!(tree.find(n.leaf).is_none());
    }

    #[test]
    fn volatile_children_paint_every_frame() {
        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let volatile = arena.insert(Counter {
            volatile: true,
            ..Counter::default()
        });
        let parent = arena.insert(Counter {
            children: alloc::vec![volatile],
            ..Counter::default()
        });
        let mut panel = InvalidationPanel::new(parent);

        for _ in 0..3 {
            let list = frame(&mut arena, &config, &mut panel, &geometry(), 0);
            let handle = panel.cached_elements().volatile_paints()[0].handle();
            assert_eq!(list.layer_elements(handle).map(<[_]>::len), Some(1));
        }
        assert_eq!(paints(&arena, parent), 1);
        assert_eq!(paints(&arena, volatile), 3);
    }

    #[test]
    fn render_data_mode_draws_cached_buffer() {
        let config = StrataConfig {
            cache_render_data: true,
            ..StrataConfig::default()
        };
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let mut panel = InvalidationPanel::new(child);

        let mut list = frame(&mut arena, &config, &mut panel, &geometry(), 0);
        assert!(matches!(
            list.root_elements()[0].kind(),
            ElementKind::CachedBuffer(..)
        ));
        let first = panel.cached_render_data().cloned();
        assert!(first.as_ref().is_some_and(RenderDataHandle::is_in_use));

        // Re-record while the first frame still uses the old data.
        panel.invalidate();
        let mut second = frame(&mut arena, &config, &mut panel, &geometry(), 0);
        assert_eq!(panel.num_retired_render_data(), 1);

        list.post_draw();
        second.post_draw();
        panel.release_unused_render_data();
        assert_eq!(panel.num_retired_render_data(), 0);
        assert!(first.is_some_and(|h| !h.is_valid()));
    }

    #[test]
    fn cached_resources_are_reported() {
        use crate::brush::{Brush, ResourceProxy};
        use crate::color::LinearColor;
        use crate::element::DrawEffects;

        struct Image;
        impl Paintable for Image {
            fn paint(
                &mut self,
                _cx: &mut PaintContext<'_>,
                geometry: &Geometry,
                _culling_rect: Rect,
                out: &mut WindowElementList,
                layer: u32,
            ) -> u32 {
                let brush = Brush {
                    resource_object: Some(ResourceId(3)),
                    ..Brush::image(ResourceProxy::whole(ResourceId(1), Size::new(4.0, 4.0)))
                };
                DrawElement::make_box(
                    out,
                    layer,
                    &geometry.to_paint_geometry(),
                    &brush,
                    DrawEffects::empty(),
                    LinearColor::WHITE,
                );
                layer
            }
        }

        let config = StrataConfig::default();
        let mut arena = WidgetArena::new();
        let child = arena.insert(Image);
        let mut panel = InvalidationPanel::new(child);
        frame(&mut arena, &config, &mut panel, &geometry(), 0);
        let mut seen: Vec<ResourceId> = Vec::new();
        panel.add_referenced_objects(&mut seen);
        assert_eq!(seen, [ResourceId(3)]);
    }

    #[test]
    fn cache_miss_display() {
        assert_eq!(alloc::format!("{}", CacheMiss::ClipChanged), "clip changed");
        assert_eq!(
            alloc::format!("{}", CacheMiss::LayerOverflow),
            "layer id exceeds recorded layer plus padding"
        );
    }
}
