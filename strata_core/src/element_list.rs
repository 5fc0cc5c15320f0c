// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-window draw recording target.
//!
//! A [`WindowElementList`] owns everything painted into one window (or into
//! one invalidation panel's cache) during a frame:
//!
//! - the root draw layer plus any number of logical draw layers, each holding
//!   its draw elements and the batch map they are batched into,
//! - the [`ClippingManager`] the elements' clip indices refer to,
//! - the deferred-paint and volatile-paint queues,
//! - the pooled [`BatchData`] used when the list is batched.
//!
//! Elements always append to the *active* layer, which is the top of the draw
//! stack or the root layer when no logical layer is active.
//!
//! # Logical layers
//!
//! A logical layer is identified by a [`DrawLayerHandle`]. Painting between
//! [`begin_logical_layer`](WindowElementList::begin_logical_layer) and
//! [`end_logical_layer`](WindowElementList::end_logical_layer) records into that
//! layer. A layer element ([`DrawElement::make_layer`]) placed elsewhere in
//! the list inlines the layer's batches at that position when render batches
//! are created. Layers come from a pool and are returned to it on
//! [`reset`](WindowElementList::reset).

use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};

use alloc::sync::Arc;
use hashbrown::{HashMap, HashSet};
use kurbo::{Rect, Size, Vec2};

use crate::batch::{
    BatchContext, BatchData, ElementBatchMap, ElementBatcher, LayerBatchMaps,
};
use crate::brush::ResourceId;
use crate::clip::{ClippingManager, ClippingState, ClippingZone};
use crate::color::LinearColor;
use crate::element::{DrawElement, ElementKind};
use crate::geometry::{Geometry, PaintGeometry};
use crate::render_data::{CachedRenderData, RenderDataHandle, WeakRenderDataHandle};
use crate::trace::{BatchStatsEvent, Tracer};
use crate::widget::{PaintContext, WidgetId};

// ---------------------------------------------------------------------------
// Draw layers
// ---------------------------------------------------------------------------

/// Identity of a logical draw layer.
///
/// Handles compare and hash by identity: every [`new`](Self::new) call creates
/// a distinct layer.
#[derive(Clone)]
pub struct DrawLayerHandle(Arc<()>);

impl DrawLayerHandle {
    /// Creates a handle for a new logical layer.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(()))
    }
}

impl Default for DrawLayerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DrawLayerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DrawLayerHandle {}

impl Hash for DrawLayerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for DrawLayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DrawLayerHandle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Elements recorded into one draw layer and the batches built from them.
#[derive(Clone, Debug, Default)]
pub(crate) struct DrawLayer {
    pub(crate) handle: Option<DrawLayerHandle>,
    pub(crate) elements: Vec<DrawElement>,
    pub(crate) batch_map: ElementBatchMap,
}

impl DrawLayer {
    fn reset(&mut self) {
        self.handle = None;
        self.elements.clear();
        self.batch_map.reset();
    }
}

/// Resolves layer handles against a list's layer table.
struct LayerLookup<'a> {
    layers: &'a [DrawLayer],
    index: &'a HashMap<DrawLayerHandle, usize>,
}

impl LayerBatchMaps for LayerLookup<'_> {
    fn batch_map(&self, handle: &DrawLayerHandle) -> Option<&ElementBatchMap> {
        self.index
            .get(handle)
            .map(|&idx| &self.layers[idx].batch_map)
    }
}

// ---------------------------------------------------------------------------
// Deferred and volatile paint records
// ---------------------------------------------------------------------------

/// A widget whose paint is postponed until its deferred group resolves, so
/// that it draws on top of everything painted before the resolve.
#[derive(Clone, Copy, Debug)]
pub struct DeferredPaint {
    /// The widget to paint.
    pub widget: WidgetId,
    /// Geometry the widget was allotted when it was queued.
    pub geometry: Geometry,
}

impl DeferredPaint {
    /// Defers painting `widget` at `geometry`.
    #[must_use]
    pub fn new(widget: WidgetId, geometry: Geometry) -> Self {
        Self { widget, geometry }
    }
}

/// A volatile widget queued while a cache was recorded. It is repainted every
/// frame the cache is replayed.
#[derive(Clone, Debug)]
pub struct VolatilePaint {
    widget: WidgetId,
    geometry: Geometry,
    culling_rect: Rect,
    clip_state: Option<ClippingState>,
    layer: u32,
    handle: DrawLayerHandle,
}

impl VolatilePaint {
    /// The queued widget.
    #[must_use]
    pub fn widget(&self) -> WidgetId {
        self.widget
    }

    /// Layer id the widget was queued at.
    #[must_use]
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// The logical layer reserved for the widget's output.
    #[must_use]
    pub fn handle(&self) -> &DrawLayerHandle {
        &self.handle
    }

    /// The recorded clip state translated by `offset` and nested in the
    /// active clip of `out`.
    fn clip_in(&self, out: &WindowElementList, offset: Vec2) -> Option<ClippingState> {
        let mut state = self.clip_state.clone()?;
        state.offset(offset);
        Some(match out.clipping.active_state() {
            Some(parent) => state.nested_in(parent),
            None => state,
        })
    }

    fn execute(&self, cx: &mut PaintContext<'_>, out: &mut WindowElementList, offset: Vec2) -> u32 {
        let clip = self.clip_in(out, offset);
        let pushed = clip.map(|state| out.push_clipping_state(state)).is_some();
        let geometry = self.geometry.translated(offset);
        let culling_rect = self.culling_rect + offset;
        let layer = cx.paint_volatile_widget(self.widget, &geometry, culling_rect, out, self.layer);
        if pushed {
            out.pop_clip();
        }
        layer
    }

    /// Copies the record onto `out` so that the cache being recorded into
    /// `out` repaints the widget on its own replays.
    fn requeue(&self, out: &mut WindowElementList, offset: Vec2, handle: DrawLayerHandle) -> u32 {
        out.volatile.push(Self {
            widget: self.widget,
            geometry: self.geometry.translated(offset),
            culling_rect: self.culling_rect + offset,
            clip_state: self
                .clip_in(out, offset)
                .or_else(|| out.clipping.active_state().cloned()),
            layer: self.layer,
            handle,
        });
        self.layer
    }
}

// ---------------------------------------------------------------------------
// Reference reporting
// ---------------------------------------------------------------------------

/// Receives the resource objects a list keeps alive.
pub trait ReferenceCollector {
    /// Reports one referenced resource.
    fn add_referenced_object(&mut self, resource: ResourceId);
}

impl ReferenceCollector for Vec<ResourceId> {
    fn add_referenced_object(&mut self, resource: ResourceId) {
        self.push(resource);
    }
}

impl ReferenceCollector for HashSet<ResourceId> {
    fn add_referenced_object(&mut self, resource: ResourceId) {
        self.insert(resource);
    }
}

// ---------------------------------------------------------------------------
// WindowElementList
// ---------------------------------------------------------------------------

/// Draw elements, clip states and paint queues recorded for one window.
#[derive(Debug)]
pub struct WindowElementList {
    window_size: Size,
    pub(crate) root: DrawLayer,
    pub(crate) layers: Vec<DrawLayer>,
    layer_index: HashMap<DrawLayerHandle, usize>,
    layer_pool: Vec<DrawLayer>,
    draw_stack: Vec<usize>,
    clipping: ClippingManager,
    scene_index: i8,
    pub(crate) batch_data: BatchData,
    deferred: Vec<DeferredPaint>,
    resolve_to_deferred: Vec<usize>,
    needs_deferred_resolve: bool,
    volatile: Vec<VolatilePaint>,
    cached_render_data: Option<WeakRenderDataHandle>,
    cached_in_use: Vec<RenderDataHandle>,
    report_references: bool,
    resources_to_report: Vec<ResourceId>,
}

impl WindowElementList {
    /// Creates an empty list for a window of the given size.
    #[must_use]
    pub fn new(window_size: Size) -> Self {
        Self {
            window_size,
            root: DrawLayer::default(),
            layers: Vec::new(),
            layer_index: HashMap::new(),
            layer_pool: Vec::new(),
            draw_stack: Vec::new(),
            clipping: ClippingManager::new(),
            scene_index: 0,
            batch_data: BatchData::new(),
            deferred: Vec::new(),
            resolve_to_deferred: Vec::new(),
            needs_deferred_resolve: false,
            volatile: Vec::new(),
            cached_render_data: None,
            cached_in_use: Vec::new(),
            report_references: true,
            resources_to_report: Vec::new(),
        }
    }

    /// Size of the window the list paints.
    #[must_use]
    pub fn window_size(&self) -> Size {
        self.window_size
    }

    /// Elements recorded into the root layer.
    #[must_use]
    pub fn root_elements(&self) -> &[DrawElement] {
        &self.root.elements
    }

    /// Elements recorded into the logical layer behind `handle`.
    #[must_use]
    pub fn layer_elements(&self, handle: &DrawLayerHandle) -> Option<&[DrawElement]> {
        self.layer_index
            .get(handle)
            .map(|&idx| self.layers[idx].elements.as_slice())
    }

    /// Number of logical layers in use.
    #[must_use]
    pub fn num_logical_layers(&self) -> usize {
        self.layers.len()
    }

    /// Total number of elements across the root and every logical layer.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.root.elements.len()
            + self.layers.iter().map(|l| l.elements.len()).sum::<usize>()
    }

    /// Appends an element to the active layer.
    pub fn push_element(&mut self, element: DrawElement) {
        self.active_layer_mut().elements.push(element);
    }

    fn active_layer_mut(&mut self) -> &mut DrawLayer {
        match self.draw_stack.last() {
            Some(&idx) => &mut self.layers[idx],
            None => &mut self.root,
        }
    }

    /// Whether an element with this geometry and tint would be invisible.
    ///
    /// Culls when the active clip has zero area, the tint is fully
    /// transparent, or (unless `line_kind`) the local size is degenerate.
    #[must_use]
    pub fn should_cull(
        &self,
        geometry: &PaintGeometry,
        tint: Option<LinearColor>,
        line_kind: bool,
    ) -> bool {
        if self.should_cull_clip_only() {
            return true;
        }
        if tint.is_some_and(|t| t.a <= 0.0) {
            return true;
        }
        !line_kind && (geometry.local_size.width <= 0.0 || geometry.local_size.height <= 0.0)
    }

    /// Whether the active clip state has zero area.
    #[must_use]
    pub fn should_cull_clip_only(&self) -> bool {
        self.clipping
            .active_state()
            .is_some_and(ClippingState::has_zero_area)
    }

    // -----------------------------------------------------------------------
    // Clipping
    // -----------------------------------------------------------------------

    /// Pushes a clip zone, see [`ClippingManager::push_clip`].
    pub fn push_clip(&mut self, zone: ClippingZone) -> u32 {
        self.clipping.push_clip(zone)
    }

    /// Pushes a prebuilt clip state.
    pub fn push_clipping_state(&mut self, state: ClippingState) -> u32 {
        self.clipping.push_clipping_state(state)
    }

    /// Restores the previous clip state.
    ///
    /// # Panics
    ///
    /// Panics if no clip is pushed.
    pub fn pop_clip(&mut self) {
        self.clipping.pop_clip();
    }

    /// Index of the active clip state, if any.
    #[must_use]
    pub fn clipping_index(&self) -> Option<u32> {
        self.clipping.clipping_index()
    }

    /// The clipping manager.
    #[must_use]
    pub fn clipping_manager(&self) -> &ClippingManager {
        &self.clipping
    }

    /// Scene index stamped on new elements.
    #[must_use]
    pub fn scene_index(&self) -> i8 {
        self.scene_index
    }

    /// Sets the scene index stamped on new elements.
    pub fn set_scene_index(&mut self, scene_index: i8) {
        self.scene_index = scene_index;
    }

    // -----------------------------------------------------------------------
    // Logical layers
    // -----------------------------------------------------------------------

    /// Makes the layer behind `handle` the active layer, creating it from
    /// the pool on first use.
    ///
    /// # Panics
    ///
    /// Panics if the layer is already active.
    pub fn begin_logical_layer(&mut self, handle: &DrawLayerHandle) {
        let idx = self.find_or_add_layer(handle);
        assert!(
            !self.draw_stack.contains(&idx),
            "logical draw layer is already active"
        );
        self.draw_stack.push(idx);
    }

    /// Returns to the layer that was active before the matching
    /// [`begin_logical_layer`](Self::begin_logical_layer).
    ///
    /// # Panics
    ///
    /// Panics if no logical layer is active.
    pub fn end_logical_layer(&mut self) {
        assert!(
            self.draw_stack.pop().is_some(),
            "end_logical_layer without an active logical layer"
        );
    }

    fn find_or_add_layer(&mut self, handle: &DrawLayerHandle) -> usize {
        if let Some(&idx) = self.layer_index.get(handle) {
            return idx;
        }
        let mut layer = self.layer_pool.pop().unwrap_or_default();
        layer.handle = Some(handle.clone());
        self.layers.push(layer);
        let idx = self.layers.len() - 1;
        self.layer_index.insert(handle.clone(), idx);
        idx
    }

    // -----------------------------------------------------------------------
    // Deferred painting
    // -----------------------------------------------------------------------

    /// Queues a widget to be painted when the enclosing deferred group
    /// resolves.
    pub fn queue_deferred_painting(&mut self, paint: DeferredPaint) {
        self.deferred.push(paint);
    }

    /// Opens a deferred group: paints queued from now on resolve together.
    pub fn begin_deferred_group(&mut self) {
        self.resolve_to_deferred.push(self.deferred.len());
    }

    /// Closes the current deferred group and flags it for resolution.
    pub fn end_deferred_group(&mut self) {
        self.needs_deferred_resolve = true;
    }

    /// Whether a closed deferred group is waiting for
    /// [`paint_deferred`](Self::paint_deferred).
    #[must_use]
    pub fn should_resolve_deferred(&self) -> bool {
        self.needs_deferred_resolve
    }

    /// Number of queued deferred paints.
    #[must_use]
    pub fn num_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Paints every widget queued since the innermost open group began, each
    /// above the previous one, then drops them from the queue. Widgets queued
    /// while resolving are painted in the same pass. Returns the highest
    /// layer painted.
    ///
    /// # Panics
    ///
    /// Panics if no deferred group was begun.
    pub fn paint_deferred(
        &mut self,
        cx: &mut PaintContext<'_>,
        mut layer: u32,
        culling_rect: Rect,
    ) -> u32 {
        self.needs_deferred_resolve = false;
        let Some(start) = self.resolve_to_deferred.pop() else {
            panic!("paint_deferred called without a deferred group");
        };
        let mut i = start;
        while i < self.deferred.len() {
            let paint = self.deferred[i];
            layer = cx.paint_child(paint.widget, &paint.geometry, culling_rect, self, layer);
            i += 1;
        }
        self.deferred.truncate(start);
        layer
    }

    // -----------------------------------------------------------------------
    // Volatile painting
    // -----------------------------------------------------------------------

    /// Reserves a logical layer for a volatile widget at `layer` and queues
    /// the widget to be painted into it.
    pub fn queue_volatile_painting(
        &mut self,
        widget: WidgetId,
        geometry: &Geometry,
        culling_rect: Rect,
        layer: u32,
    ) {
        let handle = DrawLayerHandle::new();
        DrawElement::make_layer(self, layer, &handle);
        self.volatile.push(VolatilePaint {
            widget,
            geometry: *geometry,
            culling_rect,
            clip_state: self.clipping.active_state().cloned(),
            layer,
            handle,
        });
    }

    /// Queued volatile widgets.
    #[must_use]
    pub fn volatile_paints(&self) -> &[VolatilePaint] {
        &self.volatile
    }

    /// Paints every queued volatile widget into `out`, each inside its
    /// reserved logical layer, translated by `offset`. Returns the highest
    /// layer painted.
    ///
    /// While `out` is itself being recorded into a cache, the widgets are
    /// queued on `out` under the same reserved layers instead, so they keep
    /// painting every frame the enclosing cache replays.
    pub fn paint_volatile(
        &self,
        cx: &mut PaintContext<'_>,
        out: &mut Self,
        offset: Vec2,
    ) -> u32 {
        let requeue = cx.is_caching() && !cx.is_volatility_pass();
        let mut max_layer = 0;
        for paint in &self.volatile {
            let layer = if requeue {
                paint.requeue(out, offset, paint.handle.clone())
            } else {
                out.begin_logical_layer(&paint.handle);
                let layer = paint.execute(cx, out, offset);
                out.end_logical_layer();
                layer
            };
            max_layer = max_layer.max(layer);
        }
        max_layer
    }

    /// Paints every queued volatile widget directly into the active layer of
    /// `out`. Used when the cached content is drawn from packed render data,
    /// which cannot inline logical layers.
    ///
    /// While `out` is being recorded into a cache, each widget gets a fresh
    /// logical layer in `out` and is queued on it, as in
    /// [`paint_volatile`](Self::paint_volatile).
    pub fn paint_volatile_root_layer(
        &self,
        cx: &mut PaintContext<'_>,
        out: &mut Self,
        offset: Vec2,
    ) -> u32 {
        let requeue = cx.is_caching() && !cx.is_volatility_pass();
        let mut max_layer = 0;
        for paint in &self.volatile {
            let layer = if requeue {
                let handle = DrawLayerHandle::new();
                DrawElement::make_layer(out, paint.layer, &handle);
                paint.requeue(out, offset, handle)
            } else {
                paint.execute(cx, out, offset)
            };
            max_layer = max_layer.max(layer);
        }
        max_layer
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    /// Splices the elements of `other` into this list, translated by
    /// `offset`.
    ///
    /// `other`'s clip states are appended (translated and nested in the
    /// active clip) to this list's clipping manager and every merged
    /// element's clip index is rebased onto them. Elements recorded without a
    /// clip take the active clip. Root elements go to the active layer;
    /// logical layers merge into the layer with the same handle. Cached
    /// buffers become in use by this list.
    pub fn merge_element_list(&mut self, other: &Self, offset: Vec2) {
        let live = self.clipping.clipping_index();
        let base = self
            .clipping
            .merge_clipping_states(other.clipping.states(), offset);
        let rebase = move |e: &DrawElement| {
            let mut e = e.clone();
            if offset != Vec2::ZERO {
                e.apply_position_offset(offset);
            }
            e.clipping_index = e.clipping_index.map(|i| i + base).or(live);
            e
        };

        for e in other.all_elements() {
            if let ElementKind::CachedBuffer(handle, _) = &e.kind {
                self.begin_using_cached_buffer(handle);
            }
        }

        let active = self.active_layer_mut();
        active.elements.extend(other.root.elements.iter().map(rebase));
        for layer in &other.layers {
            let Some(handle) = &layer.handle else {
                continue;
            };
            let idx = self.find_or_add_layer(handle);
            self.layers[idx]
                .elements
                .extend(layer.elements.iter().map(rebase));
        }
        self.resources_to_report
            .extend_from_slice(&other.resources_to_report);
    }

    /// Adds resources that must be reported alongside this list's elements.
    pub fn merge_resources(&mut self, resources: impl IntoIterator<Item = ResourceId>) {
        self.resources_to_report.extend(resources);
    }

    fn all_elements(&self) -> impl Iterator<Item = &DrawElement> {
        self.root
            .elements
            .iter()
            .chain(self.layers.iter().flat_map(|l| l.elements.iter()))
    }

    // -----------------------------------------------------------------------
    // Reference reporting
    // -----------------------------------------------------------------------

    /// Enables or disables [`add_referenced_objects`](Self::add_referenced_objects).
    pub fn set_should_report_references(&mut self, report: bool) {
        self.report_references = report;
    }

    /// Whether references are reported.
    #[must_use]
    pub fn should_report_references(&self) -> bool {
        self.report_references
    }

    /// Reports every resource object referenced by an element or merged in
    /// through [`merge_resources`](Self::merge_resources).
    pub fn add_referenced_objects(&self, collector: &mut dyn ReferenceCollector) {
        if !self.report_references {
            return;
        }
        for &resource in &self.resources_to_report {
            collector.add_referenced_object(resource);
        }
        for e in self.all_elements() {
            e.for_each_resource_object(|r| collector.add_referenced_object(r));
        }
    }

    // -----------------------------------------------------------------------
    // Cached render data
    // -----------------------------------------------------------------------

    /// Batches and packs the whole list into shareable render data.
    ///
    /// The list keeps a weak reference to the result, see
    /// [`cached_render_data_handle`](Self::cached_render_data_handle).
    pub fn cache_render_data(&mut self, ctx: BatchContext<'_>) -> RenderDataHandle {
        self.reset_batches();
        let mut batcher = ElementBatcher::new(ctx);
        batcher.add_elements(self);
        self.create_render_batches(&mut Tracer::none());
        let (vertices, indices) = self.batch_data.pack(false);
        let handle = RenderDataHandle::new(CachedRenderData {
            render_batches: self.batch_data.render_batches().to_vec(),
            clip_states: self.clipping.states().to_vec(),
            vertices,
            indices,
            stencil_required: self.batch_data.is_stencil_clipping_required(),
        });
        self.cached_render_data = Some(handle.downgrade());
        handle
    }

    /// The render data last produced by
    /// [`cache_render_data`](Self::cache_render_data), while it is alive.
    #[must_use]
    pub fn cached_render_data_handle(&self) -> Option<RenderDataHandle> {
        self.cached_render_data
            .as_ref()
            .and_then(WeakRenderDataHandle::upgrade)
    }

    /// Marks `handle` in use until [`post_draw`](Self::post_draw).
    pub fn begin_using_cached_buffer(&mut self, handle: &RenderDataHandle) {
        handle.begin_using();
        self.cached_in_use.push(handle.clone());
    }

    /// Whether the render data cached from this list is in use by a frame.
    #[must_use]
    pub fn is_cached_render_data_in_use(&self) -> bool {
        self.cached_render_data_handle()
            .is_some_and(|h| h.is_in_use())
    }

    /// Ends the use of every cached buffer this list drew.
    pub fn post_draw(&mut self) {
        for handle in self.cached_in_use.drain(..) {
            handle.end_using();
        }
    }

    // -----------------------------------------------------------------------
    // Batching
    // -----------------------------------------------------------------------

    /// Batches every recorded element with a fresh [`ElementBatcher`],
    /// replacing the batches of a previous call. Returns whether a batched
    /// viewport requires vsync.
    pub fn batch(&mut self, ctx: BatchContext<'_>) -> bool {
        self.reset_batches();
        let mut batcher = ElementBatcher::new(ctx);
        batcher.add_elements(self);
        batcher.requires_vsync()
    }

    /// Flattens the batched layers into ordered render batches.
    pub fn create_render_batches(&mut self, tracer: &mut Tracer<'_>) {
        let Self {
            root,
            layers,
            layer_index,
            batch_data,
            clipping,
            ..
        } = self;
        let lookup = LayerLookup {
            layers,
            index: layer_index,
        };
        batch_data.create_render_batches(&root.batch_map, &lookup, clipping.states());
        tracer.batch_stats(&BatchStatsEvent::from(&*batch_data));
        #[cfg(feature = "trace-rich")]
        tracer.render_batches(batch_data.render_batches());
    }

    /// The batch data.
    #[must_use]
    pub fn batch_data(&self) -> &BatchData {
        &self.batch_data
    }

    fn reset_batches(&mut self) {
        self.batch_data.reset_data();
        self.root.batch_map.reset();
        for layer in &mut self.layers {
            layer.batch_map.reset();
        }
    }

    /// Clears the list for the next frame, returning logical layers and
    /// scratch arrays to their pools.
    pub fn reset(&mut self) {
        self.reset_batches();
        self.root.reset();
        for mut layer in self.layers.drain(..) {
            layer.reset();
            self.layer_pool.push(layer);
        }
        self.layer_index.clear();
        self.draw_stack.clear();
        self.clipping.reset();
        self.scene_index = 0;
        self.deferred.clear();
        self.resolve_to_deferred.clear();
        self.needs_deferred_resolve = false;
        self.volatile.clear();
        self.resources_to_report.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{Brush, ResourceProxy};
    use crate::config::StrataConfig;
    use crate::element::DrawEffects;
    use kurbo::Point;

    fn list() -> WindowElementList {
        WindowElementList::new(Size::new(800.0, 600.0))
    }

    fn quad(out: &mut WindowElementList, layer: u32) {
        DrawElement::make_debug_quad(out, layer, &PaintGeometry::at(Point::ZERO, Size::new(4.0, 4.0)));
    }

    #[test]
    fn elements_append_to_active_layer() {
        let mut out = list();
        let handle = DrawLayerHandle::new();
        quad(&mut out, 0);
        out.begin_logical_layer(&handle);
        quad(&mut out, 1);
        quad(&mut out, 1);
        out.end_logical_layer();
        quad(&mut out, 2);
        assert_eq!(out.root_elements().len(), 2);
        assert_eq!(out.layer_elements(&handle).map(<[_]>::len), Some(2));
        assert_eq!(out.num_elements(), 4);
    }

    #[test]
    #[should_panic(expected = "logical draw layer is already active")]
    fn beginning_an_active_layer_panics() {
        let mut out = list();
        let handle = DrawLayerHandle::new();
        out.begin_logical_layer(&handle);
        out.begin_logical_layer(&handle);
    }

    #[test]
    fn reopening_a_layer_appends() {
        let mut out = list();
        let handle = DrawLayerHandle::new();
        out.begin_logical_layer(&handle);
        quad(&mut out, 0);
        out.end_logical_layer();
        out.begin_logical_layer(&handle);
        quad(&mut out, 0);
        out.end_logical_layer();
        assert_eq!(out.num_logical_layers(), 1);
        assert_eq!(out.layer_elements(&handle).map(<[_]>::len), Some(2));
    }

    #[test]
    fn layer_batches_are_inlined_at_layer_element() {
        let config = StrataConfig::default();
        let mut out = list();
        let handle = DrawLayerHandle::new();
        quad(&mut out, 1);
        DrawElement::make_layer(&mut out, 2, &handle);
        out.begin_logical_layer(&handle);
        DrawElement::make_box(
            &mut out,
            0,
            &PaintGeometry::at(Point::ZERO, Size::new(4.0, 4.0)),
            &Brush::solid(),
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        out.end_logical_layer();
        quad(&mut out, 3);

        out.batch(BatchContext::new(&config, out.window_size()));
        out.create_render_batches(&mut Tracer::none());
        let layers: Vec<u32> = out
            .batch_data()
            .render_batches()
            .iter()
            .map(|b| b.layer)
            .collect();
        // The box recorded at layer 0 of the logical layer lands between
        // layers 1 and 3 of the root.
        assert_eq!(layers, [1, 0, 3]);
    }

    #[test]
    fn merge_rebases_clip_indices_and_offsets() {
        let mut cached = list();
        cached.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        quad(&mut cached, 0);
        cached.pop_clip();

        let mut out = list();
        out.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0)));
        out.pop_clip();
        out.merge_element_list(&cached, Vec2::new(5.0, 0.0));

        let e = &out.root_elements()[0];
        assert_eq!(e.clipping_index(), Some(1));
        assert_eq!(e.position(), Point::new(5.0, 0.0));
        let state = out.clipping_manager().state(1);
        assert_eq!(state.bounding_rect(), Rect::new(5.0, 0.0, 15.0, 10.0));
    }

    #[test]
    fn merge_goes_into_active_layer_and_matching_layers() {
        let handle = DrawLayerHandle::new();
        let mut cached = list();
        quad(&mut cached, 0);
        cached.begin_logical_layer(&handle);
        quad(&mut cached, 0);
        cached.end_logical_layer();

        let mut out = list();
        let outer = DrawLayerHandle::new();
        out.begin_logical_layer(&outer);
        out.merge_element_list(&cached, Vec2::ZERO);
        out.end_logical_layer();
        assert!(out.root_elements().is_empty());
        assert_eq!(out.layer_elements(&outer).map(<[_]>::len), Some(1));
        assert_eq!(out.layer_elements(&handle).map(<[_]>::len), Some(1));
    }

    #[test]
    #[should_panic(expected = "paint_deferred called without a deferred group")]
    fn paint_deferred_without_group_panics() {
        let mut arena = crate::widget::WidgetArena::new();
        let config = StrataConfig::default();
        let mut cx = PaintContext::new(&mut arena, &config);
        let mut out = list();
        out.paint_deferred(&mut cx, 0, Rect::ZERO);
    }

    #[test]
    fn deferred_group_flags_resolution() {
        let mut out = list();
        assert!(!out.should_resolve_deferred());
        out.begin_deferred_group();
        out.end_deferred_group();
        assert!(out.should_resolve_deferred());
    }

    #[test]
    fn references_are_reported_when_enabled() {
        let mut out = list();
        let brush = Brush {
            resource_object: Some(ResourceId(7)),
            ..Brush::image(ResourceProxy::whole(ResourceId(1), Size::new(8.0, 8.0)))
        };
        DrawElement::make_box(
            &mut out,
            0,
            &PaintGeometry::at(Point::ZERO, Size::new(4.0, 4.0)),
            &brush,
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        out.merge_resources([ResourceId(9)]);

        let mut seen: Vec<ResourceId> = Vec::new();
        out.add_referenced_objects(&mut seen);
        assert_eq!(seen, [ResourceId(9), ResourceId(7)]);

        out.set_should_report_references(false);
        let mut none: Vec<ResourceId> = Vec::new();
        out.add_referenced_objects(&mut none);
        assert!(none.is_empty());
    }

    #[test]
    fn batching_twice_replaces_previous_batches() {
        let config = StrataConfig::default();
        let mut out = list();
        quad(&mut out, 0);
        out.batch(BatchContext::new(&config, out.window_size()));
        out.batch(BatchContext::new(&config, out.window_size()));
        out.create_render_batches(&mut Tracer::none());
        let [batch] = out.batch_data().render_batches() else {
            panic!("expected one render batch");
        };
        assert_eq!(batch.num_elements, 1);
        assert_eq!(batch.num_vertices, 4);
    }

    #[test]
    fn cached_render_data_tracks_use_until_post_draw() {
        let config = StrataConfig::default();
        let mut cached = list();
        quad(&mut cached, 0);
        let handle = cached.cache_render_data(BatchContext::new(&config, cached.window_size()));
        assert_eq!(handle.data().vertices.len(), 4);
        assert_eq!(handle.data().render_batches.len(), 1);
        assert!(cached.cached_render_data_handle().is_some());

        let mut out = list();
        DrawElement::make_cached_buffer(&mut out, 0, &handle, Vec2::ZERO);
        assert!(cached.is_cached_render_data_in_use());
        out.post_draw();
        assert!(!cached.is_cached_render_data_in_use());

        drop(handle);
        assert!(cached.cached_render_data_handle().is_none());
    }

    #[test]
    fn reset_returns_layers_to_pool() {
        let mut out = list();
        let handle = DrawLayerHandle::new();
        out.begin_logical_layer(&handle);
        quad(&mut out, 0);
        out.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0)));
        out.reset();
        assert_eq!(out.num_elements(), 0);
        assert_eq!(out.num_logical_layers(), 0);
        assert_eq!(out.clipping_index(), None);
        // The pooled layer is reused, empty.
        out.begin_logical_layer(&handle);
        assert_eq!(out.layer_elements(&handle).map(<[_]>::len), Some(0));
    }
}
