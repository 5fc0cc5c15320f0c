// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Widgets as paint callbacks stored in a generational arena.
//!
//! Layout and styling live outside this crate. A widget here is anything that
//! implements [`Paintable`]: given its allotted [`Geometry`], it records draw
//! elements into a [`WindowElementList`] and returns the highest layer id it
//! used. Widgets reference each other through [`WidgetId`] handles into a
//! [`WidgetArena`] and paint their children through a [`PaintContext`].
//!
//! While a widget paints it is taken out of the arena, so a widget that (by
//! mistake) paints itself recursively is skipped rather than aliased.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use kurbo::Rect;

use crate::batch::GlyphAtlas;
use crate::config::StrataConfig;
use crate::element_list::WindowElementList;
use crate::geometry::Geometry;
use crate::trace::Tracer;

/// A handle to a widget in a [`WidgetArena`].
///
/// Carries a generation counter so that handles to removed widgets are
/// detected after the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl WidgetId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WidgetId({}@gen{})", self.idx, self.generation)
    }
}

/// Something that records draw elements for its allotted geometry.
pub trait Paintable: Any {
    /// Records this widget into `out` starting at `layer` and returns the
    /// highest layer id used.
    fn paint(
        &mut self,
        cx: &mut PaintContext<'_>,
        geometry: &Geometry,
        culling_rect: Rect,
        out: &mut WindowElementList,
        layer: u32,
    ) -> u32;

    /// Whether the widget must repaint every frame, even inside a cache.
    fn is_volatile(&self) -> bool {
        false
    }

    /// Appends the widget's children in paint order.
    fn children(&self, out: &mut Vec<WidgetId>) {
        _ = out;
    }

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str {
        "widget"
    }
}

// ---------------------------------------------------------------------------
// WidgetArena
// ---------------------------------------------------------------------------

enum Slot {
    Vacant,
    Present(Box<dyn Paintable>),
    /// Taken out while the widget paints.
    Painting,
}

struct Entry {
    generation: u32,
    slot: Slot,
}

/// Owns every widget and hands out generational [`WidgetId`]s.
#[derive(Default)]
pub struct WidgetArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
    len: usize,
}

impl fmt::Debug for WidgetArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetArena")
            .field("len", &self.len)
            .field("slots", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl WidgetArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live widgets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no widget.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a widget and returns its handle.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "widget count fits in u32"
    )]
    pub fn insert(&mut self, widget: impl Paintable) -> WidgetId {
        self.len += 1;
        let widget: Box<dyn Paintable> = Box::new(widget);
        if let Some(idx) = self.free.pop() {
            let entry = &mut self.entries[idx as usize];
            entry.slot = Slot::Present(widget);
            return WidgetId {
                idx,
                generation: entry.generation,
            };
        }
        self.entries.push(Entry {
            generation: 0,
            slot: Slot::Present(widget),
        });
        WidgetId {
            idx: (self.entries.len() - 1) as u32,
            generation: 0,
        }
    }

    /// Removes a widget, returning it.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale or the widget is currently painting.
    pub fn remove(&mut self, id: WidgetId) -> Box<dyn Paintable> {
        let entry = self.entry_mut(id);
        let widget = match core::mem::replace(&mut entry.slot, Slot::Vacant) {
            Slot::Present(widget) => widget,
            Slot::Painting => panic!("cannot remove {id:?} while it paints"),
            Slot::Vacant => panic!("stale WidgetId: {id:?}"),
        };
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.idx);
        self.len -= 1;
        widget
    }

    fn entry_mut(&mut self, id: WidgetId) -> &mut Entry {
        match self.entries.get_mut(id.idx as usize) {
            Some(entry) if entry.generation == id.generation => entry,
            _ => panic!("stale WidgetId: {id:?}"),
        }
    }

    /// Whether `id` refers to a live widget.
    #[must_use]
    pub fn contains(&self, id: WidgetId) -> bool {
        self.entries
            .get(id.idx as usize)
            .is_some_and(|e| e.generation == id.generation && !matches!(e.slot, Slot::Vacant))
    }

    /// The widget behind `id`, unless the handle is stale or the widget is
    /// painting.
    #[must_use]
    pub fn get_dyn(&self, id: WidgetId) -> Option<&dyn Paintable> {
        match self.entries.get(id.idx as usize) {
            Some(Entry {
                generation,
                slot: Slot::Present(widget),
            }) if *generation == id.generation => Some(&**widget),
            _ => None,
        }
    }

    /// The widget behind `id` as a concrete type.
    #[must_use]
    pub fn get<T: Paintable>(&self, id: WidgetId) -> Option<&T> {
        let widget: &dyn Any = self.get_dyn(id)?;
        widget.downcast_ref()
    }

    /// The widget behind `id` as a concrete type, mutably.
    #[must_use]
    pub fn get_mut<T: Paintable>(&mut self, id: WidgetId) -> Option<&mut T> {
        match self.entries.get_mut(id.idx as usize) {
            Some(Entry {
                generation,
                slot: Slot::Present(widget),
            }) if *generation == id.generation => {
                let widget: &mut dyn Any = &mut **widget;
                widget.downcast_mut()
            }
            _ => None,
        }
    }

    /// The children of `id`, or nothing for a stale handle.
    #[must_use]
    pub fn children(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut out = Vec::new();
        if let Some(widget) = self.get_dyn(id) {
            widget.children(&mut out);
        }
        out
    }

    fn take(&mut self, id: WidgetId) -> Option<Box<dyn Paintable>> {
        let entry = self.entries.get_mut(id.idx as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        match core::mem::replace(&mut entry.slot, Slot::Painting) {
            Slot::Present(widget) => Some(widget),
            other => {
                entry.slot = other;
                None
            }
        }
    }

    fn restore(&mut self, id: WidgetId, widget: Box<dyn Paintable>) {
        if let Some(entry) = self.entries.get_mut(id.idx as usize) {
            entry.slot = Slot::Present(widget);
        }
    }
}

// ---------------------------------------------------------------------------
// PaintContext
// ---------------------------------------------------------------------------

/// Everything a widget needs besides its output list while painting.
pub struct PaintContext<'a> {
    arena: &'a mut WidgetArena,
    config: &'a StrataConfig,
    atlas: Option<&'a dyn GlyphAtlas>,
    tracer: Tracer<'a>,
    frame_index: u64,
    caching: bool,
    volatility_pass: bool,
}

impl fmt::Debug for PaintContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaintContext")
            .field("frame_index", &self.frame_index)
            .field("caching", &self.caching)
            .field("volatility_pass", &self.volatility_pass)
            .finish_non_exhaustive()
    }
}

impl<'a> PaintContext<'a> {
    /// Creates a context painting widgets from `arena`.
    #[must_use]
    pub fn new(arena: &'a mut WidgetArena, config: &'a StrataConfig) -> Self {
        Self {
            arena,
            config,
            atlas: None,
            tracer: Tracer::none(),
            frame_index: 0,
            caching: false,
            volatility_pass: false,
        }
    }

    /// Sets the glyph atlas used when caches pack their render data.
    #[must_use]
    pub fn with_atlas(mut self, atlas: &'a dyn GlyphAtlas) -> Self {
        self.atlas = Some(atlas);
        self
    }

    /// Sets the tracer that receives cache decisions.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer<'a>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Sets the frame counter stamped on trace events.
    #[must_use]
    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &'a StrataConfig {
        self.config
    }

    /// The glyph atlas, if any.
    #[must_use]
    pub fn atlas(&self) -> Option<&'a dyn GlyphAtlas> {
        self.atlas
    }

    /// The frame counter.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The tracer.
    pub fn tracer(&mut self) -> &mut Tracer<'a> {
        &mut self.tracer
    }

    /// The widget arena.
    pub fn arena(&mut self) -> &mut WidgetArena {
        self.arena
    }

    /// Whether painting is being recorded into a cache.
    #[must_use]
    pub fn is_caching(&self) -> bool {
        self.caching
    }

    /// Whether volatile widgets are being painted on top of replayed content.
    #[must_use]
    pub fn is_volatility_pass(&self) -> bool {
        self.volatility_pass
    }

    /// Marks the start of a cache recording and returns the previous state
    /// for [`end_caching`](Self::end_caching).
    pub(crate) fn begin_caching(&mut self) -> bool {
        core::mem::replace(&mut self.caching, true)
    }

    pub(crate) fn end_caching(&mut self, previous: bool) {
        self.caching = previous;
    }

    /// Paints the widget `id` into `out` at `layer`.
    ///
    /// A stale handle, or a widget that is already painting, paints nothing
    /// and returns `layer`. A volatile widget painted while recording a cache
    /// is queued on `out` instead of painted.
    pub fn paint_child(
        &mut self,
        id: WidgetId,
        geometry: &Geometry,
        culling_rect: Rect,
        out: &mut WindowElementList,
        layer: u32,
    ) -> u32 {
        let Some(mut widget) = self.arena.take(id) else {
            return layer;
        };
        let max_layer = if self.caching && !self.volatility_pass && widget.is_volatile() {
            out.queue_volatile_painting(id, geometry, culling_rect, layer);
            layer
        } else {
            widget.paint(self, geometry, culling_rect, out, layer)
        };
        self.arena.restore(id, widget);
        max_layer
    }

    /// Paints a volatile widget queued by a cache recording.
    pub(crate) fn paint_volatile_widget(
        &mut self,
        id: WidgetId,
        geometry: &Geometry,
        culling_rect: Rect,
        out: &mut WindowElementList,
        layer: u32,
    ) -> u32 {
        let previous = core::mem::replace(&mut self.volatility_pass, true);
        let max_layer = self.paint_child(id, geometry, culling_rect, out, layer);
        self.volatility_pass = previous;
        max_layer
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::element::DrawElement;
    use kurbo::{Point, Size};

    /// Draws one debug quad per paint and counts its paints.
    #[derive(Debug, Default)]
    pub(crate) struct Counter {
        pub(crate) paints: u32,
        pub(crate) volatile: bool,
        pub(crate) children: Vec<WidgetId>,
    }

    impl Paintable for Counter {
        fn paint(
            &mut self,
            cx: &mut PaintContext<'_>,
            geometry: &Geometry,
            culling_rect: Rect,
            out: &mut WindowElementList,
            layer: u32,
        ) -> u32 {
            self.paints += 1;
            DrawElement::make_debug_quad(out, layer, &geometry.to_paint_geometry());
            let mut max_layer = layer;
            for &child in &self.children {
                max_layer = max_layer.max(cx.paint_child(child, geometry, culling_rect, out, layer + 1));
            }
            max_layer
        }

        fn is_volatile(&self) -> bool {
            self.volatile
        }

        fn children(&self, out: &mut Vec<WidgetId>) {
            out.extend_from_slice(&self.children);
        }
    }

    pub(crate) fn geometry() -> Geometry {
        Geometry::new(Size::new(10.0, 10.0), Point::new(5.0, 5.0), 1.0)
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut arena = WidgetArena::new();
        let a = arena.insert(Counter::default());
        arena.remove(a);
        let b = arena.insert(Counter::default());
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!arena.contains(a));
        assert!(arena.contains(b));
        assert!(arena.get::<Counter>(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    #[should_panic(expected = "stale WidgetId")]
    fn removing_stale_handle_panics() {
        let mut arena = WidgetArena::new();
        let a = arena.insert(Counter::default());
        arena.remove(a);
        arena.remove(a);
    }

    #[test]
    fn stale_child_paints_nothing() {
        let mut arena = WidgetArena::new();
        let a = arena.insert(Counter::default());
        arena.remove(a);
        let config = StrataConfig::default();
        let mut out = WindowElementList::new(Size::new(100.0, 100.0));
        let mut cx = PaintContext::new(&mut arena, &config);
        let layer = cx.paint_child(a, &geometry(), Rect::ZERO, &mut out, 3);
        assert_eq!(layer, 3);
        assert!(out.root_elements().is_empty());
    }

    #[test]
    fn children_paint_above_parent() {
        let mut arena = WidgetArena::new();
        let child = arena.insert(Counter::default());
        let parent = arena.insert(Counter {
            children: alloc::vec![child],
            ..Counter::default()
        });
        let config = StrataConfig::default();
        let mut out = WindowElementList::new(Size::new(100.0, 100.0));
        let mut cx = PaintContext::new(&mut arena, &config);
        let layer = cx.paint_child(parent, &geometry(), Rect::ZERO, &mut out, 0);
        assert_eq!(layer, 1);
        assert_eq!(out.root_elements().len(), 2);
        assert_eq!(arena.get::<Counter>(child).map(|c| c.paints), Some(1));
        assert_eq!(arena.children(parent), [child]);
    }

    #[test]
    fn widget_painting_itself_is_skipped() {
        let mut arena = WidgetArena::new();
        let id = arena.insert(Counter::default());
        if let Some(c) = arena.get_mut::<Counter>(id) {
            c.children.push(id);
        }
        let config = StrataConfig::default();
        let mut out = WindowElementList::new(Size::new(100.0, 100.0));
        let mut cx = PaintContext::new(&mut arena, &config);
        cx.paint_child(id, &geometry(), Rect::ZERO, &mut out, 0);
        assert_eq!(arena.get::<Counter>(id).map(|c| c.paints), Some(1));
    }

    #[test]
    fn volatile_widgets_are_queued_while_caching() {
        let mut arena = WidgetArena::new();
        let id = arena.insert(Counter {
            volatile: true,
            ..Counter::default()
        });
        let config = StrataConfig::default();
        let mut cache = WindowElementList::new(Size::new(100.0, 100.0));
        let mut cx = PaintContext::new(&mut arena, &config);
        let previous = cx.begin_caching();
        cx.paint_child(id, &geometry(), Rect::ZERO, &mut cache, 4);
        cx.end_caching(previous);
        assert_eq!(cache.volatile_paints().len(), 1);
        assert_eq!(cache.volatile_paints()[0].layer(), 4);
        // Only the reserved layer element was recorded.
        assert_eq!(cache.root_elements().len(), 1);

        let mut out = WindowElementList::new(Size::new(100.0, 100.0));
        cache.paint_volatile(&mut cx, &mut out, kurbo::Vec2::ZERO);
        let handle = cache.volatile_paints()[0].handle();
        assert_eq!(out.layer_elements(handle).map(<[_]>::len), Some(1));
        assert_eq!(arena.get::<Counter>(id).map(|c| c.paints), Some(1));
    }
}
