// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flattened proxy tree and its update pass.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::{InvalidateReason, UpdateFlags, Visibility, WidgetProxy, WidgetUpdateList};
use crate::dirty;
#[cfg(feature = "trace-rich")]
use crate::trace::ProxyUpdateRecord;
use crate::trace::{FastPathEvent, Tracer};
use crate::widget::{WidgetArena, WidgetId};

/// A handle to a proxy in a [`FastPathTree`].
///
/// Valid until the tree is rebuilt; using it afterwards panics.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetProxyHandle {
    index: u32,
    generation: u32,
}

impl WidgetProxyHandle {
    /// Pre-order index of the proxy.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Tree generation the handle was issued for.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for WidgetProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WidgetProxyHandle({}@gen{})", self.index, self.generation)
    }
}

/// What an update pass asks the host to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Widgets to repaint, parents before children. No entry lies inside
    /// another entry's subtree.
    pub repaint: Vec<WidgetId>,
    /// Widgets to tick.
    pub tick: Vec<WidgetId>,
    /// Repaint requests absorbed by an ancestor's repaint.
    pub subsumed: u32,
}

/// Proxies of a widget hierarchy in pre-order, with the update queue.
pub struct FastPathTree {
    proxies: Vec<WidgetProxy>,
    by_widget: HashMap<WidgetId, u32>,
    generation: u32,
    update_list: WidgetUpdateList,
    dirty: DirtyTracker<u32>,
    needs_rebuild: bool,
}

impl fmt::Debug for FastPathTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastPathTree")
            .field("proxies", &self.proxies.len())
            .field("generation", &self.generation)
            .field("queued", &self.update_list.len())
            .field("needs_rebuild", &self.needs_rebuild)
            .finish_non_exhaustive()
    }
}

impl Default for FastPathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FastPathTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            proxies: Vec::new(),
            by_widget: HashMap::new(),
            generation: 0,
            update_list: WidgetUpdateList::new(),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            needs_rebuild: true,
        }
    }

    /// Rebuilds the proxies from the hierarchy under `root`, in pre-order.
    ///
    /// Every handle issued before is invalidated. Stale or already visited
    /// children are skipped. The root is queued for a full repaint and every
    /// volatile widget is queued for its per-frame repaint.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "proxy count fits in u32"
    )]
    pub fn build(&mut self, arena: &WidgetArena, root: WidgetId) {
        self.generation = self.generation.wrapping_add(1);
        self.proxies.clear();
        self.by_widget.clear();
        self.update_list.clear();
        self.dirty = DirtyTracker::with_cycle_handling(CycleHandling::Error);
        self.needs_rebuild = false;

        let mut stack = alloc::vec![(root, None::<u32>)];
        while let Some((widget, parent)) = stack.pop() {
            if !arena.contains(widget) || self.by_widget.contains_key(&widget) {
                continue;
            }
            let index = self.proxies.len() as u32;
            let volatile = arena.get_dyn(widget).is_some_and(|w| w.is_volatile());
            self.proxies.push(WidgetProxy {
                widget,
                index,
                parent_index: parent,
                child_count: 0,
                leaf_most_child_index: index,
                update_flags: if volatile {
                    UpdateFlags::VOLATILE_PAINT
                } else {
                    UpdateFlags::empty()
                },
                invalidate_reason: InvalidateReason::empty(),
                visibility: Visibility::Visible,
                updated_this_frame: false,
                in_update_list: false,
                inherited_hidden: false,
                child_order_invalid: false,
            });
            self.by_widget.insert(widget, index);
            if let Some(p) = parent {
                self.proxies[p as usize].child_count += 1;
                let _ = self.dirty.add_dependency(p, index, dirty::LAYOUT);
                let _ = self.dirty.add_dependency(index, p, dirty::VISIBILITY);
            }
            let children = arena.children(widget);
            stack.extend(children.into_iter().rev().map(|c| (c, Some(index))));
        }

        for i in (0..self.proxies.len()).rev() {
            if let Some(p) = self.proxies[i].parent_index {
                let leaf = self.proxies[i].leaf_most_child_index;
                let parent = &mut self.proxies[p as usize];
                parent.leaf_most_child_index = parent.leaf_most_child_index.max(leaf);
            }
        }

        if let Some(root) = self.proxies.first_mut() {
            root.update_flags |= UpdateFlags::REPAINT;
        }
        for i in 0..self.proxies.len() {
            if !self.proxies[i].update_flags.is_empty() {
                self.enqueue(i as u32);
            }
        }
    }

    /// Number of proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether the tree has no proxy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Whether a child-order change requires [`build`](Self::build).
    #[must_use]
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Every proxy, in pre-order.
    #[must_use]
    pub fn proxies(&self) -> &[WidgetProxy] {
        &self.proxies
    }

    /// The handle of the proxy at `index`.
    #[must_use]
    pub fn handle(&self, index: u32) -> Option<WidgetProxyHandle> {
        ((index as usize) < self.proxies.len()).then_some(WidgetProxyHandle {
            index,
            generation: self.generation,
        })
    }

    /// The handle of the proxy for `widget`.
    #[must_use]
    pub fn find(&self, widget: WidgetId) -> Option<WidgetProxyHandle> {
        self.by_widget
            .get(&widget)
            .and_then(|&index| self.handle(index))
    }

    /// The proxy behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was issued before the last rebuild.
    #[must_use]
    pub fn proxy(&self, handle: WidgetProxyHandle) -> &WidgetProxy {
        &self.proxies[self.check(handle)]
    }

    /// Number of queued proxies.
    #[must_use]
    pub fn num_queued(&self) -> usize {
        self.update_list.len()
    }

    fn check(&self, handle: WidgetProxyHandle) -> usize {
        assert!(
            handle.generation == self.generation && (handle.index as usize) < self.proxies.len(),
            "stale WidgetProxyHandle: {handle:?}"
        );
        handle.index as usize
    }

    fn enqueue(&mut self, index: u32) {
        if self.update_list.push(index) {
            self.proxies[index as usize].in_update_list = true;
        }
    }

    /// Records an invalidation and queues the proxy.
    ///
    /// Layout (and visibility, which implies layout) spreads to ancestors and
    /// visibility to descendants when the next pass starts. Every other
    /// reason only affects the proxy itself, which is queued right away. A
    /// child-order change additionally requests a rebuild.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is stale.
    pub fn invalidate(&mut self, handle: WidgetProxyHandle, reason: InvalidateReason) {
        let idx = self.check(handle);
        let index = handle.index;
        let proxy = &mut self.proxies[idx];
        proxy.invalidate_reason |= reason;
        proxy.update_flags |= UpdateFlags::from_reason(reason);
        if reason.contains(InvalidateReason::CHILD_ORDER) {
            proxy.child_order_invalid = true;
            self.needs_rebuild = true;
        }
        if reason.intersects(InvalidateReason::LAYOUT | InvalidateReason::VISIBILITY) {
            self.dirty.mark_with(index, dirty::LAYOUT, &EagerPolicy);
        }
        if reason.contains(InvalidateReason::VISIBILITY) {
            self.dirty.mark_with(index, dirty::VISIBILITY, &EagerPolicy);
        }
        self.enqueue(index);
    }

    /// Changes a proxy's own visibility.
    pub fn set_visibility(&mut self, handle: WidgetProxyHandle, visibility: Visibility) {
        let idx = self.check(handle);
        if self.proxies[idx].visibility != visibility {
            self.proxies[idx].visibility = visibility;
            self.invalidate(handle, InvalidateReason::VISIBILITY);
        }
    }

    /// Marks a widget as repainting every frame, or not.
    pub fn set_volatile(&mut self, handle: WidgetProxyHandle, volatile: bool) {
        let idx = self.check(handle);
        self.proxies[idx]
            .update_flags
            .set(UpdateFlags::VOLATILE_PAINT, volatile);
        self.invalidate(handle, InvalidateReason::VOLATILITY);
    }

    /// Adds update flags (for example [`UpdateFlags::TICK`]) and queues the
    /// proxy.
    pub fn add_update_flags(&mut self, handle: WidgetProxyHandle, flags: UpdateFlags) {
        let idx = self.check(handle);
        self.proxies[idx].update_flags |= flags;
        self.enqueue(handle.index);
    }

    /// Removes update flags. The proxy leaves the queue after its next visit
    /// if nothing else keeps it there.
    pub fn remove_update_flags(&mut self, handle: WidgetProxyHandle, flags: UpdateFlags) {
        let idx = self.check(handle);
        self.proxies[idx].update_flags.remove(flags);
    }

    /// Spreads the dirty channels and queues every affected proxy.
    fn resolve_dirty(&mut self) {
        let layout: Vec<u32> = self
            .dirty
            .drain(dirty::LAYOUT)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in layout {
            let proxy = &mut self.proxies[idx as usize];
            proxy.invalidate_reason |= InvalidateReason::LAYOUT;
            proxy.update_flags |= UpdateFlags::REPAINT;
            self.enqueue(idx);
        }

        let mut visibility: Vec<u32> = self
            .dirty
            .drain(dirty::VISIBILITY)
            .affected()
            .deterministic()
            .run()
            .collect();
        // Parents first, so inherited state flows down in one sweep.
        visibility.sort_unstable();
        for idx in visibility {
            let inherited = self.proxies[idx as usize]
                .parent_index
                .is_some_and(|p| !self.proxies[p as usize].is_effectively_visible());
            let proxy = &mut self.proxies[idx as usize];
            proxy.inherited_hidden = inherited;
            proxy.invalidate_reason |= InvalidateReason::VISIBILITY;
            proxy.update_flags |= UpdateFlags::REPAINT;
            self.enqueue(idx);
        }
    }

    /// Runs one update pass.
    ///
    /// Queued proxies are visited in tree order. A visible proxy asking for a
    /// repaint is repainted unless an ancestor was repainted in this pass.
    /// Ticking, timers and volatile repaints keep the proxy queued for the
    /// next pass; everything else is cleared.
    pub fn process_updates(&mut self, frame_index: u64, tracer: &mut Tracer<'_>) -> UpdateOutcome {
        for proxy in &mut self.proxies {
            proxy.updated_this_frame = false;
        }
        self.resolve_dirty();

        let mut outcome = UpdateOutcome::default();
        let mut event = FastPathEvent {
            frame_index,
            ..FastPathEvent::default()
        };
        let mut covered_until: Option<u32> = None;
        let mut persistent = Vec::new();

        while let Some(index) = self.update_list.pop() {
            let proxy = &mut self.proxies[index as usize];
            proxy.in_update_list = false;
            proxy.updated_this_frame = true;
            event.processed += 1;

            let wants_repaint = proxy
                .update_flags
                .intersects(UpdateFlags::REPAINT | UpdateFlags::VOLATILE_PAINT);
            let subsumed = covered_until.is_some_and(|end| index <= end);
            let repainted = wants_repaint && !subsumed && proxy.is_effectively_visible();
            if repainted {
                outcome.repaint.push(proxy.widget);
                covered_until = Some(proxy.leaf_most_child_index);
                event.repainted += 1;
            } else if wants_repaint && subsumed {
                outcome.subsumed += 1;
                event.subsumed += 1;
            }
            if proxy
                .update_flags
                .intersects(UpdateFlags::TICK | UpdateFlags::ACTIVE_TIMER)
            {
                outcome.tick.push(proxy.widget);
            }

            #[cfg(feature = "trace-rich")]
            tracer.proxy_update(&ProxyUpdateRecord {
                index,
                flags: proxy.update_flags,
                reason: proxy.invalidate_reason,
                repainted,
            });

            proxy.update_flags.remove(UpdateFlags::REPAINT);
            proxy.invalidate_reason = InvalidateReason::empty();
            if proxy.update_flags.intersects(UpdateFlags::PERSISTENT) {
                persistent.push(index);
            }
        }

        for index in persistent {
            self.enqueue(index);
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "queue length is bounded by the proxy count"
        )]
        let remaining = self.update_list.len() as u32;
        event.remaining = remaining;
        tracer.fast_path(&event);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::tests::Counter;

    /// root(0) -> [a(1) -> [a1(2), a2(3)], b(4)]
    struct Fixture {
        arena: WidgetArena,
        root: WidgetId,
        a: WidgetId,
        a1: WidgetId,
        a2: WidgetId,
        b: WidgetId,
    }

    fn fixture() -> Fixture {
        let mut arena = WidgetArena::new();
        let a1 = arena.insert(Counter::default());
        let a2 = arena.insert(Counter::default());
        let b = arena.insert(Counter::default());
        let a = arena.insert(Counter {
            children: alloc::vec![a1, a2],
            ..Counter::default()
        });
        let root = arena.insert(Counter {
            children: alloc::vec![a, b],
            ..Counter::default()
        });
        Fixture {
            arena,
            root,
            a,
            a1,
            a2,
            b,
        }
    }

    fn built(f: &Fixture) -> FastPathTree {
        let mut tree = FastPathTree::new();
        tree.build(&f.arena, f.root);
        // Consume the initial full repaint.
        tree.process_updates(0, &mut Tracer::none());
        tree
    }

    fn handle(tree: &FastPathTree, w: WidgetId) -> WidgetProxyHandle {
        tree.find(w).unwrap_or_else(|| panic!("{w:?} is not in the tree"))
    }

    #[test]
    fn build_is_pre_order() {
        let f = fixture();
        let mut tree = FastPathTree::new();
        tree.build(&f.arena, f.root);
        let order: Vec<WidgetId> = tree.proxies().iter().map(|p| p.widget).collect();
        assert_eq!(order, [f.root, f.a, f.a1, f.a2, f.b]);
        let p = tree.proxies();
        assert_eq!(p[0].child_count, 2);
        assert_eq!(p[0].leaf_most_child_index, 4);
        assert_eq!(p[1].leaf_most_child_index, 3);
        assert_eq!(p[2].leaf_most_child_index, 2);
        assert_eq!(p[3].parent_index, Some(1));
        assert_eq!(p[4].parent_index, Some(0));
        assert!(p[1].contains(3));
        assert!(!p[1].contains(4));
    }

    #[test]
    fn first_pass_repaints_root_only() {
        let f = fixture();
        let mut tree = FastPathTree::new();
        tree.build(&f.arena, f.root);
        let outcome = tree.process_updates(0, &mut Tracer::none());
        assert_eq!(outcome.repaint, [f.root]);
        assert_eq!(tree.num_queued(), 0);
    }

    #[test]
    fn parent_repaint_subsumes_children() {
        let f = fixture();
        let mut tree = built(&f);
        tree.invalidate(handle(&tree, f.a1), InvalidateReason::PAINT);
        tree.invalidate(handle(&tree, f.a), InvalidateReason::PAINT);
        tree.invalidate(handle(&tree, f.b), InvalidateReason::PAINT);
        assert!(tree.proxy(handle(&tree, f.a1)).in_update_list);

        let outcome = tree.process_updates(1, &mut Tracer::none());
        assert_eq!(outcome.repaint, [f.a, f.b]);
        assert_eq!(outcome.subsumed, 1);
        let a1 = tree.proxy(handle(&tree, f.a1));
        assert!(!a1.in_update_list);
        assert!(a1.updated_this_frame);
        assert!(a1.invalidate_reason.is_empty());
    }

    #[test]
    fn paint_stays_local() {
        let f = fixture();
        let mut tree = built(&f);
        tree.invalidate(handle(&tree, f.a2), InvalidateReason::PAINT);
        let outcome = tree.process_updates(1, &mut Tracer::none());
        assert_eq!(outcome.repaint, [f.a2]);
        assert_eq!(outcome.subsumed, 0);
        assert!(!tree.proxy(handle(&tree, f.a)).updated_this_frame);

        let outcome = tree.process_updates(2, &mut Tracer::none());
        assert!(outcome.repaint.is_empty());
    }

    #[test]
    fn layout_spreads_to_ancestors() {
        let f = fixture();
        let mut tree = built(&f);
        tree.invalidate(handle(&tree, f.a2), InvalidateReason::LAYOUT);
        let outcome = tree.process_updates(1, &mut Tracer::none());
        assert_eq!(outcome.repaint, [f.root]);
        assert_eq!(outcome.subsumed, 2);
        assert!(!tree.proxy(handle(&tree, f.b)).updated_this_frame);
    }

    #[test]
    fn hidden_subtree_is_not_repainted() {
        let f = fixture();
        let mut tree = built(&f);
        tree.set_visibility(handle(&tree, f.a), Visibility::Collapsed);
        let outcome = tree.process_updates(1, &mut Tracer::none());
        assert_eq!(outcome.repaint, [f.root]);
        assert!(tree.proxy(handle(&tree, f.a1)).inherited_hidden);
        assert!(tree.proxy(handle(&tree, f.a2)).inherited_hidden);
        assert!(!tree.proxy(handle(&tree, f.b)).inherited_hidden);

        tree.set_visibility(handle(&tree, f.a), Visibility::Visible);
        tree.process_updates(2, &mut Tracer::none());
        assert!(!tree.proxy(handle(&tree, f.a1)).inherited_hidden);

        // A repaint request inside the hidden subtree does nothing.
        tree.set_visibility(handle(&tree, f.a), Visibility::Hidden);
        tree.process_updates(3, &mut Tracer::none());
        tree.invalidate(handle(&tree, f.a1), InvalidateReason::PAINT);
        let outcome = tree.process_updates(4, &mut Tracer::none());
        assert!(outcome.repaint.is_empty());
    }

    #[test]
    fn ticking_proxies_stay_queued() {
        let f = fixture();
        let mut tree = built(&f);
        let b = handle(&tree, f.b);
        tree.add_update_flags(b, UpdateFlags::TICK);
        for frame in 1..3 {
            let outcome = tree.process_updates(frame, &mut Tracer::none());
            assert_eq!(outcome.tick, [f.b]);
            assert!(outcome.repaint.is_empty());
            assert!(tree.proxy(b).in_update_list);
        }
        tree.remove_update_flags(b, UpdateFlags::TICK);
        let outcome = tree.process_updates(3, &mut Tracer::none());
        assert!(outcome.tick.is_empty());
        assert_eq!(tree.num_queued(), 0);
    }

    #[test]
    fn volatile_widgets_repaint_every_pass() {
        let f = fixture();
        let mut tree = built(&f);
        let a2 = handle(&tree, f.a2);
        tree.set_volatile(a2, true);
        for frame in 1..4 {
            let outcome = tree.process_updates(frame, &mut Tracer::none());
            assert_eq!(outcome.repaint, [f.a2]);
        }
    }

    #[test]
    fn child_order_requests_rebuild() {
        let f = fixture();
        let mut tree = built(&f);
        assert!(!tree.needs_rebuild());
        tree.invalidate(handle(&tree, f.a), InvalidateReason::CHILD_ORDER);
        assert!(tree.needs_rebuild());
        assert!(tree.proxy(handle(&tree, f.a)).child_order_invalid);
        tree.build(&f.arena, f.root);
        assert!(!tree.needs_rebuild());
    }

    #[test]
    #[should_panic(expected = "stale WidgetProxyHandle")]
    fn handles_go_stale_on_rebuild() {
        let f = fixture();
        let mut tree = built(&f);
        let a = handle(&tree, f.a);
        tree.build(&f.arena, f.root);
        let _ = tree.proxy(a);
    }
}
