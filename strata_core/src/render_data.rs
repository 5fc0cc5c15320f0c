// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shareable packed render data recorded by an invalidation panel.
//!
//! A [`RenderDataHandle`] owns the packed vertices, indices and render batches
//! of a cached subtree. The panel that created it holds one reference; every
//! frame that draws it holds the data "in use" until
//! [`WindowElementList::post_draw`](crate::element_list::WindowElementList::post_draw)
//! ends the use. A handle the panel has replaced is disconnected and dropped
//! once no frame uses it any more.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::batch::{RenderBatch, SlateVertex};
use crate::clip::ClippingState;

/// The packed output of batching a recorded element list.
#[derive(Clone, Debug, Default)]
pub struct CachedRenderData {
    /// Render batches with offsets relative to `vertices` and `indices`.
    pub render_batches: Vec<RenderBatch>,
    /// Clip states the batches' clip indices refer to.
    pub clip_states: Vec<ClippingState>,
    /// Packed vertices.
    pub vertices: Vec<SlateVertex>,
    /// Packed indices, relative to each batch's vertex offset.
    pub indices: Vec<u32>,
    /// Whether any clip state needs the stencil buffer.
    pub stencil_required: bool,
}

struct Inner {
    usage: AtomicU32,
    connected: AtomicBool,
    data: CachedRenderData,
}

/// A reference-counted handle to [`CachedRenderData`].
///
/// Identity is pointer identity: two handles are equal when they refer to the
/// same allocation.
#[derive(Clone)]
pub struct RenderDataHandle(Arc<Inner>);

impl RenderDataHandle {
    /// Wraps freshly packed data. The handle starts connected and unused.
    #[must_use]
    pub fn new(data: CachedRenderData) -> Self {
        Self(Arc::new(Inner {
            usage: AtomicU32::new(0),
            connected: AtomicBool::new(true),
            data,
        }))
    }

    /// The packed data.
    #[must_use]
    pub fn data(&self) -> &CachedRenderData {
        &self.0.data
    }

    /// Marks the data as in use by a frame.
    pub fn begin_using(&self) {
        self.0.usage.fetch_add(1, Ordering::AcqRel);
    }

    /// Ends one use started with [`begin_using`](Self::begin_using).
    ///
    /// # Panics
    ///
    /// Panics if the handle is not in use.
    pub fn end_using(&self) {
        let released = self
            .0
            .usage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |u| u.checked_sub(1))
            .is_ok();
        assert!(
            released,
            "end_using called on a render data handle not in use"
        );
    }

    /// Whether any frame is still drawing this data.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.0.usage.load(Ordering::Acquire) > 0
    }

    /// Detaches the handle from its owner; the data must no longer be drawn.
    pub fn disconnect(&self) {
        self.0.connected.store(false, Ordering::Release);
    }

    /// Whether the owner still vouches for the data.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.connected.load(Ordering::Acquire)
    }

    /// A weak reference that does not keep the data alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakRenderDataHandle {
        WeakRenderDataHandle(Arc::downgrade(&self.0))
    }

    /// Whether both handles refer to the same data.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for RenderDataHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RenderDataHandle {}

impl fmt::Debug for RenderDataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderDataHandle")
            .field("batches", &self.0.data.render_batches.len())
            .field("vertices", &self.0.data.vertices.len())
            .field("usage", &self.0.usage.load(Ordering::Relaxed))
            .field("connected", &self.is_valid())
            .finish()
    }
}

/// A non-owning [`RenderDataHandle`].
#[derive(Clone, Default)]
pub struct WeakRenderDataHandle(alloc::sync::Weak<Inner>);

impl WeakRenderDataHandle {
    /// Upgrades to a strong handle if the data is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<RenderDataHandle> {
        self.0.upgrade().map(RenderDataHandle)
    }
}

impl fmt::Debug for WeakRenderDataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakRenderDataHandle")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_counting() {
        let h = RenderDataHandle::new(CachedRenderData::default());
        assert!(!h.is_in_use());
        h.begin_using();
        h.begin_using();
        h.end_using();
        assert!(h.is_in_use());
        h.end_using();
        assert!(!h.is_in_use());
    }

    #[test]
    fn disconnect_invalidates_all_clones() {
        let h = RenderDataHandle::new(CachedRenderData::default());
        let other = h.clone();
        assert!(other.is_valid());
        h.disconnect();
        assert!(!other.is_valid());
        assert_eq!(h, other);
        assert_ne!(h, RenderDataHandle::new(CachedRenderData::default()));
    }

    #[test]
    fn weak_handle_does_not_keep_data_alive() {
        let h = RenderDataHandle::new(CachedRenderData::default());
        let weak = h.downgrade();
        assert!(weak.upgrade().is_some());
        drop(h);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    #[should_panic(expected = "end_using called on a render data handle not in use")]
    fn unbalanced_end_using_panics() {
        RenderDataHandle::new(CachedRenderData::default()).end_using();
    }
}
