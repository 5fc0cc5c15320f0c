// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Partial-repaint bookkeeping ("fast path").
//!
//! A [`FastPathTree`] flattens a widget hierarchy into [`WidgetProxy`]s
//! indexed in pre-order. Invalidating a proxy records an
//! [`InvalidateReason`], derives the [`UpdateFlags`] it implies and queues
//! the proxy on a [`WidgetUpdateList`]. An update pass then visits queued
//! proxies in tree order, so parents come before their descendants and a
//! parent's repaint absorbs repaint requests from inside its subtree.

mod tree;
mod update_list;

pub use tree::{FastPathTree, UpdateOutcome, WidgetProxyHandle};
pub use update_list::WidgetUpdateList;

use bitflags::bitflags;

use crate::widget::WidgetId;

bitflags! {
    /// What a proxy needs from the next update pass.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u8 {
        /// Tick every frame.
        const TICK = 1 << 0;
        /// A registered timer is pending.
        const ACTIVE_TIMER = 1 << 1;
        /// Repaint on the next pass.
        const REPAINT = 1 << 2;
        /// Repaint every frame (volatile widget).
        const VOLATILE_PAINT = 1 << 3;
    }
}

impl UpdateFlags {
    /// Flags that keep a proxy queued across passes.
    pub const PERSISTENT: Self = Self::TICK
        .union(Self::ACTIVE_TIMER)
        .union(Self::VOLATILE_PAINT);

    /// The update a given invalidation requires.
    #[must_use]
    pub fn from_reason(reason: InvalidateReason) -> Self {
        if reason.is_empty() {
            Self::empty()
        } else {
            Self::REPAINT
        }
    }
}

bitflags! {
    /// Why a proxy was invalidated.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InvalidateReason: u8 {
        /// Desired size changed; propagates to ancestors.
        const LAYOUT = 1 << 0;
        /// Appearance changed.
        const PAINT = 1 << 1;
        /// The widget became (non-)volatile.
        const VOLATILITY = 1 << 2;
        /// Children were added, removed or reordered.
        const CHILD_ORDER = 1 << 3;
        /// Render transform changed.
        const RENDER_TRANSFORM = 1 << 4;
        /// Visibility changed; propagates to descendants.
        const VISIBILITY = 1 << 5;
    }
}

/// Visibility of a widget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Painted.
    #[default]
    Visible,
    /// Not painted, but keeps its layout space.
    Hidden,
    /// Not painted and takes no layout space.
    Collapsed,
}

impl Visibility {
    /// Whether the widget paints.
    #[must_use]
    pub fn is_visible(self) -> bool {
        self == Self::Visible
    }
}

/// Per-widget update state, stored in tree order.
#[derive(Clone, Copy, Debug)]
pub struct WidgetProxy {
    /// The widget.
    pub widget: WidgetId,
    /// Pre-order index.
    pub index: u32,
    /// Index of the parent, or `None` for the root.
    pub parent_index: Option<u32>,
    /// Number of direct children.
    pub child_count: u32,
    /// Index of the last descendant in pre-order (the proxy's own index for
    /// a leaf). The subtree is `index..=leaf_most_child_index`.
    pub leaf_most_child_index: u32,
    /// Pending updates.
    pub update_flags: UpdateFlags,
    /// Invalidations accumulated since the last update pass.
    pub invalidate_reason: InvalidateReason,
    /// Own visibility.
    pub visibility: Visibility,
    /// Whether the proxy was visited by the current pass.
    pub updated_this_frame: bool,
    /// Whether the proxy is queued.
    pub in_update_list: bool,
    /// Whether an ancestor is not visible.
    pub inherited_hidden: bool,
    /// Whether the children changed since the tree was built.
    pub child_order_invalid: bool,
}

impl WidgetProxy {
    /// Whether the widget paints, taking ancestors into account.
    #[must_use]
    pub fn is_effectively_visible(&self) -> bool {
        self.visibility.is_visible() && !self.inherited_hidden
    }

    /// Whether `index` lies in this proxy's subtree (itself included).
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        (self.index..=self.leaf_most_child_index).contains(&index)
    }
}
