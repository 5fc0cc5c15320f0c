// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants for the fast-path tree.
//!
//! [`FastPathTree`](crate::fast_path::FastPathTree) uses multi-channel dirty
//! tracking (via [`understory_dirty`]) to spread invalidations through the
//! proxy tree before an update pass. Each channel represents an independent
//! category of change.
//!
//! # Propagation semantics
//!
//! - **Upward**: [`LAYOUT`] has dependency edges from parent to child and is
//!   marked with [`EagerPolicy`](understory_dirty::EagerPolicy). A child's
//!   size change marks every ancestor, because their layout depends on the
//!   desired sizes below them.
//!
//! - **Downward**: [`VISIBILITY`] has dependency edges from child to parent
//!   and is marked eagerly. Hiding a widget marks its whole subtree, whose
//!   inherited hidden state must be recomputed.
//!
//! # Consumption
//!
//! [`FastPathTree::process_updates`](crate::fast_path::FastPathTree::process_updates)
//! drains every channel at the start of a pass and queues the affected proxies.

use understory_dirty::Channel;

/// Desired size changed; propagates to ancestors.
pub const LAYOUT: Channel = Channel::new(0);

/// Own or inherited visibility changed; propagates to descendants.
pub const VISIBILITY: Channel = Channel::new(1);
