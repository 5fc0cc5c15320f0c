// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw-element recording, render batching and invalidation caching for
//! retained-mode UI.
//!
//! `strata_core` turns what widgets paint into GPU-ready vertex and index
//! buffers, and keeps unchanged parts of a window from being painted again.
//! It is `no_std` compatible (with `alloc`).
//!
//! # Architecture
//!
//! A frame flows from widgets to render batches:
//!
//! ```text
//!   FastPathTree::process_updates() ──► widgets to repaint
//!                                            │
//!                 ┌──────────────────────────┘
//!                 ▼
//!   Paintable::paint() ──► DrawElement ──► WindowElementList
//!         ▲                                      │
//!         │ InvalidationPanel replays            ▼
//!         └──────── cached lists        ElementBatcher::add_elements()
//!                                                │
//!                                                ▼
//!                                  BatchData ──► render backend
//! ```
//!
//! **[`element`]**: [`DrawElement`](element::DrawElement), the unit of
//! recorded drawing, with one constructor per primitive kind.
//!
//! **[`element_list`]**: [`WindowElementList`](element_list::WindowElementList)
//! collects elements per window with a clip stack, logical draw layers,
//! deferred and volatile painting.
//!
//! **[`clip`]**: Axis-aligned and rotated clipping zones, and the
//! [`ClippingManager`](clip::ClippingManager) stack that deduplicates states.
//!
//! **[`batch`]**: [`ElementBatcher`](batch::ElementBatcher) merges compatible
//! elements per layer into [`RenderBatch`](batch::RenderBatch)es and
//! tessellates them into [`BatchData`](batch::BatchData).
//!
//! **[`widget`]**: The [`Paintable`](widget::Paintable) trait, the
//! [`WidgetArena`](widget::WidgetArena) holding widgets behind generational
//! ids and the [`PaintContext`](widget::PaintContext) threaded through a paint.
//!
//! **[`invalidation`]**: [`InvalidationPanel`](invalidation::InvalidationPanel)
//! records a subtree once and replays it while its geometry and clip hold.
//!
//! **[`render_data`]**: Shared, pre-batched render data with use counting.
//!
//! **[`fast_path`]**: Per-widget update flags, invalidation reasons and the
//! ordered update pass. **[`dirty`]** names its propagation channels.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-batch and
//!   per-proxy events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod batch;
pub mod brush;
pub mod clip;
pub mod color;
pub mod config;
pub mod dirty;
pub mod element;
pub mod element_list;
pub mod fast_path;
pub mod geometry;
pub mod invalidation;
pub mod render_data;
pub mod trace;
pub mod widget;
