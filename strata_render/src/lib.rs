// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend-neutral draw plans for [`strata_core`] render batches.
//!
//! This crate sits between batching and the GPU. It defines:
//!
//! - [`RenderPlan`]: draw commands and byte-level upload buffers for one
//!   frame, built from [`BatchData`](strata_core::batch::BatchData)
//! - [`DrawCommand`]: one draw call, with its geometry [`DrawSource`] and
//!   resolved [`ClipMode`]
//! - [`BackendCaps`]: what the backend supports (stencil, base vertex)
//! - [`RenderBackend`] and [`submit`]: the contract backends implement and
//!   the loop that drives it

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod backend;
mod plan;

pub use backend::{RenderBackend, submit};
pub use plan::{
    BackendCaps, ClipMode, DrawCommand, DrawSource, RenderPlan, cached_index_bytes,
    cached_vertex_bytes,
};
