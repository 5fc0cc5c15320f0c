// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch aggregation and vertex/index packing.
//!
//! Recording produces [`DrawElement`](crate::element::DrawElement)s. The
//! [`ElementBatcher`] turns them into [`ElementBatch`]es: one per distinct
//! [`BatchKey`] within a layer, each owning a pooled scratch vertex array and
//! index array from [`BatchData`]. [`BatchData::create_render_batches`] then
//! walks the per-layer [`ElementBatchMap`]s in ascending layer order and emits
//! flat [`RenderBatch`] records with offsets into the packed buffers that
//! [`BatchData::fill_vertex_and_index_buffer`] writes.
//!
//! ```text
//!   DrawElement ──► ElementBatcher ──► ElementBatchMap (per draw layer)
//!                                              │
//!                     BatchData::create_render_batches
//!                                              ▼
//!                  RenderBatch[] + fill_vertex_and_index_buffer
//! ```

mod batcher;
mod data;
mod glyph;
mod line;
mod map;
mod vertex;

pub use batcher::{BatchContext, BatcherStats, ElementBatcher};
pub use data::{BatchData, LayerBatchMaps};
pub use glyph::{AtlasTexture, GlyphAtlas, GlyphEntry};
pub use map::ElementBatchMap;
pub use vertex::{SlateVertex, VertexRounding};

use bitflags::bitflags;
use kurbo::Vec2;

use crate::brush::ResourceId;
use crate::clip::ClippingState;
use crate::element::{CustomDrawerRef, DrawEffects};
use crate::element_list::DrawLayerHandle;
use crate::render_data::RenderDataHandle;

bitflags! {
    /// Pipeline state toggles that split batches.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BatchDrawFlags: u16 {
        /// Disable blending.
        const NO_BLENDING = 1 << 0;
        /// Colors are premultiplied.
        const PRE_MULTIPLIED_ALPHA = 1 << 1;
        /// Skip gamma correction.
        const NO_GAMMA = 1 << 2;
        /// Invert alpha.
        const INVERT_ALPHA = 1 << 3;
        /// Draw as wireframe.
        const WIREFRAME = 1 << 4;
        /// Wrap texture coordinates along U.
        const TILE_U = 1 << 5;
        /// Wrap texture coordinates along V.
        const TILE_V = 1 << 6;
    }
}

impl BatchDrawFlags {
    /// The flags an element's draw effects imply.
    #[must_use]
    pub fn from_effects(effects: DrawEffects) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::NO_BLENDING, effects.contains(DrawEffects::NO_BLENDING));
        flags.set(
            Self::PRE_MULTIPLIED_ALPHA,
            effects.contains(DrawEffects::PRE_MULTIPLIED_ALPHA),
        );
        flags.set(Self::NO_GAMMA, effects.contains(DrawEffects::NO_GAMMA));
        flags.set(Self::INVERT_ALPHA, effects.contains(DrawEffects::INVERT_ALPHA));
        flags
    }
}

/// The shader a batch is drawn with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// Textured or solid quads.
    #[default]
    Default,
    /// 9-slice borders with tiled edges.
    Border,
    /// Alpha-only glyph textures.
    Font,
    /// Antialiased line strips.
    LineSegment,
    /// Caller-provided vertices.
    Custom,
    /// Post-process region.
    PostProcess,
}

/// Primitive topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawPrimitive {
    /// Pairs of indices form lines.
    LineList,
    /// Triples of indices form triangles.
    #[default]
    TriangleList,
}

/// Per-batch pixel shader parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShaderParams {
    /// First parameter vector.
    pub pixel_params: [f32; 4],
    /// Second parameter vector.
    pub pixel_params2: [f32; 4],
}

impl ShaderParams {
    /// Parameters with only the first vector set.
    #[must_use]
    pub const fn new(pixel_params: [f32; 4]) -> Self {
        Self {
            pixel_params,
            pixel_params2: [0.0; 4],
        }
    }

    /// Parameters with both vectors set.
    #[must_use]
    pub const fn with_second(pixel_params: [f32; 4], pixel_params2: [f32; 4]) -> Self {
        Self {
            pixel_params,
            pixel_params2,
        }
    }
}

/// Instanced drawing parameters for custom vertex batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceData {
    /// Host-owned instance buffer.
    pub buffer: ResourceId,
    /// First instance to draw.
    pub offset: u32,
    /// Number of instances.
    pub count: u32,
}

/// Everything that must match for two elements to share a draw call.
///
/// Equality is structural; custom drawers, render data handles and draw
/// layer handles compare by identity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchKey {
    /// Bound texture.
    pub texture: Option<ResourceId>,
    /// Shader parameters.
    pub shader_params: ShaderParams,
    /// Shader.
    pub shader_type: ShaderType,
    /// Topology.
    pub primitive: DrawPrimitive,
    /// Draw effects.
    pub effects: DrawEffects,
    /// Pipeline flags.
    pub flags: BatchDrawFlags,
    /// Clip state index.
    pub clipping_index: Option<u32>,
    /// Instancing.
    pub instance: Option<InstanceData>,
    /// Scene index.
    pub scene_index: i8,
    /// Custom drawer.
    pub custom_drawer: Option<CustomDrawerRef>,
    /// Cached render data and the offset it is drawn at.
    pub cached_buffer: Option<(RenderDataHandle, Vec2)>,
    /// Logical draw layer inlined at this position.
    pub layer: Option<DrawLayerHandle>,
}

impl BatchKey {
    /// Whether batches with this key never accept further elements.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.custom_drawer.is_some()
            || self.cached_buffer.is_some()
            || self.layer.is_some()
            || self.shader_type == ShaderType::PostProcess
            || self.shader_type == ShaderType::Custom
    }
}

/// Elements of one layer that share a [`BatchKey`], plus their scratch
/// geometry.
#[derive(Clone, Debug)]
pub struct ElementBatch {
    pub(crate) key: BatchKey,
    pub(crate) vertex_array: Option<u32>,
    pub(crate) index_array: Option<u32>,
    pub(crate) num_elements: u32,
}

impl ElementBatch {
    /// A batch without geometry arrays.
    #[must_use]
    pub fn new(key: BatchKey) -> Self {
        Self {
            key,
            vertex_array: None,
            index_array: None,
            num_elements: 0,
        }
    }

    /// The batch key.
    #[must_use]
    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    /// Number of elements merged into this batch.
    #[must_use]
    pub fn num_elements_in_batch(&self) -> u32 {
        self.num_elements
    }

    /// Pool index of the scratch vertex array, if assigned.
    #[must_use]
    pub fn vertex_array_index(&self) -> Option<u32> {
        self.vertex_array
    }

    /// Pool index of the scratch index array, if assigned.
    #[must_use]
    pub fn index_array_index(&self) -> Option<u32> {
        self.index_array
    }
}

/// One draw call in final submission order.
#[derive(Clone, Debug)]
pub struct RenderBatch {
    /// Layer id the batch was recorded at.
    pub layer: u32,
    /// Shader parameters.
    pub shader_params: ShaderParams,
    /// Bound texture.
    pub texture: Option<ResourceId>,
    /// Instancing.
    pub instance: Option<InstanceData>,
    /// Custom drawer to invoke instead of drawing geometry.
    pub custom_drawer: Option<CustomDrawerRef>,
    /// The logical draw layer this batch was inlined from.
    pub layer_handle: Option<DrawLayerHandle>,
    /// Cached render data to draw instead of packed geometry.
    pub cached_render_data: Option<RenderDataHandle>,
    /// Translation applied to cached render data.
    pub dynamic_offset: Vec2,
    /// Pipeline flags.
    pub flags: BatchDrawFlags,
    /// Shader.
    pub shader_type: ShaderType,
    /// Topology.
    pub primitive: DrawPrimitive,
    /// Draw effects.
    pub effects: DrawEffects,
    /// Clip state index.
    pub clipping_index: Option<u32>,
    /// Snapshot of the clip state at `clipping_index`.
    pub clip_state: Option<ClippingState>,
    /// Pool index of the source vertex array.
    pub vertex_array_index: Option<u32>,
    /// Pool index of the source index array.
    pub index_array_index: Option<u32>,
    /// First vertex in the packed vertex buffer.
    pub vertex_offset: u32,
    /// First index in the packed index buffer.
    pub index_offset: u32,
    /// Number of vertices.
    pub num_vertices: u32,
    /// Number of indices.
    pub num_indices: u32,
    /// Number of elements merged into the batch.
    pub num_elements: u32,
    /// Scene index.
    pub scene_index: i8,
}

impl RenderBatch {
    /// Whether the batch draws packed geometry (as opposed to a custom drawer,
    /// cached render data or a post-process pass).
    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.num_indices > 0
    }
}
