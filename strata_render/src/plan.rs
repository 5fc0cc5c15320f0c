// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: the ordered draw commands and upload buffers for one frame.

use alloc::vec::Vec;

use kurbo::{Rect, Vec2};
use strata_core::batch::{
    BatchData, BatchDrawFlags, DrawPrimitive, InstanceData, RenderBatch, ShaderParams,
    ShaderType, SlateVertex,
};
use strata_core::brush::ResourceId;
use strata_core::clip::{ClippingMethod, ClippingState};
use strata_core::element::{CustomDrawerRef, DrawEffects};
use strata_core::render_data::RenderDataHandle;

/// What a backend can do, as far as plan building is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackendCaps {
    /// Whether the backend has a stencil buffer. Without one, stencil clips
    /// degrade to the scissor of their bounding box.
    pub stencil: bool,
    /// Whether draw calls take a base vertex. Without it, packed indices are
    /// made absolute.
    pub base_vertex: bool,
}

impl Default for BackendCaps {
    fn default() -> Self {
        Self {
            stencil: true,
            base_vertex: true,
        }
    }
}

/// How a draw command is clipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ClipMode {
    /// Not clipped.
    #[default]
    None,
    /// A window-space scissor rectangle.
    Scissor(Rect),
    /// Quads to intersect in the stencil buffer.
    Stencil(ClippingState),
}

impl ClipMode {
    fn resolve(state: Option<&ClippingState>, caps: BackendCaps) -> Self {
        let Some(state) = state else {
            return Self::None;
        };
        match state.method() {
            ClippingMethod::Scissor => Self::Scissor(state.bounding_rect()),
            ClippingMethod::Stencil if caps.stencil => Self::Stencil(state.clone()),
            ClippingMethod::Stencil => Self::Scissor(state.bounding_rect()),
        }
    }
}

/// Where a draw command's geometry comes from.
#[derive(Clone, Debug)]
pub enum DrawSource {
    /// A range of the plan's own buffers.
    Packed {
        /// First vertex.
        vertex_offset: u32,
        /// First index.
        index_offset: u32,
        /// Number of indices.
        num_indices: u32,
    },
    /// A range of cached render data, drawn translated by the command's
    /// `dynamic_offset`.
    Cached {
        /// The cached data.
        handle: RenderDataHandle,
        /// First vertex in the cached buffer.
        vertex_offset: u32,
        /// First index in the cached buffer.
        index_offset: u32,
        /// Number of indices.
        num_indices: u32,
    },
    /// A custom drawer.
    Custom(CustomDrawerRef),
    /// A post-process pass; the region is in the shader parameters.
    PostProcess,
}

/// One draw call.
#[derive(Clone, Debug)]
pub struct DrawCommand {
    /// Layer id the batch was recorded at.
    pub layer: u32,
    /// Geometry source.
    pub source: DrawSource,
    /// Shader.
    pub shader_type: ShaderType,
    /// Shader parameters.
    pub shader_params: ShaderParams,
    /// Topology.
    pub primitive: DrawPrimitive,
    /// Bound texture.
    pub texture: Option<ResourceId>,
    /// Pipeline flags.
    pub flags: BatchDrawFlags,
    /// Draw effects.
    pub effects: DrawEffects,
    /// Instancing.
    pub instance: Option<InstanceData>,
    /// Resolved clip.
    pub clip: ClipMode,
    /// The recorded clip state, as handed to custom drawers.
    pub clip_state: Option<ClippingState>,
    /// Translation applied in the vertex shader.
    pub dynamic_offset: Vec2,
    /// Scene index.
    pub scene_index: i8,
}

/// Draw commands and upload buffers for one frame.
#[derive(Clone, Debug, Default)]
pub struct RenderPlan {
    caps: BackendCaps,
    commands: Vec<DrawCommand>,
    vertices: Vec<SlateVertex>,
    indices: Vec<u32>,
    cached: Vec<RenderDataHandle>,
    stencil_required: bool,
    skipped: u32,
}

impl RenderPlan {
    /// Creates an empty plan for a backend with the given capabilities.
    #[must_use]
    pub fn new(caps: BackendCaps) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    /// Backend capabilities the plan was built for.
    #[must_use]
    pub fn caps(&self) -> BackendCaps {
        self.caps
    }

    /// Rebuilds the plan from batched data.
    ///
    /// Batches drawing cached render data are expanded into one command per
    /// cached batch. Cached clip states are translated by the dynamic offset
    /// and nested in the clip of the drawing batch. Disconnected render data and dropped custom drawers are
    /// skipped.
    pub fn build(&mut self, data: &BatchData) {
        self.clear();
        let (vertices, indices) = data.pack(!self.caps.base_vertex);
        self.vertices = vertices;
        self.indices = indices;
        self.stencil_required = data.is_stencil_clipping_required() && self.caps.stencil;

        for batch in data.render_batches() {
            if let Some(handle) = &batch.cached_render_data {
                self.push_cached(handle, batch.dynamic_offset, batch.clip_state.as_ref());
                continue;
            }
            let source = if let Some(drawer) = &batch.custom_drawer {
                if drawer.upgrade().is_none() {
                    self.skipped += 1;
                    continue;
                }
                DrawSource::Custom(drawer.clone())
            } else if batch.shader_type == ShaderType::PostProcess {
                DrawSource::PostProcess
            } else {
                DrawSource::Packed {
                    vertex_offset: batch.vertex_offset,
                    index_offset: batch.index_offset,
                    num_indices: batch.num_indices,
                }
            };
            let command = self.command(batch, source, batch.clip_state.clone(), Vec2::ZERO);
            self.commands.push(command);
        }
    }

    fn push_cached(
        &mut self,
        handle: &RenderDataHandle,
        offset: Vec2,
        outer: Option<&ClippingState>,
    ) {
        if !handle.is_valid() {
            self.skipped += 1;
            return;
        }
        if !self.cached.iter().any(|h| h.ptr_eq(handle)) {
            self.cached.push(handle.clone());
        }
        let cached = handle.data();
        self.stencil_required |= cached.stencil_required && self.caps.stencil;
        for batch in &cached.render_batches {
            let clip_state = batch
                .clipping_index
                .and_then(|i| cached.clip_states.get(i as usize))
                .map(|state| {
                    let mut state = state.clone();
                    state.offset(offset);
                    match outer {
                        Some(outer) => state.nested_in(outer),
                        None => state,
                    }
                })
                .or_else(|| outer.cloned());
            let source = DrawSource::Cached {
                handle: handle.clone(),
                vertex_offset: batch.vertex_offset,
                index_offset: batch.index_offset,
                num_indices: batch.num_indices,
            };
            let command = self.command(batch, source, clip_state, offset);
            self.commands.push(command);
        }
    }

    fn command(
        &self,
        batch: &RenderBatch,
        source: DrawSource,
        clip_state: Option<ClippingState>,
        dynamic_offset: Vec2,
    ) -> DrawCommand {
        DrawCommand {
            layer: batch.layer,
            source,
            shader_type: batch.shader_type,
            shader_params: batch.shader_params,
            primitive: batch.primitive,
            texture: batch.texture,
            flags: batch.flags,
            effects: batch.effects,
            instance: batch.instance,
            clip: ClipMode::resolve(clip_state.as_ref(), self.caps),
            clip_state,
            dynamic_offset,
            scene_index: batch.scene_index,
        }
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.vertices.clear();
        self.indices.clear();
        self.cached.clear();
        self.stencil_required = false;
        self.skipped = 0;
    }

    /// Draw commands in submission order.
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Packed vertices.
    #[must_use]
    pub fn vertices(&self) -> &[SlateVertex] {
        &self.vertices
    }

    /// Packed indices.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Packed vertices as bytes, ready for upload.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Packed indices as bytes, ready for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Distinct cached render data referenced by the commands.
    #[must_use]
    pub fn cached_buffers(&self) -> &[RenderDataHandle] {
        &self.cached
    }

    /// Whether the backend must clear and use the stencil buffer.
    #[must_use]
    pub fn is_stencil_required(&self) -> bool {
        self.stencil_required
    }

    /// Batches dropped because their render data or drawer went away.
    #[must_use]
    pub fn num_skipped(&self) -> u32 {
        self.skipped
    }
}

/// The vertex bytes of cached render data.
#[must_use]
pub fn cached_vertex_bytes(handle: &RenderDataHandle) -> &[u8] {
    bytemuck::cast_slice(&handle.data().vertices)
}

/// The index bytes of cached render data.
#[must_use]
pub fn cached_index_bytes(handle: &RenderDataHandle) -> &[u8] {
    bytemuck::cast_slice(&handle.data().indices)
}
