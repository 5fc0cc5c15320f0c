// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pooled scratch geometry and the final render batch list.

use alloc::vec::Vec;

use super::{ElementBatch, ElementBatchMap, RenderBatch, SlateVertex};
use crate::clip::{ClippingMethod, ClippingState};
use crate::element_list::DrawLayerHandle;

/// Resolves logical draw layer handles to their batch maps.
pub trait LayerBatchMaps {
    /// The batch map of the layer behind `handle`, if it exists.
    fn batch_map(&self, handle: &DrawLayerHandle) -> Option<&ElementBatchMap>;
}

/// Owns the scratch vertex and index arrays of every element batch, and the
/// render batches built from them.
///
/// Scratch arrays are pooled: [`reset_data`](Self::reset_data) empties them
/// and puts them back on a free list without releasing their allocations.
#[derive(Clone, Debug, Default)]
pub struct BatchData {
    vertex_arrays: Vec<Vec<SlateVertex>>,
    index_arrays: Vec<Vec<u32>>,
    free_vertex_arrays: Vec<u32>,
    free_index_arrays: Vec<u32>,
    render_batches: Vec<RenderBatch>,
    num_batched_vertices: u32,
    num_batched_indices: u32,
    num_layers: u32,
    stencil_required: bool,
}

impl BatchData {
    /// Creates empty batch data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `batch` a scratch vertex array and index array from the pools,
    /// unless it already has them. Returns their pool indices.
    pub fn assign_arrays(&mut self, batch: &mut ElementBatch) -> (u32, u32) {
        let v = *batch
            .vertex_array
            .get_or_insert_with(|| pop_or_grow(&mut self.free_vertex_arrays, &mut self.vertex_arrays));
        let i = *batch
            .index_array
            .get_or_insert_with(|| pop_or_grow(&mut self.free_index_arrays, &mut self.index_arrays));
        (v, i)
    }

    /// The scratch arrays of a batch.
    ///
    /// # Panics
    ///
    /// Panics if the batch has no arrays assigned.
    pub fn arrays_mut(&mut self, batch: &ElementBatch) -> (&mut Vec<SlateVertex>, &mut Vec<u32>) {
        let (Some(v), Some(i)) = (batch.vertex_array, batch.index_array) else {
            panic!("batch has no scratch arrays assigned");
        };
        self.arrays_at(v, i)
    }

    pub(crate) fn arrays_at(
        &mut self,
        vertex_array: u32,
        index_array: u32,
    ) -> (&mut Vec<SlateVertex>, &mut Vec<u32>) {
        (
            &mut self.vertex_arrays[vertex_array as usize],
            &mut self.index_arrays[index_array as usize],
        )
    }

    /// The scratch vertices a render batch was built from.
    #[must_use]
    pub fn batch_vertices(&self, batch: &RenderBatch) -> &[SlateVertex] {
        batch
            .vertex_array_index
            .map_or(&[][..], |v| self.vertex_arrays[v as usize].as_slice())
    }

    /// The scratch indices a render batch was built from, relative to its
    /// first vertex.
    #[must_use]
    pub fn batch_indices(&self, batch: &RenderBatch) -> &[u32] {
        batch
            .index_array_index
            .map_or(&[][..], |i| self.index_arrays[i as usize].as_slice())
    }

    /// Records whether any of `clip_states` needs the stencil buffer.
    pub fn determine_is_stencil_clipping_required(&mut self, clip_states: &[ClippingState]) {
        self.stencil_required = clip_states
            .iter()
            .any(|s| s.method() == ClippingMethod::Stencil);
    }

    /// Whether the batched content needs stencil clipping.
    #[must_use]
    pub fn is_stencil_clipping_required(&self) -> bool {
        self.stencil_required
    }

    /// Flattens `root` into render batches in ascending layer order.
    ///
    /// Within a layer, batches keep discovery order. A batch referencing a
    /// logical draw layer is replaced by that layer's batches, recursively.
    /// Batches without geometry are dropped unless they stand for a custom
    /// drawer, cached render data or a post-process pass.
    pub fn create_render_batches(
        &mut self,
        root: &ElementBatchMap,
        layers: &dyn LayerBatchMaps,
        clip_states: &[ClippingState],
    ) {
        self.render_batches.clear();
        self.num_batched_vertices = 0;
        self.num_batched_indices = 0;
        self.num_layers = 0;
        self.determine_is_stencil_clipping_required(clip_states);

        let mut stack = Vec::new();
        self.merge(root, layers, clip_states, &mut stack);
    }

    fn merge(
        &mut self,
        map: &ElementBatchMap,
        layers: &dyn LayerBatchMaps,
        clip_states: &[ClippingState],
        stack: &mut Vec<DrawLayerHandle>,
    ) {
        map.for_each_layer(|layer, batches| {
            self.num_layers += 1;
            for batch in batches {
                if let Some(handle) = &batch.key.layer {
                    // A layer that (indirectly) contains itself is drawn once.
                    if stack.contains(handle) {
                        continue;
                    }
                    if let Some(inner) = layers.batch_map(handle) {
                        stack.push(handle.clone());
                        self.merge(inner, layers, clip_states, stack);
                        stack.pop();
                    }
                    continue;
                }
                self.add_render_batch(layer, batch, clip_states, stack.last());
            }
        });
    }

    fn add_render_batch(
        &mut self,
        layer: u32,
        batch: &ElementBatch,
        clip_states: &[ClippingState],
        layer_handle: Option<&DrawLayerHandle>,
    ) {
        let num_vertices = batch
            .vertex_array
            .map_or(0, |v| self.vertex_arrays[v as usize].len());
        let num_indices = batch
            .index_array
            .map_or(0, |i| self.index_arrays[i as usize].len());
        let key = &batch.key;
        let geometryless = key.custom_drawer.is_some()
            || key.cached_buffer.is_some()
            || key.shader_type == super::ShaderType::PostProcess;
        if !geometryless && (num_vertices == 0 || num_indices == 0) {
            return;
        }
        let num_vertices = count(num_vertices);
        let num_indices = count(num_indices);
        self.render_batches.push(RenderBatch {
            layer,
            shader_params: key.shader_params,
            texture: key.texture,
            instance: key.instance,
            custom_drawer: key.custom_drawer.clone(),
            layer_handle: layer_handle.cloned(),
            cached_render_data: key.cached_buffer.as_ref().map(|(h, _)| h.clone()),
            dynamic_offset: key
                .cached_buffer
                .as_ref()
                .map_or(kurbo::Vec2::ZERO, |(_, offset)| *offset),
            flags: key.flags,
            shader_type: key.shader_type,
            primitive: key.primitive,
            effects: key.effects,
            clipping_index: key.clipping_index,
            clip_state: key
                .clipping_index
                .and_then(|i| clip_states.get(i as usize))
                .cloned(),
            vertex_array_index: batch.vertex_array,
            index_array_index: batch.index_array,
            vertex_offset: self.num_batched_vertices,
            index_offset: self.num_batched_indices,
            num_vertices,
            num_indices,
            num_elements: batch.num_elements,
            scene_index: key.scene_index,
        });
        self.num_batched_vertices += num_vertices;
        self.num_batched_indices += num_indices;
    }

    /// Render batches in submission order.
    #[must_use]
    pub fn render_batches(&self) -> &[RenderBatch] {
        &self.render_batches
    }

    /// Total vertices across all render batches.
    #[must_use]
    pub fn num_batched_vertices(&self) -> u32 {
        self.num_batched_vertices
    }

    /// Total indices across all render batches.
    #[must_use]
    pub fn num_batched_indices(&self) -> u32 {
        self.num_batched_indices
    }

    /// Number of layers visited, including inlined logical layers.
    #[must_use]
    pub fn num_layers(&self) -> u32 {
        self.num_layers
    }

    /// Copies every batch's scratch geometry into the packed buffers.
    ///
    /// With `absolute_indices` each index has its batch's vertex offset added,
    /// for backends without a base-vertex draw parameter.
    ///
    /// # Panics
    ///
    /// Panics if either buffer is smaller than the batched totals.
    pub fn fill_vertex_and_index_buffer(
        &self,
        vertices: &mut [SlateVertex],
        indices: &mut [u32],
        absolute_indices: bool,
    ) {
        assert!(
            vertices.len() >= self.num_batched_vertices as usize,
            "vertex buffer too small for batched vertices"
        );
        assert!(
            indices.len() >= self.num_batched_indices as usize,
            "index buffer too small for batched indices"
        );
        for batch in &self.render_batches {
            if batch.num_vertices == 0 {
                continue;
            }
            let v0 = batch.vertex_offset as usize;
            let i0 = batch.index_offset as usize;
            let src_v = self.batch_vertices(batch);
            let src_i = self.batch_indices(batch);
            vertices[v0..v0 + src_v.len()].copy_from_slice(src_v);
            let dst = &mut indices[i0..i0 + src_i.len()];
            if absolute_indices {
                for (d, s) in dst.iter_mut().zip(src_i) {
                    *d = s + batch.vertex_offset;
                }
            } else {
                dst.copy_from_slice(src_i);
            }
        }
    }

    /// Packs into freshly allocated buffers.
    #[must_use]
    pub fn pack(&self, absolute_indices: bool) -> (Vec<SlateVertex>, Vec<u32>) {
        let mut vertices = alloc::vec![SlateVertex::default(); self.num_batched_vertices as usize];
        let mut indices = alloc::vec![0; self.num_batched_indices as usize];
        self.fill_vertex_and_index_buffer(&mut vertices, &mut indices, absolute_indices);
        (vertices, indices)
    }

    /// Returns every scratch array to its pool and drops the render batches.
    pub fn reset_data(&mut self) {
        self.render_batches.clear();
        self.num_batched_vertices = 0;
        self.num_batched_indices = 0;
        self.num_layers = 0;
        self.stencil_required = false;
        for v in &mut self.vertex_arrays {
            v.clear();
        }
        for i in &mut self.index_arrays {
            i.clear();
        }
        self.free_vertex_arrays.clear();
        self.free_vertex_arrays
            .extend((0..self.vertex_arrays.len()).rev().map(count));
        self.free_index_arrays.clear();
        self.free_index_arrays
            .extend((0..self.index_arrays.len()).rev().map(count));
    }

    /// Number of scratch vertex arrays ever allocated.
    #[must_use]
    pub fn vertex_pool_size(&self) -> usize {
        self.vertex_arrays.len()
    }
}

fn pop_or_grow<T>(free: &mut Vec<u32>, pool: &mut Vec<Vec<T>>) -> u32 {
    if let Some(idx) = free.pop() {
        return idx;
    }
    pool.push(Vec::new());
    count(pool.len() - 1)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "buffer sizes are bounded by the u32 index format"
)]
#[inline]
fn count(n: usize) -> u32 {
    n as u32
}
