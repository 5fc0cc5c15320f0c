// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime configuration shared by the batcher and invalidation panels.
//!
//! There are no process-wide switches: a [`StrataConfig`] is constructed by
//! the host and passed by reference to whatever needs it.

/// Tunables for batching and invalidation caching.
///
/// All fields are public; construct with [`Default`] and override what you
/// need.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrataConfig {
    /// Whether invalidation panels may cache at all.
    ///
    /// Disabling caching produces identical output, only slower.
    pub caching_enabled: bool,
    /// Compare fingerprints in relative mode: only scale, the linear part of
    /// the render transform, and the visible (culled) size must match.
    /// Translation changes are replayed with a dynamic offset.
    pub cache_relative_transforms: bool,
    /// Pack recorded lists into a [`RenderDataHandle`](crate::render_data::RenderDataHandle)
    /// instead of merging draw elements on replay.
    pub cache_render_data: bool,
    /// Only compare clip-state count and current clip index (not the clip
    /// state itself) when validating a cache.
    pub relaxed_clip_validation: bool,
    /// How far above its recorded layer id a cache may be painted before it
    /// must be re-recorded.
    pub layer_id_padding: u32,
    /// Absolute tolerance for float comparisons in cache fingerprints.
    pub geometry_tolerance: f64,
    /// Numerator of the half-texel offset applied to texture coordinates.
    pub pixel_center_offset: f32,
    /// Emit a one-pixel transparent skirt around boxes that are not pixel
    /// snapped.
    pub feathering: bool,
    /// Pack vertex colors with the sRGB transfer function.
    pub srgb_vertex_color: bool,
}

impl StrataConfig {
    /// Default padding added to the layer id a cache was recorded at.
    pub const DEFAULT_LAYER_ID_PADDING: u32 = 10;
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            cache_relative_transforms: false,
            cache_render_data: false,
            relaxed_clip_validation: false,
            layer_id_padding: Self::DEFAULT_LAYER_ID_PADDING,
            geometry_tolerance: 1e-4,
            pixel_center_offset: 0.0,
            feathering: false,
            srgb_vertex_color: true,
        }
    }
}
