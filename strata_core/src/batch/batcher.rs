// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tessellation of draw elements into element batches.
//!
//! Each element kind has its own tessellation routine. Batchable kinds look
//! up (or create) the batch matching their [`BatchKey`] in the element's
//! layer and append vertices and indices to that batch's scratch arrays.
//! Indices are relative to the start of the batch's vertex array. Custom
//! drawers, custom vertices, cached buffers, layer references and
//! post-process passes always get a batch of their own.

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Point, Size, Vec2};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use super::line::{self, LineBuilder, vertex_count};
use super::vertex::narrow;
use super::{
    BatchData, BatchDrawFlags, BatchKey, DrawPrimitive, ElementBatch, ElementBatchMap,
    GlyphAtlas, ShaderParams, ShaderType, SlateVertex, VertexRounding,
};
use crate::brush::{BrushDrawType, MirrorType, ResourceId};
use crate::color::{LinearColor, PackedColor};
use crate::config::StrataConfig;
use crate::element::{
    BoxPayload, CustomDrawerRef, CustomVertsPayload, DrawElement, ElementKind, GradientPayload,
    GradientStop, LinesPayload, Orientation, PostProcessPayload, SplinePayload, TextPayload,
    ViewportInfo,
};
use crate::element_list::WindowElementList;

/// Miter intersections may overshoot a segment by this fraction.
const MITER_TOLERANCE: f64 = 0.1;

/// Vertex grid of a 9-slice box, row by row from the top edge:
///
/// ```text
///  0--2------4--6
///  |  |      |  |
///  1--3------5--7
///  |  |      |  |
///  8--9-----10-11
///  |  |      |  |
/// 12-13-----14-15
/// ```
const NINE_SLICE_INDICES: [u32; 54] = [
    0, 1, 2, 2, 1, 3, //
    2, 3, 4, 4, 3, 5, //
    4, 5, 6, 6, 5, 7, //
    1, 8, 3, 3, 8, 9, //
    3, 9, 5, 5, 9, 10, //
    5, 10, 7, 7, 10, 11, //
    8, 12, 9, 9, 12, 13, //
    9, 13, 10, 10, 13, 14, //
    10, 14, 11, 11, 14, 15,
];

/// Feather quads around a 9-slice grid, as `(tl, tr, br, bl)`. Indices from
/// 16 up are the skirt vertices.
const NINE_SLICE_FEATHER_QUADS: [[u32; 4]; 12] = [
    [16, 17, 2, 0],
    [17, 18, 4, 2],
    [18, 19, 6, 4],
    [16, 0, 1, 20],
    [20, 1, 8, 21],
    [21, 8, 12, 24],
    [6, 19, 22, 7],
    [7, 22, 23, 11],
    [11, 23, 27, 15],
    [12, 13, 25, 24],
    [13, 14, 26, 25],
    [14, 15, 27, 26],
];

/// Skirt triangles around a plain quad (`0..4`) with skirt vertices `4..8`.
const QUAD_FEATHER_INDICES: [u32; 24] = [
    4, 5, 1, 4, 1, 0, //
    4, 2, 6, 4, 0, 2, //
    1, 5, 7, 1, 7, 3, //
    2, 3, 7, 7, 6, 2,
];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// What the batcher needs besides the elements themselves.
#[derive(Clone, Copy)]
pub struct BatchContext<'a> {
    /// Runtime configuration.
    pub config: &'a StrataConfig,
    /// Glyph source for text elements. Text is skipped without one.
    pub atlas: Option<&'a dyn GlyphAtlas>,
    /// Size of the render target, for post-process regions.
    pub viewport_size: Size,
    /// Version of the host's resource set; batch maps built against another
    /// version are discarded.
    pub resource_version: u32,
}

impl<'a> BatchContext<'a> {
    /// A context without glyph atlas.
    #[must_use]
    pub fn new(config: &'a StrataConfig, viewport_size: Size) -> Self {
        Self {
            config,
            atlas: None,
            viewport_size,
            resource_version: 0,
        }
    }

    /// Sets the glyph atlas.
    #[must_use]
    pub fn with_atlas(mut self, atlas: &'a dyn GlyphAtlas) -> Self {
        self.atlas = Some(atlas);
        self
    }

    /// Sets the resource version.
    #[must_use]
    pub fn with_resource_version(mut self, version: u32) -> Self {
        self.resource_version = version;
        self
    }
}

impl fmt::Debug for BatchContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchContext")
            .field("config", self.config)
            .field("atlas", &self.atlas.is_some())
            .field("viewport_size", &self.viewport_size)
            .field("resource_version", &self.resource_version)
            .finish()
    }
}

/// Counters from one batching pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Elements processed.
    pub elements: u32,
    /// Element batches created.
    pub element_batches: u32,
    /// Post-process passes requested.
    pub post_process_passes: u32,
    /// Text elements dropped because no glyph atlas was available.
    pub skipped_text: u32,
    /// Whether a batched viewport asked for vsync.
    pub requires_vsync: bool,
}

/// Pool indices of a batch's scratch arrays.
#[derive(Clone, Copy, Debug)]
struct Slot {
    vertices: u32,
    indices: u32,
}

impl Slot {
    fn arrays(self, data: &mut BatchData) -> (&mut Vec<SlateVertex>, &mut Vec<u32>) {
        data.arrays_at(self.vertices, self.indices)
    }
}

/// Converts draw elements to element batches.
#[derive(Debug)]
pub struct ElementBatcher<'a> {
    ctx: BatchContext<'a>,
    stats: BatcherStats,
}

impl<'a> ElementBatcher<'a> {
    /// Creates a batcher.
    #[must_use]
    pub fn new(ctx: BatchContext<'a>) -> Self {
        Self {
            ctx,
            stats: BatcherStats::default(),
        }
    }

    /// Counters accumulated since the last [`add_elements`](Self::add_elements).
    #[must_use]
    pub fn stats(&self) -> BatcherStats {
        self.stats
    }

    /// Whether any batched viewport requires vsync.
    #[must_use]
    pub fn requires_vsync(&self) -> bool {
        self.stats.requires_vsync
    }

    /// Number of post-process passes batched.
    #[must_use]
    pub fn num_post_process_passes(&self) -> u32 {
        self.stats.post_process_passes
    }

    /// Batches the root elements and every logical layer's elements of
    /// `list` into their batch maps, using the list's batch data pools.
    pub fn add_elements(&mut self, list: &mut WindowElementList) {
        self.stats = BatcherStats::default();
        let version = self.ctx.resource_version;
        let WindowElementList {
            root,
            layers,
            batch_data,
            ..
        } = list;
        root.batch_map.update_resource_version(version);
        self.batch_elements(&root.elements, &mut root.batch_map, batch_data);
        for layer in layers.iter_mut() {
            layer.batch_map.update_resource_version(version);
            self.batch_elements(&layer.elements, &mut layer.batch_map, batch_data);
        }
    }

    /// Batches `elements` into `map`, taking scratch arrays from `data`.
    pub fn batch_elements(
        &mut self,
        elements: &[DrawElement],
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        for e in elements {
            self.add_element(e, map, data);
        }
    }

    fn add_element(&mut self, e: &DrawElement, map: &mut ElementBatchMap, data: &mut BatchData) {
        self.stats.elements += 1;
        match &e.kind {
            ElementKind::DebugQuad => self.add_debug_quad(e, map, data),
            ElementKind::Box(p) => self.add_box(e, p, map, data),
            ElementKind::Border(p) => self.add_border(e, p, map, data),
            ElementKind::Text(p) => self.add_text(e, p, map, data),
            ElementKind::Lines(p) => self.add_lines(e, p, map, data),
            ElementKind::Spline(p) => self.add_spline(e, p, map, data),
            ElementKind::Gradient(p) => self.add_gradient(e, p, map, data),
            ElementKind::Viewport(info, tint) => self.add_viewport(e, info, *tint, map, data),
            ElementKind::Custom(drawer) => {
                let key = BatchKey {
                    custom_drawer: Some(CustomDrawerRef::new(drawer)),
                    ..standalone_key(e)
                };
                self.push_standalone(map, e.layer, ElementBatch::new(key));
            }
            ElementKind::CustomVerts(p) => self.add_custom_verts(e, p, map, data),
            ElementKind::CachedBuffer(handle, offset) => {
                let key = BatchKey {
                    cached_buffer: Some((handle.clone(), *offset)),
                    ..standalone_key(e)
                };
                self.push_standalone(map, e.layer, ElementBatch::new(key));
            }
            ElementKind::Layer(handle) => {
                let key = BatchKey {
                    layer: Some(handle.clone()),
                    ..standalone_key(e)
                };
                self.push_standalone(map, e.layer, ElementBatch::new(key));
            }
            ElementKind::PostProcess(p) => self.add_post_process(e, p, map),
        }
    }

    /// The batch of `layer` matching `key`, created if needed. Every call
    /// counts one element.
    fn find_batch(
        &mut self,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
        layer: u32,
        key: BatchKey,
    ) -> Slot {
        let batches = map.find_or_add(layer);
        let idx = match batches.iter().position(|b| b.key == key) {
            Some(idx) => idx,
            None => {
                batches.push(ElementBatch::new(key));
                self.stats.element_batches += 1;
                batches.len() - 1
            }
        };
        let batch = &mut batches[idx];
        batch.num_elements += 1;
        let (vertices, indices) = data.assign_arrays(batch);
        Slot { vertices, indices }
    }

    fn push_standalone(&mut self, map: &mut ElementBatchMap, layer: u32, batch: ElementBatch) {
        map.find_or_add(layer).push(batch);
        self.stats.element_batches += 1;
    }

    // -----------------------------------------------------------------------
    // Quads
    // -----------------------------------------------------------------------

    fn add_debug_quad(&mut self, e: &DrawElement, map: &mut ElementBatchMap, data: &mut BatchData) {
        let key = element_key(
            e,
            ShaderType::Default,
            DrawPrimitive::TriangleList,
            None,
            ShaderParams::default(),
            BatchDrawFlags::WIREFRAME | BatchDrawFlags::NO_BLENDING,
        );
        let slot = self.find_batch(map, data, e.layer, key);
        let (verts, indices) = slot.arrays(data);
        let base = vertex_count(verts);
        let (w, h) = (e.local_size.width, e.local_size.height);
        let color = LinearColor::WHITE.to_packed(self.ctx.config.srgb_vertex_color);
        let rounding = rounding_for(e);
        for (pos, uv) in [
            (Point::ZERO, Point::ZERO),
            (Point::new(w, 0.0), Point::new(1.0, 0.0)),
            (Point::new(0.0, h), Point::new(0.0, 1.0)),
            (Point::new(w, h), Point::new(1.0, 1.0)),
        ] {
            verts.push(SlateVertex::new(e.render_transform, pos, uv, color, rounding));
        }
        indices.extend(QUAD_INDICES.map(|i| base + i));
    }

    fn add_box(
        &mut self,
        e: &DrawElement,
        p: &BoxPayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let config = self.ctx.config;
        let brush = &p.brush;
        let tint = p.tint.to_packed(config.srgb_vertex_color);
        let local = e.local_size;
        let pco = f64::from(config.pixel_center_offset);

        let mut texture_size = Size::new(1.0, 1.0);
        let (mut start_uv, mut end_uv, size_uv, half_texel) = match brush.proxy {
            Some(proxy) => {
                texture_size = Size::new(
                    non_zero(proxy.actual_size.width),
                    non_zero(proxy.actual_size.height),
                );
                let half = Vec2::new(pco / texture_size.width, pco / texture_size.height);
                let (origin, size) = match brush.valid_uv_region() {
                    Some(region) => (region.origin(), region.size()),
                    None => (proxy.start_uv, proxy.size_uv),
                };
                let start = origin + half;
                (start, start + size.to_vec2(), size, half)
            }
            None => (
                Point::ZERO,
                Point::new(1.0, 1.0),
                Size::new(1.0, 1.0),
                Vec2::new(pco, pco),
            ),
        };

        let tile_u = brush.tiling.tiles_u();
        let tile_v = brush.tiling.tiles_v();
        let mirror_u = matches!(brush.mirroring, MirrorType::Horizontal | MirrorType::Both);
        let mirror_v = matches!(brush.mirroring, MirrorType::Vertical | MirrorType::Both);

        let mut flags = e.batch_flags;
        if tile_u {
            flags |= BatchDrawFlags::TILE_U;
        }
        if tile_v {
            flags |= BatchDrawFlags::TILE_V;
        }
        let key = element_key(
            e,
            ShaderType::Default,
            DrawPrimitive::TriangleList,
            brush.texture(),
            ShaderParams::default(),
            flags,
        );
        let slot = self.find_batch(map, data, e.layer, key);
        let (verts, indices) = slot.arrays(data);

        let tiling = Vec2::new(
            if tile_u { local.width / texture_size.width } else { 1.0 },
            if tile_v { local.height / texture_size.height } else { 1.0 },
        );
        let rounding = rounding_for(e);
        let vertex = |pos: Point, uv: Point, color: PackedColor| {
            SlateVertex::sized(
                e.render_transform,
                pos,
                local,
                e.scale,
                tex4(uv, tiling),
                color,
                rounding,
            )
        };
        let feather = config.feathering && !e.effects.is_pixel_snapped();
        let skirt = 1.0 / e.scale;
        let base = vertex_count(verts);
        let (x0, y0, x1, y1) = (0.0, 0.0, local.width, local.height);
        let m = brush.margin;

        if brush.draw_type != BrushDrawType::Image && !m.is_zero() {
            let mut left_u = if m.left > 0.0 {
                start_uv.x + m.left * size_uv.width + half_texel.x
            } else {
                start_uv.x
            };
            let mut top_v = if m.top > 0.0 {
                start_uv.y + m.top * size_uv.height + half_texel.y
            } else {
                start_uv.y
            };
            let mut right_u = if m.right > 0.0 {
                end_uv.x - m.right * size_uv.width + half_texel.x
            } else {
                end_uv.x
            };
            let mut bottom_v = if m.bottom > 0.0 {
                end_uv.y - m.bottom * size_uv.height + half_texel.y
            } else {
                end_uv.y
            };

            if mirror_u {
                let (lo, hi) = (start_uv.x, end_uv.x);
                let flip = |u: f64| hi - (u - lo);
                start_uv.x = flip(start_uv.x);
                end_uv.x = flip(end_uv.x);
                left_u = flip(left_u);
                right_u = flip(right_u);
            }
            if mirror_v {
                let (lo, hi) = (start_uv.y, end_uv.y);
                let flip = |v: f64| hi - (v - lo);
                start_uv.y = flip(start_uv.y);
                end_uv.y = flip(end_uv.y);
                top_v = flip(top_v);
                bottom_v = flip(bottom_v);
            }

            let mut left_x = texture_size.width * m.left;
            let mut top_y = texture_size.height * m.top;
            let mut right_x = local.width - texture_size.width * m.right;
            let mut bottom_y = local.height - texture_size.height * m.bottom;
            // Overlapping margins collapse to the middle of the box.
            if right_x < left_x {
                left_x = local.width / 2.0;
                right_x = left_x;
            }
            if bottom_y < top_y {
                top_y = local.height / 2.0;
                bottom_y = top_y;
            }

            let (u0, u1, v0, v1) = (start_uv.x, end_uv.x, start_uv.y, end_uv.y);
            let grid = [
                (x0, y0, u0, v0),
                (x0, top_y, u0, top_v),
                (left_x, y0, left_u, v0),
                (left_x, top_y, left_u, top_v),
                (right_x, y0, right_u, v0),
                (right_x, top_y, right_u, top_v),
                (x1, y0, u1, v0),
                (x1, top_y, u1, top_v),
                (x0, bottom_y, u0, bottom_v),
                (left_x, bottom_y, left_u, bottom_v),
                (right_x, bottom_y, right_u, bottom_v),
                (x1, bottom_y, u1, bottom_v),
                (x0, y1, u0, v1),
                (left_x, y1, left_u, v1),
                (right_x, y1, right_u, v1),
                (x1, y1, u1, v1),
            ];
            for (x, y, u, v) in grid {
                verts.push(vertex(Point::new(x, y), Point::new(u, v), tint));
            }
            indices.extend(NINE_SLICE_INDICES.map(|i| base + i));

            if feather {
                let skirt_vertices = [
                    (x0, y0, -1.0, -1.0, u0, v0),
                    (left_x, y0, 0.0, -1.0, left_u, v0),
                    (right_x, y0, 0.0, -1.0, right_u, v0),
                    (x1, y0, 1.0, -1.0, u1, v0),
                    (x0, top_y, -1.0, 0.0, u0, top_v),
                    (x0, bottom_y, -1.0, 0.0, u0, bottom_v),
                    (x1, top_y, 1.0, 0.0, u1, top_v),
                    (x1, bottom_y, 1.0, 0.0, u1, bottom_v),
                    (x0, y1, -1.0, 1.0, u0, v1),
                    (left_x, y1, 0.0, 1.0, left_u, v1),
                    (right_x, y1, 0.0, 1.0, right_u, v1),
                    (x1, y1, 1.0, 1.0, u1, v1),
                ];
                for (x, y, dx, dy, u, v) in skirt_vertices {
                    let pos = Point::new(x + dx * skirt, y + dy * skirt);
                    verts.push(vertex(pos, Point::new(u, v), PackedColor::TRANSPARENT));
                }
                for [tl, tr, br, bl] in NINE_SLICE_FEATHER_QUADS {
                    indices.extend([tl, tr, br, br, bl, tl].map(|i| base + i));
                }
            }
        } else {
            if mirror_u {
                core::mem::swap(&mut start_uv.x, &mut end_uv.x);
            }
            if mirror_v {
                core::mem::swap(&mut start_uv.y, &mut end_uv.y);
            }
            let corners = [
                (x0, y0, start_uv.x, start_uv.y),
                (x1, y0, end_uv.x, start_uv.y),
                (x0, y1, start_uv.x, end_uv.y),
                (x1, y1, end_uv.x, end_uv.y),
            ];
            for (x, y, u, v) in corners {
                verts.push(vertex(Point::new(x, y), Point::new(u, v), tint));
            }
            indices.extend(QUAD_INDICES.map(|i| base + i));

            if feather {
                let skirt_dirs = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];
                for ((x, y, u, v), (dx, dy)) in corners.into_iter().zip(skirt_dirs) {
                    let pos = Point::new(x + dx * skirt, y + dy * skirt);
                    verts.push(vertex(pos, Point::new(u, v), PackedColor::TRANSPARENT));
                }
                indices.extend(QUAD_FEATHER_INDICES.map(|i| base + i));
            }
        }
    }

    fn add_border(
        &mut self,
        e: &DrawElement,
        p: &BoxPayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let config = self.ctx.config;
        let brush = &p.brush;
        let local = e.local_size;
        let m = brush.margin;

        // Borders tile, so the proxy is assumed to cover a whole texture.
        let texture_size = brush.proxy.map_or(Size::new(1.0, 1.0), |proxy| {
            Size::new(
                non_zero(proxy.texture_size.width),
                non_zero(proxy.texture_size.height),
            )
        });
        let texture_local = Size::new(
            texture_size.width / e.scale,
            texture_size.height / e.scale,
        );
        let pco = f64::from(config.pixel_center_offset);
        let half_texel = Vec2::new(pco / texture_size.width, pco / texture_size.height);
        let start_uv = Point::ZERO + half_texel;
        let end_uv = Point::new(1.0, 1.0) + half_texel;

        let mut left_x = texture_local.width * m.left;
        let mut top_y = texture_local.height * m.top;
        let mut right_x = local.width - texture_local.width * m.right;
        let mut bottom_y = local.height - texture_local.height * m.bottom;
        if right_x < left_x {
            left_x = local.width / 2.0;
            right_x = left_x;
        }
        if bottom_y < top_y {
            top_y = local.height / 2.0;
            bottom_y = top_y;
        }

        let left_u = m.left.max(0.0) + half_texel.x;
        let top_v = m.top.max(0.0) + half_texel.y;
        let right_u = (if m.right > 0.0 { 1.0 - m.right } else { 1.0 }) + half_texel.x;
        let bottom_v = (if m.bottom > 0.0 { 1.0 - m.bottom } else { 1.0 }) + half_texel.y;

        // Texels covered by the tiled edge over texels of the tiled source.
        let at_least_one = |t: f64| if t >= 1.0 { t } else { 1.0 };
        let top_tiling = at_least_one(
            (right_x - left_x) / (texture_local.width * (1.0 - (m.left + m.right))),
        );
        let left_tiling = at_least_one(
            (bottom_y - top_y) / (texture_local.height * (1.0 - (m.top + m.bottom))),
        );
        let (right_tiling, bottom_tiling) = (left_tiling, top_tiling);

        let params = ShaderParams::new([
            narrow(left_u),
            narrow(right_u),
            narrow(top_v),
            narrow(bottom_v),
        ]);
        let key = element_key(
            e,
            ShaderType::Border,
            DrawPrimitive::TriangleList,
            brush.texture(),
            params,
            e.batch_flags | BatchDrawFlags::TILE_U | BatchDrawFlags::TILE_V,
        );
        let slot = self.find_batch(map, data, e.layer, key);
        let (verts, indices) = slot.arrays(data);

        let tint = p.tint.to_packed(config.srgb_vertex_color);
        let rounding = rounding_for(e);
        let (x0, y0, x1, y1) = (0.0, 0.0, local.width, local.height);
        let (su, sv, eu, ev) = (start_uv.x, start_uv.y, end_uv.x, end_uv.y);
        // Corner sections pass a zero tiling so their UVs are used as is.
        let quads: [[(f64, f64, [f64; 4]); 4]; 8] = [
            [
                (x0, y0, [su, sv, 0.0, 0.0]),
                (x0, top_y, [su, top_v, 0.0, 0.0]),
                (left_x, y0, [left_u, sv, 0.0, 0.0]),
                (left_x, top_y, [left_u, top_v, 0.0, 0.0]),
            ],
            [
                (left_x, y0, [su, sv, top_tiling, 0.0]),
                (left_x, top_y, [su, top_v, top_tiling, 0.0]),
                (right_x, y0, [eu, sv, top_tiling, 0.0]),
                (right_x, top_y, [eu, top_v, top_tiling, 0.0]),
            ],
            [
                (right_x, y0, [right_u, sv, 0.0, 0.0]),
                (right_x, top_y, [right_u, top_v, 0.0, 0.0]),
                (x1, y0, [eu, sv, 0.0, 0.0]),
                (x1, top_y, [eu, top_v, 0.0, 0.0]),
            ],
            [
                (x0, top_y, [su, sv, 0.0, left_tiling]),
                (x0, bottom_y, [su, ev, 0.0, left_tiling]),
                (left_x, top_y, [left_u, sv, 0.0, left_tiling]),
                (left_x, bottom_y, [left_u, ev, 0.0, left_tiling]),
            ],
            [
                (right_x, top_y, [right_u, sv, 0.0, right_tiling]),
                (right_x, bottom_y, [right_u, ev, 0.0, right_tiling]),
                (x1, top_y, [eu, sv, 0.0, right_tiling]),
                (x1, bottom_y, [eu, ev, 0.0, right_tiling]),
            ],
            [
                (x0, bottom_y, [su, bottom_v, 0.0, 0.0]),
                (x0, y1, [su, ev, 0.0, 0.0]),
                (left_x, bottom_y, [left_u, bottom_v, 0.0, 0.0]),
                (left_x, y1, [left_u, ev, 0.0, 0.0]),
            ],
            [
                (left_x, bottom_y, [su, bottom_v, bottom_tiling, 0.0]),
                (left_x, y1, [su, ev, bottom_tiling, 0.0]),
                (right_x, bottom_y, [eu, bottom_v, bottom_tiling, 0.0]),
                (right_x, y1, [eu, ev, bottom_tiling, 0.0]),
            ],
            [
                (right_x, bottom_y, [right_u, bottom_v, 0.0, 0.0]),
                (right_x, y1, [right_u, ev, 0.0, 0.0]),
                (x1, bottom_y, [eu, bottom_v, 0.0, 0.0]),
                (x1, y1, [eu, ev, 0.0, 0.0]),
            ],
        ];
        for quad in quads {
            let base = vertex_count(verts);
            for (x, y, tex) in quad {
                verts.push(SlateVertex::sized(
                    e.render_transform,
                    Point::new(x, y),
                    local,
                    e.scale,
                    tex.map(narrow),
                    tint,
                    rounding,
                ));
            }
            indices.extend(QUAD_INDICES.map(|i| base + i));
        }
    }

    fn add_viewport(
        &mut self,
        e: &DrawElement,
        info: &ViewportInfo,
        tint: LinearColor,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let shader = if info.alpha_only {
            ShaderType::Font
        } else {
            ShaderType::Default
        };
        let key = element_key(
            e,
            shader,
            DrawPrimitive::TriangleList,
            info.texture.map(|t| t.resource),
            ShaderParams::default(),
            e.batch_flags,
        );
        let mut bottom_right = Point::new(e.local_size.width, e.local_size.height);
        if let Some(texture) = info.texture {
            self.stats.requires_vsync |= info.requires_vsync;
            if !info.allow_scaling {
                bottom_right = Point::new(f64::from(texture.width), f64::from(texture.height));
            }
        }
        let slot = self.find_batch(map, data, e.layer, key);
        let (verts, indices) = slot.arrays(data);
        let color = tint.to_packed(self.ctx.config.srgb_vertex_color);
        let rounding = rounding_for(e);
        let base = vertex_count(verts);
        for (pos, uv) in [
            (Point::ZERO, Point::ZERO),
            (Point::new(bottom_right.x, 0.0), Point::new(1.0, 0.0)),
            (Point::new(0.0, bottom_right.y), Point::new(0.0, 1.0)),
            (bottom_right, Point::new(1.0, 1.0)),
        ] {
            verts.push(SlateVertex::new(e.render_transform, pos, uv, color, rounding));
        }
        indices.extend(QUAD_INDICES.map(|i| base + i));
    }

    // -----------------------------------------------------------------------
    // Text
    // -----------------------------------------------------------------------

    fn add_text(
        &mut self,
        e: &DrawElement,
        p: &TextPayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let Some(atlas) = self.ctx.atlas else {
            self.stats.skipped_text += 1;
            return;
        };
        let srgb = self.ctx.config.srgb_vertex_color;
        let fill = p.tint.to_packed(srgb);
        if p.font.outline_size > 0.0 {
            let outline = p.font.outline_color.to_packed(srgb);
            self.add_glyph_run(e, p, atlas, map, data, e.layer, p.font.outline_size, outline, 0.0);
            let offset = (f64::from(p.font.outline_size) * e.scale).round();
            self.add_glyph_run(e, p, atlas, map, data, e.layer.saturating_add(1), 0.0, fill, offset);
        } else {
            self.add_glyph_run(e, p, atlas, map, data, e.layer, 0.0, fill, 0.0);
        }
    }

    /// Emits one quad per visible glyph. Glyph metrics are in pixels, so the
    /// run is laid out in a space scaled by the inverse of the element scale.
    fn add_glyph_run(
        &mut self,
        e: &DrawElement,
        p: &TextPayload,
        atlas: &dyn GlyphAtlas,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
        layer: u32,
        outline: f32,
        color: PackedColor,
        horizontal_offset: f64,
    ) {
        let font = &p.font;
        let font_scale = narrow(e.scale);
        let transform = e.render_transform * Affine::scale(1.0 / e.scale);
        let rounding = rounding_for(e);
        let max_height = f64::from(atlas.max_height(font, font_scale));

        let mut pos_y = 0.0;
        let mut line_x = 0.0;
        let mut prev: Option<char> = None;
        let mut page: Option<(u32, Slot, Vec2)> = None;

        for ch in p.text.chars() {
            if ch == '\n' {
                pos_y += max_height;
                line_x = 0.0;
                prev = None;
                continue;
            }
            let glyph = atlas.glyph(font, font_scale, outline, ch);
            if let Some(g) = glyph
                && page.is_none_or(|(index, ..)| index != g.texture_index)
                && let Some(texture) = atlas.texture(g.texture_index)
            {
                let key = element_key(
                    e,
                    ShaderType::Font,
                    DrawPrimitive::TriangleList,
                    Some(texture.resource),
                    ShaderParams::default(),
                    e.batch_flags,
                );
                let slot = self.find_batch(map, data, layer, key);
                let inv = Vec2::new(
                    1.0 / f64::from(texture.width.max(1)),
                    1.0 / f64::from(texture.height.max(1)),
                );
                page = Some((g.texture_index, slot, inv));
            }

            let visible = glyph.filter(|g| {
                !ch.is_whitespace() && page.is_some_and(|(index, ..)| index == g.texture_index)
            });
            if visible.is_some()
                && let Some(prev_ch) = prev
            {
                line_x += f64::from(atlas.kerning(font, font_scale, prev_ch, ch));
            }
            prev = glyph.map(|_| ch);

            if let (Some(g), Some((_, slot, inv))) = (visible, page) {
                let x = line_x + f64::from(g.horizontal_offset) + horizontal_offset;
                let y = pos_y - f64::from(g.vertical_offset)
                    + max_height
                    + f64::from(g.global_descender);
                let (w, h) = (f64::from(g.size_u), f64::from(g.size_v));
                let u = f64::from(g.start_u) * inv.x;
                let v = f64::from(g.start_v) * inv.y;
                let su = w * inv.x;
                let sv = h * inv.y;

                let (verts, indices) = slot.arrays(data);
                let base = vertex_count(verts);
                for (pos, tex, material) in [
                    (Point::new(x, y), [u, v], [0.0, 0.0]),
                    (Point::new(x + w, y), [u + su, v], [1.0, 0.0]),
                    (Point::new(x, y + h), [u, v + sv], [0.0, 1.0]),
                    (Point::new(x + w, y + h), [u + su, v + sv], [1.0, 1.0]),
                ] {
                    verts.push(SlateVertex::with_tex_coords(
                        transform,
                        pos,
                        [narrow(tex[0]), narrow(tex[1]), 0.0, 0.0],
                        material,
                        color,
                        rounding,
                    ));
                }
                indices.extend([0, 1, 2, 1, 3, 2].map(|i| base + i));
            }
            if let Some(g) = glyph {
                line_x += f64::from(g.x_advance);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Gradients
    // -----------------------------------------------------------------------

    fn add_gradient(
        &mut self,
        e: &DrawElement,
        p: &GradientPayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let (Some(first), Some(last)) = (p.stops.first().copied(), p.stops.last().copied())
        else {
            return;
        };
        let local = e.local_size;
        let far = Point::new(local.width, local.height);
        let mut stops = p.stops.clone();
        // Extend the first and last colors to the edges of the element.
        match p.orientation {
            Orientation::Vertical => {
                if first.position.x > 0.0 {
                    stops.insert(0, GradientStop::new(Point::ZERO, first.color));
                }
                if local.width > last.position.x {
                    stops.push(GradientStop::new(far, last.color));
                }
            }
            Orientation::Horizontal => {
                if first.position.y > 0.0 {
                    stops.insert(0, GradientStop::new(Point::ZERO, first.color));
                }
                if local.height > last.position.y {
                    stops.push(GradientStop::new(far, last.color));
                }
            }
        }

        let key = element_key(
            e,
            ShaderType::Default,
            DrawPrimitive::TriangleList,
            None,
            ShaderParams::default(),
            e.batch_flags,
        );
        let slot = self.find_batch(map, data, e.layer, key);
        let (verts, indices) = slot.arrays(data);
        let rounding = rounding_for(e);
        for (i, stop) in stops.iter().enumerate() {
            let s = vertex_count(verts);
            let (a, b) = match p.orientation {
                Orientation::Vertical => (
                    Point::new(stop.position.x, 0.0),
                    Point::new(stop.position.x, local.height),
                ),
                Orientation::Horizontal => (
                    Point::new(0.0, stop.position.y),
                    Point::new(local.width, stop.position.y),
                ),
            };
            let color = stop.color.to_packed(false);
            verts.push(SlateVertex::new(e.render_transform, a, Point::ZERO, color, rounding));
            verts.push(SlateVertex::new(e.render_transform, b, Point::ZERO, color, rounding));
            if i > 0 {
                indices.extend([s - 2, s - 1, s, s, s - 1, s + 1]);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lines and splines
    // -----------------------------------------------------------------------

    fn add_lines(
        &mut self,
        e: &DrawElement,
        p: &LinesPayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let n = p.points.len();
        if n < 2 {
            return;
        }
        let srgb = self.ctx.config.srgb_vertex_color;
        let color_at = |i: usize| {
            p.point_colors
                .as_ref()
                .and_then(|colors| colors.get(i))
                .map_or(p.tint, |c| *c * p.tint)
                .to_packed(srgb)
        };
        let transform = e.render_transform;
        let rounding = rounding_for(e);
        let thickness = f64::from(p.thickness);

        if p.antialias {
            let half = line::filter_half_width(thickness);
            let key = element_key(
                e,
                ShaderType::LineSegment,
                DrawPrimitive::TriangleList,
                None,
                ShaderParams::new([p.thickness, 1.0, 0.0, 0.0]),
                BatchDrawFlags::empty(),
            );
            let slot = self.find_batch(map, data, e.layer, key);
            let (verts, indices) = slot.arrays(data);
            let up_of = |a: Point, b: Point| line::safe_normal(Vec2::new(a.y - b.y, b.x - a.x)) * half;

            let mut start = p.points[0];
            let mut up = up_of(start, p.points[1]);
            let start_dir = line::safe_normal(start - p.points[1]) * half;
            line::make_cap(verts, indices, transform, start, start_dir, up, color_at(0));

            let strip = (transform, rounding);
            push_strip_pair(verts, strip, start + up, start - up, color_at(0));

            for (i, &end) in p.points.iter().enumerate().skip(1) {
                up = up_of(start, end);
                let mut upper = end + up;
                let mut lower = end - up;
                if let Some(&next) = p.points.get(i + 1) {
                    let next_up = up_of(end, next);
                    if let Some(q) = line::line_intersect(
                        start + up,
                        end + up,
                        end + next_up,
                        next + next_up,
                        MITER_TOLERANCE,
                    ) {
                        upper = q;
                    }
                    if let Some(q) = line::line_intersect(
                        start - up,
                        end - up,
                        end - next_up,
                        next - next_up,
                        MITER_TOLERANCE,
                    ) {
                        lower = q;
                    }
                }
                push_strip_pair(verts, strip, upper, lower, color_at(i));
                let k = vertex_count(verts) - 2;
                indices.extend([k - 1, k - 2, k, k - 1, k, k + 1]);
                start = end;
            }

            let last = p.points[n - 1];
            let end_dir = line::safe_normal(last - p.points[n - 2]) * half;
            line::make_cap(verts, indices, transform, last, end_dir, up, color_at(n - 1));
        } else if p.thickness == 1.0 {
            let key = element_key(
                e,
                ShaderType::Default,
                DrawPrimitive::LineList,
                None,
                ShaderParams::default(),
                e.batch_flags,
            );
            let slot = self.find_batch(map, data, e.layer, key);
            let (verts, indices) = slot.arrays(data);
            for (i, pair) in p.points.windows(2).enumerate() {
                let base = vertex_count(verts);
                verts.push(SlateVertex::new(transform, pair[0], Point::ZERO, color_at(i), rounding));
                verts.push(SlateVertex::new(transform, pair[1], Point::ZERO, color_at(i + 1), rounding));
                indices.extend([base, base + 1]);
            }
        } else {
            let key = element_key(
                e,
                ShaderType::Default,
                DrawPrimitive::TriangleList,
                None,
                ShaderParams::default(),
                e.batch_flags,
            );
            let slot = self.find_batch(map, data, e.layer, key);
            let (verts, indices) = slot.arrays(data);
            for (i, pair) in p.points.windows(2).enumerate() {
                let (a, b) = (pair[0], pair[1]);
                let dir = line::safe_normal(b - a) * (thickness / 2.0);
                let side = Vec2::new(dir.y, -dir.x);
                let base = vertex_count(verts);
                for (pos, color) in [
                    (a + side, color_at(i)),
                    (a - side, color_at(i)),
                    (b + side, color_at(i + 1)),
                    (b - side, color_at(i + 1)),
                ] {
                    verts.push(SlateVertex::new(transform, pos, Point::ZERO, color, rounding));
                }
                indices.extend(QUAD_INDICES.map(|i| base + i));
            }
        }
    }

    fn add_spline(
        &mut self,
        e: &DrawElement,
        p: &SplinePayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        let srgb = self.ctx.config.srgb_vertex_color;
        let local_thickness = (f64::from(p.thickness) / e.scale).max(1.0);
        let half = line::filter_half_width(local_thickness);
        let key = element_key(
            e,
            ShaderType::LineSegment,
            DrawPrimitive::TriangleList,
            None,
            ShaderParams::new([p.thickness, 1.0, 0.0, 0.0]),
            BatchDrawFlags::empty(),
        );
        let slot = self.find_batch(map, data, e.layer, key);
        let (verts, indices) = slot.arrays(data);

        let points = p.points;
        let mut builder = LineBuilder::new(e.render_transform, points[0], half);
        let stops = &p.gradient_stops;
        if stops.len() <= 1 {
            let color = stops.first().map_or(p.tint, |s| s.color).to_packed(srgb);
            builder.subdivide(verts, indices, points, color);
            builder.finish(verts, indices, points[3], color);
            return;
        }

        // Each stop boundary splits the remaining curve evenly.
        let n = stops.len();
        let mut rest = points;
        for idx in 1..n {
            let (from, to) = (stops[idx - 1].color, stops[idx].color);
            if idx < n - 1 {
                let (head, tail) = line::split_cubic(rest, 1.0 / (n - idx) as f64);
                builder.subdivide_blended(verts, indices, head, from, to, srgb);
                rest = tail;
            } else {
                builder.subdivide_blended(verts, indices, rest, from, to, srgb);
                builder.finish(verts, indices, rest[3], to.to_packed(srgb));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Standalone batches
    // -----------------------------------------------------------------------

    fn add_custom_verts(
        &mut self,
        e: &DrawElement,
        p: &CustomVertsPayload,
        map: &mut ElementBatchMap,
        data: &mut BatchData,
    ) {
        if p.vertices.is_empty() {
            return;
        }
        let key = BatchKey {
            instance: p.instance,
            ..element_key(
                e,
                ShaderType::Custom,
                DrawPrimitive::TriangleList,
                p.resource,
                ShaderParams::default(),
                e.batch_flags,
            )
        };
        let mut batch = ElementBatch::new(key);
        batch.num_elements = 1;
        let (v, i) = data.assign_arrays(&mut batch);
        let (verts, indices) = data.arrays_at(v, i);
        verts.extend_from_slice(&p.vertices);
        indices.extend_from_slice(&p.indices);
        self.push_standalone(map, e.layer, batch);
    }

    fn add_post_process(&mut self, e: &DrawElement, p: &PostProcessPayload, map: &mut ElementBatchMap) {
        self.stats.post_process_passes += 1;
        let local = e.local_size;
        let tl = (e.render_transform * Point::ZERO).round();
        let br = (e.render_transform * Point::new(local.width, local.height)).round();
        if br.x <= tl.x || br.y <= tl.y {
            return;
        }
        let key = BatchKey {
            shader_type: ShaderType::PostProcess,
            shader_params: ShaderParams::with_second(
                [narrow(tl.x), narrow(tl.y), narrow(br.x), narrow(br.y)],
                [
                    narrow(p.params.x),
                    narrow(p.params.y),
                    p.downsample as f32,
                    0.0,
                ],
            ),
            ..standalone_key(e)
        };
        let mut batch = ElementBatch::new(key);
        batch.num_elements = 1;
        self.push_standalone(map, e.layer, batch);
    }
}

/// Pushes the upper (`u = 1`) and lower (`u = 0`) edge vertices of a strip.
fn push_strip_pair(
    verts: &mut Vec<SlateVertex>,
    (transform, rounding): (Affine, VertexRounding),
    upper: Point,
    lower: Point,
    color: PackedColor,
) {
    verts.push(SlateVertex::new(transform, upper, Point::new(1.0, 0.0), color, rounding));
    verts.push(SlateVertex::new(transform, lower, Point::ZERO, color, rounding));
}

fn rounding_for(e: &DrawElement) -> VertexRounding {
    VertexRounding::from_snapping(e.effects.is_pixel_snapped())
}

fn element_key(
    e: &DrawElement,
    shader_type: ShaderType,
    primitive: DrawPrimitive,
    texture: Option<ResourceId>,
    shader_params: ShaderParams,
    flags: BatchDrawFlags,
) -> BatchKey {
    BatchKey {
        texture,
        shader_params,
        shader_type,
        primitive,
        effects: e.effects,
        flags,
        clipping_index: e.clipping_index,
        scene_index: e.scene_index,
        ..BatchKey::default()
    }
}

/// Key carrying only the clip and scene of `e`.
fn standalone_key(e: &DrawElement) -> BatchKey {
    BatchKey {
        clipping_index: e.clipping_index,
        scene_index: e.scene_index,
        ..BatchKey::default()
    }
}

fn tex4(uv: Point, zw: Vec2) -> [f32; 4] {
    [narrow(uv.x), narrow(uv.y), narrow(zw.x), narrow(zw.y)]
}

fn non_zero(extent: f64) -> f64 {
    if extent != 0.0 { extent } else { 1.0 }
}
