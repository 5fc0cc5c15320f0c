// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The packed vertex format consumed by render backends.

use kurbo::{Affine, Point, Size, Vec2};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::color::PackedColor;

/// Whether vertex positions are snapped to whole pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexRounding {
    /// Round transformed positions to the nearest pixel.
    Enabled,
    /// Keep sub-pixel positions.
    Disabled,
}

impl VertexRounding {
    /// Rounding for elements with the given snapping state.
    #[must_use]
    pub const fn from_snapping(pixel_snapped: bool) -> Self {
        if pixel_snapped {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// One vertex in the packed vertex buffer (44 bytes, `#[repr(C)]`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SlateVertex {
    /// Texture coordinates; `zw` carries tiling or line parameters.
    pub tex_coords: [f32; 4],
    /// Coordinates for material sampling, usually the local UV.
    pub material_tex_coords: [f32; 2],
    /// Window-space position.
    pub position: [f32; 2],
    /// Vertex color.
    pub color: PackedColor,
    /// Secondary color (outline or gradient end).
    pub secondary_color: PackedColor,
    /// Size of the element in pixels.
    pub pixel_size: [u16; 2],
}

impl SlateVertex {
    /// A vertex whose texture and material coordinates are both `uv`; the
    /// tiling components are 1.
    #[must_use]
    pub fn new(
        transform: Affine,
        local: Point,
        uv: Point,
        color: PackedColor,
        rounding: VertexRounding,
    ) -> Self {
        let u = narrow(uv.x);
        let v = narrow(uv.y);
        Self {
            tex_coords: [u, v, 1.0, 1.0],
            material_tex_coords: [u, v],
            position: window_position(transform, local, rounding),
            color,
            secondary_color: PackedColor::default(),
            pixel_size: [0, 0],
        }
    }

    /// A vertex with explicit texture and material coordinates.
    #[must_use]
    pub fn with_tex_coords(
        transform: Affine,
        local: Point,
        tex_coords: [f32; 4],
        material_tex_coords: [f32; 2],
        color: PackedColor,
        rounding: VertexRounding,
    ) -> Self {
        Self {
            tex_coords,
            material_tex_coords,
            position: window_position(transform, local, rounding),
            color,
            secondary_color: PackedColor::default(),
            pixel_size: [0, 0],
        }
    }

    /// A vertex whose material coordinates are its position relative to
    /// `local_size`, and whose pixel size is the scaled element size.
    #[must_use]
    pub fn sized(
        transform: Affine,
        local: Point,
        local_size: Size,
        scale: f64,
        tex_coords: [f32; 4],
        color: PackedColor,
        rounding: VertexRounding,
    ) -> Self {
        let material = |p: f64, extent: f64| if extent > 0.0 { narrow(p / extent) } else { 0.0 };
        Self {
            tex_coords,
            material_tex_coords: [
                material(local.x, local_size.width),
                material(local.y, local_size.height),
            ],
            position: window_position(transform, local, rounding),
            color,
            secondary_color: PackedColor::default(),
            pixel_size: [
                pixel_extent(local_size.width * scale),
                pixel_extent(local_size.height * scale),
            ],
        }
    }

    /// Sets the secondary color.
    #[must_use]
    pub fn with_secondary_color(mut self, color: PackedColor) -> Self {
        self.secondary_color = color;
        self
    }

    /// Window-space position as a point.
    #[must_use]
    pub fn point(&self) -> Point {
        Point::new(f64::from(self.position[0]), f64::from(self.position[1]))
    }

    /// Translates the vertex in window space.
    pub fn translate(&mut self, offset: Vec2) {
        self.position[0] += narrow(offset.x);
        self.position[1] += narrow(offset.y);
    }
}

fn window_position(transform: Affine, local: Point, rounding: VertexRounding) -> [f32; 2] {
    let p = transform * local;
    let p = match rounding {
        VertexRounding::Enabled => p.round(),
        VertexRounding::Disabled => p,
    };
    [narrow(p.x), narrow(p.y)]
}

/// Converts layout-space `f64` values to vertex `f32`s.
#[expect(
    clippy::cast_possible_truncation,
    reason = "vertex attributes are single precision"
)]
#[inline]
pub(crate) fn narrow(x: f64) -> f32 {
    x as f32
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "clamped to the u16 range before the cast"
)]
fn pixel_extent(x: f64) -> u16 {
    x.round().clamp(0.0, f64::from(u16::MAX)) as u16
}
