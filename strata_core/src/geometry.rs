// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Widget geometry as handed to paint, and its flattened paint-time form.

use kurbo::{Affine, Point, Rect, Size, Vec2};

/// The allotted geometry of a widget.
///
/// `absolute_position` and `scale` are the accumulated layout transform;
/// `render_transform` is the full local-to-window transform including any
/// render-time transform applied on top of layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Size in local (unscaled) units.
    pub local_size: Size,
    /// Accumulated layout position in window space.
    pub absolute_position: Point,
    /// Accumulated layout scale.
    pub scale: f64,
    /// Local-to-window render transform.
    pub render_transform: Affine,
}

impl Geometry {
    /// Geometry with a pure layout transform (translate + uniform scale).
    #[must_use]
    pub fn new(local_size: Size, absolute_position: Point, scale: f64) -> Self {
        Self {
            local_size,
            absolute_position,
            scale,
            render_transform: Affine::translate(absolute_position.to_vec2())
                * Affine::scale(scale),
        }
    }

    /// Replaces the render transform, keeping layout values.
    #[must_use]
    pub fn with_render_transform(mut self, render_transform: Affine) -> Self {
        self.render_transform = render_transform;
        self
    }

    /// A child geometry at `offset` (local units) with its own size.
    #[must_use]
    pub fn make_child(&self, local_size: Size, offset: Vec2) -> Self {
        let scaled = offset * self.scale;
        Self {
            local_size,
            absolute_position: self.absolute_position + scaled,
            scale: self.scale,
            render_transform: self.render_transform * Affine::translate(offset),
        }
    }

    /// Translates the geometry in window space.
    #[must_use]
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            local_size: self.local_size,
            absolute_position: self.absolute_position + offset,
            scale: self.scale,
            render_transform: Affine::translate(offset) * self.render_transform,
        }
    }

    /// Window-space bounding box of the render-transformed local rect.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        self.render_transform
            .transform_rect_bbox(self.local_size.to_rect())
    }

    /// Flattens into the form draw elements store.
    #[must_use]
    pub fn to_paint_geometry(&self) -> PaintGeometry {
        PaintGeometry {
            draw_position: self.absolute_position,
            draw_size: self.local_size * self.scale,
            draw_scale: self.scale,
            render_transform: self.render_transform,
            local_size: self.local_size,
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(Size::ZERO, Point::ZERO, 1.0)
    }
}

/// Paint-time geometry as captured by a draw element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintGeometry {
    /// Window-space position.
    pub draw_position: Point,
    /// Window-space size.
    pub draw_size: Size,
    /// Accumulated scale.
    pub draw_scale: f64,
    /// Local-to-window render transform.
    pub render_transform: Affine,
    /// Size in local units.
    pub local_size: Size,
}

impl PaintGeometry {
    /// An unscaled, untransformed geometry at `position`.
    #[must_use]
    pub fn at(position: Point, size: Size) -> Self {
        Geometry::new(size, position, 1.0).to_paint_geometry()
    }

    /// Applies a window-space translation.
    pub fn apply_offset(&mut self, offset: Vec2) {
        self.draw_position += offset;
        self.render_transform = Affine::translate(offset) * self.render_transform;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_geometry_maps_origin_to_position() {
        let g = Geometry::new(Size::new(10.0, 20.0), Point::new(5.0, 7.0), 2.0);
        assert_eq!(g.render_transform * Point::ZERO, Point::new(5.0, 7.0));
        assert_eq!(g.bounding_rect(), Rect::new(5.0, 7.0, 25.0, 47.0));
        assert_eq!(g.to_paint_geometry().draw_size, Size::new(20.0, 40.0));
    }

    #[test]
    fn child_geometry_accumulates_offset() {
        let g = Geometry::new(Size::new(100.0, 100.0), Point::new(10.0, 0.0), 2.0);
        let c = g.make_child(Size::new(5.0, 5.0), Vec2::new(3.0, 4.0));
        assert_eq!(c.absolute_position, Point::new(16.0, 8.0));
        assert_eq!(c.render_transform * Point::ZERO, Point::new(16.0, 8.0));
    }

    #[test]
    fn offset_moves_paint_geometry() {
        let mut p = PaintGeometry::at(Point::new(1.0, 1.0), Size::new(2.0, 2.0));
        p.apply_offset(Vec2::new(10.0, 0.0));
        assert_eq!(p.draw_position, Point::new(11.0, 1.0));
        assert_eq!(p.render_transform * Point::ZERO, Point::new(11.0, 1.0));
    }
}
