// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Brushes and the texture resources they reference.
//!
//! Resources are created and owned externally (by a texture atlas or a GPU
//! backend). A brush only carries opaque [`ResourceId`]s plus the sub-rectangle
//! of the resource it samples.

use core::fmt;

use kurbo::{Point, Rect, Size};

/// An opaque reference to a texture resource owned by the host.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u64);

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

/// A sub-rectangle of an atlas texture that a brush samples from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceProxy {
    /// The atlas texture.
    pub resource: ResourceId,
    /// Size of the image in pixels (may be zero for vector resources).
    pub actual_size: Size,
    /// Size of the whole atlas texture in pixels.
    pub texture_size: Size,
    /// Top-left UV of the image inside the atlas.
    pub start_uv: Point,
    /// UV extent of the image inside the atlas.
    pub size_uv: Size,
}

impl ResourceProxy {
    /// A proxy covering an entire standalone texture of the given size.
    #[must_use]
    pub fn whole(resource: ResourceId, size: Size) -> Self {
        Self {
            resource,
            actual_size: size,
            texture_size: size,
            start_uv: Point::ZERO,
            size_uv: Size::new(1.0, 1.0),
        }
    }
}

/// How a brush is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BrushDrawType {
    /// Nothing is drawn.
    NoDrawType,
    /// A 9-slice box (or a plain quad when the margin is zero).
    #[default]
    Box,
    /// A 9-slice box without its center.
    Border,
    /// A plain image; margins are ignored.
    Image,
}

/// Tiling mode of a brush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileType {
    /// Stretch.
    #[default]
    NoTile,
    /// Repeat horizontally.
    Horizontal,
    /// Repeat vertically.
    Vertical,
    /// Repeat in both directions.
    Both,
}

impl TileType {
    /// Whether the brush repeats along U.
    #[must_use]
    pub const fn tiles_u(self) -> bool {
        matches!(self, Self::Horizontal | Self::Both)
    }

    /// Whether the brush repeats along V.
    #[must_use]
    pub const fn tiles_v(self) -> bool {
        matches!(self, Self::Vertical | Self::Both)
    }
}

/// Mirroring mode of a brush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MirrorType {
    /// No mirroring.
    #[default]
    NoMirror,
    /// Flip U.
    Horizontal,
    /// Flip V.
    Vertical,
    /// Flip both.
    Both,
}

/// 9-slice margins as fractions of the texture size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Margin {
    /// Left.
    pub left: f64,
    /// Top.
    pub top: f64,
    /// Right.
    pub right: f64,
    /// Bottom.
    pub bottom: f64,
}

impl Margin {
    /// The same margin on all four sides.
    #[must_use]
    pub const fn uniform(m: f64) -> Self {
        Self {
            left: m,
            top: m,
            right: m,
            bottom: m,
        }
    }

    /// Whether all four margins are zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.top == 0.0 && self.right == 0.0 && self.bottom == 0.0
    }
}

/// A paint brush: an optional texture plus how to map it onto a box.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Brush {
    /// Atlas region to sample, if the brush is textured.
    pub proxy: Option<ResourceProxy>,
    /// The standalone resource object backing this brush, reported to the
    /// reference collector while cached.
    pub resource_object: Option<ResourceId>,
    /// 9-slice margins.
    pub margin: Margin,
    /// Tiling mode.
    pub tiling: TileType,
    /// Mirroring mode.
    pub mirroring: MirrorType,
    /// How the brush is drawn.
    pub draw_type: BrushDrawType,
    /// Explicit UV region overriding the proxy's, when non-empty.
    pub uv_region: Option<Rect>,
}

impl Brush {
    /// An untextured box brush.
    #[must_use]
    pub fn solid() -> Self {
        Self::default()
    }

    /// A textured image brush.
    #[must_use]
    pub fn image(proxy: ResourceProxy) -> Self {
        Self {
            proxy: Some(proxy),
            draw_type: BrushDrawType::Image,
            ..Self::default()
        }
    }

    /// The texture this brush binds, or `None` for untextured brushes.
    #[must_use]
    pub fn texture(&self) -> Option<ResourceId> {
        self.proxy.map(|p| p.resource)
    }

    /// The brush's UV region when one is set and has area.
    #[must_use]
    pub fn valid_uv_region(&self) -> Option<Rect> {
        self.uv_region.filter(|r| r.width() > 0.0 && r.height() > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_axes() {
        assert!(TileType::Both.tiles_u() && TileType::Both.tiles_v());
        assert!(TileType::Horizontal.tiles_u() && !TileType::Horizontal.tiles_v());
        assert!(!TileType::NoTile.tiles_u());
    }

    #[test]
    fn degenerate_uv_region_is_ignored() {
        let mut brush = Brush::solid();
        brush.uv_region = Some(Rect::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(brush.valid_uv_region(), None);
        brush.uv_region = Some(Rect::new(0.0, 0.0, 0.5, 0.5));
        assert!(brush.valid_uv_region().is_some());
    }

    #[test]
    fn solid_brush_has_no_texture() {
        assert_eq!(Brush::solid().texture(), None);
        let proxy = ResourceProxy::whole(ResourceId(3), Size::new(4.0, 4.0));
        assert_eq!(Brush::image(proxy).texture(), Some(ResourceId(3)));
    }
}
