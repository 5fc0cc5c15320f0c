// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The glyph atlas interface text batching reads from.

use crate::brush::ResourceId;
use crate::element::FontInfo;

/// A rasterized glyph inside an atlas page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlyphEntry {
    /// Atlas page holding the glyph.
    pub texture_index: u32,
    /// Left edge in the page, in pixels.
    pub start_u: u16,
    /// Top edge in the page, in pixels.
    pub start_v: u16,
    /// Width in pixels.
    pub size_u: u16,
    /// Height in pixels.
    pub size_v: u16,
    /// Offset from the pen position to the left edge.
    pub horizontal_offset: i16,
    /// Offset from the baseline to the top edge.
    pub vertical_offset: i16,
    /// Pen advance after the glyph.
    pub x_advance: i16,
    /// Descender of the font at this size.
    pub global_descender: i16,
    /// Whether kerning applies after this glyph.
    pub has_kerning: bool,
}

/// An atlas page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtlasTexture {
    /// The page texture.
    pub resource: ResourceId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Font metrics and glyph lookups, provided by the host.
///
/// All sizes are in pixels at the given `scale`.
pub trait GlyphAtlas {
    /// The glyph for `ch`, rasterized with the given outline thickness
    /// (zero for the fill), or `None` if the font cannot provide one.
    fn glyph(&self, font: &FontInfo, scale: f32, outline: f32, ch: char) -> Option<GlyphEntry>;

    /// Kerning between `prev` and `ch`.
    fn kerning(&self, font: &FontInfo, scale: f32, prev: char, ch: char) -> f32;

    /// Line height.
    fn max_height(&self, font: &FontInfo, scale: f32) -> f32;

    /// The page at `index`.
    fn texture(&self, index: u32) -> Option<AtlasTexture>;
}
