// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw elements: immutable records of one visual primitive.
//!
//! Elements are created through the `DrawElement::make_*` factories, which
//! append to the currently active draw layer of a
//! [`WindowElementList`]. Every factory captures the current clip index and
//! culls (appends nothing) when the element could not produce visible pixels:
//!
//! - the local size is zero in X or Y (line and spline elements are exempt),
//! - the tint is fully transparent,
//! - the text is empty,
//! - the brush has [`BrushDrawType::NoDrawType`],
//! - the current clip state has zero area.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;
use kurbo::{Affine, Point, Size, Vec2};

use crate::batch::{BatchDrawFlags, InstanceData, SlateVertex};
use crate::brush::{Brush, BrushDrawType, ResourceId};
use crate::clip::ClippingState;
use crate::color::LinearColor;
use crate::element_list::{DrawLayerHandle, WindowElementList};
use crate::geometry::PaintGeometry;
use crate::render_data::RenderDataHandle;

bitflags! {
    /// Per-element rendering effects.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DrawEffects: u8 {
        /// Skip rounding vertex positions to whole pixels.
        const NO_PIXEL_SNAPPING = 1 << 0;
        /// Draw desaturated, as for disabled widgets.
        const DISABLED_EFFECT = 1 << 1;
        /// Ignore the texture's alpha channel.
        const IGNORE_TEXTURE_ALPHA = 1 << 2;
        /// Colors are already multiplied by alpha.
        const PRE_MULTIPLIED_ALPHA = 1 << 3;
        /// Skip gamma correction.
        const NO_GAMMA = 1 << 4;
        /// Invert the alpha channel.
        const INVERT_ALPHA = 1 << 5;
        /// Disable blending.
        const NO_BLENDING = 1 << 6;
    }
}

impl DrawEffects {
    /// Whether vertex positions are rounded to whole pixels.
    #[inline]
    #[must_use]
    pub const fn is_pixel_snapped(self) -> bool {
        !self.contains(Self::NO_PIXEL_SNAPPING)
    }
}

/// Draws directly through the render backend instead of through batched
/// geometry.
///
/// Custom drawers are never merged with other batches. The render plan holds
/// them weakly; a drawer dropped before submission is skipped.
pub trait CustomDrawer: Send + Sync {
    /// Issues the drawer's commands with the batch's clip state.
    fn draw(&self, clip: Option<&ClippingState>);
}

/// A weak, identity-compared reference to a [`CustomDrawer`].
#[derive(Clone)]
pub struct CustomDrawerRef(Weak<dyn CustomDrawer>);

impl CustomDrawerRef {
    /// Downgrades a drawer.
    #[must_use]
    pub fn new(drawer: &Arc<dyn CustomDrawer>) -> Self {
        Self(Arc::downgrade(drawer))
    }

    /// The drawer, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn CustomDrawer>> {
        self.0.upgrade()
    }
}

impl PartialEq for CustomDrawerRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CustomDrawerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomDrawerRef")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

/// Font selection for text elements.
#[derive(Clone, Debug, PartialEq)]
pub struct FontInfo {
    /// Host-defined font face identifier.
    pub face: u32,
    /// Nominal size in points.
    pub size: f32,
    /// Outline thickness; zero draws no outline.
    pub outline_size: f32,
    /// Outline color.
    pub outline_color: LinearColor,
    /// The resource object backing the face, reported while cached.
    pub font_object: Option<ResourceId>,
}

impl FontInfo {
    /// A font without outline.
    #[must_use]
    pub fn new(face: u32, size: f32) -> Self {
        Self {
            face,
            size,
            outline_size: 0.0,
            outline_color: LinearColor::BLACK,
            font_object: None,
        }
    }
}

/// One color stop of a gradient, positioned in local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    /// Local position; only the axis the gradient runs along is used.
    pub position: Point,
    /// Stop color.
    pub color: LinearColor,
}

impl GradientStop {
    /// Creates a stop.
    #[must_use]
    pub const fn new(position: Point, color: LinearColor) -> Self {
        Self { position, color }
    }
}

/// The axis a gradient's stop lines are laid out along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Stops are horizontal lines; colors vary from top to bottom.
    Horizontal,
    /// Stops are vertical lines; colors vary from left to right.
    Vertical,
}

/// A render target drawn by a viewport element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportTexture {
    /// The render target resource.
    pub resource: ResourceId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Describes an embedded viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportInfo {
    /// The texture to draw, if the viewport has rendered one.
    pub texture: Option<ViewportTexture>,
    /// Whether the texture is stretched to the element size.
    pub allow_scaling: bool,
    /// Whether the texture only has an alpha channel.
    pub alpha_only: bool,
    /// Whether presenting this viewport requires vsync.
    pub requires_vsync: bool,
}

/// Box and border payload.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxPayload {
    /// The brush.
    pub brush: Brush,
    /// Tint multiplied into every vertex.
    pub tint: LinearColor,
}

/// Text payload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextPayload {
    /// The characters to draw; `'\n'` starts a new line.
    pub text: String,
    /// The font.
    pub font: FontInfo,
    /// Fill color.
    pub tint: LinearColor,
}

/// Polyline payload.
#[derive(Clone, Debug, PartialEq)]
pub struct LinesPayload {
    /// Local-space points.
    pub points: Vec<Point>,
    /// Optional per-point colors, multiplied by the tint.
    pub point_colors: Option<Vec<LinearColor>>,
    /// Base color.
    pub tint: LinearColor,
    /// Draw a filtered, mitered strip with end caps.
    pub antialias: bool,
    /// Thickness in window pixels.
    pub thickness: f32,
}

/// Cubic Bezier payload.
#[derive(Clone, Debug, PartialEq)]
pub struct SplinePayload {
    /// Control points.
    pub points: [Point; 4],
    /// Thickness in window pixels.
    pub thickness: f32,
    /// Color used when there are no gradient stops.
    pub tint: LinearColor,
    /// Colors distributed along the curve; a single stop replaces the tint.
    pub gradient_stops: Vec<GradientStop>,
}

/// Gradient payload.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientPayload {
    /// Stops sorted along the gradient axis; never empty.
    pub stops: Vec<GradientStop>,
    /// Gradient orientation.
    pub orientation: Orientation,
}

/// Custom vertex payload.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomVertsPayload {
    /// Texture to bind.
    pub resource: Option<ResourceId>,
    /// Vertices, already in window space.
    pub vertices: Vec<SlateVertex>,
    /// Indices into `vertices`.
    pub indices: Vec<u32>,
    /// Instancing parameters.
    pub instance: Option<InstanceData>,
}

/// Post-process pass payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostProcessPayload {
    /// Effect parameters (for example blur strength and kernel size).
    pub params: Vec2,
    /// Downsample factor applied before the pass.
    pub downsample: i32,
}

/// What a draw element draws.
#[derive(Clone)]
pub enum ElementKind {
    /// Wireframe quad covering the geometry.
    DebugQuad,
    /// A brush box, optionally 9-sliced.
    Box(BoxPayload),
    /// A 9-slice box without center.
    Border(BoxPayload),
    /// A run of text.
    Text(TextPayload),
    /// A polyline.
    Lines(LinesPayload),
    /// A cubic Bezier curve.
    Spline(SplinePayload),
    /// A linear gradient.
    Gradient(GradientPayload),
    /// An embedded viewport texture.
    Viewport(ViewportInfo, LinearColor),
    /// A custom drawer.
    Custom(Arc<dyn CustomDrawer>),
    /// Caller-provided vertices.
    CustomVerts(CustomVertsPayload),
    /// Previously packed render data, drawn at an offset.
    CachedBuffer(RenderDataHandle, Vec2),
    /// Inlines a logical draw layer.
    Layer(DrawLayerHandle),
    /// A post-process pass over the region.
    PostProcess(PostProcessPayload),
}

impl ElementKind {
    /// Short name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DebugQuad => "debug_quad",
            Self::Box(_) => "box",
            Self::Border(_) => "border",
            Self::Text(_) => "text",
            Self::Lines(_) => "lines",
            Self::Spline(_) => "spline",
            Self::Gradient(_) => "gradient",
            Self::Viewport(..) => "viewport",
            Self::Custom(_) => "custom",
            Self::CustomVerts(_) => "custom_verts",
            Self::CachedBuffer(..) => "cached_buffer",
            Self::Layer(_) => "layer",
            Self::PostProcess(_) => "post_process",
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded visual primitive.
#[derive(Clone, Debug)]
pub struct DrawElement {
    pub(crate) kind: ElementKind,
    pub(crate) layer: u32,
    pub(crate) render_transform: Affine,
    pub(crate) position: Point,
    pub(crate) local_size: Size,
    pub(crate) scale: f64,
    pub(crate) effects: DrawEffects,
    pub(crate) batch_flags: BatchDrawFlags,
    pub(crate) clipping_index: Option<u32>,
    pub(crate) scene_index: i8,
}

impl DrawElement {
    fn setup(
        out: &WindowElementList,
        kind: ElementKind,
        layer: u32,
        geometry: &PaintGeometry,
        effects: DrawEffects,
    ) -> Self {
        Self {
            kind,
            layer,
            render_transform: geometry.render_transform,
            position: geometry.draw_position,
            local_size: geometry.local_size,
            scale: geometry.draw_scale,
            effects,
            batch_flags: BatchDrawFlags::from_effects(effects),
            clipping_index: out.clipping_index(),
            scene_index: out.scene_index(),
        }
    }

    /// What the element draws.
    #[must_use]
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Layer id.
    #[must_use]
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Local-to-window transform.
    #[must_use]
    pub fn render_transform(&self) -> Affine {
        self.render_transform
    }

    /// Window-space layout position.
    #[must_use]
    pub fn position(&self) -> Point {
        self.position
    }

    /// Size in local units.
    #[must_use]
    pub fn local_size(&self) -> Size {
        self.local_size
    }

    /// Layout scale.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Draw effects.
    #[must_use]
    pub fn effects(&self) -> DrawEffects {
        self.effects
    }

    /// Index of the clip state active at creation.
    #[must_use]
    pub fn clipping_index(&self) -> Option<u32> {
        self.clipping_index
    }

    /// Scene index.
    #[must_use]
    pub fn scene_index(&self) -> i8 {
        self.scene_index
    }

    /// Translates the element in window space.
    pub fn apply_position_offset(&mut self, offset: Vec2) {
        self.position += offset;
        self.render_transform = Affine::translate(offset) * self.render_transform;
        if let ElementKind::CachedBuffer(_, buffer_offset) = &mut self.kind {
            *buffer_offset += offset;
        }
    }

    /// Calls `f` with every resource object the element keeps alive.
    pub(crate) fn for_each_resource_object(&self, mut f: impl FnMut(ResourceId)) {
        match &self.kind {
            ElementKind::Box(p) | ElementKind::Border(p) => {
                if let Some(id) = p.brush.resource_object {
                    f(id);
                }
            }
            ElementKind::Text(p) => {
                if let Some(id) = p.font.font_object {
                    f(id);
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Factories
    // -----------------------------------------------------------------------

    /// Appends a wireframe quad covering `geometry`.
    pub fn make_debug_quad(out: &mut WindowElementList, layer: u32, geometry: &PaintGeometry) {
        if out.should_cull(geometry, None, false) {
            return;
        }
        let e = Self::setup(out, ElementKind::DebugQuad, layer, geometry, DrawEffects::empty());
        out.push_element(e);
    }

    /// Appends a brush box. Brushes drawn as [`BrushDrawType::Border`]
    /// produce a border element.
    pub fn make_box(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        brush: &Brush,
        effects: DrawEffects,
        tint: LinearColor,
    ) {
        if brush.draw_type == BrushDrawType::NoDrawType
            || out.should_cull(geometry, Some(tint), false)
        {
            return;
        }
        let payload = BoxPayload {
            brush: brush.clone(),
            tint,
        };
        let kind = if brush.draw_type == BrushDrawType::Border {
            ElementKind::Border(payload)
        } else {
            ElementKind::Box(payload)
        };
        let e = Self::setup(out, kind, layer, geometry, effects);
        out.push_element(e);
    }

    /// Appends a run of text.
    pub fn make_text(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        text: &str,
        font: &FontInfo,
        effects: DrawEffects,
        tint: LinearColor,
    ) {
        if text.is_empty() || out.should_cull(geometry, Some(tint), false) {
            return;
        }
        let kind = ElementKind::Text(TextPayload {
            text: String::from(text),
            font: font.clone(),
            tint,
        });
        let e = Self::setup(out, kind, layer, geometry, effects);
        out.push_element(e);
    }

    /// Appends a gradient.
    ///
    /// # Panics
    ///
    /// Panics if `stops` is empty.
    pub fn make_gradient(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        stops: Vec<GradientStop>,
        orientation: Orientation,
        effects: DrawEffects,
    ) {
        assert!(!stops.is_empty(), "gradient requires at least one stop");
        if out.should_cull(geometry, None, false) {
            return;
        }
        let kind = ElementKind::Gradient(GradientPayload { stops, orientation });
        let e = Self::setup(out, kind, layer, geometry, effects);
        out.push_element(e);
    }

    /// Appends a Hermite spline given by end points and tangents.
    pub fn make_spline(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        start: Point,
        start_dir: Vec2,
        end: Point,
        end_dir: Vec2,
        thickness: f32,
        effects: DrawEffects,
        tint: LinearColor,
    ) {
        let [p0, p1, p2, p3] = hermite_to_bezier(start, start_dir, end, end_dir);
        Self::make_cubic_bezier_spline(out, layer, geometry, p0, p1, p2, p3, thickness, effects, tint);
    }

    /// Appends a cubic Bezier spline.
    pub fn make_cubic_bezier_spline(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        p0: Point,
        p1: Point,
        p2: Point,
        p3: Point,
        thickness: f32,
        effects: DrawEffects,
        tint: LinearColor,
    ) {
        if out.should_cull(geometry, Some(tint), true) {
            return;
        }
        let kind = ElementKind::Spline(SplinePayload {
            points: [p0, p1, p2, p3],
            thickness,
            tint,
            gradient_stops: Vec::new(),
        });
        let e = Self::setup(out, kind, layer, geometry, effects);
        out.push_element(e);
    }

    /// Appends a Hermite spline whose points are already in window space.
    pub fn make_draw_space_spline(
        out: &mut WindowElementList,
        layer: u32,
        start: Point,
        start_dir: Vec2,
        end: Point,
        end_dir: Vec2,
        thickness: f32,
        effects: DrawEffects,
        tint: LinearColor,
    ) {
        let geometry = PaintGeometry::at(Point::ZERO, Size::ZERO);
        Self::make_spline(
            out, layer, &geometry, start, start_dir, end, end_dir, thickness, effects, tint,
        );
    }

    /// Appends a window-space Hermite spline whose color follows `stops`.
    pub fn make_draw_space_gradient_spline(
        out: &mut WindowElementList,
        layer: u32,
        start: Point,
        start_dir: Vec2,
        end: Point,
        end_dir: Vec2,
        stops: Vec<GradientStop>,
        thickness: f32,
        effects: DrawEffects,
    ) {
        let geometry = PaintGeometry::at(Point::ZERO, Size::ZERO);
        if out.should_cull(&geometry, None, true) {
            return;
        }
        let kind = ElementKind::Spline(SplinePayload {
            points: hermite_to_bezier(start, start_dir, end, end_dir),
            thickness,
            tint: LinearColor::WHITE,
            gradient_stops: stops,
        });
        let e = Self::setup(out, kind, layer, &geometry, effects);
        out.push_element(e);
    }

    /// Appends a polyline. Fewer than two points draw nothing.
    pub fn make_lines(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        points: Vec<Point>,
        point_colors: Option<Vec<LinearColor>>,
        effects: DrawEffects,
        tint: LinearColor,
        antialias: bool,
        thickness: f32,
    ) {
        if points.len() < 2 || out.should_cull(geometry, Some(tint), true) {
            return;
        }
        let kind = ElementKind::Lines(LinesPayload {
            points,
            point_colors,
            tint,
            antialias,
            thickness,
        });
        let e = Self::setup(out, kind, layer, geometry, effects);
        out.push_element(e);
    }

    /// Appends an embedded viewport.
    pub fn make_viewport(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        viewport: &ViewportInfo,
        effects: DrawEffects,
        tint: LinearColor,
    ) {
        if out.should_cull(geometry, Some(tint), false) {
            return;
        }
        let e = Self::setup(
            out,
            ElementKind::Viewport(*viewport, tint),
            layer,
            geometry,
            effects,
        );
        out.push_element(e);
    }

    /// Appends a custom drawer.
    pub fn make_custom(out: &mut WindowElementList, layer: u32, drawer: Arc<dyn CustomDrawer>) {
        if out.should_cull_clip_only() {
            return;
        }
        let geometry = PaintGeometry::at(Point::ZERO, Size::ZERO);
        let e = Self::setup(out, ElementKind::Custom(drawer), layer, &geometry, DrawEffects::empty());
        out.push_element(e);
    }

    /// Appends caller-provided vertices and indices.
    pub fn make_custom_verts(
        out: &mut WindowElementList,
        layer: u32,
        resource: Option<ResourceId>,
        vertices: Vec<SlateVertex>,
        indices: Vec<u32>,
        instance: Option<InstanceData>,
        effects: DrawEffects,
    ) {
        if out.should_cull_clip_only() {
            return;
        }
        let geometry = PaintGeometry::at(Point::ZERO, Size::ZERO);
        let kind = ElementKind::CustomVerts(CustomVertsPayload {
            resource,
            vertices,
            indices,
            instance,
        });
        let e = Self::setup(out, kind, layer, &geometry, effects);
        out.push_element(e);
    }

    /// Appends previously packed render data, drawn translated by `offset`.
    pub fn make_cached_buffer(
        out: &mut WindowElementList,
        layer: u32,
        handle: &RenderDataHandle,
        offset: Vec2,
    ) {
        if out.should_cull_clip_only() {
            return;
        }
        let geometry = PaintGeometry::at(Point::ZERO, Size::ZERO);
        let kind = ElementKind::CachedBuffer(handle.clone(), offset);
        let e = Self::setup(out, kind, layer, &geometry, DrawEffects::empty());
        out.begin_using_cached_buffer(handle);
        out.push_element(e);
    }

    /// Appends a reference to a logical draw layer, whose batches are inlined
    /// at this element's position.
    pub fn make_layer(out: &mut WindowElementList, layer: u32, handle: &DrawLayerHandle) {
        let geometry = PaintGeometry::at(Point::ZERO, Size::ZERO);
        let kind = ElementKind::Layer(handle.clone());
        let e = Self::setup(out, kind, layer, &geometry, DrawEffects::empty());
        out.push_element(e);
    }

    /// Appends a post-process pass over the region covered by `geometry`.
    pub fn make_post_process_pass(
        out: &mut WindowElementList,
        layer: u32,
        geometry: &PaintGeometry,
        params: Vec2,
        downsample: i32,
    ) {
        if out.should_cull(geometry, None, false) {
            return;
        }
        let kind = ElementKind::PostProcess(PostProcessPayload { params, downsample });
        let e = Self::setup(out, kind, layer, geometry, DrawEffects::empty());
        out.push_element(e);
    }
}

/// Converts a Hermite segment to cubic Bezier control points.
fn hermite_to_bezier(start: Point, start_dir: Vec2, end: Point, end_dir: Vec2) -> [Point; 4] {
    [start, start + start_dir / 3.0, end - end_dir / 3.0, end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    use crate::clip::ClippingZone;

    fn geometry(w: f64, h: f64) -> PaintGeometry {
        PaintGeometry::at(Point::new(10.0, 10.0), Size::new(w, h))
    }

    #[test]
    fn zero_size_box_is_culled() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        DrawElement::make_box(
            &mut list,
            0,
            &geometry(0.0, 10.0),
            &Brush::solid(),
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        assert_eq!(list.root_elements().len(), 0);
    }

    #[test]
    fn transparent_box_is_culled() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        DrawElement::make_box(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            &Brush::solid(),
            DrawEffects::empty(),
            LinearColor::TRANSPARENT,
        );
        assert_eq!(list.root_elements().len(), 0);
    }

    #[test]
    fn brush_without_draw_type_is_culled() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        let brush = Brush {
            draw_type: BrushDrawType::NoDrawType,
            ..Brush::solid()
        };
        DrawElement::make_box(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            &brush,
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        assert!(list.root_elements().is_empty());
    }

    #[test]
    fn empty_text_is_culled() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        let font = FontInfo::new(0, 12.0);
        DrawElement::make_text(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            "",
            &font,
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        assert!(list.root_elements().is_empty());
    }

    #[test]
    fn zero_area_clip_culls_everything() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        list.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 0.0, 10.0)));
        DrawElement::make_box(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            &Brush::solid(),
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        assert!(list.root_elements().is_empty());
    }

    #[test]
    fn lines_are_exempt_from_size_culling() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        DrawElement::make_lines(
            &mut list,
            0,
            &geometry(0.0, 0.0),
            alloc::vec![Point::ZERO, Point::new(5.0, 5.0)],
            None,
            DrawEffects::empty(),
            LinearColor::WHITE,
            true,
            1.0,
        );
        assert_eq!(list.root_elements().len(), 1);
    }

    #[test]
    fn single_point_lines_are_culled() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        DrawElement::make_lines(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            alloc::vec![Point::new(5.0, 5.0)],
            None,
            DrawEffects::empty(),
            LinearColor::WHITE,
            true,
            1.0,
        );
        assert!(list.root_elements().is_empty());
    }

    #[test]
    fn elements_capture_current_clip_index() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        let idx = list.push_clip(ClippingZone::from_rect(Rect::new(0.0, 0.0, 50.0, 50.0)));
        DrawElement::make_debug_quad(&mut list, 2, &geometry(10.0, 10.0));
        list.pop_clip();
        DrawElement::make_debug_quad(&mut list, 2, &geometry(10.0, 10.0));
        let elements = list.root_elements();
        assert_eq!(elements[0].clipping_index(), Some(idx));
        assert_eq!(elements[1].clipping_index(), None);
    }

    #[test]
    fn border_brush_makes_border_element() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        let brush = Brush {
            draw_type: BrushDrawType::Border,
            ..Brush::solid()
        };
        DrawElement::make_box(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            &brush,
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        assert!(matches!(list.root_elements()[0].kind(), ElementKind::Border(_)));
    }

    #[test]
    fn hermite_control_points_are_thirds_of_tangents() {
        let p = hermite_to_bezier(
            Point::ZERO,
            Vec2::new(30.0, 0.0),
            Point::new(100.0, 0.0),
            Vec2::new(30.0, 0.0),
        );
        assert_eq!(p[1], Point::new(10.0, 0.0));
        assert_eq!(p[2], Point::new(90.0, 0.0));
    }

    #[test]
    fn position_offset_moves_transform_and_cached_offset() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        DrawElement::make_debug_quad(&mut list, 0, &geometry(4.0, 4.0));
        let mut e = list.root_elements()[0].clone();
        e.apply_position_offset(Vec2::new(5.0, 0.0));
        assert_eq!(e.position(), Point::new(15.0, 10.0));
        assert_eq!(e.render_transform() * Point::ZERO, Point::new(15.0, 10.0));
    }

    #[test]
    #[should_panic(expected = "gradient requires at least one stop")]
    fn gradient_without_stops_panics() {
        let mut list = WindowElementList::new(Size::new(800.0, 600.0));
        DrawElement::make_gradient(
            &mut list,
            0,
            &geometry(10.0, 10.0),
            Vec::new(),
            Orientation::Vertical,
            DrawEffects::empty(),
        );
    }
}
