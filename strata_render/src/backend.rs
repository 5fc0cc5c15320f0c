// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for drawing a [`RenderPlan`].
//!
//! A backend owns the GPU objects: it uploads the plan's packed buffers (and
//! the buffers of every cached render data the plan references), then issues
//! one draw per [`DrawCommand`]. Custom drawers are invoked by [`submit`]
//! directly, between the backend's draws.

use strata_core::render_data::RenderDataHandle;

use crate::plan::{BackendCaps, DrawCommand, DrawSource, RenderPlan};

/// Draws render plans.
///
/// # Frame pseudocode
///
/// ```rust,ignore
/// list.batch(BatchContext::new(&config, window_size));
/// list.create_render_batches(&mut tracer);
/// plan.build(list.batch_data());
/// strata_render::submit(&plan, &mut backend);
/// list.post_draw();
/// ```
pub trait RenderBackend {
    /// What the backend supports.
    fn caps(&self) -> BackendCaps;

    /// Uploads the plan's packed vertex and index bytes.
    fn upload(&mut self, vertices: &[u8], indices: &[u8]);

    /// Makes cached render data drawable. Called once per distinct handle
    /// per plan; backends may keep their own buffers across frames.
    fn upload_cached(&mut self, handle: &RenderDataHandle);

    /// Clears the stencil buffer before stencil-clipped draws.
    fn clear_stencil(&mut self) {}

    /// Issues a packed, cached or post-process draw.
    fn draw(&mut self, command: &DrawCommand);
}

/// Uploads and draws every command of `plan`. Returns the number of commands
/// issued (custom drawers that went away in the meantime are not counted).
pub fn submit(plan: &RenderPlan, backend: &mut dyn RenderBackend) -> u32 {
    backend.upload(plan.vertex_bytes(), plan.index_bytes());
    for handle in plan.cached_buffers() {
        backend.upload_cached(handle);
    }
    if plan.is_stencil_required() {
        backend.clear_stencil();
    }
    let mut issued = 0;
    for command in plan.commands() {
        match &command.source {
            DrawSource::Custom(drawer) => {
                let Some(drawer) = drawer.upgrade() else {
                    continue;
                };
                drawer.draw(command.clip_state.as_ref());
            }
            _ => backend.draw(command),
        }
        issued += 1;
    }
    issued
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicU32, Ordering};

    use kurbo::{Point, Size, Vec2};
    use strata_core::batch::BatchContext;
    use strata_core::brush::Brush;
    use strata_core::clip::ClippingState;
    use strata_core::color::LinearColor;
    use strata_core::config::StrataConfig;
    use strata_core::element::{CustomDrawer, DrawEffects, DrawElement};
    use strata_core::element_list::WindowElementList;
    use strata_core::geometry::PaintGeometry;
    use strata_core::trace::Tracer;

    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        uploaded: usize,
        cached: usize,
        stencil_clears: u32,
        draws: Vec<u32>,
    }

    impl RenderBackend for RecordingBackend {
        fn caps(&self) -> BackendCaps {
            BackendCaps::default()
        }

        fn upload(&mut self, vertices: &[u8], _indices: &[u8]) {
            self.uploaded = vertices.len();
        }

        fn upload_cached(&mut self, _handle: &RenderDataHandle) {
            self.cached += 1;
        }

        fn clear_stencil(&mut self) {
            self.stencil_clears += 1;
        }

        fn draw(&mut self, command: &DrawCommand) {
            self.draws.push(command.layer);
        }
    }

    #[derive(Default)]
    struct CountingDrawer(AtomicU32);

    impl CustomDrawer for CountingDrawer {
        fn draw(&self, _clip: Option<&ClippingState>) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn submit_uploads_then_draws_in_order() {
        let config = StrataConfig::default();
        let window = Size::new(100.0, 100.0);
        let mut cached = WindowElementList::new(window);
        DrawElement::make_box(
            &mut cached,
            0,
            &PaintGeometry::at(Point::ZERO, Size::new(4.0, 4.0)),
            &Brush::solid(),
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        let handle = cached.cache_render_data(BatchContext::new(&config, window));

        let mut out = WindowElementList::new(window);
        DrawElement::make_box(
            &mut out,
            2,
            &PaintGeometry::at(Point::new(10.0, 10.0), Size::new(4.0, 4.0)),
            &Brush::solid(),
            DrawEffects::empty(),
            LinearColor::WHITE,
        );
        let drawer = Arc::new(CountingDrawer::default());
        DrawElement::make_custom(&mut out, 4, drawer.clone());
        DrawElement::make_cached_buffer(&mut out, 6, &handle, Vec2::new(1.0, 1.0));
        out.batch(BatchContext::new(&config, window));
        out.create_render_batches(&mut Tracer::none());

        let mut backend = RecordingBackend::default();
        let mut plan = RenderPlan::new(backend.caps());
        plan.build(out.batch_data());
        let issued = submit(&plan, &mut backend);

        assert_eq!(issued, 3);
        assert_eq!(backend.uploaded, plan.vertex_bytes().len());
        assert_eq!(backend.cached, 1);
        assert_eq!(backend.stencil_clears, 0);
        assert_eq!(backend.draws, [2, 0]);
        assert_eq!(drawer.0.load(Ordering::Relaxed), 1);
        out.post_draw();
    }
}
