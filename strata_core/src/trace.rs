// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for paint, batching and invalidation.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! instrumentation calls at each stage of a frame. All method bodies default
//! to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Timestamps are supplied by the caller in nanoseconds from an arbitrary
//! origin; this crate never reads a clock.
//!
//! [`FrameSummaryBuilder`] is a convenience helper that collects phase
//! timestamps and counters during a frame and produces a [`FrameSummary`] at
//! the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`RenderBatchRecord`] and
//!   [`ProxyUpdateRecord`] events plus the corresponding `TraceSink` methods.

use crate::batch::BatchData;
#[cfg(feature = "trace-rich")]
use crate::batch::{DrawPrimitive, RenderBatch, ShaderType};
#[cfg(feature = "trace-rich")]
use crate::fast_path::{InvalidateReason, UpdateFlags};
use crate::invalidation::CacheMiss;
use crate::widget::WidgetId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a frame is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Widget paint (draw element recording).
    Paint,
    /// Element batching and render batch creation.
    Batch,
    /// Packing vertex and index buffers.
    Pack,
    /// Handing the packed frame to the backend.
    Submit,
}

/// Outcome of an invalidation panel's per-frame cache check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheDecision {
    /// The cached content was replayed.
    Replayed,
    /// The subtree was re-recorded for the given reason.
    Recorded(CacheMiss),
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

/// Marks the end of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

/// Emitted after render batches are created from a list's batch maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStatsEvent {
    /// Non-empty layers visited.
    pub layers: u32,
    /// Render batches produced.
    pub render_batches: u32,
    /// Vertices to pack.
    pub vertices: u32,
    /// Indices to pack.
    pub indices: u32,
    /// Whether any clip state needs the stencil buffer.
    pub stencil_required: bool,
}

impl From<&BatchData> for BatchStatsEvent {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "render batch count is bounded by the u32 index format"
    )]
    fn from(data: &BatchData) -> Self {
        Self {
            layers: data.num_layers(),
            render_batches: data.render_batches().len() as u32,
            vertices: data.num_batched_vertices(),
            indices: data.num_batched_indices(),
            stencil_required: data.is_stencil_clipping_required(),
        }
    }
}

/// Emitted when an invalidation panel decides between replay and record.
#[derive(Clone, Copy, Debug)]
pub struct CacheDecisionEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// The cached subtree's root widget.
    pub child: WidgetId,
    /// Layer id the panel was painted at.
    pub layer: u32,
    /// What the panel did.
    pub decision: CacheDecision,
}

/// Summary of one fast-path update pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FastPathEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Proxies popped from the update list.
    pub processed: u32,
    /// Proxies repainted.
    pub repainted: u32,
    /// Repaint requests absorbed by an ancestor's repaint.
    pub subsumed: u32,
    /// Proxies still queued after the pass.
    pub remaining: u32,
}

/// Per-frame summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Paint phase duration in nanoseconds (0 if not measured).
    pub paint_ns: u64,
    /// Batch phase duration in nanoseconds (0 if not measured).
    pub batch_ns: u64,
    /// Pack phase duration in nanoseconds (0 if not measured).
    pub pack_ns: u64,
    /// Submit phase duration in nanoseconds (0 if not measured).
    pub submit_ns: u64,
    /// Render batches produced.
    pub render_batches: u32,
    /// Vertices packed.
    pub vertices: u32,
    /// Panels that replayed their cache.
    pub cache_hits: u32,
    /// Panels that re-recorded.
    pub cache_misses: u32,
}

/// One render batch, as recorded in rich traces.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct RenderBatchRecord {
    /// Layer id.
    pub layer: u32,
    /// Shader.
    pub shader_type: ShaderType,
    /// Topology.
    pub primitive: DrawPrimitive,
    /// Clip state index.
    pub clipping_index: Option<u32>,
    /// Vertex count.
    pub num_vertices: u32,
    /// Index count.
    pub num_indices: u32,
    /// Elements merged into the batch.
    pub num_elements: u32,
}

#[cfg(feature = "trace-rich")]
impl From<&RenderBatch> for RenderBatchRecord {
    fn from(b: &RenderBatch) -> Self {
        Self {
            layer: b.layer,
            shader_type: b.shader_type,
            primitive: b.primitive,
            clipping_index: b.clipping_index,
            num_vertices: b.num_vertices,
            num_indices: b.num_indices,
            num_elements: b.num_elements,
        }
    }
}

/// One proxy processed by a fast-path update pass, as recorded in rich traces.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct ProxyUpdateRecord {
    /// Tree index of the proxy.
    pub index: u32,
    /// Update flags when the proxy was processed.
    pub flags: UpdateFlags,
    /// Accumulated invalidation reasons.
    pub reason: InvalidateReason,
    /// Whether the proxy was repainted (as opposed to ticked only, or
    /// absorbed by an ancestor's repaint).
    pub repainted: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a frame phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a frame phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after render batches are created.
    fn on_batch_stats(&mut self, e: &BatchStatsEvent) {
        _ = e;
    }

    /// Called when an invalidation panel replays or records.
    fn on_cache_decision(&mut self, e: &CacheDecisionEvent) {
        _ = e;
    }

    /// Called after a fast-path update pass.
    fn on_fast_path(&mut self, e: &FastPathEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called once per render batch (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_render_batch(&mut self, r: &RenderBatchRecord) {
        _ = r;
    }

    /// Called once per processed proxy (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_proxy_update(&mut self, r: &ProxyUpdateRecord) {
        _ = r;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`BatchStatsEvent`].
    #[inline]
    pub fn batch_stats(&mut self, e: &BatchStatsEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_batch_stats(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CacheDecisionEvent`].
    #[inline]
    pub fn cache_decision(&mut self, e: &CacheDecisionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_cache_decision(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FastPathEvent`].
    #[inline]
    pub fn fast_path(&mut self, e: &FastPathEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_fast_path(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits one record per render batch (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn render_batches(&mut self, batches: &[RenderBatch]) {
        if let Some(s) = &mut self.sink {
            for b in batches {
                s.on_render_batch(&RenderBatchRecord::from(b));
            }
        }
    }

    /// Emits a proxy update record (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn proxy_update(&mut self, r: &ProxyUpdateRecord) {
        if let Some(s) = &mut self.sink {
            s.on_proxy_update(r);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps and counters during a frame and produces a
/// [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_index: u64,
    phase_starts: [Option<u64>; 4],
    phase_ends: [Option<u64>; 4],
    batch: BatchStatsEvent,
    cache_hits: u32,
    cache_misses: u32,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given frame.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            phase_starts: [None; 4],
            phase_ends: [None; 4],
            batch: BatchStatsEvent::default(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, timestamp_ns: u64) {
        self.phase_starts[phase_index(phase)] = Some(timestamp_ns);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, timestamp_ns: u64) {
        self.phase_ends[phase_index(phase)] = Some(timestamp_ns);
    }

    /// Records the batch statistics of the frame. A later call replaces an
    /// earlier one.
    pub fn set_batch_stats(&mut self, e: &BatchStatsEvent) {
        self.batch = *e;
    }

    /// Counts one cache decision.
    pub fn record_cache_decision(&mut self, decision: CacheDecision) {
        match decision {
            CacheDecision::Replayed => self.cache_hits += 1,
            CacheDecision::Recorded(_) => self.cache_misses += 1,
        }
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.frame_index,
            paint_ns: self.phase_duration(PhaseKind::Paint),
            batch_ns: self.phase_duration(PhaseKind::Batch),
            pack_ns: self.phase_duration(PhaseKind::Pack),
            submit_ns: self.phase_duration(PhaseKind::Submit),
            render_batches: self.batch.render_batches,
            vertices: self.batch.vertices,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Paint => 0,
        PhaseKind::Batch => 1,
        PhaseKind::Pack => 2,
        PhaseKind::Submit => 3,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_phase_begin(&PhaseBeginEvent {
            frame_index: 0,
            phase: PhaseKind::Paint,
            timestamp_ns: 0,
        });
        sink.on_batch_stats(&BatchStatsEvent::default());
        sink.on_frame_summary(&FrameSummary::default());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.batch_stats(&BatchStatsEvent::default());
        tracer.fast_path(&FastPathEvent::default());
    }

    #[test]
    fn batch_stats_from_empty_data() {
        let e = BatchStatsEvent::from(&BatchData::new());
        assert_eq!(e, BatchStatsEvent::default());
    }

    #[test]
    fn summary_builder_computes_durations() {
        let mut builder = FrameSummaryBuilder::new(42);
        builder.phase_begin(PhaseKind::Paint, 1_000);
        builder.phase_end(PhaseKind::Paint, 1_100);
        builder.phase_begin(PhaseKind::Batch, 1_100);
        builder.phase_end(PhaseKind::Batch, 1_500);
        builder.phase_begin(PhaseKind::Pack, 1_500);
        builder.phase_end(PhaseKind::Pack, 3_000);
        builder.phase_begin(PhaseKind::Submit, 3_000);
        builder.phase_end(PhaseKind::Submit, 3_050);
        builder.set_batch_stats(&BatchStatsEvent {
            layers: 2,
            render_batches: 3,
            vertices: 12,
            indices: 18,
            stencil_required: false,
        });
        builder.record_cache_decision(CacheDecision::Replayed);
        builder.record_cache_decision(CacheDecision::Recorded(CacheMiss::Invalidated));
        builder.record_cache_decision(CacheDecision::Replayed);

        let summary = builder.finish();
        assert_eq!(summary.paint_ns, 100);
        assert_eq!(summary.batch_ns, 400);
        assert_eq!(summary.pack_ns, 1500);
        assert_eq!(summary.submit_ns, 50);
        assert_eq!(summary.render_batches, 3);
        assert_eq!(summary.cache_hits, 2);
        assert_eq!(summary.cache_misses, 1);
        assert_eq!(summary.frame_index, 42);
    }

    #[test]
    fn summary_builder_missing_phases_are_zero() {
        let summary = FrameSummaryBuilder::new(1).finish();
        assert_eq!(summary.paint_ns, 0);
        assert_eq!(summary.batch_ns, 0);
        assert_eq!(summary.pack_ns, 0);
        assert_eq!(summary.submit_ns, 0);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            batches: Vec<u32>,
        }
        impl TraceSink for RecordingSink {
            fn on_batch_stats(&mut self, e: &BatchStatsEvent) {
                self.batches.push(e.render_batches);
            }
        }

        let mut sink = RecordingSink {
            batches: Vec::new(),
        };
        let mut tracer = Tracer::new(&mut sink);
        tracer.batch_stats(&BatchStatsEvent {
            render_batches: 7,
            ..BatchStatsEvent::default()
        });
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.batches, &[7]);
    }
}
