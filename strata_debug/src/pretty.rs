// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Nanosecond
//! timestamps and durations are printed in microseconds.

use std::io::Write;

use strata_core::trace::{
    BatchStatsEvent, CacheDecision, CacheDecisionEvent, FastPathEvent, FrameSummary,
    PhaseBeginEvent, PhaseEndEvent, PhaseKind, ProxyUpdateRecord, RenderBatchRecord, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Paint => "paint",
        PhaseKind::Batch => "batch",
        PhaseKind::Pack => "pack",
        PhaseKind::Submit => "submit",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            ns_to_us(e.timestamp_ns),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            ns_to_us(e.timestamp_ns),
        );
    }

    fn on_batch_stats(&mut self, e: &BatchStatsEvent) {
        let stencil = if e.stencil_required { " stencil" } else { "" };
        let _ = writeln!(
            self.writer,
            "[batches] layers={} batches={} vertices={} indices={}{stencil}",
            e.layers, e.render_batches, e.vertices, e.indices,
        );
    }

    fn on_cache_decision(&mut self, e: &CacheDecisionEvent) {
        let _ = match e.decision {
            CacheDecision::Replayed => writeln!(
                self.writer,
                "[cache] frame={} {:?} layer={} replayed",
                e.frame_index, e.child, e.layer,
            ),
            CacheDecision::Recorded(miss) => writeln!(
                self.writer,
                "[cache] frame={} {:?} layer={} recorded ({miss})",
                e.frame_index, e.child, e.layer,
            ),
        };
    }

    fn on_fast_path(&mut self, e: &FastPathEvent) {
        let _ = writeln!(
            self.writer,
            "[fast-path] frame={} processed={} repainted={} subsumed={} remaining={}",
            e.frame_index, e.processed, e.repainted, e.subsumed, e.remaining,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} paint={:.1}µs batch={:.1}µs pack={:.1}µs \
             submit={:.1}µs batches={} vertices={} cache={}/{}",
            s.frame_index,
            ns_to_us(s.paint_ns),
            ns_to_us(s.batch_ns),
            ns_to_us(s.pack_ns),
            ns_to_us(s.submit_ns),
            s.render_batches,
            s.vertices,
            s.cache_hits,
            s.cache_hits + s.cache_misses,
        );
    }

    fn on_render_batch(&mut self, r: &RenderBatchRecord) {
        let _ = writeln!(
            self.writer,
            "[batch] layer={} {:?}/{:?} clip={:?} vertices={} indices={} elements={}",
            r.layer,
            r.shader_type,
            r.primitive,
            r.clipping_index,
            r.num_vertices,
            r.num_indices,
            r.num_elements,
        );
    }

    fn on_proxy_update(&mut self, r: &ProxyUpdateRecord) {
        let _ = writeln!(
            self.writer,
            "[proxy] index={} flags={:?} reason={:?} repainted={}",
            r.index, r.flags, r.reason, r.repainted,
        );
    }
}
