// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each prefixed with a tag
//! byte. [`decode`] reads them back as an iterator of [`RecordedEvent`].
//! Decoding stops at the first unknown tag or truncated record.

use strata_core::batch::{DrawPrimitive, ShaderType};
use strata_core::fast_path::{InvalidateReason, UpdateFlags};
use strata_core::invalidation::CacheMiss;
use strata_core::trace::{
    BatchStatsEvent, CacheDecision, CacheDecisionEvent, FastPathEvent, FrameSummary,
    PhaseBeginEvent, PhaseEndEvent, PhaseKind, ProxyUpdateRecord, RenderBatchRecord, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE_BEGIN: u8 = 1;
const TAG_PHASE_END: u8 = 2;
const TAG_BATCH_STATS: u8 = 3;
const TAG_CACHE_DECISION: u8 = 4;
const TAG_FAST_PATH: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_RENDER_BATCH: u8 = 7;
const TAG_PROXY_UPDATE: u8 = 8;

/// Clip index value standing for "no clip".
const NO_CLIP: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Paint => 0,
            PhaseKind::Batch => 1,
            PhaseKind::Pack => 2,
            PhaseKind::Submit => 3,
        });
    }

    fn write_decision(&mut self, d: CacheDecision) {
        self.write_u8(match d {
            CacheDecision::Replayed => 0,
            CacheDecision::Recorded(CacheMiss::NeverRecorded) => 1,
            CacheDecision::Recorded(CacheMiss::Invalidated) => 2,
            CacheDecision::Recorded(CacheMiss::GeometryChanged) => 3,
            CacheDecision::Recorded(CacheMiss::ClipChanged) => 4,
            CacheDecision::Recorded(CacheMiss::LayerOverflow) => 5,
        });
    }

    fn write_shader(&mut self, s: ShaderType) {
        self.write_u8(match s {
            ShaderType::Default => 0,
            ShaderType::Border => 1,
            ShaderType::Font => 2,
            ShaderType::LineSegment => 3,
            ShaderType::Custom => 4,
            ShaderType::PostProcess => 5,
        });
    }

    fn write_primitive(&mut self, p: DrawPrimitive) {
        self.write_u8(match p {
            DrawPrimitive::LineList => 0,
            DrawPrimitive::TriangleList => 1,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_batch_stats(&mut self, e: &BatchStatsEvent) {
        self.write_u8(TAG_BATCH_STATS);
        self.write_u32(e.layers);
        self.write_u32(e.render_batches);
        self.write_u32(e.vertices);
        self.write_u32(e.indices);
        self.write_bool(e.stencil_required);
    }

    fn on_cache_decision(&mut self, e: &CacheDecisionEvent) {
        self.write_u8(TAG_CACHE_DECISION);
        self.write_u64(e.frame_index);
        self.write_u32(e.child.index());
        self.write_u32(e.child.generation());
        self.write_u32(e.layer);
        self.write_decision(e.decision);
    }

    fn on_fast_path(&mut self, e: &FastPathEvent) {
        self.write_u8(TAG_FAST_PATH);
        self.write_u64(e.frame_index);
        self.write_u32(e.processed);
        self.write_u32(e.repainted);
        self.write_u32(e.subsumed);
        self.write_u32(e.remaining);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u64(s.paint_ns);
        self.write_u64(s.batch_ns);
        self.write_u64(s.pack_ns);
        self.write_u64(s.submit_ns);
        self.write_u32(s.render_batches);
        self.write_u32(s.vertices);
        self.write_u32(s.cache_hits);
        self.write_u32(s.cache_misses);
    }

    fn on_render_batch(&mut self, r: &RenderBatchRecord) {
        self.write_u8(TAG_RENDER_BATCH);
        self.write_u32(r.layer);
        self.write_shader(r.shader_type);
        self.write_primitive(r.primitive);
        self.write_u32(r.clipping_index.unwrap_or(NO_CLIP));
        self.write_u32(r.num_vertices);
        self.write_u32(r.num_indices);
        self.write_u32(r.num_elements);
    }

    fn on_proxy_update(&mut self, r: &ProxyUpdateRecord) {
        self.write_u8(TAG_PROXY_UPDATE);
        self.write_u32(r.index);
        self.write_u8(r.flags.bits());
        self.write_u8(r.reason.bits());
        self.write_bool(r.repainted);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`BatchStatsEvent`].
    BatchStats(BatchStatsEvent),
    /// A [`CacheDecisionEvent`], with the widget id split into its parts.
    CacheDecision {
        /// Frame counter.
        frame_index: u64,
        /// Slot index of the cached widget.
        child_index: u32,
        /// Generation of the cached widget.
        child_generation: u32,
        /// Layer id the panel was painted at.
        layer: u32,
        /// What the panel did.
        decision: CacheDecision,
    },
    /// A [`FastPathEvent`].
    FastPath(FastPathEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// A [`RenderBatchRecord`].
    RenderBatch(RenderBatchRecord),
    /// A [`ProxyUpdateRecord`].
    ProxyUpdate(ProxyUpdateRecord),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Paint,
            1 => PhaseKind::Batch,
            2 => PhaseKind::Pack,
            _ => PhaseKind::Submit,
        })
    }

    fn read_decision(&mut self) -> Option<CacheDecision> {
        Some(match self.read_u8()? {
            0 => CacheDecision::Replayed,
            1 => CacheDecision::Recorded(CacheMiss::NeverRecorded),
            2 => CacheDecision::Recorded(CacheMiss::Invalidated),
            3 => CacheDecision::Recorded(CacheMiss::GeometryChanged),
            4 => CacheDecision::Recorded(CacheMiss::ClipChanged),
            _ => CacheDecision::Recorded(CacheMiss::LayerOverflow),
        })
    }

    fn read_shader(&mut self) -> Option<ShaderType> {
        Some(match self.read_u8()? {
            0 => ShaderType::Default,
            1 => ShaderType::Border,
            2 => ShaderType::Font,
            3 => ShaderType::LineSegment,
            4 => ShaderType::Custom,
            _ => ShaderType::PostProcess,
        })
    }

    fn read_primitive(&mut self) -> Option<DrawPrimitive> {
        Some(match self.read_u8()? {
            0 => DrawPrimitive::LineList,
            _ => DrawPrimitive::TriangleList,
        })
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp_ns: self.read_u64()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp_ns: self.read_u64()?,
        }))
    }

    fn decode_batch_stats(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BatchStats(BatchStatsEvent {
            layers: self.read_u32()?,
            render_batches: self.read_u32()?,
            vertices: self.read_u32()?,
            indices: self.read_u32()?,
            stencil_required: self.read_bool()?,
        }))
    }

    fn decode_cache_decision(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CacheDecision {
            frame_index: self.read_u64()?,
            child_index: self.read_u32()?,
            child_generation: self.read_u32()?,
            layer: self.read_u32()?,
            decision: self.read_decision()?,
        })
    }

    fn decode_fast_path(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FastPath(FastPathEvent {
            frame_index: self.read_u64()?,
            processed: self.read_u32()?,
            repainted: self.read_u32()?,
            subsumed: self.read_u32()?,
            remaining: self.read_u32()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            paint_ns: self.read_u64()?,
            batch_ns: self.read_u64()?,
            pack_ns: self.read_u64()?,
            submit_ns: self.read_u64()?,
            render_batches: self.read_u32()?,
            vertices: self.read_u32()?,
            cache_hits: self.read_u32()?,
            cache_misses: self.read_u32()?,
        }))
    }

    fn decode_render_batch(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RenderBatch(RenderBatchRecord {
            layer: self.read_u32()?,
            shader_type: self.read_shader()?,
            primitive: self.read_primitive()?,
            clipping_index: Some(self.read_u32()?).filter(|&i| i != NO_CLIP),
            num_vertices: self.read_u32()?,
            num_indices: self.read_u32()?,
            num_elements: self.read_u32()?,
        }))
    }

    fn decode_proxy_update(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ProxyUpdate(ProxyUpdateRecord {
            index: self.read_u32()?,
            flags: UpdateFlags::from_bits_truncate(self.read_u8()?),
            reason: InvalidateReason::from_bits_truncate(self.read_u8()?),
            repainted: self.read_bool()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<RecordedEvent> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_BATCH_STATS => self.decode_batch_stats(),
            TAG_CACHE_DECISION => self.decode_cache_decision(),
            TAG_FAST_PATH => self.decode_fast_path(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_RENDER_BATCH => self.decode_render_batch(),
            TAG_PROXY_UPDATE => self.decode_proxy_update(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_events_decode() {
        let mut rec = RecorderSink::new();
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 3,
            phase: PhaseKind::Batch,
            timestamp_ns: 1_000,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 3,
            phase: PhaseKind::Batch,
            timestamp_ns: 1_500,
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[1] {
            RecordedEvent::PhaseEnd(e) => {
                assert_eq!(e.frame_index, 3);
                assert_eq!(e.phase, PhaseKind::Batch);
                assert_eq!(e.timestamp_ns, 1_500);
            }
            other => panic!("expected PhaseEnd, got {other:?}"),
        }
    }

    #[test]
    fn stats_and_summary_decode() {
        let mut rec = RecorderSink::new();
        let stats = BatchStatsEvent {
            layers: 2,
            render_batches: 5,
            vertices: 40,
            indices: 60,
            stencil_required: true,
        };
        let summary = FrameSummary {
            frame_index: 9,
            paint_ns: 100,
            batch_ns: 200,
            render_batches: 5,
            cache_hits: 3,
            ..FrameSummary::default()
        };
        let fast_path = FastPathEvent {
            frame_index: 9,
            processed: 4,
            repainted: 1,
            subsumed: 2,
            remaining: 1,
        };
        rec.on_batch_stats(&stats);
        rec.on_frame_summary(&summary);
        rec.on_fast_path(&fast_path);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(matches!(&events[0], RecordedEvent::BatchStats(e) if *e == stats));
        assert!(matches!(&events[1], RecordedEvent::FrameSummary(s) if *s == summary));
        assert!(matches!(&events[2], RecordedEvent::FastPath(e) if *e == fast_path));
    }

    #[test]
    fn rich_records_decode() {
        let mut rec = RecorderSink::new();
        rec.on_render_batch(&RenderBatchRecord {
            layer: 4,
            shader_type: ShaderType::Font,
            primitive: DrawPrimitive::TriangleList,
            clipping_index: None,
            num_vertices: 8,
            num_indices: 12,
            num_elements: 1,
        });
        rec.on_proxy_update(&ProxyUpdateRecord {
            index: 7,
            flags: UpdateFlags::REPAINT | UpdateFlags::TICK,
            reason: InvalidateReason::LAYOUT,
            repainted: true,
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        match &events[0] {
            RecordedEvent::RenderBatch(r) => {
                assert_eq!(r.shader_type, ShaderType::Font);
                assert_eq!(r.clipping_index, None);
                assert_eq!(r.num_indices, 12);
            }
            other => panic!("expected RenderBatch, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::ProxyUpdate(r) => {
                assert_eq!(r.flags, UpdateFlags::REPAINT | UpdateFlags::TICK);
                assert_eq!(r.reason, InvalidateReason::LAYOUT);
                assert!(r.repainted);
            }
            other => panic!("expected ProxyUpdate, got {other:?}"),
        }
    }

    #[test]
    fn truncated_and_unknown_records_stop_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_fast_path(&FastPathEvent::default());
        let mut bytes = rec.into_bytes();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(decode(&bytes).count(), 0);
        assert_eq!(decode(&[0xff, 1, 2, 3]).count(), 0);
        assert_eq!(decode(&[]).count(), 0);
    }
}
