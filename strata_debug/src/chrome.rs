// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};
use strata_core::trace::CacheDecision;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Phases become duration events. Events that carry no timestamp of their
/// own are placed at the most recent phase boundary.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut now_us = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::PhaseBegin(e) => {
                now_us = ns_to_us(e.timestamp_ns);
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                now_us = ns_to_us(e.timestamp_ns);
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::BatchStats(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "BatchStats",
                    "cat": "Batch",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "layers": e.layers,
                        "render_batches": e.render_batches,
                        "vertices": e.vertices,
                        "indices": e.indices,
                        "stencil_required": e.stencil_required,
                    }
                }));
            }
            RecordedEvent::CacheDecision {
                frame_index,
                child_index,
                child_generation,
                layer,
                decision,
            } => {
                let (name, reason) = match decision {
                    CacheDecision::Replayed => ("CacheReplay", None),
                    CacheDecision::Recorded(miss) => ("CacheRecord", Some(miss.to_string())),
                };
                events.push(json!({
                    "ph": "i",
                    "name": name,
                    "cat": "Cache",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": frame_index,
                        "widget": format!("{child_index}@gen{child_generation}"),
                        "layer": layer,
                        "reason": reason,
                    }
                }));
            }
            RecordedEvent::FastPath(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FastPath",
                    "cat": "Update",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "processed": e.processed,
                        "repainted": e.repainted,
                        "subsumed": e.subsumed,
                        "remaining": e.remaining,
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": s.frame_index,
                        "paint_us": ns_to_us(s.paint_ns),
                        "batch_us": ns_to_us(s.batch_ns),
                        "pack_us": ns_to_us(s.pack_ns),
                        "submit_us": ns_to_us(s.submit_ns),
                        "render_batches": s.render_batches,
                        "vertices": s.vertices,
                        "cache_hits": s.cache_hits,
                        "cache_misses": s.cache_misses,
                    }
                }));
            }
            RecordedEvent::RenderBatch(r) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RenderBatch",
                    "cat": "Rich",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "layer": r.layer,
                        "shader": format!("{:?}", r.shader_type),
                        "primitive": format!("{:?}", r.primitive),
                        "clipping_index": r.clipping_index,
                        "vertices": r.num_vertices,
                        "indices": r.num_indices,
                        "elements": r.num_elements,
                    }
                }));
            }
            RecordedEvent::ProxyUpdate(r) => {
                events.push(json!({
                    "ph": "i",
                    "name": "ProxyUpdate",
                    "cat": "Rich",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "index": r.index,
                        "flags": format!("{:?}", r.flags),
                        "reason": format!("{:?}", r.reason),
                        "repainted": r.repainted,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use strata_core::trace::{
        BatchStatsEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 0,
            phase: PhaseKind::Batch,
            timestamp_ns: 1_000_000,
        });
        rec.on_batch_stats(&BatchStatsEvent {
            layers: 1,
            render_batches: 2,
            vertices: 8,
            indices: 12,
            stencil_required: false,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 0,
            phase: PhaseKind::Batch,
            timestamp_ns: 1_000_100,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "Batch");
        assert_eq!(parsed[0]["ts"], 1000.0);

        // Stats are placed at the enclosing phase's begin.
        assert_eq!(parsed[1]["ph"], "i");
        assert_eq!(parsed[1]["name"], "BatchStats");
        assert_eq!(parsed[1]["ts"], 1000.0);
        assert_eq!(parsed[1]["args"]["render_batches"], 2);

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["ts"], 1000.1);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
