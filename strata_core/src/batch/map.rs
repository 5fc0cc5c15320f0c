// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer storage of element batches.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::ElementBatch;

/// Number of layer ids stored densely.
const DENSE_LAYERS: usize = 256;
const ACTIVE_WORDS: usize = DENSE_LAYERS / 64;

/// Maps layer ids to the batches recorded in that layer.
///
/// Layer ids below 256 live in a dense array guarded by an active-layer bit
/// set and a `[min, max]` range, so the common case of small layer ids needs
/// no hashing or sorting. Larger ids go to an ordered overflow map. Iteration
/// always visits layers in ascending id order.
#[derive(Clone, Debug)]
pub struct ElementBatchMap {
    dense: Vec<Vec<ElementBatch>>,
    active: [u64; ACTIVE_WORDS],
    min_layer: u32,
    max_layer: u32,
    overflow: BTreeMap<u32, Vec<ElementBatch>>,
    resource_version: u32,
}

impl Default for ElementBatchMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementBatchMap {
    /// Creates an empty map. Dense storage is allocated on first use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            active: [0; ACTIVE_WORDS],
            min_layer: u32::MAX,
            max_layer: 0,
            overflow: BTreeMap::new(),
            resource_version: 0,
        }
    }

    /// The batches of `layer`, creating the layer if needed.
    pub fn find_or_add(&mut self, layer: u32) -> &mut Vec<ElementBatch> {
        let idx = layer as usize;
        if idx < DENSE_LAYERS {
            if self.dense.is_empty() {
                self.dense.resize_with(DENSE_LAYERS, Vec::new);
            }
            self.min_layer = self.min_layer.min(layer);
            self.max_layer = self.max_layer.max(layer);
            self.active[idx / 64] |= 1 << (idx % 64);
            &mut self.dense[idx]
        } else {
            self.overflow.entry(layer).or_default()
        }
    }

    /// The batches of `layer`, if the layer exists.
    #[must_use]
    pub fn find(&self, layer: u32) -> Option<&[ElementBatch]> {
        let idx = layer as usize;
        if idx < DENSE_LAYERS {
            self.is_active(idx).then(|| self.dense[idx].as_slice())
        } else {
            self.overflow.get(&layer).map(Vec::as_slice)
        }
    }

    fn is_active(&self, idx: usize) -> bool {
        self.active[idx / 64] & (1 << (idx % 64)) != 0
    }

    /// Calls `f` for every non-empty layer in ascending layer order.
    pub fn for_each_layer(&self, mut f: impl FnMut(u32, &[ElementBatch])) {
        if !self.dense.is_empty() && self.min_layer <= self.max_layer {
            for layer in self.min_layer..=self.max_layer {
                let idx = layer as usize;
                if self.is_active(idx) && !self.dense[idx].is_empty() {
                    f(layer, &self.dense[idx]);
                }
            }
        }
        for (&layer, batches) in &self.overflow {
            if !batches.is_empty() {
                f(layer, batches);
            }
        }
    }

    /// Number of non-empty layers.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        let mut n = 0;
        self.for_each_layer(|_, _| n += 1);
        n
    }

    /// Whether no layer holds a batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_layers() == 0
    }

    /// The resource version the batches were built against.
    #[must_use]
    pub fn resource_version(&self) -> u32 {
        self.resource_version
    }

    /// Discards every batch, releasing their storage, when `version` differs
    /// from the stored resource version. Returns whether anything was
    /// discarded.
    pub fn update_resource_version(&mut self, version: u32) -> bool {
        if self.resource_version == version {
            return false;
        }
        for layer in &mut self.dense {
            *layer = Vec::new();
        }
        self.overflow.clear();
        self.active = [0; ACTIVE_WORDS];
        self.min_layer = u32::MAX;
        self.max_layer = 0;
        self.resource_version = version;
        true
    }

    /// Clears every layer, keeping allocations for the next frame.
    pub fn reset(&mut self) {
        if self.min_layer <= self.max_layer {
            for layer in self.min_layer..=self.max_layer {
                self.dense[layer as usize].clear();
            }
        }
        self.active = [0; ACTIVE_WORDS];
        self.min_layer = u32::MAX;
        self.max_layer = 0;
        self.overflow.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchKey;

    fn batch(scene: i8) -> ElementBatch {
        ElementBatch::new(BatchKey {
            scene_index: scene,
            ..BatchKey::default()
        })
    }

    fn layers(map: &ElementBatchMap) -> Vec<u32> {
        let mut out = Vec::new();
        map.for_each_layer(|layer, _| out.push(layer));
        out
    }

    #[test]
    fn layers_iterate_ascending_across_dense_and_overflow() {
        let mut map = ElementBatchMap::new();
        for layer in [300, 10, 3, 1000, 7] {
            map.find_or_add(layer).push(batch(0));
        }
        assert_eq!(layers(&map), [3, 7, 10, 300, 1000]);
        assert_eq!(map.num_layers(), 5);
    }

    #[test]
    fn empty_layers_are_skipped() {
        let mut map = ElementBatchMap::new();
        map.find_or_add(4);
        map.find_or_add(5).push(batch(0));
        assert_eq!(layers(&map), [5]);
        assert!(map.find(4).is_some_and(<[_]>::is_empty));
        assert!(map.find(6).is_none());
    }

    #[test]
    fn reset_keeps_nothing_visible() {
        let mut map = ElementBatchMap::new();
        map.find_or_add(2).push(batch(0));
        map.find_or_add(700).push(batch(0));
        map.reset();
        assert!(map.is_empty());
        assert!(map.find(2).is_none());
    }

    #[test]
    fn resource_version_change_discards_batches() {
        let mut map = ElementBatchMap::new();
        map.find_or_add(1).push(batch(0));
        assert!(!map.update_resource_version(0));
        assert!(!map.is_empty());
        assert!(map.update_resource_version(1));
        assert!(map.is_empty());
        assert_eq!(map.resource_version(), 1);
    }
}
