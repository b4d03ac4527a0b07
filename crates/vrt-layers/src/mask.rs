//! # Shifted-Window Attention Masks
//!
//! A cyclic shift moves tokens from opposite borders into the same window.
//! The additive mask built here keeps attention inside the region a token came
//! from: `0.0` where two positions of a window share a source region and
//! [`MASKED`] where they do not.
//!
//! Masks depend only on the padded extent, the window and shift sizes, and the
//! device, so [`AttentionMaskCache`] computes each one once and hands out
//! shared handles afterwards.

use core::ops::Range;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use burn::prelude::*;

use crate::window::{window_partition, window_volume};

/// Value added to attention logits between positions of different regions.
pub const MASKED: f64 = -100.0;

/// Geometry part of a cache key. The device is matched separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaskKey {
    /// Padded spatial extent `(depth, height, width)`.
    pub extent: [usize; 3],
    pub window_size: [usize; 3],
    pub shift_size: [usize; 3],
}

impl MaskKey {
    pub const fn new(extent: [usize; 3], window_size: [usize; 3], shift_size: [usize; 3]) -> Self {
        Self {
            extent,
            window_size,
            shift_size,
        }
    }
}

/// A slice with optional, possibly negative, bounds resolved against an axis
/// length the way sequence slicing resolves them: negative bounds count from
/// the end and everything is clamped to `0..len`.
#[derive(Debug, Clone, Copy)]
struct AxisSlice {
    start: Option<isize>,
    end: Option<isize>,
}

impl AxisSlice {
    const fn new(start: Option<isize>, end: Option<isize>) -> Self {
        Self { start, end }
    }

    fn resolve(self, len: usize) -> Range<usize> {
        let len = len as isize;
        let bound = |b: isize| if b < 0 { (len + b).max(0) } else { b.min(len) };

        let start = self.start.map_or(0, bound);
        let end = self.end.map_or(len, bound).max(start);
        start as usize..end as usize
    }
}

/// The three cuts of one axis: before the last window, the last window up to
/// the shift, and the shifted-in tail.
fn region_cuts(window: usize, shift: usize) -> [AxisSlice; 3] {
    let (window, shift) = (window as isize, shift as isize);
    [
        AxisSlice::new(None, Some(-window)),
        AxisSlice::new(Some(-window), Some(-shift)),
        AxisSlice::new(Some(-shift), None),
    ]
}

/// Builds the attention mask for a padded extent `(d, h, w)`.
///
/// The extent is cut into 3x3x3 labelled regions, the label volume is
/// partitioned like the features, and every pair of positions inside a window
/// gets `0.0` when their labels agree and [`MASKED`] otherwise.
///
/// Each extent must be a multiple of the matching window component. With a
/// zero shift on every axis the result is all zeros.
///
/// # Shapes
/// - output: `[num_windows, window_volume, window_volume]`
pub fn build_attention_mask<B: Backend>(
    d: usize,
    h: usize,
    w: usize,
    window_size: [usize; 3],
    shift_size: [usize; 3],
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut labels = Tensor::<B, 5>::zeros([1, d, h, w, 1], device);

    let mut region = 0;
    for dc in region_cuts(window_size[0], shift_size[0]) {
        for hc in region_cuts(window_size[1], shift_size[1]) {
            for wc in region_cuts(window_size[2], shift_size[2]) {
                let (dr, hr, wr) = (dc.resolve(d), hc.resolve(h), wc.resolve(w));
                if !(dr.is_empty() || hr.is_empty() || wr.is_empty()) {
                    let fill =
                        Tensor::full([1, dr.len(), hr.len(), wr.len(), 1], region as f64, device);
                    labels = labels.slice_assign([0..1, dr, hr, wr, 0..1], fill);
                }
                region += 1;
            }
        }
    }

    let windows = window_partition(labels, window_size);
    let [num_windows, _, _] = windows.dims();
    let windows = windows.reshape([num_windows, window_volume(window_size)]);

    let diff = windows.clone().unsqueeze_dim::<3>(1) - windows.unsqueeze_dim::<3>(2);
    diff.clone()
        .mask_fill(diff.clone().not_equal_elem(0.0), MASKED)
        .mask_fill(diff.equal_elem(0.0), 0.0)
}

/// Values memoized per `(MaskKey, device)`.
///
/// Devices are only required to be comparable, so each geometry key holds a
/// short list of `(device, value)` pairs searched by equality.
struct DeviceMemo<D, V> {
    entries: Mutex<HashMap<MaskKey, Vec<(D, Arc<V>)>>>,
}

impl<D: Clone + PartialEq + fmt::Debug, V> DeviceMemo<D, V> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_compute<F>(&self, key: MaskKey, device: &D, factory: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = entries.entry(key).or_default();

        if let Some((_, value)) = slot.iter().find(|(cached, _)| cached == device) {
            tracing::trace!(?key, "attention mask cache hit");
            return Arc::clone(value);
        }

        tracing::debug!(?key, ?device, "computing attention mask");
        let value = Arc::new(factory());
        slot.push((device.clone(), Arc::clone(&value)));
        value
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// Process-lifetime memo table for attention masks.
///
/// Entries are never evicted. Lookups and inserts happen under one lock, so
/// concurrent first requests for the same key compute the mask once.
pub struct AttentionMaskCache<B: Backend> {
    memo: DeviceMemo<B::Device, Tensor<B, 3>>,
}

impl<B: Backend> AttentionMaskCache<B> {
    pub fn new() -> Self {
        Self {
            memo: DeviceMemo::new(),
        }
    }

    /// Returns the mask cached for `(key, device)`, running `factory` to
    /// create it on the first request.
    pub fn get_or_compute<F>(&self, key: MaskKey, device: &B::Device, factory: F) -> Arc<Tensor<B, 3>>
    where
        F: FnOnce() -> Tensor<B, 3>,
    {
        self.memo.get_or_compute(key, device, factory)
    }

    /// Cached [`build_attention_mask`].
    pub fn compute_mask(
        &self,
        d: usize,
        h: usize,
        w: usize,
        window_size: [usize; 3],
        shift_size: [usize; 3],
        device: &B::Device,
    ) -> Arc<Tensor<B, 3>> {
        let key = MaskKey::new([d, h, w], window_size, shift_size);
        self.get_or_compute(key, device, || {
            build_attention_mask(d, h, w, window_size, shift_size, device)
        })
    }

    /// Number of cached masks across all devices.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: Backend> Default for AttentionMaskCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for AttentionMaskCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttentionMaskCache")
            .field("len", &self.len())
            .finish()
    }
}
