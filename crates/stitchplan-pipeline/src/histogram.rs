//! Color histograms.
//!
//! A [`Histogram`] maps each color to the number of pixels that carry
//! it. Entries keep first-seen order (row-major scan of the source
//! bitmap). All non-opaque pixels share one synthetic bucket keyed by
//! [`Argb::TRANSPARENT`].
//!
//! Histograms are values: every transformation returns a new histogram
//! and leaves the receiver untouched.

use std::collections::HashMap;

use palette::Lab;
use palette::white_point::D65;
use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::color::{Argb, lab_distance};

/// One histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramEntry {
    /// Bucket key.
    pub color: Argb,
    /// Number of pixels in the bucket.
    pub count: u64,
}

/// Pixel counts per color, in first-seen order.
///
/// Serializes as a plain list of entries. Deserialization folds that
/// list through [`Histogram::from_counts`], so repeated keys are summed
/// and non-opaque keys land in the transparent bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<HistogramEntry>", from = "Vec<HistogramEntry>")]
pub struct Histogram {
    entries: Vec<HistogramEntry>,
}

impl From<Vec<HistogramEntry>> for Histogram {
    fn from(entries: Vec<HistogramEntry>) -> Self {
        Self::from_counts(entries.into_iter().map(|e| (e.color, e.count)))
    }
}

impl From<Histogram> for Vec<HistogramEntry> {
    fn from(histogram: Histogram) -> Self {
        histogram.entries
    }
}

impl Histogram {
    /// Build a histogram from `(color, count)` pairs.
    ///
    /// Non-opaque colors are folded into the transparent bucket and
    /// repeated colors are summed, so the result upholds the same
    /// invariants as [`compute_histogram`].
    #[must_use]
    pub fn from_counts(counts: impl IntoIterator<Item = (Argb, u64)>) -> Self {
        let mut builder = Builder::default();
        for (color, count) in counts {
            builder.add(color, count);
        }
        builder.finish()
    }

    /// All buckets in first-seen order, including the transparent one.
    #[must_use]
    pub fn entries(&self) -> &[HistogramEntry] {
        &self.entries
    }

    /// Opaque bucket keys in first-seen order.
    pub fn colors(&self) -> impl Iterator<Item = Argb> + '_ {
        self.entries
            .iter()
            .map(|e| e.color)
            .filter(|c| c.is_opaque())
    }

    /// Pixel count for `color`, or `0` if absent. Any non-opaque color
    /// reads the transparent bucket.
    #[must_use]
    pub fn count(&self, color: Argb) -> u64 {
        let key = color.normalized();
        self.entries
            .iter()
            .find(|e| e.color == key)
            .map_or(0, |e| e.count)
    }

    /// Returns `true` if `color` has an opaque bucket.
    #[must_use]
    pub fn contains(&self, color: Argb) -> bool {
        color.is_opaque() && self.entries.iter().any(|e| e.color == color)
    }

    /// Sum of all bucket counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Number of opaque buckets.
    #[must_use]
    pub fn opaque_len(&self) -> usize {
        self.entries.iter().filter(|e| e.color.is_opaque()).count()
    }

    /// Number of buckets, including the transparent one.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the histogram has no buckets at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the transparent bucket is present.
    #[must_use]
    pub fn has_transparent(&self) -> bool {
        self.entries.iter().any(|e| !e.color.is_opaque())
    }

    /// Opaque buckets by descending count. Ties keep first-seen order.
    #[must_use]
    pub fn sorted_by_count(&self) -> Vec<HistogramEntry> {
        let mut opaque: Vec<HistogramEntry> = self
            .entries
            .iter()
            .copied()
            .filter(|e| e.color.is_opaque())
            .collect();
        // `sort_by` is stable, which gives the first-seen tie break.
        opaque.sort_by(|a, b| b.count.cmp(&a.count));
        opaque
    }

    /// One greedy merge pass.
    ///
    /// Entries are visited in first-seen order. Each opaque color joins
    /// the first already-accepted bucket whose key lies within
    /// `tolerance` (strictly less, in L\*a\*b\* units) and adds its count
    /// there; otherwise it opens a new bucket. The transparent bucket is
    /// carried over as-is and never compared.
    #[must_use]
    pub fn merge_similar(&self, tolerance: f32) -> Self {
        self.merge_similar_to(tolerance, 0)
    }

    /// [`merge_similar`](Self::merge_similar) that stops folding once
    /// only `target` opaque buckets would remain. Entries visited after
    /// that keep buckets of their own, so a pass never drops the opaque
    /// count below `target` unless it started there.
    #[must_use]
    pub fn merge_similar_to(&self, tolerance: f32, target: usize) -> Self {
        let mut entries: Vec<HistogramEntry> = Vec::with_capacity(self.entries.len());
        // (index into `entries`, Lab of the bucket key)
        let mut buckets: Vec<(usize, Lab<D65, f32>)> = Vec::new();
        let mut remaining = self.opaque_len();

        for entry in &self.entries {
            if !entry.color.is_opaque() {
                entries.push(*entry);
                continue;
            }
            let lab = entry.color.to_lab();
            let target_bucket = if remaining > target {
                buckets
                    .iter()
                    .find(|(_, key)| lab_distance(*key, lab) < tolerance)
                    .map(|(index, _)| *index)
            } else {
                None
            };
            if let Some(index) = target_bucket {
                entries[index].count += entry.count;
                remaining -= 1;
            } else {
                buckets.push((entries.len(), lab));
                entries.push(*entry);
            }
        }

        Self { entries }
    }

    /// Drop opaque buckets holding fewer than `threshold` pixels.
    ///
    /// If every opaque bucket falls below the threshold the histogram is
    /// returned unchanged. The transparent bucket is always kept.
    #[must_use]
    pub fn without_low_counts(&self, threshold: u64) -> Self {
        let survives = |e: &HistogramEntry| !e.color.is_opaque() || e.count >= threshold;
        let any_opaque_left = self
            .entries
            .iter()
            .any(|e| e.color.is_opaque() && e.count >= threshold);
        if !any_opaque_left {
            return self.clone();
        }
        Self {
            entries: self.entries.iter().copied().filter(survives).collect(),
        }
    }

    /// Keep the `k` opaque buckets with the highest counts (ties by
    /// first-seen order). Retained buckets and the transparent bucket
    /// stay in first-seen order.
    #[must_use]
    pub fn top(&self, k: usize) -> Self {
        let keep: Vec<Argb> = self
            .sorted_by_count()
            .into_iter()
            .take(k)
            .map(|e| e.color)
            .collect();
        Self {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|e| !e.color.is_opaque() || keep.contains(&e.color))
                .collect(),
        }
    }
}

/// Count every pixel of `bitmap` in a single row-major pass.
///
/// Opaque pixels count under their own color; everything else counts
/// under [`Argb::TRANSPARENT`]. The counts sum to `width * height`.
#[must_use]
pub fn compute_histogram<B: Bitmap + ?Sized>(bitmap: &B) -> Histogram {
    let mut builder = Builder::default();
    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            builder.add(bitmap.pixel(x, y), 1);
        }
    }
    builder.finish()
}

/// Accumulates counts while remembering first-seen order.
#[derive(Default)]
struct Builder {
    index: HashMap<Argb, usize>,
    entries: Vec<HistogramEntry>,
}

impl Builder {
    fn add(&mut self, color: Argb, count: u64) {
        let key = color.normalized();
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].count += count;
        } else {
            self.index.insert(key, self.entries.len());
            self.entries.push(HistogramEntry { color: key, count });
        }
    }

    fn finish(self) -> Histogram {
        Histogram {
            entries: self.entries,
        }
    }
}
