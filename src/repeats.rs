/// Repeat detection by counting mutually overlapping aligned segments
///
/// Every aligned segment is recorded against the sequence it lies on. When a
/// segment is added it is compared with all earlier segments of that sequence
/// and both sides of every overlap get their count bumped. A sequence with any
/// segment overlapped more than `threshold` times is repetitive, and so is
/// every hit touching it.
use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;
use std::collections::HashMap;

use crate::hit::HitRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatConfig {
    /// Trimmed from both ends of each segment before testing overlap
    pub margin: u64,
    /// A segment overlapped more often than this marks its sequence repetitive
    pub threshold: u32,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        RepeatConfig {
            margin: 100,
            threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
    pub overlaps: u32,
}

/// Margin-padded overlap test
///
/// Segments shorter than twice the margin never overlap anything.
pub fn padded_overlap(a: (u64, u64), b: (u64, u64), margin: u64) -> bool {
    let m = margin as i128;
    let (s, e) = (a.0 as i128, a.1 as i128);
    let (start, end) = (b.0 as i128, b.1 as i128);
    (s + m) < (end - m) && (start + m) < (e - m)
}

/// Segments aligned to one sequence, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalIndex {
    segments: Vec<Segment>,
}

impl IntervalIndex {
    /// Record a segment and return how many earlier segments it overlaps
    pub fn insert(&mut self, start: u64, end: u64, margin: u64) -> u32 {
        let mut count = 0;
        for seg in self.segments.iter_mut() {
            if padded_overlap((seg.start, seg.end), (start, end), margin) {
                count += 1;
                seg.overlaps += 1;
            }
        }
        self.segments.push(Segment {
            start,
            end,
            overlaps: count,
        });
        count
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_repetitive(&self, threshold: u32) -> bool {
        self.segments.iter().any(|s| s.overlaps > threshold)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepeatDetector {
    config: RepeatConfig,
    index: IndexMap<String, IntervalIndex>,
}

impl RepeatDetector {
    pub fn new(config: RepeatConfig) -> Self {
        RepeatDetector {
            config,
            index: IndexMap::new(),
        }
    }

    /// Streaming insert: the side-2 segment first, then the side-1 segment
    pub fn add_hit(&mut self, hit: &HitRecord) {
        let margin = self.config.margin;
        let (s2, e2) = hit.interval2();
        self.index
            .entry(hit.name2.clone())
            .or_default()
            .insert(s2, e2, margin);
        let (s1, e1) = hit.interval1();
        self.index
            .entry(hit.name1.clone())
            .or_default()
            .insert(s1, e1, margin);
    }

    /// Build the index for a whole batch, one sequence per task
    ///
    /// Gives the same counts as calling [`add_hit`](Self::add_hit) in order,
    /// since a sequence's counts only depend on its own insertion order.
    pub fn from_hits(hits: &[HitRecord], config: RepeatConfig) -> Self {
        let mut pending: IndexMap<&str, Vec<(u64, u64)>> = IndexMap::new();
        for hit in hits {
            pending.entry(hit.name2.as_str()).or_default().push(hit.interval2());
            pending.entry(hit.name1.as_str()).or_default().push(hit.interval1());
        }

        let built: Vec<(String, IntervalIndex)> = pending
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(name, segments)| {
                let mut index = IntervalIndex::default();
                for (start, end) in segments {
                    index.insert(start, end, config.margin);
                }
                (name.to_string(), index)
            })
            .collect();

        debug!("Repeat index: {} sequences", built.len());
        RepeatDetector {
            config,
            index: built.into_iter().collect(),
        }
    }

    pub fn index(&self, name: &str) -> Option<&IntervalIndex> {
        self.index.get(name)
    }

    pub fn is_repetitive(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|idx| idx.is_repetitive(self.config.threshold))
    }

    /// A hit is a repeat if either of its sequences is repetitive
    pub fn is_repeat(&self, hit: &HitRecord) -> bool {
        self.is_repetitive(&hit.name1) || self.is_repetitive(&hit.name2)
    }

    /// Repeat flag for every hit
    pub fn flag_all(&self, hits: &[HitRecord]) -> Vec<bool> {
        let mut cache: HashMap<&str, bool> = HashMap::new();
        hits.iter()
            .map(|h| {
                let one = *cache
                    .entry(h.name1.as_str())
                    .or_insert_with(|| self.is_repetitive(&h.name1));
                let two = *cache
                    .entry(h.name2.as_str())
                    .or_insert_with(|| self.is_repetitive(&h.name2));
                one || two
            })
            .collect()
    }
}
