/// Whole-sequence containment between the two sides of a hit
///
/// A sequence that aligns end to end inside a clearly larger sequence on the
/// other side adds nothing the larger one doesn't already carry, so the pair
/// is reported as (kept, redundant).
use indexmap::IndexSet;

use crate::hit::{HitRecord, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedundancyConfig {
    /// The contained sequence must be shorter than this fraction of the container
    pub size_ratio: f64,
}

impl Default for RedundancyConfig {
    fn default() -> Self {
        RedundancyConfig { size_ratio: 0.9 }
    }
}

/// Deduplicated `(kept, redundant)` name pairs, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentReport {
    /// Side-1 sequence kept, side-2 sequence redundant
    pub kept_target: IndexSet<(String, String)>,
    /// Side-2 sequence kept, side-1 sequence redundant
    pub kept_query: IndexSet<(String, String)>,
}

/// Which side, if any, is swallowed by the other
pub fn contained_side(hit: &HitRecord, config: &RedundancyConfig) -> Option<Side> {
    let ratio = config.size_ratio;
    if hit.is_complete(Side::One)
        && !hit.is_complete(Side::Two)
        && (hit.seq_size1 as f64) < hit.seq_size2 as f64 * ratio
    {
        return Some(Side::One);
    }
    if hit.is_complete(Side::Two)
        && !hit.is_complete(Side::One)
        && (hit.seq_size2 as f64) < hit.seq_size1 as f64 * ratio
    {
        return Some(Side::Two);
    }
    None
}

pub fn containment_report(hits: &[HitRecord], config: &RedundancyConfig) -> ContainmentReport {
    let mut report = ContainmentReport::default();
    for hit in hits {
        match contained_side(hit, config) {
            Some(Side::One) => {
                report
                    .kept_query
                    .insert((hit.name2.clone(), hit.name1.clone()));
            }
            Some(Side::Two) => {
                report
                    .kept_target
                    .insert((hit.name1.clone(), hit.name2.clone()));
            }
            None => {}
        }
    }
    report
}
