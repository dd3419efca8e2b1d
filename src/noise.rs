/// Single-hit quality control by score density
///
/// A real alignment earns close to the full match reward per aligned letter.
/// Hits scoring below `ratio * alnSize2` are noise, and so are partial hits
/// on a sequence that some other hit already aligns end to end.
use std::collections::HashSet;

use crate::hit::{HitRecord, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseConfig {
    /// Minimum score per aligned letter below `length_cutoff`
    pub short_ratio: i64,
    /// Minimum score per aligned letter from `length_cutoff` on
    pub long_ratio: i64,
    pub length_cutoff: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            short_ratio: 6,
            long_ratio: 5,
            length_cutoff: 1000,
        }
    }
}

/// Noise flag for every hit
pub fn flag_noise(hits: &[HitRecord], config: &NoiseConfig) -> Vec<bool> {
    let mut complete: HashSet<&str> = HashSet::new();
    for hit in hits {
        if hit.aln_size2 == hit.seq_size2 {
            complete.insert(&hit.name2);
        }
        if hit.aln_size1 == hit.seq_size1 {
            complete.insert(&hit.name1);
        }
    }

    hits.iter()
        .map(|hit| {
            let ratio = if hit.aln_size2 < config.length_cutoff {
                config.short_ratio
            } else {
                config.long_ratio
            };
            if hit.score < hit.aln_size2 as i64 * ratio {
                return true;
            }
            (!hit.is_complete(Side::Two) && complete.contains(hit.name2.as_str()))
                || (!hit.is_complete(Side::One) && complete.contains(hit.name1.as_str()))
        })
        .collect()
}
