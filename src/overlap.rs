/// Redundancy filter: demote hits whose side-2 locus is claimed by a better hit
///
/// Hits are compared only within the same `name2` group. A hit is demoted by
/// a strictly higher scoring hit that either lands on a different `name1` and
/// overlaps it at all, or lands on the same `name1` and fully contains it.
/// Partial overlap on the same `name1` is left alone since it is usually a
/// split alignment of the same locus.
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use rayon::prelude::*;

use crate::error::HitError;
use crate::hit::HitRecord;
use crate::metrics::{QualifiedHit, Qual};

/// Extracts a numeric rank from names such as `chr12`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankPattern {
    /// Characters to skip before the number
    pub prefix_len: usize,
}

impl Default for RankPattern {
    fn default() -> Self {
        RankPattern { prefix_len: 3 }
    }
}

impl RankPattern {
    pub fn rank(&self, name: &str) -> Option<u32> {
        name.get(self.prefix_len..)?.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapConfig {
    pub rank: RankPattern,
}

/// Qualification per input hit plus the unranked names encountered
#[derive(Debug, Clone, Default)]
pub struct OverlapOutcome {
    /// Parallel to the input slice
    pub quals: Vec<Qual>,
    /// Indices of the hits that demoted each hit; empty unless `Redundant`
    pub covered_by: Vec<Vec<usize>>,
    /// One `UnrankedSequence` per distinct name, in first-seen order
    pub unranked: Vec<HitError>,
}

impl OverlapOutcome {
    pub fn count(&self, qual: Qual) -> usize {
        self.quals.iter().filter(|&&q| q == qual).count()
    }
}

/// Half-open interval overlap
pub fn intervals_overlap(a: (u64, u64), b: (u64, u64)) -> bool {
    b.0 < a.1 && b.1 > a.0
}

/// `inner` lies entirely inside `outer`
pub fn interval_contains(outer: (u64, u64), inner: (u64, u64)) -> bool {
    inner.0 >= outer.0 && inner.1 <= outer.1
}

/// Does `cover` demote `hit`? Rank eligibility is checked by the caller.
pub fn covers(cover: &HitRecord, hit: &HitRecord) -> bool {
    if cover.name2 != hit.name2 || cover.score <= hit.score {
        return false;
    }
    let outer = cover.interval2();
    let inner = hit.interval2();
    if cover.name1 != hit.name1 {
        intervals_overlap(outer, inner)
    } else {
        interval_contains(outer, inner)
    }
}

/// Qualify every hit against the other hits of its `name2` group
pub fn filter_overlaps(hits: &[HitRecord], config: &OverlapConfig) -> OverlapOutcome {
    let ranked: Vec<bool> = hits
        .iter()
        .map(|h| config.rank.rank(&h.name1).is_some())
        .collect();

    let mut groups: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (idx, hit) in hits.iter().enumerate() {
        groups.entry(hit.name2.as_str()).or_default().push(idx);
    }
    debug!("Overlap filter: {} hits in {} name2 groups", hits.len(), groups.len());

    // Groups are independent, so they can be processed in parallel
    let group_results: Vec<Vec<(usize, Qual, Vec<usize>)>> = groups
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|members| qualify_group(hits, &ranked, &members))
        .collect();

    let mut quals = vec![Qual::Kept; hits.len()];
    let mut covered_by = vec![Vec::new(); hits.len()];
    for (idx, qual, covering) in group_results.into_iter().flatten() {
        quals[idx] = qual;
        covered_by[idx] = covering;
    }

    let mut unranked_names: IndexSet<&str> = IndexSet::new();
    for (hit, &is_ranked) in hits.iter().zip(&ranked) {
        if !is_ranked {
            unranked_names.insert(hit.name1.as_str());
        }
    }
    let unranked = unranked_names
        .into_iter()
        .map(|name| HitError::UnrankedSequence {
            name: name.to_string(),
        })
        .collect();

    let outcome = OverlapOutcome {
        quals,
        covered_by,
        unranked,
    };
    info!(
        "Overlap filter: {} kept, {} redundant, {} unranked",
        outcome.count(Qual::Kept),
        outcome.count(Qual::Redundant),
        outcome.count(Qual::Unranked)
    );
    outcome
}

fn qualify_group(hits: &[HitRecord], ranked: &[bool], members: &[usize]) -> Vec<(usize, Qual, Vec<usize>)> {
    members
        .iter()
        .map(|&i| {
            let covering: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&j| j != i && ranked[j] && covers(&hits[j], &hits[i]))
                .collect();
            let qual = if !covering.is_empty() {
                Qual::Redundant
            } else if ranked[i] {
                Qual::Kept
            } else {
                Qual::Unranked
            };
            (i, qual, covering)
        })
        .collect()
}

/// Run the filter over annotated hits, updating `qual` in place
pub fn apply_overlap_filter(hits: &mut [QualifiedHit], config: &OverlapConfig) -> Vec<HitError> {
    let records: Vec<HitRecord> = hits.iter().map(|q| q.hit.clone()).collect();
    let outcome = filter_overlaps(&records, config);
    for (q, qual) in hits.iter_mut().zip(outcome.quals) {
        q.qual = qual;
    }
    outcome.unranked
}

/// `(kept, redundant)` name pairs: for every demoted hit, each `Kept` hit that demoted it
///
/// A hit demoted only by hits that were themselves demoted yields no pair.
pub fn redundancy_pairs<'a>(hits: &'a [HitRecord], outcome: &OverlapOutcome) -> Vec<(&'a str, &'a str)> {
    let mut pairs = Vec::new();
    for (i, covering) in outcome.covered_by.iter().enumerate() {
        for &j in covering {
            if outcome.quals[j] == Qual::Kept {
                pairs.push((hits[j].name1.as_str(), hits[i].name1.as_str()));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::ParseOptions;

    fn hit(score: i64, name1: &str, name2: &str, start2: u64, len2: u64, strand2: char, size2: u64) -> HitRecord {
        let line = format!(
            "{score}\t{name1}\t0\t{len2}\t+\t100000\t{name2}\t{start2}\t{len2}\t{strand2}\t{size2}\t{len2}"
        );
        HitRecord::parse_line(&line, 1, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_rank_pattern() {
        let rank = RankPattern::default();
        assert_eq!(rank.rank("chr12"), Some(12));
        assert_eq!(rank.rank("chrX"), None);
        assert_eq!(rank.rank("chr"), None);
        assert_eq!(rank.rank("ch"), None);
        assert_eq!(RankPattern { prefix_len: 0 }.rank("7"), Some(7));
    }

    #[test]
    fn test_different_locus_overlap_is_redundant() {
        let hits = vec![
            hit(500, "chr1", "ctgA", 0, 50, '+', 50),
            hit(300, "chr2", "ctgA", 10, 20, '+', 50),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(out.quals, vec![Qual::Kept, Qual::Redundant]);
        assert!(out.unranked.is_empty());
    }

    #[test]
    fn test_same_locus_partial_overlap_is_tolerated() {
        let hits = vec![
            hit(500, "chr1", "ctgA", 0, 30, '+', 100),
            hit(300, "chr1", "ctgA", 20, 30, '+', 100),
            hit(200, "chr1", "ctgA", 5, 10, '+', 100),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(out.quals, vec![Qual::Kept, Qual::Kept, Qual::Redundant]);
    }

    #[test]
    fn test_equal_scores_never_demote() {
        let hits = vec![
            hit(300, "chr1", "ctgA", 0, 50, '+', 50),
            hit(300, "chr2", "ctgA", 0, 50, '+', 50),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(out.quals, vec![Qual::Kept, Qual::Kept]);
    }

    #[test]
    fn test_reverse_strand_is_normalized() {
        // reverse hit at start2=0 len 20 on a 100bp contig covers 80..100
        let hits = vec![
            hit(500, "chr1", "ctgA", 0, 20, '-', 100),
            hit(300, "chr2", "ctgA", 10, 20, '+', 100),
            hit(200, "chr3", "ctgA", 85, 10, '+', 100),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(out.quals, vec![Qual::Kept, Qual::Kept, Qual::Redundant]);
    }

    #[test]
    fn test_unranked_cannot_cover_but_can_be_covered() {
        let hits = vec![
            hit(900, "scaffold_9", "ctgA", 0, 50, '+', 50),
            hit(500, "chr1", "ctgA", 0, 50, '+', 50),
            hit(100, "chrUn", "ctgA", 0, 10, '+', 50),
            hit(100, "chrMt", "ctgB", 0, 10, '+', 50),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(
            out.quals,
            vec![Qual::Unranked, Qual::Kept, Qual::Redundant, Qual::Unranked]
        );
        let names: Vec<String> = out.unranked.iter().map(|e| e.to_string()).collect();
        assert_eq!(names.len(), 3);
        assert!(names[0].contains("scaffold_9"));
    }

    #[test]
    fn test_other_name2_groups_do_not_interact() {
        let hits = vec![
            hit(500, "chr1", "ctgA", 0, 50, '+', 50),
            hit(300, "chr2", "ctgB", 0, 50, '+', 50),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(out.count(Qual::Kept), 2);
    }

    #[test]
    fn test_redundancy_pairs() {
        let hits = vec![
            hit(500, "chr1", "ctgA", 0, 50, '+', 50),
            hit(300, "chr2", "ctgA", 10, 20, '+', 50),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(redundancy_pairs(&hits, &out), vec![("chr1", "chr2")]);
        assert_eq!(out.covered_by, vec![vec![], vec![0]]);
    }

    #[test]
    fn test_redundancy_pairs_name_only_kept_covers() {
        // chr3 demotes chr2, chr2 demotes chr1, chr3 does not reach chr1
        let hits = vec![
            hit(900, "chr3", "ctgA", 0, 100, '+', 300),
            hit(500, "chr2", "ctgA", 50, 100, '+', 300),
            hit(100, "chr1", "ctgA", 120, 80, '+', 300),
        ];
        let out = filter_overlaps(&hits, &OverlapConfig::default());
        assert_eq!(out.quals, vec![Qual::Kept, Qual::Redundant, Qual::Redundant]);
        assert_eq!(out.covered_by, vec![vec![], vec![0], vec![1]]);
        assert_eq!(redundancy_pairs(&hits, &out), vec![("chr3", "chr2")]);
    }
}
