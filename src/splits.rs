/// Placement of query contigs across ranked target sequences
///
/// For every contig, sums how much of it is aligned to each ranked `name1`
/// through kept hits. A contig placed on more than one sequence is split.
use indexmap::IndexMap;

use crate::metrics::{QualifiedHit, Qual};
use crate::overlap::RankPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitsConfig {
    /// Contigs shorter than this are ignored
    pub min_seq_size: u64,
    pub rank: RankPattern,
}

impl Default for SplitsConfig {
    fn default() -> Self {
        SplitsConfig {
            min_seq_size: 1000,
            rank: RankPattern::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRow {
    pub name2: String,
    pub name1: String,
    /// Total side-2 aligned length on `name1`
    pub length: u64,
    /// Number of distinct `name1` this contig is placed on
    pub placements: usize,
}

pub fn split_placements(hits: &[QualifiedHit], config: &SplitsConfig) -> Vec<SplitRow> {
    let mut by_contig: IndexMap<&str, IndexMap<&str, u64>> = IndexMap::new();
    for q in hits {
        let h = &q.hit;
        if q.qual != Qual::Kept
            || config.rank.rank(&h.name1).is_none()
            || h.seq_size2 < config.min_seq_size
        {
            continue;
        }
        *by_contig
            .entry(h.name2.as_str())
            .or_default()
            .entry(h.name1.as_str())
            .or_default() += h.aln_size2;
    }

    by_contig
        .into_iter()
        .flat_map(|(name2, targets)| {
            let placements = targets.len();
            targets.into_iter().map(move |(name1, length)| SplitRow {
                name2: name2.to_string(),
                name1: name1.to_string(),
                length,
                placements,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::{HitRecord, ParseOptions};
    use crate::metrics::MetricCalculator;

    fn kept(name1: &str, name2: &str, aln2: u64, seq2: u64, qual: Qual) -> QualifiedHit {
        let line = format!("100\t{name1}\t0\t{aln2}\t+\t100000\t{name2}\t0\t{aln2}\t+\t{seq2}\t{aln2}");
        let hit = HitRecord::parse_line(&line, 1, &ParseOptions::default()).unwrap();
        let mut q = MetricCalculator::default().annotate(hit);
        q.qual = qual;
        q
    }

    #[test]
    fn test_split_placements() {
        let hits = vec![
            kept("chr1", "ctgA", 1000, 5000, Qual::Kept),
            kept("chr1", "ctgA", 500, 5000, Qual::Kept),
            kept("chr2", "ctgA", 300, 5000, Qual::Kept),
            kept("chr3", "ctgA", 300, 5000, Qual::Redundant),
            kept("chrUn", "ctgA", 300, 5000, Qual::Kept),
            kept("chr1", "ctgTiny", 300, 900, Qual::Kept),
            kept("chr4", "ctgB", 2000, 2000, Qual::Kept),
        ];
        let rows = split_placements(&hits, &SplitsConfig::default());
        let flat: Vec<(&str, &str, u64, usize)> = rows
            .iter()
            .map(|r| (r.name2.as_str(), r.name1.as_str(), r.length, r.placements))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("ctgA", "chr1", 1500, 2),
                ("ctgA", "chr2", 300, 2),
                ("ctgB", "chr4", 2000, 1),
            ]
        );
    }
}
