/// Identity and coverage derived from a hit's score and block encoding
///
/// Identity is not re-derived from sequence. It inverts the aligner's scoring
/// function: given how many letters were aligned and how much was paid for
/// gaps, the shortfall between a perfect score and the observed score is
/// attributed to mismatches. The result is only meaningful when
/// `ScoringScheme` matches the scoring parameters the aligner ran with.
use std::fmt;

use crate::hit::{format_blocks, BlockSegment, HitRecord};

/// Scoring constants of the upstream aligner, in its internal score units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringScheme {
    /// Reward per matching letter
    pub match_reward: f64,
    /// Score lost when a match turns into a mismatch (match reward + mismatch cost)
    pub mismatch_scale: f64,
    /// Cost of opening a gap
    pub gap_open: f64,
    /// Cost per gapped letter
    pub gap_extend: f64,
}

impl Default for ScoringScheme {
    fn default() -> Self {
        ScoringScheme {
            match_reward: 6.0,
            mismatch_scale: 24.0,
            gap_open: 21.0,
            gap_extend: 9.0,
        }
    }
}

/// Which sequence length is the coverage denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoveragePolicy {
    /// The shorter sequence; side 1 on ties
    #[default]
    SmallerSequence,
    Side1,
    Side2,
}

/// Qualification of a hit after the overlap filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qual {
    Kept,
    Redundant,
    Unranked,
}

impl Qual {
    /// Numeric code used in the `qual` column
    pub fn code(self) -> i8 {
        match self {
            Qual::Kept => 1,
            Qual::Redundant => 0,
            Qual::Unranked => -1,
        }
    }
}

impl fmt::Display for Qual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A hit annotated with derived metrics and its qualification
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedHit {
    pub hit: HitRecord,
    pub identity_pct: f64,
    pub coverage_pct: f64,
    pub qual: Qual,
}

/// Header for the annotated stream written by [`QualifiedHit`]'s `Display`
pub const ANNOTATED_HEADER: &str = "#score\tidpct\tcovpct\tname1\tstart1\talnSize1\tstrand1\tseqSize1\tname2\tstart2\talnSize2\tstrand2\tseqSize2\tblocks\t[extra]\tend1\tend2\tqual";

impl fmt::Display for QualifiedHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.hit;
        write!(
            f,
            "{}\t{:.2}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            h.score,
            self.identity_pct,
            self.coverage_pct,
            h.name1,
            h.start1,
            h.aln_size1,
            h.strand1,
            h.seq_size1,
            h.name2,
            h.start2,
            h.aln_size2,
            h.strand2,
            h.seq_size2,
            format_blocks(&h.blocks)
        )?;
        for field in &h.extra {
            write!(f, "\t{field}")?;
        }
        write!(f, "\t{}\t{}\t{}", h.end1(), h.end2(), self.qual)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricCalculator {
    pub scheme: ScoringScheme,
    pub coverage: CoveragePolicy,
}

impl MetricCalculator {
    pub fn new(scheme: ScoringScheme, coverage: CoveragePolicy) -> Self {
        MetricCalculator { scheme, coverage }
    }

    /// Percent identity in `[0, 100]`
    pub fn identity_pct(&self, score: i64, blocks: &[BlockSegment]) -> f64 {
        let s = &self.scheme;
        let mut aln_size = 0u64;
        let mut gap_count = 0u64;
        let mut gap_penalty = 0.0;

        for seg in blocks {
            match *seg {
                BlockSegment::Ungapped(len) => aln_size += len,
                BlockSegment::Gap { side1, side2 } => {
                    let gap = side1.max(side2);
                    gap_count += gap;
                    gap_penalty += s.gap_open + s.gap_extend * gap as f64;
                }
            }
        }

        let columns = (gap_count + aln_size) as f64;
        if aln_size == 0 || columns == 0.0 {
            return 0.0;
        }

        let mismatch = ((aln_size as f64 * s.match_reward - gap_penalty) - score as f64) / s.mismatch_scale;
        let identity = 1.0 - (mismatch + gap_count as f64) / columns;
        (100.0 * identity).clamp(0.0, 100.0)
    }

    /// Percent of the reference sequence covered by the alignment
    pub fn coverage_pct(&self, hit: &HitRecord) -> f64 {
        let (aln, size) = match self.coverage {
            CoveragePolicy::Side1 => (hit.aln_size1, hit.seq_size1),
            CoveragePolicy::Side2 => (hit.aln_size2, hit.seq_size2),
            CoveragePolicy::SmallerSequence => {
                if hit.seq_size2 < hit.seq_size1 {
                    (hit.aln_size2, hit.seq_size2)
                } else {
                    (hit.aln_size1, hit.seq_size1)
                }
            }
        };
        if size == 0 {
            return 0.0;
        }
        (100.0 * aln as f64 / size as f64).clamp(0.0, 100.0)
    }

    /// Compute both metrics; the hit starts out `Kept`
    pub fn annotate(&self, hit: HitRecord) -> QualifiedHit {
        let identity_pct = self.identity_pct(hit.score, &hit.blocks);
        let coverage_pct = self.coverage_pct(&hit);
        QualifiedHit {
            hit,
            identity_pct,
            coverage_pct,
            qual: Qual::Kept,
        }
    }
}

/// Opt-in qualification gate, permissive by default
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QualifyConfig {
    pub min_identity: f64,
    pub min_coverage: f64,
    /// Compared against the shorter of the two aligned sizes
    pub min_aln_length: u64,
    /// Records without a parseable `E=` field fail when this is set
    pub max_evalue: Option<f64>,
}

impl QualifyConfig {
    pub fn passes(&self, q: &QualifiedHit) -> bool {
        if q.identity_pct < self.min_identity || q.coverage_pct < self.min_coverage {
            return false;
        }
        if q.hit.aln_size1.min(q.hit.aln_size2) < self.min_aln_length {
            return false;
        }
        match self.max_evalue {
            Some(max) => q.hit.evalue().is_some_and(|e| e <= max),
            None => true,
        }
    }
}
