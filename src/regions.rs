/// BED region selection of hits, and gap features inside regions
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::hit::{HitRecord, Strand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedRegion {
    pub name: String,
    pub start: u64,
    pub stop: u64,
    pub label: Option<String>,
}

/// Regions grouped by sequence name, in file order
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    regions: IndexMap<String, Vec<BedRegion>>,
}

impl RegionIndex {
    pub fn new(regions: Vec<BedRegion>) -> Self {
        let mut index = RegionIndex::default();
        for r in regions {
            index.regions.entry(r.name.clone()).or_default().push(r);
        }
        index
    }

    pub fn get(&self, name: &str) -> &[BedRegion] {
        self.regions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Parse BED lines: `name start stop [label]`, whitespace separated
///
/// Blank, `#` and `track` lines are skipped. Any other malformed line fails
/// the whole file, since a partial region set would silently change results.
pub fn parse_bed<R: BufRead>(reader: R) -> Result<Vec<BedRegion>> {
    let mut regions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("track") {
            continue;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 3 {
            bail!("BED line {line_no}: expected at least 3 columns");
        }
        let start: u64 = parts[1]
            .parse()
            .with_context(|| format!("BED line {line_no}: invalid start '{}'", parts[1]))?;
        let stop: u64 = parts[2]
            .parse()
            .with_context(|| format!("BED line {line_no}: invalid stop '{}'", parts[2]))?;
        if start > stop {
            bail!("BED line {line_no}: start {start} is after stop {stop}");
        }
        regions.push(BedRegion {
            name: parts[0].to_string(),
            start,
            stop,
            label: parts.get(3).map(|s| s.to_string()),
        });
    }
    Ok(regions)
}

pub fn read_bed_file<P: AsRef<Path>>(path: P) -> Result<RegionIndex> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let regions = parse_bed(BufReader::new(file)).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(RegionIndex::new(regions))
}

/// Indices of hits whose side-1 interval overlaps a region on `name1`
pub fn select_in_regions(hits: &[HitRecord], regions: &RegionIndex) -> Vec<usize> {
    hits.iter()
        .enumerate()
        .filter(|(_, hit)| {
            let (start1, end1) = hit.interval1();
            regions
                .get(&hit.name1)
                .iter()
                .any(|r| start1 < r.stop && r.start < end1)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// One output BED line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedRow {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub label: String,
    /// Written as `0\t<strand>` when present
    pub strand: Option<Strand>,
}

impl fmt::Display for BedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.name, self.start, self.end, self.label)?;
        if let Some(strand) = self.strand {
            write!(f, "\t0\t{strand}")?;
        }
        Ok(())
    }
}

/// A hit with an alignment gap inside a labelled region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapFeature {
    pub hit_index: usize,
    /// The region on side 1, padded
    pub target: BedRow,
    /// The corresponding stretch of side 2, padded
    pub query: BedRow,
}

/// Find hits with a side-1 gap overlapping a region on `name1`
///
/// Only the first matching region of each hit is reported.
pub fn gap_features(hits: &[HitRecord], regions: &RegionIndex, pad: u64) -> Vec<GapFeature> {
    let mut features = Vec::new();
    for (hit_index, hit) in hits.iter().enumerate() {
        let candidates = regions.get(&hit.name1);
        if candidates.is_empty() {
            continue;
        }
        let gaps = hit.gap_intervals1();
        let Some(region) = candidates
            .iter()
            .find(|r| gaps.iter().any(|&(s, e)| s < r.stop && r.start < e))
        else {
            continue;
        };

        let label = region.label.as_deref().unwrap_or("region");
        let pad = pad as i64;
        let target = BedRow {
            name: hit.name1.clone(),
            start: (region.start as i64 - pad).max(0) as u64,
            end: (region.stop + pad as u64).min(hit.seq_size1),
            label: format!("{}_{}", hit.name1, label),
            strand: None,
        };

        let shift = region.start as i64 - hit.start1 as i64;
        let q_start = hit.start2 as i64 + shift;
        let q_end = q_start + (region.stop - region.start) as i64 + pad;
        let query = BedRow {
            name: hit.name2.clone(),
            start: (q_start - pad).max(0) as u64,
            end: (q_end.max(0) as u64).min(hit.seq_size2),
            label: format!("{}_{}", hit.name2, label),
            strand: Some(hit.strand2),
        };

        features.push(GapFeature {
            hit_index,
            target,
            query,
        });
    }
    features
}
