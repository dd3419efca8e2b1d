/// Report and partition writers
///
/// Every file derived from an input `<dir>/<base>.<ext>` is written next to
/// it as `<dir>/<base>.<suffix>.txt`. Partitioned copies of the input repeat
/// the input's header lines at the top of every partition.
use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::graph::BestMatchReport;
use crate::metrics::{QualifiedHit, QualifyConfig, ANNOTATED_HEADER};
use crate::regions::BedRow;
use crate::splits::SplitRow;

/// Suffixes of the files written by the analysis stages
pub mod suffix {
    pub const ANNOTATED: &str = "QC";
    pub const REDUNDANT: &str = "redundant";
    pub const REDUNDANT_TARGET: &str = "redundant_target";
    pub const REDUNDANT_QUERY: &str = "redundant_query";
    pub const GRAPH: &str = "graph";
    pub const UNIQUE: &str = "unique";
    pub const MULTI: &str = "multi";
    pub const OTM1: &str = "otm1";
    pub const OTM2: &str = "otm2";
    pub const MTM: &str = "mtm";
    pub const NORMAL: &str = "normal";
    pub const REPEAT: &str = "repeat";
    pub const GROUPS: &str = "groups";
    pub const PASS: &str = "pass";
    pub const NOISE: &str = "noise";
    pub const SPLITS: &str = "splits";
    pub const BED: &str = "bed";
    pub const FEATURE: &str = "feature";
    pub const TARGET_BED: &str = "target";
    pub const QUERY_BED: &str = "query";

    /// Every `.txt` suffix, for collision checks
    pub const ALL_TXT: [&str; 18] = [
        ANNOTATED,
        REDUNDANT,
        REDUNDANT_TARGET,
        REDUNDANT_QUERY,
        GRAPH,
        UNIQUE,
        MULTI,
        OTM1,
        OTM2,
        MTM,
        NORMAL,
        REPEAT,
        GROUPS,
        PASS,
        NOISE,
        SPLITS,
        BED,
        FEATURE,
    ];
}

pub const REDUNDANT_HEADER: &str = "Kept\tRedundant";
pub const KEPT_TARGET_HEADER: &str = "Kept_Target\tRedundant_Query";
pub const KEPT_QUERY_HEADER: &str = "Kept_Query\tRedundant_Target";

/// File name without its last extension, and without `.gz`/`.bgz` before that
fn base_name(input: &Path) -> String {
    let compressed = matches!(
        input.extension().and_then(|e| e.to_str()),
        Some("gz") | Some("bgz")
    );
    let stem = if compressed {
        input.file_stem().map(Path::new).and_then(Path::file_stem)
    } else {
        input.file_stem()
    };
    stem.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// `<dir>/<base>.<suffix>.txt`, where `<base>` drops the last extension only
pub fn derived_path<P: AsRef<Path>>(input: P, suffix: &str) -> PathBuf {
    let input = input.as_ref();
    input.with_file_name(format!("{}.{suffix}.txt", base_name(input)))
}

/// `<dir>/<base>.<suffix>.bed`
pub fn derived_bed_path<P: AsRef<Path>>(input: P, suffix: &str) -> PathBuf {
    let input = input.as_ref();
    input.with_file_name(format!("{}.{suffix}.bed", base_name(input)))
}

pub fn create_output<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Header lines followed by one `Display` line per record
pub fn write_records<W, T, I>(out: &mut W, headers: &[String], records: I) -> Result<usize>
where
    W: Write,
    T: Display,
    I: IntoIterator<Item = T>,
{
    for header in headers {
        writeln!(out, "{header}")?;
    }
    let mut count = 0;
    for record in records {
        writeln!(out, "{record}")?;
        count += 1;
    }
    Ok(count)
}

/// The annotated stream: input headers, column header, then gate-passing hits
pub fn write_annotated<W: Write>(
    out: &mut W,
    headers: &[String],
    hits: &[QualifiedHit],
    gate: &QualifyConfig,
) -> Result<usize> {
    for header in headers {
        writeln!(out, "{header}")?;
    }
    writeln!(out, "{ANNOTATED_HEADER}")?;
    let mut count = 0;
    for q in hits.iter().filter(|q| gate.passes(q)) {
        writeln!(out, "{q}")?;
        count += 1;
    }
    Ok(count)
}

/// Two-column name pairs under a header line
pub fn write_pairs<W, A, B, I>(out: &mut W, header: &str, pairs: I) -> Result<usize>
where
    W: Write,
    A: Display,
    B: Display,
    I: IntoIterator<Item = (A, B)>,
{
    writeln!(out, "{header}")?;
    let mut count = 0;
    for (kept, redundant) in pairs {
        writeln!(out, "{kept}\t{redundant}")?;
        count += 1;
    }
    Ok(count)
}

/// `name1 score name2 score2 oname1`
pub fn write_best_matches<W: Write>(out: &mut W, report: &BestMatchReport) -> Result<()> {
    for row in &report.rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            row.name1, row.score, row.name2, row.score2, row.oname1
        )?;
    }
    Ok(())
}

/// `# group<N>` followed by the member names, numbered from 0
pub fn write_groups<W: Write, S: AsRef<str>>(out: &mut W, groups: &[Vec<S>]) -> Result<()> {
    for (n, group) in groups.iter().enumerate() {
        writeln!(out, "# group{n}")?;
        for name in group {
            writeln!(out, "{}", name.as_ref())?;
        }
    }
    Ok(())
}

pub fn write_splits<W: Write>(out: &mut W, rows: &[SplitRow]) -> Result<()> {
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            row.name2, row.name1, row.length, row.placements
        )?;
    }
    Ok(())
}

pub fn write_bed<'a, W, I>(out: &mut W, rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a BedRow>,
{
    for row in rows {
        writeln!(out, "{row}")?;
    }
    Ok(())
}

/// Create `path`, hand the writer to `write`, and flush
pub fn write_file<P, F>(path: P, write: F) -> Result<PathBuf>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let path = path.as_ref();
    let mut out = create_output(path)?;
    write(&mut out)?;
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BestMatchRow;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_derived_path() {
        assert_eq!(
            derived_path("data/last_T1_Q2.E0.txt", "unique"),
            PathBuf::from("data/last_T1_Q2.E0.unique.txt")
        );
        assert_eq!(derived_path("hits", "qc"), PathBuf::from("hits.qc.txt"));
        assert_eq!(derived_path("hits.txt.gz", "qc"), PathBuf::from("hits.qc.txt"));
        assert_eq!(
            derived_bed_path("run/hits.txt", "target"),
            PathBuf::from("run/hits.target.bed")
        );
    }

    #[test]
    fn test_derived_names_differ_ignoring_case() {
        let mut seen = std::collections::HashSet::new();
        for sfx in suffix::ALL_TXT {
            let path = derived_path("run/hits.txt", sfx);
            assert!(
                seen.insert(path.to_string_lossy().to_lowercase()),
                "{} collides with another output",
                path.display()
            );
        }
        assert_ne!(
            derived_bed_path("run/hits.txt", suffix::TARGET_BED).to_string_lossy().to_lowercase(),
            derived_bed_path("run/hits.txt", suffix::QUERY_BED).to_string_lossy().to_lowercase()
        );
    }

    #[test]
    fn test_write_groups() {
        let groups = vec![vec!["ctgA", "chr1"], vec!["ctgB"]];
        let mut out = Vec::new();
        write_groups(&mut out, &groups).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# group0\nctgA\nchr1\n# group1\nctgB\n"
        );
    }

    #[test]
    fn test_write_pairs_and_best_matches() {
        let mut out = Vec::new();
        let n = write_pairs(&mut out, KEPT_TARGET_HEADER, vec![("chr1", "ctgA")]).unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Kept_Target\tRedundant_Query\nchr1\tctgA\n"
        );

        let report = BestMatchReport {
            rows: vec![BestMatchRow {
                name1: "chr1".into(),
                score: 500,
                name2: "ctgA".into(),
                score2: 500,
                oname1: "chr1".into(),
            }],
            missing: Vec::new(),
        };
        let mut out = Vec::new();
        write_best_matches(&mut out, &report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "chr1\t500\tctgA\t500\tchr1\n");
    }
}
