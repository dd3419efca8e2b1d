/// One analysis run over a hit file, and the multi-file batch driver
use anyhow::{bail, Result};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::components::connected_components;
use crate::error::HitError;
use crate::graph::{Cardinality, MatchGraph, TieBreak};
use crate::hit::{HitRecord, ParseOptions, Side};
use crate::metrics::{MetricCalculator, QualifiedHit, QualifyConfig};
use crate::noise::{flag_noise, NoiseConfig};
use crate::output::{self, suffix};
use crate::overlap::{filter_overlaps, redundancy_pairs, OverlapConfig, OverlapOutcome};
use crate::reader::{read_hit_file, HitFile};
use crate::redundancy::{containment_report, ContainmentReport, RedundancyConfig};
use crate::regions::{gap_features, select_in_regions, RegionIndex};
use crate::repeats::{RepeatConfig, RepeatDetector};
use crate::splits::{split_placements, SplitRow, SplitsConfig};

/// Every tunable of a run
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    pub parse: ParseOptions,
    pub metrics: MetricCalculator,
    /// Records failing the gate are dropped before any stage sees them
    pub qualify: QualifyConfig,
    pub overlap: OverlapConfig,
    pub tie_break: TieBreak,
    pub repeats: RepeatConfig,
    pub redundancy: RedundancyConfig,
    pub noise: NoiseConfig,
    pub splits: SplitsConfig,
    /// Padding around regions in gap-feature BED rows
    pub gap_pad: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            parse: ParseOptions::default(),
            metrics: MetricCalculator::default(),
            qualify: QualifyConfig::default(),
            overlap: OverlapConfig::default(),
            tie_break: TieBreak::default(),
            repeats: RepeatConfig::default(),
            redundancy: RedundancyConfig::default(),
            noise: NoiseConfig::default(),
            splits: SplitsConfig::default(),
            gap_pad: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Annotated stream with overlap qualification (`QC`)
    Qualify,
    /// Kept/Redundant name pairs from the overlap filter
    Overlap,
    /// Best-match report
    Graph,
    /// `unique` / `multi` partitions
    Unique,
    /// `unique` / `otm1` / `otm2` / `mtm` partitions
    Cardinality,
    /// `normal` / `repeat` partitions
    Repeats,
    Groups,
    /// Whole-sequence containment reports
    Containment,
    /// `pass` / `noise` partitions
    Noise,
    Splits,
    /// Hits inside BED regions
    Regions,
    /// Hits with gaps inside BED regions, plus BED rows
    GapFeatures,
}

impl Stage {
    /// Every stage that runs without a region file
    pub const ALL: [Stage; 10] = [
        Stage::Qualify,
        Stage::Overlap,
        Stage::Graph,
        Stage::Unique,
        Stage::Cardinality,
        Stage::Repeats,
        Stage::Groups,
        Stage::Containment,
        Stage::Noise,
        Stage::Splits,
    ];

    pub fn needs_regions(self) -> bool {
        matches!(self, Stage::Regions | Stage::GapFeatures)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub input: PathBuf,
    /// Records that reached the stages
    pub records: usize,
    /// Records dropped by the qualification gate
    pub gated_out: usize,
    pub outputs: Vec<PathBuf>,
    /// Every recoverable problem met during the run
    pub diagnostics: Vec<HitError>,
}

#[derive(Debug)]
pub enum FileOutcome {
    Success(RunSummary),
    /// The file had no valid records
    Skipped(HitError),
    Failed(anyhow::Error),
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Success(_))
    }
}

/// The decoded, gated records of one input
#[derive(Debug, Clone)]
pub struct Analysis {
    config: AnalysisConfig,
    headers: Vec<String>,
    records: Vec<HitRecord>,
    /// Input line of each record, copied verbatim into partitions
    lines: Vec<String>,
    diagnostics: Vec<HitError>,
    gated_out: usize,
}

impl Analysis {
    pub fn new(file: HitFile, config: AnalysisConfig) -> Self {
        let total = file.hits.len();
        let (records, lines): (Vec<HitRecord>, Vec<String>) = file
            .hits
            .into_iter()
            .zip(file.lines)
            .map(|(h, line)| (config.metrics.annotate(h), line))
            .filter(|(q, _)| config.qualify.passes(q))
            .map(|(q, line)| (q.hit, line))
            .unzip();
        let gated_out = total - records.len();
        if gated_out > 0 {
            info!("Qualification gate dropped {gated_out} of {total} records");
        }
        Analysis {
            config,
            headers: file.headers,
            records,
            lines,
            diagnostics: file.diagnostics,
            gated_out,
        }
    }

    /// Read and gate a hit file
    ///
    /// A file without valid records, or whose records all fail the gate,
    /// is `EmptyInput`.
    pub fn load<P: AsRef<Path>>(path: P, config: AnalysisConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = read_hit_file(path, config.parse)?;
        let empty = HitError::EmptyInput {
            path: path.to_path_buf(),
        };
        if file.is_empty() {
            return Err(empty.into());
        }
        let analysis = Analysis::new(file, config);
        if analysis.records.is_empty() {
            warn!("{}: every record failed the qualification gate", path.display());
            return Err(empty.into());
        }
        Ok(analysis)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[HitRecord] {
        &self.records
    }

    /// Diagnostics from reading the input
    pub fn diagnostics(&self) -> &[HitError] {
        &self.diagnostics
    }

    /// Annotate every record and qualify it with the overlap filter
    pub fn qualified(&self) -> (Vec<QualifiedHit>, OverlapOutcome) {
        let outcome = filter_overlaps(&self.records, &self.config.overlap);
        let hits = self
            .records
            .iter()
            .zip(&outcome.quals)
            .map(|(h, &qual)| {
                let mut q = self.config.metrics.annotate(h.clone());
                q.qual = qual;
                q
            })
            .collect();
        (hits, outcome)
    }

    pub fn match_graph(&self) -> MatchGraph {
        MatchGraph::build(&self.records, self.config.tie_break)
    }

    /// Connected groups of sequence names over every recorded partner
    pub fn groups(&self, graph: &MatchGraph) -> Vec<Vec<String>> {
        let adjacency = graph.adjacency();
        connected_components(&adjacency)
            .into_iter()
            .map(|g| g.into_iter().map(str::to_string).collect())
            .collect()
    }

    pub fn repeat_flags(&self) -> Vec<bool> {
        RepeatDetector::from_hits(&self.records, self.config.repeats).flag_all(&self.records)
    }

    pub fn containment(&self) -> ContainmentReport {
        containment_report(&self.records, &self.config.redundancy)
    }

    pub fn noise_flags(&self) -> Vec<bool> {
        flag_noise(&self.records, &self.config.noise)
    }

    pub fn splits(&self, qualified: &[QualifiedHit]) -> Vec<SplitRow> {
        split_placements(qualified, &self.config.splits)
    }

    /// Run `stages` and write their files next to `input`
    pub fn run(&self, input: &Path, stages: &[Stage], regions: Option<&RegionIndex>) -> Result<RunSummary> {
        let mut summary = RunSummary {
            input: input.to_path_buf(),
            records: self.records.len(),
            gated_out: self.gated_out,
            outputs: Vec::new(),
            diagnostics: self.diagnostics.clone(),
        };

        let mut qualified: Option<(Vec<QualifiedHit>, OverlapOutcome)> = None;
        let mut graph: Option<MatchGraph> = None;

        for &stage in stages {
            debug!("Running stage {stage:?} on {}", input.display());
            match stage {
                Stage::Qualify | Stage::Overlap | Stage::Splits => {
                    if qualified.is_none() {
                        let (hits, outcome) = self.qualified();
                        for e in &outcome.unranked {
                            debug!("{e}");
                        }
                        if !outcome.unranked.is_empty() {
                            info!(
                                "{} sequences without a numeric rank never cover other hits",
                                outcome.unranked.len()
                            );
                        }
                        summary.diagnostics.extend(outcome.unranked.iter().cloned());
                        qualified = Some((hits, outcome));
                    }
                }
                Stage::Graph | Stage::Unique | Stage::Cardinality | Stage::Groups => {
                    if graph.is_none() {
                        graph = Some(self.match_graph());
                    }
                }
                _ => {}
            }

            let written = match stage {
                Stage::Qualify => {
                    let Some((hits, _)) = qualified.as_ref() else { continue };
                    let path = output::derived_path(input, suffix::ANNOTATED);
                    vec![output::write_file(path, |out| {
                        output::write_annotated(out, &self.headers, hits, &self.config.qualify).map(|_| ())
                    })?]
                }
                Stage::Overlap => {
                    let Some((_, outcome)) = qualified.as_ref() else { continue };
                    let pairs = redundancy_pairs(&self.records, outcome);
                    let path = output::derived_path(input, suffix::REDUNDANT);
                    vec![output::write_file(path, |out| {
                        output::write_pairs(out, output::REDUNDANT_HEADER, pairs).map(|_| ())
                    })?]
                }
                Stage::Graph => {
                    let Some(graph) = graph.as_ref() else { continue };
                    let report = graph.best_match_report();
                    let path = output::derived_path(input, suffix::GRAPH);
                    let path = output::write_file(path, |out| output::write_best_matches(out, &report))?;
                    summary.diagnostics.extend(report.missing);
                    vec![path]
                }
                Stage::Unique => {
                    let Some(graph) = graph.as_ref() else { continue };
                    let classes = graph.classify_all(&self.records);
                    let flags: Vec<bool> = classes.iter().map(|&c| c != Cardinality::Unique).collect();
                    let (unique, multi) = split_by(&flags);
                    self.write_partitions(input, vec![(suffix::UNIQUE, unique), (suffix::MULTI, multi)])?
                }
                Stage::Cardinality => {
                    let Some(graph) = graph.as_ref() else { continue };
                    let classes = graph.classify_all(&self.records);
                    let mut parts: Vec<(&str, Vec<usize>)> = vec![
                        (suffix::UNIQUE, Vec::new()),
                        (suffix::OTM1, Vec::new()),
                        (suffix::OTM2, Vec::new()),
                        (suffix::MTM, Vec::new()),
                    ];
                    for (idx, class) in classes.into_iter().enumerate() {
                        let slot = match class {
                            Cardinality::Unique => 0,
                            Cardinality::OneToMany(Side::One) => 1,
                            Cardinality::OneToMany(Side::Two) => 2,
                            Cardinality::ManyToMany => 3,
                        };
                        parts[slot].1.push(idx);
                    }
                    self.write_partitions(input, parts)?
                }
                Stage::Repeats => {
                    let flags = self.repeat_flags();
                    let (normal, repeat) = split_by(&flags);
                    self.write_partitions(input, vec![(suffix::NORMAL, normal), (suffix::REPEAT, repeat)])?
                }
                Stage::Groups => {
                    let Some(graph) = graph.as_ref() else { continue };
                    let groups = self.groups(graph);
                    info!("{} connected groups", groups.len());
                    let path = output::derived_path(input, suffix::GROUPS);
                    vec![output::write_file(path, |out| output::write_groups(out, &groups))?]
                }
                Stage::Containment => {
                    let report = self.containment();
                    let target = output::derived_path(input, suffix::REDUNDANT_TARGET);
                    let query = output::derived_path(input, suffix::REDUNDANT_QUERY);
                    vec![
                        output::write_file(target, |out| {
                            output::write_pairs(out, output::KEPT_TARGET_HEADER, report.kept_target.iter().map(|(k, r)| (k, r)))
                                .map(|_| ())
                        })?,
                        output::write_file(query, |out| {
                            output::write_pairs(out, output::KEPT_QUERY_HEADER, report.kept_query.iter().map(|(k, r)| (k, r)))
                                .map(|_| ())
                        })?,
                    ]
                }
                Stage::Noise => {
                    let flags = self.noise_flags();
                    let (pass, noise) = split_by(&flags);
                    info!("Noise QC: {} pass, {} noise", pass.len(), noise.len());
                    self.write_partitions(input, vec![(suffix::PASS, pass), (suffix::NOISE, noise)])?
                }
                Stage::Splits => {
                    let Some((hits, _)) = qualified.as_ref() else { continue };
                    let rows = self.splits(hits);
                    let path = output::derived_path(input, suffix::SPLITS);
                    vec![output::write_file(path, |out| output::write_splits(out, &rows))?]
                }
                Stage::Regions => {
                    let Some(regions) = regions else {
                        bail!("stage {stage:?} needs a BED file");
                    };
                    let selected = select_in_regions(&self.records, regions);
                    info!("{} of {} hits inside {} regions", selected.len(), self.records.len(), regions.len());
                    self.write_partitions(input, vec![(suffix::BED, selected)])?
                }
                Stage::GapFeatures => {
                    let Some(regions) = regions else {
                        bail!("stage {stage:?} needs a BED file");
                    };
                    let features = gap_features(&self.records, regions, self.config.gap_pad);
                    let hits: Vec<usize> = features.iter().map(|f| f.hit_index).collect();
                    let mut paths = self.write_partitions(input, vec![(suffix::FEATURE, hits)])?;
                    let target = output::derived_bed_path(input, suffix::TARGET_BED);
                    let query = output::derived_bed_path(input, suffix::QUERY_BED);
                    paths.push(output::write_file(target, |out| {
                        output::write_bed(out, features.iter().map(|f| &f.target))
                    })?);
                    paths.push(output::write_file(query, |out| {
                        output::write_bed(out, features.iter().map(|f| &f.query))
                    })?);
                    paths
                }
            };
            summary.outputs.extend(written);
        }

        for e in &summary.diagnostics {
            if matches!(e, HitError::MissingPartner { .. }) {
                warn!("{}: {e}", input.display());
            }
        }
        Ok(summary)
    }

    /// Copy the input lines of each partition's records under the input headers
    fn write_partitions(&self, input: &Path, parts: Vec<(&str, Vec<usize>)>) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(parts.len());
        for (sfx, indices) in parts {
            let path = output::derived_path(input, sfx);
            debug!("{}: {} records", path.display(), indices.len());
            paths.push(output::write_file(path, |out| {
                output::write_records(out, &self.headers, indices.iter().map(|&i| &self.lines[i])).map(|_| ())
            })?);
        }
        Ok(paths)
    }
}

/// Record indices split into (unflagged, flagged)
fn split_by(flags: &[bool]) -> (Vec<usize>, Vec<usize>) {
    (0..flags.len()).partition(|&i| !flags[i])
}

/// Load one file and run `stages` on it
pub fn run_file(path: &Path, stages: &[Stage], regions: Option<&RegionIndex>, config: AnalysisConfig) -> Result<RunSummary> {
    let analysis = Analysis::load(path, config)?;
    analysis.run(path, stages, regions)
}

/// Run every file independently; a failing file never stops the others
pub fn run_batch<P: AsRef<Path> + Sync>(
    paths: &[P],
    stages: &[Stage],
    regions: Option<&RegionIndex>,
    config: AnalysisConfig,
) -> Vec<FileOutcome> {
    let outcomes: Vec<FileOutcome> = paths
        .par_iter()
        .map(|p| {
            let path = p.as_ref();
            match run_file(path, stages, regions, config) {
                Ok(summary) => FileOutcome::Success(summary),
                Err(e) => match e.downcast::<HitError>() {
                    Ok(empty @ HitError::EmptyInput { .. }) => {
                        warn!("Skipping {}: {empty}", path.display());
                        FileOutcome::Skipped(empty)
                    }
                    Ok(other) => {
                        error!("{}: {other}", path.display());
                        FileOutcome::Failed(other.into())
                    }
                    Err(e) => {
                        error!("{}: {e:#}", path.display());
                        FileOutcome::Failed(e)
                    }
                },
            }
        })
        .collect();

    let ok = outcomes.iter().filter(|o| o.is_success()).count();
    info!("Batch finished: {ok} of {} files processed", outcomes.len());
    outcomes
}
