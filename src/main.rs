use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use lastqc::graph::TieBreak;
use lastqc::hit::ParseOptions;
use lastqc::metrics::{CoveragePolicy, MetricCalculator, QualifyConfig, ScoringScheme};
use lastqc::noise::NoiseConfig;
use lastqc::overlap::{OverlapConfig, RankPattern};
use lastqc::pipeline::{run_batch, run_file, AnalysisConfig, FileOutcome, Stage};
use lastqc::redundancy::RedundancyConfig;
use lastqc::regions::{read_bed_file, RegionIndex};
use lastqc::repeats::RepeatConfig;
use lastqc::splits::SplitsConfig;

/// lastqc - Qualify, deduplicate and classify LAST tabular alignment hits
///
/// Every command reads one hit file and writes its results next to it as
/// `<basename>.<suffix>.txt`.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Verbosity (-v info, -vv debug)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[clap(long = "quiet", global = true)]
    quiet: bool,

    /// Append the command line to README.txt
    #[clap(short = 'l', long = "log", global = true)]
    log: bool,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value = "8", global = true)]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotated stream with identity, coverage and overlap qualification (QC)
    Qualify(RunArgs),
    /// Kept/Redundant name pairs from the overlap filter
    Overlap(RunArgs),
    /// Best-match report: name1 score name2 score2 oname1
    Graph(RunArgs),
    /// Split hits into unique and multi
    Unique(RunArgs),
    /// Split hits into unique, otm1, otm2 and mtm
    Otm(RunArgs),
    /// Split hits into normal and repeat
    Repeats(RunArgs),
    /// Connected groups of sequences
    Groups(RunArgs),
    /// Whole-sequence containment reports
    Redundant(RunArgs),
    /// Split hits into pass and noise
    Noise(RunArgs),
    /// Placement of contigs over ranked sequences
    Splits(RunArgs),
    /// Keep hits overlapping BED regions
    FilterBed(BedArgs),
    /// Keep hits with a gap inside BED regions and write target/query BED rows
    GapBed(BedArgs),
    /// Every stage
    All(AllArgs),
    /// Every stage, over several files
    Batch(BatchArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Input hit file (.gz accepted)
    input: PathBuf,

    #[clap(flatten)]
    tuning: Tuning,
}

#[derive(clap::Args, Debug)]
struct BedArgs {
    input: PathBuf,

    /// BED file: name start stop [label]
    #[clap(short = 'b', long = "bedfile")]
    bed: PathBuf,

    #[clap(flatten)]
    tuning: Tuning,
}

#[derive(clap::Args, Debug)]
struct AllArgs {
    input: PathBuf,

    /// Also run the region stages
    #[clap(short = 'b', long = "bedfile")]
    bed: Option<PathBuf>,

    #[clap(flatten)]
    tuning: Tuning,
}

#[derive(clap::Args, Debug)]
struct BatchArgs {
    #[clap(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    #[clap(short = 'b', long = "bedfile")]
    bed: Option<PathBuf>,

    #[clap(flatten)]
    tuning: Tuning,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CoverageArg {
    Smaller,
    Side1,
    Side2,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TieArg {
    First,
    Last,
}

#[derive(clap::Args, Debug)]
struct Tuning {
    /// Minimum percent identity
    #[clap(long = "min-identity", default_value = "0")]
    min_identity: f64,

    /// Minimum percent coverage
    #[clap(long = "min-coverage", default_value = "0")]
    min_coverage: f64,

    /// Minimum aligned length (shorter side)
    #[clap(long = "min-length", default_value = "0")]
    min_length: u64,

    /// Maximum E-value from the E= field
    #[clap(long = "max-evalue")]
    max_evalue: Option<f64>,

    /// Require the EG= and E= fields
    #[clap(long = "require-evalue")]
    require_evalue: bool,

    /// Skip checking that blocks add up to the aligned sizes
    #[clap(long = "no-block-check")]
    no_block_check: bool,

    /// Sequence used as the coverage denominator
    #[clap(long = "coverage", value_enum, default_value = "smaller")]
    coverage: CoverageArg,

    /// Match reward of the aligner's scoring scheme
    #[clap(long = "match-reward", default_value = "6")]
    match_reward: f64,

    /// Score lost per mismatch (match reward + mismatch cost)
    #[clap(long = "mismatch-scale", default_value = "24")]
    mismatch_scale: f64,

    #[clap(long = "gap-open", default_value = "21")]
    gap_open: f64,

    #[clap(long = "gap-extend", default_value = "9")]
    gap_extend: f64,

    /// Characters before the numeric rank in name1 (chr12 -> 3)
    #[clap(long = "rank-prefix", default_value = "3")]
    rank_prefix: usize,

    /// Best-partner choice among equal scores
    #[clap(long = "tie-break", value_enum, default_value = "first")]
    tie_break: TieArg,

    /// Margin trimmed from segment ends before testing repeat overlap
    #[clap(long = "margin", default_value = "100")]
    margin: u64,

    /// Overlap count above which a sequence is repetitive
    #[clap(long = "repeat-threshold", default_value = "1")]
    repeat_threshold: u32,

    /// Size ratio for whole-sequence containment
    #[clap(long = "size-ratio", default_value = "0.9")]
    size_ratio: f64,

    /// Padding around regions in gap-feature BED rows
    #[clap(long = "pad", default_value = "100")]
    pad: u64,

    /// Minimum contig size for split placement
    #[clap(long = "min-split-size", default_value = "1000")]
    min_split_size: u64,
}

impl Tuning {
    fn config(&self) -> AnalysisConfig {
        let rank = RankPattern {
            prefix_len: self.rank_prefix,
        };
        let coverage = match self.coverage {
            CoverageArg::Smaller => CoveragePolicy::SmallerSequence,
            CoverageArg::Side1 => CoveragePolicy::Side1,
            CoverageArg::Side2 => CoveragePolicy::Side2,
        };
        let scheme = ScoringScheme {
            match_reward: self.match_reward,
            mismatch_scale: self.mismatch_scale,
            gap_open: self.gap_open,
            gap_extend: self.gap_extend,
        };
        AnalysisConfig {
            parse: ParseOptions {
                require_evalue: self.require_evalue,
                check_blocks: !self.no_block_check,
            },
            metrics: MetricCalculator::new(scheme, coverage),
            qualify: QualifyConfig {
                min_identity: self.min_identity,
                min_coverage: self.min_coverage,
                min_aln_length: self.min_length,
                max_evalue: self.max_evalue,
            },
            overlap: OverlapConfig { rank },
            tie_break: match self.tie_break {
                TieArg::First => TieBreak::FirstSeen,
                TieArg::Last => TieBreak::LastSeen,
            },
            repeats: RepeatConfig {
                margin: self.margin,
                threshold: self.repeat_threshold,
            },
            redundancy: RedundancyConfig {
                size_ratio: self.size_ratio,
            },
            noise: NoiseConfig::default(),
            splits: SplitsConfig {
                min_seq_size: self.min_split_size,
                rank,
            },
            gap_pad: self.pad,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Stages for `all`/`batch`, with the region stages when a BED file is given
fn all_stages(with_regions: bool) -> Vec<Stage> {
    let mut stages = Stage::ALL.to_vec();
    if with_regions {
        stages.extend([Stage::Regions, Stage::GapFeatures]);
    }
    stages
}

fn load_regions(bed: Option<&PathBuf>) -> Result<Option<RegionIndex>> {
    match bed {
        Some(path) => {
            let regions = read_bed_file(path)?;
            info!("Loaded {} regions from {}", regions.len(), path.display());
            Ok(Some(regions))
        }
        None => Ok(None),
    }
}

fn run_single(input: &Path, stages: &[Stage], regions: Option<&RegionIndex>, tuning: &Tuning) -> Result<()> {
    let summary = run_file(input, stages, regions, tuning.config())?;
    info!(
        "{}: {} records, {} dropped by the gate, {} diagnostics",
        summary.input.display(),
        summary.records,
        summary.gated_out,
        summary.diagnostics.len()
    );
    for path in &summary.outputs {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let single = |run: &RunArgs, stage: Stage| run_single(&run.input, &[stage], None, &run.tuning);

    match &args.command {
        Command::Qualify(a) => single(a, Stage::Qualify),
        Command::Overlap(a) => single(a, Stage::Overlap),
        Command::Graph(a) => single(a, Stage::Graph),
        Command::Unique(a) => single(a, Stage::Unique),
        Command::Otm(a) => single(a, Stage::Cardinality),
        Command::Repeats(a) => single(a, Stage::Repeats),
        Command::Groups(a) => single(a, Stage::Groups),
        Command::Redundant(a) => single(a, Stage::Containment),
        Command::Noise(a) => single(a, Stage::Noise),
        Command::Splits(a) => single(a, Stage::Splits),
        Command::FilterBed(a) | Command::GapBed(a) => {
            let stage = if matches!(args.command, Command::FilterBed(_)) {
                Stage::Regions
            } else {
                Stage::GapFeatures
            };
            let regions = load_regions(Some(&a.bed))?;
            run_single(&a.input, &[stage], regions.as_ref(), &a.tuning)
        }
        Command::All(a) => {
            let regions = load_regions(a.bed.as_ref())?;
            run_single(&a.input, &all_stages(regions.is_some()), regions.as_ref(), &a.tuning)
        }
        Command::Batch(a) => {
            let regions = load_regions(a.bed.as_ref())?;
            let stages = all_stages(regions.is_some());
            let outcomes = run_batch(&a.inputs, &stages, regions.as_ref(), a.tuning.config());

            let mut failed = 0;
            for (path, outcome) in a.inputs.iter().zip(&outcomes) {
                match outcome {
                    FileOutcome::Success(s) => {
                        info!("{}: ok, {} outputs", path.display(), s.outputs.len())
                    }
                    FileOutcome::Skipped(e) => info!("{}: skipped ({e})", path.display()),
                    FileOutcome::Failed(e) => {
                        failed += 1;
                        error!("{}: failed: {e:#}", path.display());
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} files failed", outcomes.len());
            }
            Ok(())
        }
    }
}

fn append_log() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let mut readme = OpenOptions::new()
        .create(true)
        .append(true)
        .open("README.txt")?;
    writeln!(
        readme,
        "[{}]\t[{}]",
        chrono::Local::now().format("%a %b %e %H:%M:%S %Y"),
        argv.join(" ")
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // Set up rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    let result = run(&args);
    if args.log {
        append_log()?;
    }
    result
}
