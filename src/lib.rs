// Library exports for lastqc
pub mod components;
pub mod error;
pub mod graph;
pub mod hit;
pub mod metrics;
pub mod noise;
pub mod output;
pub mod overlap;
pub mod pipeline;
pub mod reader;
pub mod redundancy;
pub mod regions;
pub mod repeats;
pub mod splits;

pub use error::HitError;
pub use hit::{BlockSegment, HitRecord, ParseOptions, Side, Strand};
pub use metrics::{MetricCalculator, QualifiedHit, Qual, QualifyConfig};
pub use pipeline::{run_batch, Analysis, AnalysisConfig, FileOutcome, RunSummary, Stage};
