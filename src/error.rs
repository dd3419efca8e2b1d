/// Per-record diagnostics raised while analysing a hit stream
///
/// None of these abort a run. They are collected next to the results of the
/// stage that produced them so the caller can log or report them; only
/// whole-file I/O failures surface as `anyhow::Error`.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HitError {
    /// Malformed line, skipped
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A best-match entry points at a partner with no usable back-reference
    #[error("best partner '{partner}' of '{name}' is missing from the match graph")]
    MissingPartner { name: String, partner: String },

    /// The sequence name carries no numeric rank; it can be covered but never covers
    #[error("sequence '{name}' has no numeric rank")]
    UnrankedSequence { name: String },

    /// The whole input produced zero valid records
    #[error("no valid hit records in {}", path.display())]
    EmptyInput { path: PathBuf },
}

impl HitError {
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        HitError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
