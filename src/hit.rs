use std::fmt;
use std::str::FromStr;

use crate::error::HitError;

/// Number of whitespace separated fields up to and including `blocks`
pub const MIN_FIELDS: usize = 12;

/// Minimum field count when the `EG=`/`E=` trailing fields are mandatory
pub const MIN_FIELDS_WITH_EVALUE: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl FromStr for Strand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(format!("invalid strand '{other}'")),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One element of the compact `blocks` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSegment {
    /// Gap-free run of aligned letters
    Ungapped(u64),
    /// Letters skipped on side 1 and side 2 between two ungapped runs
    Gap { side1: u64, side2: u64 },
}

impl BlockSegment {
    /// Parse a single `blocks` element: `L` or `A:B`
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.split_once(':') {
            Some((a, b)) => {
                let side1 = a
                    .parse()
                    .map_err(|_| format!("invalid gap length '{a}' in block '{s}'"))?;
                let side2 = b
                    .parse()
                    .map_err(|_| format!("invalid gap length '{b}' in block '{s}'"))?;
                Ok(BlockSegment::Gap { side1, side2 })
            }
            None => s
                .parse()
                .map(BlockSegment::Ungapped)
                .map_err(|_| format!("invalid block length '{s}'")),
        }
    }
}

impl BlockSegment {
    /// Letters this element covers on (side 1, side 2)
    pub fn spans(&self) -> (u64, u64) {
        match *self {
            BlockSegment::Ungapped(len) => (len, len),
            BlockSegment::Gap { side1, side2 } => (side1, side2),
        }
    }
}

impl fmt::Display for BlockSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSegment::Ungapped(len) => write!(f, "{len}"),
            BlockSegment::Gap { side1, side2 } => write!(f, "{side1}:{side2}"),
        }
    }
}

/// Parse a full comma separated `blocks` column
pub fn parse_blocks(s: &str) -> Result<Vec<BlockSegment>, String> {
    if s.is_empty() {
        return Err("empty blocks column".to_string());
    }
    s.split(',').map(BlockSegment::parse).collect()
}

/// Format blocks back into the `100,2:0,50` form
pub fn format_blocks(blocks: &[BlockSegment]) -> String {
    blocks
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Which column of a hit a sequence occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    One,
    Two,
}

/// Line parsing options
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Require the two trailing `EG=`/`E=` fields (14 fields instead of 12)
    pub require_evalue: bool,
    /// Reject records whose blocks do not add up to the aligned sizes
    pub check_blocks: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            require_evalue: false,
            check_blocks: true,
        }
    }
}

impl ParseOptions {
    pub fn min_fields(&self) -> usize {
        if self.require_evalue {
            MIN_FIELDS_WITH_EVALUE
        } else {
            MIN_FIELDS
        }
    }
}

/// One alignment between `name1` (side 1, always forward) and `name2`
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub score: i64,
    pub name1: String,
    pub start1: u64,
    pub aln_size1: u64,
    pub strand1: Strand,
    pub seq_size1: u64,
    pub name2: String,
    pub start2: u64,
    pub aln_size2: u64,
    pub strand2: Strand,
    pub seq_size2: u64,
    pub blocks: Vec<BlockSegment>,
    /// Trailing fields after `blocks` (`EG=…`, `E=…`), kept verbatim
    pub extra: Vec<String>,
}

impl HitRecord {
    /// Parse one data line. `line_no` is only used for diagnostics.
    pub fn parse_line(line: &str, line_no: usize, opts: &ParseOptions) -> Result<Self, HitError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < opts.min_fields() {
            return Err(HitError::parse(
                line_no,
                format!(
                    "expected at least {} fields, found {}",
                    opts.min_fields(),
                    fields.len()
                ),
            ));
        }

        let int = |idx: usize, what: &str| -> Result<u64, HitError> {
            fields[idx].parse::<u64>().map_err(|_| {
                HitError::parse(line_no, format!("invalid {what} '{}'", fields[idx]))
            })
        };
        let strand = |idx: usize| -> Result<Strand, HitError> {
            fields[idx]
                .parse::<Strand>()
                .map_err(|e| HitError::parse(line_no, e))
        };

        let score = fields[0]
            .parse::<i64>()
            .map_err(|_| HitError::parse(line_no, format!("invalid score '{}'", fields[0])))?;

        let record = HitRecord {
            score,
            name1: fields[1].to_string(),
            start1: int(2, "start1")?,
            aln_size1: int(3, "alnSize1")?,
            strand1: strand(4)?,
            seq_size1: int(5, "seqSize1")?,
            name2: fields[6].to_string(),
            start2: int(7, "start2")?,
            aln_size2: int(8, "alnSize2")?,
            strand2: strand(9)?,
            seq_size2: int(10, "seqSize2")?,
            blocks: parse_blocks(fields[11]).map_err(|e| HitError::parse(line_no, e))?,
            extra: fields[12..].iter().map(|s| s.to_string()).collect(),
        };

        record
            .validate(opts.check_blocks)
            .map_err(|e| HitError::parse(line_no, e))?;

        Ok(record)
    }

    /// Check coordinate bounds and, optionally, that the blocks add up
    ///
    /// Ends and block sums that overflow `u64` are rejected whether or not
    /// the block check is enabled, so the accessors below never overflow on
    /// a validated record.
    pub fn validate(&self, check_blocks: bool) -> Result<(), String> {
        let end1 = self
            .start1
            .checked_add(self.aln_size1)
            .ok_or("side 1 alignment end overflows")?;
        let end2 = self
            .start2
            .checked_add(self.aln_size2)
            .ok_or("side 2 alignment end overflows")?;
        if end1 > self.seq_size1 {
            return Err(format!(
                "side 1 alignment ends at {} beyond sequence size {}",
                end1, self.seq_size1
            ));
        }
        if end2 > self.seq_size2 {
            return Err(format!(
                "side 2 alignment ends at {} beyond sequence size {}",
                end2, self.seq_size2
            ));
        }
        let (span1, span2) = self
            .checked_block_spans()
            .ok_or("blocks column overflows")?;
        if check_blocks && (span1 != self.aln_size1 || span2 != self.aln_size2) {
            return Err(format!(
                "blocks span {}/{} but aligned sizes are {}/{}",
                span1, span2, self.aln_size1, self.aln_size2
            ));
        }
        Ok(())
    }

    pub fn end1(&self) -> u64 {
        self.start1 + self.aln_size1
    }

    pub fn end2(&self) -> u64 {
        self.start2 + self.aln_size2
    }

    /// Side 1 interval, used as given
    pub fn interval1(&self) -> (u64, u64) {
        (self.start1, self.end1())
    }

    /// Side 2 interval on the forward strand
    ///
    /// Reverse strand coordinates count from the end of the reverse
    /// complement, so they are mirrored into `seqSize2 - end2 .. seqSize2 - start2`.
    pub fn interval2(&self) -> (u64, u64) {
        match self.strand2 {
            Strand::Forward => (self.start2, self.end2()),
            Strand::Reverse => (self.seq_size2 - self.end2(), self.seq_size2 - self.start2),
        }
    }

    /// Interval of the given side, strand-normalized for side 2
    pub fn interval(&self, side: Side) -> (u64, u64) {
        match side {
            Side::One => self.interval1(),
            Side::Two => self.interval2(),
        }
    }

    pub fn name(&self, side: Side) -> &str {
        match side {
            Side::One => &self.name1,
            Side::Two => &self.name2,
        }
    }

    /// Letters covered by the blocks on (side 1, side 2)
    pub fn block_spans(&self) -> (u64, u64) {
        self.blocks.iter().fold((0, 0), |(a, b), seg| {
            let (s1, s2) = seg.spans();
            (a.saturating_add(s1), b.saturating_add(s2))
        })
    }

    fn checked_block_spans(&self) -> Option<(u64, u64)> {
        self.blocks.iter().try_fold((0u64, 0u64), |(a, b), seg| {
            let (s1, s2) = seg.spans();
            Some((a.checked_add(s1)?, b.checked_add(s2)?))
        })
    }

    /// Sum of the gap-free runs
    pub fn ungapped_length(&self) -> u64 {
        self.blocks.iter().fold(0, |acc, seg| match *seg {
            BlockSegment::Ungapped(len) => acc.saturating_add(len),
            BlockSegment::Gap { .. } => acc,
        })
    }

    /// Side 1 spans of every gap, in alignment order
    ///
    /// A gap skipping no side-1 letters yields an empty span `[x, x)`.
    pub fn gap_intervals1(&self) -> Vec<(u64, u64)> {
        let mut x = self.start1;
        let mut gaps = Vec::new();
        for seg in &self.blocks {
            match *seg {
                BlockSegment::Ungapped(len) => x = x.saturating_add(len),
                BlockSegment::Gap { side1, .. } => {
                    let end = x.saturating_add(side1);
                    gaps.push((x, end));
                    x = end;
                }
            }
        }
        gaps
    }

    /// E-value from the trailing `E=` field, if present and numeric
    pub fn evalue(&self) -> Option<f64> {
        self.extra
            .iter()
            .find_map(|f| f.strip_prefix("E="))
            .and_then(|v| v.parse().ok())
    }

    /// Side 1 or 2 covers its whole sequence
    pub fn is_complete(&self, side: Side) -> bool {
        match side {
            Side::One => self.aln_size1 >= self.seq_size1,
            Side::Two => self.aln_size2 >= self.seq_size2,
        }
    }
}

impl fmt::Display for HitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.score,
            self.name1,
            self.start1,
            self.aln_size1,
            self.strand1,
            self.seq_size1,
            self.name2,
            self.start2,
            self.aln_size2,
            self.strand2,
            self.seq_size2,
            format_blocks(&self.blocks)
        )?;
        for field in &self.extra {
            write!(f, "\t{field}")?;
        }
        Ok(())
    }
}
