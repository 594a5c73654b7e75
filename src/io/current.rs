//! Per-read current files: one line per 5-mer window a read covers.
//!
//! ```text
//! chrom  start  end  read_id  score  strand  m1,..,m5  s1,..,s5  c1,..,cN
//! ```
//!
//! `[start, end)` spans the 5-mer; the modification site it describes is the
//! centre base `[start + 2, end - 2)`.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::error::Error;
use crate::region::Strand;

pub const KMER: usize = 5;
pub const FLANK: u64 = (KMER / 2) as u64;
pub const CURRENT_EXT: &str = ".current.tsv";

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub read_id: String,
    pub score: String,
    pub strand: Strand,
    pub norm_mean: Vec<f32>,
    pub norm_stdev: Vec<f32>,
    pub current: Vec<f32>,
}

impl CurrentRecord {
    /// Region key of the centre site.
    pub fn site_key(&self) -> String {
        format!("{}_{}_{}-{}", self.chrom, self.strand, self.start + FLANK, self.end - FLANK)
    }

    pub fn parse(line: &str, line_no: usize) -> Result<Self, Error> {
        let bad = |reason: String| Error::MalformedCurrent { line: line_no, reason };
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 9 {
            return Err(bad(format!("expected 9 columns, found {}", cols.len())));
        }
        let start: u64 = cols[1].parse().map_err(|_| bad(format!("invalid start '{}'", cols[1])))?;
        let end: u64 = cols[2].parse().map_err(|_| bad(format!("invalid end '{}'", cols[2])))?;
        if end < start + 2 * FLANK + 1 {
            return Err(bad(format!("window {}-{} is shorter than a {}-mer", start, end, KMER)));
        }
        let strand = cols[5].parse().map_err(|e: Error| bad(e.to_string()))?;
        let floats = |field: &str, name: &str| -> Result<Vec<f32>, Error> {
            field
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|v| v.parse::<f32>().map_err(|_| bad(format!("invalid {} value '{}'", name, v))))
                .collect()
        };
        let norm_mean = floats(cols[6], "norm_mean")?;
        let norm_stdev = floats(cols[7], "norm_stdev")?;
        if norm_mean.len() != KMER || norm_stdev.len() != KMER {
            return Err(bad(format!(
                "expected {} norm_mean/norm_stdev values, found {}/{}",
                KMER,
                norm_mean.len(),
                norm_stdev.len()
            )));
        }
        let current = floats(cols[8], "current")?;
        Ok(Self {
            chrom: cols[0].to_string(),
            start,
            end,
            read_id: cols[3].to_string(),
            score: cols[4].to_string(),
            strand,
            norm_mean,
            norm_stdev,
            current,
        })
    }
}

fn join(values: &[f32]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

impl fmt::Display for CurrentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.read_id,
            self.score,
            self.strand,
            join(&self.norm_mean),
            join(&self.norm_stdev),
            join(&self.current),
        )
    }
}

/// Resolve the `--current` input: a list file with one path per line, or a
/// directory holding `*.current.tsv` files.
pub fn list_current_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(input).with_context(|| format!("cannot read directory '{}'", input.display()))? {
            let path = entry?.path();
            let is_current = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(CURRENT_EXT))
                .unwrap_or(false);
            if path.is_file() && is_current {
                files.push(path);
            }
        }
        files.sort();
        return Ok(files);
    }
    if !input.is_file() {
        bail!("current input '{}' is neither a file nor a directory", input.display());
    }
    let fh = File::open(input).with_context(|| format!("cannot open current list '{}'", input.display()))?;
    let base = input.parent().unwrap_or_else(|| Path::new("."));
    let mut files = Vec::new();
    for line in BufReader::new(fh).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let p = PathBuf::from(line);
        // relative entries are resolved against the list's own directory
        files.push(if p.is_relative() && !p.exists() { base.join(p) } else { p });
    }
    Ok(files)
}
