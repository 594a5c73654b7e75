use std::path::PathBuf;

use thiserror::Error;

/// Typed failures raised by the parsing and feature layers.
///
/// Pipeline code wraps these in `anyhow` with path context.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid region {chrom}:{start}-{end}: {reason}")]
    InvalidRegion {
        chrom: String,
        start: u64,
        end: u64,
        reason: String,
    },

    #[error("invalid strand '{0}', expected '+' or '-'")]
    InvalidStrand(String),

    #[error("malformed region key '{0}'")]
    MalformedRegionKey(String),

    #[error("BED line {line}: {reason}")]
    MalformedBed { line: usize, reason: String },

    #[error("chromosome '{0}' not found in reference index")]
    UnknownChrom(String),

    #[error("current line {line}: {reason}")]
    MalformedCurrent { line: usize, reason: String },

    #[error("signal table row {row}: {reason}")]
    MalformedSignal { row: usize, reason: String },

    #[error("unsupported alignment format '{}', expected bam, cram or sam", .0.display())]
    UnsupportedAlignment(PathBuf),

    #[error("unsupported interpolation kind '{0}'")]
    UnsupportedInterpolation(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("feature vector has {got} values, model needs at least {need}")]
    FeatureLength { got: usize, need: usize },

    #[error("array shape {shape:?} does not match {len} values")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("htslib: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
