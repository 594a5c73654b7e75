//! On-disk layout of a feature dataset directory.
//!
//! Every per-region artifact lives at `<dir>/<region-key>.<kind>.bin` and is a
//! bincode-encoded [`FeatureArray`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const META_FILE: &str = "catmod.meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    RefSeq,
    ReadsAlignment,
    ReadsQuality,
    ReadsNormMean,
    ReadsNormStdev,
    ReadsCurrent,
    Ensemble,
}

impl FeatureKind {
    pub fn suffix(self) -> &'static str {
        match self {
            FeatureKind::RefSeq => "ref_seq",
            FeatureKind::ReadsAlignment => "reads_alignment",
            FeatureKind::ReadsQuality => "reads_quality",
            FeatureKind::ReadsNormMean => "reads_norm_mean",
            FeatureKind::ReadsNormStdev => "reads_norm_stdev",
            FeatureKind::ReadsCurrent => "reads_current",
            FeatureKind::Ensemble => "ensemble_features",
        }
    }
}

/// Dense row-major array with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureArray<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> FeatureArray<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self, Error> {
        let expect: usize = shape.iter().product();
        if expect != data.len() {
            return Err(Error::ShapeMismatch { shape, len: data.len() });
        }
        Ok(Self { shape, data })
    }

    /// Stack equally sized rows into a `[rows.len(), row_len]` array.
    ///
    /// Rows whose length differs from the first row are rejected.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, Error> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len();
        let mut data = Vec::with_capacity(n * width);
        for row in rows {
            if row.len() != width {
                return Err(Error::ShapeMismatch { shape: vec![n, width], len: row.len() });
            }
            data.extend(row);
        }
        Self::new(vec![n, width], data)
    }

    pub fn dim(&self, axis: usize) -> usize {
        self.shape.get(axis).copied().unwrap_or(0)
    }

    /// Number of rows along axis 0.
    pub fn rows(&self) -> usize {
        self.dim(0)
    }
}

/// Numeric element that can be averaged.
pub trait Element: Copy {
    fn to_f64(self) -> f64;
}

impl Element for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Element for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl<T: Element> FeatureArray<T> {
    /// Column means over axis 0 with all trailing axes flattened.
    pub fn mean_rows(&self) -> Vec<f32> {
        let n = self.rows();
        if n == 0 || self.data.is_empty() {
            return Vec::new();
        }
        let width = self.data.len() / n;
        let mut acc = vec![0f64; width];
        for row in self.data.chunks_exact(width) {
            for (a, &v) in acc.iter_mut().zip(row) {
                *a += v.to_f64();
            }
        }
        acc.into_iter().map(|s| (s / n as f64) as f32).collect()
    }
}

/// Metadata describing how a dataset directory was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub seq_window: u64,
    pub ali_window: u64,
    pub cur_window: usize,
    pub reference_file: Option<String>,
    pub alignment_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// Handle on a dataset directory.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    root: PathBuf,
}

impl FeatureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &str, kind: FeatureKind) -> PathBuf {
        self.root.join(format!("{}.{}.bin", key, kind.suffix()))
    }

    pub fn done_marker(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.ali.done", key))
    }

    pub fn exists(&self, key: &str, kind: FeatureKind) -> bool {
        self.path(key, kind).is_file()
    }

    pub fn save<T: Serialize>(&self, key: &str, kind: FeatureKind, array: &FeatureArray<T>) -> Result<()> {
        save_bin(&self.path(key, kind), array)
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str, kind: FeatureKind) -> Result<FeatureArray<T>> {
        load_bin(&self.path(key, kind))
    }

    pub fn save_meta(&self, meta: &DatasetMeta) -> Result<()> {
        save_bin(&self.root.join(META_FILE), meta)
    }

    pub fn load_meta(&self) -> Result<Option<DatasetMeta>> {
        let p = self.root.join(META_FILE);
        if !p.is_file() {
            return Ok(None);
        }
        load_bin(&p).map(Some)
    }
}

fn save_bin<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let f = File::create(path).with_context(|| format!("cannot create '{}'", path.display()))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, value).with_context(|| format!("cannot write '{}'", path.display()))?;
    w.flush()?;
    Ok(())
}

fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("cannot open '{}'", path.display()))?;
    let value = bincode::deserialize_from(BufReader::new(f))
        .with_context(|| format!("cannot decode '{}'", path.display()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_checked() {
        assert!(FeatureArray::new(vec![2, 3], vec![0f32; 6]).is_ok());
        assert!(FeatureArray::new(vec![2, 3], vec![0f32; 5]).is_err());
        assert!(FeatureArray::from_rows(vec![vec![1f32, 2.0], vec![3.0]]).is_err());
        let empty: FeatureArray<f32> = FeatureArray::from_rows(Vec::new()).unwrap();
        assert_eq!(empty.shape, vec![0, 0]);
    }

    #[test]
    fn mean_rows_flattens_trailing_axes() {
        let a = FeatureArray::new(vec![2, 2, 2], vec![1i64, 2, 3, 4, 3, 4, 5, 6]).unwrap();
        assert_eq!(a.mean_rows(), vec![2.0, 3.0, 4.0, 5.0]);
        let none: FeatureArray<f32> = FeatureArray::new(vec![0, 4], Vec::new()).unwrap();
        assert!(none.mean_rows().is_empty());
    }

    #[test]
    fn save_and_load_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::new(dir.path());
        let arr = FeatureArray::from_rows(vec![vec![0.5f32, 1.5], vec![2.5, 3.5]]).unwrap();
        store.save("chr1_+_10-11", FeatureKind::ReadsQuality, &arr).unwrap();
        assert!(store.exists("chr1_+_10-11", FeatureKind::ReadsQuality));
        assert!(store
            .path("chr1_+_10-11", FeatureKind::ReadsQuality)
            .ends_with("chr1_+_10-11.reads_quality.bin"));
        let back: FeatureArray<f32> = store.load("chr1_+_10-11", FeatureKind::ReadsQuality).unwrap();
        assert_eq!(back, arr);

        assert!(store.load_meta().unwrap().is_none());
        let meta = DatasetMeta {
            seq_window: 101,
            ali_window: 41,
            cur_window: 256,
            reference_file: Some("ref.fa".into()),
            alignment_file: None,
            build_args: None,
            build_timestamp: None,
        };
        store.save_meta(&meta).unwrap();
        assert_eq!(store.load_meta().unwrap().unwrap().ali_window, 41);
    }
}
