use anyhow::Result;
use log::debug;

use crate::features::alignment::ALIGN_COLS;
use crate::io::current::KMER;
use crate::io::store::{FeatureArray, FeatureKind, FeatureStore};

const INPUTS: [FeatureKind; 6] = [
    FeatureKind::RefSeq,
    FeatureKind::ReadsAlignment,
    FeatureKind::ReadsQuality,
    FeatureKind::ReadsNormMean,
    FeatureKind::ReadsNormStdev,
    FeatureKind::ReadsCurrent,
];

/// Concatenate the per-read averages of one site into a single model input.
///
/// Layout: reference one-hot (flattened), mean alignment matrix (flattened),
/// mean quality, mean norm_mean, mean norm_stdev, mean current. Returns
/// `None` when the arrays disagree on read counts or widths.
pub fn assemble(
    sequence: &FeatureArray<f32>,
    alignment: &FeatureArray<i64>,
    quality: &FeatureArray<f32>,
    norm_mean: &FeatureArray<f32>,
    norm_stdev: &FeatureArray<f32>,
    current: &FeatureArray<f32>,
) -> Option<Vec<f32>> {
    let aligned_reads = alignment.rows();
    if aligned_reads == 0
        || aligned_reads != quality.rows()
        || alignment.dim(1) != quality.dim(1)
        || alignment.dim(2) != ALIGN_COLS
    {
        return None;
    }
    let signal_reads = norm_mean.rows();
    if signal_reads == 0
        || signal_reads != norm_stdev.rows()
        || signal_reads != current.rows()
        || norm_mean.dim(1) != KMER
        || norm_stdev.dim(1) != KMER
    {
        return None;
    }

    let mut out = Vec::with_capacity(
        sequence.data.len() + alignment.data.len() / aligned_reads + quality.dim(1) + 2 * KMER + current.dim(1),
    );
    out.extend_from_slice(&sequence.data);
    out.extend(alignment.mean_rows());
    out.extend(quality.mean_rows());
    out.extend(norm_mean.mean_rows());
    out.extend(norm_stdev.mean_rows());
    out.extend(current.mean_rows());
    Some(out)
}

/// Build, save and return the ensemble vector of `key`, or `None` if any input is missing or inconsistent.
pub fn ensemble_region(store: &FeatureStore, key: &str) -> Result<Option<Vec<f32>>> {
    if let Some(missing) = INPUTS.iter().find(|&&k| !store.exists(key, k)) {
        debug!("{}: no {} features", key, missing.suffix());
        return Ok(None);
    }
    let sequence = store.load::<f32>(key, FeatureKind::RefSeq)?;
    let alignment = store.load::<i64>(key, FeatureKind::ReadsAlignment)?;
    let quality = store.load::<f32>(key, FeatureKind::ReadsQuality)?;
    let norm_mean = store.load::<f32>(key, FeatureKind::ReadsNormMean)?;
    let norm_stdev = store.load::<f32>(key, FeatureKind::ReadsNormStdev)?;
    let current = store.load::<f32>(key, FeatureKind::ReadsCurrent)?;

    match assemble(&sequence, &alignment, &quality, &norm_mean, &norm_stdev, &current) {
        Some(features) => {
            let n = features.len();
            let array = FeatureArray { shape: vec![1, n], data: features };
            store.save(key, FeatureKind::Ensemble, &array)?;
            Ok(Some(array.data))
        }
        None => {
            debug!("{}: inconsistent feature shapes", key);
            Ok(None)
        }
    }
}
