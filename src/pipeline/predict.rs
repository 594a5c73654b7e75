//! `predict`: ensemble per-region features and score them with the model.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;

use crate::config::PredictOpt;
use crate::features::ensemble::ensemble_region;
use crate::io::store::FeatureStore;
use crate::model::CatBoostModel;
use crate::pipeline::extract::read_regions;
use crate::pipeline::with_pool;
use crate::region::Region;
use crate::util::progress;

const THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub region: Region,
    pub probability: f64,
}

impl Prediction {
    pub fn label(&self) -> u8 {
        u8::from(self.probability > THRESHOLD)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.region.chrom,
            self.region.start,
            self.region.end,
            self.label(),
            self.probability,
            self.region.strand
        )
    }
}

/// Score every region that has a complete feature set, in input order.
pub fn predict_regions(store: &FeatureStore, model: &CatBoostModel, regions: &[Region], quiet: bool) -> Result<Vec<Prediction>> {
    let pb = progress::bar(regions.len() as u64, "Predicting", quiet);
    let scored = regions
        .par_iter()
        .map(|region| -> Result<Option<Prediction>> {
            pb.inc(1);
            let key = region.key();
            let Some(features) = ensemble_region(store, &key)? else {
                return Ok(None);
            };
            match model.predict_proba(&features) {
                Ok(probability) => Ok(Some(Prediction { region: region.clone(), probability })),
                Err(e) => {
                    warn!("{}: {}; skipped", key, e);
                    Ok(None)
                }
            }
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();
    Ok(scored.into_iter().flatten().collect())
}

/// Run `predict`; returns how many regions were scored.
pub fn run(opt: &PredictOpt) -> Result<usize> {
    opt.validate()?;
    let threads = opt.effective_threads();
    let out_path = opt.output_file();
    info!(
        "predict: bed={} datasets={} model={} output={} threads={}",
        opt.bed.display(),
        opt.datasets.display(),
        opt.model.display(),
        out_path.display(),
        threads
    );

    let model = CatBoostModel::load(&opt.model)?;
    info!("model: {} trees over {} features", model.n_trees(), model.n_features());

    let store = FeatureStore::new(&opt.datasets);
    match store.load_meta() {
        Ok(Some(meta)) => info!(
            "dataset built {} with windows seq={} ali={} cur={}",
            meta.build_timestamp.as_deref().unwrap_or("at unknown time"),
            meta.seq_window,
            meta.ali_window,
            meta.cur_window
        ),
        Ok(None) => {}
        Err(e) => warn!("ignoring unreadable dataset manifest: {:#}", e),
    }

    let regions = read_regions(&opt.bed)?;
    info!("{} regions in {}", regions.len(), opt.bed.display());

    let workers = threads.min(regions.len()).max(1);
    let predictions = with_pool(workers, || predict_regions(&store, &model, &regions, opt.quiet))?;
    if predictions.len() < regions.len() {
        warn!("{} regions lack complete features and were not scored", regions.len() - predictions.len());
    }

    let f = File::create(&out_path).with_context(|| format!("cannot create output '{}'", out_path.display()))?;
    let mut w = BufWriter::new(f);
    for p in &predictions {
        writeln!(w, "{}", p)?;
    }
    w.flush()?;
    let modified = predictions.iter().filter(|p| p.label() == 1).count();
    info!("{} regions scored, {} called modified; wrote {}", predictions.len(), modified, out_path.display());
    Ok(predictions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Strand;

    #[test]
    fn label_uses_strict_threshold() {
        let region = Region::new("chr1", 9, 10, Strand::Reverse).unwrap();
        let p = Prediction { region: region.clone(), probability: 0.5 };
        assert_eq!(p.label(), 0);
        let p = Prediction { region, probability: 0.75 };
        assert_eq!(p.label(), 1);
        assert_eq!(p.to_string(), "chr1\t9\t10\t1\t0.75\t-");
    }
}
