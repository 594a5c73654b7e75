//! `extract_features`: per-region reference, alignment and current features.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::ExtractOpt;
use crate::features::alignment::region_alignment;
use crate::features::current::{collect_sites, read_current_file};
use crate::features::sequence::region_sequence;
use crate::io::alignment::{ensure_indexed, AlignmentReader};
use crate::io::bed::BedReader;
use crate::io::current::list_current_files;
use crate::io::faidx::{ChromSizes, IndexedFasta};
use crate::io::store::{DatasetMeta, FeatureKind, FeatureStore};
use crate::pipeline::{command_line, ensure_dir, with_pool};
use crate::region::Region;
use crate::util::progress;

/// Read a BED file, dropping repeated regions but keeping file order.
pub fn read_regions(path: &Path) -> Result<Vec<Region>> {
    let fh = File::open(path).with_context(|| format!("cannot open BED file '{}'", path.display()))?;
    let all = BedReader::new(BufReader::new(fh))
        .read_all()
        .with_context(|| format!("cannot parse BED file '{}'", path.display()))?;
    let total = all.len();
    let mut seen = HashSet::with_capacity(total);
    let regions: Vec<Region> = all.into_iter().filter(|r| seen.insert(r.key())).collect();
    if regions.len() < total {
        warn!("{}: {} duplicated regions ignored", path.display(), total - regions.len());
    }
    Ok(regions)
}

/// Warn when `chrom_len` cannot hold a `window`-wide feature window.
///
/// Such windows come out shorter than `window` and the site is later left out
/// of the ensemble.
fn short_chromosome(region: &Region, window: u64, chrom_len: u64, step: &str) -> bool {
    if chrom_len >= window {
        return false;
    }
    warn!(
        "{}: chromosome {} is {} bp, shorter than the {} bp {} window",
        region.key(),
        region.chrom,
        chrom_len,
        window,
        step
    );
    true
}

fn extract_sequence(opt: &ExtractOpt, store: &FeatureStore, sizes: &ChromSizes, regions: &[Region]) -> Result<usize> {
    let pb = progress::bar(regions.len() as u64, "Extracting sequence features", opt.quiet);
    let written = regions
        .par_iter()
        .map_init(
            || IndexedFasta::open(&opt.reference),
            |fasta, region| -> Result<bool> {
                pb.inc(1);
                let key = region.key();
                if !opt.overwrite && store.exists(&key, FeatureKind::RefSeq) {
                    return Ok(false);
                }
                let Some(limit) = sizes.get(&region.chrom) else {
                    warn!("{}: chromosome {} not in reference; skipped", key, region.chrom);
                    return Ok(false);
                };
                short_chromosome(region, opt.seq_window, limit, "sequence");
                let fasta = fasta.as_mut().map_err(|e| anyhow!("{:#}", e))?;
                let seq = region_sequence(fasta, &region.resized(opt.seq_window, Some(limit)))?;
                store.save(&key, FeatureKind::RefSeq, &seq)?;
                Ok(true)
            },
        )
        .collect::<Result<Vec<bool>>>()?;
    pb.finish_and_clear();
    Ok(written.into_iter().filter(|&w| w).count())
}

fn extract_alignment(
    opt: &ExtractOpt,
    store: &FeatureStore,
    sizes: &ChromSizes,
    regions: &[Region],
    alignment: &Path,
) -> Result<usize> {
    let window = opt.ali_window as usize;
    let pb = progress::bar(regions.len() as u64, "Extracting alignment features", opt.quiet);
    let written = regions
        .par_iter()
        .map_init(
            || AlignmentReader::open(alignment, Some(&opt.reference)),
            |reader, region| -> Result<bool> {
                pb.inc(1);
                let key = region.key();
                let marker = store.done_marker(&key);
                if !opt.overwrite && marker.is_file() {
                    return Ok(false);
                }
                let Some(limit) = sizes.get(&region.chrom) else {
                    warn!("{}: chromosome {} not in reference; skipped", key, region.chrom);
                    return Ok(false);
                };
                short_chromosome(region, opt.ali_window, limit, "alignment");
                let reader = reader.as_mut().map_err(|e| anyhow!("{:#}", e))?;
                let ali_region = region.resized(opt.ali_window, Some(limit));
                let reads = match reader.fetch(&ali_region) {
                    Ok(reads) => reads,
                    Err(e) => {
                        warn!("{}: {:#}; skipped", key, e);
                        return Ok(false);
                    }
                };
                let (ali, qual) = region_alignment(&reads, &ali_region, window);
                debug!("{}: {} of {} reads encoded", key, ali.rows(), reads.len());
                store.save(&key, FeatureKind::ReadsAlignment, &ali)?;
                store.save(&key, FeatureKind::ReadsQuality, &qual)?;
                File::create(&marker).with_context(|| format!("cannot create '{}'", marker.display()))?;
                Ok(true)
            },
        )
        .collect::<Result<Vec<bool>>>()?;
    pb.finish_and_clear();
    Ok(written.into_iter().filter(|&w| w).count())
}

fn extract_current(opt: &ExtractOpt, store: &FeatureStore, regions: &[Region]) -> Result<usize> {
    let files = list_current_files(&opt.current)?;
    info!("reading {} current files", files.len());
    let wanted: HashSet<String> = regions.iter().map(Region::key).collect();

    let pb = progress::bar(files.len() as u64, "Reading current files", opt.quiet);
    let per_file = files
        .par_iter()
        .map(|f| {
            let res = read_current_file(f, &wanted);
            pb.inc(1);
            res
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();

    let sites = collect_sites(per_file);
    let pb = progress::bar(sites.len() as u64, "Saving current features", opt.quiet);
    sites
        .into_par_iter()
        .map(|(key, site)| -> Result<()> {
            let width = site.current.first().map_or(0, Vec::len);
            if width != opt.cur_window {
                warn!("{}: {} current samples per read, expected {}", key, width, opt.cur_window);
            }
            let [mean, stdev, current] = site.into_arrays()?;
            store.save(&key, FeatureKind::ReadsNormMean, &mean)?;
            store.save(&key, FeatureKind::ReadsNormStdev, &stdev)?;
            store.save(&key, FeatureKind::ReadsCurrent, &current)?;
            pb.inc(1);
            Ok(())
        })
        .collect::<Result<Vec<()>>>()
        .map(|done| {
            pb.finish_and_clear();
            done.len()
        })
}

/// Run `extract_features`, writing one dataset directory.
pub fn run(opt: &ExtractOpt) -> Result<()> {
    opt.validate()?;
    let threads = opt.effective_threads();
    info!(
        "extract_features: bed={} ref={} align={} current={} output={} threads={} windows(seq/ali/cur)={}/{}/{}",
        opt.bed.display(),
        opt.reference.display(),
        opt.align.display(),
        opt.current.display(),
        opt.output.display(),
        threads,
        opt.seq_window,
        opt.ali_window,
        opt.cur_window
    );
    ensure_dir(&opt.output)?;
    let store = FeatureStore::new(&opt.output);

    let sizes = IndexedFasta::open(&opt.reference)?.sizes().clone();
    let regions = read_regions(&opt.bed)?;
    info!("{} regions in {}", regions.len(), opt.bed.display());
    if regions.is_empty() {
        warn!("no regions to extract");
    }

    let alignment = ensure_indexed(&opt.align, threads)?;
    let workers = threads.min(regions.len()).max(1);

    with_pool(workers, || {
        let n = extract_sequence(opt, &store, &sizes, &regions)?;
        info!("sequence features: {} written", n);
        let n = extract_alignment(opt, &store, &sizes, &regions, &alignment)?;
        info!("alignment & quality features: {} written", n);
        Ok(())
    })?;
    with_pool(threads, || {
        let n = extract_current(opt, &store, &regions)?;
        info!("current features: {} sites", n);
        Ok(())
    })?;

    store.save_meta(&DatasetMeta {
        seq_window: opt.seq_window,
        ali_window: opt.ali_window,
        cur_window: opt.cur_window,
        reference_file: Some(opt.reference.display().to_string()),
        alignment_file: Some(alignment.display().to_string()),
        build_args: Some(command_line()),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    })?;
    info!("extract_features finished: {}", opt.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_keep_order_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("sites.bed");
        std::fs::write(
            &bed,
            "chr1\t20\t21\ta\t0\t+\nchr1\t5\t6\tb\t0\t-\nchr1\t20\t21\tc\t0\t+\n",
        )
        .unwrap();
        let regions = read_regions(&bed).unwrap();
        let keys: Vec<String> = regions.iter().map(Region::key).collect();
        assert_eq!(keys, vec!["chr1_+_20-21", "chr1_-_5-6"]);
    }

    #[test]
    fn sequence_step_is_resumable() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("ref.fa");
        std::fs::write(&fa, b">chr1\nACGTACGTAC\nGTACGTACGT\n").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let opt = ExtractOpt { reference: fa.clone(), output: out.clone(), seq_window: 5, quiet: true, ..ExtractOpt::default() };
        let store = FeatureStore::new(&out);
        let sizes = IndexedFasta::open(&fa).unwrap().sizes().clone();
        let regions = vec![
            Region::new("chr1", 4, 5, crate::region::Strand::Forward).unwrap(),
            Region::new("chrX", 4, 5, crate::region::Strand::Forward).unwrap(),
        ];

        assert_eq!(extract_sequence(&opt, &store, &sizes, &regions).unwrap(), 1);
        let seq: crate::io::store::FeatureArray<f32> = store.load("chr1_+_4-5", FeatureKind::RefSeq).unwrap();
        assert_eq!(seq.shape, vec![5, 4]);
        // chr1[2..7) = GTACG
        assert_eq!(&seq.data[..4], &[0.0, 0.0, 1.0, 0.0]);

        assert_eq!(extract_sequence(&opt, &store, &sizes, &regions).unwrap(), 0);
        let again = ExtractOpt { overwrite: true, ..opt };
        assert_eq!(extract_sequence(&again, &store, &sizes, &regions).unwrap(), 1);
    }

    #[test]
    fn short_chromosome_yields_short_window() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("ref.fa");
        std::fs::write(&fa, b">chrM\nACGTACGTAC\n").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let opt = ExtractOpt { reference: fa.clone(), output: out.clone(), seq_window: 41, quiet: true, ..ExtractOpt::default() };
        let store = FeatureStore::new(&out);
        let sizes = IndexedFasta::open(&fa).unwrap().sizes().clone();
        let site = Region::new("chrM", 4, 5, crate::region::Strand::Forward).unwrap();

        assert!(short_chromosome(&site, 41, 10, "sequence"));
        assert!(!short_chromosome(&site, 5, 10, "sequence"));

        assert_eq!(extract_sequence(&opt, &store, &sizes, &[site]).unwrap(), 1);
        let seq: crate::io::store::FeatureArray<f32> = store.load("chrM_+_4-5", FeatureKind::RefSeq).unwrap();
        assert_eq!(seq.shape, vec![10, 4]);
    }
}
