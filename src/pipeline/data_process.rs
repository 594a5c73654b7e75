//! `data_process`: turn per-read resquiggle tables into per-read current files.
//!
//! Every reference position `p` whose 5-mer `[p-2, p+3)` is fully covered by a
//! read yields one current line, ready for `extract_features`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::DataProcessOpt;
use crate::error::Error;
use crate::io::current::{CurrentRecord, CURRENT_EXT, FLANK, KMER};
use crate::io::faidx::IndexedFasta;
use crate::io::signal::{read_signal_table, ReadSignal};
use crate::pipeline::{ensure_dir, with_pool};
use crate::region::Strand;
use crate::util::dna;
use crate::util::interp::{resample, InterpKind};
use crate::util::progress;

pub const CURRENT_LIST: &str = "current.list";
const CURRENT_DIR: &str = "currents";
const TABLE_EXT: &str = ".tsv";

/// Build the 5-mer current lines of one read.
///
/// `reference` holds the forward-strand bases starting at `ref_start`. A
/// window is kept only when all five positions are present and their bases
/// agree with the reference (complemented on `-`).
pub fn kmer_records(
    read: &ReadSignal,
    reference: &[u8],
    ref_start: u64,
    cur_window: usize,
    kind: InterpKind,
) -> Vec<CurrentRecord> {
    let agrees = |pos: u64, base: u8| -> bool {
        let Some(idx) = pos.checked_sub(ref_start) else { return false };
        let Some(&fwd) = reference.get(idx as usize) else { return false };
        let expected = match read.strand {
            Strand::Forward => fwd,
            Strand::Reverse => dna::complement(fwd),
        };
        matches!((dna::base_index(expected), dna::base_index(base)), (Some(a), Some(b)) if a == b)
    };

    let mut out = Vec::new();
    for &centre in read.bases.keys() {
        let Some(first) = centre.checked_sub(FLANK) else { continue };
        let mut window = Vec::with_capacity(KMER);
        for pos in first..first + KMER as u64 {
            match read.bases.get(&pos) {
                Some(b) if agrees(pos, b.base) => window.push(b),
                _ => break,
            }
        }
        if window.len() != KMER {
            continue;
        }
        if read.strand == Strand::Reverse {
            window.reverse();
        }
        let samples: Vec<f32> = window.iter().flat_map(|b| b.samples.iter().copied()).collect();
        if samples.is_empty() {
            continue;
        }
        out.push(CurrentRecord {
            chrom: read.chrom.clone(),
            start: first,
            end: first + KMER as u64,
            read_id: read.read_id.clone(),
            score: "0".to_string(),
            strand: read.strand,
            norm_mean: window.iter().map(|b| b.norm_mean).collect(),
            norm_stdev: window.iter().map(|b| b.norm_stdev).collect(),
            current: resample(&samples, cur_window, kind),
        });
    }
    out
}

/// Resquiggle tables (`*.tsv`, excluding our own `*.current.tsv`) in `dir`, sorted.
pub fn list_tables(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut tables = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot read directory '{}'", dir.display()))? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if path.is_file() && name.ends_with(TABLE_EXT) && !name.ends_with(CURRENT_EXT) {
            tables.push(path);
        }
    }
    tables.sort();
    Ok(tables)
}

fn current_file_name(read_id: &str) -> String {
    let safe: String = read_id
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}{}", safe, CURRENT_EXT)
}

/// Process one table; returns the current files it covers.
fn process_table(fasta: &mut IndexedFasta, table: &Path, out_dir: &Path, opt: &DataProcessOpt) -> Result<Vec<PathBuf>> {
    let fh = File::open(table).with_context(|| format!("cannot open resquiggle table '{}'", table.display()))?;
    let reads = read_signal_table(BufReader::new(fh)).with_context(|| format!("cannot parse '{}'", table.display()))?;

    // a read may span several chromosomes or strands; keep them in one file
    let mut by_read: BTreeMap<&str, Vec<&ReadSignal>> = BTreeMap::new();
    for read in &reads {
        by_read.entry(read.read_id.as_str()).or_default().push(read);
    }

    let mut written = Vec::with_capacity(by_read.len());
    for (read_id, parts) in by_read {
        let path = out_dir.join(current_file_name(read_id));
        if path.is_file() && !opt.overwrite {
            debug!("{} exists, skipped", path.display());
            written.push(path);
            continue;
        }
        let mut records = Vec::new();
        for read in parts {
            let (Some(&lo), Some(&hi)) = (read.bases.keys().next(), read.bases.keys().next_back()) else {
                continue;
            };
            let reference = match fasta.fetch(&read.chrom, lo, hi + 1) {
                Ok(seq) => seq,
                Err(Error::UnknownChrom(chrom)) => {
                    warn!("read {}: chromosome {} not in reference; skipped", read_id, chrom);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            records.extend(kmer_records(read, &reference, lo, opt.cur_window, opt.current_kind));
        }
        if records.is_empty() {
            debug!("read {}: no complete 5-mer windows", read_id);
            continue;
        }
        let f = File::create(&path).with_context(|| format!("cannot create '{}'", path.display()))?;
        let mut w = BufWriter::new(f);
        for rec in &records {
            writeln!(w, "{}", rec)?;
        }
        w.flush()?;
        written.push(path);
    }
    Ok(written)
}

/// Run `data_process`; returns the path of the written current list.
pub fn run(opt: &DataProcessOpt) -> Result<PathBuf> {
    opt.validate()?;
    let threads = opt.effective_threads();
    info!(
        "data_process: ref={} input={} output={} threads={} cur_window={} current_kind={}",
        opt.reference.display(),
        opt.current.display(),
        opt.output.display(),
        threads,
        opt.cur_window,
        opt.current_kind
    );

    let out_dir = opt.output.join(CURRENT_DIR);
    ensure_dir(&out_dir)?;
    // builds the .fai once before workers open their own handles
    drop(IndexedFasta::open(&opt.reference)?);

    let tables = list_tables(&opt.current)?;
    if tables.is_empty() {
        warn!("no resquiggle tables (*{}) in {}", TABLE_EXT, opt.current.display());
    }
    info!("processing {} resquiggle tables", tables.len());

    let pb = progress::bar(tables.len() as u64, "Processing resquiggle tables", opt.quiet);
    let per_table = with_pool(threads, || {
        tables
            .par_iter()
            .map_init(
                || IndexedFasta::open(&opt.reference),
                |fasta, table| {
                    let fasta = fasta.as_mut().map_err(|e| anyhow!("{:#}", e))?;
                    let res = process_table(fasta, table, &out_dir, opt);
                    pb.inc(1);
                    res
                },
            )
            .collect::<Result<Vec<_>>>()
    })?;
    pb.finish_and_clear();

    let mut files: Vec<PathBuf> = per_table.into_iter().flatten().collect();
    files.sort();
    files.dedup();

    let list = opt.output.join(CURRENT_LIST);
    let f = File::create(&list).with_context(|| format!("cannot create '{}'", list.display()))?;
    let mut w = BufWriter::new(f);
    for p in &files {
        writeln!(w, "{}", p.display())?;
    }
    w.flush()?;
    info!("wrote {} current files, listed in {}", files.len(), list.display());
    Ok(list)
}
