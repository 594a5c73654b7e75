//! Per-read alignment and base-quality features over a fixed reference window.
//!
//! Each read becomes a `[window, 6]` matrix (columns A, C, G, T, deletion,
//! insertion) and a `[window]` quality vector.

use crate::io::alignment::AlignedRead;
use crate::io::store::FeatureArray;
use crate::region::{Region, Strand};
use crate::util::dna;

pub const ALIGN_COLS: usize = 6;
const DEL: usize = 4;
const INS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReadFeatures {
    pub alignment: Vec<[i64; ALIGN_COLS]>,
    pub quality: Vec<f32>,
}

/// Phred score of the event "at least one of these bases is wrong".
pub fn combined_phred<I: IntoIterator<Item = f64>>(quals: I) -> f32 {
    let all_right: f64 = quals.into_iter().map(|q| 1.0 - 10f64.powf(-q / 10.0)).product();
    (-10.0 * (1.0 - all_right).log10()) as f32
}

/// Base-4 code of an inserted run with a leading 1 digit, saturating at `i64::MAX`.
///
/// `AC` → `0b1_00_01` = 17. Non-ACGT bases are dropped.
pub fn insertion_code(bases: &[u8]) -> i64 {
    let mut acc: i128 = 1;
    for &b in bases {
        if let Some(d) = dna::base_index(b) {
            acc = acc * 4 + d as i128;
            if acc > i64::MAX as i128 {
                return i64::MAX;
            }
        }
    }
    acc as i64
}

struct Pending {
    seq: Vec<u8>,
    qual: Vec<f64>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    fn clear(&mut self) {
        self.seq.clear();
        self.qual.clear();
    }
}

/// Write a `+` strand insertion onto the column before `col`, folding its
/// qualities into the quality already stored there.
fn close_on_previous(alignment: &mut [[i64; ALIGN_COLS]], quality: &mut [f32], col: usize, pending: &Pending) {
    if let Some(prev) = col.checked_sub(1) {
        alignment[prev][INS] = insertion_code(&pending.seq);
        let existing = quality[prev] as f64;
        quality[prev] = combined_phred(std::iter::once(existing).chain(pending.qual.iter().copied()));
    }
}

/// Encode one read over `region`, which must already be resized to `window`.
///
/// Returns `None` for reads on the other strand, reads that do not reach the
/// window start, and reads that leave the matrix empty.
pub fn encode_read(read: &AlignedRead, region: &Region, window: usize) -> Option<ReadFeatures> {
    let strand = if read.reverse { Strand::Reverse } else { Strand::Forward };
    if strand != region.strand {
        return None;
    }

    let mut alignment = vec![[0i64; ALIGN_COLS]; window];
    let mut quality = vec![0f32; window];
    let mut in_range = false;
    let mut pending = Pending { seq: Vec::new(), qual: Vec::new() };

    for &(q, r) in &read.pairs {
        if let Some(r) = r {
            if r == region.start {
                in_range = true;
            } else if r >= region.end {
                break;
            }
        }
        if !in_range {
            continue;
        }
        let col = match r {
            Some(r) if r >= region.start && ((r - region.start) as usize) < window => Some((r - region.start) as usize),
            Some(_) => break,
            None => None,
        };

        match (q, col) {
            (Some(q), Some(col)) => {
                let base = read.seq.get(q).copied().unwrap_or(b'N');
                let bq = read.qual.get(q).copied().unwrap_or(0) as f64;
                if pending.is_empty() {
                    if let Some(b) = dna::base_index(base) {
                        alignment[col][b] = 1;
                    }
                    quality[col] = bq as f32;
                    continue;
                }
                match region.strand {
                    // the insertion is charged to the previous reference base; `col` stays empty
                    Strand::Forward => close_on_previous(&mut alignment, &mut quality, col, &pending),
                    Strand::Reverse => {
                        alignment[col][INS] = insertion_code(&pending.seq);
                        if let Some(b) = dna::base_index(base) {
                            alignment[col][b] = 1;
                        }
                        quality[col] = combined_phred(pending.qual.iter().copied().chain(std::iter::once(bq)));
                    }
                }
                pending.clear();
            }
            (Some(q), None) => {
                pending.seq.push(read.seq.get(q).copied().unwrap_or(b'N'));
                pending.qual.push(read.qual.get(q).copied().unwrap_or(0) as f64);
            }
            (None, Some(col)) => {
                if pending.is_empty() {
                    alignment[col][DEL] = 1;
                    continue;
                }
                match region.strand {
                    Strand::Forward => close_on_previous(&mut alignment, &mut quality, col, &pending),
                    Strand::Reverse => {
                        alignment[col][INS] = insertion_code(&pending.seq);
                        alignment[col][DEL] = 1;
                    }
                }
                pending.clear();
            }
            (None, None) => {}
        }
    }

    if alignment.iter().any(|row| row.iter().any(|&v| v != 0)) {
        Some(ReadFeatures { alignment, quality })
    } else {
        None
    }
}

/// Stack the encodings of all usable reads: `[reads, window, 6]` and `[reads, window]`.
pub fn region_alignment(reads: &[AlignedRead], region: &Region, window: usize) -> (FeatureArray<i64>, FeatureArray<f32>) {
    let mut ali = Vec::new();
    let mut qual = Vec::new();
    let mut n = 0usize;
    for read in reads {
        if let Some(f) = encode_read(read, region, window) {
            n += 1;
            ali.extend(f.alignment.iter().flatten());
            qual.extend(f.quality);
        }
    }
    (
        FeatureArray { shape: vec![n, window, ALIGN_COLS], data: ali },
        FeatureArray { shape: vec![n, window], data: qual },
    )
}
