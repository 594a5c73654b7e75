//! Per-read resquiggle tables exported by the signal aligner.
//!
//! Tab separated with a header row; one row per reference base a read was
//! re-aligned to:
//!
//! ```text
//! read_id  chrom  strand  position  base  norm_mean  norm_stdev  samples
//! ```
//!
//! `samples` holds the comma separated normalized current samples assigned to
//! that base.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::region::Strand;

#[derive(Debug, Deserialize)]
struct Row {
    read_id: String,
    chrom: String,
    strand: String,
    position: u64,
    base: String,
    norm_mean: f32,
    norm_stdev: f32,
    #[serde(default)]
    samples: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseSignal {
    pub base: u8,
    pub norm_mean: f32,
    pub norm_stdev: f32,
    pub samples: Vec<f32>,
}

/// All bases of one read on one chromosome strand, keyed by reference position.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadSignal {
    pub read_id: String,
    pub chrom: String,
    pub strand: Strand,
    pub bases: BTreeMap<u64, BaseSignal>,
}

/// Parse a resquiggle table. Reads keep the order of their first row.
pub fn read_signal_table<R: Read>(reader: R) -> Result<Vec<ReadSignal>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let mut reads: Vec<ReadSignal> = Vec::new();
    let mut seen: HashMap<(String, String, Strand), usize> = HashMap::new();
    for (i, row) in rdr.deserialize::<Row>().enumerate() {
        let row_no = i + 1;
        let bad = |reason: String| Error::MalformedSignal { row: row_no, reason };
        let row = row.map_err(|e| bad(e.to_string()))?;
        let strand: Strand = row.strand.parse().map_err(|e: Error| bad(e.to_string()))?;
        let base = match row.base.as_bytes() {
            [b] => b.to_ascii_uppercase(),
            _ => return Err(bad(format!("base must be one character, found '{}'", row.base))),
        };
        let samples = row
            .samples
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<f32>().map_err(|_| bad(format!("invalid sample '{}'", s))))
            .collect::<Result<Vec<f32>>>()?;

        let signal = BaseSignal { base, norm_mean: row.norm_mean, norm_stdev: row.norm_stdev, samples };
        match seen.entry((row.read_id, row.chrom, strand)) {
            Entry::Occupied(slot) => {
                reads[*slot.get()].bases.insert(row.position, signal);
            }
            Entry::Vacant(slot) => {
                let (read_id, chrom, strand) = slot.key().clone();
                let mut bases = BTreeMap::new();
                bases.insert(row.position, signal);
                slot.insert(reads.len());
                reads.push(ReadSignal { read_id, chrom, strand, bases });
            }
        }
    }
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "read_id\tchrom\tstrand\tposition\tbase\tnorm_mean\tnorm_stdev\tsamples\n\
r1\tchr1\t+\t10\tA\t0.5\t0.1\t1,2,3\n\
r1\tchr1\t+\t11\tc\t-0.5\t0.2\t4\n\
r2\tchr1\t-\t11\tG\t0.0\t0.3\t\n";

    #[test]
    fn groups_rows_by_read() {
        let reads = read_signal_table(TABLE.as_bytes()).unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].read_id, "r1");
        assert_eq!(reads[0].bases.len(), 2);
        assert_eq!(reads[0].bases[&11].base, b'C');
        assert_eq!(reads[0].bases[&10].samples, vec![1.0, 2.0, 3.0]);
        assert_eq!(reads[1].strand, Strand::Reverse);
        assert!(reads[1].bases[&11].samples.is_empty());
    }

    #[test]
    fn interleaved_rows_join_their_read() {
        let table = "read_id\tchrom\tstrand\tposition\tbase\tnorm_mean\tnorm_stdev\tsamples\n\
r1\tchr1\t+\t10\tA\t0.1\t0.1\t1\n\
r2\tchr2\t+\t50\tC\t0.2\t0.1\t2\n\
r1\tchr1\t-\t10\tT\t0.3\t0.1\t3\n\
r1\tchr1\t+\t11\tG\t0.4\t0.1\t4\n\
r2\tchr2\t+\t51\tT\t0.5\t0.1\t5\n";
        let reads = read_signal_table(table.as_bytes()).unwrap();
        let summary: Vec<(&str, &str, Strand, Vec<u64>)> = reads
            .iter()
            .map(|r| (r.read_id.as_str(), r.chrom.as_str(), r.strand, r.bases.keys().copied().collect()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("r1", "chr1", Strand::Forward, vec![10, 11]),
                ("r2", "chr2", Strand::Forward, vec![50, 51]),
                ("r1", "chr1", Strand::Reverse, vec![10]),
            ]
        );
        assert_eq!(reads[0].bases[&11].norm_mean, 0.4);
    }

    #[test]
    fn reports_bad_rows() {
        let bad = "read_id\tchrom\tstrand\tposition\tbase\tnorm_mean\tnorm_stdev\tsamples\n\
r1\tchr1\t*\t10\tA\t0.5\t0.1\t1\n";
        let err = read_signal_table(bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"), "{}", err);

        let bad_sample = "read_id\tchrom\tstrand\tposition\tbase\tnorm_mean\tnorm_stdev\tsamples\n\
r1\tchr1\t+\t10\tA\t0.5\t0.1\t1,x\n";
        assert!(read_signal_table(bad_sample.as_bytes()).is_err());
    }
}
