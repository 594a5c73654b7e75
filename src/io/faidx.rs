//! Random access into a `.fai`-indexed FASTA file through htslib.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use rust_htslib::faidx;

use crate::error::Error;
use crate::region::{Region, Strand};
use crate::util::dna;

pub fn fai_path(fasta: &Path) -> PathBuf {
    let mut s = fasta.as_os_str().to_os_string();
    s.push(".fai");
    PathBuf::from(s)
}

/// Chromosome lengths taken from the `.fai` index.
#[derive(Debug, Clone, Default)]
pub struct ChromSizes {
    names: Vec<String>,
    lens: HashMap<String, u64>,
}

impl ChromSizes {
    pub fn get(&self, chrom: &str) -> Option<u64> {
        self.lens.get(chrom).copied()
    }

    /// Sequence names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl FromIterator<(String, u64)> for ChromSizes {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut sizes = Self::default();
        for (name, len) in iter {
            sizes.lens.insert(name.clone(), len);
            sizes.names.push(name);
        }
        sizes
    }
}

/// Indexed FASTA opened for region fetches.
pub struct IndexedFasta {
    reader: faidx::Reader,
    sizes: ChromSizes,
}

impl IndexedFasta {
    /// Open `path`; htslib writes `<path>.fai` when it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("reference FASTA '{}' does not exist", path.display());
        }
        let fai = fai_path(path);
        if !fai.is_file() {
            warn!("{} lacks .fai index", path.display());
            info!("creating {}", fai.display());
        }
        let reader = faidx::Reader::from_path(path)
            .with_context(|| format!("cannot open reference FASTA '{}'", path.display()))?;
        // htslib hands back an unusable reader when it could neither load nor build the index
        if !fai.is_file() {
            bail!("cannot index reference FASTA '{}'", path.display());
        }
        let names = reader
            .seq_names()
            .with_context(|| format!("cannot read sequence names of '{}'", fai.display()))?;
        let sizes = names
            .into_iter()
            .map(|name| {
                let len = reader.fetch_seq_len(&name);
                (name, len)
            })
            .collect();
        Ok(Self { reader, sizes })
    }

    pub fn sizes(&self) -> &ChromSizes {
        &self.sizes
    }

    pub fn chrom_len(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom)
    }

    /// Upper-cased bases of `chrom[start..end)`; `end` is clipped to the chromosome length.
    pub fn fetch(&mut self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>, Error> {
        let len = self.chrom_len(chrom).ok_or_else(|| Error::UnknownChrom(chrom.to_string()))?;
        let end = end.min(len);
        if start >= end {
            return Ok(Vec::new());
        }
        let seq = self.reader.fetch_seq(chrom, start as usize, (end - 1) as usize)?;
        Ok(seq.iter().map(u8::to_ascii_uppercase).collect())
    }

    /// Region sequence read 5'→3' on its own strand.
    pub fn fetch_region(&mut self, region: &Region) -> Result<Vec<u8>, Error> {
        let seq = self.fetch(&region.chrom, region.start, region.end)?;
        Ok(match region.strand {
            Strand::Forward => seq,
            Strand::Reverse => dna::revcomp(&seq),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FASTA: &[u8] = b">chr1 test\nACGTA\nCGTAC\nGT\n>chr2\nttttt\nggg\n";

    fn write_fasta(dir: &Path) -> PathBuf {
        let p = dir.join("ref.fa");
        std::fs::write(&p, FASTA).unwrap();
        p
    }

    #[test]
    fn builds_index_and_reads_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let fa = write_fasta(dir.path());
        let reader = IndexedFasta::open(&fa).unwrap();
        assert!(fai_path(&fa).is_file());
        assert_eq!(reader.sizes().names(), &["chr1".to_string(), "chr2".to_string()]);
        assert_eq!(reader.chrom_len("chr1"), Some(12));
        assert_eq!(reader.chrom_len("chr2"), Some(8));
        assert_eq!(reader.chrom_len("chrX"), None);

        // second open reuses the saved index
        let again = IndexedFasta::open(&fa).unwrap();
        assert_eq!(again.sizes().get("chr2"), Some(8));
    }

    #[test]
    fn fetches_across_line_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let fa = write_fasta(dir.path());
        let mut reader = IndexedFasta::open(&fa).unwrap();

        assert_eq!(reader.fetch("chr1", 3, 8).unwrap(), b"TACGT");
        assert_eq!(reader.fetch("chr1", 10, 50).unwrap(), b"GT");
        assert_eq!(reader.fetch("chr2", 4, 7).unwrap(), b"TGG");
        assert!(reader.fetch("chr1", 20, 30).unwrap().is_empty());
        assert!(matches!(reader.fetch("chr9", 0, 1), Err(Error::UnknownChrom(_))));

        let rev = Region::new("chr1", 0, 4, Strand::Reverse).unwrap();
        assert_eq!(reader.fetch_region(&rev).unwrap(), b"ACGT");
        let fwd = Region::new("chr2", 0, 2, Strand::Forward).unwrap();
        assert_eq!(reader.fetch_region(&fwd).unwrap(), b"TT");
    }

    #[test]
    fn missing_reference_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IndexedFasta::open(&dir.path().join("absent.fa")).is_err());
    }
}
