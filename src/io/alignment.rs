use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use rust_htslib::bam::{self, ext::BamRecordExtensions, IndexedReader, Read as _};

use crate::error::Error;
use crate::region::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    Bam,
    Cram,
    Sam,
}

impl AlignmentFormat {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let name = path.to_string_lossy().to_ascii_lowercase();
        if name.ends_with("cram") {
            Ok(AlignmentFormat::Cram)
        } else if name.ends_with("bam") {
            Ok(AlignmentFormat::Bam)
        } else if name.ends_with("sam") {
            Ok(AlignmentFormat::Sam)
        } else {
            Err(Error::UnsupportedAlignment(path.to_path_buf()))
        }
    }
}

/// One alignment record reduced to what feature encoding needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    pub name: String,
    pub reverse: bool,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    /// `(query position, reference position)` pairs in alignment order,
    /// including insertions/soft clips (`None` reference) and
    /// deletions/skips (`None` query).
    pub pairs: Vec<(Option<usize>, Option<u64>)>,
}

impl From<&bam::Record> for AlignedRead {
    fn from(rec: &bam::Record) -> Self {
        let pairs = rec
            .aligned_pairs_full()
            .map(|[q, r]| (q.map(|q| q as usize), r.map(|r| r as u64)))
            .collect();
        Self {
            name: String::from_utf8_lossy(rec.qname()).into_owned(),
            reverse: rec.is_reverse(),
            seq: rec.seq().as_bytes(),
            qual: rec.qual().to_vec(),
            pairs,
        }
    }
}

/// Make sure `path` can be randomly accessed and return the file to read.
///
/// BAM/CRAM files lacking an index get one built in place. SAM input is
/// sorted into `<stem>.bam` next to it, then indexed.
pub fn ensure_indexed(path: &Path, threads: usize) -> Result<PathBuf> {
    let format = AlignmentFormat::from_path(path)?;
    let n_threads = threads.max(1) as u32;
    match format {
        AlignmentFormat::Bam | AlignmentFormat::Cram => {
            if IndexedReader::from_path(path).is_err() {
                warn!("{} lacks .bai/.csi/.crai index", path.display());
                info!("building index for {}", path.display());
                bam::index::build(path, None, bam::index::Type::Bai, n_threads)
                    .with_context(|| format!("cannot index '{}' (is it coordinate sorted?)", path.display()))?;
            }
            Ok(path.to_path_buf())
        }
        AlignmentFormat::Sam => {
            let bam_path = path.with_extension("bam");
            if bam_path.is_file() && IndexedReader::from_path(&bam_path).is_ok() {
                info!("reusing indexed {}", bam_path.display());
                return Ok(bam_path);
            }
            warn!("{} is SAM and cannot be indexed", path.display());
            info!("sorting {} into {}", path.display(), bam_path.display());
            sort_to_bam(path, &bam_path, n_threads)?;
            bam::index::build(&bam_path, None, bam::index::Type::Bai, n_threads)
                .with_context(|| format!("cannot index '{}'", bam_path.display()))?;
            Ok(bam_path)
        }
    }
}

fn sort_to_bam(input: &Path, output: &Path, n_threads: u32) -> Result<()> {
    let mut reader =
        bam::Reader::from_path(input).with_context(|| format!("cannot open alignment '{}'", input.display()))?;
    let header = bam::Header::from_template(reader.header());
    let mut records = Vec::new();
    for rec in reader.records() {
        records.push(rec.with_context(|| format!("cannot parse record in '{}'", input.display()))?);
    }
    // unmapped records (tid -1) sort last
    records.sort_by_key(|r| (r.tid() as u32, r.pos()));

    let mut writer = bam::Writer::from_path(output, &header, bam::Format::Bam)
        .with_context(|| format!("cannot create '{}'", output.display()))?;
    writer.set_threads(n_threads as usize)?;
    for rec in &records {
        writer.write(rec)?;
    }
    Ok(())
}

/// Random-access reader over an indexed BAM/CRAM.
pub struct AlignmentReader {
    inner: IndexedReader,
    record: bam::Record,
}

impl AlignmentReader {
    pub fn open(path: &Path, reference: Option<&Path>) -> Result<Self> {
        let mut inner =
            IndexedReader::from_path(path).with_context(|| format!("cannot open indexed alignment '{}'", path.display()))?;
        if AlignmentFormat::from_path(path)? == AlignmentFormat::Cram {
            if let Some(fa) = reference {
                inner.set_reference(fa)?;
            }
        }
        Ok(Self { inner, record: bam::Record::new() })
    }

    /// Reads overlapping `region`, in coordinate order.
    pub fn fetch(&mut self, region: &Region) -> Result<Vec<AlignedRead>> {
        self.inner
            .fetch((region.chrom.as_str(), region.start as i64, region.end as i64))
            .with_context(|| format!("cannot fetch {}:{}-{}", region.chrom, region.start, region.end))?;
        let mut out = Vec::new();
        while let Some(res) = self.inner.read(&mut self.record) {
            res?;
            out.push(AlignedRead::from(&self.record));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(AlignmentFormat::from_path(Path::new("a.bam")).unwrap(), AlignmentFormat::Bam);
        assert_eq!(AlignmentFormat::from_path(Path::new("a.CRAM")).unwrap(), AlignmentFormat::Cram);
        assert_eq!(AlignmentFormat::from_path(Path::new("x/a.sam")).unwrap(), AlignmentFormat::Sam);
        assert!(AlignmentFormat::from_path(Path::new("a.fastq")).is_err());
    }
}
