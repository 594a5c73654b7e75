use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Strand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(Error::InvalidStrand(other.to_string())),
        }
    }
}

/// 0-based half-open genomic interval on one strand.
///
/// `offset` remembers which side received the extra base the last time an
/// odd-sized flank was added, so that repeated resizing stays centred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub info: String,
    pub offset: u64,
}

impl Region {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, strand: Strand) -> Result<Self> {
        let chrom = chrom.into();
        if start > end {
            return Err(Error::InvalidRegion {
                chrom,
                start,
                end,
                reason: format!("start position {} is larger than end position {}", start, end),
            });
        }
        Ok(Self { chrom, start, end, strand, info: String::new(), offset: 0 })
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Key used as the file stem of every per-region artifact.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Return a copy resized to `window` bases.
    pub fn resized(&self, window: u64, limit: Option<u64>) -> Self {
        let mut r = self.clone();
        r.resize(window, limit);
        r
    }

    /// Grow or shrink in place to exactly `window` bases around the centre.
    ///
    /// Windows touching the chromosome start are pinned to `[0, window)`, and
    /// windows running past `limit` (the chromosome length) are pinned to
    /// `[limit - window, limit)`.
    pub fn resize(&mut self, window: u64, limit: Option<u64>) {
        let len = self.len();
        if window > len {
            let flank = (window - len) / 2;
            let start = self.start as i64;
            let end = self.end as i64;
            let offset = self.offset as i64;
            if start - flank as i64 - offset <= 0 {
                self.start = 0;
                self.end = window;
            } else if let Some(limit) = limit.filter(|&l| l > 0 && end + flank as i64 + 1 - offset >= l as i64) {
                self.start = limit.saturating_sub(window);
                self.end = limit;
            } else if (window - len) % 2 == 0 {
                self.start -= flank;
                self.end += flank;
            } else if self.offset != 0 {
                self.start -= flank + 1;
                self.end += flank;
                self.offset = 0;
            } else {
                self.start -= flank;
                self.end += flank + 1;
                self.offset = 1;
            }
        } else if window < len {
            let mid = (self.start + self.end - self.offset) / 2;
            self.start = mid;
            self.end = mid + 1;
            self.resize(window, limit);
        }
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.chrom == other.chrom
            && self.strand == other.strand
            && self.start == other.start
            && self.end == other.end
    }
}

impl Eq for Region {}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}-{}", self.chrom, self.strand, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Parse `chrom_strand_start-end`; the chromosome may itself contain `_`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::MalformedRegionKey(s.to_string());
        let (rest, span) = s.rsplit_once('_').ok_or_else(bad)?;
        let (chrom, strand) = rest.rsplit_once('_').ok_or_else(bad)?;
        let (start, end) = span.split_once('-').ok_or_else(bad)?;
        let start: u64 = start.parse().map_err(|_| bad())?;
        let end: u64 = end.parse().map_err(|_| bad())?;
        if chrom.is_empty() {
            return Err(bad());
        }
        Region::new(chrom, start, end, strand.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(start: u64) -> Region {
        Region::new("chr1", start, start + 1, Strand::Forward).unwrap()
    }

    #[test]
    fn rejects_inverted_coordinates() {
        assert!(Region::new("chr1", 10, 5, Strand::Forward).is_err());
        assert!("x".parse::<Strand>().is_err());
    }

    #[test]
    fn key_round_trips_with_underscored_chrom() {
        let r = Region::new("chr_Un_1", 100, 101, Strand::Reverse).unwrap();
        assert_eq!(r.key(), "chr_Un_1_-_100-101");
        let back: Region = r.key().parse().unwrap();
        assert_eq!(back, r);
        assert!("chr1_+_5".parse::<Region>().is_err());
        assert!("chr1_*_5-6".parse::<Region>().is_err());
    }

    #[test]
    fn resize_odd_window_alternates_sides() {
        let mut r = site(1000);
        r.resize(101, None);
        assert_eq!((r.start, r.end), (950, 1051));
        assert_eq!(r.len(), 101);
        assert_eq!(r.offset, 0);

        let mut r = site(1000);
        r.resize(4, None);
        // flank = 1, odd remainder goes to the right first
        assert_eq!((r.start, r.end, r.offset), (999, 1002, 1));
        r.resize(6, None);
        // offset set: extra base goes to the left and offset clears
        assert_eq!((r.start, r.end, r.offset), (997, 1003, 0));
    }

    #[test]
    fn resize_pins_to_chromosome_edges() {
        let mut r = site(10);
        r.resize(41, Some(500));
        assert_eq!((r.start, r.end), (0, 41));

        let mut r = site(490);
        r.resize(41, Some(500));
        assert_eq!((r.start, r.end), (459, 500));

        let mut r = site(490);
        r.resize(41, None);
        assert_eq!((r.start, r.end), (470, 511));
    }

    #[test]
    fn resize_shrinks_around_middle() {
        let mut r = Region::new("chr1", 100, 200, Strand::Forward).unwrap();
        r.resize(5, None);
        assert_eq!((r.start, r.end), (148, 153));

        let mut same = site(300);
        same.resize(1, None);
        assert_eq!((same.start, same.end), (300, 301));
    }

    #[test]
    fn equality_ignores_info() {
        let a = site(5).with_info("m6A\t0");
        let b = site(5);
        assert_eq!(a, b);
    }
}
