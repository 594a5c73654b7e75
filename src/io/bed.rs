use std::io::BufRead;

use crate::error::{Error, Result};
use crate::region::Region;

/// BED6 reader yielding one [`Region`] per data line.
///
/// Comment (`#`) and blank lines are skipped; `name` and `score` are kept
/// together in [`Region::info`].
pub struct BedReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> BedReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), line_no: 0 }
    }

    pub fn next_record(&mut self) -> Result<Option<Region>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim_end_matches(&['\n', '\r'][..]);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return parse_line(line, self.line_no).map(Some);
        }
    }

    /// Drain the reader into a vector, keeping file order.
    pub fn read_all(mut self) -> Result<Vec<Region>> {
        let mut out = Vec::new();
        while let Some(r) = self.next_record()? {
            out.push(r);
        }
        Ok(out)
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<Region> {
    let bad = |reason: String| Error::MalformedBed { line: line_no, reason };
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 6 {
        return Err(bad(format!("expected 6 tab-separated columns, found {}", cols.len())));
    }
    let start: u64 = cols[1]
        .trim()
        .parse()
        .map_err(|_| bad(format!("invalid start '{}'", cols[1])))?;
    let end: u64 = cols[2]
        .trim()
        .parse()
        .map_err(|_| bad(format!("invalid end '{}'", cols[2])))?;
    let strand = cols[5].trim().parse().map_err(|e: Error| bad(e.to_string()))?;
    let region = Region::new(cols[0], start, end, strand).map_err(|e| bad(e.to_string()))?;
    Ok(region.with_info(format!("{}\t{}", cols[3], cols[4])))
}
