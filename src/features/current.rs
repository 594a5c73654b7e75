use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use crate::error::Error;
use crate::io::current::CurrentRecord;
use crate::io::store::FeatureArray;

/// Current rows of every read covering one site, in input order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SiteCurrents {
    pub norm_mean: Vec<Vec<f32>>,
    pub norm_stdev: Vec<Vec<f32>>,
    pub current: Vec<Vec<f32>>,
}

impl SiteCurrents {
    pub fn reads(&self) -> usize {
        self.current.len()
    }

    /// Add one read; rows whose current length differs from the site's first row are refused.
    pub fn push(&mut self, rec: CurrentRecord) -> bool {
        if let Some(first) = self.current.first() {
            if first.len() != rec.current.len() {
                return false;
            }
        }
        self.norm_mean.push(rec.norm_mean);
        self.norm_stdev.push(rec.norm_stdev);
        self.current.push(rec.current);
        true
    }

    pub fn into_arrays(self) -> Result<[FeatureArray<f32>; 3], Error> {
        Ok([
            FeatureArray::from_rows(self.norm_mean)?,
            FeatureArray::from_rows(self.norm_stdev)?,
            FeatureArray::from_rows(self.current)?,
        ])
    }
}

/// Read one per-read current file, keeping only lines whose site is in `wanted`.
///
/// Malformed lines are logged and skipped.
pub fn read_current_file(path: &Path, wanted: &HashSet<String>) -> Result<Vec<(String, CurrentRecord)>> {
    let fh = File::open(path).with_context(|| format!("cannot open current file '{}'", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(fh).lines().enumerate() {
        let line = line.with_context(|| format!("cannot read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match CurrentRecord::parse(&line, i + 1) {
            Ok(rec) => {
                let key = rec.site_key();
                if wanted.contains(&key) {
                    out.push((key, rec));
                }
            }
            Err(e) => warn!("{}: {}", path.display(), e),
        }
    }
    Ok(out)
}

/// Merge per-file records into per-site stacks, preserving first-seen site order.
pub fn collect_sites<I>(per_file: I) -> Vec<(String, SiteCurrents)>
where
    I: IntoIterator<Item = Vec<(String, CurrentRecord)>>,
{
    let mut order: Vec<(String, SiteCurrents)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for records in per_file {
        for (key, rec) in records {
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                order.push((key.clone(), SiteCurrents::default()));
                order.len() - 1
            });
            let read_id = rec.read_id.clone();
            let width = rec.current.len();
            if !order[slot].1.push(rec) {
                warn!(
                    "site {}: read {} has {} current samples, expected {}; skipped",
                    key,
                    read_id,
                    width,
                    order[slot].1.current.first().map(Vec::len).unwrap_or(0)
                );
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(read: &str, start: u64, current: &str) -> String {
        format!("chr1\t{}\t{}\t{}\t0\t+\t1,2,3,4,5\t1,1,1,1,1\t{}\n", start, start + 5, read, current)
    }

    #[test]
    fn filters_and_stacks_by_site() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.current.tsv");
        let b = dir.path().join("b.current.tsv");
        std::fs::write(&a, format!("{}{}garbage\n", line("r1", 98, "1,2"), line("r1", 200, "1,2"))).unwrap();
        std::fs::write(&b, format!("{}{}", line("r2", 98, "3,4"), line("r3", 98, "5"))).unwrap();

        let wanted: HashSet<String> = ["chr1_+_100-101".to_string()].into_iter().collect();
        let per_file = vec![
            read_current_file(&a, &wanted).unwrap(),
            read_current_file(&b, &wanted).unwrap(),
        ];
        assert_eq!(per_file[0].len(), 1);

        let sites = collect_sites(per_file);
        assert_eq!(sites.len(), 1);
        let (key, site) = &sites[0];
        assert_eq!(key, "chr1_+_100-101");
        // r3 has a shorter trace and is dropped
        assert_eq!(site.reads(), 2);
        assert!(site.norm_mean.iter().all(|r| r.len() == 5));

        let [mean, stdev, cur] = site.clone().into_arrays().unwrap();
        assert_eq!(mean.shape, vec![2, 5]);
        assert_eq!(stdev.shape, vec![2, 5]);
        assert_eq!(cur.data, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
