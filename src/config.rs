//! 各子命令的运行参数。
//!
//! CLI 解析后的参数被收集到这些结构体中，`validate()` 在开始工作前
//! 检查窗口大小和输入文件。

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::util::interp::InterpKind;

/// 参考序列窗口（one-hot 行数）
pub const SEQ_WINDOW: u64 = 101;
/// 比对特征窗口
pub const ALI_WINDOW: u64 = 41;
/// 每个 5-mer 重采样后的电流点数
pub const CUR_WINDOW: usize = 256;
pub const CURRENT_KIND: InterpKind = InterpKind::Linear;

/// `0` 表示使用全部逻辑 CPU。
pub fn effective_threads(threads: usize) -> usize {
    if threads == 0 {
        std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
    } else {
        threads
    }
}

fn require_file(what: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("{} '{}' does not exist or is not a file", what, path.display());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DataProcessOpt {
    pub reference: PathBuf,
    pub current: PathBuf,
    pub output: PathBuf,
    pub threads: usize,
    pub cur_window: usize,
    pub current_kind: InterpKind,
    pub overwrite: bool,
    pub quiet: bool,
}

impl Default for DataProcessOpt {
    fn default() -> Self {
        Self {
            reference: PathBuf::new(),
            current: PathBuf::new(),
            output: PathBuf::new(),
            threads: 0,
            cur_window: CUR_WINDOW,
            current_kind: CURRENT_KIND,
            overwrite: false,
            quiet: false,
        }
    }
}

impl DataProcessOpt {
    pub fn validate(&self) -> Result<()> {
        require_file("reference FASTA", &self.reference)?;
        if !self.current.is_dir() {
            bail!("resquiggle directory '{}' does not exist", self.current.display());
        }
        if self.cur_window == 0 {
            bail!("--cur-window must be positive");
        }
        Ok(())
    }

    pub fn effective_threads(&self) -> usize {
        effective_threads(self.threads)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOpt {
    pub bed: PathBuf,
    pub reference: PathBuf,
    pub align: PathBuf,
    pub current: PathBuf,
    pub output: PathBuf,
    pub threads: usize,
    pub seq_window: u64,
    pub ali_window: u64,
    pub cur_window: usize,
    pub overwrite: bool,
    pub quiet: bool,
}

impl Default for ExtractOpt {
    fn default() -> Self {
        Self {
            bed: PathBuf::new(),
            reference: PathBuf::new(),
            align: PathBuf::new(),
            current: PathBuf::new(),
            output: PathBuf::new(),
            threads: 0,
            seq_window: SEQ_WINDOW,
            ali_window: ALI_WINDOW,
            cur_window: CUR_WINDOW,
            overwrite: false,
            quiet: false,
        }
    }
}

impl ExtractOpt {
    pub fn validate(&self) -> Result<()> {
        require_file("BED file", &self.bed)?;
        require_file("reference FASTA", &self.reference)?;
        require_file("alignment file", &self.align)?;
        if !self.current.exists() {
            bail!("current input '{}' does not exist", self.current.display());
        }
        if self.seq_window == 0 || self.ali_window == 0 || self.cur_window == 0 {
            bail!("window sizes must be positive (seq {}, ali {}, cur {})", self.seq_window, self.ali_window, self.cur_window);
        }
        if self.output.exists() && !self.output.is_dir() {
            bail!("output '{}' exists and is not a directory", self.output.display());
        }
        Ok(())
    }

    pub fn effective_threads(&self) -> usize {
        effective_threads(self.threads)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictOpt {
    pub bed: PathBuf,
    pub datasets: PathBuf,
    pub model: PathBuf,
    pub output: PathBuf,
    pub threads: usize,
    pub quiet: bool,
}

impl PredictOpt {
    pub fn validate(&self) -> Result<()> {
        require_file("BED file", &self.bed)?;
        require_file("model", &self.model)?;
        if !self.datasets.is_dir() {
            bail!("datasets directory '{}' does not exist", self.datasets.display());
        }
        Ok(())
    }

    pub fn effective_threads(&self) -> usize {
        effective_threads(self.threads)
    }

    /// `--output` may name a file or an existing directory.
    pub fn output_file(&self) -> PathBuf {
        if self.output.is_dir() {
            self.output.join("predictions.tsv")
        } else {
            self.output.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_windows() {
        let opt = ExtractOpt::default();
        assert_eq!(opt.seq_window, 101);
        assert_eq!(opt.ali_window, 41);
        assert_eq!(opt.cur_window, 256);
        assert_eq!(DataProcessOpt::default().current_kind, InterpKind::Linear);
    }

    #[test]
    fn zero_threads_means_all_cpus() {
        assert!(effective_threads(0) >= 1);
        assert_eq!(effective_threads(3), 3);
    }

    #[test]
    fn extract_rejects_missing_inputs_and_zero_windows() {
        let dir = tempfile::tempdir().unwrap();
        let touch = |name: &str| {
            let p = dir.path().join(name);
            std::fs::write(&p, b"").unwrap();
            p
        };
        let mut opt = ExtractOpt {
            bed: touch("a.bed"),
            reference: touch("ref.fa"),
            align: touch("reads.bam"),
            current: touch("current.list"),
            output: dir.path().join("out"),
            ..ExtractOpt::default()
        };
        assert!(opt.validate().is_ok());

        opt.ali_window = 0;
        assert!(opt.validate().is_err());
        opt.ali_window = ALI_WINDOW;

        opt.bed = dir.path().join("missing.bed");
        assert!(opt.validate().is_err());
    }

    #[test]
    fn predict_output_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let opt = PredictOpt { output: dir.path().to_path_buf(), ..PredictOpt::default() };
        assert_eq!(opt.output_file(), dir.path().join("predictions.tsv"));
        let opt = PredictOpt { output: dir.path().join("calls.tsv"), ..PredictOpt::default() };
        assert_eq!(opt.output_file(), dir.path().join("calls.tsv"));
    }
}
