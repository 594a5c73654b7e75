//! # catmod
//!
//! 基于 Oxford Nanopore 直接 RNA 测序电流信号的 RNA 修饰检测流程。
//!
//! 本 crate 覆盖三个阶段：
//!
//! - **data_process**：把 resquiggle 输出的逐碱基信号表转换为 5-mer 电流文件
//! - **extract_features**：按 BED 位点提取参考序列、比对/质量和电流特征
//! - **predict**：拼接特征并用 CatBoost 模型打分
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use catmod::features::sequence::one_hot;
//! use catmod::region::{Region, Strand};
//!
//! // 以位点为中心扩展到 101 nt 窗口
//! let site = Region::new("chr1", 1000, 1001, Strand::Forward).unwrap();
//! let window = site.resized(101, Some(248_956_422));
//! assert_eq!(window.len(), 101);
//! assert_eq!(site.key(), "chr1_+_1000-1001");
//!
//! let encoded = one_hot(b"ACGTN");
//! assert_eq!(encoded.shape, vec![5, 4]);
//! ```
//!
//! ## 模块说明
//!
//! - [`region`]：基因组区间、区间键与窗口缩放
//! - [`io`]：BED / FASTA(faidx) / BAM / 电流文件 / 特征存储
//! - [`features`]：序列、比对、电流与集成特征
//! - [`model`]：CatBoost JSON 模型求值
//! - [`pipeline`]：三个子命令的执行流程
//! - [`config`]：子命令参数与默认窗口
//! - [`util`]：碱基编码、插值重采样、进度条

pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod region;
pub mod util;

pub use error::{Error, Result};
