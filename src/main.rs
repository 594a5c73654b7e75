use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use catmod::config::{self, DataProcessOpt, ExtractOpt, PredictOpt};
use catmod::pipeline;
use catmod::util::interp::InterpKind;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "catmod",
    author,
    version,
    about = "Detect RNA modifications from nanopore direct RNA current signal",
    arg_required_else_help = true
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only warnings and errors; hides progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert per-read resquiggle tables into 5-mer current files
    #[command(name = "data_process", alias = "data-process")]
    DataProcess {
        /// Reference FASTA file
        #[arg(short = 'r', long = "ref")]
        reference: PathBuf,
        /// Directory of per-read resquiggle tables (*.tsv)
        #[arg(short, long)]
        current: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,
        /// Current samples per 5-mer after resampling
        #[arg(long = "cur-window", alias = "cur_window", default_value_t = config::CUR_WINDOW)]
        cur_window: usize,
        /// Interpolation used for resampling (linear, nearest, zero, cubic, ...)
        #[arg(long = "current-kind", alias = "current_kind", default_value_t = config::CURRENT_KIND)]
        current_kind: InterpKind,
        /// Rewrite current files that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Extract sequence, alignment and current features per BED site
    #[command(name = "extract_features", alias = "extract-features")]
    ExtractFeatures {
        /// BED6 file of candidate sites
        #[arg(short, long)]
        bed: PathBuf,
        /// Reference FASTA file
        #[arg(short = 'r', long = "ref")]
        reference: PathBuf,
        /// Alignment file (.bam, .cram or .sam)
        #[arg(short, long)]
        align: PathBuf,
        /// Current file list, or a directory of *.current.tsv files
        #[arg(short, long)]
        current: PathBuf,
        /// Output dataset directory
        #[arg(short, long)]
        output: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,
        #[arg(long = "seq-window", alias = "seq_window", default_value_t = config::SEQ_WINDOW)]
        seq_window: u64,
        #[arg(long = "ali-window", alias = "ali_window", default_value_t = config::ALI_WINDOW)]
        ali_window: u64,
        #[arg(long = "cur-window", alias = "cur_window", default_value_t = config::CUR_WINDOW)]
        cur_window: usize,
        /// Recompute features that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Score extracted datasets with a pretrained model
    Predict {
        /// BED6 file of sites to score
        #[arg(short, long)]
        bed: PathBuf,
        /// Dataset directory written by extract_features
        #[arg(short, long)]
        datasets: PathBuf,
        /// CatBoost model exported as JSON
        #[arg(short, long)]
        model: PathBuf,
        /// Output TSV file, or a directory to hold predictions.tsv
        #[arg(short, long)]
        output: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,
    },
}

fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = log_level(verbose, quiet);
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()));
    if verbose > 0 || quiet {
        builder.filter_level(level);
    }
    builder.format_timestamp_secs().init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let quiet = cli.quiet;

    match cli.command {
        Commands::DataProcess { reference, current, output, threads, cur_window, current_kind, overwrite } => {
            let opt = DataProcessOpt { reference, current, output, threads, cur_window, current_kind, overwrite, quiet };
            pipeline::data_process::run(&opt)?;
        }
        Commands::ExtractFeatures {
            bed,
            reference,
            align,
            current,
            output,
            threads,
            seq_window,
            ali_window,
            cur_window,
            overwrite,
        } => {
            let opt = ExtractOpt {
                bed,
                reference,
                align,
                current,
                output,
                threads,
                seq_window,
                ali_window,
                cur_window,
                overwrite,
                quiet,
            };
            pipeline::extract::run(&opt)?;
        }
        Commands::Predict { bed, datasets, model, output, threads } => {
            let opt = PredictOpt { bed, datasets, model, output, threads, quiet };
            pipeline::predict::run(&opt)?;
        }
    }
    Ok(())
}
