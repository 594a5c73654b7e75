//! The three stages of the CLI, one module each.

pub mod data_process;
pub mod extract;
pub mod predict;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

/// Run `f` on a dedicated rayon pool of `threads` workers.
pub(crate) fn with_pool<T, F>(threads: usize, f: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("cannot start worker threads")?;
    pool.install(f)
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        info!("creating output directory {}", dir.display());
        fs::create_dir_all(dir).with_context(|| format!("cannot create directory '{}'", dir.display()))?;
    }
    Ok(())
}

/// Command line of the current process, recorded in dataset manifests.
pub(crate) fn command_line() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}
