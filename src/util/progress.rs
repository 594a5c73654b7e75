use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{msg:<36} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>8}/{len:8} ({eta})";

/// Progress bar on stderr; hidden when `quiet` so logs stay clean in batch jobs.
pub fn bar(len: u64, msg: impl Into<String>, quiet: bool) -> ProgressBar {
    let target = if quiet { ProgressDrawTarget::hidden() } else { ProgressDrawTarget::stderr() };
    let pb = ProgressBar::with_draw_target(Some(len), target);
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message(msg.into());
    pb
}
