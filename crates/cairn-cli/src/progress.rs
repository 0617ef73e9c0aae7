use cairn_core::ProgressReporter;
use colored::*;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif.
///
/// When the pre-walk count finished in time the walk gets a bounded bar,
/// otherwise a spinner with running totals.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

fn bounded_bar(label: &str, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "  {spinner:.cyan} {prefix} [{bar:30.cyan/dim}] {pos}/{len} files ({eta} remaining) {wide_msg:.dim}",
    )
    .map(|s| s.progress_chars("━╸─").tick_chars(TICK_CHARS))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb
}

fn spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("  {spinner:.cyan} {prefix} {msg}")
        .map(|s| s.tick_chars(TICK_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb.set_message("counting...");
    pb
}

impl ProgressReporter for CliReporter {
    fn on_walk_start(&self, label: &str, total_files: Option<u64>) {
        let pb = match total_files {
            Some(total) => bounded_bar(label, total),
            None => spinner(label),
        };
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_entry(&self, relative_path: &str, files_seen: u64, bytes_seen: u64) {
        self.with_bar(|pb| {
            if pb.length().is_some() {
                pb.set_position(files_seen);
                pb.set_message(relative_path.to_string());
            } else {
                pb.set_message(format!(
                    "{} files, {}",
                    files_seen,
                    HumanBytes(bytes_seen)
                ));
            }
        });
    }

    fn on_walk_complete(&self, files: u64, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Walk complete: {} files in {:.2}s",
            "✓".green(),
            files,
            duration_secs
        );
    }
}
