//! CLI presenter for output formatting

use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::InvalidFile;
use crate::domain::batch::{BatchFileStatus, BatchProgress, BatchStatistics, FileStatus};

/// Presenter for CLI output formatting
#[derive(Debug, Default, Clone, Copy)]
pub struct Presenter;

impl Presenter {
    pub fn new() -> Self {
        Self
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout (the actual transcription output)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Report files rejected before the batch started
    pub fn rejected(&self, invalid: &[InvalidFile]) {
        for file in invalid {
            self.warn(&format!("Skipping {}: {}", file.path.display(), file.error));
        }
    }

    /// Progress bar covering a whole batch
    pub fn batch_bar(&self, total_files: usize) -> BatchBar {
        let bar = ProgressBar::new(total_files as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▌░"),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        BatchBar { bar }
    }

    /// Print the end-of-batch summary to stderr
    pub fn summary(&self, stats: &BatchStatistics) {
        let line = format!(
            "{} of {} files transcribed in {} (avg {})",
            stats.completed_files,
            stats.total_files,
            format_duration(stats.total_processing_time),
            format_duration(stats.average_processing_time),
        );
        if stats.failed_files == 0 {
            self.success(&line);
        } else {
            self.warn(&format!("{}, {} failed", line, stats.failed_files));
        }
    }
}

/// Shareable handle on the batch progress bar
#[derive(Debug, Clone)]
pub struct BatchBar {
    bar: ProgressBar,
}

impl BatchBar {
    pub fn update(&self, progress: &BatchProgress) {
        self.bar.set_position(progress.current_file_index as u64);
        self.bar.set_message(format_status_line(progress));
    }

    /// Print a line above the bar when a file settles; straight to stderr
    /// when the bar is hidden (not a terminal)
    pub fn file_settled(&self, status: &BatchFileStatus) {
        let Some(line) = format_file_line(status) else {
            return;
        };
        if self.bar.is_hidden() {
            eprintln!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Message shown next to the bar
pub fn format_status_line(progress: &BatchProgress) -> String {
    let mut line = match &progress.current_file {
        Some(name) => format!("{:>3.0}% {}", progress.overall_progress, name),
        None => format!("{:>3.0}%", progress.overall_progress),
    };
    if let Some(eta) = progress.estimated_time_remaining.filter(|_| !progress.is_complete()) {
        line.push_str(&format!(" (eta {})", format_duration(eta)));
    }
    line
}

/// One-line outcome for a terminal file status
pub fn format_file_line(status: &BatchFileStatus) -> Option<String> {
    match status.status {
        FileStatus::Completed => {
            let took = status
                .result
                .as_ref()
                .map(|r| format!(" ({})", format_duration(r.processing_time)))
                .unwrap_or_default();
            Some(format!("{} {}{}", "✓".green(), status.file.name(), took))
        }
        FileStatus::Error => Some(format!(
            "{} {}: {}",
            "✗".red(),
            status.file.name(),
            status.error.as_deref().unwrap_or("failed")
        )),
        FileStatus::Pending | FileStatus::Processing => None,
    }
}

/// Compact `1m05s` / `4.2s` rendering
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
