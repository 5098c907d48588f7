//! Per-record progress reporting for sync and refresh runs.
//!
//! The CLI uses [`BarReporter`] (an `indicatif` bar that prints one line per
//! record above it). Library callers use [`NoopReporter`]; tests can use
//! [`RecordingReporter`] to assert on the emitted lines.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

pub trait ProgressReporter: Send + Sync {
    /// Begin a stage over `total` records.
    fn begin(&self, stage: &str, total: u64);

    /// Report the outcome line for one record and advance by one.
    fn record(&self, line: &str);

    /// Finish the current stage.
    fn finish(&self);
}

#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn begin(&self, _stage: &str, _total: u64) {}
    fn record(&self, _line: &str) {}
    fn finish(&self) {}
}

/// Progress bar with one printed line per record.
#[derive(Debug)]
pub struct BarReporter {
    bar: ProgressBar,
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// A bar drawn to stderr.
    pub fn visible() -> Self {
        Self {
            bar: ProgressBar::new(0),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn begin(&self, stage: &str, total: u64) {
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            self.bar.set_style(style.progress_chars("=> "));
        }
        self.bar.set_length(total);
        self.bar.set_message(stage.to_string());
        self.bar.reset();
    }

    fn record(&self, line: &str) {
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Collects every line; for tests.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingReporter {
    fn begin(&self, stage: &str, total: u64) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("begin {stage} ({total})"));
        }
    }

    fn record(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn finish(&self) {}
}
