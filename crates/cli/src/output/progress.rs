//! Progress bar utilities for transfer operations
//!
//! The progress line itself is composed by the core reporter; this module
//! only decides whether it is shown and draws it through indicatif.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use s3ctl_core::progress::{ProgressSink, ReporterFactory, TerminalWidth};
use s3ctl_core::transfer::{NoProgress, ProgressFactory};

use super::OutputConfig;

/// Width of the attached stdout terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleWidth;

impl TerminalWidth for ConsoleWidth {
    fn columns(&self) -> Option<usize> {
        console::Term::stdout()
            .size_checked()
            .map(|(_, columns)| columns as usize)
    }
}

/// One redrawn progress line backed by an indicatif bar
pub struct ProgressLine {
    bar: ProgressBar,
}

impl ProgressLine {
    /// Print `label` above the line and start drawing to stderr
    pub fn new(label: &str) -> Self {
        Self::with_target(label, ProgressDrawTarget::stderr())
    }

    fn with_target(label: &str, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        let style = ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.println(label);
        Self { bar }
    }

    /// Message currently shown
    pub fn message(&self) -> String {
        self.bar.message()
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

impl ProgressSink for ProgressLine {
    fn render(&mut self, line: &str) {
        self.bar.set_message(line.to_string());
    }

    fn complete(&mut self, line: &str) {
        self.bar.finish_with_message(line.to_string());
    }
}

/// Progress factory for transfers
///
/// Progress is suppressed in quiet or JSON mode, with `--no-progress`, or
/// when the configuration turns it off.
pub fn transfer_progress(config: &OutputConfig, enabled: bool) -> Arc<dyn ProgressFactory> {
    if !enabled || !config.shows_progress() {
        return Arc::new(NoProgress);
    }

    Arc::new(ReporterFactory::new(Arc::new(ConsoleWidth), |label: &str| {
        Box::new(ProgressLine::new(label)) as Box<dyn ProgressSink>
    }))
}
