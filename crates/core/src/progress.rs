//! Transfer progress accounting
//!
//! [`ProgressReporter`] turns byte-count observations into a throttled
//! progress line of the form
//! `[=====     ]  42% (1.5 MB/3.6 MB)          512 KB/s     ETA:00:00:04`.
//! Rendering goes to a [`ProgressSink`]; the terminal width comes from a
//! [`TerminalWidth`] lookup so both can be replaced in tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::transfer::{ByteObserver, ProgressFactory};

/// Narrowest terminal width taken into account
pub const MIN_TERMINAL_WIDTH: usize = 20;

/// Width assumed when the terminal size is unknown
pub const DEFAULT_TERMINAL_WIDTH: usize = 50;

/// Columns taken by everything on the line except the bar
pub const RESERVED_COLUMNS: usize = 58;

/// The bar never gets narrower than this
pub const MIN_BAR_WIDTH: usize = 10;

const ETA_UNKNOWN: &str = "--:--:--";

/// Terminal width lookup
pub trait TerminalWidth: Send + Sync {
    /// Current width in columns, or None when not attached to a terminal
    fn columns(&self) -> Option<usize>;
}

/// A fixed terminal width
#[derive(Debug, Clone, Copy)]
pub struct FixedWidth(pub Option<usize>);

impl TerminalWidth for FixedWidth {
    fn columns(&self) -> Option<usize> {
        self.0
    }
}

/// Destination of rendered progress lines
pub trait ProgressSink: Send {
    /// Replace the current line
    fn render(&mut self, line: &str);

    /// Replace the current line and end it
    fn complete(&mut self, line: &str);
}

/// Mutable accounting for one transfer
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub total_size: u64,
    pub bytes_transferred: u64,
    pub start_time: Instant,
    pub last_sample_time: Instant,
    pub last_sample_bytes: u64,
    pub last_printed_percent: u8,
}

impl ProgressState {
    pub fn new(total_size: u64, now: Instant) -> Self {
        Self {
            total_size,
            bytes_transferred: 0,
            start_time: now,
            last_sample_time: now,
            last_sample_bytes: 0,
            last_printed_percent: 0,
        }
    }

    /// Whole percentage transferred, clamped to 100
    ///
    /// An empty transfer counts as complete.
    pub fn percent(&self) -> u8 {
        if self.total_size == 0 {
            return 100;
        }
        let pct = (self.bytes_transferred as u128 * 100) / self.total_size as u128;
        pct.min(100) as u8
    }
}

/// Renders progress for a single transfer
pub struct ProgressReporter {
    state: ProgressState,
    width: Arc<dyn TerminalWidth>,
    sink: Box<dyn ProgressSink>,
    completed: bool,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("state", &self.state)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    pub fn new(total_size: u64, width: Arc<dyn TerminalWidth>, sink: Box<dyn ProgressSink>) -> Self {
        Self::starting_at(total_size, width, sink, Instant::now())
    }

    pub fn starting_at(
        total_size: u64,
        width: Arc<dyn TerminalWidth>,
        sink: Box<dyn ProgressSink>,
        now: Instant,
    ) -> Self {
        Self {
            state: ProgressState::new(total_size, now),
            width,
            sink,
            completed: false,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Record `bytes` more bytes observed at `now`
    pub fn observe_at(&mut self, bytes: u64, now: Instant) {
        if self.completed {
            return;
        }

        self.state.bytes_transferred = self.state.bytes_transferred.saturating_add(bytes);
        let percent = self.state.percent();
        if percent == 100 {
            self.render_final(now);
        } else if percent > self.state.last_printed_percent {
            let line = self.render_line(percent, now);
            self.sink.render(&line);
        }
    }

    /// Mark the stream as ended at `now`
    ///
    /// Renders the final line if it has not been rendered yet.
    pub fn finish_at(&mut self, now: Instant) {
        if !self.completed {
            self.render_final(now);
        }
    }

    fn render_final(&mut self, now: Instant) {
        let percent = self.state.percent();
        let line = self.render_line(percent, now);
        self.sink.complete(&line);
        self.completed = true;
    }

    fn render_line(&mut self, percent: u8, now: Instant) -> String {
        let state = &mut self.state;
        let elapsed = now.saturating_duration_since(state.last_sample_time);
        let delta = state.bytes_transferred - state.last_sample_bytes.min(state.bytes_transferred);
        let rate = if elapsed.is_zero() {
            0.0
        } else {
            delta as f64 / elapsed.as_secs_f64()
        };

        let remaining = state.total_size.saturating_sub(state.bytes_transferred);
        let eta = if rate > 0.0 {
            format_eta(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            ETA_UNKNOWN.to_string()
        };

        state.last_sample_time = now;
        state.last_sample_bytes = state.bytes_transferred;
        state.last_printed_percent = percent;

        let bar = render_bar(bar_width(self.width.columns()), percent);
        let amounts = format!(
            "({}/{})",
            format_bytes(state.bytes_transferred),
            format_bytes(state.total_size)
        );
        let rate = format!("{}/s", format_bytes(rate as u64));

        format!("{bar} {percent:>3}% {amounts:<23} {rate:<12} ETA:{eta}")
    }
}

impl ByteObserver for ProgressReporter {
    fn observe(&mut self, bytes: u64) {
        self.observe_at(bytes, Instant::now());
    }

    fn finish(&mut self) {
        self.finish_at(Instant::now());
    }
}

/// Builds one [`ProgressReporter`] per transfer
pub struct ReporterFactory<F> {
    width: Arc<dyn TerminalWidth>,
    make_sink: F,
}

impl<F> ReporterFactory<F>
where
    F: Fn(&str) -> Box<dyn ProgressSink> + Send + Sync,
{
    /// `make_sink` receives the transfer label and returns the line sink
    pub fn new(width: Arc<dyn TerminalWidth>, make_sink: F) -> Self {
        Self { width, make_sink }
    }
}

impl<F> ProgressFactory for ReporterFactory<F>
where
    F: Fn(&str) -> Box<dyn ProgressSink> + Send + Sync,
{
    fn start(&self, label: &str, total: u64) -> Box<dyn ByteObserver> {
        let sink = (self.make_sink)(label);
        Box::new(ProgressReporter::new(total, Arc::clone(&self.width), sink))
    }
}

/// Bar width for a terminal of `columns` columns
pub fn bar_width(columns: Option<usize>) -> usize {
    let columns = columns
        .map(|c| c.max(MIN_TERMINAL_WIDTH))
        .unwrap_or(DEFAULT_TERMINAL_WIDTH);
    columns.saturating_sub(RESERVED_COLUMNS).max(MIN_BAR_WIDTH)
}

fn render_bar(width: usize, percent: u8) -> String {
    let filled = width * percent as usize / 100;
    format!("[{}{}]", "=".repeat(filled), " ".repeat(width - filled))
}

/// Human-readable size with 1024-based units
pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS.decimal_places(1))
}

/// Format a duration as `hh:mm:ss`
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs_f64().round() as u64;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
