//! Copy progress sinks.
//!
//! The copier only hands out numbers; how they are shown is up to the sink.

use indicatif::ProgressStyle;

use std::borrow::Cow;

pub trait ProgressSink {
    fn report(&mut self, done: usize, total: usize);
}

/// Rounded percentage of `done` over `total`, clamped to `0..=100`.
///
/// An empty total counts as finished.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    let pct = (done as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _done: usize, _total: usize) {}
}

/// Emits one debug event per report.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&mut self, done: usize, total: usize) {
        tracing::debug!(done, total, percent = percent(done, total), "Copy progress");
    }
}

/// `{msg} {bar} {percent}%` with `»` for copied and `.` for pending files.
pub static BAR_TEMPLATE: &str = "{msg} {bar:20} {percent}%";
pub static BAR_CHARS: &str = "\u{00bb}.";

fn bar_style() -> ProgressStyle {
    match ProgressStyle::with_template(BAR_TEMPLATE) {
        Ok(style) => style.progress_chars(BAR_CHARS),
        Err(e) => {
            tracing::warn!("Invalid progress template, using default: {e}");
            ProgressStyle::default_bar()
        }
    }
}

/// Terminal bar drawn by indicatif on stderr.
///
/// Nothing is drawn when stderr is not a terminal.
#[derive(Clone)]
pub struct ProgressBar {
    bar: indicatif::ProgressBar,
}

impl ProgressBar {
    pub fn new<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::with_bar(indicatif::ProgressBar::new(0), message)
    }

    /// A bar that tracks reports without drawing anything.
    pub fn hidden<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::with_bar(indicatif::ProgressBar::hidden(), message)
    }

    fn with_bar<S: Into<Cow<'static, str>>>(bar: indicatif::ProgressBar, message: S) -> Self {
        bar.set_style(bar_style());
        bar.set_message(message);
        Self { bar }
    }

    /// Leaves the last state on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl ProgressSink for ProgressBar {
    fn report(&mut self, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done.min(total) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_edges() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(5, 0), 100);
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(7, 3), 100);
        assert_eq!(percent(usize::MAX - 1, usize::MAX), 100);
        assert_eq!(percent(1, usize::MAX), 0);
    }

    #[test]
    fn test_bar_template_is_valid() {
        assert!(ProgressStyle::with_template(BAR_TEMPLATE).is_ok());
    }

    #[test]
    fn test_report_moves_bar() {
        let mut bar = ProgressBar::hidden("copy");
        bar.report(1, 4);
        assert_eq!(bar.position(), 1);
        assert_eq!(bar.length(), Some(4));

        // Total shrinks when a copy fails.
        bar.report(1, 3);
        assert_eq!(bar.length(), Some(3));

        bar.report(7, 3);
        assert_eq!(bar.position(), 3);

        bar.finish();
        assert!(bar.bar.is_finished());
    }

    #[test]
    fn test_empty_batch() {
        let mut bar = ProgressBar::hidden("copy");
        bar.report(0, 0);
        assert_eq!(bar.position(), 0);
        assert_eq!(bar.length(), Some(0));
    }

    #[test]
    fn test_silent_sinks_accept_anything() {
        NoProgress.report(usize::MAX, 0);
        TracingProgress.report(0, 0);
        TracingProgress.report(10, 3);
    }
}
