//! Progress reporting for long-running pipeline stages.

/// Receives percent-complete updates from a pipeline.
///
/// Implementations must tolerate being called many times with the same value.
pub trait ProgressReporter: Send + Sync {
    /// Report `percent` (0-100) with a human-readable message.
    fn report(&self, percent: u8, message: &str);
}

/// A reporter that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Maps a stage's own 0-100 range onto a band of the parent's range.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressReporter,
    start: u8,
    end: u8,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressReporter, start: u8, end: u8) -> Self {
        let start = start.min(100);
        let end = end.clamp(start, 100);
        Self { inner, start, end }
    }

    fn scale(&self, percent: u8) -> u8 {
        let span = u32::from(self.end - self.start);
        let scaled = u32::from(self.start) + span * u32::from(percent.min(100)) / 100;
        scaled as u8
    }
}

impl ProgressReporter for ScaledProgress<'_> {
    fn report(&self, percent: u8, message: &str) {
        self.inner.report(self.scale(percent), message);
    }
}
