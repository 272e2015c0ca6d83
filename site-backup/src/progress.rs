//! Byte-level progress tracking for extraction and archiving.

use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Minimum time between two progress callbacks (4 updates per second)
const UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Callback receiving the completed fraction, 0.0..=1.0
pub type FractionCallback = Box<dyn FnMut(f64) + Send>;

/// Accumulates processed bytes against a known total and reports a throttled fraction.
pub struct ByteProgress {
    total: u64,
    processed: u64,
    last_update: Option<Instant>,
    update_interval: Duration,
    callback: FractionCallback,
}

impl ByteProgress {
    pub fn new(total: u64, callback: FractionCallback) -> Self {
        Self {
            total,
            processed: 0,
            last_update: None,
            update_interval: UPDATE_INTERVAL,
            callback,
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn advance(&mut self, bytes: u64) {
        self.processed = self.processed.saturating_add(bytes);

        let now = Instant::now();
        let due = self
            .last_update
            .map_or(true, |last| now.duration_since(last) >= self.update_interval);
        if due {
            let fraction = self.fraction();
            (self.callback)(fraction);
            self.last_update = Some(now);
        }
    }

    /// Final update, always delivered
    pub fn finish(&mut self) {
        let fraction = self.fraction();
        (self.callback)(fraction);
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }
}

/// Reader wrapper that reports every chunk read to a [`ByteProgress`].
pub struct ProgressReader<'a, R> {
    inner: R,
    progress: &'a mut ByteProgress,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub fn new(inner: R, progress: &'a mut ByteProgress) -> Self {
        Self { inner, progress }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.progress.advance(n as u64);
        }
        Ok(n)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
