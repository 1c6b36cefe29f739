use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// ProgressAccountant
// ---------------------------------------------------------------------------

/// Turns out-of-order chunk acknowledgements into a monotonic percentage.
///
/// Fed with the running totals of an [`UploadSession`](crate::UploadSession).
/// Only strictly increasing values are returned, so the caller can forward
/// every `Some` straight to a progress sink. 100 is returned once, when the
/// last chunk is acknowledged; until then the value is capped at 99 even if
/// rounding would reach 100.
#[derive(Debug, Clone)]
pub struct ProgressAccountant {
    total_bytes: u64,
    total_chunks: u32,
    acknowledged_bytes: u64,
    acknowledged_chunks: u32,
    last_reported: Option<u8>,
}

impl ProgressAccountant {
    pub fn new(total_bytes: u64, total_chunks: u32) -> Self {
        Self {
            total_bytes,
            total_chunks,
            acknowledged_bytes: 0,
            acknowledged_chunks: 0,
            last_reported: None,
        }
    }

    /// Returns the initial 0% report, once.
    pub fn begin(&mut self) -> Option<u8> {
        self.report(0)
    }

    /// Takes the current acknowledged totals and returns a new percentage
    /// if it went up.
    pub fn observe(&mut self, acknowledged_bytes: u64, acknowledged_chunks: u32) -> Option<u8> {
        self.acknowledged_bytes = acknowledged_bytes.min(self.total_bytes);
        self.acknowledged_chunks = acknowledged_chunks.min(self.total_chunks);
        let percent = self.percent();
        self.report(percent)
    }

    /// Credits everything at once, for content the backend already holds.
    pub fn finish(&mut self) -> Option<u8> {
        self.observe(self.total_bytes, self.total_chunks)
    }

    /// Current percentage, whether or not it was reported.
    pub fn percent(&self) -> u8 {
        if self.is_complete() {
            return 100;
        }
        if self.total_bytes == 0 {
            return 0;
        }
        let ratio = self.acknowledged_bytes as f64 / self.total_bytes as f64;
        ((ratio * 100.0).round() as u8).min(99)
    }

    pub fn is_complete(&self) -> bool {
        self.acknowledged_chunks >= self.total_chunks
    }

    pub fn acknowledged_bytes(&self) -> u64 {
        self.acknowledged_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn report(&mut self, percent: u8) -> Option<u8> {
        match self.last_reported {
            Some(last) if percent <= last => None,
            _ => {
                self.last_reported = Some(percent);
                Some(percent)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: Vec::new(),
            max_samples: max_samples.unwrap_or(100),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Records `bytes` acknowledged at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&mut self, bytes: u64, now: Instant) {
        self.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        // Prune samples outside the window.
        if let Some(cutoff) = now.checked_sub(self.window_size) {
            self.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(..excess);
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }

        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        // The first sample marks the window start; its bytes predate it.
        let bytes: u64 = self.samples[1..].iter().map(|s| s.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }
}
