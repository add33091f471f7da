//! Stamped Sample History
//!
//! Fixed-capacity ring of `(stamp, value)` pairs for drivers that derive a
//! value from recent history - the gamma driver keeps ten minutes of dose
//! rates in one of these and publishes the windowed mean. When full, the
//! oldest entry is overwritten; there is no allocation and no failure mode.
//!
//! Stamps are wrapping [`Millis`] ticks, so window queries use the same
//! modular age arithmetic as the rest of the crate.

use crate::time::Millis;

/// Ring buffer of stamped samples with windowed queries.
#[derive(Debug, Clone)]
pub struct TimedBuffer<const N: usize> {
    entries: [(Millis, f32); N],
    /// Next write position.
    head: usize,
    /// Number of valid entries, saturating at `N`.
    count: usize,
}

impl<const N: usize> TimedBuffer<N> {
    /// Empty buffer.
    pub const fn new() -> Self {
        Self {
            entries: [(Millis(0), 0.0); N],
            head: 0,
            count: 0,
        }
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the buffer is at capacity (pushes now overwrite).
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Append a sample, overwriting the oldest when full.
    pub fn push(&mut self, at: Millis, value: f32) {
        self.entries[self.head] = (at, value);
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Most recently pushed sample.
    pub fn last(&self) -> Option<(Millis, f32)> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.head + N - 1) % N;
        Some(self.entries[idx])
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Iterate stored samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (Millis, f32)> + '_ {
        let start = (self.head + N - self.count) % N;
        (0..self.count).map(move |i| self.entries[(start + i) % N])
    }

    /// Mean of the samples at most `window_ms` old at `now`.
    ///
    /// `None` if no sample falls inside the window.
    pub fn mean_within(&self, now: Millis, window_ms: u32) -> Option<f32> {
        let mut sum = 0.0f32;
        let mut n = 0u32;
        for (at, value) in self.iter() {
            if now.elapsed_since(at) <= window_ms {
                sum += value;
                n += 1;
            }
        }
        (n > 0).then(|| sum / n as f32)
    }
}

impl<const N: usize> Default for TimedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_overwrite_oldest() {
        let mut buf: TimedBuffer<3> = TimedBuffer::new();
        assert!(buf.is_empty());

        buf.push(Millis(0), 1.0);
        buf.push(Millis(100), 2.0);
        buf.push(Millis(200), 3.0);
        assert!(buf.is_full());

        buf.push(Millis(300), 4.0);
        let collected: heapless::Vec<f32, 4> = buf.iter().map(|(_, v)| v).collect();
        assert_eq!(collected.as_slice(), &[2.0, 3.0, 4.0]);
        assert_eq!(buf.last(), Some((Millis(300), 4.0)));
    }

    #[test]
    fn windowed_mean_ignores_stale_samples() {
        let mut buf: TimedBuffer<8> = TimedBuffer::new();
        buf.push(Millis(0), 100.0); // stale at query time
        buf.push(Millis(500_000), 2.0);
        buf.push(Millis(560_000), 4.0);
        buf.push(Millis(620_000), 6.0);

        // Ten-minute window ending at t=650s covers the last three samples.
        let mean = buf.mean_within(Millis(650_000), 600_000);
        assert_eq!(mean, Some(4.0));
    }

    #[test]
    fn empty_window_yields_none() {
        let mut buf: TimedBuffer<4> = TimedBuffer::new();
        assert_eq!(buf.mean_within(Millis(1_000), 600_000), None);
        buf.push(Millis(0), 1.0);
        // Sample too old for a 100 ms window at t=10s.
        assert_eq!(buf.mean_within(Millis(10_000), 100), None);
    }

    #[test]
    fn window_query_survives_stamp_wrap() {
        let mut buf: TimedBuffer<4> = TimedBuffer::new();
        buf.push(Millis(u32::MAX - 1_000), 10.0);
        buf.push(Millis(500), 20.0);
        let mean = buf.mean_within(Millis(1_000), 5_000);
        assert_eq!(mean, Some(15.0));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut buf: TimedBuffer<2> = TimedBuffer::new();
        buf.push(Millis(0), 1.0);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.last(), None);
    }
}
