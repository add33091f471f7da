//! Sample Smoothing and Publish Suppression
//!
//! ## Behavior
//!
//! Raw readings arrive once per measurement cycle. Publishing every one of
//! them would flood the bus with noise, so each channel runs its values
//! through a [`SampleFilter`] with three knobs:
//!
//! - `smooth_interval`: how many raw samples form one averaging window.
//!   The window mean is the candidate value; the raw samples themselves
//!   never reach the bus.
//! - `eps`: deadband. A candidate is published only if it differs from the
//!   last published value by at least `eps`.
//! - `poll_time_s`: heartbeat. Even inside the deadband, a candidate is
//!   published once the last publication is older than this.
//!
//! The heartbeat guarantees liveness (a silent channel still proves the
//! sensor alive), the deadband guarantees stability (a constant input
//! settles to roughly one message per heartbeat), and the window keeps
//! single-sample noise out entirely.
//!
//! The first completed window after construction or reconfiguration is
//! always published: there is no previous value to suppress against. This
//! is deliberate - a mode change should announce itself with a fresh value.
//!
//! ## Modes
//!
//! [`FilterMode`] maps the three command-level presets onto parameter
//! triples, scaled around a per-channel base deadband.

use libm::fabsf;

use crate::time::Millis;

/// Parameter triple controlling one channel's filter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterParams {
    /// Samples per averaging window. Zero is treated as one.
    pub smooth_interval: u16,
    /// Heartbeat: maximum publication age in seconds before a candidate
    /// passes regardless of the deadband.
    pub poll_time_s: u16,
    /// Deadband around the last published value.
    pub eps: f32,
}

impl FilterParams {
    /// Build a parameter triple.
    pub const fn new(smooth_interval: u16, poll_time_s: u16, eps: f32) -> Self {
        Self {
            smooth_interval,
            poll_time_s,
            eps,
        }
    }
}

/// Named filter presets selectable over the command topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    /// Nearly raw: every sample is a window, short heartbeat.
    Fast,
    /// Default: small windows, half-minute heartbeat.
    Medium,
    /// Trend logging: large windows, ten-minute heartbeat, wide deadband.
    Longterm,
}

impl FilterMode {
    /// Wire spelling used on the `mode` channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "FAST",
            Self::Medium => "MEDIUM",
            Self::Longterm => "LONGTERM",
        }
    }

    /// Parse the wire spelling, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("FAST") {
            Some(Self::Fast)
        } else if s.eq_ignore_ascii_case("MEDIUM") {
            Some(Self::Medium)
        } else if s.eq_ignore_ascii_case("LONGTERM") {
            Some(Self::Longterm)
        } else {
            None
        }
    }

    /// Preset parameter triple, scaled around a channel's base deadband.
    pub fn params(&self, base_eps: f32) -> FilterParams {
        match self {
            Self::Fast => FilterParams::new(1, 2, base_eps),
            Self::Medium => FilterParams::new(4, 30, 2.0 * base_eps),
            Self::Longterm => FilterParams::new(20, 600, 3.0 * base_eps),
        }
    }
}

/// Per-channel smoothing window plus publish suppression state.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    params: FilterParams,
    sum: f32,
    count: u16,
    last: Option<f32>,
    last_at: Millis,
}

impl SampleFilter {
    /// Filter with empty window and no publication history.
    pub fn new(params: FilterParams) -> Self {
        Self {
            params,
            sum: 0.0,
            count: 0,
            last: None,
            last_at: Millis(0),
        }
    }

    /// Filter that behaves as if `value` had been published at `at`.
    ///
    /// Used by tests that want to start mid-stream.
    pub fn with_last(params: FilterParams, value: f32, at: Millis) -> Self {
        let mut filter = Self::new(params);
        filter.last = Some(value);
        filter.last_at = at;
        filter
    }

    /// Active parameters.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// Replace the parameters and clear all state.
    ///
    /// Clearing the suppression state means the first window completed under
    /// the new parameters is always published.
    pub fn set_params(&mut self, params: FilterParams) {
        self.params = params;
        self.reset();
    }

    /// Clear the window and the suppression state.
    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
        self.last = None;
        self.last_at = Millis(0);
    }

    /// Feed one raw sample; returns the window mean if it should be published.
    pub fn offer(&mut self, value: f32, now: Millis) -> Option<f32> {
        self.sum += value;
        self.count += 1;
        if self.count < self.params.smooth_interval.max(1) {
            return None;
        }

        let mean = self.sum / f32::from(self.count);
        self.sum = 0.0;
        self.count = 0;

        let due = match self.last {
            None => true,
            Some(prev) => {
                fabsf(mean - prev) >= self.params.eps
                    || now.elapsed_since(self.last_at)
                        >= u32::from(self.params.poll_time_s) * 1_000
            }
        };
        if due {
            self.last = Some(mean);
            self.last_at = now;
            Some(mean)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(filter: &mut SampleFilter, values: &[(f32, u32)]) -> heapless::Vec<f32, 16> {
        let mut out = heapless::Vec::new();
        for &(v, at_ms) in values {
            if let Some(mean) = filter.offer(v, Millis(at_ms)) {
                out.push(mean).ok();
            }
        }
        out
    }

    #[test]
    fn window_mean_is_the_candidate() {
        let mut filter = SampleFilter::new(FilterParams::new(4, 600, 0.0));
        let out = feed(
            &mut filter,
            &[(1.0, 0), (2.0, 1_000), (3.0, 2_000), (6.0, 3_000)],
        );
        assert_eq!(out.as_slice(), &[3.0]);
    }

    #[test]
    fn deadband_suppresses_until_heartbeat() {
        // smoothInterval 4, pollTime 30 s, eps 0.5, seeded with 20.0 at t=0,
        // one raw sample every 2 s.
        let params = FilterParams::new(4, 30, 0.5);
        let mut filter = SampleFilter::with_last(params, 20.0, Millis(0));

        // First window means 20.3 at t=8s: inside deadband, younger than 30s.
        for (i, v) in [20.2, 20.3, 20.3, 20.4].iter().enumerate() {
            let t = Millis(2_000 * (i as u32 + 1));
            assert_eq!(filter.offer(*v, t), None);
        }

        // Second window means 20.6 at t=16s: deadband exceeded.
        for (i, v) in [20.5, 20.6, 20.6, 20.7].iter().enumerate() {
            let t = Millis(8_000 + 2_000 * (i as u32 + 1));
            let got = filter.offer(*v, t);
            if i < 3 {
                assert_eq!(got, None);
            } else {
                let mean = got.expect("deadband exceeded, window must publish");
                assert!((mean - 20.6).abs() < 1e-4);
            }
        }

        // Windows at t=24s and t=32s sit inside the deadband and under 30s
        // of publication age; the one at t=48s crosses the heartbeat.
        let mut published = heapless::Vec::<(f32, u32), 8>::new();
        for w in 0..4u32 {
            for i in 0..4u32 {
                let t = Millis(16_000 + 8_000 * w + 2_000 * (i + 1));
                if let Some(mean) = filter.offer(20.5, t) {
                    published.push((mean, t.0)).ok();
                }
            }
        }
        assert_eq!(published.as_slice(), &[(20.5, 48_000)]);
    }

    #[test]
    fn first_window_after_reconfiguration_always_publishes() {
        let mut filter =
            SampleFilter::with_last(FilterParams::new(1, 600, 10.0), 20.0, Millis(0));
        // Inside the deadband: suppressed.
        assert_eq!(filter.offer(20.1, Millis(1_000)), None);

        filter.set_params(FilterMode::Fast.params(10.0));
        // Same value, fresh state: published.
        assert_eq!(filter.offer(20.1, Millis(2_000)), Some(20.1));
    }

    #[test]
    fn heartbeat_survives_counter_wrap() {
        let params = FilterParams::new(1, 30, 5.0);
        let near_wrap = Millis(u32::MAX - 10_000);
        let mut filter = SampleFilter::with_last(params, 20.0, near_wrap);

        // 20s after the seed, 10s of which lie past the wrap: still young.
        assert_eq!(filter.offer(20.0, Millis(9_999)), None);
        // 31s after the seed: heartbeat fires.
        assert_eq!(filter.offer(20.0, Millis(20_999)), Some(20.0));
    }

    #[test]
    fn zero_smooth_interval_behaves_like_one() {
        let mut filter = SampleFilter::new(FilterParams::new(0, 600, 0.0));
        assert_eq!(filter.offer(5.0, Millis(0)), Some(5.0));
    }

    #[test]
    fn mode_spellings_round_trip() {
        for mode in [FilterMode::Fast, FilterMode::Medium, FilterMode::Longterm] {
            assert_eq!(FilterMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(FilterMode::parse("longterm"), Some(FilterMode::Longterm));
        assert_eq!(FilterMode::parse("slow"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// With eps 0 every completed window publishes: one message per
            /// `smooth_interval` samples, no matter the data.
            #[test]
            fn zero_deadband_publishes_every_window(
                values in proptest::collection::vec(-100.0f32..100.0, 1..64),
                smooth in 1u16..8,
            ) {
                let mut filter = SampleFilter::new(FilterParams::new(smooth, 600, 0.0));
                let mut published = 0usize;
                for (i, v) in values.iter().enumerate() {
                    if filter.offer(*v, Millis(i as u32 * 1_000)).is_some() {
                        published += 1;
                    }
                }
                prop_assert_eq!(published, values.len() / smooth as usize);
            }

            /// A constant input is published at most once per heartbeat
            /// (plus the initial announcement).
            #[test]
            fn constant_input_settles_to_heartbeat_rate(
                value in -50.0f32..50.0,
                samples in 10usize..200,
            ) {
                let params = FilterParams::new(1, 30, 0.5);
                let mut filter = SampleFilter::new(params);
                let mut published = 0usize;
                // One sample every 2 seconds.
                for i in 0..samples {
                    if filter.offer(value, Millis(i as u32 * 2_000)).is_some() {
                        published += 1;
                    }
                }
                let span_s = (samples as u32 - 1) * 2;
                let heartbeats = (span_s / 30) as usize;
                prop_assert!(published <= heartbeats + 1);
                prop_assert!(published >= 1);
            }

            /// Liveness: whatever the data, a publication happens at least
            /// once per heartbeat interval worth of completed windows.
            #[test]
            fn no_silence_longer_than_heartbeat(
                values in proptest::collection::vec(-10.0f32..10.0, 40..120),
            ) {
                let params = FilterParams::new(1, 10, 1_000.0);
                let mut filter = SampleFilter::new(params);
                let mut last_published_at = None::<u32>;
                for (i, v) in values.iter().enumerate() {
                    let t = i as u32 * 2_000;
                    if filter.offer(*v, Millis(t)).is_some() {
                        if let Some(prev) = last_published_at {
                            prop_assert!(t - prev <= 12_000);
                        }
                        last_published_at = Some(t);
                    }
                }
                prop_assert!(last_published_at.is_some());
            }
        }
    }
}
