//! Wrapping Tick Clocks
//!
//! ## Time Model
//!
//! Firmware ports expose two free-running counters: a microsecond tick for
//! pulse timing and a millisecond tick for scheduling. Both are raw `u32`
//! values straight off the hardware, so they wrap - the microsecond counter
//! after about 71.6 minutes, the millisecond counter after about 49.7 days.
//!
//! Nothing in this crate compares stamps with `<` or `>`. All age checks go
//! through [`Micros::elapsed_since`] / [`Millis::elapsed_since`], which use
//! modular subtraction and therefore stay correct across a counter wrap as
//! long as the measured interval is shorter than half the counter period.
//! Scheduling intervals here top out at minutes, far inside that bound.
//!
//! ## Sources
//!
//! The [`Clock`] trait is the seam between this crate and the platform.
//! Ports implement it over their tick counters; hosts and tests use
//! [`FixedClock`], which only moves when told to and can be positioned just
//! below a wrap boundary to exercise the modular arithmetic.

/// Microsecond tick stamp from a free-running, wrapping 32-bit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Micros(pub u32);

/// Millisecond tick stamp from a free-running, wrapping 32-bit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Millis(pub u32);

impl Micros {
    /// Microseconds elapsed since `earlier`, correct across counter wrap.
    #[inline]
    pub fn elapsed_since(self, earlier: Micros) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Stamp shifted backwards, used to make an interval due immediately.
    #[inline]
    pub fn rewound_by(self, us: u32) -> Micros {
        Micros(self.0.wrapping_sub(us))
    }
}

impl Millis {
    /// Milliseconds elapsed since `earlier`, correct across counter wrap.
    #[inline]
    pub fn elapsed_since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Stamp shifted backwards, used to make an interval due immediately.
    #[inline]
    pub fn rewound_by(self, ms: u32) -> Millis {
        Millis(self.0.wrapping_sub(ms))
    }
}

/// Source of the two platform tick counters.
///
/// Implementations must be monotonic modulo wrap and cheap to call; the
/// acquisition loop reads the clock on every tick.
pub trait Clock {
    /// Current microsecond stamp.
    fn now_micros(&self) -> Micros;

    /// Current millisecond stamp.
    fn now_millis(&self) -> Millis;
}

/// Manually advanced clock for tests and host-side replay.
///
/// Keeps one internal microsecond count and derives both stamps from it, the
/// same way a port derives them from one timer. The internal count is 64-bit
/// so the derived 32-bit stamps wrap exactly like hardware counters do.
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    now_us: u64,
}

impl FixedClock {
    /// Clock starting at zero.
    pub const fn new() -> Self {
        Self { now_us: 0 }
    }

    /// Clock positioned at an arbitrary microsecond count.
    ///
    /// Handy for starting just below `u32::MAX` to cover wrap behavior.
    pub const fn at_micros(now_us: u64) -> Self {
        Self { now_us }
    }

    /// Move the clock forward by `us` microseconds.
    pub fn advance_micros(&mut self, us: u64) {
        self.now_us += us;
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance_millis(&mut self, ms: u64) {
        self.now_us += ms * 1_000;
    }
}

impl Clock for FixedClock {
    fn now_micros(&self) -> Micros {
        Micros(self.now_us as u32)
    }

    fn now_millis(&self) -> Millis {
        Millis((self.now_us / 1_000) as u32)
    }
}
