//! Physical Plausibility Gates
//!
//! A reading that passes the transport intact can still be electrically
//! plausible nonsense - a power meter glitching to 12 kW, a mains voltage
//! of 30 V. Each driver runs its raw values through a [`RangeGate`] before
//! they reach the filters; rejected values are simply dropped from the
//! cycle, they are neither published nor counted as failures.
//!
//! Gates are closed intervals. A lower bound above zero doubles as a dead
//! band: the mains voltage gate starts at 100 V because anything below that
//! is a disconnected input, not a measurement.

/// Closed acceptance interval for one physical quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeGate {
    min: f32,
    max: f32,
}

impl RangeGate {
    /// Gate accepting `min..=max`.
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Lower bound.
    pub const fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound.
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Whether `value` is finite and inside the gate.
    pub fn accepts(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}
