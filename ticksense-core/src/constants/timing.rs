//! Scheduling Defaults
//!
//! Timing constants for the cooperative acquisition loop and the sensor
//! lifecycle FSM. Everything here is a default; per-sensor configuration
//! overrides where it makes sense.

// ===== ACQUISITION LOOP =====

/// Nominal spacing of runtime ticks, ms.
///
/// The loop is cooperative: each tick performs at most one bus transaction
/// and one phase transition, then yields. No phase handler may block for
/// more than about a millisecond.
pub const BASE_TICK_MS: u32 = 50;

/// Default measurement cycle spacing, ms.
pub const DEFAULT_POLL_RATE_MS: u32 = 10_000;

/// Default upper bound on a conversion wait before the cycle is dropped, ms.
pub const CONVERSION_TIMEOUT_MS: u32 = 2_000;

// ===== FAILURE POLICY =====

/// Consecutive soft failures before the sensor enters its cooldown.
pub const FAILURE_THRESHOLD: u8 = 10;

/// Cooldown spent in the error-wait phase before re-initialization, ms.
pub const ERROR_WAIT_MS: u32 = 5_000;

// ===== PULSE FREQUENCY SAMPLING =====

/// Minimum window length for a frequency estimate, µs.
///
/// Shorter windows carry too few edges for a stable quotient and are
/// discarded when sampled.
pub const FREQ_MIN_WINDOW_US: u32 = 100_000;

/// Microseconds per second, halved: one output cycle contributes two edges,
/// so `edges * EDGE_FREQ_SCALE / window_us` is a frequency in Hz.
pub const EDGE_FREQ_SCALE: f32 = 500_000.0;

// ===== HARDWARE WATCHDOGS =====

/// Watchdog allowance right after (re-)initialization, ms. Counting tubes
/// need a high-voltage supply to stabilize before the first pulses arrive.
pub const GAMMA_WATCHDOG_STARTUP_MS: u32 = 180_000;

/// Watchdog allowance during normal operation, ms.
pub const GAMMA_WATCHDOG_RUNTIME_MS: u32 = 900_000;
