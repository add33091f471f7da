//! Single-Wire Pulse Protocol Timing
//!
//! Nominal pulse widths and tolerance for the edge-timed single-wire frame
//! (see [`crate::pulse::single_wire`]). All values are microseconds.
//!
//! The protocol, as seen from the line:
//!
//! ```text
//! host  ──80µs low──┐
//! sensor            └─80µs low─┬─80µs high─┐ per bit: ┌─50µs low─┬─26..28µs high─ = 0
//!                              │           │          │          └─70µs high───── = 1
//!                    reply     └── ack ────┘          └ intro
//! ```
//!
//! Forty bits follow MSB-first: humidity high/low, temperature high/low,
//! checksum.

/// Width of the host's start pulse (line driven low by the host).
pub const HOST_START_LOW_US: u32 = 80;

/// Width of the sensor's reply pulse (line driven low by the sensor).
pub const REPLY_LOW_US: u32 = 80;

/// Width of the sensor's acknowledge pulse (line high) before the first bit.
pub const REPLY_ACK_HIGH_US: u32 = 80;

/// Width of the low intro pulse preceding every data bit.
pub const BIT_INTRO_LOW_US: u32 = 50;

/// Nominal high width encoding a zero bit (datasheets give 26-28 µs).
pub const BIT_ZERO_HIGH_US: u32 = 27;

/// Nominal high width encoding a one bit.
pub const BIT_ONE_HIGH_US: u32 = 70;

/// Accepted deviation from any nominal width.
pub const PULSE_TOLERANCE_US: u32 = 10;

/// Bits per frame.
pub const FRAME_BITS: u8 = 40;

/// Bytes per frame (four payload bytes plus checksum).
pub const FRAME_BYTES: usize = 5;

/// Whether a measured width is within tolerance of a nominal width.
#[inline]
pub const fn within(dt_us: u32, nominal_us: u32) -> bool {
    let lo = nominal_us.saturating_sub(PULSE_TOLERANCE_US);
    let hi = nominal_us + PULSE_TOLERANCE_US;
    dt_us >= lo && dt_us <= hi
}
