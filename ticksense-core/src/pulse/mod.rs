//! Edge-Timed Pulse Decoding
//!
//! Some sensors never touch the register bus: they signal entirely through
//! pulse timing on a GPIO line. The platform routes each such line's edge
//! interrupt into one of the decoders here, against a claimed
//! [`crate::slot::EdgeSlot`]:
//!
//! - [`single_wire`]: a 40-bit request/response frame where bit values are
//!   encoded in pulse widths. The interrupt advances a small state machine
//!   per edge; the task side collects the finished frame or the abort
//!   reason.
//! - [`freq`]: pure edge counting over a time window, for chips that encode
//!   a measurement as an output frequency. The task side samples and resets
//!   the window once per measurement cycle.
//!
//! Interrupt-side code does loads and stores only - the decoders follow the
//! single-writer protocol described in [`crate::slot`].

pub mod freq;
pub mod single_wire;
