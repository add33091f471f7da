//! System-Wide Constants
//!
//! Shared numeric constants, grouped by concern. Per-chip register maps do
//! not live here - those belong to the driver that owns the chip. What does
//! live here is everything two or more modules must agree on: bus addresses
//! the drivers claim, scheduling defaults the runtime applies, pulse timing
//! windows the interrupt decoder enforces, and the plausibility gates.

pub mod addresses;
pub mod limits;
pub mod protocol;
pub mod timing;
