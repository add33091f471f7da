//! Bus Addresses
//!
//! 7-bit I²C addresses of the supported register-oriented chips. Most parts
//! expose a strap pin selecting between two addresses; both are listed and
//! the driver takes the wired one at construction.

// ===== BAROMETRIC / TPH FAMILY =====

/// TPH sensor, address strap low.
pub const BARO_PRIMARY: u8 = 0x76;

/// TPH sensor, address strap high.
pub const BARO_SECONDARY: u8 = 0x77;

// ===== AMBIENT LIGHT =====

/// Light sensor, address pin floating.
pub const LIGHT_FLOAT: u8 = 0x39;

/// Light sensor, address pin to ground.
pub const LIGHT_LOW: u8 = 0x29;

/// Light sensor, address pin to VDD.
pub const LIGHT_HIGH: u8 = 0x49;

// ===== AIR QUALITY =====

/// Air quality sensor, address strap low.
pub const AIRQ_PRIMARY: u8 = 0x5a;

/// Air quality sensor, address strap high.
pub const AIRQ_SECONDARY: u8 = 0x5b;

// ===== GAMMA COUNTER =====

/// Counting-tube interface board.
pub const GAMMA: u8 = 0x18;

// ===== MAGNETOMETERS =====

/// Magnetometer, single-shot family (big-endian data registers).
pub const MAG_SINGLE_SHOT: u8 = 0x1e;

/// Magnetometer, continuous family (little-endian data registers).
pub const MAG_CONTINUOUS: u8 = 0x0d;

// ===== STATUS PANEL =====

/// Monochrome panel controller mirroring selected topics.
pub const DISPLAY: u8 = 0x3c;
