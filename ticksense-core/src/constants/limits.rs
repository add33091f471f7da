//! Plausibility Limits
//!
//! Acceptance gates for quantities where hardware glitches produce readings
//! that are numerically valid but physically absurd. Values outside a gate
//! are dropped before filtering; see [`crate::plausibility`].

use crate::plausibility::RangeGate;

// ===== POWER METERING =====

/// Active power, W. Domestic circuits top out around 16 A × 240 V.
pub const POWER_GATE: RangeGate = RangeGate::new(0.0, 3_800.0);

/// Mains voltage, V. The lower bound is a dead band: below 100 V the input
/// is disconnected, not measuring.
pub const VOLTAGE_GATE: RangeGate = RangeGate::new(100.0, 260.0);

/// Current, A.
pub const CURRENT_GATE: RangeGate = RangeGate::new(0.0, 16.0);

// ===== ENVIRONMENT =====

/// Air temperature, °C, for pulse-line hygrometers.
pub const TEMPERATURE_GATE: RangeGate = RangeGate::new(-40.0, 80.0);

/// Relative humidity, %.
pub const HUMIDITY_GATE: RangeGate = RangeGate::new(0.0, 100.0);

/// Equivalent CO₂ estimate, ppm. The sensor's algorithm never reports
/// below fresh-air baseline.
pub const CO2_GATE: RangeGate = RangeGate::new(400.0, 8_192.0);

/// Total VOC estimate, ppb.
pub const VOC_GATE: RangeGate = RangeGate::new(0.0, 1_187.0);
