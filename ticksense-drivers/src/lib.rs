//! Sensor drivers for TickSense
//!
//! Each module implements [`ticksense_core::SensorLogic`] for one chip
//! family and nothing else: the lifecycle, filtering, command handling
//! and publishing all live in the runtime. A driver contributes
//!
//! - its channel list,
//! - the probe and configuration sequence (`begin`),
//! - the per-cycle measurement substeps,
//! - conversion from raw registers or frames to physical values.
//!
//! Register chips go through [`ticksense_core::RegisterBus`]; pulse-output
//! chips consume claimed edge slots instead. [`display`] is the odd one
//! out - a bus consumer that mirrors topics onto a panel rather than a
//! sensor.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod airq;
pub mod analog;
pub mod baro;
pub mod display;
pub mod gamma;
pub mod hygro;
pub mod light;
pub mod mag;
pub mod power;

// Public API
pub use airq::AirQuality;
pub use analog::{AdcReader, Analog, AnalogRole};
pub use baro::{Baro, BaroKind};
pub use display::{Display, DisplayPanel, DrawPrimitives, Glyphs, LayoutError, Mosaic, RowLayout};
pub use gamma::Gamma;
pub use hygro::Hygro;
pub use light::Light;
pub use mag::{MagFamily, Magnetometer};
pub use power::{PowerMeter, PowerScale};

/// Crate version, straight from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
