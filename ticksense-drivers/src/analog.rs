//! Generic Analog Inputs
//!
//! Voltage-divider sensors (soil probes, rain boards, trimmer-set
//! thresholds) share one driver: read a millivolt value from whatever
//! ADC the platform provides, normalize it into the unit interval and
//! publish it on a role-specific channel. Consumers get a dimensionless
//! wetness or level and calibrate meaning on their side.
//!
//! The ADC itself stays behind [`AdcReader`], because the conversion
//! path differs per target (built-in SAR, external delta-sigma chip, a
//! mock in tests) while everything above it does not.
//!
//! Rain boards read *low* when wet, so their normalization is inverted
//! at construction rather than patched by every consumer.

use ticksense_core::errors::{SensorError, SensorResult};
use ticksense_core::fsm::{Reading, Readings, SensorLogic};
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;

/// One ADC conversion path.
pub trait AdcReader {
    /// Run one conversion and return the result in millivolts.
    fn read_millivolts(&mut self) -> SensorResult<u32>;
}

/// What the divider measures, deciding channel and polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogRole {
    /// Uncommitted analog input, published as-is.
    Generic,
    /// Rain board; inverted so 1.0 means wet.
    Rain,
}

impl AnalogRole {
    fn channel(self) -> Channel {
        match self {
            Self::Generic => Channel::UnitAnalogSensor,
            Self::Rain => Channel::UnitRain,
        }
    }

    fn inverted(self) -> bool {
        matches!(self, Self::Rain)
    }
}

/// Normalized analog input behind an [`AdcReader`].
pub struct Analog<A> {
    adc: A,
    role: AnalogRole,
    full_scale_mv: u32,
}

impl<A: AdcReader> Analog<A> {
    /// Driver for `role` with the divider's full-scale millivolt value.
    pub fn new(adc: A, role: AnalogRole, full_scale_mv: u32) -> Self {
        Self {
            adc,
            role,
            full_scale_mv: full_scale_mv.max(1),
        }
    }

    /// Hand the ADC back (tests use this to inspect stubs).
    pub fn release(self) -> A {
        self.adc
    }
}

impl<A: AdcReader> SensorLogic for Analog<A> {
    fn channels(&self) -> &'static [Channel] {
        match self.role {
            AnalogRole::Generic => &[Channel::UnitAnalogSensor],
            AnalogRole::Rain => &[Channel::UnitRain],
        }
    }

    fn begin(&mut self) -> SensorResult<()> {
        // One throwaway conversion proves the path works.
        let _ = self.adc.read_millivolts()?;
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        Ok(())
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        let mv = self.adc.read_millivolts()?;
        let mut unit = (mv as f32 / self.full_scale_mv as f32).clamp(0.0, 1.0);
        if self.role.inverted() {
            unit = 1.0 - unit;
        }
        let _ = out.push(Reading {
            channel: self.role.channel(),
            value: unit,
        });
        Ok(())
    }

    fn base_eps(&self, _channel: Channel) -> f32 {
        0.01
    }
}
