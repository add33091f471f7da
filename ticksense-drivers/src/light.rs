//! Ambient Light Sensor
//!
//! Two-channel photodiode chip (broadband + infrared) behind the register
//! transport. Lux is derived from the channel ratio with the
//! manufacturer's piecewise formula; alongside the lux value the driver
//! publishes a logarithmically normalized unit value in `[0, 1]`, which is
//! what brightness-reactive consumers (displays, dimmers) actually want.
//!
//! ## Acquisition
//!
//! The chip free-runs once powered: it integrates continuously and latches
//! the last completed conversion into the data registers. A measurement
//! cycle therefore issues no start command; it waits one integration
//! period (plus margin) and reads both channel words. The integration time
//! code doubles as the oversampling setting (`0` = 13.7 ms, `1` = 101 ms,
//! `2` = 402 ms); gain stays at 1x and is folded into the count scaling.
//!
//! Saturated counts are dropped for the cycle instead of being published -
//! a clipped channel makes the ratio, and with it the lux value, a lie.

use embedded_hal::i2c::I2c;
use libm::{logf, powf};

use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{Reading, Readings, SensorLogic};
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;
use ticksense_core::transport::RegisterBus;

// Register map. Every access sets the command bit; word reads add the
// word-protocol bit so the chip serves both bytes in one transaction.
const CMD: u8 = 0x80;
const CMD_WORD: u8 = 0x80 | 0x20;
const REG_CONTROL: u8 = 0x00;
const REG_TIMING: u8 = 0x01;
const REG_ID: u8 = 0x0a;
const REG_DATA0: u8 = 0x0c;
const REG_DATA1: u8 = 0x0e;

const POWER_ON: u8 = 0x03;

/// Upper nibble of the id register identifies the family.
const FAMILY_MASK: u8 = 0xf0;
const FAMILY_ID: u8 = 0x50;

/// Integration period per timing code, ms.
const INTEGRATION_MS: [u32; 3] = [14, 101, 402];

/// Count scaling to the reference integration (402 ms), per timing code.
const SCALE_TO_REF: [f32; 3] = [29.34, 3.98, 1.0];

/// Gain stays at 1x; the lux formula is calibrated for 16x.
const GAIN_SCALE: f32 = 16.0;

/// Counts at or above this clip for the respective timing code.
const CLIP_AT: [u16; 3] = [5_047, 37_177, 65_535];

/// Lux level treated as "fully bright" by the unit normalization.
const LUX_CEILING: f32 = 40_000.0;

const CHANNELS: &[Channel] = &[Channel::Illuminance, Channel::UnitIlluminance];

/// Piecewise lux approximation from the two scaled channel counts.
///
/// `None` when a channel is clipped for the given timing code.
fn lux_from_counts(ch0: u16, ch1: u16, timing_code: u8) -> Option<f32> {
    let code = usize::from(timing_code.min(2));
    if ch0 >= CLIP_AT[code] || ch1 >= CLIP_AT[code] {
        return None;
    }
    if ch0 == 0 {
        return Some(0.0);
    }

    let scale = SCALE_TO_REF[code] * GAIN_SCALE;
    let broadband = f32::from(ch0) * scale;
    let infrared = f32::from(ch1) * scale;
    let ratio = infrared / broadband;

    let lux = if ratio <= 0.50 {
        0.030_4 * broadband - 0.062 * broadband * powf(ratio, 1.4)
    } else if ratio <= 0.61 {
        0.022_4 * broadband - 0.031 * infrared
    } else if ratio <= 0.80 {
        0.012_8 * broadband - 0.015_3 * infrared
    } else if ratio <= 1.30 {
        0.001_46 * broadband - 0.001_12 * infrared
    } else {
        0.0
    };
    Some(lux.max(0.0))
}

/// Logarithmic brightness normalization into `[0, 1]`.
fn unit_illuminance(lux: f32) -> f32 {
    (logf(1.0 + lux) / logf(1.0 + LUX_CEILING)).clamp(0.0, 1.0)
}

/// Ambient light driver on the shared register bus.
pub struct Light<I2C> {
    bus: RegisterBus<I2C>,
    timing_code: u8,
    timing_dirty: bool,
}

impl<I2C: I2c> Light<I2C> {
    /// Driver at `address` with the longest integration period.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            timing_code: 2,
            timing_dirty: false,
        }
    }

    /// Hand the HAL instance back (tests use this to finalize mocks).
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    fn integration_ms(&self) -> u32 {
        INTEGRATION_MS[usize::from(self.timing_code.min(2))]
    }
}

impl<I2C: I2c> SensorLogic for Light<I2C> {
    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn begin(&mut self) -> SensorResult<()> {
        self.bus.check_address()?;
        let found = self.bus.read_byte(CMD | REG_ID)?;
        if found & FAMILY_MASK != FAMILY_ID {
            return Err(TransportError::WrongHardwareAtAddress {
                address: self.bus.address(),
                expected: FAMILY_ID,
                found,
            }
            .into());
        }
        self.bus.write_byte(CMD | REG_CONTROL, POWER_ON)?;
        self.bus.write_byte(CMD | REG_TIMING, self.timing_code)?;
        self.timing_dirty = false;
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        if self.timing_dirty {
            self.bus
                .write_byte(CMD | REG_TIMING, self.timing_code)
                .map_err(SensorError::from)?;
            self.timing_dirty = false;
            // The running integration still uses the old period; wait out
            // a full cycle under the new one before trusting the counts.
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn data_ready(&mut self, waited_ms: u32) -> nb::Result<(), SensorError> {
        // No status register; one integration period plus 20 % margin.
        let ms = self.integration_ms();
        if waited_ms >= ms + ms / 5 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        let ch0 = self.bus.read_word_le(CMD_WORD | REG_DATA0)?;
        let ch1 = self.bus.read_word_le(CMD_WORD | REG_DATA1)?;

        if let Some(lux) = lux_from_counts(ch0, ch1, self.timing_code) {
            let _ = out.push(Reading {
                channel: Channel::Illuminance,
                value: lux,
            });
            let _ = out.push(Reading {
                channel: Channel::UnitIlluminance,
                value: unit_illuminance(lux),
            });
        }
        Ok(())
    }

    fn base_eps(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Illuminance => 1.0,
            Channel::UnitIlluminance => 0.004,
            _ => 0.1,
        }
    }

    fn oversampling(&self) -> Option<u8> {
        Some(self.timing_code)
    }

    /// The value is the chip's integration time code, `0..=2`.
    fn set_oversampling(&mut self, ratio: u8) -> SensorResult<bool> {
        if ratio > 2 {
            return Ok(false);
        }
        if ratio != self.timing_code {
            self.timing_code = ratio;
            self.timing_dirty = true;
        }
        Ok(true)
    }
}
