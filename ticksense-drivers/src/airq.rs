//! Air Quality Sensor
//!
//! Metal-oxide gas sensor with an on-chip algorithm that reports an
//! equivalent CO₂ estimate (ppm) and a total VOC estimate (ppb). The chip
//! boots into a bootloader; `begin` verifies a valid application image is
//! present, starts it, and switches to the one-second drive mode. A chip
//! without a valid image is reported as [`SensorError::FirmwareInvalid`]
//! and never polled further - there is nothing the runtime could retry.
//!
//! The chip free-runs in its drive mode, so a measurement cycle issues no
//! start command; readiness comes from the status register, and the result
//! is one burst read of the algorithm output, which carries its own status
//! and error bytes.
//!
//! Both gas estimates pass the plausibility gates before publishing. The
//! algorithm never reports below the fresh-air baseline; a value outside
//! the gates means the conditioning period is still running or the chip is
//! mid-fault, and the cycle is silently dropped.

use embedded_hal::i2c::I2c;

use ticksense_core::constants::limits::{CO2_GATE, VOC_GATE};
use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{Reading, Readings, SensorLogic};
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;
use ticksense_core::transport::RegisterBus;

// Register map.
const REG_STATUS: u8 = 0x00;
const REG_MEAS_MODE: u8 = 0x01;
const REG_ALG_RESULT: u8 = 0x02;
const REG_HW_ID: u8 = 0x20;
const REG_ERROR_ID: u8 = 0xe0;
const REG_APP_START: u8 = 0xf4;

const HW_ID: u8 = 0x81;

// Status bits.
const STATUS_FW_MODE: u8 = 0x80;
const STATUS_APP_VALID: u8 = 0x10;
const STATUS_DATA_READY: u8 = 0x08;
const STATUS_ERROR: u8 = 0x01;

/// Constant power mode, one measurement per second.
const MEAS_MODE_1S: u8 = 0x10;

const ALG_RESULT_LEN: usize = 8;

const CHANNELS: &[Channel] = &[Channel::Co2, Channel::Voc];

/// Air quality driver on the shared register bus.
pub struct AirQuality<I2C> {
    bus: RegisterBus<I2C>,
}

impl<I2C: I2c> AirQuality<I2C> {
    /// Driver at `address`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
        }
    }

    /// Hand the HAL instance back (tests use this to finalize mocks).
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    /// Read the error id register after the status flagged a fault.
    fn device_fault(&mut self) -> SensorError {
        match self.bus.read_byte(REG_ERROR_ID) {
            Ok(code) => SensorError::DeviceFault { code },
            Err(err) => err.into(),
        }
    }
}

impl<I2C: I2c> SensorLogic for AirQuality<I2C> {
    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn begin(&mut self) -> SensorResult<()> {
        self.bus.check_address()?;
        let found = self.bus.read_byte(REG_HW_ID)?;
        if found != HW_ID {
            return Err(TransportError::WrongHardwareAtAddress {
                address: self.bus.address(),
                expected: HW_ID,
                found,
            }
            .into());
        }

        let status = self.bus.read_byte(REG_STATUS)?;
        if status & STATUS_APP_VALID == 0 {
            return Err(SensorError::FirmwareInvalid { status });
        }

        // Bare register strobe boots the application image.
        self.bus.write_command(REG_APP_START)?;
        let status = self.bus.read_byte(REG_STATUS)?;
        if status & STATUS_FW_MODE == 0 {
            return Err(SensorError::FirmwareInvalid { status });
        }

        self.bus.write_byte(REG_MEAS_MODE, MEAS_MODE_1S)?;
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        // The drive mode free-runs; there is nothing to kick off.
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        let status = self.bus.read_byte(REG_STATUS).map_err(SensorError::from)?;
        if status & STATUS_ERROR != 0 {
            return Err(nb::Error::Other(self.device_fault()));
        }
        if status & STATUS_DATA_READY == 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        let mut raw = [0u8; ALG_RESULT_LEN];
        self.bus.read_bytes(REG_ALG_RESULT, &mut raw)?;

        // The burst carries its own status/error pair; trust it over the
        // readiness poll, the chip may have faulted in between.
        let status = raw[4];
        if status & STATUS_ERROR != 0 {
            return Err(SensorError::DeviceFault { code: raw[5] });
        }

        let co2 = f32::from(u16::from_be_bytes([raw[0], raw[1]]));
        let voc = f32::from(u16::from_be_bytes([raw[2], raw[3]]));

        if CO2_GATE.accepts(co2) {
            let _ = out.push(Reading {
                channel: Channel::Co2,
                value: co2,
            });
        }
        if VOC_GATE.accepts(voc) {
            let _ = out.push(Reading {
                channel: Channel::Voc,
                value: voc,
            });
        }
        Ok(())
    }

    fn base_eps(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Co2 => 10.0,
            Channel::Voc => 5.0,
            _ => 0.1,
        }
    }
}
