//! Magnetometer
//!
//! One driver for the two 3-axis magnetometer families that ship on
//! otherwise identical breakout boards. They differ in nearly every
//! detail that matters to software:
//!
//! | | single-shot family | continuous family |
//! |---|---|---|
//! | identification | 'H' in ID register A | fixed 0xff chip id |
//! | drive model | one conversion per mode write | free-running |
//! | data order | X, Z, Y | X, Y, Z |
//! | endianness | big | little |
//! | sensitivity | 1090 LSB/Gauss | 12000 LSB/Gauss |
//!
//! The family is picked at construction (the two live at different bus
//! addresses, so the wiring decides). Axis values are published in µT;
//! the total field strength is derived as the Euclidean norm so that a
//! consumer can watch for disturbances without caring about orientation.
//!
//! The single-shot family reports -4096 on an axis that saturated the
//! ADC. Such a cycle carries no usable vector and is dropped whole.

use embedded_hal::i2c::I2c;
use libm::sqrtf;

use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{Reading, Readings, SensorLogic};
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;
use ticksense_core::transport::RegisterBus;

// ===== SINGLE-SHOT FAMILY =====

const SS_REG_CONFIG_A: u8 = 0x00;
const SS_REG_CONFIG_B: u8 = 0x01;
const SS_REG_MODE: u8 = 0x02;
const SS_REG_DATA: u8 = 0x03;
const SS_REG_STATUS: u8 = 0x09;
const SS_REG_ID_A: u8 = 0x0a;

/// ID register A content, ASCII 'H'.
const SS_CHIP_ID: u8 = 0x48;

/// 8-sample averaging, 15 Hz nominal rate, normal bias.
const SS_CONFIG_A_VALUE: u8 = 0x70;

/// ±1.3 Gauss range.
const SS_CONFIG_B_VALUE: u8 = 0x20;

/// Kick off exactly one conversion.
const SS_MODE_SINGLE: u8 = 0x01;

const SS_STATUS_READY: u8 = 0x01;

/// ADC saturation sentinel.
const SS_OVERFLOW: i16 = -4096;

const SS_LSB_PER_GAUSS: f32 = 1090.0;

// ===== CONTINUOUS FAMILY =====

const CT_REG_DATA: u8 = 0x00;
const CT_REG_STATUS: u8 = 0x06;
const CT_REG_CONTROL: u8 = 0x09;
const CT_REG_PERIOD: u8 = 0x0b;
const CT_REG_CHIP_ID: u8 = 0x0d;

const CT_CHIP_ID: u8 = 0xff;

/// Continuous mode, 50 Hz, ±2 Gauss, oversampling 512.
const CT_CONTROL_VALUE: u8 = 0x05;

/// Set/reset period recommended by the datasheet.
const CT_PERIOD_VALUE: u8 = 0x01;

const CT_STATUS_READY: u8 = 0x01;

const CT_LSB_PER_GAUSS: f32 = 12000.0;

const CHANNELS: &[Channel] = &[
    Channel::MagneticFieldX,
    Channel::MagneticFieldY,
    Channel::MagneticFieldZ,
    Channel::MagneticFieldStrength,
];

/// Which register map and drive model the wired part speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagFamily {
    /// One conversion per mode-register write.
    SingleShot,
    /// Free-running after configuration.
    Continuous,
}

/// 3-axis magnetometer driver on the shared register bus.
pub struct Magnetometer<I2C> {
    bus: RegisterBus<I2C>,
    family: MagFamily,
}

impl<I2C: I2c> Magnetometer<I2C> {
    /// Driver for `family` at `address`.
    pub fn new(i2c: I2C, address: u8, family: MagFamily) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            family,
        }
    }

    /// Hand the HAL instance back (tests use this to finalize mocks).
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    fn lsb_per_gauss(&self) -> f32 {
        match self.family {
            MagFamily::SingleShot => SS_LSB_PER_GAUSS,
            MagFamily::Continuous => CT_LSB_PER_GAUSS,
        }
    }

    /// Raw counts to µT (1 Gauss = 100 µT).
    fn microtesla(&self, raw: i16) -> f32 {
        f32::from(raw) * 100.0 / self.lsb_per_gauss()
    }
}

impl<I2C: I2c> SensorLogic for Magnetometer<I2C> {
    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn begin(&mut self) -> SensorResult<()> {
        self.bus.check_address()?;
        let (id_register, expected) = match self.family {
            MagFamily::SingleShot => (SS_REG_ID_A, SS_CHIP_ID),
            MagFamily::Continuous => (CT_REG_CHIP_ID, CT_CHIP_ID),
        };
        let found = self.bus.read_byte(id_register)?;
        if found != expected {
            return Err(TransportError::WrongHardwareAtAddress {
                address: self.bus.address(),
                expected,
                found,
            }
            .into());
        }
        match self.family {
            MagFamily::SingleShot => {
                self.bus.write_byte_checked(SS_REG_CONFIG_A, SS_CONFIG_A_VALUE)?;
                self.bus.write_byte_checked(SS_REG_CONFIG_B, SS_CONFIG_B_VALUE)?;
            }
            MagFamily::Continuous => {
                self.bus.write_byte(CT_REG_PERIOD, CT_PERIOD_VALUE)?;
                self.bus.write_byte_checked(CT_REG_CONTROL, CT_CONTROL_VALUE)?;
            }
        }
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        match self.family {
            MagFamily::SingleShot => {
                self.bus
                    .write_byte(SS_REG_MODE, SS_MODE_SINGLE)
                    .map_err(SensorError::from)?;
            }
            MagFamily::Continuous => {} // free-running
        }
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        let (status_register, ready_bit) = match self.family {
            MagFamily::SingleShot => (SS_REG_STATUS, SS_STATUS_READY),
            MagFamily::Continuous => (CT_REG_STATUS, CT_STATUS_READY),
        };
        let status = self
            .bus
            .read_byte(status_register)
            .map_err(SensorError::from)?;
        if status & ready_bit == 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        let mut raw = [0u8; 6];
        let data_register = match self.family {
            MagFamily::SingleShot => SS_REG_DATA,
            MagFamily::Continuous => CT_REG_DATA,
        };
        self.bus.read_bytes(data_register, &mut raw)?;

        let (x, y, z) = match self.family {
            MagFamily::SingleShot => {
                let x = i16::from_be_bytes([raw[0], raw[1]]);
                let z = i16::from_be_bytes([raw[2], raw[3]]);
                let y = i16::from_be_bytes([raw[4], raw[5]]);
                if x == SS_OVERFLOW || y == SS_OVERFLOW || z == SS_OVERFLOW {
                    // Saturated axis, no usable vector this cycle.
                    return Ok(());
                }
                (x, y, z)
            }
            MagFamily::Continuous => {
                let x = i16::from_le_bytes([raw[0], raw[1]]);
                let y = i16::from_le_bytes([raw[2], raw[3]]);
                let z = i16::from_le_bytes([raw[4], raw[5]]);
                (x, y, z)
            }
        };

        let x = self.microtesla(x);
        let y = self.microtesla(y);
        let z = self.microtesla(z);
        let strength = sqrtf(x * x + y * y + z * z);

        let _ = out.push(Reading {
            channel: Channel::MagneticFieldX,
            value: x,
        });
        let _ = out.push(Reading {
            channel: Channel::MagneticFieldY,
            value: y,
        });
        let _ = out.push(Reading {
            channel: Channel::MagneticFieldZ,
            value: z,
        });
        let _ = out.push(Reading {
            channel: Channel::MagneticFieldStrength,
            value: strength,
        });
        Ok(())
    }

    fn base_eps(&self, _channel: Channel) -> f32 {
        0.3
    }
}
