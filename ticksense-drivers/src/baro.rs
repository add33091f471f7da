//! Barometric / TPH Sensor
//!
//! Combined pressure, temperature and (on the full variant) humidity chip
//! behind the register transport. Two family members share the register
//! map and the compensation math:
//!
//! - [`BaroKind::Tph`]: temperature, pressure, humidity (chip id `0x60`)
//! - [`BaroKind::PressureTemperature`]: no humidity path (chip id `0x58`)
//!
//! The driver is constructed for one kind; the probe in `begin` reads the
//! chip id and a mismatch is a permanent wrong-hardware fault. Swapping the
//! two family members silently would otherwise produce garbage humidity.
//!
//! ## Measurement
//!
//! Measurements run in forced mode: one conversion per command, chip back
//! to sleep afterwards. Starting a cycle is one register write (two when a
//! changed humidity oversampling must be staged first); completion is
//! polled through the status register's measuring bit; the result is an
//! eight byte burst read. Raw values go through the manufacturer's integer
//! compensation, keyed by the calibration block read once in `begin`.
//!
//! ## Derived Channels
//!
//! Sea-level pressure is derived from station pressure and the configured
//! reference altitude. When a zero point has been commanded
//! (`relativealtitude/set`), the driver also publishes altitude relative to
//! that zero and the altitude change per cycle.

use embedded_hal::i2c::I2c;
use libm::powf;

use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{CommandOutcome, Reading, Readings, SensorLogic};
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::{CalDump, Channel};
use ticksense_core::transport::RegisterBus;

use core::fmt::Write;

// Register map, shared across the family.
const REG_ID: u8 = 0xd0;
const REG_CTRL_HUM: u8 = 0xf2;
const REG_STATUS: u8 = 0xf3;
const REG_CTRL_MEAS: u8 = 0xf4;
const REG_CONFIG: u8 = 0xf5;
const REG_DATA: u8 = 0xf7;
const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H: u8 = 0xe1;

const CHIP_ID_TPH: u8 = 0x60;
const CHIP_ID_PT: u8 = 0x58;

const STATUS_MEASURING: u8 = 0x08;

/// Temperature ×1, pressure ×1, forced mode.
const CTRL_MEAS_FORCED: u8 = 0x25;

/// Standby and IIR filter off; irrelevant in forced mode but written once
/// so the register is in a known state.
const CONFIG_DEFAULT: u8 = 0x00;

const CALIB_TP_LEN: usize = 26;
const CALIB_H_LEN: usize = 7;

/// Atmospheric scale height constant of the barometric formula, m.
const BARO_SCALE_M: f32 = 44_330.0;

/// Standard sea-level pressure, hPa.
const SEA_LEVEL_HPA: f32 = 1_013.25;

const TPH_CHANNELS: &[Channel] = &[
    Channel::Temperature,
    Channel::Humidity,
    Channel::Pressure,
    Channel::PressureNn,
    Channel::RelativeAltitude,
    Channel::DeltaAltitude,
];

const PT_CHANNELS: &[Channel] = &[
    Channel::Temperature,
    Channel::Pressure,
    Channel::PressureNn,
    Channel::RelativeAltitude,
    Channel::DeltaAltitude,
];

/// Which family member is wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaroKind {
    /// Full variant with the humidity path.
    Tph,
    /// Pressure and temperature only.
    PressureTemperature,
}

impl BaroKind {
    fn chip_id(self) -> u8 {
        match self {
            Self::Tph => CHIP_ID_TPH,
            Self::PressureTemperature => CHIP_ID_PT,
        }
    }
}

/// Factory trim read from the chip's calibration block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
    h1: u8,
    h2: i16,
    h3: u8,
    h4: i16,
    h5: i16,
    h6: i8,
}

fn word(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

impl Calibration {
    fn parse_tp(buf: &[u8; CALIB_TP_LEN]) -> Self {
        Self {
            t1: word(buf, 0),
            t2: word(buf, 2) as i16,
            t3: word(buf, 4) as i16,
            p1: word(buf, 6),
            p2: word(buf, 8) as i16,
            p3: word(buf, 10) as i16,
            p4: word(buf, 12) as i16,
            p5: word(buf, 14) as i16,
            p6: word(buf, 16) as i16,
            p7: word(buf, 18) as i16,
            p8: word(buf, 20) as i16,
            p9: word(buf, 22) as i16,
            h1: buf[25],
            ..Self::default()
        }
    }

    /// The humidity block packs H4 and H5 into three bytes with a shared
    /// nibble in the middle.
    fn parse_h(&mut self, buf: &[u8; CALIB_H_LEN]) {
        self.h2 = word(buf, 0) as i16;
        self.h3 = buf[2];
        self.h4 = (i16::from(buf[3]) << 4) | i16::from(buf[4] & 0x0f);
        self.h5 = (i16::from(buf[5]) << 4) | i16::from(buf[4] >> 4);
        self.h6 = buf[6] as i8;
    }

    /// Manufacturer integer compensation; returns °C and the `t_fine`
    /// carrier the pressure and humidity paths need.
    fn compensate_temperature(&self, adc: i32) -> (f32, i32) {
        let t1 = i32::from(self.t1);
        let var1 = (((adc >> 3) - (t1 << 1)) * i32::from(self.t2)) >> 11;
        let var2 = (((((adc >> 4) - t1) * ((adc >> 4) - t1)) >> 12) * i32::from(self.t3)) >> 14;
        let t_fine = var1 + var2;
        let centi = (t_fine * 5 + 128) >> 8;
        (centi as f32 / 100.0, t_fine)
    }

    /// 64-bit fixed-point pressure compensation, result in hPa.
    ///
    /// `None` when the divisor degenerates to zero (all-zero trim, i.e. a
    /// chip that never got fused); publishing a garbage pressure would be
    /// worse than publishing none.
    fn compensate_pressure(&self, adc: i32, t_fine: i32) -> Option<f32> {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.p6);
        var2 += (var1 * i64::from(self.p5)) << 17;
        var2 += i64::from(self.p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.p3)) >> 8) + ((var1 * i64::from(self.p2)) << 12);
        var1 = (((1i64 << 47) + var1) * i64::from(self.p1)) >> 33;
        if var1 == 0 {
            return None;
        }
        let mut p = 1_048_576 - i64::from(adc);
        p = (((p << 31) - var2) * 3_125) / var1;
        var1 = (i64::from(self.p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(self.p8) * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (i64::from(self.p7) << 4);
        // Q24.8 pascal to hPa.
        Some(p as f32 / 25_600.0)
    }

    /// 32-bit fixed-point humidity compensation, result in %.
    fn compensate_humidity(&self, adc: i32, t_fine: i32) -> f32 {
        let v = t_fine - 76_800;
        let mut h = ((((adc << 14) - (i32::from(self.h4) << 20) - i32::from(self.h5) * v)
            + 16_384)
            >> 15)
            * (((((((v * i32::from(self.h6)) >> 10)
                * (((v * i32::from(self.h3)) >> 11) + 32_768))
                >> 10)
                + 2_097_152)
                * i32::from(self.h2)
                + 8_192)
                >> 14);
        h -= ((((h >> 15) * (h >> 15)) >> 7) * i32::from(self.h1)) >> 4;
        h = h.clamp(0, 419_430_400);
        (h >> 12) as f32 / 1_024.0
    }
}

/// Altitude above standard sea level for a station pressure, m.
fn altitude_m(pressure_hpa: f32) -> f32 {
    BARO_SCALE_M * (1.0 - powf(pressure_hpa / SEA_LEVEL_HPA, 0.190_3))
}

/// Station pressure reduced to sea level through the reference altitude.
fn sea_level_hpa(pressure_hpa: f32, reference_altitude_m: f32) -> f32 {
    pressure_hpa / powf(1.0 - reference_altitude_m / BARO_SCALE_M, 5.255)
}

/// Barometric/TPH driver on the shared register bus.
pub struct Baro<I2C> {
    bus: RegisterBus<I2C>,
    kind: BaroKind,
    calibration: Calibration,
    /// Humidity oversampling ratio (0 skips the humidity conversion).
    oversampling_ratio: u8,
    /// Changed oversampling must be restaged before the next conversion.
    hum_dirty: bool,
    reference_altitude_m: f32,
    /// Set by `relativealtitude/set`; consumed by the next good cycle.
    zero_pending: bool,
    zero_altitude_m: Option<f32>,
    last_relative_m: Option<f32>,
}

impl<I2C: I2c> Baro<I2C> {
    /// Driver for the full TPH variant.
    pub fn new_tph(i2c: I2C, address: u8) -> Self {
        Self::new(i2c, address, BaroKind::Tph)
    }

    /// Driver for the pressure/temperature variant.
    pub fn new_pressure_temperature(i2c: I2C, address: u8) -> Self {
        Self::new(i2c, address, BaroKind::PressureTemperature)
    }

    /// Driver for an explicit family member at `address`.
    pub fn new(i2c: I2C, address: u8, kind: BaroKind) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            kind,
            calibration: Calibration::default(),
            oversampling_ratio: 1,
            hum_dirty: false,
            reference_altitude_m: 0.0,
            zero_pending: false,
            zero_altitude_m: None,
            last_relative_m: None,
        }
    }

    /// Altitude of the station, used for the sea-level reduction.
    pub fn set_reference_altitude(&mut self, meters: f32) {
        self.reference_altitude_m = meters;
    }

    /// Hand the HAL instance back (tests use this to finalize mocks).
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    fn hum_code(ratio: u8) -> u8 {
        match ratio {
            0 => 0b000,
            1 => 0b001,
            2 => 0b010,
            4 => 0b011,
            8 => 0b100,
            _ => 0b101,
        }
    }

    fn probe(&mut self) -> SensorResult<()> {
        self.bus.check_address()?;
        let found = self.bus.read_byte(REG_ID)?;
        let expected = self.kind.chip_id();
        if found != expected {
            return Err(TransportError::WrongHardwareAtAddress {
                address: self.bus.address(),
                expected,
                found,
            }
            .into());
        }
        Ok(())
    }
}

impl<I2C: I2c> SensorLogic for Baro<I2C> {
    fn channels(&self) -> &'static [Channel] {
        match self.kind {
            BaroKind::Tph => TPH_CHANNELS,
            BaroKind::PressureTemperature => PT_CHANNELS,
        }
    }

    fn begin(&mut self) -> SensorResult<()> {
        self.probe()?;

        let mut tp = [0u8; CALIB_TP_LEN];
        self.bus.read_bytes(REG_CALIB_TP, &mut tp)?;
        self.calibration = Calibration::parse_tp(&tp);
        if self.kind == BaroKind::Tph {
            let mut h = [0u8; CALIB_H_LEN];
            self.bus.read_bytes(REG_CALIB_H, &mut h)?;
            self.calibration.parse_h(&h);
        }

        self.bus.write_byte_checked(REG_CONFIG, CONFIG_DEFAULT)?;
        if self.kind == BaroKind::Tph {
            self.bus
                .write_byte(REG_CTRL_HUM, Self::hum_code(self.oversampling_ratio))?;
        }
        self.hum_dirty = false;
        self.last_relative_m = None;
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        if self.hum_dirty {
            self.bus
                .write_byte(REG_CTRL_HUM, Self::hum_code(self.oversampling_ratio))
                .map_err(SensorError::from)?;
            self.hum_dirty = false;
            // The humidity control only latches with the next write to the
            // measure control register; that write is the next tick's job.
            return Err(nb::Error::WouldBlock);
        }
        self.bus
            .write_byte(REG_CTRL_MEAS, CTRL_MEAS_FORCED)
            .map_err(SensorError::from)?;
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        let status = self.bus.read_byte(REG_STATUS).map_err(SensorError::from)?;
        if status & STATUS_MEASURING != 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        let mut raw = [0u8; 8];
        self.bus.read_bytes(REG_DATA, &mut raw)?;

        let adc_p = ((u32::from(raw[0]) << 12) | (u32::from(raw[1]) << 4) | (u32::from(raw[2]) >> 4))
            as i32;
        let adc_t = ((u32::from(raw[3]) << 12) | (u32::from(raw[4]) << 4) | (u32::from(raw[5]) >> 4))
            as i32;
        let adc_h = i32::from((u16::from(raw[6]) << 8) | u16::from(raw[7]));

        let (temperature_c, t_fine) = self.calibration.compensate_temperature(adc_t);
        let _ = out.push(Reading {
            channel: Channel::Temperature,
            value: temperature_c,
        });

        if self.kind == BaroKind::Tph {
            let _ = out.push(Reading {
                channel: Channel::Humidity,
                value: self.calibration.compensate_humidity(adc_h, t_fine),
            });
        }

        if let Some(pressure_hpa) = self.calibration.compensate_pressure(adc_p, t_fine) {
            let _ = out.push(Reading {
                channel: Channel::Pressure,
                value: pressure_hpa,
            });
            let _ = out.push(Reading {
                channel: Channel::PressureNn,
                value: sea_level_hpa(pressure_hpa, self.reference_altitude_m),
            });

            let altitude = altitude_m(pressure_hpa);
            if self.zero_pending {
                self.zero_altitude_m = Some(altitude);
                self.last_relative_m = None;
                self.zero_pending = false;
            }
            if let Some(zero) = self.zero_altitude_m {
                let relative = altitude - zero;
                let _ = out.push(Reading {
                    channel: Channel::RelativeAltitude,
                    value: relative,
                });
                if let Some(prev) = self.last_relative_m {
                    let _ = out.push(Reading {
                        channel: Channel::DeltaAltitude,
                        value: relative - prev,
                    });
                }
                self.last_relative_m = Some(relative);
            }
        }
        Ok(())
    }

    fn base_eps(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Temperature => 0.1,
            Channel::Humidity => 0.25,
            Channel::Pressure | Channel::PressureNn => 0.15,
            Channel::RelativeAltitude | Channel::DeltaAltitude => 0.5,
            _ => 0.1,
        }
    }

    fn oversampling(&self) -> Option<u8> {
        match self.kind {
            BaroKind::Tph => Some(self.oversampling_ratio),
            BaroKind::PressureTemperature => None,
        }
    }

    /// Ratios the humidity path offers: 0 (skip) and the powers of two up
    /// to 16. Anything else is reported unsupported and ignored.
    fn set_oversampling(&mut self, ratio: u8) -> SensorResult<bool> {
        if self.kind != BaroKind::Tph {
            return Ok(false);
        }
        if !matches!(ratio, 0 | 1 | 2 | 4 | 8 | 16) {
            return Ok(false);
        }
        if ratio != self.oversampling_ratio {
            self.oversampling_ratio = ratio;
            self.hum_dirty = true;
        }
        Ok(true)
    }

    fn calibration_text(&self, out: &mut CalDump) {
        let c = &self.calibration;
        let _ = write!(
            out,
            "T1={},T2={},T3={},P1={},P2={},P3={},P4={},P5={},P6={},P7={},P8={},P9={}",
            c.t1, c.t2, c.t3, c.p1, c.p2, c.p3, c.p4, c.p5, c.p6, c.p7, c.p8, c.p9
        );
        if self.kind == BaroKind::Tph {
            let _ = write!(
                out,
                ",H1={},H2={},H3={},H4={},H5={},H6={}",
                c.h1, c.h2, c.h3, c.h4, c.h5, c.h6
            );
        }
    }

    fn command(&mut self, suffix: &str, payload: &str) -> CommandOutcome {
        match suffix {
            "referencealtitude/set" => match payload.trim().parse::<f32>() {
                Ok(meters) => {
                    self.reference_altitude_m = meters;
                    CommandOutcome::Handled
                }
                Err(_) => CommandOutcome::Ignored,
            },
            "relativealtitude/set" => {
                // Zero at the altitude of the next good cycle; the payload
                // carries no information.
                self.zero_pending = true;
                CommandOutcome::Handled
            }
            _ => CommandOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    const ADDR: u8 = 0x76;

    /// Trim chosen so every compensation path reduces to round numbers:
    /// T2 alone drives `t_fine`, P1 alone scales pressure, H2 alone scales
    /// humidity.
    fn test_calibration() -> Calibration {
        Calibration {
            t2: 2_048,
            p1: 32_768,
            h2: 1,
            ..Calibration::default()
        }
    }

    fn calib_tp_bytes() -> [u8; CALIB_TP_LEN] {
        let mut buf = [0u8; CALIB_TP_LEN];
        buf[2..4].copy_from_slice(&2_048i16.to_le_bytes());
        buf[6..8].copy_from_slice(&32_768u16.to_le_bytes());
        buf
    }

    fn calib_h_bytes() -> [u8; CALIB_H_LEN] {
        let mut buf = [0u8; CALIB_H_LEN];
        buf[0..2].copy_from_slice(&1i16.to_le_bytes());
        buf
    }

    /// The begin sequence for a healthy TPH chip with the test trim.
    fn begin_transactions() -> Vec<Transaction> {
        vec![
            Transaction::write(ADDR, vec![]),
            Transaction::write_read(ADDR, vec![REG_ID], vec![CHIP_ID_TPH]),
            Transaction::write_read(ADDR, vec![REG_CALIB_TP], calib_tp_bytes().to_vec()),
            Transaction::write_read(ADDR, vec![REG_CALIB_H], calib_h_bytes().to_vec()),
            Transaction::write(ADDR, vec![REG_CONFIG, CONFIG_DEFAULT]),
            Transaction::write_read(ADDR, vec![REG_CONFIG], vec![CONFIG_DEFAULT]),
            Transaction::write(ADDR, vec![REG_CTRL_HUM, 0x01]),
        ]
    }

    /// One forced conversion: start, one busy poll, one idle poll, burst.
    fn cycle_transactions(adc_p_20bit: u32) -> [Transaction; 4] {
        let data = vec![
            (adc_p_20bit >> 12) as u8,
            (adc_p_20bit >> 4) as u8,
            ((adc_p_20bit & 0xf) << 4) as u8,
            0x80,
            0x00,
            0x00,
            0x80,
            0x00,
        ];
        [
            Transaction::write(ADDR, vec![REG_CTRL_MEAS, CTRL_MEAS_FORCED]),
            Transaction::write_read(ADDR, vec![REG_STATUS], vec![STATUS_MEASURING]),
            Transaction::write_read(ADDR, vec![REG_STATUS], vec![0x00]),
            Transaction::write_read(ADDR, vec![REG_DATA], data),
        ]
    }

    fn run_cycle<I2C: I2c>(baro: &mut Baro<I2C>) -> Readings {
        assert_eq!(baro.start_measurement(Micros(0)), Ok(()));
        assert_eq!(baro.data_ready(50), Err(nb::Error::WouldBlock));
        assert_eq!(baro.data_ready(100), Ok(()));
        let mut out = Readings::new();
        baro.read_values(Millis(0), &mut out).unwrap();
        out
    }

    fn value_of(out: &Readings, channel: Channel) -> Option<f32> {
        out.iter().find(|r| r.channel == channel).map(|r| r.value)
    }

    #[test]
    fn humidity_trim_unpacks_the_shared_nibble() {
        let mut calibration = Calibration::default();
        calibration.parse_h(&[0x01, 0x00, 0x00, 0x12, 0xab, 0x34, 0x00]);
        assert_eq!(calibration.h4, 0x12b); // 299
        assert_eq!(calibration.h5, 0x34a); // 842
    }

    #[test]
    fn compensation_reproduces_known_points() {
        let calibration = test_calibration();
        let (temperature, t_fine) = calibration.compensate_temperature(524_288);
        assert_eq!(temperature, 12.80);
        assert_eq!(t_fine, 65_536);

        let pressure = calibration.compensate_pressure(524_288, 128_000).unwrap();
        assert!((pressure - 1_000.0).abs() < 1e-3);

        let humidity = calibration.compensate_humidity(32_768, 76_800);
        assert_eq!(humidity, 0.5);
    }

    #[test]
    fn unfused_chip_yields_no_pressure() {
        let calibration = Calibration::default();
        assert_eq!(calibration.compensate_pressure(524_288, 128_000), None);
    }

    #[test]
    fn sea_level_reduction_matches_the_barometric_formula() {
        // 955.0 hPa measured at 518 m reduces to about 1015.85 hPa.
        let nn = sea_level_hpa(955.0, 518.0);
        assert!((nn - 1_015.85).abs() < 0.05);
        // With no reference altitude the reduction is the identity.
        assert_eq!(sea_level_hpa(980.0, 0.0), 980.0);
        assert!(altitude_m(SEA_LEVEL_HPA).abs() < 1e-3);
    }

    #[test]
    fn wrong_family_member_is_a_permanent_fault() {
        let mut baro = Baro::new_tph(
            Mock::new(&[
                Transaction::write(ADDR, vec![]),
                Transaction::write_read(ADDR, vec![REG_ID], vec![CHIP_ID_PT]),
            ]),
            ADDR,
        );
        let err = baro.begin().unwrap_err();
        assert_eq!(
            err,
            SensorError::Transport(TransportError::WrongHardwareAtAddress {
                address: ADDR,
                expected: CHIP_ID_TPH,
                found: CHIP_ID_PT,
            })
        );
        assert!(err.is_wrong_hardware());
        baro.release().done();
    }

    #[test]
    fn full_cycle_produces_all_four_channels() {
        let mut transactions = begin_transactions();
        transactions.extend(cycle_transactions(524_288));
        let mut baro = Baro::new_tph(Mock::new(&transactions), ADDR);

        baro.begin().unwrap();
        let out = run_cycle(&mut baro);

        assert_eq!(value_of(&out, Channel::Temperature), Some(12.80));
        assert_eq!(value_of(&out, Channel::Humidity), Some(0.5));
        assert!((value_of(&out, Channel::Pressure).unwrap() - 1_000.0).abs() < 1e-3);
        // No reference altitude configured: NN equals station pressure.
        assert!((value_of(&out, Channel::PressureNn).unwrap() - 1_000.0).abs() < 1e-3);
        // No zero point commanded: no altitude channels.
        assert_eq!(value_of(&out, Channel::RelativeAltitude), None);
        baro.release().done();
    }

    #[test]
    fn altitude_zeroing_tracks_pressure_changes() {
        let mut transactions = begin_transactions();
        transactions.extend(cycle_transactions(524_288)); // 1000.00 hPa
        transactions.extend(cycle_transactions(524_288)); // zeroing cycle
        transactions.extend(cycle_transactions(521_667)); // ~1005.00 hPa
        let mut baro = Baro::new_tph(Mock::new(&transactions), ADDR);
        baro.begin().unwrap();

        let out = run_cycle(&mut baro);
        assert_eq!(value_of(&out, Channel::RelativeAltitude), None);

        assert_eq!(
            baro.command("relativealtitude/set", ""),
            CommandOutcome::Handled
        );
        let out = run_cycle(&mut baro);
        assert_eq!(value_of(&out, Channel::RelativeAltitude), Some(0.0));
        assert_eq!(value_of(&out, Channel::DeltaAltitude), None);

        // Pressure rose ~5 hPa: about 42 m below the zero point.
        let out = run_cycle(&mut baro);
        let relative = value_of(&out, Channel::RelativeAltitude).unwrap();
        assert!((relative + 41.9).abs() < 0.5, "relative = {relative}");
        let delta = value_of(&out, Channel::DeltaAltitude).unwrap();
        assert_eq!(delta, relative);
        baro.release().done();
    }

    #[test]
    fn changed_oversampling_is_staged_before_the_conversion() {
        let mut transactions = begin_transactions();
        transactions.push(Transaction::write(ADDR, vec![REG_CTRL_HUM, 0b101]));
        transactions.push(Transaction::write(ADDR, vec![REG_CTRL_MEAS, CTRL_MEAS_FORCED]));
        let mut baro = Baro::new_tph(Mock::new(&transactions), ADDR);
        baro.begin().unwrap();

        assert_eq!(baro.set_oversampling(16), Ok(true));
        assert_eq!(baro.oversampling(), Some(16));
        // First tick stages the humidity control, second starts the burst.
        assert_eq!(baro.start_measurement(Micros(0)), Err(nb::Error::WouldBlock));
        assert_eq!(baro.start_measurement(Micros(50_000)), Ok(()));
        baro.release().done();
    }

    #[test]
    fn unsupported_ratios_are_reported_not_applied() {
        let mut baro = Baro::new_tph(Mock::new(&[]), ADDR);
        assert_eq!(baro.set_oversampling(3), Ok(false));
        assert_eq!(baro.oversampling(), Some(1));

        let mut pt = Baro::new_pressure_temperature(Mock::new(&[]), ADDR);
        assert_eq!(pt.set_oversampling(2), Ok(false));
        assert_eq!(pt.oversampling(), None);
        baro.release().done();
        pt.release().done();
    }

    #[test]
    fn calibration_dump_lists_the_trim() {
        let mut baro = Baro::new_tph(Mock::new(&[]), ADDR);
        baro.calibration = test_calibration();
        let mut dump = CalDump::new();
        baro.calibration_text(&mut dump);
        assert!(dump.starts_with("T1=0,T2=2048,"));
        assert!(dump.contains("P1=32768"));
        assert!(dump.contains("H2=1"));
        baro.release().done();
    }
}
