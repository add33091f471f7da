//! Gamma Dose Rate Counter
//!
//! Counting-tube interface board behind the register transport: the board
//! runs the tube's high-voltage supply and accumulates discharge pulses
//! into a 16-bit counter that clears on read. The driver converts the
//! count delta per cycle into counts per minute, scales by the tube's
//! sensitivity, and publishes the dose rate averaged over the last ten
//! minutes - single-cycle counting statistics are far too noisy to put on
//! the bus directly.
//!
//! The first cycle after initialization only establishes the baseline
//! stamp; publication starts with the second cycle.
//!
//! Counting tubes fail silently: a drooping high-voltage supply simply
//! stops producing pulses. The driver therefore declares a hardware
//! watchdog; a tube that delivers no counts long enough is reinitialized
//! by the runtime. The startup allowance is generous because the supply
//! needs minutes to stabilize after power-up.

use embedded_hal::i2c::I2c;

use ticksense_core::constants::timing::{GAMMA_WATCHDOG_RUNTIME_MS, GAMMA_WATCHDOG_STARTUP_MS};
use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{Reading, Readings, SensorLogic, WatchdogSpec};
use ticksense_core::history::TimedBuffer;
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;
use ticksense_core::transport::RegisterBus;

// Register map of the interface board.
const REG_ID: u8 = 0x00;
const REG_STATUS: u8 = 0x01;
const REG_COUNT: u8 = 0x02;

const BOARD_ID: u8 = 0x47;

/// High-voltage supply stable, counts are meaningful.
const STATUS_HV_READY: u8 = 0x01;

/// Tube sensitivity: counts per minute per µSv/h.
const TUBE_CPM_PER_USVH: f32 = 151.0;

/// Averaging window for the published dose rate, ms.
const AVERAGE_WINDOW_MS: u32 = 600_000;

/// Ring capacity; at the default cycle spacing this covers the window.
const HISTORY_LEN: usize = 64;

const CHANNELS: &[Channel] = &[Channel::Gamma10MinAvg];

/// Gamma counter driver on the shared register bus.
pub struct Gamma<I2C> {
    bus: RegisterBus<I2C>,
    history: TimedBuffer<HISTORY_LEN>,
    last_read_at: Option<Millis>,
}

impl<I2C: I2c> Gamma<I2C> {
    /// Driver at `address`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            history: TimedBuffer::new(),
            last_read_at: None,
        }
    }

    /// Hand the HAL instance back (tests use this to finalize mocks).
    pub fn release(self) -> I2C {
        self.bus.release()
    }
}

impl<I2C: I2c> SensorLogic for Gamma<I2C> {
    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn begin(&mut self) -> SensorResult<()> {
        self.bus.check_address()?;
        let found = self.bus.read_byte(REG_ID)?;
        if found != BOARD_ID {
            return Err(TransportError::WrongHardwareAtAddress {
                address: self.bus.address(),
                expected: BOARD_ID,
                found,
            }
            .into());
        }
        // Discard whatever accumulated while we were not looking.
        let _ = self.bus.read_word(REG_COUNT)?;
        self.history.clear();
        self.last_read_at = None;
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        // The counter accumulates continuously.
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        let status = self.bus.read_byte(REG_STATUS).map_err(SensorError::from)?;
        if status & STATUS_HV_READY == 0 {
            // Supply still ramping; counts would be garbage.
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn read_values(&mut self, now: Millis, out: &mut Readings) -> SensorResult<()> {
        let counts = self.bus.read_word(REG_COUNT)?;

        let Some(baseline) = self.last_read_at else {
            // First cycle only anchors the interval.
            self.last_read_at = Some(now);
            return Ok(());
        };
        self.last_read_at = Some(now);

        let interval_ms = now.elapsed_since(baseline);
        if interval_ms == 0 {
            return Ok(());
        }

        let cpm = f32::from(counts) * 60_000.0 / interval_ms as f32;
        self.history.push(now, cpm / TUBE_CPM_PER_USVH);

        if let Some(mean) = self.history.mean_within(now, AVERAGE_WINDOW_MS) {
            let _ = out.push(Reading {
                channel: Channel::Gamma10MinAvg,
                value: mean,
            });
        }
        Ok(())
    }

    fn base_eps(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Gamma10MinAvg => 0.005,
            _ => 0.1,
        }
    }

    fn watchdog(&self) -> Option<WatchdogSpec> {
        Some(WatchdogSpec {
            startup_ms: GAMMA_WATCHDOG_STARTUP_MS,
            runtime_ms: GAMMA_WATCHDOG_RUNTIME_MS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};
    use ticksense_core::constants::addresses::GAMMA;

    fn begin_transactions() -> Vec<Transaction> {
        vec![
            Transaction::write(GAMMA, vec![]),
            Transaction::write_read(GAMMA, vec![REG_ID], vec![BOARD_ID]),
            Transaction::write_read(GAMMA, vec![REG_COUNT], vec![0x00, 0x2a]),
        ]
    }

    fn count_read(counts: u16) -> Transaction {
        Transaction::write_read(GAMMA, vec![REG_COUNT], counts.to_be_bytes().to_vec())
    }

    #[test]
    fn begin_discards_the_stale_count() {
        let mut gamma = Gamma::new(Mock::new(&begin_transactions()), GAMMA);
        gamma.begin().unwrap();
        gamma.release().done();
    }

    #[test]
    fn wrong_board_id_is_a_permanent_fault() {
        let mut gamma = Gamma::new(
            Mock::new(&[
                Transaction::write(GAMMA, vec![]),
                Transaction::write_read(GAMMA, vec![REG_ID], vec![0x00]),
            ]),
            GAMMA,
        );
        assert!(gamma.begin().unwrap_err().is_wrong_hardware());
        gamma.release().done();
    }

    #[test]
    fn counts_wait_for_the_supply() {
        let mut gamma = Gamma::new(
            Mock::new(&[
                Transaction::write_read(GAMMA, vec![REG_STATUS], vec![0x00]),
                Transaction::write_read(GAMMA, vec![REG_STATUS], vec![STATUS_HV_READY]),
            ]),
            GAMMA,
        );
        assert_eq!(gamma.data_ready(50), Err(nb::Error::WouldBlock));
        assert_eq!(gamma.data_ready(100), Ok(()));
        gamma.release().done();
    }

    #[test]
    fn first_cycle_only_anchors_the_interval() {
        let mut transactions = begin_transactions();
        transactions.push(count_read(10));
        let mut gamma = Gamma::new(Mock::new(&transactions), GAMMA);
        gamma.begin().unwrap();

        let mut out = Readings::new();
        gamma.read_values(Millis(0), &mut out).unwrap();
        assert!(out.is_empty());
        gamma.release().done();
    }

    #[test]
    fn dose_rate_is_the_windowed_mean() {
        let mut transactions = begin_transactions();
        transactions.push(count_read(0)); // baseline
        transactions.push(count_read(151)); // 151 counts over 60 s = 1.0 µSv/h
        transactions.push(count_read(453)); // 453 over 60 s = 3.0 µSv/h
        let mut gamma = Gamma::new(Mock::new(&transactions), GAMMA);
        gamma.begin().unwrap();

        let mut out = Readings::new();
        gamma.read_values(Millis(0), &mut out).unwrap();
        assert!(out.is_empty());

        out.clear();
        gamma.read_values(Millis(60_000), &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0].value - 1.0).abs() < 1e-3);

        out.clear();
        gamma.read_values(Millis(120_000), &mut out).unwrap();
        // Mean of 1.0 and 3.0 inside the ten-minute window.
        assert!((out[0].value - 2.0).abs() < 1e-3);
        gamma.release().done();
    }

    #[test]
    fn silent_tube_publishes_zero_and_starves_the_watchdog() {
        let mut transactions = begin_transactions();
        transactions.push(count_read(0));
        transactions.push(count_read(0));
        let mut gamma = Gamma::new(Mock::new(&transactions), GAMMA);
        gamma.begin().unwrap();

        let mut out = Readings::new();
        gamma.read_values(Millis(0), &mut out).unwrap();
        gamma.read_values(Millis(60_000), &mut out).unwrap();
        // A zero reading is published; the runtime's watchdog logic treats
        // it as "no proof of life".
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 0.0);

        assert_eq!(
            gamma.watchdog(),
            Some(WatchdogSpec {
                startup_ms: 180_000,
                runtime_ms: 900_000,
            })
        );
        gamma.release().done();
    }
}
