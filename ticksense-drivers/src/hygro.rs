//! Single-Wire Hygrometer
//!
//! Combined humidity and temperature sensor that answers a host start
//! pulse with one 40-bit edge-timed frame. The heavy lifting happens in
//! [`ticksense_core::pulse::single_wire`] in interrupt context; this
//! driver owns the task side of the exchange:
//!
//! 1. `start_measurement` arms the slot, pulls the line low for the host
//!    start pulse and releases it again. From that point the edge
//!    interrupt decodes the sensor's answer on its own.
//! 2. `data_ready` polls the decoder. A timing violation parked in the
//!    slot is consumed and surfaces as a frame fault with the offending
//!    pulse width; the cycle counts as a soft failure and the next one
//!    starts clean.
//! 3. `read_values` takes the raw frame, verifies the additive checksum
//!    and scales the two big-endian tenth-unit fields. Bit 15 of the
//!    temperature field is a sign flag, not a two's complement bit.
//!
//! A sensor that never answers leaves the decoder pending; the shortened
//! conversion timeout turns that into a soft failure well before the
//! default would.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use ticksense_core::constants::limits::{HUMIDITY_GATE, TEMPERATURE_GATE};
use ticksense_core::constants::protocol::HOST_START_LOW_US;
use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{Reading, Readings, SensorLogic};
use ticksense_core::pulse::single_wire::{self, FrameStatus};
use ticksense_core::slot::SlotRef;
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;

const CHANNELS: &[Channel] = &[Channel::Temperature, Channel::Humidity];

/// The frame exchange is over in milliseconds; a silent sensor should
/// not stall the cycle for the default two seconds.
const FRAME_TIMEOUT_MS: u32 = 1_000;

/// Sign flag in the high temperature byte.
const TEMP_SIGN_BIT: u8 = 0x80;

/// Single-wire hygrometer behind an edge-decoding slot.
pub struct Hygro<'a, P, D> {
    slot: SlotRef<'a>,
    pin: P,
    delay: D,
}

impl<'a, P: OutputPin, D: DelayNs> Hygro<'a, P, D> {
    /// Driver over a claimed edge slot, the data line GPIO and a delay.
    pub fn new(slot: SlotRef<'a>, pin: P, delay: D) -> Self {
        Self { slot, pin, delay }
    }

    /// Hand the data line GPIO back (tests use this to finalize mocks).
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin, D: DelayNs> SensorLogic for Hygro<'_, P, D> {
    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn begin(&mut self) -> SensorResult<()> {
        // Released line idles high; nothing to probe until the first frame.
        self.pin.set_high().map_err(|_| TransportError::HwError)?;
        single_wire::arm(self.slot.slot());
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        single_wire::arm(self.slot.slot());
        self.pin
            .set_low()
            .map_err(|_| SensorError::from(TransportError::HwError))?;
        self.delay.delay_us(HOST_START_LOW_US);
        self.pin
            .set_high()
            .map_err(|_| SensorError::from(TransportError::HwError))?;
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        match single_wire::poll(self.slot.slot()) {
            FrameStatus::Ready => Ok(()),
            FrameStatus::Pending => Err(nb::Error::WouldBlock),
            FrameStatus::Aborted { kind, dt_us } => {
                // Consume the fault so the next kickoff starts from idle.
                let _ = single_wire::take_abort(self.slot.slot());
                Err(nb::Error::Other(SensorError::FrameTiming { kind, dt_us }))
            }
        }
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        let Some(frame) = single_wire::take_frame(self.slot.slot()) else {
            return Ok(());
        };

        let sum = frame[0]
            .wrapping_add(frame[1])
            .wrapping_add(frame[2])
            .wrapping_add(frame[3]);
        if sum != frame[4] {
            return Err(SensorError::FrameChecksum);
        }

        let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
        let magnitude = f32::from(u16::from_be_bytes([frame[2] & !TEMP_SIGN_BIT, frame[3]])) / 10.0;
        let temperature = if frame[2] & TEMP_SIGN_BIT != 0 {
            -magnitude
        } else {
            magnitude
        };

        if TEMPERATURE_GATE.accepts(temperature) {
            let _ = out.push(Reading {
                channel: Channel::Temperature,
                value: temperature,
            });
        }
        if HUMIDITY_GATE.accepts(humidity) {
            let _ = out.push(Reading {
                channel: Channel::Humidity,
                value: humidity,
            });
        }
        Ok(())
    }

    fn conversion_timeout_ms(&self) -> u32 {
        FRAME_TIMEOUT_MS
    }

    fn base_eps(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Temperature => 0.1,
            Channel::Humidity => 0.25,
            _ => 0.1,
        }
    }
}
