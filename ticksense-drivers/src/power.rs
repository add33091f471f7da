//! Mains Power Meter
//!
//! Single-phase metering chip that reports its measurements as pulse
//! frequencies rather than registers. Two outputs are wired to
//! interrupt-counting slots:
//!
//! - the power output pulses proportionally to active power,
//! - the multiplexed output pulses proportionally to either RMS voltage
//!   or RMS current, selected by a GPIO.
//!
//! Each measurement cycle samples both frequency windows, converts them
//! through the chip's Hz-per-unit scale factors and then flips the
//! select pin, so voltage and current alternate cycle by cycle. The
//! window sampled in a cycle was accumulated under the *previous*
//! selection; the driver interprets it accordingly before toggling.
//!
//! All three quantities pass a plausibility gate before publication.
//! The voltage gate doubles as dead-input rejection: a floating input
//! produces a low pulse rate that converts to an impossible mains
//! voltage and is dropped instead of published.

use embedded_hal::digital::OutputPin;

use ticksense_core::constants::limits::{CURRENT_GATE, POWER_GATE, VOLTAGE_GATE};
use ticksense_core::constants::timing::FREQ_MIN_WINDOW_US;
use ticksense_core::errors::{SensorError, SensorResult, TransportError};
use ticksense_core::fsm::{Reading, Readings, SensorLogic};
use ticksense_core::pulse::freq;
use ticksense_core::slot::SlotRef;
use ticksense_core::time::{Micros, Millis};
use ticksense_core::topic::Channel;

const CHANNELS: &[Channel] = &[Channel::Power, Channel::Voltage, Channel::Current];

/// Pulse rate per physical unit, from the metering chip's shunt and
/// divider network. Board-specific; the defaults match the reference
/// layout and are overridden per device after calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerScale {
    /// Power output pulse rate per watt.
    pub hz_per_w: f32,
    /// Multiplexed output pulse rate per volt.
    pub hz_per_v: f32,
    /// Multiplexed output pulse rate per ampere.
    pub hz_per_a: f32,
}

impl Default for PowerScale {
    fn default() -> Self {
        Self {
            hz_per_w: 2.0,
            hz_per_v: 0.5,
            hz_per_a: 10.0,
        }
    }
}

/// Pulse-output power meter fed by two edge-counting slots.
pub struct PowerMeter<'a, P> {
    power_slot: SlotRef<'a>,
    mux_slot: SlotRef<'a>,
    sel: P,
    /// What the mux output has been measuring since the last toggle.
    sel_is_voltage: bool,
    scale: PowerScale,
}

impl<'a, P: OutputPin> PowerMeter<'a, P> {
    /// Driver over claimed edge slots and the select GPIO.
    pub fn new(power_slot: SlotRef<'a>, mux_slot: SlotRef<'a>, sel: P, scale: PowerScale) -> Self {
        Self {
            power_slot,
            mux_slot,
            sel,
            sel_is_voltage: true,
            scale,
        }
    }

    /// Hand the select pin back (tests use this to finalize mocks).
    pub fn release(self) -> P {
        self.sel
    }

    /// Flip the mux to the other quantity for the next window.
    fn toggle_selection(&mut self) -> SensorResult<()> {
        self.sel_is_voltage = !self.sel_is_voltage;
        let result = if self.sel_is_voltage {
            self.sel.set_high()
        } else {
            self.sel.set_low()
        };
        result.map_err(|_| TransportError::HwError)?;
        Ok(())
    }
}

impl<P: OutputPin> SensorLogic for PowerMeter<'_, P> {
    fn channels(&self) -> &'static [Channel] {
        CHANNELS
    }

    fn begin(&mut self) -> SensorResult<()> {
        self.sel_is_voltage = true;
        self.sel
            .set_high()
            .map_err(|_| TransportError::HwError)?;
        // Throw away whatever accumulated before we owned the pin state.
        let _ = freq::sample_and_reset(self.power_slot.slot(), 0);
        let _ = freq::sample_and_reset(self.mux_slot.slot(), 0);
        Ok(())
    }

    fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
        // The windows accumulate in interrupt context on their own.
        Ok(())
    }

    fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
        Ok(())
    }

    fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
        if let Some(sample) = freq::sample_and_reset(self.power_slot.slot(), FREQ_MIN_WINDOW_US) {
            let watts = sample.hz / self.scale.hz_per_w;
            if POWER_GATE.accepts(watts) {
                let _ = out.push(Reading {
                    channel: Channel::Power,
                    value: watts,
                });
            }
        }

        if let Some(sample) = freq::sample_and_reset(self.mux_slot.slot(), FREQ_MIN_WINDOW_US) {
            if self.sel_is_voltage {
                let volts = sample.hz / self.scale.hz_per_v;
                if VOLTAGE_GATE.accepts(volts) {
                    let _ = out.push(Reading {
                        channel: Channel::Voltage,
                        value: volts,
                    });
                }
            } else {
                let amps = sample.hz / self.scale.hz_per_a;
                if CURRENT_GATE.accepts(amps) {
                    let _ = out.push(Reading {
                        channel: Channel::Current,
                        value: amps,
                    });
                }
            }
        }

        self.toggle_selection()
    }

    fn base_eps(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Power => 1.0,
            Channel::Voltage => 0.3,
            Channel::Current => 0.01,
            _ => 0.1,
        }
    }
}
