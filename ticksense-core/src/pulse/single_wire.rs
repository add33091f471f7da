//! Single-Wire Frame Decoder
//!
//! ## Protocol
//!
//! The task kicks a measurement off by driving the line low for the host
//! start pulse, then releases it. The sensor answers with a fixed-width
//! reply pulse, an acknowledge pulse, and forty data bits, each preceded by
//! a fixed-width low intro; the width of the following high pulse encodes
//! the bit. Nominal widths and tolerance live in
//! [`crate::constants::protocol`].
//!
//! ## Split of Labor
//!
//! The edge interrupt calls [`isr_edge`] with the pin level after the edge
//! and the microsecond stamp. Each call measures the width of the pulse
//! that just ended (stamp minus previous stamp, wrap-safe), checks it
//! against the phase the decoder is in, and either advances, appends a bit,
//! or aborts with a [`WireFault`] and the offending width.
//!
//! The task side arms the slot before the kickoff ([`arm`]), then polls
//! ([`poll`]) until the decoder parks in a terminal state, and finally
//! takes the frame ([`take_frame`]) or the abort ([`take_abort`]), which
//! returns the decoder to idle. Checksum and value scaling are the
//! driver's business - this module hands over raw bytes.
//!
//! A decoder parked in a terminal state ignores further edges, so the
//! sensor's trailing release edge cannot corrupt a finished frame.

use core::sync::atomic::Ordering;

use crate::constants::protocol::{
    within, BIT_INTRO_LOW_US, BIT_ONE_HIGH_US, BIT_ZERO_HIGH_US, FRAME_BITS, FRAME_BYTES,
    REPLY_LOW_US,
};
use crate::errors::WireFault;
use crate::slot::EdgeSlot;
use crate::time::Micros;

/// Decoder phases, advanced one edge at a time in interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireState {
    /// No frame in progress; a falling edge starts the host pulse.
    Idle = 0,
    /// Host start pulse running; a rising edge ends it.
    StartPulseStart = 1,
    /// Host released the line; the sensor's falling edge is due.
    StartPulseEnd = 2,
    /// Sensor reply pulse running; its width is checked on the rising edge.
    ReplyPulseStart = 3,
    /// Acknowledge pulse running; a falling edge opens the first bit intro.
    DataIntroStart = 4,
    /// Bit intro running; its width is checked on the rising edge.
    DataIntroEnd = 5,
    /// Bit pulse running; its width on the falling edge decides 0 or 1.
    DataAcquisition = 6,
    /// Terminal: forty bits collected, frame waiting for the task.
    FrameReady = 7,
    /// Terminal: timing violation, fault waiting for the task.
    FrameAborted = 8,
}

impl WireState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::StartPulseStart,
            2 => Self::StartPulseEnd,
            3 => Self::ReplyPulseStart,
            4 => Self::DataIntroStart,
            5 => Self::DataIntroEnd,
            6 => Self::DataAcquisition,
            7 => Self::FrameReady,
            8 => Self::FrameAborted,
            _ => Self::Idle,
        }
    }
}

/// Task-side view of the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Decoder idle or mid-frame.
    Pending,
    /// A complete frame is waiting in the slot.
    Ready,
    /// Decoding aborted on a timing violation.
    Aborted {
        /// Which timing rule the line broke.
        kind: WireFault,
        /// Measured width of the offending pulse, µs.
        dt_us: u32,
    },
}

/// Reset the slot for a fresh frame. Call before driving the kickoff pulse.
pub fn arm(slot: &EdgeSlot) {
    slot.bit_count.store(0, Ordering::Relaxed);
    for byte in &slot.bits {
        byte.store(0, Ordering::Relaxed);
    }
    slot.fail_code.store(0, Ordering::Relaxed);
    slot.fail_dt.store(0, Ordering::Relaxed);
    slot.state.store(WireState::Idle as u8, Ordering::Release);
}

fn abort(slot: &EdgeSlot, kind: WireFault, dt_us: u32) {
    slot.fail_code.store(kind.code(), Ordering::Relaxed);
    slot.fail_dt.store(dt_us, Ordering::Relaxed);
    slot.state
        .store(WireState::FrameAborted as u8, Ordering::Release);
}

fn advance(slot: &EdgeSlot, next: WireState) {
    slot.state.store(next as u8, Ordering::Release);
}

fn push_bit(slot: &EdgeSlot, one: bool) {
    let idx = slot.bit_count.load(Ordering::Relaxed);
    if one {
        let byte = usize::from(idx / 8);
        let mask = 0x80u8 >> (idx % 8);
        let current = slot.bits[byte].load(Ordering::Relaxed);
        slot.bits[byte].store(current | mask, Ordering::Relaxed);
    }
    let next = idx + 1;
    slot.bit_count.store(next, Ordering::Relaxed);
    if next >= FRAME_BITS {
        advance(slot, WireState::FrameReady);
    } else {
        advance(slot, WireState::DataIntroEnd);
    }
}

/// Feed one edge into the decoder.
///
/// `level_high` is the pin level after the edge; `now` the microsecond
/// stamp taken in the interrupt. Interrupt-safe: loads and stores only.
pub fn isr_edge(slot: &EdgeSlot, level_high: bool, now: Micros) {
    let dt_us = now.elapsed_since(Micros(slot.prev_edge.load(Ordering::Relaxed)));
    slot.prev_edge.store(now.0, Ordering::Relaxed);

    match WireState::from_u8(slot.state.load(Ordering::Acquire)) {
        WireState::Idle => {
            // Only a falling edge means anything here; stray rises are noise.
            if !level_high {
                advance(slot, WireState::StartPulseStart);
            }
        }
        WireState::StartPulseStart => {
            // Host pulse width is the host's own doing and is not checked.
            if level_high {
                advance(slot, WireState::StartPulseEnd);
            } else {
                abort(slot, WireFault::BadStartPulseLevel, dt_us);
            }
        }
        WireState::StartPulseEnd => {
            if !level_high {
                advance(slot, WireState::ReplyPulseStart);
            } else {
                abort(slot, WireFault::BadStartPulseEndLevel, dt_us);
            }
        }
        WireState::ReplyPulseStart => {
            if level_high && within(dt_us, REPLY_LOW_US) {
                advance(slot, WireState::DataIntroStart);
            } else {
                abort(slot, WireFault::BadReplyPulseLength, dt_us);
            }
        }
        WireState::DataIntroStart => {
            // End of the acknowledge pulse; its width is not part of the
            // contract, only the direction is.
            if !level_high {
                advance(slot, WireState::DataIntroEnd);
            } else {
                abort(slot, WireFault::BadDataIntroPulseLength, dt_us);
            }
        }
        WireState::DataIntroEnd => {
            if level_high && within(dt_us, BIT_INTRO_LOW_US) {
                advance(slot, WireState::DataAcquisition);
            } else {
                abort(slot, WireFault::BadDataIntroPulseLength, dt_us);
            }
        }
        WireState::DataAcquisition => {
            if level_high {
                abort(slot, WireFault::BadDataBitLength, dt_us);
            } else if within(dt_us, BIT_ZERO_HIGH_US) {
                push_bit(slot, false);
            } else if within(dt_us, BIT_ONE_HIGH_US) {
                push_bit(slot, true);
            } else {
                abort(slot, WireFault::BadDataBitLength, dt_us);
            }
        }
        WireState::FrameReady | WireState::FrameAborted => {
            // Parked until the task side takes the result.
        }
    }
}

/// Task-side status check without consuming anything.
pub fn poll(slot: &EdgeSlot) -> FrameStatus {
    match WireState::from_u8(slot.state.load(Ordering::Acquire)) {
        WireState::FrameReady => FrameStatus::Ready,
        WireState::FrameAborted => {
            match WireFault::from_code(slot.fail_code.load(Ordering::Relaxed)) {
                Some(kind) => FrameStatus::Aborted {
                    kind,
                    dt_us: slot.fail_dt.load(Ordering::Relaxed),
                },
                None => FrameStatus::Pending,
            }
        }
        _ => FrameStatus::Pending,
    }
}

/// Take a finished frame, returning the decoder to idle.
pub fn take_frame(slot: &EdgeSlot) -> Option<[u8; FRAME_BYTES]> {
    if WireState::from_u8(slot.state.load(Ordering::Acquire)) != WireState::FrameReady {
        return None;
    }
    let mut frame = [0u8; FRAME_BYTES];
    for (dst, src) in frame.iter_mut().zip(&slot.bits) {
        *dst = src.load(Ordering::Relaxed);
    }
    slot.state.store(WireState::Idle as u8, Ordering::Release);
    Some(frame)
}

/// Take an abort record, returning the decoder to idle.
pub fn take_abort(slot: &EdgeSlot) -> Option<(WireFault, u32)> {
    if WireState::from_u8(slot.state.load(Ordering::Acquire)) != WireState::FrameAborted {
        return None;
    }
    let kind = WireFault::from_code(slot.fail_code.load(Ordering::Relaxed))?;
    let dt_us = slot.fail_dt.load(Ordering::Relaxed);
    slot.state.store(WireState::Idle as u8, Ordering::Release);
    Some((kind, dt_us))
}
