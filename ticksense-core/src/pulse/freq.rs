//! Edge Frequency Windows
//!
//! For chips that encode a measurement as an output frequency, the
//! interrupt side is nothing but bookkeeping: the first edge after a reset
//! opens the window, every further edge increments the counter, and every
//! edge updates the end stamp. The task side calls [`sample_and_reset`]
//! once per measurement cycle, which converts the window into a frequency
//! and rearms it atomically.
//!
//! The conversion is `edges * 500_000 / window_us`: the output toggles
//! twice per cycle, so half the edge count is the cycle count, and the
//! factor folds that halving into the microseconds-to-seconds scaling.
//!
//! Windows shorter than a minimum, and windows with no second edge, yield
//! no sample - a stopped input simply publishes nothing.

use core::sync::atomic::Ordering;

use crate::constants::timing::EDGE_FREQ_SCALE;
use crate::slot::EdgeSlot;
use crate::time::Micros;

/// One sampled frequency window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqSample {
    /// Estimated frequency over the window, Hz.
    pub hz: f32,
    /// Edges counted after the opening edge.
    pub edges: u32,
    /// Window length, µs.
    pub window_us: u32,
}

/// Feed one edge into the window. Interrupt-safe: loads and stores only.
pub fn isr_edge(slot: &EdgeSlot, now: Micros) {
    if slot.armed.load(Ordering::Relaxed) {
        let n = slot.edges.load(Ordering::Relaxed);
        slot.edges.store(n.wrapping_add(1), Ordering::Relaxed);
    } else {
        slot.window_start.store(now.0, Ordering::Relaxed);
        slot.edges.store(0, Ordering::Relaxed);
        slot.armed.store(true, Ordering::Relaxed);
    }
    slot.window_last.store(now.0, Ordering::Relaxed);
}

/// Convert the current window into a frequency and rearm it.
///
/// Runs in a critical section so the interrupt cannot slip an edge between
/// reading the window and resetting it. No bus traffic happens inside; the
/// section is a handful of loads and stores long.
pub fn sample_and_reset(slot: &EdgeSlot, min_window_us: u32) -> Option<FreqSample> {
    critical_section::with(|_| {
        if !slot.armed.load(Ordering::Relaxed) {
            return None;
        }
        let edges = slot.edges.load(Ordering::Relaxed);
        let start = slot.window_start.load(Ordering::Relaxed);
        let last = slot.window_last.load(Ordering::Relaxed);
        slot.armed.store(false, Ordering::Relaxed);
        slot.edges.store(0, Ordering::Relaxed);

        let window_us = last.wrapping_sub(start);
        if edges == 0 || window_us < min_window_us {
            return None;
        }
        Some(FreqSample {
            hz: edges as f32 * EDGE_FREQ_SCALE / window_us as f32,
            edges,
            window_us,
        })
    })
}
