//! Interrupt Capture Slots
//!
//! ## Design
//!
//! Pulse-decoding drivers need state that an interrupt handler can mutate
//! while the task side reads it. Each such driver claims one [`EdgeSlot`]
//! out of a statically allocated [`EdgeSlots`] bank; the platform's edge
//! interrupt trampoline looks the slot up by index and forwards edges into
//! the decoder functions in [`crate::pulse`].
//!
//! Slots are plain records of atomics - no locks, no unsafe code, no
//! allocation. The single-writer rule makes the simple load/store protocol
//! sound: each slot field is written either only from the interrupt side or
//! only from the task side, with one exception - the compound reset done by
//! frequency sampling, which runs inside a `critical_section` so the
//! interrupt cannot observe a half-reset window.
//!
//! ## Memory Ordering
//!
//! The interrupt side finishes a frame by storing the terminal state with
//! `Release`; the task side polls the state with `Acquire` and only then
//! reads the payload bytes with `Relaxed`. That pairing is the only
//! ordering the protocol needs - all data writes happen before the state
//! store, all data reads after the state load.
//!
//! ## Claiming
//!
//! A slot is bound to exactly one driver. [`EdgeSlots::claim`] hands out a
//! [`SlotRef`] and fails on double claims; dropping the `SlotRef` releases
//! the slot. The index-to-driver binding is fixed at construction time,
//! which is what lets the interrupt trampoline stay a dumb jump table.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::constants::protocol::FRAME_BYTES;

/// Shared capture record for one interrupt line.
///
/// Field semantics depend on the decoder attached to the line: the
/// single-wire decoder uses the state/bits group, the frequency counter
/// uses the window group. Nothing stops a line from being rebound to a
/// different decoder after release; the claiming driver re-arms the slot.
#[derive(Debug)]
pub struct EdgeSlot {
    claimed: AtomicBool,

    // Single-wire frame decoding.
    pub(crate) state: AtomicU8,
    pub(crate) bit_count: AtomicU8,
    pub(crate) bits: [AtomicU8; FRAME_BYTES],
    pub(crate) fail_code: AtomicU8,
    pub(crate) fail_dt: AtomicU32,
    /// Stamp of the previous edge, for pulse width measurement.
    pub(crate) prev_edge: AtomicU32,

    // Frequency counting.
    pub(crate) armed: AtomicBool,
    pub(crate) edges: AtomicU32,
    pub(crate) window_start: AtomicU32,
    pub(crate) window_last: AtomicU32,
}

impl EdgeSlot {
    /// Idle, unclaimed slot.
    pub const fn new() -> Self {
        const ZERO_BYTE: AtomicU8 = AtomicU8::new(0);
        Self {
            claimed: AtomicBool::new(false),
            state: AtomicU8::new(0),
            bit_count: AtomicU8::new(0),
            bits: [ZERO_BYTE; FRAME_BYTES],
            fail_code: AtomicU8::new(0),
            fail_dt: AtomicU32::new(0),
            prev_edge: AtomicU32::new(0),
            armed: AtomicBool::new(false),
            edges: AtomicU32::new(0),
            window_start: AtomicU32::new(0),
            window_last: AtomicU32::new(0),
        }
    }

    /// Whether a driver currently owns this slot.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Relaxed)
    }
}

impl Default for EdgeSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Statically allocatable bank of capture slots.
///
/// The firmware declares one of these as a `static` sized to the number of
/// pulse inputs the board has, and wires each external interrupt to the
/// matching index.
#[derive(Debug)]
pub struct EdgeSlots<const N: usize> {
    slots: [EdgeSlot; N],
}

impl<const N: usize> EdgeSlots<N> {
    /// Bank of idle slots.
    pub const fn new() -> Self {
        const SLOT: EdgeSlot = EdgeSlot::new();
        Self { slots: [SLOT; N] }
    }

    /// Number of slots in the bank.
    pub const fn len(&self) -> usize {
        N
    }

    /// Whether the bank has no slots at all.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Slot by index, for the interrupt trampoline.
    pub fn get(&self, index: usize) -> Option<&EdgeSlot> {
        self.slots.get(index)
    }

    /// Claim exclusive ownership of the slot at `index`.
    ///
    /// Fails if the index is out of range or another driver holds the slot.
    /// The check-and-set runs in a critical section so two tasks racing for
    /// the same slot cannot both win.
    pub fn claim(&self, index: usize) -> Option<SlotRef<'_>> {
        let slot = self.slots.get(index)?;
        let won = critical_section::with(|_| {
            if slot.claimed.load(Ordering::Relaxed) {
                false
            } else {
                slot.claimed.store(true, Ordering::Relaxed);
                true
            }
        });
        won.then(|| SlotRef { slot, index })
    }
}

impl<const N: usize> Default for EdgeSlots<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive task-side handle to one claimed slot.
///
/// Releases the claim on drop.
#[derive(Debug)]
pub struct SlotRef<'a> {
    slot: &'a EdgeSlot,
    index: usize,
}

impl<'a> SlotRef<'a> {
    /// Index of the claimed slot within its bank.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The underlying shared record.
    pub fn slot(&self) -> &'a EdgeSlot {
        self.slot
    }
}

impl Drop for SlotRef<'_> {
    fn drop(&mut self) {
        self.slot.claimed.store(false, Ordering::Release);
    }
}
