//! Register Transport over the Shared Bus
//!
//! ## Model
//!
//! Every register-oriented chip in this workspace speaks the same dialect:
//! write a register pointer, then read or write a handful of bytes. The
//! [`RegisterBus`] wraps an `embedded_hal::i2c::I2c` instance, binds it to
//! one device address, and exposes exactly that dialect - typed reads for
//! the common widths, staged writes, and an address probe.
//!
//! Sharing one physical bus between several drivers is the platform's
//! concern: hand each driver its own `I2c` instance (HAL bus managers
//! produce shareable handles). The cooperative acquisition loop guarantees
//! transactions never interleave within one runtime.
//!
//! ## Fault Mapping
//!
//! HAL implementations report `embedded_hal::i2c::ErrorKind`; the transport
//! maps those into the [`TransportError`] taxonomy so the lifecycle FSM can
//! act on categories instead of HAL specifics:
//!
//! | HAL kind                  | write path            | read path           |
//! |---------------------------|-----------------------|---------------------|
//! | `NoAcknowledge(Address)`  | `WriteNackOnAddress`  | `ReadRequestFailed` |
//! | `NoAcknowledge(Data)`     | `WriteNackOnData`     | `ReadRequestFailed` |
//! | `NoAcknowledge(Unknown)`  | `WriteErrOther`       | `ReadRequestFailed` |
//! | `Bus`, `ArbitrationLoss`  | `HwError`             | `HwError`           |
//! | `Overrun`, `Other`, rest  | `WriteErrOther`       | `ReadErrOther`      |
//!
//! `WriteTimeout` and `WriteInvalidCode` cannot be derived from the portable
//! kinds; ports whose HALs distinguish them can pre-map before the error
//! reaches this layer. The probe maps any no-acknowledge to
//! `DeviceNotAtAddress`.
//!
//! Every operation latches its outcome: [`RegisterBus::last_error`] returns
//! the fault of the most recent transaction, or `None` after a success.
//!
//! ## Interrupt Masking
//!
//! A port may need a short interrupt-quiet window for a time-critical byte
//! read (one transaction, nothing more). That policy is the [`IrqGuard`]
//! seam; the default [`NoMask`] does nothing, which is correct for hosts
//! and for ports whose pulse decoding tolerates bus traffic.

use embedded_hal::i2c::{Error as I2cError, ErrorKind, I2c, NoAcknowledgeSource};

use crate::errors::{TransportError, TransportResult};

/// Largest payload accepted by [`RegisterBus::write_bytes`], excluding the
/// register pointer byte.
pub const WRITE_STAGING: usize = 32;

/// Strategy for masking interrupts around one time-critical transaction.
pub trait IrqGuard {
    /// Run `op` with the port's interrupt policy applied.
    fn masked<R>(&mut self, op: impl FnOnce() -> R) -> R;
}

/// Guard that never masks anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMask;

impl IrqGuard for NoMask {
    fn masked<R>(&mut self, op: impl FnOnce() -> R) -> R {
        op()
    }
}

fn write_fault(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => TransportError::WriteNackOnAddress,
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => TransportError::WriteNackOnData,
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown) => TransportError::WriteErrOther,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss => TransportError::HwError,
        _ => TransportError::WriteErrOther,
    }
}

fn read_fault(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(_) => TransportError::ReadRequestFailed,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss => TransportError::HwError,
        _ => TransportError::ReadErrOther,
    }
}

fn probe_fault(kind: ErrorKind, address: u8) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(_) => TransportError::DeviceNotAtAddress { address },
        _ => TransportError::HwError,
    }
}

/// Register-oriented access to one device on the shared bus.
pub struct RegisterBus<I2C, G = NoMask> {
    i2c: I2C,
    address: u8,
    guard: G,
    last_error: Option<TransportError>,
}

impl<I2C: I2c> RegisterBus<I2C> {
    /// Bind `i2c` to `address` with no interrupt masking.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self::with_guard(i2c, address, NoMask)
    }
}

impl<I2C: I2c, G: IrqGuard> RegisterBus<I2C, G> {
    /// Bind `i2c` to `address` with an explicit masking strategy.
    pub fn with_guard(i2c: I2C, address: u8, guard: G) -> Self {
        Self {
            i2c,
            address,
            guard,
            last_error: None,
        }
    }

    /// Device address this bus handle is bound to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Fault of the most recent operation, `None` after a success.
    pub fn last_error(&self) -> Option<TransportError> {
        self.last_error
    }

    /// Hand the HAL instance back (tests use this to finalize mocks).
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn finish<T>(&mut self, result: TransportResult<T>) -> TransportResult<T> {
        self.last_error = result.as_ref().err().copied();
        result
    }

    /// Probe whether any device acknowledges the bound address.
    pub fn check_address(&mut self) -> TransportResult<()> {
        let address = self.address;
        let result = self
            .i2c
            .write(address, &[])
            .map_err(|e| probe_fault(e.kind(), address));
        self.finish(result)
    }

    /// Read one byte from `reg`.
    pub fn read_byte(&mut self, reg: u8) -> TransportResult<u8> {
        let mut buf = [0u8; 1];
        let result = self
            .i2c
            .write_read(self.address, &[reg], &mut buf)
            .map(|()| buf[0])
            .map_err(|e| read_fault(e.kind()));
        self.finish(result)
    }

    /// Read one byte from `reg` inside the port's interrupt-quiet window.
    pub fn read_byte_uninterruptible(&mut self, reg: u8) -> TransportResult<u8> {
        let Self {
            i2c,
            address,
            guard,
            ..
        } = self;
        let address = *address;
        let mut buf = [0u8; 1];
        let result = guard
            .masked(|| i2c.write_read(address, &[reg], &mut buf))
            .map(|()| buf[0])
            .map_err(|e| read_fault(e.kind()));
        self.finish(result)
    }

    /// Read a big-endian `u16` starting at `reg`.
    pub fn read_word(&mut self, reg: u8) -> TransportResult<u16> {
        let mut buf = [0u8; 2];
        let result = self
            .i2c
            .write_read(self.address, &[reg], &mut buf)
            .map(|()| u16::from_be_bytes(buf))
            .map_err(|e| read_fault(e.kind()));
        self.finish(result)
    }

    /// Read a little-endian `u16` starting at `reg`.
    pub fn read_word_le(&mut self, reg: u8) -> TransportResult<u16> {
        let mut buf = [0u8; 2];
        let result = self
            .i2c
            .write_read(self.address, &[reg], &mut buf)
            .map(|()| u16::from_le_bytes(buf))
            .map_err(|e| read_fault(e.kind()));
        self.finish(result)
    }

    /// Read a big-endian 24-bit value starting at `reg`.
    pub fn read_u24(&mut self, reg: u8) -> TransportResult<u32> {
        let mut buf = [0u8; 3];
        let result = self
            .i2c
            .write_read(self.address, &[reg], &mut buf)
            .map(|()| (u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]))
            .map_err(|e| read_fault(e.kind()));
        self.finish(result)
    }

    /// Burst-read `buf.len()` bytes starting at `reg` in one transaction.
    pub fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> TransportResult<()> {
        let result = self
            .i2c
            .write_read(self.address, &[reg], buf)
            .map_err(|e| read_fault(e.kind()));
        self.finish(result)
    }

    /// Write one byte to `reg`.
    pub fn write_byte(&mut self, reg: u8, value: u8) -> TransportResult<()> {
        let result = self
            .i2c
            .write(self.address, &[reg, value])
            .map_err(|e| write_fault(e.kind()));
        self.finish(result)
    }

    /// Write one byte to `reg`, read it back, and require the value stuck.
    ///
    /// Used during initialization for configuration registers whose silent
    /// rejection would otherwise go unnoticed until the data looks wrong.
    pub fn write_byte_checked(&mut self, reg: u8, value: u8) -> TransportResult<()> {
        self.write_byte(reg, value)?;
        let back = self.read_byte(reg)?;
        if back == value {
            Ok(())
        } else {
            self.finish(Err(TransportError::ValueWriteError))
        }
    }

    /// Write a bare register pointer with no data (used as a command strobe).
    pub fn write_command(&mut self, reg: u8) -> TransportResult<()> {
        let result = self
            .i2c
            .write(self.address, &[reg])
            .map_err(|e| write_fault(e.kind()));
        self.finish(result)
    }

    /// Write `data` to consecutive registers starting at `reg`.
    ///
    /// Stages the pointer and payload into one transaction; payloads longer
    /// than [`WRITE_STAGING`] are rejected without touching the bus.
    pub fn write_bytes(&mut self, reg: u8, data: &[u8]) -> TransportResult<()> {
        if data.len() > WRITE_STAGING {
            return self.finish(Err(TransportError::WriteDataTooLong));
        }
        let mut frame = [0u8; WRITE_STAGING + 1];
        frame[0] = reg;
        frame[1..=data.len()].copy_from_slice(data);
        let result = self
            .i2c
            .write(self.address, &frame[..=data.len()])
            .map_err(|e| write_fault(e.kind()));
        self.finish(result)
    }
}
