//! Fault Taxonomy for Bus Transactions and Pulse Frames
//!
//! ## Design Philosophy
//!
//! TickSense runs on microcontrollers, so the error system follows the same
//! rules as the rest of the core:
//!
//! 1. **Small and Copy**: every variant carries at most a few bytes of inline
//!    context. Errors travel through hot acquisition paths and are latched in
//!    per-bus state, so they must be cheap to move and store.
//!
//! 2. **No Heap Allocation**: no `String`, no boxed sources. Context is raw
//!    bytes (addresses, chip ids, pulse widths) that a log line or a bus
//!    payload can render directly.
//!
//! 3. **Categorized, not stringly**: the acquisition FSM decides between
//!    "count and retry", "cool down" and "lock out" purely from the variant,
//!    never from message text.
//!
//! ## Layers
//!
//! [`TransportError`] covers everything that can go wrong talking to a
//! register-oriented peripheral on the shared bus. Hardware abstraction
//! layers report faults through `embedded_hal::i2c::ErrorKind`; the transport
//! maps those into this taxonomy (see [`crate::transport`]).
//!
//! [`WireFault`] covers timing violations while decoding an edge-timed
//! single-wire frame in interrupt context.
//!
//! [`SensorError`] is the union the lifecycle FSM consumes: a transport
//! fault, a frame-level fault, or a device that answered but is not usable.
//!
//! A bus with no recorded fault is represented as `Option<TransportError>`
//! being `None`; there is deliberately no "ok" variant inside the enum.

use thiserror_no_std::Error;

/// Result alias for register transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result alias for sensor-level operations driven by the lifecycle FSM.
pub type SensorResult<T> = Result<T, SensorError>;

/// Faults raised by register transport operations on the shared bus.
///
/// The write-side variants mirror the acknowledge phases of an I²C write;
/// the read-side variants collapse the request/fetch phases of a register
/// read. `WrongHardwareAtAddress` is raised by driver probes, not by the
/// transport itself: a device acknowledged the address but identified as a
/// different chip, which is treated as a permanent configuration error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Fault that fits no other category.
    #[error("unclassified bus fault")]
    Undefined,

    /// Electrical or controller-level bus fault (stuck lines, lost arbitration).
    #[error("bus hardware fault")]
    HwError,

    /// A device answered the probe but identified as a different chip.
    #[error("device at 0x{address:02x} identifies as 0x{found:02x}, expected 0x{expected:02x}")]
    WrongHardwareAtAddress {
        /// Bus address that was probed.
        address: u8,
        /// Chip id the driver requires.
        expected: u8,
        /// Chip id the device reported.
        found: u8,
    },

    /// No device acknowledged the address at all.
    #[error("no device at 0x{address:02x}")]
    DeviceNotAtAddress {
        /// Bus address that was probed.
        address: u8,
    },

    /// Writing the register pointer failed.
    #[error("register select failed")]
    RegisterWriteError,

    /// The register accepted the pointer but the value did not stick.
    #[error("register value rejected or read back different")]
    ValueWriteError,

    /// Write payload exceeds the transaction staging buffer.
    #[error("write payload too long")]
    WriteDataTooLong,

    /// Write was not acknowledged on the address byte.
    #[error("write nack on address")]
    WriteNackOnAddress,

    /// Write was not acknowledged on a data byte.
    #[error("write nack on data")]
    WriteNackOnData,

    /// Write failed for a reason the controller did not classify.
    #[error("write failed")]
    WriteErrOther,

    /// Write timed out before the transaction completed.
    #[error("write timeout")]
    WriteTimeout,

    /// Controller rejected the write parameters outright.
    #[error("write rejected by controller")]
    WriteInvalidCode,

    /// Read request was not served (no data clocked back).
    #[error("read request not served")]
    ReadRequestFailed,

    /// Read failed for a reason the controller did not classify.
    #[error("read failed")]
    ReadErrOther,
}

impl TransportError {
    /// Whether this fault means the wrong chip is wired at the address.
    ///
    /// The FSM treats this as permanent: no retry, no cooldown, the sensor
    /// goes unavailable until an explicit re-begin.
    pub fn is_wrong_hardware(&self) -> bool {
        matches!(self, Self::WrongHardwareAtAddress { .. })
    }
}

/// Timing violations detected while decoding a single-wire pulse frame.
///
/// Raised from interrupt context and stored in the capture slot as a code
/// byte plus the offending pulse width, so the task side can report what the
/// line actually did.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFault {
    /// Line was at the wrong level when the start pulse should have begun.
    #[error("wrong level at start pulse")]
    BadStartPulseLevel,

    /// Sensor reply pulse fell outside the accepted width window.
    #[error("reply pulse width out of window")]
    BadReplyPulseLength,

    /// Line did not return high after the start pulse.
    #[error("wrong level at start pulse end")]
    BadStartPulseEndLevel,

    /// Bit intro pulse fell outside the accepted width window.
    #[error("bit intro width out of window")]
    BadDataIntroPulseLength,

    /// Data pulse width matches neither a zero nor a one.
    #[error("data bit width out of window")]
    BadDataBitLength,
}

impl WireFault {
    /// Code byte used when the fault is parked in an atomic slot field.
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::BadStartPulseLevel => 1,
            Self::BadReplyPulseLength => 2,
            Self::BadStartPulseEndLevel => 3,
            Self::BadDataIntroPulseLength => 4,
            Self::BadDataBitLength => 5,
        }
    }

    /// Inverse of [`WireFault::code`]. Zero means "no fault recorded".
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::BadStartPulseLevel),
            2 => Some(Self::BadReplyPulseLength),
            3 => Some(Self::BadStartPulseEndLevel),
            4 => Some(Self::BadDataIntroPulseLength),
            5 => Some(Self::BadDataBitLength),
            _ => None,
        }
    }
}

/// Union of everything a sensor driver can report to the lifecycle FSM.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Register transport fault.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// A complete pulse frame arrived but its checksum does not add up.
    #[error("pulse frame checksum mismatch")]
    FrameChecksum,

    /// Pulse frame decoding aborted on a timing violation.
    #[error("pulse frame aborted: {kind} ({dt_us} us)")]
    FrameTiming {
        /// Which timing rule the line broke.
        kind: WireFault,
        /// Measured width of the offending pulse.
        dt_us: u32,
    },

    /// Device answered but its firmware state makes it unusable.
    #[error("device firmware not usable (status 0x{status:02x})")]
    FirmwareInvalid {
        /// Raw status byte the device reported.
        status: u8,
    },

    /// Device flagged an internal fault through its error register.
    #[error("device fault 0x{code:02x}")]
    DeviceFault {
        /// Raw error code the device reported.
        code: u8,
    },
}

impl SensorError {
    /// Whether the underlying cause is a wrong-chip probe result.
    pub fn is_wrong_hardware(&self) -> bool {
        matches!(self, Self::Transport(t) if t.is_wrong_hardware())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Undefined => defmt::write!(fmt, "unclassified bus fault"),
            Self::HwError => defmt::write!(fmt, "bus hardware fault"),
            Self::WrongHardwareAtAddress { address, expected, found } =>
                defmt::write!(fmt, "device at {=u8:#04x} is {=u8:#04x}, expected {=u8:#04x}",
                    *address, *found, *expected),
            Self::DeviceNotAtAddress { address } =>
                defmt::write!(fmt, "no device at {=u8:#04x}", *address),
            Self::RegisterWriteError => defmt::write!(fmt, "register select failed"),
            Self::ValueWriteError => defmt::write!(fmt, "register value rejected"),
            Self::WriteDataTooLong => defmt::write!(fmt, "write payload too long"),
            Self::WriteNackOnAddress => defmt::write!(fmt, "write nack on address"),
            Self::WriteNackOnData => defmt::write!(fmt, "write nack on data"),
            Self::WriteErrOther => defmt::write!(fmt, "write failed"),
            Self::WriteTimeout => defmt::write!(fmt, "write timeout"),
            Self::WriteInvalidCode => defmt::write!(fmt, "write rejected"),
            Self::ReadRequestFailed => defmt::write!(fmt, "read request not served"),
            Self::ReadErrOther => defmt::write!(fmt, "read failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for WireFault {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::BadStartPulseLevel => defmt::write!(fmt, "wrong level at start pulse"),
            Self::BadReplyPulseLength => defmt::write!(fmt, "reply pulse out of window"),
            Self::BadStartPulseEndLevel => defmt::write!(fmt, "wrong level at start pulse end"),
            Self::BadDataIntroPulseLength => defmt::write!(fmt, "bit intro out of window"),
            Self::BadDataBitLength => defmt::write!(fmt, "data bit out of window"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Transport(t) => defmt::write!(fmt, "transport: {}", t),
            Self::FrameChecksum => defmt::write!(fmt, "frame checksum mismatch"),
            Self::FrameTiming { kind, dt_us } =>
                defmt::write!(fmt, "frame aborted: {} ({=u32} us)", kind, *dt_us),
            Self::FirmwareInvalid { status } =>
                defmt::write!(fmt, "firmware not usable ({=u8:#04x})", *status),
            Self::DeviceFault { code } =>
                defmt::write!(fmt, "device fault {=u8:#04x}", *code),
        }
    }
}
