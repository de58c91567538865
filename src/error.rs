//! Error types for the MIRA800 PHY driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`IoError`]: Register-bus and timeout failures
//! - [`TopologyError`]: Invalid (channel, package) combinations
//! - [`MsgError`]: Mailbox and MSG2 protocol failures
//! - [`FecError`]: FEC statistics poller failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.

// =============================================================================
// I/O Errors
// =============================================================================

/// Register-bus and timing errors
///
/// These errors occur on the raw MDIO/I2C transaction path or in the
/// bounded polling loops built on top of it. Bus failures propagate
/// unchanged from the integrator's [`RegisterBus`](crate::hal::RegisterBus);
/// no retries are performed at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Underlying bus transaction failed
    Bus,
    /// Bounded polling loop exhausted
    Timeout,
    /// Integrator-supplied hardware lock could not be taken or released
    LockFailed,
    /// Caller-supplied buffer too small for the data
    BufferTooSmall,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Bus => "bus transaction failed",
            IoError::Timeout => "operation timed out",
            IoError::LockFailed => "hardware lock failed",
            IoError::BufferTooSmall => "buffer too small",
        }
    }
}

// =============================================================================
// Topology Errors
// =============================================================================

/// Channel/package remapping errors
///
/// The address remapper rejects combinations that are not wired on the
/// discovered package variant. The original vendor code only logged these;
/// here they are surfaced as typed errors so callers can act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TopologyError {
    /// Logical channel 0 or beyond the interface's channel count
    InvalidChannel,
    /// Channel exists but is not bonded out on this package variant
    UnsupportedChannel,
    /// A logical channel was passed against a global/broadcast register
    GlobalRegister,
    /// EFUSE package field holds an unrecognized value
    UnknownPackage,
}

impl core::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TopologyError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TopologyError::InvalidChannel => "invalid logical channel",
            TopologyError::UnsupportedChannel => "channel not present on package",
            TopologyError::GlobalRegister => "channel passed against global register",
            TopologyError::UnknownPackage => "unrecognized package type",
        }
    }
}

// =============================================================================
// Messaging Errors
// =============================================================================

/// Mailbox and MSG2 transport errors
///
/// Protocol desynchronization ([`MsgError::Desync`],
/// [`MsgError::ChecksumMismatch`], [`MsgError::LengthMismatch`]) is
/// recovered locally by erasing the affected ring buffer; the caller must
/// restart the exchange from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsgError {
    /// MCU firmware is not in a message-capable mode
    FwNotReady,
    /// Ring buffer state no longer trusted; buffer was erased
    Desync,
    /// Frame checksum did not match; buffer was erased
    ChecksumMismatch,
    /// Declared frame length exceeds available data or caller capacity
    LengthMismatch,
    /// Response carried an unexpected message type or id
    UnexpectedType,
    /// Message does not fit the mailbox or ring buffer
    Overflow,
}

impl core::fmt::Display for MsgError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MsgError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MsgError::FwNotReady => "firmware not ready for messages",
            MsgError::Desync => "message buffer desynchronized",
            MsgError::ChecksumMismatch => "message checksum mismatch",
            MsgError::LengthMismatch => "message length mismatch",
            MsgError::UnexpectedType => "unexpected message type",
            MsgError::Overflow => "message too large for transport",
        }
    }
}

// =============================================================================
// FEC Poller Errors
// =============================================================================

/// FEC statistics poller errors
///
/// All of these leave the poller in its terminal error state; a fresh
/// `fec_stats_request` is required before the next `fec_stats_get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FecError {
    /// `get` called with no outstanding request
    NotRequested,
    /// Firmware poll counter did not advance since the previous snapshot
    Stale,
    /// Response violated the snapshot protocol (type/length/checksum)
    Protocol,
}

impl core::fmt::Display for FecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FecError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FecError::NotRequested => "no outstanding stats request",
            FecError::Stale => "stale poll counter",
            FecError::Protocol => "stats protocol violation",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Topology(TopologyError::UnsupportedChannel)) => { /* ... */ }
///     Err(Error::Msg(MsgError::Desync)) => { /* restart exchange */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus / timing error
    Io(IoError),
    /// Channel/package remapping error
    Topology(TopologyError),
    /// Messaging transport error
    Msg(MsgError),
    /// FEC poller error
    Fec(FecError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
            Error::Topology(e) => write!(f, "topology: {}", e.as_str()),
            Error::Msg(e) => write!(f, "msg: {}", e.as_str()),
            Error::Fec(e) => write!(f, "fec: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<TopologyError> for Error {
    fn from(e: TopologyError) -> Self {
        Error::Topology(e)
    }
}

impl From<MsgError> for Error {
    fn from(e: MsgError) -> Self {
        Error::Msg(e)
    }
}

impl From<FecError> for Error {
    fn from(e: FecError) -> Self {
        Error::Fec(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for raw bus operations
pub type IoResult<T> = core::result::Result<T, IoError>;

/// Result type alias for remapping operations
pub type TopologyResult<T> = core::result::Result<T, TopologyError>;

/// Result type alias for messaging operations
pub type MsgResult<T> = core::result::Result<T, MsgError>;

// =============================================================================
// Unit Tests
// =============================================================================
