//! Internal constants and magic numbers
//!
//! Timeouts are expressed as `iterations x per-iteration delay`; every
//! blocking wait in the driver is a bounded poll over `DelayNs`.

// =============================================================================
// Polling / Timing
// =============================================================================

/// Per-iteration sleep inside every polling loop, in microseconds
pub const POLL_INTERVAL_US: u32 = 1_000;

/// Default mailbox space/data wait, in microseconds (order of seconds)
pub const MBOX_TIMEOUT_US: u32 = 2_000_000;

/// Default wait for the MCU firmware mode transition, in microseconds
pub const FW_MODE_TIMEOUT_US: u32 = 5_000_000;

/// Default number of MSG2 lock acquisition attempts before timing out
pub const MSG2_LOCK_RETRIES: u32 = 1_000;

/// Default wait for MSG2 receive data, in microseconds
pub const MSG2_DATA_TIMEOUT_US: u32 = 2_000_000;

// =============================================================================
// Mailbox framing
// =============================================================================

/// Hardware depth of each mailbox FIFO, in 16-bit entries
pub const MBOX_FIFO_DEPTH: u16 = 32;

/// Mailbox header size in 32-bit words (id/type/len word + parameter word)
pub const MBOX_HEADER_WORDS: usize = 2;

/// Largest mailbox payload the driver will send or decode, in 32-bit words
pub const MBOX_MAX_PAYLOAD_WORDS: usize = 64;

// =============================================================================
// MSG2 framing
// =============================================================================

/// Minimum complete MSG2 frame: header word + checksum word
pub const MSG2_MIN_FRAME_WORDS: u32 = 2;

/// Largest MSG2 frame the driver will push or pull, in 32-bit words
pub const MSG2_MAX_FRAME_WORDS: u32 = 64;

/// Upper bound accepted for a ring descriptor's `length` field, in words.
/// Anything larger means the descriptor cache is stale or corrupt.
pub const MSG2_MAX_RING_WORDS: u32 = 1024;
