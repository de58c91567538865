//! MIRA800 PHY Driver
//!
//! A `no_std`, `no_alloc` Rust driver for the MIRA800 family of optical
//! PHY ASICs.
//!
//! The chip is controlled through a 16-bit register bus that the
//! integrator provides (MDIO, I2C or a board-specific transport) by
//! implementing [`RegisterBus`]. On top of that the crate supplies:
//!
//! 1. **Topology layer** ([`topology`]): package discovery from EFUSE,
//!    logical-to-physical channel remapping, instance window math
//! 2. **Driver layer** ([`driver`]): the [`Phy`] handle with raw and
//!    channel-aware register access, firmware-mode control, the legacy
//!    mailbox and the FEC statistics poller
//! 3. **MSG2 transport** ([`msg2`]): framed messaging over shared MCU
//!    memory with a cooperative ring lock
//! 4. **HAL layer** ([`hal`]): the [`RegisterBus`], [`SharedMem`] and
//!    [`HwLock`] integration seams
//!
//! Multi-die packages are addressed transparently: callers talk to the
//! lead die and a logical channel, and the driver routes the access to
//! the physical die and block instance the package bonds it to.
//!
//! # Features
//!
//! - `defmt`: Enable defmt formatting and diagnostics for driver types
//! - `critical-section`: Enable the ISR-safe [`SharedPhy`] wrapper
//!
//! # Example
//!
//! ```ignore
//! use mira800_phy::{Channel, Die, FwMode, Phy, PhyConfig};
//! use embedded_hal::delay::DelayNs;
//!
//! // Your bus and delay implementations (board-specific)
//! let bus = /* your RegisterBus implementation */;
//! let mut delay = /* your DelayNs implementation */;
//!
//! let mut phy = Phy::new(bus, PhyConfig::default());
//! let die = Die::new(0x40);
//!
//! phy.wait_for_fw_mode(die, &mut delay, FwMode::App)?;
//!
//! // Read a per-channel register; the driver resolves the physical
//! // die and instance from the package type.
//! let status = phy.ch_read(die, Some(Channel::Logical(3)), 0x1010)?;
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in clippy.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod error;
pub mod hal;
pub mod msg2;
pub mod topology;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "critical-section")]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{FwMode, PhyConfig};
pub use driver::fec::{FecBlocks, FecPoll, FecPoller, FecState, FecStats};
pub use driver::mailbox::{MboxHeader, MboxReply};
pub use driver::phy::{Phy, PifWindow};
pub use error::{
    Error, FecError, IoError, IoResult, MsgError, Result, TopologyError, TopologyResult,
};
pub use hal::{HwLock, NoLock, RegisterBus, SharedMem};
pub use msg2::Msg2Header;
pub use topology::{Channel, Die, Intf, PackageType, RegBlock};

// Re-export sync types when critical-section is enabled
#[cfg(feature = "critical-section")]
pub use sync::SharedPhy;

/// Shared driver constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on driver types and integration points.
pub mod constants {
    pub use crate::internal::constants::{
        // Mailbox geometry
        MBOX_FIFO_DEPTH,
        MBOX_MAX_PAYLOAD_WORDS,
        // Timing
        MBOX_TIMEOUT_US,
        FW_MODE_TIMEOUT_US,
        MSG2_DATA_TIMEOUT_US,
        MSG2_LOCK_RETRIES,
        POLL_INTERVAL_US,
        // MSG2 frame limits
        MSG2_MAX_FRAME_WORDS,
        MSG2_MIN_FRAME_WORDS,
    };
    pub use crate::internal::regs::MSG2_SHARED_BASE;
    pub use crate::topology::{BROADCAST_INSTANCE, MAX_CHANNELS};
}
