//! Core driver components for the MIRA800 PHY.
//!
//! This module contains the essential building blocks for operating the
//! part over its management bus:
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`phy`] - The main driver handle: register access, remapping, PIF
//! - [`mailbox`] - Legacy FIFO mailbox transport to the MCU
//! - [`fec`] - FEC statistics poller built on the MSG2 transport
//!
//! # Example
//!
//! ```ignore
//! use mira800_phy::driver::{Phy, PhyConfig};
//!
//! let config = PhyConfig::new().with_mbox_timeout_us(1_000_000);
//! let mut phy = Phy::new(bus, config);
//! ```

// Submodules
pub mod config;
pub mod fec;
pub mod mailbox;
pub mod phy;

// Re-exports for convenience
pub use config::{FwMode, PhyConfig};
pub use fec::{FecBlocks, FecPoll, FecPoller, FecState, FecStats};
pub use mailbox::{MboxHeader, MboxReply, MBOX_TYPE_STATUS, NO_RC_TYPES};
pub use phy::{Phy, PifWindow};
