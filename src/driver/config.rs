//! Configuration types for the MIRA800 driver

use crate::internal::constants::{
    FW_MODE_TIMEOUT_US, MBOX_TIMEOUT_US, MSG2_DATA_TIMEOUT_US, MSG2_LOCK_RETRIES, POLL_INTERVAL_US,
};
use crate::internal::regs::MSG2_SHARED_BASE;

/// MCU firmware execution mode
///
/// Read from the firmware-mode status register. Both `Boot` and `App`
/// firmware accept messages; `Unknown` means ROM code is still running
/// and the mailbox must not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FwMode {
    /// Undetermined, ROM still executing
    Unknown,
    /// Bootloader running (limited command set)
    Boot,
    /// Application firmware running
    App,
}

impl FwMode {
    /// Decode the firmware-mode register value
    pub const fn from_reg(value: u16) -> Self {
        match value {
            1 => FwMode::Boot,
            2 => FwMode::App,
            _ => FwMode::Unknown,
        }
    }

    /// Whether firmware in this mode handles mailbox messages
    pub const fn is_message_capable(self) -> bool {
        !matches!(self, FwMode::Unknown)
    }
}

/// Driver configuration
///
/// All timeouts are expressed in microseconds and bound the polling
/// loops of the corresponding operations. Defaults match the firmware
/// team's recommended values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhyConfig {
    /// Delay between polling-loop iterations
    pub poll_interval_us: u32,
    /// Bound on waiting for mailbox FIFO space or data
    pub mbox_timeout_us: u32,
    /// Bound on waiting for a firmware-mode transition
    pub fw_mode_timeout_us: u32,
    /// Bound on waiting for MSG2 response data
    pub msg2_data_timeout_us: u32,
    /// MSG2 ring-lock acquisition attempts before giving up
    pub msg2_lock_retries: u32,
    /// MCU address of the MSG2 shared control block
    pub msg2_base: u32,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: POLL_INTERVAL_US,
            mbox_timeout_us: MBOX_TIMEOUT_US,
            fw_mode_timeout_us: FW_MODE_TIMEOUT_US,
            msg2_data_timeout_us: MSG2_DATA_TIMEOUT_US,
            msg2_lock_retries: MSG2_LOCK_RETRIES,
            msg2_base: MSG2_SHARED_BASE,
        }
    }
}

impl PhyConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }

    /// Set the mailbox space/data timeout
    #[must_use]
    pub const fn with_mbox_timeout_us(mut self, us: u32) -> Self {
        self.mbox_timeout_us = us;
        self
    }

    /// Set the firmware-mode transition timeout
    #[must_use]
    pub const fn with_fw_mode_timeout_us(mut self, us: u32) -> Self {
        self.fw_mode_timeout_us = us;
        self
    }

    /// Set the MSG2 response-data timeout
    #[must_use]
    pub const fn with_msg2_data_timeout_us(mut self, us: u32) -> Self {
        self.msg2_data_timeout_us = us;
        self
    }

    /// Set the MSG2 shared control block address
    ///
    /// Only needed for firmware builds that relocate the control block;
    /// the default matches production firmware.
    #[must_use]
    pub const fn with_msg2_base(mut self, base: u32) -> Self {
        self.msg2_base = base;
        self
    }
}
