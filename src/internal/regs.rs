//! Register addresses and shared-memory layout the core touches
//!
//! Only the registers the messaging and remapping subsystems use are
//! reproduced here; the full product register map lives in the vendor
//! documentation and is out of scope.

// =============================================================================
// EFUSE
// =============================================================================

/// EFUSE shadow register carrying the package-type field
pub const EFUSE_PKG_TYPE: u16 = 0x0102;

/// Package-type field mask within [`EFUSE_PKG_TYPE`]
pub const EFUSE_PKG_TYPE_MASK: u16 = 0x000F;

// =============================================================================
// MCU control
// =============================================================================

/// Current MCU firmware mode
pub const MCU_FW_MODE: u16 = 0x0800;

/// Firmware mode: undetermined / ROM still executing
pub const FW_MODE_UNKNOWN: u16 = 0;

/// Firmware mode: bootloader (message-capable, limited command set)
pub const FW_MODE_BOOT: u16 = 1;

/// Firmware mode: application image running
pub const FW_MODE_APP: u16 = 2;

// =============================================================================
// Mailbox FIFOs (named from the MCU's perspective)
// =============================================================================

/// Free 16-bit slots in the host-to-MCU (RX) FIFO
pub const MBOX_RX_SPACE: u16 = 0x0810;

/// Host-to-MCU FIFO data port; each write pushes one 16-bit half-word
pub const MBOX_RX_DATA: u16 = 0x0811;

/// 16-bit entries waiting in the MCU-to-host (TX) FIFO
pub const MBOX_TX_COUNT: u16 = 0x0812;

/// MCU-to-host FIFO data port; each read pops one 16-bit half-word
pub const MBOX_TX_DATA: u16 = 0x0813;

/// Write 1 to discard everything queued in the host-to-MCU FIFO
pub const MBOX_RX_FLUSH: u16 = 0x0814;

// =============================================================================
// PIF (Processor Interface) window into MCU memory
// =============================================================================
//
// A 32-bit memory access takes two address writes followed by two data
// half-word accesses. Reading DATA after latching ADDR performs the read;
// writing DATA_MSW commits the write.

/// PIF target address, low 16 bits
pub const PIF_ADDR_LSW: u16 = 0x0820;

/// PIF target address, high 16 bits
pub const PIF_ADDR_MSW: u16 = 0x0821;

/// PIF data, low 16 bits
pub const PIF_DATA_LSW: u16 = 0x0822;

/// PIF data, high 16 bits; the write strobe
pub const PIF_DATA_MSW: u16 = 0x0823;

// =============================================================================
// MSG2 shared-memory layout (MCU address space, via PIF)
// =============================================================================

/// Base of the MSG2 shared control block in MCU RAM
pub const MSG2_SHARED_BASE: u32 = 0x5FF8_0000;

/// Byte offset of the API-to-firmware ring descriptor
pub const MSG2_API2FW_DESC: u32 = 0x00;

/// Byte offset of the firmware-to-API ring descriptor
pub const MSG2_FW2API_DESC: u32 = 0x10;

/// Byte offset of the host-side lock intent flag
pub const MSG2_LOCK_FLAG_API: u32 = 0x20;

/// Byte offset of the firmware-side lock intent flag
pub const MSG2_LOCK_FLAG_FW: u32 = 0x24;

/// Byte offset of the lock turn word (0 = API's turn, 1 = firmware's turn)
pub const MSG2_LOCK_TURN: u32 = 0x28;

/// Byte offset of a ring descriptor's `length` field (in words)
pub const MSG2_DESC_LENGTH: u32 = 0x0;

/// Byte offset of a ring descriptor's write index
pub const MSG2_DESC_WR_IDX: u32 = 0x4;

/// Byte offset of a ring descriptor's read index
pub const MSG2_DESC_RD_IDX: u32 = 0x8;

/// Byte offset of a ring descriptor's buffer base address
pub const MSG2_DESC_BUF_ADDR: u32 = 0xC;
