//! Address remapping: logical channel to physical (die, instance, addr)
//!
//! These functions are pure. They take the already-discovered package
//! type and never touch the bus, which keeps every remap decision
//! testable on the host without hardware.

use crate::error::{TopologyError, TopologyResult};

use super::{
    channel_map, serdes_instance, Channel, Die, Intf, PackageType, RegBlock,
};

// =============================================================================
// Result Types
// =============================================================================

/// Physical location of one channel of a register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhysicalLocation {
    /// Die the instance lives on (base address plus die offset, no tag)
    pub die: Die,
    /// Instance number inside the block window
    pub instance: u8,
}

/// Fully resolved register access target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResolvedAddress {
    /// Die to address on the bus
    pub die: Die,
    /// Instance number the address was rebased for
    pub instance: u8,
    /// Rebased register address
    pub addr: u16,
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a register address into its owning block
///
/// Total over the whole address space: addresses outside every
/// channelized window classify as [`RegBlock::Global`].
pub const fn classify(addr: u16) -> RegBlock {
    let mut i = 0;
    while i < RegBlock::CHANNELIZED.len() {
        let block = RegBlock::CHANNELIZED[i];
        // window() is Some for every CHANNELIZED entry
        if let Some(w) = block.window() {
            if addr >= w.start && addr < w.end {
                return block;
            }
        }
        i += 1;
    }
    RegBlock::Global
}

// =============================================================================
// Remapping
// =============================================================================

/// Map a logical channel of a block to its physical (die, instance)
///
/// `die` may carry a cached package tag; only its base address is used.
/// Fails with [`TopologyError::GlobalRegister`] for [`RegBlock::Global`],
/// [`TopologyError::InvalidChannel`] for channel numbers no package can
/// have, and [`TopologyError::UnsupportedChannel`] for channels not
/// bonded out on this particular package.
pub fn remap(
    pkg: PackageType,
    die: Die,
    channel: Channel,
    block: RegBlock,
) -> TopologyResult<PhysicalLocation> {
    let Some(window) = block.window() else {
        return Err(TopologyError::GlobalRegister);
    };

    match channel {
        Channel::Broadcast => {
            Ok(PhysicalLocation {
                die: die.base(),
                instance: window.broadcast_instance,
            })
        }
        Channel::Logical(n) => {
            if n == 0 || n > super::MAX_CHANNELS {
                return Err(TopologyError::InvalidChannel);
            }
            match channel_map(pkg, block, n) {
                Some((die_offset, instance)) => Ok(PhysicalLocation {
                    die: die.at_offset(die_offset),
                    instance,
                }),
                None => Err(TopologyError::UnsupportedChannel),
            }
        }
    }
}

/// Rebase an instance-0 register address onto one channel's instance
///
/// `channel == None` is the "no channel" access: legal only for global
/// registers, where the address passes through untouched. A channel
/// against a global register is rejected rather than silently ignored.
pub fn resolve_addr(
    pkg: PackageType,
    die: Die,
    channel: Option<Channel>,
    addr: u16,
) -> TopologyResult<ResolvedAddress> {
    let block = classify(addr);

    let Some(channel) = channel else {
        return match block {
            RegBlock::Global => Ok(ResolvedAddress {
                die: die.base(),
                instance: 0,
                addr,
            }),
            _ => Err(TopologyError::InvalidChannel),
        };
    };

    if block == RegBlock::Global {
        return Err(TopologyError::GlobalRegister);
    }

    let loc = remap(pkg, die, channel, block)?;
    rebase(block, loc, addr)
}

/// Rebase an instance-0 register address via an explicit interface
///
/// Same arithmetic as [`resolve_addr`], with the block chosen by the
/// caller instead of derived from the address. The address must lie in
/// the interface's instance-0 sub-window.
pub fn resolve_intf(
    pkg: PackageType,
    die: Die,
    channel: Channel,
    intf: Intf,
    addr: u16,
) -> TopologyResult<ResolvedAddress> {
    let block = intf.block();
    // window() is always Some for an Intf-derived block
    let Some(window) = block.window() else {
        return Err(TopologyError::GlobalRegister);
    };
    if addr < window.start || addr >= window.start + window.span {
        return Err(TopologyError::GlobalRegister);
    }

    let loc = remap(pkg, die, channel, block)?;
    rebase(block, loc, addr)
}

/// Apply the instance offset (and SRX/STX lane translation) to `addr`
fn rebase(block: RegBlock, loc: PhysicalLocation, addr: u16) -> TopologyResult<ResolvedAddress> {
    // remap() only returns locations for windowed blocks
    let Some(window) = block.window() else {
        return Err(TopologyError::GlobalRegister);
    };

    let slot = if loc.instance == window.broadcast_instance {
        loc.instance
    } else {
        serdes_instance(block, loc.instance).ok_or(TopologyError::UnsupportedChannel)?
    };

    let offset_in_instance = (addr - window.start) % window.span;
    let addr = window.start + (slot as u16) * window.span + offset_in_instance;

    Ok(ResolvedAddress {
        die: loc.die,
        instance: loc.instance,
        addr,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
