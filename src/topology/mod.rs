//! Package/channel topology: dies, packages, register blocks
//!
//! A MIRA800 package contains one or two dies, and the mapping from a
//! logical, 1-based channel number to a physical (die, instance) pair is
//! a property of the package variant, discovered once via EFUSE.
//!
//! This module holds the topology types and the per-package lookup
//! matrices; the address arithmetic lives in [`remap`].

use crate::error::{Error, Result, TopologyError};
use crate::hal::RegisterBus;
use crate::internal::regs::{EFUSE_PKG_TYPE, EFUSE_PKG_TYPE_MASK};

pub mod remap;

pub use remap::{classify, remap, resolve_addr, resolve_intf, PhysicalLocation, ResolvedAddress};

// =============================================================================
// Die Handle
// =============================================================================

/// Handle to one die of a package
///
/// The upper bits carry the die's base bus address. The low nibble is a
/// cache slot for the package-type tag (`0` = unresolved), so that a
/// caller threading the same handle through repeated calls avoids
/// re-probing EFUSE.
///
/// # Invariant
///
/// The tag nibble aliases the die-select bits of a *physical* die
/// address. The public raw accessors therefore re-derive the base
/// address with [`Die::base`] first; only the remapper produces physical
/// handles (`base + die_offset`), those never carry a tag, and the
/// channel-aware accessors put them on the bus unmasked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Die(u32);

impl Die {
    /// Create a die handle from a raw bus address
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw handle value (base address plus any cached tag)
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Base bus address with the tag nibble masked off
    #[inline(always)]
    pub const fn base(self) -> Self {
        Self(self.0 & !0xF)
    }

    /// Package type cached in the tag nibble, if any
    pub const fn cached_package(self) -> Option<PackageType> {
        PackageType::from_tag((self.0 & 0xF) as u8)
    }

    /// Return a copy of this handle with the package tag cached
    pub const fn with_package(self, pkg: PackageType) -> Self {
        Self((self.0 & !0xF) | pkg.tag() as u32)
    }

    /// Physical die handle at `base + die_offset`
    pub(crate) const fn at_offset(self, die_offset: u8) -> Self {
        Self((self.0 & !0xF) + die_offset as u32)
    }
}

// =============================================================================
// Package Type
// =============================================================================

/// Package variant, as recorded in EFUSE
///
/// The variant determines how many dies the package carries and how
/// logical channels are wired to physical instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PackageType {
    /// Unpackaged single die (engineering boards)
    BareDie,
    /// EML 15x14 package, top-die channel ordering
    EmlTop15x14,
    /// EML 15x14 package, bottom-die channel ordering (mirrored lanes)
    EmlBot15x14,
    /// CWDM 12x13 single-die package with remapped line lanes
    Cwdm12x13,
}

impl PackageType {
    /// Decode the EFUSE package field; `None` for unrecognized values
    pub const fn from_efuse(value: u16) -> Option<Self> {
        Self::from_tag((value & EFUSE_PKG_TYPE_MASK) as u8)
    }

    /// Decode a tag-nibble value; `0` means unresolved
    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(PackageType::BareDie),
            2 => Some(PackageType::EmlTop15x14),
            3 => Some(PackageType::EmlBot15x14),
            4 => Some(PackageType::Cwdm12x13),
            _ => None,
        }
    }

    /// Tag-nibble encoding of this package type (never 0)
    pub const fn tag(self) -> u8 {
        match self {
            PackageType::BareDie => 1,
            PackageType::EmlTop15x14 => 2,
            PackageType::EmlBot15x14 => 3,
            PackageType::Cwdm12x13 => 4,
        }
    }

    /// Number of dies in the package
    pub const fn die_count(self) -> u8 {
        match self {
            PackageType::BareDie | PackageType::Cwdm12x13 => 1,
            PackageType::EmlTop15x14 | PackageType::EmlBot15x14 => 2,
        }
    }

    /// Number of logical channels bonded out per interface
    pub const fn channel_count(self) -> u8 {
        match self {
            PackageType::BareDie | PackageType::Cwdm12x13 => 4,
            PackageType::EmlTop15x14 | PackageType::EmlBot15x14 => 8,
        }
    }

    /// Discover the package type for a die
    ///
    /// Resolution order: tag nibble cached in the handle, then the
    /// caller-owned [`PackageCache`], then one EFUSE read (whose result
    /// is stored in the cache).
    pub fn discover<B: RegisterBus>(
        bus: &mut B,
        die: Die,
        cache: &mut PackageCache,
    ) -> Result<Self> {
        if let Some(pkg) = die.cached_package() {
            return Ok(pkg);
        }
        if let Some(pkg) = cache.get() {
            return Ok(pkg);
        }

        let efuse = bus.reg_get(die.base(), EFUSE_PKG_TYPE)?;
        match Self::from_efuse(efuse) {
            Some(pkg) => {
                cache.set(pkg);
                Ok(pkg)
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!("EFUSE package field {:#06x} not recognized", efuse);
                Err(Error::Topology(TopologyError::UnknownPackage))
            }
        }
    }
}

// =============================================================================
// Package Cache
// =============================================================================

/// Caller-owned cache for the discovered package type
///
/// EFUSE is probed at most once per cache lifetime. A populated cache is
/// only ever replaced through [`PackageCache::clear`]; `set` on an
/// already-populated cache keeps the existing value.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PackageCache {
    cached: Option<PackageType>,
}

impl PackageCache {
    /// Create an empty cache
    pub const fn new() -> Self {
        Self { cached: None }
    }

    /// Currently cached package type, if any
    pub const fn get(&self) -> Option<PackageType> {
        self.cached
    }

    /// Populate the cache; append-only (a populated cache is unchanged)
    pub fn set(&mut self, pkg: PackageType) {
        if self.cached.is_none() {
            self.cached = Some(pkg);
        }
    }

    /// Explicitly reset the cache (e.g. after moving to another part)
    pub fn clear(&mut self) {
        self.cached = None;
    }
}

// =============================================================================
// Channels and Interfaces
// =============================================================================

/// Logical channel selector
///
/// Channels are 1-based per interface; `Broadcast` addresses every
/// instance of a block at once (multi-instance packages only).
/// The wire encoding uses `0xFF` for broadcast; `0` is not a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// All instances of the block simultaneously
    Broadcast,
    /// One logical channel, 1-based
    Logical(u8),
}

impl Channel {
    /// Wire value for broadcast
    pub const BROADCAST_WIRE: u8 = 0xFF;

    /// Decode a wire channel number; `0` is rejected
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            Self::BROADCAST_WIRE => Some(Channel::Broadcast),
            0 => None,
            n => Some(Channel::Logical(n)),
        }
    }

    /// Wire encoding of this selector
    pub const fn wire(self) -> u8 {
        match self {
            Channel::Broadcast => Self::BROADCAST_WIRE,
            Channel::Logical(n) => n,
        }
    }
}

/// Datapath interface (register block family) selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Intf {
    /// Optical/line receive
    Orx,
    /// Optical/line transmit
    Otx,
    /// Host-side media receive
    Mrx,
    /// Host-side media transmit
    Mtx,
    /// SerDes receive (low-level lane registers)
    Srx,
    /// SerDes transmit (low-level lane registers)
    Stx,
}

impl Intf {
    /// Register block this interface addresses
    pub const fn block(self) -> RegBlock {
        match self {
            Intf::Orx => RegBlock::Orx,
            Intf::Otx => RegBlock::Otx,
            Intf::Mrx => RegBlock::Mrx,
            Intf::Mtx => RegBlock::Mtx,
            Intf::Srx => RegBlock::Srx,
            Intf::Stx => RegBlock::Stx,
        }
    }
}

// =============================================================================
// Register Blocks
// =============================================================================

/// Register block owning an address
///
/// Derived purely from the register address via an ascending range table.
/// `Global` registers are not channelized; everything below the first
/// channel window (and anything above the last) classifies as `Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegBlock {
    /// Broadcast/global registers; no per-channel instances
    Global,
    /// Optical/line receive block
    Orx,
    /// Optical/line transmit block
    Otx,
    /// Host-side media receive block
    Mrx,
    /// Host-side media transmit block
    Mtx,
    /// SerDes receive lane block
    Srx,
    /// SerDes transmit lane block
    Stx,
}

/// Address-window geometry of one channelized register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockWindow {
    /// First address of the block window (instance 0)
    pub start: u16,
    /// One past the last address of the block window
    pub end: u16,
    /// Address distance between adjacent instances
    pub span: u16,
    /// Instance number decoding to "all instances at once"
    pub broadcast_instance: u8,
}

impl RegBlock {
    /// Window geometry; `None` for [`RegBlock::Global`]
    pub const fn window(self) -> Option<BlockWindow> {
        match self {
            RegBlock::Global => None,
            RegBlock::Orx => Some(BlockWindow {
                start: 0x1000,
                end: 0x1800,
                span: 0x100,
                broadcast_instance: BROADCAST_INSTANCE,
            }),
            RegBlock::Otx => Some(BlockWindow {
                start: 0x1800,
                end: 0x2000,
                span: 0x100,
                broadcast_instance: BROADCAST_INSTANCE,
            }),
            RegBlock::Mrx => Some(BlockWindow {
                start: 0x2000,
                end: 0x2800,
                span: 0x100,
                broadcast_instance: BROADCAST_INSTANCE,
            }),
            RegBlock::Mtx => Some(BlockWindow {
                start: 0x2800,
                end: 0x3000,
                span: 0x100,
                broadcast_instance: BROADCAST_INSTANCE,
            }),
            RegBlock::Srx => Some(BlockWindow {
                start: 0x3000,
                end: 0x4000,
                span: 0x200,
                broadcast_instance: BROADCAST_INSTANCE,
            }),
            RegBlock::Stx => Some(BlockWindow {
                start: 0x4000,
                end: 0x5000,
                span: 0x200,
                broadcast_instance: BROADCAST_INSTANCE,
            }),
        }
    }

    /// All channelized blocks, in ascending address order
    pub const CHANNELIZED: [RegBlock; 6] = [
        RegBlock::Orx,
        RegBlock::Otx,
        RegBlock::Mrx,
        RegBlock::Mtx,
        RegBlock::Srx,
        RegBlock::Stx,
    ];

    /// Whether this block is on the line (optical) side
    const fn is_line_side(self) -> bool {
        matches!(self, RegBlock::Orx | RegBlock::Otx)
    }
}

/// Instance number decoding to "all instances" in every channelized block.
/// The last sub-window of each block is the broadcast alias.
pub const BROADCAST_INSTANCE: u8 = 7;

/// Highest logical channel number any package can expose
pub const MAX_CHANNELS: u8 = 8;

// =============================================================================
// Topology Matrices
// =============================================================================
//
// map[package][block][channel] -> Option<(die_offset, instance)>.
// `None` marks a channel that is not bonded out on that package; it must
// never be treated as instance 0.

type ChannelRow = [Option<(u8, u8)>; MAX_CHANNELS as usize];

const ROW_IDENTITY_4: ChannelRow = [
    Some((0, 0)),
    Some((0, 1)),
    Some((0, 2)),
    Some((0, 3)),
    None,
    None,
    None,
    None,
];

const ROW_IDENTITY_8: ChannelRow = [
    Some((0, 0)),
    Some((0, 1)),
    Some((0, 2)),
    Some((0, 3)),
    Some((1, 0)),
    Some((1, 1)),
    Some((1, 2)),
    Some((1, 3)),
];

// Bottom package: lanes mirror between the dies, so adjacent channel
// pairs alternate between lower and upper die.
const ROW_EML_BOT: ChannelRow = [
    Some((0, 0)),
    Some((0, 1)),
    Some((1, 1)),
    Some((1, 0)),
    Some((0, 2)),
    Some((0, 3)),
    Some((1, 3)),
    Some((1, 2)),
];

// CWDM line side: the optical mux wiring rotates the lanes.
const ROW_CWDM_LINE: ChannelRow = [
    Some((0, 2)),
    Some((0, 3)),
    Some((0, 0)),
    Some((0, 1)),
    None,
    None,
    None,
    None,
];

/// Look up the (die_offset, instance) pair for a logical channel
///
/// Returns `None` for channels not bonded out on the package (including
/// any channel above [`MAX_CHANNELS`]).
pub const fn channel_map(pkg: PackageType, block: RegBlock, channel: u8) -> Option<(u8, u8)> {
    if channel == 0 || channel > MAX_CHANNELS {
        return None;
    }
    let row: &ChannelRow = match pkg {
        PackageType::BareDie => &ROW_IDENTITY_4,
        PackageType::EmlTop15x14 => &ROW_IDENTITY_8,
        PackageType::EmlBot15x14 => &ROW_EML_BOT,
        PackageType::Cwdm12x13 => {
            if block.is_line_side() {
                &ROW_CWDM_LINE
            } else {
                &ROW_IDENTITY_4
            }
        }
    };
    row[(channel - 1) as usize]
}

// =============================================================================
// SRX/STX Instance Translation
// =============================================================================
//
// The SerDes lane register windows are laid out in the order the lanes
// are floorplanned, not in logical instance order. These partial tables
// translate a logical instance to its address-window slot; `None` marks
// a slot with no lane behind it.

const SRX_INST_XLATE: [Option<u8>; 8] = [
    Some(0),
    Some(2),
    Some(1),
    Some(3),
    None,
    None,
    None,
    None,
];

const STX_INST_XLATE: [Option<u8>; 8] = [
    Some(1),
    Some(0),
    Some(3),
    Some(2),
    None,
    None,
    None,
    None,
];

/// Translate a logical instance to the SRX/STX address-window slot
///
/// Only meaningful for [`RegBlock::Srx`] and [`RegBlock::Stx`]; other
/// blocks use the logical instance directly. Broadcast bypasses the
/// translation entirely.
pub const fn serdes_instance(block: RegBlock, instance: u8) -> Option<u8> {
    let table = match block {
        RegBlock::Srx => &SRX_INST_XLATE,
        RegBlock::Stx => &STX_INST_XLATE,
        _ => return Some(instance),
    };
    if instance as usize >= table.len() {
        return None;
    }
    table[instance as usize]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Die Handle Tests
    // =========================================================================

    #[test]
    fn die_base_masks_tag_nibble() {
        let die = Die::new(0x47);
        assert_eq!(die.base().raw(), 0x40);
    }

    #[test]
    fn die_tag_roundtrip() {
        let die = Die::new(0x40).with_package(PackageType::EmlBot15x14);
        assert_eq!(die.cached_package(), Some(PackageType::EmlBot15x14));
        assert_eq!(die.base().raw(), 0x40);
    }

    #[test]
    fn die_unresolved_tag_is_none() {
        let die = Die::new(0x40);
        assert_eq!(die.cached_package(), None);
    }

    #[test]
    fn die_at_offset_clears_tag() {
        let die = Die::new(0x40).with_package(PackageType::BareDie);
        assert_eq!(die.at_offset(1).raw(), 0x41);
        assert_eq!(die.at_offset(0).raw(), 0x40);
    }

    // =========================================================================
    // Package Type Tests
    // =========================================================================

    #[test]
    fn package_from_efuse_known_values() {
        assert_eq!(PackageType::from_efuse(1), Some(PackageType::BareDie));
        assert_eq!(PackageType::from_efuse(2), Some(PackageType::EmlTop15x14));
        assert_eq!(PackageType::from_efuse(3), Some(PackageType::EmlBot15x14));
        assert_eq!(PackageType::from_efuse(4), Some(PackageType::Cwdm12x13));
    }

    #[test]
    fn package_from_efuse_masks_upper_bits() {
        // Only the low nibble is the package field
        assert_eq!(PackageType::from_efuse(0xAB2), Some(PackageType::EmlTop15x14));
    }

    #[test]
    fn package_from_efuse_unknown_is_none() {
        assert_eq!(PackageType::from_efuse(0), None);
        assert_eq!(PackageType::from_efuse(9), None);
        assert_eq!(PackageType::from_efuse(0xF), None);
    }

    #[test]
    fn package_tag_roundtrip() {
        for pkg in [
            PackageType::BareDie,
            PackageType::EmlTop15x14,
            PackageType::EmlBot15x14,
            PackageType::Cwdm12x13,
        ] {
            assert_eq!(PackageType::from_tag(pkg.tag()), Some(pkg));
            assert_ne!(pkg.tag(), 0);
        }
    }

    #[test]
    fn package_geometry() {
        assert_eq!(PackageType::BareDie.die_count(), 1);
        assert_eq!(PackageType::EmlBot15x14.die_count(), 2);
        assert_eq!(PackageType::BareDie.channel_count(), 4);
        assert_eq!(PackageType::EmlTop15x14.channel_count(), 8);
    }

    // =========================================================================
    // Package Cache Tests
    // =========================================================================

    #[test]
    fn package_cache_starts_empty() {
        let cache = PackageCache::new();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn package_cache_set_is_append_only() {
        let mut cache = PackageCache::new();
        cache.set(PackageType::BareDie);
        cache.set(PackageType::Cwdm12x13);
        assert_eq!(cache.get(), Some(PackageType::BareDie));
    }

    #[test]
    fn package_cache_clear_allows_new_value() {
        let mut cache = PackageCache::new();
        cache.set(PackageType::BareDie);
        cache.clear();
        assert_eq!(cache.get(), None);
        cache.set(PackageType::Cwdm12x13);
        assert_eq!(cache.get(), Some(PackageType::Cwdm12x13));
    }

    // =========================================================================
    // Channel Tests
    // =========================================================================

    #[test]
    fn channel_wire_roundtrip() {
        assert_eq!(Channel::from_wire(0xFF), Some(Channel::Broadcast));
        assert_eq!(Channel::from_wire(3), Some(Channel::Logical(3)));
        assert_eq!(Channel::from_wire(0), None);
        assert_eq!(Channel::Broadcast.wire(), 0xFF);
        assert_eq!(Channel::Logical(5).wire(), 5);
    }

    // =========================================================================
    // Block Window Tests
    // =========================================================================

    #[test]
    fn block_windows_are_ascending_and_disjoint() {
        let mut prev_end = 0u16;
        for block in RegBlock::CHANNELIZED {
            let w = block.window().unwrap();
            assert!(w.start >= prev_end, "{:?} overlaps previous window", block);
            assert!(w.end > w.start);
            prev_end = w.end;
        }
    }

    #[test]
    fn broadcast_alias_fits_inside_every_window() {
        for block in RegBlock::CHANNELIZED {
            let w = block.window().unwrap();
            let bcast_off = (w.broadcast_instance as u16) * w.span;
            assert!(
                w.start + bcast_off < w.end,
                "{:?} broadcast alias escapes the window",
                block
            );
        }
    }

    #[test]
    fn global_block_has_no_window() {
        assert_eq!(RegBlock::Global.window(), None);
    }

    // =========================================================================
    // Topology Matrix Tests
    // =========================================================================

    #[test]
    fn channel_map_rejects_channel_zero_and_overflow() {
        for pkg in [
            PackageType::BareDie,
            PackageType::EmlTop15x14,
            PackageType::EmlBot15x14,
            PackageType::Cwdm12x13,
        ] {
            for block in RegBlock::CHANNELIZED {
                assert_eq!(channel_map(pkg, block, 0), None);
                assert_eq!(channel_map(pkg, block, MAX_CHANNELS + 1), None);
            }
        }
    }

    #[test]
    fn channel_map_respects_package_channel_count() {
        for pkg in [
            PackageType::BareDie,
            PackageType::EmlTop15x14,
            PackageType::EmlBot15x14,
            PackageType::Cwdm12x13,
        ] {
            for block in RegBlock::CHANNELIZED {
                for ch in 1..=MAX_CHANNELS {
                    let entry = channel_map(pkg, block, ch);
                    if ch <= pkg.channel_count() {
                        assert!(entry.is_some(), "{:?} {:?} ch{} should map", pkg, block, ch);
                    } else {
                        assert!(entry.is_none(), "{:?} {:?} ch{} should not map", pkg, block, ch);
                    }
                }
            }
        }
    }

    #[test]
    fn channel_map_die_offsets_within_package() {
        for pkg in [
            PackageType::BareDie,
            PackageType::EmlTop15x14,
            PackageType::EmlBot15x14,
            PackageType::Cwdm12x13,
        ] {
            for block in RegBlock::CHANNELIZED {
                for ch in 1..=pkg.channel_count() {
                    let (die_off, inst) = channel_map(pkg, block, ch).unwrap();
                    assert!(die_off < pkg.die_count(), "{:?} ch{} die offset", pkg, ch);
                    assert!(inst < BROADCAST_INSTANCE, "{:?} ch{} instance", pkg, ch);
                }
            }
        }
    }

    #[test]
    fn eml_bot_mirrors_lanes_across_dies() {
        // Bottom package wiring: channel 3 lands on the upper die, instance 1.
        assert_eq!(
            channel_map(PackageType::EmlBot15x14, RegBlock::Orx, 3),
            Some((1, 1))
        );
        assert_eq!(
            channel_map(PackageType::EmlBot15x14, RegBlock::Orx, 4),
            Some((1, 0))
        );
    }

    #[test]
    fn cwdm_line_side_differs_from_host_side() {
        assert_eq!(
            channel_map(PackageType::Cwdm12x13, RegBlock::Orx, 1),
            Some((0, 2))
        );
        assert_eq!(
            channel_map(PackageType::Cwdm12x13, RegBlock::Mrx, 1),
            Some((0, 0))
        );
    }

    // =========================================================================
    // SerDes Instance Translation Tests
    // =========================================================================

    #[test]
    fn serdes_translation_is_a_permutation_of_live_slots() {
        for block in [RegBlock::Srx, RegBlock::Stx] {
            let mut seen = [false; 4];
            for inst in 0..4u8 {
                let slot = serdes_instance(block, inst).unwrap();
                assert!(slot < 4);
                assert!(!seen[slot as usize], "{:?} slot {} reused", block, slot);
                seen[slot as usize] = true;
            }
        }
    }

    #[test]
    fn serdes_translation_unmapped_slots_are_none() {
        for inst in 4..8u8 {
            assert_eq!(serdes_instance(RegBlock::Srx, inst), None);
            assert_eq!(serdes_instance(RegBlock::Stx, inst), None);
        }
        assert_eq!(serdes_instance(RegBlock::Srx, 200), None);
    }

    #[test]
    fn serdes_translation_passthrough_for_other_blocks() {
        assert_eq!(serdes_instance(RegBlock::Orx, 3), Some(3));
        assert_eq!(serdes_instance(RegBlock::Mtx, 1), Some(1));
    }
}
