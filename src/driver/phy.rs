//! Core MIRA800 driver implementation.
//!
//! This module contains the main [`Phy`] structure and core operations:
//!
//! - Raw and channel-aware register access under the hardware lock
//! - Package discovery and address remapping
//! - Firmware-mode queries and transitions
//! - PIF access into MCU memory and MSG2 exchanges
//!
//! For the legacy mailbox transport, see the
//! [`mailbox`](super::mailbox) module. For the FEC statistics poller,
//! see the [`fec`](super::fec) module.

use embedded_hal::delay::DelayNs;

use super::config::{FwMode, PhyConfig};
use crate::error::{Error, IoError, IoResult, Result};
use crate::hal::{HwLock, LockGuard, NoLock, RegisterBus, SharedMem};
use crate::internal::regs::{
    MCU_FW_MODE, PIF_ADDR_LSW, PIF_ADDR_MSW, PIF_DATA_LSW, PIF_DATA_MSW,
};
use crate::msg2::{Msg2Header, Msg2Link};
use crate::topology::{
    resolve_addr, resolve_intf, Channel, Die, Intf, PackageCache, PackageType, ResolvedAddress,
};

// =============================================================================
// PIF Memory Window
// =============================================================================

/// [`SharedMem`] adaptor tunneling 32-bit MCU memory access through the
/// PIF indirection registers of one die
///
/// Each access is four register transactions (two address latches, two
/// data halves) and is covered by the hardware lock so the sequence can
/// never interleave with another thread's PIF traffic.
pub struct PifWindow<'a, B: RegisterBus, L: HwLock> {
    bus: &'a mut B,
    lock: &'a mut L,
    die: Die,
}

impl<B: RegisterBus, L: HwLock> SharedMem for PifWindow<'_, B, L> {
    fn mem_read32(&mut self, addr: u32) -> crate::error::IoResult<u32> {
        let guard = LockGuard::acquire(self.lock, self.die)?;
        let result = (|| {
            self.bus.reg_set(self.die, PIF_ADDR_LSW, addr as u16)?;
            self.bus.reg_set(self.die, PIF_ADDR_MSW, (addr >> 16) as u16)?;
            let lsw = self.bus.reg_get(self.die, PIF_DATA_LSW)?;
            let msw = self.bus.reg_get(self.die, PIF_DATA_MSW)?;
            Ok((u32::from(msw) << 16) | u32::from(lsw))
        })();
        guard.release()?;
        result
    }

    fn mem_write32(&mut self, addr: u32, value: u32) -> crate::error::IoResult<()> {
        let guard = LockGuard::acquire(self.lock, self.die)?;
        let result = (|| {
            self.bus.reg_set(self.die, PIF_ADDR_LSW, addr as u16)?;
            self.bus.reg_set(self.die, PIF_ADDR_MSW, (addr >> 16) as u16)?;
            self.bus.reg_set(self.die, PIF_DATA_LSW, value as u16)?;
            // MSW write is the commit strobe
            self.bus.reg_set(self.die, PIF_DATA_MSW, (value >> 16) as u16)
        })();
        guard.release()?;
        result
    }
}

// =============================================================================
// PHY Driver
// =============================================================================

/// MIRA800 driver handle
///
/// Owns the register bus and the optional integrator lock, and carries
/// the package-type cache plus the rolling message id. One handle can
/// serve every die reachable over its bus; per-die state (mailbox, MSG2
/// rings) lives in the chip, not here.
///
/// # Type Parameters
/// * `B` - Register bus implementation
/// * `L` - Hardware lock; defaults to [`NoLock`] (no cross-thread safety)
pub struct Phy<B: RegisterBus, L: HwLock = NoLock> {
    pub(crate) bus: B,
    lock: L,
    config: PhyConfig,
    packages: PackageCache,
    next_msg_id: u8,
}

impl<B: RegisterBus> Phy<B, NoLock> {
    /// Create a driver without a hardware lock
    ///
    /// Single-threaded integrations only; see [`HwLock`].
    pub fn new(bus: B, config: PhyConfig) -> Self {
        Self::with_lock(bus, NoLock, config)
    }
}

impl<B: RegisterBus, L: HwLock> Phy<B, L> {
    /// Create a driver with an integrator-supplied hardware lock
    pub fn with_lock(bus: B, lock: L, config: PhyConfig) -> Self {
        Self {
            bus,
            lock,
            config,
            packages: PackageCache::new(),
            next_msg_id: 0,
        }
    }

    /// Consume the driver and return the bus and lock
    pub fn free(self) -> (B, L) {
        (self.bus, self.lock)
    }

    /// Driver configuration
    pub const fn config(&self) -> &PhyConfig {
        &self.config
    }

    /// Take the per-die hardware lock (reentrant; see [`HwLock`])
    pub(crate) fn hw_lock(&mut self, die: Die) -> Result<()> {
        self.lock
            .lock(die.base())
            .map_err(|_| Error::Io(IoError::LockFailed))
    }

    /// Release the per-die hardware lock
    pub(crate) fn hw_unlock(&mut self, die: Die) -> Result<()> {
        self.lock
            .unlock(die.base())
            .map_err(|_| Error::Io(IoError::LockFailed))
    }

    // =========================================================================
    // Package Discovery
    // =========================================================================

    /// Package type of the part, probing EFUSE at most once
    pub fn package(&mut self, die: Die) -> Result<PackageType> {
        PackageType::discover(&mut self.bus, die, &mut self.packages)
    }

    /// Forget the cached package type (e.g. after moving to another part)
    pub fn clear_package_cache(&mut self) {
        self.packages.clear();
    }

    // =========================================================================
    // Raw Register Access
    // =========================================================================

    // Physical-address internals. The die is used exactly as given, so
    // the remapper's upper-die handles keep their offset bits; the lock
    // is keyed by the package base address either way.

    fn read_at(&mut self, die: Die, addr: u16) -> Result<u16> {
        let guard = LockGuard::acquire(&mut self.lock, die.base()).map_err(Error::Io)?;
        let value = self.bus.reg_get(die, addr);
        guard.release().map_err(Error::Io)?;
        Ok(value?)
    }

    fn write_at(&mut self, die: Die, addr: u16, value: u16) -> Result<()> {
        let guard = LockGuard::acquire(&mut self.lock, die.base()).map_err(Error::Io)?;
        let result = self.bus.reg_set(die, addr, value);
        guard.release().map_err(Error::Io)?;
        result?;
        Ok(())
    }

    fn rmw_at(&mut self, die: Die, addr: u16, value: u16, mask: u16) -> Result<u16> {
        let guard = LockGuard::acquire(&mut self.lock, die.base()).map_err(Error::Io)?;
        let result = (|| -> IoResult<u16> {
            let old = self.bus.reg_get(die, addr)?;
            let merged = (old & !mask) | (value & mask);
            self.bus.reg_set(die, addr, merged)?;
            Ok(merged)
        })();
        guard.release().map_err(Error::Io)?;
        Ok(result?)
    }

    /// Read a register on the die's base address
    ///
    /// The handle's tag nibble is masked off. Channel-relative registers
    /// go through [`ch_read`](Phy::ch_read), which addresses the die the
    /// remapper resolves to.
    pub fn read(&mut self, die: Die, addr: u16) -> Result<u16> {
        self.read_at(die.base(), addr)
    }

    /// Write a register on the die's base address
    pub fn write(&mut self, die: Die, addr: u16, value: u16) -> Result<()> {
        self.write_at(die.base(), addr, value)
    }

    /// Read-modify-write under one lock hold
    ///
    /// Bits set in `mask` are replaced by the corresponding bits of
    /// `value`; everything else is preserved. Atomic with respect to
    /// other lock holders only.
    pub fn rmw(&mut self, die: Die, addr: u16, value: u16, mask: u16) -> Result<u16> {
        self.rmw_at(die.base(), addr, value, mask)
    }

    // =========================================================================
    // Channel-Aware Register Access
    // =========================================================================

    /// Resolve a channel-relative address to its physical location
    pub fn resolve(
        &mut self,
        die: Die,
        channel: Option<Channel>,
        addr: u16,
    ) -> Result<ResolvedAddress> {
        let pkg = self.package(die)?;
        Ok(resolve_addr(pkg, die, channel, addr)?)
    }

    /// Read a register through the channel remapper
    pub fn ch_read(&mut self, die: Die, channel: Option<Channel>, addr: u16) -> Result<u16> {
        let r = self.resolve(die, channel, addr)?;
        self.read_at(r.die, r.addr)
    }

    /// Write a register through the channel remapper
    pub fn ch_write(
        &mut self,
        die: Die,
        channel: Option<Channel>,
        addr: u16,
        value: u16,
    ) -> Result<()> {
        let r = self.resolve(die, channel, addr)?;
        self.write_at(r.die, r.addr, value)
    }

    /// Read-modify-write through the channel remapper
    pub fn ch_rmw(
        &mut self,
        die: Die,
        channel: Option<Channel>,
        addr: u16,
        value: u16,
        mask: u16,
    ) -> Result<u16> {
        let r = self.resolve(die, channel, addr)?;
        self.rmw_at(r.die, r.addr, value, mask)
    }

    /// Read an interface register on one channel
    ///
    /// `addr` must lie in the interface's instance-0 register window.
    pub fn intf_read(&mut self, die: Die, channel: Channel, intf: Intf, addr: u16) -> Result<u16> {
        let pkg = self.package(die)?;
        let r = resolve_intf(pkg, die, channel, intf, addr)?;
        self.read_at(r.die, r.addr)
    }

    /// Write an interface register on one channel
    pub fn intf_write(
        &mut self,
        die: Die,
        channel: Channel,
        intf: Intf,
        addr: u16,
        value: u16,
    ) -> Result<()> {
        let pkg = self.package(die)?;
        let r = resolve_intf(pkg, die, channel, intf, addr)?;
        self.write_at(r.die, r.addr, value)
    }

    // =========================================================================
    // Firmware Mode
    // =========================================================================

    /// Current MCU firmware mode
    pub fn fw_mode(&mut self, die: Die) -> Result<FwMode> {
        let value = self.read(die, MCU_FW_MODE)?;
        Ok(FwMode::from_reg(value))
    }

    /// Poll until the firmware reaches `want`, bounded by the
    /// configured firmware-mode timeout
    pub fn wait_for_fw_mode<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        want: FwMode,
    ) -> Result<()> {
        let mut elapsed = 0u32;
        loop {
            if self.fw_mode(die)? == want {
                return Ok(());
            }
            if elapsed >= self.config.fw_mode_timeout_us {
                return Err(Error::Io(IoError::Timeout));
            }
            delay.delay_us(self.config.poll_interval_us);
            elapsed += self.config.poll_interval_us;
        }
    }

    // =========================================================================
    // PIF Memory Access
    // =========================================================================

    /// Read one aligned 32-bit word of MCU memory
    pub fn pif_read32(&mut self, die: Die, addr: u32) -> Result<u32> {
        let mut window = PifWindow {
            bus: &mut self.bus,
            lock: &mut self.lock,
            die: die.base(),
        };
        Ok(window.mem_read32(addr)?)
    }

    /// Write one aligned 32-bit word of MCU memory
    pub fn pif_write32(&mut self, die: Die, addr: u32, value: u32) -> Result<()> {
        let mut window = PifWindow {
            bus: &mut self.bus,
            lock: &mut self.lock,
            die: die.base(),
        };
        Ok(window.mem_write32(addr, value)?)
    }

    /// Read consecutive 32-bit words of MCU memory
    pub fn pif_read_block(&mut self, die: Die, addr: u32, out: &mut [u32]) -> Result<()> {
        let mut window = self.pif_window(die);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = window.mem_read32(addr + 4 * i as u32)?;
        }
        Ok(())
    }

    /// Write consecutive 32-bit words of MCU memory
    pub fn pif_write_block(&mut self, die: Die, addr: u32, words: &[u32]) -> Result<()> {
        let mut window = self.pif_window(die);
        for (i, &word) in words.iter().enumerate() {
            window.mem_write32(addr + 4 * i as u32, word)?;
        }
        Ok(())
    }

    /// Borrow a [`SharedMem`] view of one die's MCU memory
    pub fn pif_window(&mut self, die: Die) -> PifWindow<'_, B, L> {
        PifWindow {
            bus: &mut self.bus,
            lock: &mut self.lock,
            die: die.base(),
        }
    }

    // =========================================================================
    // MSG2 Exchanges
    // =========================================================================

    /// Next rolling message id
    pub(crate) fn take_msg_id(&mut self) -> u8 {
        let id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);
        id
    }

    /// Send one MSG2 request frame; returns the assigned message id
    pub fn msg2_push<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        mtype: u8,
        payload: &[u32],
    ) -> Result<u8> {
        let id = self.take_msg_id();
        let mut link = self.msg2_link();
        let mut window = PifWindow {
            bus: &mut self.bus,
            lock: &mut self.lock,
            die: die.base(),
        };
        link.push_message(&mut window, delay, id, mtype, payload)?;
        Ok(id)
    }

    /// One full MSG2 request/response exchange
    ///
    /// Pushes a request and blocks (bounded) for the response, whose
    /// payload lands in `out`. Exchanges on one die are strictly
    /// sequential; a response is always the answer to the request just
    /// pushed.
    pub fn msg2_request<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        mtype: u8,
        payload: &[u32],
        out: &mut [u32],
    ) -> Result<Msg2Header> {
        let id = self.take_msg_id();
        let mut link = self.msg2_link();
        let mut window = PifWindow {
            bus: &mut self.bus,
            lock: &mut self.lock,
            die: die.base(),
        };
        link.push_message(&mut window, delay, id, mtype, payload)?;
        link.pull_message(&mut window, delay, out)
    }

    /// MSG2 endpoint configured from this driver's settings
    pub(crate) fn msg2_link(&self) -> Msg2Link {
        Msg2Link::new(self.config.msg2_base)
            .with_timing(self.config.msg2_data_timeout_us, self.config.msg2_lock_retries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
