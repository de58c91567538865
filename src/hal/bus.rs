//! Register bus and hardware lock seams
//!
//! The driver never touches MDIO/I2C itself. The integrator supplies the
//! physical 16-bit register transaction primitive via [`RegisterBus`] and,
//! optionally, a cross-thread mutual-exclusion primitive via [`HwLock`].

use crate::error::{IoError, IoResult};
use crate::topology::Die;

// =============================================================================
// Register Bus Trait
// =============================================================================

/// Trait for the raw register transaction primitive
///
/// Implementations perform one physical bus transaction (MDIO or I2C)
/// per call. All register values are 16 bits wide; the driver masks any
/// wider intermediate values before calling `reg_set`.
///
/// Failures are propagated unchanged as [`IoError::Bus`]-class errors;
/// the driver performs no retries at this layer.
pub trait RegisterBus {
    /// Read a 16-bit register on the given die
    fn reg_get(&mut self, die: Die, addr: u16) -> IoResult<u16>;

    /// Write a 16-bit register on the given die
    fn reg_set(&mut self, die: Die, addr: u16, value: u16) -> IoResult<()>;
}

// =============================================================================
// Shared Memory Trait
// =============================================================================

/// Trait for 32-bit access into one die's MCU memory
///
/// The MSG2 transport runs over a shared-memory window in MCU RAM. The
/// driver's own implementation tunnels these accesses through the PIF
/// indirection registers; tests substitute a flat memory model.
///
/// Addresses are byte addresses in the MCU's address space and must be
/// 4-byte aligned.
pub trait SharedMem {
    /// Read one aligned 32-bit word of MCU memory
    fn mem_read32(&mut self, addr: u32) -> IoResult<u32>;

    /// Write one aligned 32-bit word of MCU memory
    fn mem_write32(&mut self, addr: u32, value: u32) -> IoResult<()>;
}

// =============================================================================
// Hardware Lock Trait
// =============================================================================

/// Trait for the optional integrator-supplied per-die lock
///
/// When host software accesses the same die from multiple threads, the
/// integrator must supply a lock; without one, concurrent access to a die
/// is undefined behavior.
///
/// # Reentrancy
///
/// Implementations MUST be reentrant (recursive-mutex semantics): internal
/// driver helpers call top-level entry points that also take the lock, so
/// the same logical owner will nest-acquire.
pub trait HwLock {
    /// Acquire the lock for a die
    fn lock(&mut self, die: Die) -> IoResult<()>;

    /// Release the lock for a die
    fn unlock(&mut self, die: Die) -> IoResult<()>;
}

/// No-op lock used when the integrator registers none
///
/// Every operation succeeds immediately. No cross-thread safety is
/// provided in this configuration.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoLock;

impl HwLock for NoLock {
    #[inline(always)]
    fn lock(&mut self, _die: Die) -> IoResult<()> {
        Ok(())
    }

    #[inline(always)]
    fn unlock(&mut self, _die: Die) -> IoResult<()> {
        Ok(())
    }
}

// =============================================================================
// Lock Guard
// =============================================================================

/// Scope guard pairing `lock` with `unlock`
///
/// Prefer [`LockGuard::release`] to observe unlock failures; the `Drop`
/// fallback releases best-effort and swallows the error.
pub struct LockGuard<'a, L: HwLock> {
    lock: Option<&'a mut L>,
    die: Die,
}

impl<'a, L: HwLock> LockGuard<'a, L> {
    /// Acquire the lock for `die`, returning a guard that releases it
    pub fn acquire(lock: &'a mut L, die: Die) -> IoResult<Self> {
        lock.lock(die).map_err(|_| IoError::LockFailed)?;
        Ok(Self {
            lock: Some(lock),
            die,
        })
    }

    /// Release the lock explicitly, surfacing any unlock failure
    pub fn release(mut self) -> IoResult<()> {
        match self.lock.take() {
            Some(lock) => lock.unlock(self.die).map_err(|_| IoError::LockFailed),
            None => Ok(()),
        }
    }
}

impl<L: HwLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            // Best-effort; release() is the error-observing path.
            let _ = lock.unlock(self.die);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
