//! Cooperative host/firmware lock over shared memory
//!
//! Both sides of the MSG2 transport guard the ring buffers with
//! Peterson's algorithm: one intent flag per side plus a shared turn
//! word. The register layout and the firmware's side of the protocol are
//! fixed; this module encapsulates the host side so that no other code
//! touches the three raw words.
//!
//! The host never spins inside the critical-section check. A failed
//! attempt clears the host's own intent flag and reports "not acquired";
//! callers retry with a delay between attempts. Leaving the intent flag
//! set after a failed attempt would wedge the firmware, whose loop
//! condition watches for the flag to drop.

use embedded_hal::delay::DelayNs;

use crate::error::{IoError, IoResult};
use crate::hal::SharedMem;
use crate::internal::constants::{MSG2_LOCK_RETRIES, POLL_INTERVAL_US};
use crate::internal::regs::{MSG2_LOCK_FLAG_API, MSG2_LOCK_FLAG_FW, MSG2_LOCK_TURN};

/// Turn-word value meaning the host may proceed
const TURN_API: u32 = 0;
/// Turn-word value meaning the firmware may proceed
const TURN_FW: u32 = 1;

// =============================================================================
// Host-Side Lock
// =============================================================================

/// Host side of the shared ring-buffer lock
///
/// Tracks whether the host currently holds the critical section; the
/// flag/turn words themselves live in MCU memory behind [`SharedMem`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RingLock {
    base: u32,
    held: bool,
    retries: u32,
}

impl RingLock {
    /// Lock-word accessor rooted at the shared control block `base`
    pub const fn new(base: u32) -> Self {
        Self {
            base,
            held: false,
            retries: MSG2_LOCK_RETRIES,
        }
    }

    /// Override the bounded-retry count of [`wait_and_lock`]
    ///
    /// [`wait_and_lock`]: RingLock::wait_and_lock
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Whether the host believes it holds the critical section
    pub const fn is_held(&self) -> bool {
        self.held
    }

    /// One acquisition attempt; `Ok(true)` means the lock is now held
    ///
    /// On `Ok(false)` the host's intent flag has been cleared again; on
    /// `Err` it is withdrawn best-effort so the firmware is not left
    /// waiting on a host that already gave up.
    pub fn try_acquire<M: SharedMem>(&mut self, mem: &mut M) -> IoResult<bool> {
        if self.held {
            return Ok(true);
        }

        self.assert_intent(mem)?;
        let won = (|| -> IoResult<bool> {
            self.yield_turn(mem)?;
            Ok(!self.remote_wins(mem)?)
        })();
        match won {
            Ok(true) => {
                self.held = true;
                Ok(true)
            }
            Ok(false) => {
                // Back off completely; the firmware waits on this flag.
                self.clear_intent(mem)?;
                Ok(false)
            }
            Err(e) => {
                let _ = self.clear_intent(mem);
                Err(e)
            }
        }
    }

    /// Acquire with bounded retry, sleeping between attempts
    pub fn wait_and_lock<M: SharedMem, D: DelayNs>(
        &mut self,
        mem: &mut M,
        delay: &mut D,
    ) -> IoResult<()> {
        let mut attempts = 0u32;
        loop {
            if self.try_acquire(mem)? {
                return Ok(());
            }
            attempts += 1;
            if attempts >= self.retries {
                return Err(IoError::LockFailed);
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    /// Leave the critical section
    pub fn release<M: SharedMem>(&mut self, mem: &mut M) -> IoResult<()> {
        if !self.held {
            return Ok(());
        }
        // Clear the flag before updating our local view so that a failed
        // write keeps us in the held state for a retry.
        self.clear_intent(mem)?;
        self.held = false;
        Ok(())
    }

    // =========================================================================
    // Protocol steps
    // =========================================================================
    //
    // Exposed within the crate so the interleaving tests can drive the
    // host as a step-by-step state machine against a simulated firmware.

    /// Step 1: publish that the host wants the critical section
    pub(crate) fn assert_intent<M: SharedMem>(&self, mem: &mut M) -> IoResult<()> {
        mem.mem_write32(self.base + MSG2_LOCK_FLAG_API, 1)
    }

    /// Step 2: give priority away; whoever yields last loses the race
    pub(crate) fn yield_turn<M: SharedMem>(&self, mem: &mut M) -> IoResult<()> {
        mem.mem_write32(self.base + MSG2_LOCK_TURN, TURN_FW)
    }

    /// Step 3: the firmware wins if it also wants in and holds priority
    pub(crate) fn remote_wins<M: SharedMem>(&self, mem: &mut M) -> IoResult<bool> {
        let flag_fw = mem.mem_read32(self.base + MSG2_LOCK_FLAG_FW)?;
        if flag_fw == 0 {
            return Ok(false);
        }
        let turn = mem.mem_read32(self.base + MSG2_LOCK_TURN)?;
        Ok(turn == TURN_FW)
    }

    /// Withdraw the host's intent flag
    pub(crate) fn clear_intent<M: SharedMem>(&self, mem: &mut M) -> IoResult<()> {
        mem.mem_write32(self.base + MSG2_LOCK_FLAG_API, 0)
    }

    /// Mark the lock as held without re-running the protocol (test hook
    /// and desync-recovery path where the flags were just rewritten)
    pub(crate) fn mark_held(&mut self, held: bool) {
        self.held = held;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
