//! FEC statistics poller.
//!
//! A non-blocking client of the MSG2 transport and the reference usage
//! pattern for it: fire one snapshot request, then poll with cheap
//! bounded calls until the firmware's response frame has been copied
//! out block by block.
//!
//! The response payload is larger than a slow management bus wants to
//! move in one go, so the caller selects blocks per poll via a bitmask.
//! The ring lock is only held while a block is actually being read;
//! between polls the frame stays queued in the ring.

use embedded_hal::delay::DelayNs;

use super::phy::Phy;
use crate::error::{Error, FecError, Result};
use crate::hal::{HwLock, RegisterBus, SharedMem};
use crate::msg2::{Msg2Header, Msg2Link};
use crate::topology::Die;

/// MSG2 message type: start/snapshot FEC statistics
pub(crate) const MSG2_TYPE_FEC_REQ: u8 = 0x30;
/// MSG2 message type: FEC statistics response
pub(crate) const MSG2_TYPE_FEC_RESP: u8 = 0x31;

// Response payload layout, in words:
//   0  rc
//   1  poll_count
//   2  counts[3]
//   5  histogram[8]
//  13  rates[2] (f32 bit patterns)
const META_WORDS: usize = 2;
const COUNTS_OFFSET: u32 = 2;
const COUNTS_WORDS: usize = 3;
const HISTOGRAM_OFFSET: u32 = 5;
const HISTOGRAM_WORDS: usize = 8;
const RATES_OFFSET: u32 = 13;
const RATES_WORDS: usize = 2;
const FEC_PAYLOAD_WORDS: u32 =
    (META_WORDS + COUNTS_WORDS + HISTOGRAM_WORDS + RATES_WORDS) as u32;

// =============================================================================
// Block Selection
// =============================================================================

/// Bitmask selecting which response blocks a poll should copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FecBlocks(u8);

impl FecBlocks {
    /// No blocks
    pub const NONE: Self = Self(0);
    /// Codeword counters
    pub const COUNTS: Self = Self(1 << 0);
    /// Symbol-error histogram
    pub const HISTOGRAM: Self = Self(1 << 1);
    /// Pre/post-FEC bit error rates
    pub const RATES: Self = Self(1 << 2);
    /// Everything
    pub const ALL: Self = Self(0b111);

    /// Whether every block of `other` is included in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two selections
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for FecBlocks {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// =============================================================================
// Statistics Structure
// =============================================================================

/// FEC statistics snapshot
///
/// A fresh request resets every field to its sentinel (`u32::MAX` for
/// counters, NaN for rates), so a consumer can tell which blocks have
/// actually been retrieved so far.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FecStats {
    /// Codewords corrected by the decoder
    pub corrected_codewords: u32,
    /// Codewords the decoder could not correct
    pub uncorrected_codewords: u32,
    /// Total codewords observed in the accumulation window
    pub total_codewords: u32,
    /// Histogram of symbol errors per codeword
    pub histogram: [u32; HISTOGRAM_WORDS],
    /// Bit error rate before correction
    pub pre_fec_ber: f32,
    /// Bit error rate after correction
    pub post_fec_ber: f32,
    /// Firmware snapshot counter; advances once per completed snapshot
    pub poll_count: u32,
}

impl FecStats {
    /// Statistics with every field at its sentinel value
    pub const fn new() -> Self {
        Self {
            corrected_codewords: u32::MAX,
            uncorrected_codewords: u32::MAX,
            total_codewords: u32::MAX,
            histogram: [u32::MAX; HISTOGRAM_WORDS],
            pre_fec_ber: f32::NAN,
            post_fec_ber: f32::NAN,
            poll_count: u32::MAX,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FecStats {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Poller State Machine
// =============================================================================

/// Poller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FecState {
    /// No snapshot in flight
    Idle,
    /// Snapshot requested; response not fully consumed yet
    Requested,
    /// Protocol violation observed; terminal until the next `request`
    Faulted,
}

/// Outcome of one non-blocking poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FecPoll {
    /// Response not available yet (or ring lock contended); poll again
    Waiting,
    /// The requested blocks were copied into the caller's statistics
    Ready,
}

/// Non-blocking FEC statistics poller for one die
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FecPoller {
    die: Die,
    state: FecState,
    read_mask: FecBlocks,
    last_poll_count: Option<u32>,
}

impl FecPoller {
    /// Poller for the given die, initially idle
    pub const fn new(die: Die) -> Self {
        Self {
            die,
            state: FecState::Idle,
            read_mask: FecBlocks::NONE,
            last_poll_count: None,
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> FecState {
        self.state
    }

    /// Request a fresh statistics snapshot
    ///
    /// Resets `stats` to sentinels and fires the snapshot command
    /// without waiting for the firmware. Also the only way out of
    /// [`FecState::Faulted`].
    ///
    /// With `clear_on_read` the firmware zeroes its accumulators after
    /// taking the snapshot.
    pub fn request<B, L, D>(
        &mut self,
        phy: &mut Phy<B, L>,
        delay: &mut D,
        clear_on_read: bool,
        stats: &mut FecStats,
    ) -> Result<()>
    where
        B: RegisterBus,
        L: HwLock,
        D: DelayNs,
    {
        stats.reset();
        self.read_mask = FecBlocks::NONE;

        match phy.msg2_push(self.die, delay, MSG2_TYPE_FEC_REQ, &[u32::from(clear_on_read)]) {
            Ok(_id) => {
                self.state = FecState::Requested;
                Ok(())
            }
            Err(e) => {
                self.state = FecState::Faulted;
                Err(e)
            }
        }
    }

    /// Poll for the response and copy the selected blocks
    ///
    /// Non-blocking: returns [`FecPoll::Waiting`] while the firmware has
    /// not produced the frame (or the ring lock was contended). Once all
    /// three blocks have been copied, over however many calls, the frame
    /// is consumed and the poller returns to idle.
    ///
    /// Any protocol violation (wrong type or length, non-zero return
    /// code, stale snapshot counter) faults the poller; only a new
    /// [`request`](FecPoller::request) recovers it.
    pub fn get<B, L>(
        &mut self,
        phy: &mut Phy<B, L>,
        blocks: FecBlocks,
        stats: &mut FecStats,
    ) -> Result<FecPoll>
    where
        B: RegisterBus,
        L: HwLock,
    {
        match self.state {
            FecState::Requested => {}
            FecState::Idle | FecState::Faulted => {
                return Err(Error::Fec(FecError::NotRequested));
            }
        }

        let result = self.get_inner(phy, blocks, stats);
        if result.is_err() {
            self.state = FecState::Faulted;
        }
        result
    }

    fn get_inner<B, L>(
        &mut self,
        phy: &mut Phy<B, L>,
        blocks: FecBlocks,
        stats: &mut FecStats,
    ) -> Result<FecPoll>
    where
        B: RegisterBus,
        L: HwLock,
    {
        let mut link = phy.msg2_link();
        let mut window = phy.pif_window(self.die);

        let Some(header) = link.try_begin_pull(&mut window)? else {
            return Ok(FecPoll::Waiting);
        };

        // the ring lock is held from here; every exit must drop it
        match self.copy_blocks(&mut link, &mut window, header, blocks, stats) {
            Ok(complete) => {
                link.end_pull(&mut window, complete)?;
                if complete {
                    self.state = FecState::Idle;
                    self.last_poll_count = Some(stats.poll_count);
                    self.read_mask = FecBlocks::NONE;
                }
                Ok(FecPoll::Ready)
            }
            Err(e) => {
                let _ = link.end_pull(&mut window, true);
                Err(e)
            }
        }
    }

    fn copy_blocks<M: SharedMem>(
        &mut self,
        link: &mut Msg2Link,
        window: &mut M,
        header: Msg2Header,
        blocks: FecBlocks,
        stats: &mut FecStats,
    ) -> Result<bool> {
        if header.mtype != MSG2_TYPE_FEC_RESP || header.payload_words() != FEC_PAYLOAD_WORDS {
            return Err(Error::Fec(FecError::Protocol));
        }

        let mut meta = [0u32; META_WORDS];
        link.read_block(window, header, 0, &mut meta)?;
        let (rc, poll_count) = (meta[0], meta[1]);

        if rc != 0 {
            return Err(Error::Fec(FecError::Protocol));
        }

        if self.read_mask == FecBlocks::NONE {
            // first grab of this response: the snapshot counter must
            // have advanced past the previous completed snapshot, and
            // counter zero means the firmware never completed one
            if poll_count == 0 || self.last_poll_count == Some(poll_count) {
                return Err(Error::Fec(FecError::Stale));
            }
            stats.poll_count = poll_count;
        } else if poll_count != stats.poll_count {
            // frame changed underneath a partially-read response
            return Err(Error::Fec(FecError::Protocol));
        }

        if blocks.contains(FecBlocks::COUNTS) && !self.read_mask.contains(FecBlocks::COUNTS) {
            let mut counts = [0u32; COUNTS_WORDS];
            link.read_block(window, header, COUNTS_OFFSET, &mut counts)?;
            stats.corrected_codewords = counts[0];
            stats.uncorrected_codewords = counts[1];
            stats.total_codewords = counts[2];
            self.read_mask = self.read_mask.union(FecBlocks::COUNTS);
        }

        if blocks.contains(FecBlocks::HISTOGRAM) && !self.read_mask.contains(FecBlocks::HISTOGRAM)
        {
            link.read_block(window, header, HISTOGRAM_OFFSET, &mut stats.histogram)?;
            self.read_mask = self.read_mask.union(FecBlocks::HISTOGRAM);
        }

        if blocks.contains(FecBlocks::RATES) && !self.read_mask.contains(FecBlocks::RATES) {
            let mut rates = [0u32; RATES_WORDS];
            link.read_block(window, header, RATES_OFFSET, &mut rates)?;
            stats.pre_fec_ber = f32::from_bits(rates[0]);
            stats.post_fec_ber = f32::from_bits(rates[1]);
            self.read_mask = self.read_mask.union(FecBlocks::RATES);
        }

        Ok(self.read_mask == FecBlocks::ALL)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
