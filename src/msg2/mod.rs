//! MSG2 ring-buffer messaging over shared MCU memory
//!
//! The modern firmware message path. A control block in MCU RAM holds
//! one ring descriptor per direction (API-to-firmware and back) plus the
//! three words of the cooperative lock. The host reaches the control
//! block through [`SharedMem`], which the driver backs with the PIF
//! indirection registers.
//!
//! Frame layout, in 32-bit words:
//!
//! ```text
//! +-----------------------------+
//! | header  {id:8,type:8,len:16}|   len counts the whole frame
//! | payload word 0..n           |
//! | checksum (rotate-accumulate)|
//! +-----------------------------+
//! ```
//!
//! Corruption handling is deliberately blunt: any length or checksum
//! mismatch erases the whole receive ring. The protocol carries no
//! sequence numbers, so after one bad offset nothing later in the ring
//! can be trusted.

use embedded_hal::delay::DelayNs;

use crate::error::{Error, IoError, MsgError, Result};
use crate::hal::SharedMem;
use crate::internal::constants::{
    MSG2_DATA_TIMEOUT_US, MSG2_MAX_FRAME_WORDS, MSG2_MAX_RING_WORDS, MSG2_MIN_FRAME_WORDS,
    POLL_INTERVAL_US,
};
use crate::internal::regs::{
    MSG2_API2FW_DESC, MSG2_DESC_BUF_ADDR, MSG2_DESC_LENGTH, MSG2_DESC_RD_IDX, MSG2_DESC_WR_IDX,
    MSG2_FW2API_DESC, MSG2_SHARED_BASE,
};

pub mod checksum;
pub mod lock;

pub use checksum::{checksum_words, Checksum};
pub use lock::RingLock;

// =============================================================================
// Frame Header
// =============================================================================

/// Decoded MSG2 frame header
///
/// `len` counts the complete frame in words: this header, the payload,
/// and the trailing checksum word. The message id is informational only;
/// exchanges on one die are strictly sequential and the id is never used
/// to match responses to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Msg2Header {
    /// Rolling message id
    pub id: u8,
    /// Message type
    pub mtype: u8,
    /// Total framed length in 32-bit words
    pub len: u16,
}

impl Msg2Header {
    /// Wire encoding: `{id:8, type:8, len:16}`
    pub const fn encode(self) -> u32 {
        ((self.id as u32) << 24) | ((self.mtype as u32) << 16) | self.len as u32
    }

    /// Decode a header word
    pub const fn decode(word: u32) -> Self {
        Self {
            id: (word >> 24) as u8,
            mtype: (word >> 16) as u8,
            len: word as u16,
        }
    }

    /// Payload length in words (total minus header and checksum)
    pub const fn payload_words(self) -> u32 {
        (self.len as u32).saturating_sub(MSG2_MIN_FRAME_WORDS)
    }
}

// =============================================================================
// Ring Descriptors
// =============================================================================

/// Transfer direction, named from the host's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Dir {
    /// Host request ring
    Tx,
    /// Firmware response ring
    Rx,
}

impl Dir {
    const fn desc_offset(self) -> u32 {
        match self {
            Dir::Tx => MSG2_API2FW_DESC,
            Dir::Rx => MSG2_FW2API_DESC,
        }
    }
}

/// Host-side mirror of one ring descriptor
///
/// Fetched fresh at the start of every critical section; the firmware
/// owns the descriptor memory and may relocate buffers between boots.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct RingDesc {
    /// Ring capacity in words
    length: u32,
    /// Producer index, `[0, length)`
    wr_idx: u32,
    /// Consumer index, `[0, length)`
    rd_idx: u32,
    /// MCU address of the ring storage
    buf_addr: u32,
}

impl RingDesc {
    /// Words queued and not yet consumed
    fn pending(&self) -> u32 {
        (self.wr_idx + self.length - self.rd_idx) % self.length
    }

    /// Words that can still be produced; one slot stays reserved so a
    /// full ring is distinguishable from an empty one
    fn free(&self) -> u32 {
        self.length - 1 - self.pending()
    }

    /// MCU address of the word `offset` past `idx`, wrapping
    fn word_addr(&self, idx: u32, offset: u32) -> u32 {
        self.buf_addr + 4 * ((idx + offset) % self.length)
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Host endpoint of the MSG2 transport for one die
///
/// Holds the lock state and the last-fetched ring descriptors. All
/// methods take the [`SharedMem`] explicitly so the same endpoint state
/// can persist across short-lived memory adaptors.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Msg2Link {
    base: u32,
    lock: RingLock,
    rx: Option<RingDesc>,
    data_timeout_us: u32,
}

impl Default for Msg2Link {
    fn default() -> Self {
        Self::new(MSG2_SHARED_BASE)
    }
}

impl Msg2Link {
    /// Endpoint over a control block at `base` in MCU memory
    pub const fn new(base: u32) -> Self {
        Self {
            base,
            lock: RingLock::new(base),
            rx: None,
            data_timeout_us: MSG2_DATA_TIMEOUT_US,
        }
    }

    /// Override the response-wait timeout and lock retry bound
    pub const fn with_timing(mut self, data_timeout_us: u32, lock_retries: u32) -> Self {
        self.data_timeout_us = data_timeout_us;
        self.lock = self.lock.with_retries(lock_retries);
        self
    }

    /// Whether the host currently holds the ring lock
    pub const fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    // =========================================================================
    // Descriptor Access
    // =========================================================================

    fn fetch_desc<M: SharedMem>(&self, mem: &mut M, dir: Dir) -> Result<RingDesc> {
        let desc = self.base + dir.desc_offset();
        let length = mem.mem_read32(desc + MSG2_DESC_LENGTH)?;
        let wr_idx = mem.mem_read32(desc + MSG2_DESC_WR_IDX)?;
        let rd_idx = mem.mem_read32(desc + MSG2_DESC_RD_IDX)?;
        let buf_addr = mem.mem_read32(desc + MSG2_DESC_BUF_ADDR)?;

        if length < MSG2_MIN_FRAME_WORDS || length > MSG2_MAX_RING_WORDS || buf_addr == 0 {
            return Err(Error::Msg(MsgError::FwNotReady));
        }
        if wr_idx >= length || rd_idx >= length {
            return Err(Error::Msg(MsgError::Desync));
        }

        Ok(RingDesc {
            length,
            wr_idx,
            rd_idx,
            buf_addr,
        })
    }

    fn publish_wr_idx<M: SharedMem>(&self, mem: &mut M, dir: Dir, wr_idx: u32) -> Result<()> {
        let desc = self.base + dir.desc_offset();
        mem.mem_write32(desc + MSG2_DESC_WR_IDX, wr_idx)?;
        Ok(())
    }

    /// Reset a ring to the clean empty state
    fn erase<M: SharedMem>(&self, mem: &mut M, dir: Dir) -> Result<()> {
        let desc = self.base + dir.desc_offset();
        mem.mem_write32(desc + MSG2_DESC_WR_IDX, 0)?;
        mem.mem_write32(desc + MSG2_DESC_RD_IDX, 0)?;
        Ok(())
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Frame and send one message to the firmware
    ///
    /// Acquires the ring lock (bounded retry), invalidates any stale
    /// response left in the receive ring, writes header, payload and
    /// checksum, then publishes the write index as the commit point.
    /// The lock is released on every path; a failed push leaves nothing
    /// half-visible to the firmware.
    pub fn push_message<M: SharedMem, D: DelayNs>(
        &mut self,
        mem: &mut M,
        delay: &mut D,
        id: u8,
        mtype: u8,
        payload: &[u32],
    ) -> Result<()> {
        let frame_words = payload.len() as u32 + MSG2_MIN_FRAME_WORDS;
        if frame_words > MSG2_MAX_FRAME_WORDS {
            return Err(Error::Msg(MsgError::Overflow));
        }

        self.lock.wait_and_lock(mem, delay).map_err(Error::Io)?;

        let result = self.push_locked(mem, id, mtype, payload);
        let unlocked = self.lock.release(mem);
        result?;
        unlocked.map_err(Error::Io)?;
        Ok(())
    }

    fn push_locked<M: SharedMem>(
        &mut self,
        mem: &mut M,
        id: u8,
        mtype: u8,
        payload: &[u32],
    ) -> Result<()> {
        let tx = self.fetch_desc(mem, Dir::Tx)?;

        // A previous exchange may have been abandoned with its response
        // still queued; the next pull must not mistake it for ours.
        self.erase(mem, Dir::Rx)?;
        self.rx = None;

        let frame_words = payload.len() as u32 + MSG2_MIN_FRAME_WORDS;
        if frame_words > tx.free() {
            return Err(Error::Msg(MsgError::Overflow));
        }

        let header = Msg2Header {
            id,
            mtype,
            len: frame_words as u16,
        };

        let mut ck = Checksum::new();
        let header_word = header.encode();
        ck.update_word(header_word);
        mem.mem_write32(tx.word_addr(tx.wr_idx, 0), header_word)?;

        for (i, &word) in payload.iter().enumerate() {
            ck.update_word(word);
            mem.mem_write32(tx.word_addr(tx.wr_idx, 1 + i as u32), word)?;
        }
        mem.mem_write32(tx.word_addr(tx.wr_idx, 1 + payload.len() as u32), ck.value())?;

        // Commit: nothing above is visible to the firmware until here.
        self.publish_wr_idx(mem, Dir::Tx, (tx.wr_idx + frame_words) % tx.length)
    }

    // =========================================================================
    // Pull (single-shot)
    // =========================================================================

    /// Wait for and consume one complete response frame
    ///
    /// Blocks (bounded) until at least a minimal frame is queued, locks,
    /// validates length and checksum, and copies the payload into `out`.
    /// Single-shot mode always drains the ring fully on success.
    ///
    /// Any length or checksum violation erases the receive ring before
    /// the error is returned; a fresh exchange then starts from a clean
    /// empty ring.
    pub fn pull_message<M: SharedMem, D: DelayNs>(
        &mut self,
        mem: &mut M,
        delay: &mut D,
        out: &mut [u32],
    ) -> Result<Msg2Header> {
        // Wait outside the lock so the firmware can produce the frame.
        let mut elapsed = 0u32;
        loop {
            let rx = self.fetch_desc(mem, Dir::Rx)?;
            if rx.pending() >= MSG2_MIN_FRAME_WORDS {
                break;
            }
            if elapsed >= self.data_timeout_us {
                return Err(Error::Io(IoError::Timeout));
            }
            delay.delay_us(POLL_INTERVAL_US);
            elapsed += POLL_INTERVAL_US;
        }

        self.lock.wait_and_lock(mem, delay).map_err(Error::Io)?;

        let result = self.pull_locked(mem, out);
        let unlocked = self.lock.release(mem);
        let header = result?;
        unlocked.map_err(Error::Io)?;
        Ok(header)
    }

    fn pull_locked<M: SharedMem>(&mut self, mem: &mut M, out: &mut [u32]) -> Result<Msg2Header> {
        let rx = self.fetch_desc(mem, Dir::Rx)?;
        let header = self.validate_frame(mem, &rx)?;

        let payload_words = header.payload_words();
        if payload_words as usize > out.len() {
            // caller buffer too small is still a trust failure for the
            // ring: offsets past this frame cannot be re-synchronized
            self.erase(mem, Dir::Rx)?;
            return Err(Error::Msg(MsgError::LengthMismatch));
        }

        for i in 0..payload_words {
            out[i as usize] = mem.mem_read32(rx.word_addr(rx.rd_idx, 1 + i))?;
        }

        // fully drained; reset to the canonical empty state
        self.erase(mem, Dir::Rx)?;
        self.rx = None;
        Ok(header)
    }

    // =========================================================================
    // Pull (streaming)
    // =========================================================================

    /// Non-blocking check for a validated response frame
    ///
    /// One lock attempt; `Ok(None)` when the lock is contended or no
    /// complete frame is queued yet. On `Ok(Some(_))` the whole frame
    /// checksum has been verified and the lock is **left held**; the
    /// caller reads payload blocks with [`read_block`] and must finish
    /// with [`end_pull`].
    ///
    /// [`read_block`]: Msg2Link::read_block
    /// [`end_pull`]: Msg2Link::end_pull
    pub fn try_begin_pull<M: SharedMem>(&mut self, mem: &mut M) -> Result<Option<Msg2Header>> {
        if !self.lock.try_acquire(mem).map_err(Error::Io)? {
            return Ok(None);
        }

        match self.begin_locked(mem) {
            Ok(Some(header)) => Ok(Some(header)),
            Ok(None) => {
                self.lock.release(mem).map_err(Error::Io)?;
                Ok(None)
            }
            Err(e) => {
                let _ = self.lock.release(mem);
                Err(e)
            }
        }
    }

    fn begin_locked<M: SharedMem>(&mut self, mem: &mut M) -> Result<Option<Msg2Header>> {
        let rx = self.fetch_desc(mem, Dir::Rx)?;
        if rx.pending() < MSG2_MIN_FRAME_WORDS {
            return Ok(None);
        }

        let header = self.validate_frame(mem, &rx)?;
        self.rx = Some(rx);
        Ok(Some(header))
    }

    /// Read `out.len()` payload words starting at `word_offset`
    ///
    /// Valid only between a successful [`try_begin_pull`] and the
    /// matching [`end_pull`], against the frame whose header was
    /// returned there.
    ///
    /// [`try_begin_pull`]: Msg2Link::try_begin_pull
    /// [`end_pull`]: Msg2Link::end_pull
    pub fn read_block<M: SharedMem>(
        &mut self,
        mem: &mut M,
        header: Msg2Header,
        word_offset: u32,
        out: &mut [u32],
    ) -> Result<()> {
        let Some(rx) = self.rx else {
            return Err(Error::Msg(MsgError::Desync));
        };
        if !self.lock.is_held() {
            return Err(Error::Msg(MsgError::Desync));
        }
        if word_offset + out.len() as u32 > header.payload_words() {
            return Err(Error::Msg(MsgError::LengthMismatch));
        }

        for (i, slot) in out.iter_mut().enumerate() {
            *slot = mem.mem_read32(rx.word_addr(rx.rd_idx, 1 + word_offset + i as u32))?;
        }
        Ok(())
    }

    /// Finish a streaming pull
    ///
    /// With `consume` set the frame is dropped from the ring (indexes
    /// reset); otherwise it stays queued for the next
    /// [`try_begin_pull`]. The lock is released either way.
    ///
    /// [`try_begin_pull`]: Msg2Link::try_begin_pull
    pub fn end_pull<M: SharedMem>(&mut self, mem: &mut M, consume: bool) -> Result<()> {
        let erased = if consume {
            self.rx = None;
            self.erase(mem, Dir::Rx)
        } else {
            Ok(())
        };
        // the firmware-facing flag comes down even when the erase failed
        self.lock.release(mem).map_err(Error::Io)?;
        erased
    }

    // =========================================================================
    // Frame Validation
    // =========================================================================

    /// Decode and fully validate the frame at the ring's read index
    ///
    /// Length violations and checksum mismatches erase the ring before
    /// returning; the lock stays held (callers release it).
    fn validate_frame<M: SharedMem>(&mut self, mem: &mut M, rx: &RingDesc) -> Result<Msg2Header> {
        let header_word = mem.mem_read32(rx.word_addr(rx.rd_idx, 0))?;
        let header = Msg2Header::decode(header_word);
        let len = u32::from(header.len);

        if len < MSG2_MIN_FRAME_WORDS || len > MSG2_MAX_FRAME_WORDS || len > rx.pending() {
            self.erase(mem, Dir::Rx)?;
            self.rx = None;
            return Err(Error::Msg(MsgError::LengthMismatch));
        }

        let mut ck = Checksum::new();
        ck.update_word(header_word);
        for i in 0..header.payload_words() {
            ck.update_word(mem.mem_read32(rx.word_addr(rx.rd_idx, 1 + i))?);
        }
        let trailer = mem.mem_read32(rx.word_addr(rx.rd_idx, len - 1))?;
        if trailer != ck.value() {
            self.erase(mem, Dir::Rx)?;
            self.rx = None;
            return Err(Error::Msg(MsgError::ChecksumMismatch));
        }

        Ok(header)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
