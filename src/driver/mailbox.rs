//! Legacy mailbox transport.
//!
//! The original firmware message path: two 16-bit hardware FIFOs, one
//! per direction. Each logical 32-bit word crosses the FIFO as two
//! halves, LSW first; the pairing must never interleave with another
//! exchange, so a whole send or receive runs under one hardware lock
//! hold.
//!
//! Any timeout mid-exchange is fatal to that exchange: the host flushes
//! its outbound FIFO and drains the inbound one before the caller may
//! retry, so a half-written message can never linger in flight.

use embedded_hal::delay::DelayNs;

use super::config::FwMode;
use super::phy::Phy;
use crate::error::{Error, IoError, MsgError, Result};
use crate::hal::{HwLock, RegisterBus};
use crate::internal::constants::{MBOX_FIFO_DEPTH, MBOX_HEADER_WORDS, MBOX_MAX_PAYLOAD_WORDS};
use crate::internal::regs::{
    MBOX_RX_DATA, MBOX_RX_FLUSH, MBOX_RX_SPACE, MBOX_TX_COUNT, MBOX_TX_DATA,
};
use crate::topology::Die;

/// Message types whose responses carry no leading return code
///
/// Known from the firmware message catalog; membership is decided by
/// type, never inferred from the payload.
pub const NO_RC_TYPES: [u8; 1] = [0x10];

/// Mailbox message type: MCU status query
pub const MBOX_TYPE_STATUS: u8 = 0x01;

// =============================================================================
// Mailbox Framing
// =============================================================================

/// Two-word mailbox message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MboxHeader {
    /// Rolling message id (informational)
    pub id: u8,
    /// Message type
    pub mtype: u8,
    /// Payload length in 32-bit words, return code included
    pub len: u16,
    /// Opaque token echoed back by the firmware
    pub token: u32,
}

impl MboxHeader {
    /// First header word: `{id:8, type:8, len:16}`
    pub const fn word0(self) -> u32 {
        ((self.id as u32) << 24) | ((self.mtype as u32) << 16) | self.len as u32
    }

    /// Second header word: the echo token
    pub const fn word1(self) -> u32 {
        self.token
    }

    /// Decode from the two received header words
    pub const fn decode(word0: u32, word1: u32) -> Self {
        Self {
            id: (word0 >> 24) as u8,
            mtype: (word0 >> 16) as u8,
            len: word0 as u16,
            token: word1,
        }
    }

    /// Whether responses of this type carry a leading return code
    pub fn has_rc(self) -> bool {
        !NO_RC_TYPES.contains(&self.mtype)
    }
}

/// Decoded mailbox response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MboxReply {
    /// Response header
    pub header: MboxHeader,
    /// Return code, absent for [`NO_RC_TYPES`] messages
    pub rc: Option<u32>,
    /// Number of data words copied into the caller's buffer
    pub data_words: usize,
}

// =============================================================================
// Mailbox Operations
// =============================================================================

impl<B: RegisterBus, L: HwLock> Phy<B, L> {
    /// Send one message to the MCU over the legacy mailbox
    ///
    /// Verifies the firmware is message-capable, drains stale entries
    /// left by a prior aborted exchange, then streams header and payload
    /// word by word, waiting (bounded) for FIFO space before each word.
    pub fn msg_send<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        header: MboxHeader,
        payload: &[u32],
    ) -> Result<()> {
        if payload.len() > MBOX_MAX_PAYLOAD_WORDS {
            return Err(Error::Msg(MsgError::Overflow));
        }
        if !self.fw_mode(die)?.is_message_capable() {
            return Err(Error::Msg(MsgError::FwNotReady));
        }

        self.hw_lock(die)?;
        let result = self.msg_send_inner(die, delay, header, payload);
        if result.is_err() {
            // never leave a half-written message in flight
            let _ = self.mbox_resync(die);
        }
        self.hw_unlock(die)?;
        result
    }

    fn msg_send_inner<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        header: MboxHeader,
        payload: &[u32],
    ) -> Result<()> {
        // stale responses from an aborted exchange would otherwise be
        // decoded as the reply to this one
        self.mbox_drain(die)?;

        self.mbox_push_word(die, delay, header.word0())?;
        self.mbox_push_word(die, delay, header.word1())?;
        for &word in payload {
            self.mbox_push_word(die, delay, word)?;
        }
        Ok(())
    }

    /// Receive one message from the MCU over the legacy mailbox
    ///
    /// Waits (bounded) for the two header words, then reads the return
    /// code (unless the type is in [`NO_RC_TYPES`]) and the data words.
    /// A payload larger than `out` fails with
    /// [`IoError::BufferTooSmall`] before anything is copied; the
    /// mailbox is resynchronized so the next exchange starts clean.
    pub fn msg_recv<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        out: &mut [u32],
    ) -> Result<MboxReply> {
        self.hw_lock(die)?;
        let result = self.msg_recv_inner(die, delay, out);
        if result.is_err() {
            let _ = self.mbox_resync(die);
        }
        self.hw_unlock(die)?;
        result
    }

    fn msg_recv_inner<D: DelayNs>(
        &mut self,
        die: Die,
        delay: &mut D,
        out: &mut [u32],
    ) -> Result<MboxReply> {
        // both header words must be queued before we start popping
        self.mbox_wait_data(die, delay, (MBOX_HEADER_WORDS * 2) as u16)?;
        let word0 = self.mbox_pop_word(die)?;
        let word1 = self.mbox_pop_word(die)?;
        let header = MboxHeader::decode(word0, word1);

        let total_words = header.len as usize;
        let has_rc = header.has_rc();
        if has_rc && total_words == 0 {
            return Err(Error::Msg(MsgError::LengthMismatch));
        }
        let data_words = total_words - usize::from(has_rc);
        if data_words > out.len() {
            return Err(Error::Io(IoError::BufferTooSmall));
        }

        let rc = if has_rc {
            self.mbox_wait_data(die, delay, 2)?;
            Some(self.mbox_pop_word(die)?)
        } else {
            None
        };

        for slot in out.iter_mut().take(data_words) {
            self.mbox_wait_data(die, delay, 2)?;
            *slot = self.mbox_pop_word(die)?;
        }

        Ok(MboxReply {
            header,
            rc,
            data_words,
        })
    }

    /// Query the MCU status word, one full lock-step exchange
    ///
    /// Sends a zero-payload status request and returns the response's
    /// return code.
    pub fn mcu_status<D: DelayNs>(&mut self, die: Die, delay: &mut D) -> Result<u32> {
        let header = MboxHeader {
            id: self.take_msg_id(),
            mtype: MBOX_TYPE_STATUS,
            len: 0,
            token: 0,
        };
        self.msg_send(die, delay, header, &[])?;

        let reply = self.msg_recv(die, delay, &mut [])?;
        if reply.header.mtype != MBOX_TYPE_STATUS {
            return Err(Error::Msg(MsgError::UnexpectedType));
        }
        reply.rc.ok_or(Error::Msg(MsgError::LengthMismatch))
    }

    // =========================================================================
    // FIFO Primitives
    // =========================================================================

    /// Discard everything queued in the MCU-to-host FIFO
    fn mbox_drain(&mut self, die: Die) -> Result<()> {
        // bounded: the FIFO cannot hold more halves than its depth, but
        // the MCU may refill once while we drain
        for _ in 0..(MBOX_FIFO_DEPTH as u32 * 2) {
            if self.read(die, MBOX_TX_COUNT)? == 0 {
                return Ok(());
            }
            let _ = self.read(die, MBOX_TX_DATA)?;
        }
        Err(Error::Msg(MsgError::Desync))
    }

    /// Flush the host-to-MCU FIFO and drain the other direction
    fn mbox_resync(&mut self, die: Die) -> Result<()> {
        self.write(die, MBOX_RX_FLUSH, 1)?;
        self.mbox_drain(die)
    }

    /// Push one 32-bit word as two halves, LSW first
    fn mbox_push_word<D: DelayNs>(&mut self, die: Die, delay: &mut D, word: u32) -> Result<()> {
        self.mbox_wait_space(die, delay, 2)?;
        self.write(die, MBOX_RX_DATA, word as u16)?;
        self.write(die, MBOX_RX_DATA, (word >> 16) as u16)?;
        Ok(())
    }

    /// Pop one 32-bit word as two halves, LSW first
    fn mbox_pop_word(&mut self, die: Die) -> Result<u32> {
        let lsw = self.read(die, MBOX_TX_DATA)?;
        let msw = self.read(die, MBOX_TX_DATA)?;
        Ok((u32::from(msw) << 16) | u32::from(lsw))
    }

    /// Poll until the host-to-MCU FIFO has room for `halves` entries
    fn mbox_wait_space<D: DelayNs>(&mut self, die: Die, delay: &mut D, halves: u16) -> Result<()> {
        let mut elapsed = 0u32;
        loop {
            if self.read(die, MBOX_RX_SPACE)? >= halves {
                return Ok(());
            }
            if elapsed >= self.config().mbox_timeout_us {
                return Err(Error::Io(IoError::Timeout));
            }
            delay.delay_us(self.config().poll_interval_us);
            elapsed += self.config().poll_interval_us;
        }
    }

    /// Poll until the MCU-to-host FIFO holds at least `halves` entries
    fn mbox_wait_data<D: DelayNs>(&mut self, die: Die, delay: &mut D, halves: u16) -> Result<()> {
        let mut elapsed = 0u32;
        loop {
            if self.read(die, MBOX_TX_COUNT)? >= halves {
                return Ok(());
            }
            if elapsed >= self.config().mbox_timeout_us {
                return Err(Error::Io(IoError::Timeout));
            }
            delay.delay_us(self.config().poll_interval_us);
            elapsed += self.config().poll_interval_us;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
