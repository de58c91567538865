//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the driver on
//! the host without hardware access: a register bus with mailbox, PIF
//! and MSG2 firmware-side emulation, and a counting delay.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use std::collections::{HashMap, VecDeque};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::error::{IoError, IoResult};
use crate::hal::RegisterBus;
use crate::internal::constants::MBOX_FIFO_DEPTH;
use crate::internal::regs::{
    EFUSE_PKG_TYPE, MBOX_RX_DATA, MBOX_RX_FLUSH, MBOX_RX_SPACE, MBOX_TX_COUNT, MBOX_TX_DATA,
    MSG2_API2FW_DESC, MSG2_DESC_BUF_ADDR, MSG2_DESC_LENGTH, MSG2_DESC_RD_IDX, MSG2_DESC_WR_IDX,
    MSG2_FW2API_DESC, MSG2_SHARED_BASE, PIF_ADDR_LSW, PIF_ADDR_MSW, PIF_DATA_LSW, PIF_DATA_MSW,
};
use crate::msg2::{checksum_words, Msg2Header};
use crate::topology::{Die, PackageType};

/// Ring geometry the mock "firmware" sets up in [`MockPhyBus::msg2_init_rings`]
pub const MOCK_RING_WORDS: u32 = 64;
const MOCK_TX_BUF: u32 = 0x5FF8_1000;
const MOCK_RX_BUF: u32 = 0x5FF8_2000;

// =============================================================================
// Mock Register Bus
// =============================================================================

/// Per-die PIF indirection latch state
#[derive(Default, Clone, Copy)]
struct PifLatch {
    addr: u32,
    data_lsw: u16,
}

/// Per-die mailbox FIFO pair
#[derive(Default)]
struct MboxFifos {
    /// Host-to-MCU halves
    rx: VecDeque<u16>,
    /// MCU-to-host halves
    tx: VecDeque<u16>,
}

/// Mock register bus for testing the driver without hardware
///
/// Emulates the register-level semantics the driver depends on: the
/// mailbox FIFO registers, the PIF indirection window into a flat MCU
/// memory, and a minimal firmware side of the MSG2 request ring.
///
/// # Example
///
/// ```ignore
/// let mut bus = MockPhyBus::new();
/// bus.set_package(0x40, PackageType::BareDie);
/// bus.msg2_init_rings();
/// let mut phy = Phy::new(bus, PhyConfig::default());
/// ```
#[derive(Default)]
pub struct MockPhyBus {
    registers: HashMap<(u32, u16), u16>,
    mcu_mem: HashMap<u32, u32>,
    pif: HashMap<u32, PifLatch>,
    mbox: HashMap<u32, MboxFifos>,
    scheduled: HashMap<(u32, u16), (u32, u16)>,
    write_log: Vec<(u32, u16, u16)>,
    read_count: usize,
    fail_read_at: Option<(u32, u16)>,
    fail_read_after: Option<usize>,
    fail_write_at: Option<(u32, u16)>,
    autorespond: Option<(u8, Vec<u32>)>,
    last_request: Option<(Msg2Header, Vec<u32>)>,
    mbox_auto: HashMap<u32, (crate::driver::MboxHeader, Vec<u32>)>,
}

impl MockPhyBus {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Plain register helpers
    // =========================================================================

    /// Preload a register value
    pub fn set_register(&mut self, die: u32, addr: u16, value: u16) {
        self.registers.insert((die, addr), value);
    }

    /// Peek a register without going through the bus semantics
    pub fn register(&self, die: u32, addr: u16) -> u16 {
        *self.registers.get(&(die, addr)).unwrap_or(&0)
    }

    /// Change a register value after it has been read `reads` more times
    pub fn schedule_register(&mut self, die: u32, addr: u16, reads: u32, value: u16) {
        self.scheduled.insert((die, addr), (reads, value));
    }

    /// Program the EFUSE package-type field for a die
    pub fn set_package(&mut self, die: u32, pkg: PackageType) {
        self.set_register(die, EFUSE_PKG_TYPE, u16::from(pkg.tag()));
    }

    /// Every write performed, in order: `(die, addr, value)`
    pub fn writes(&self) -> &[(u32, u16, u16)] {
        &self.write_log
    }

    /// Number of register reads performed so far
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    /// Fail the next access to this register with a bus error
    pub fn simulate_read_failure(&mut self, die: u32, addr: u16) {
        self.fail_read_at = Some((die, addr));
    }

    /// Fail the `nth` register read from now with a bus error
    ///
    /// `1` fails the very next read, whatever register it targets.
    pub fn simulate_read_failure_after(&mut self, nth: usize) {
        self.fail_read_after = Some(self.read_count + nth);
    }

    pub fn simulate_write_failure(&mut self, die: u32, addr: u16) {
        self.fail_write_at = Some((die, addr));
    }

    // =========================================================================
    // Mailbox firmware role
    // =========================================================================

    /// Queue a response in the MCU-to-host FIFO
    ///
    /// `words` carries the payload exactly as the firmware would send it
    /// (return code first for types that have one).
    pub fn mbox_respond(&mut self, die: u32, header: crate::driver::MboxHeader, words: &[u32]) {
        let fifos = self.mbox.entry(die).or_default();
        for word in [header.word0(), header.word1()]
            .into_iter()
            .chain(words.iter().copied())
        {
            fifos.tx.push_back(word as u16);
            fifos.tx.push_back((word >> 16) as u16);
        }
    }

    /// Everything the host has pushed, re-paired into 32-bit words
    pub fn mbox_sent_words(&self, die: u32) -> Vec<u32> {
        let Some(fifos) = self.mbox.get(&die) else {
            return Vec::new();
        };
        fifos
            .rx
            .iter()
            .copied()
            .collect::<Vec<u16>>()
            .chunks_exact(2)
            .map(|pair| (u32::from(pair[1]) << 16) | u32::from(pair[0]))
            .collect()
    }

    /// Answer every complete mailbox request on this die with the
    /// given response
    pub fn mbox_autorespond(&mut self, die: u32, header: crate::driver::MboxHeader, words: &[u32]) {
        self.mbox_auto.insert(die, (header, words.to_vec()));
    }

    /// Firmware side of the mailbox: once a complete request (header
    /// plus declared payload) has arrived, consume it and queue the
    /// armed response
    fn mbox_try_consume(&mut self, die: u32) {
        let Some((header, words)) = self.mbox_auto.get(&die).cloned() else {
            return;
        };
        let fifos = self.mbox.entry(die).or_default();
        if fifos.rx.len() < 4 {
            return;
        }
        let word0 = (u32::from(fifos.rx[1]) << 16) | u32::from(fifos.rx[0]);
        let need = 4 + 2 * (word0 & 0xFFFF) as usize;
        if fifos.rx.len() < need {
            return;
        }
        for _ in 0..need {
            fifos.rx.pop_front();
        }
        self.mbox_respond(die, header, &words);
    }

    /// Fill the host-to-MCU FIFO so the next push has no space
    pub fn mbox_fill_rx(&mut self, die: u32) {
        let fifos = self.mbox.entry(die).or_default();
        while fifos.rx.len() < MBOX_FIFO_DEPTH as usize {
            fifos.rx.push_back(0);
        }
    }

    // =========================================================================
    // MSG2 firmware role
    // =========================================================================

    /// Initialize both ring descriptors the way firmware boot does
    pub fn msg2_init_rings(&mut self) {
        let tx = MSG2_SHARED_BASE + MSG2_API2FW_DESC;
        self.mcu_mem.insert(tx + MSG2_DESC_LENGTH, MOCK_RING_WORDS);
        self.mcu_mem.insert(tx + MSG2_DESC_WR_IDX, 0);
        self.mcu_mem.insert(tx + MSG2_DESC_RD_IDX, 0);
        self.mcu_mem.insert(tx + MSG2_DESC_BUF_ADDR, MOCK_TX_BUF);

        let rx = MSG2_SHARED_BASE + MSG2_FW2API_DESC;
        self.mcu_mem.insert(rx + MSG2_DESC_LENGTH, MOCK_RING_WORDS);
        self.mcu_mem.insert(rx + MSG2_DESC_WR_IDX, 0);
        self.mcu_mem.insert(rx + MSG2_DESC_RD_IDX, 0);
        self.mcu_mem.insert(rx + MSG2_DESC_BUF_ADDR, MOCK_RX_BUF);
    }

    /// Queue a complete framed response in the FW-to-API ring
    pub fn msg2_fw_push(&mut self, mtype: u8, payload: &[u32]) {
        let desc = MSG2_SHARED_BASE + MSG2_FW2API_DESC;
        let wr = *self.mcu_mem.get(&(desc + MSG2_DESC_WR_IDX)).unwrap_or(&0);
        let len = payload.len() as u32 + 2;

        let header = Msg2Header {
            id: 0,
            mtype,
            len: len as u16,
        };
        let mut frame = Vec::with_capacity(len as usize);
        frame.push(header.encode());
        frame.extend_from_slice(payload);
        frame.push(checksum_words(&frame));

        for (i, &word) in frame.iter().enumerate() {
            let slot = (wr + i as u32) % MOCK_RING_WORDS;
            self.mcu_mem.insert(MOCK_RX_BUF + 4 * slot, word);
        }
        self.mcu_mem
            .insert(desc + MSG2_DESC_WR_IDX, (wr + len) % MOCK_RING_WORDS);
    }

    /// Answer every pushed request with this response frame
    pub fn msg2_autorespond(&mut self, mtype: u8, payload: &[u32]) {
        self.autorespond = Some((mtype, payload.to_vec()));
    }

    /// Most recent request the host committed to the API-to-FW ring
    pub fn msg2_last_request(&self) -> Option<(Msg2Header, Vec<u32>)> {
        self.last_request.clone()
    }

    /// Whether the FW-to-API ring holds no unconsumed frame
    pub fn msg2_rx_empty(&self) -> bool {
        let desc = MSG2_SHARED_BASE + MSG2_FW2API_DESC;
        let wr = *self.mcu_mem.get(&(desc + MSG2_DESC_WR_IDX)).unwrap_or(&0);
        let rd = *self.mcu_mem.get(&(desc + MSG2_DESC_RD_IDX)).unwrap_or(&0);
        wr == rd
    }

    /// Peek one word of emulated MCU memory
    pub fn mcu_word(&self, addr: u32) -> u32 {
        *self.mcu_mem.get(&addr).unwrap_or(&0)
    }

    /// Firmware side of the request ring: runs when the host commits a
    /// new write index, consuming the request and optionally answering
    fn on_tx_commit(&mut self) {
        let desc = MSG2_SHARED_BASE + MSG2_API2FW_DESC;
        let wr = *self.mcu_mem.get(&(desc + MSG2_DESC_WR_IDX)).unwrap_or(&0);
        let rd = *self.mcu_mem.get(&(desc + MSG2_DESC_RD_IDX)).unwrap_or(&0);
        if wr == rd {
            return;
        }

        let word_at = |mem: &HashMap<u32, u32>, off: u32| {
            *mem.get(&(MOCK_TX_BUF + 4 * ((rd + off) % MOCK_RING_WORDS)))
                .unwrap_or(&0)
        };
        let header = Msg2Header::decode(word_at(&self.mcu_mem, 0));
        let payload: Vec<u32> = (0..header.payload_words())
            .map(|i| word_at(&self.mcu_mem, 1 + i))
            .collect();

        self.last_request = Some((header, payload));
        self.mcu_mem.insert(desc + MSG2_DESC_RD_IDX, wr);

        if let Some((mtype, payload)) = self.autorespond.clone() {
            self.msg2_fw_push(mtype, &payload);
        }
    }

    // =========================================================================
    // Register semantics
    // =========================================================================

    fn mcu_read_latched(&mut self, die: u32, msw: bool) -> u16 {
        let addr = self.pif.entry(die).or_default().addr;
        let value = *self.mcu_mem.get(&addr).unwrap_or(&0);
        if msw {
            (value >> 16) as u16
        } else {
            value as u16
        }
    }
}

impl RegisterBus for MockPhyBus {
    fn reg_get(&mut self, die: Die, addr: u16) -> IoResult<u16> {
        let die = die.raw();
        self.read_count += 1;

        if self.fail_read_at == Some((die, addr)) {
            self.fail_read_at = None;
            return Err(IoError::Bus);
        }
        if self.fail_read_after == Some(self.read_count) {
            self.fail_read_after = None;
            return Err(IoError::Bus);
        }

        if let Some((remaining, value)) = self.scheduled.get_mut(&(die, addr)) {
            if *remaining == 0 {
                let value = *value;
                self.scheduled.remove(&(die, addr));
                self.registers.insert((die, addr), value);
            } else {
                *remaining -= 1;
            }
        }

        let value = match addr {
            MBOX_RX_SPACE => {
                let fifos = self.mbox.entry(die).or_default();
                MBOX_FIFO_DEPTH.saturating_sub(fifos.rx.len() as u16)
            }
            MBOX_TX_COUNT => self.mbox.entry(die).or_default().tx.len() as u16,
            MBOX_TX_DATA => self
                .mbox
                .entry(die)
                .or_default()
                .tx
                .pop_front()
                .unwrap_or(0),
            PIF_DATA_LSW => self.mcu_read_latched(die, false),
            PIF_DATA_MSW => self.mcu_read_latched(die, true),
            _ => *self.registers.get(&(die, addr)).unwrap_or(&0),
        };
        Ok(value)
    }

    fn reg_set(&mut self, die: Die, addr: u16, value: u16) -> IoResult<()> {
        let die = die.raw();

        if self.fail_write_at == Some((die, addr)) {
            self.fail_write_at = None;
            return Err(IoError::Bus);
        }

        self.write_log.push((die, addr, value));

        match addr {
            MBOX_RX_DATA => {
                self.mbox.entry(die).or_default().rx.push_back(value);
                self.mbox_try_consume(die);
            }
            MBOX_RX_FLUSH => {
                self.mbox.entry(die).or_default().rx.clear();
            }
            PIF_ADDR_LSW => {
                let latch = self.pif.entry(die).or_default();
                latch.addr = (latch.addr & 0xFFFF_0000) | u32::from(value);
            }
            PIF_ADDR_MSW => {
                let latch = self.pif.entry(die).or_default();
                latch.addr = (u32::from(value) << 16) | (latch.addr & 0xFFFF);
            }
            PIF_DATA_LSW => {
                self.pif.entry(die).or_default().data_lsw = value;
            }
            PIF_DATA_MSW => {
                let latch = *self.pif.entry(die).or_default();
                let word = (u32::from(value) << 16) | u32::from(latch.data_lsw);
                self.mcu_mem.insert(latch.addr, word);

                let tx_wr = MSG2_SHARED_BASE + MSG2_API2FW_DESC + MSG2_DESC_WR_IDX;
                if latch.addr == tx_wr {
                    self.on_tx_commit();
                }
            }
            _ => {
                self.registers.insert((die, addr), value);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Delay that counts instead of sleeping
#[derive(Default)]
pub struct MockDelay {
    pub total_ns: u64,
    pub calls: u32,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }
}

// =============================================================================
// Mock self-tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DIE: Die = Die::new(0x40);

    #[test]
    fn plain_registers_roundtrip() {
        let mut bus = MockPhyBus::new();
        bus.reg_set(DIE, 0x100, 0xABCD).unwrap();
        assert_eq!(bus.reg_get(DIE, 0x100).unwrap(), 0xABCD);
        assert_eq!(bus.writes(), &[(0x40, 0x100, 0xABCD)]);
    }

    #[test]
    fn scheduled_register_flips_after_n_reads() {
        let mut bus = MockPhyBus::new();
        bus.set_register(0x40, 0x200, 1);
        bus.schedule_register(0x40, 0x200, 2, 9);

        assert_eq!(bus.reg_get(DIE, 0x200).unwrap(), 1);
        assert_eq!(bus.reg_get(DIE, 0x200).unwrap(), 1);
        assert_eq!(bus.reg_get(DIE, 0x200).unwrap(), 9);
    }

    #[test]
    fn mailbox_fifo_semantics() {
        let mut bus = MockPhyBus::new();
        assert_eq!(bus.reg_get(DIE, MBOX_RX_SPACE).unwrap(), MBOX_FIFO_DEPTH);

        bus.reg_set(DIE, MBOX_RX_DATA, 0x1111).unwrap();
        bus.reg_set(DIE, MBOX_RX_DATA, 0x2222).unwrap();
        assert_eq!(bus.reg_get(DIE, MBOX_RX_SPACE).unwrap(), MBOX_FIFO_DEPTH - 2);
        assert_eq!(bus.mbox_sent_words(0x40), std::vec![0x2222_1111]);

        bus.reg_set(DIE, MBOX_RX_FLUSH, 1).unwrap();
        assert_eq!(bus.reg_get(DIE, MBOX_RX_SPACE).unwrap(), MBOX_FIFO_DEPTH);
    }

    #[test]
    fn pif_window_reaches_mcu_memory() {
        let mut bus = MockPhyBus::new();
        bus.reg_set(DIE, PIF_ADDR_LSW, 0x0040).unwrap();
        bus.reg_set(DIE, PIF_ADDR_MSW, 0x5FF8).unwrap();
        bus.reg_set(DIE, PIF_DATA_LSW, 0xBEEF).unwrap();
        bus.reg_set(DIE, PIF_DATA_MSW, 0xDEAD).unwrap();

        assert_eq!(bus.mcu_word(0x5FF8_0040), 0xDEAD_BEEF);
        assert_eq!(bus.reg_get(DIE, PIF_DATA_LSW).unwrap(), 0xBEEF);
        assert_eq!(bus.reg_get(DIE, PIF_DATA_MSW).unwrap(), 0xDEAD);
    }

    #[test]
    fn fw_side_consumes_committed_requests() {
        let mut bus = MockPhyBus::new();
        bus.msg2_init_rings();

        // hand-write a one-payload-word request frame at slot 0
        let header = Msg2Header {
            id: 3,
            mtype: 0x30,
            len: 3,
        };
        let frame = [header.encode(), 0x77];
        let ck = checksum_words(&frame);
        for (i, &w) in [frame[0], frame[1], ck].iter().enumerate() {
            bus.mcu_mem.insert(MOCK_TX_BUF + 4 * i as u32, w);
        }

        // commit via the PIF path so the hook fires
        let wr_addr = MSG2_SHARED_BASE + MSG2_API2FW_DESC + MSG2_DESC_WR_IDX;
        bus.reg_set(DIE, PIF_ADDR_LSW, wr_addr as u16).unwrap();
        bus.reg_set(DIE, PIF_ADDR_MSW, (wr_addr >> 16) as u16).unwrap();
        bus.reg_set(DIE, PIF_DATA_LSW, 3).unwrap();
        bus.reg_set(DIE, PIF_DATA_MSW, 0).unwrap();

        let (got_header, got_payload) = bus.msg2_last_request().unwrap();
        assert_eq!(got_header, header);
        assert_eq!(got_payload, std::vec![0x77]);
    }
}
