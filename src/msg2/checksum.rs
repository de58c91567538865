//! Rotate-accumulate frame checksum
//!
//! The firmware sums every byte of the frame into a 32-bit accumulator
//! that is rotated right by one bit before each add. The algorithm is
//! order-sensitive, which is what makes it useful here: a transposed or
//! shifted word changes the result even when the byte multiset does not.
//! It is an integrity check against desynchronized ring offsets, not a
//! cryptographic MAC.

/// Incremental rotate-accumulate checksum
///
/// Words are folded in little-endian byte order, matching the layout the
/// firmware sees in its own RAM. Feed the header word first, then each
/// payload word in transmission order.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Checksum {
    acc: u32,
}

impl Checksum {
    /// Start a fresh accumulator
    pub const fn new() -> Self {
        Self { acc: 0 }
    }

    /// Fold one byte into the accumulator
    #[inline]
    pub fn update_byte(&mut self, byte: u8) {
        self.acc = self.acc.rotate_right(1).wrapping_add(u32::from(byte));
    }

    /// Fold one 32-bit word, little-endian byte order
    pub fn update_word(&mut self, word: u32) {
        for byte in word.to_le_bytes() {
            self.update_byte(byte);
        }
    }

    /// Current accumulator value
    pub const fn value(self) -> u32 {
        self.acc
    }
}

/// Checksum of a complete frame slice (header word first)
pub fn checksum_words(words: &[u32]) -> u32 {
    let mut ck = Checksum::new();
    for &word in words {
        ck.update_word(word);
    }
    ck.value()
}

// =============================================================================
// Unit Tests
// =============================================================================
