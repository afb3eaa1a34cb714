//! Bit-level packing shared by the entropy coders.
//!
//! Both coders transmit codes most-significant-bit first and zero-pad the
//! final byte. Readers stop at the declared symbol count, so pad bits are
//! never interpreted.

/// Accumulates single bits into bytes, MSB first.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one bit.
    pub fn write_bit(&mut self, bit: bool) {
        self.current = (self.current << 1) | bit as u8;
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    /// Total number of bits written so far.
    pub fn bit_len(&self) -> u64 {
        self.bytes.len() as u64 * 8 + self.filled as u64
    }

    /// Flush the final partial byte (zero-padded on the right) and return
    /// the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current << (8 - self.filled));
        }
        self.bytes
    }
}

/// Reads single bits from a byte slice, MSB first.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Next bit, or `None` once the input is exhausted.
    pub fn read_bit(&mut self) -> Option<bool> {
        let byte_index = (self.position / 8) as usize;
        if byte_index >= self.data.len() {
            return None;
        }
        let shift = 7 - (self.position % 8) as u8;
        self.position += 1;
        Some((self.data[byte_index] >> shift) & 1 == 1)
    }

    /// Bits left in the input, counting pad bits.
    pub fn bits_remaining(&self) -> u64 {
        self.data.len() as u64 * 8 - self.position
    }
}
