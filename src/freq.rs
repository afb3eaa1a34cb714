//! Symbol frequency model.
//!
//! The alphabet is always the full byte range. Tables are transient values
//! derived per encode/decode call; the only persisted form is the 256-byte
//! quantized table written into entropy-coded archives.

use std::fmt;

/// Number of symbols in the alphabet (all byte values).
pub const ALPHABET_SIZE: usize = 256;

/// Largest weight representable in the on-wire frequency table.
pub const WIRE_WEIGHT_MAX: u64 = 255;

/// Occurrence counts for each of the 256 byte values.
#[derive(Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; ALPHABET_SIZE],
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self {
            counts: [0; ALPHABET_SIZE],
        }
    }

    /// Tally every byte of `data`. Single pass, never fails.
    pub fn count(data: &[u8]) -> Self {
        let mut table = Self::new();
        for &byte in data {
            table.counts[byte as usize] += 1;
        }
        table
    }

    pub fn get(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    pub fn set(&mut self, symbol: u8, count: u64) {
        self.counts[symbol as usize] = count;
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// True when every count is zero (empty input).
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Symbols with a non-zero count, in ascending symbol order.
    pub fn symbols(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(sym, &c)| (sym as u8, c))
    }

    /// Rescale counts so the table fits `target_max`: each non-zero count
    /// `c` with total `n` maps to `max(1, floor(c * target_max / n))`.
    ///
    /// A symbol present in the data never quantizes to zero. Losing a
    /// present symbol would drop it from the code table and make the
    /// archive undecodable, so the floor of 1 is a correctness invariant,
    /// not a tuning choice.
    pub fn normalize(&self, target_max: u64) -> FrequencyTable {
        let total = self.total();
        let mut normalized = Self::new();
        if total == 0 {
            return normalized;
        }
        for (symbol, count) in self.symbols() {
            let scaled = (count as u128 * target_max as u128 / total as u128) as u64;
            normalized.set(symbol, scaled.max(1));
        }
        normalized
    }

    /// On-wire form: one byte per symbol. Call on tables already normalized
    /// to `WIRE_WEIGHT_MAX`; larger weights are clamped.
    pub fn wire_bytes(&self) -> [u8; ALPHABET_SIZE] {
        let mut bytes = [0u8; ALPHABET_SIZE];
        for (i, &count) in self.counts.iter().enumerate() {
            bytes[i] = count.min(WIRE_WEIGHT_MAX) as u8;
        }
        bytes
    }

    /// Rebuild a table from its on-wire form.
    pub fn from_wire(bytes: &[u8; ALPHABET_SIZE]) -> Self {
        let mut table = Self::new();
        for (i, &b) in bytes.iter().enumerate() {
            table.counts[i] = b as u64;
        }
        table
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrequencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.symbols()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count() {
        let table = FrequencyTable::count(b"AAAABBBCCD");
        assert_eq!(table.get(b'A'), 4);
        assert_eq!(table.get(b'B'), 3);
        assert_eq!(table.get(b'C'), 2);
        assert_eq!(table.get(b'D'), 1);
        assert_eq!(table.get(b'E'), 0);
        assert_eq!(table.total(), 10);
    }

    #[test]
    fn test_normalize_preserves_order_and_presence() {
        let quantized = FrequencyTable::count(b"AAAABBBCCD").normalize(WIRE_WEIGHT_MAX);
        assert_eq!(quantized.get(b'A'), 102); // floor(4 * 255 / 10)
        assert_eq!(quantized.get(b'B'), 76); // floor(3 * 255 / 10)
        assert_eq!(quantized.get(b'C'), 51);
        assert_eq!(quantized.get(b'D'), 25);
        assert!(quantized.get(b'A') > quantized.get(b'B'));
        assert!(quantized.get(b'B') > quantized.get(b'C'));
        assert!(quantized.get(b'C') > quantized.get(b'D'));
    }

    #[test]
    fn test_normalize_never_drops_present_symbol() {
        // One rare symbol among many: floor would be 0, the guarantee keeps 1.
        let mut data = vec![b'x'; 100_000];
        data.push(b'y');
        let quantized = FrequencyTable::count(&data).normalize(WIRE_WEIGHT_MAX);
        assert_eq!(quantized.get(b'y'), 1);
        assert_eq!(quantized.get(b'x'), 254); // floor(100000 * 255 / 100001)
        assert_eq!(quantized.get(b'z'), 0);
    }

    #[test]
    fn test_normalize_empty() {
        let quantized = FrequencyTable::new().normalize(WIRE_WEIGHT_MAX);
        assert!(quantized.is_empty());
    }

    #[test]
    fn test_wire_roundtrip() {
        let quantized = FrequencyTable::count(b"hello world").normalize(WIRE_WEIGHT_MAX);
        let restored = FrequencyTable::from_wire(&quantized.wire_bytes());
        assert_eq!(restored, quantized);
    }

    #[test]
    fn test_single_symbol_quantizes_to_max() {
        let quantized = FrequencyTable::count(b"AAAA").normalize(WIRE_WEIGHT_MAX);
        assert_eq!(quantized.get(b'A'), 255);
        assert_eq!(quantized.symbols().count(), 1);
    }
}
