//! Prefix codes: the bit sequences assigned to symbols by a coder.

use std::fmt;

use crate::freq::{FrequencyTable, ALPHABET_SIZE};

/// The bit sequence assigned to one symbol. Never empty in a valid table:
/// even a single-symbol alphabet codes that symbol as "0".
///
/// Codes are held as individual bits because Shannon-Fano over a skewed
/// 256-symbol alphabet can exceed 64 bits per code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeWord {
    bits: Vec<bool>,
}

impl CodeWord {
    pub fn new() -> Self {
        Self::default()
    }

    /// The one-bit code "0" used for degenerate single-symbol alphabets.
    pub fn zero() -> Self {
        Self { bits: vec![false] }
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }
}

impl fmt::Display for CodeWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.bits {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Symbol-to-code mapping produced by a coder. Prefix-free by construction
/// of the coders that build it.
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: Vec<Option<CodeWord>>,
}

impl CodeTable {
    pub fn new() -> Self {
        Self {
            codes: vec![None; ALPHABET_SIZE],
        }
    }

    pub fn set(&mut self, symbol: u8, code: CodeWord) {
        self.codes[symbol as usize] = Some(code);
    }

    pub fn get(&self, symbol: u8) -> Option<&CodeWord> {
        self.codes[symbol as usize].as_ref()
    }

    /// Number of symbols with an assigned code.
    pub fn len(&self) -> usize {
        self.codes.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.iter().all(|c| c.is_none())
    }

    /// Assigned (symbol, code) pairs in ascending symbol order.
    pub fn entries(&self) -> impl Iterator<Item = (u8, &CodeWord)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .filter_map(|(sym, code)| code.as_ref().map(|c| (sym as u8, c)))
    }

    /// Encoded payload length in bits when each symbol occurs as often as
    /// `counts` says. Symbols without a code contribute nothing.
    pub fn total_bits(&self, counts: &FrequencyTable) -> u64 {
        self.entries()
            .map(|(sym, code)| counts.get(sym) * code.len() as u64)
            .sum()
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::new()
    }
}
