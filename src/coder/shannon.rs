//! Shannon-Fano coding.
//!
//! Codes come from recursive bisection of the frequency-sorted symbol list;
//! decoding rebuilds the codes from the transmitted table and walks an
//! explicit binary trie. A bit path that leaves the trie is a terminal
//! decode error: resynchronizing at the root would silently fabricate
//! output from a corrupt stream.

use crate::bitio::BitReader;
use crate::code::{CodeTable, CodeWord};
use crate::coder::EntropyCoder;
use crate::error::{CofferError, Result};
use crate::freq::FrequencyTable;

/// Static Shannon-Fano coder (algorithm id 2).
#[derive(Debug, Clone, Copy)]
pub struct ShannonFanoCoder;

impl EntropyCoder for ShannonFanoCoder {
    fn build_codes(&self, freq: &FrequencyTable) -> CodeTable {
        let mut symbols: Vec<(u8, u64)> = freq.symbols().collect();
        // Frequency descending, symbol ascending: the deterministic order
        // both sides of the wire must agree on.
        symbols.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut table = CodeTable::new();
        assign_codes(&symbols, CodeWord::new(), &mut table);
        table
    }

    fn decode(&self, freq: &FrequencyTable, payload: &[u8], original_len: u64) -> Result<Vec<u8>> {
        if original_len == 0 {
            return Ok(Vec::new());
        }
        let table = self.build_codes(freq);
        if table.is_empty() {
            return Err(CofferError::CorruptStream(
                "empty frequency table for a non-empty payload",
            ));
        }
        let trie = DecodeTrie::from_table(&table);

        let max_symbols = payload.len() as u64 * 8;
        let mut out = Vec::with_capacity(original_len.min(max_symbols) as usize);
        let mut reader = BitReader::new(payload);

        while (out.len() as u64) < original_len {
            let mut node = DecodeTrie::ROOT;
            loop {
                if let Some(symbol) = trie.symbol_at(node) {
                    out.push(symbol);
                    break;
                }
                let bit = reader.read_bit().ok_or(CofferError::Truncated(
                    "bit stream ended before the declared symbol count",
                ))?;
                node = trie
                    .step(node, bit)
                    .ok_or(CofferError::CorruptStream("no code matches the bit path"))?;
            }
        }
        Ok(out)
    }
}

/// Assign codes to a frequency-sorted slice by repeated bisection.
fn assign_codes(symbols: &[(u8, u64)], prefix: CodeWord, table: &mut CodeTable) {
    match symbols {
        [] => {}
        [(symbol, _)] => {
            // A single-symbol alphabet still gets the one-bit code "0".
            let code = if prefix.is_empty() { CodeWord::zero() } else { prefix };
            table.set(*symbol, code);
        }
        _ => {
            let split = split_index(symbols);
            let (left, right) = symbols.split_at(split);
            let mut left_code = prefix.clone();
            left_code.push(false);
            let mut right_code = prefix;
            right_code.push(true);
            assign_codes(left, left_code, table);
            assign_codes(right, right_code, table);
        }
    }
}

/// First boundary at which the left half holds at least half the total
/// weight. `cum >= ceil(total / 2)` is the integer form of that rule.
fn split_index(symbols: &[(u8, u64)]) -> usize {
    let total: u64 = symbols.iter().map(|&(_, weight)| weight).sum();
    let half = total.div_ceil(2);
    let mut cumulative = 0u64;
    let mut split = 0;
    for (i, &(_, weight)) in symbols.iter().enumerate() {
        cumulative += weight;
        if cumulative >= half {
            split = i + 1;
            break;
        }
    }
    // An empty left half cannot make progress.
    if split == 0 {
        split = 1;
    }
    split
}

#[derive(Debug, Clone, Copy, Default)]
struct TrieNode {
    symbol: Option<u8>,
    children: [Option<usize>; 2],
}

/// Binary decode trie over an index arena, rebuilt from a code table.
#[derive(Debug)]
struct DecodeTrie {
    nodes: Vec<TrieNode>,
}

impl DecodeTrie {
    const ROOT: usize = 0;

    fn from_table(table: &CodeTable) -> Self {
        let mut trie = Self {
            nodes: vec![TrieNode::default()],
        };
        for (symbol, code) in table.entries() {
            trie.insert(code, symbol);
        }
        trie
    }

    fn insert(&mut self, code: &CodeWord, symbol: u8) {
        let mut node = Self::ROOT;
        for bit in code.iter() {
            let slot = bit as usize;
            node = match self.nodes[node].children[slot] {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].children[slot] = Some(next);
                    next
                }
            };
        }
        self.nodes[node].symbol = Some(symbol);
    }

    fn step(&self, node: usize, bit: bool) -> Option<usize> {
        self.nodes[node].children[bit as usize]
    }

    fn symbol_at(&self, node: usize) -> Option<u8> {
        self.nodes[node].symbol
    }
}
