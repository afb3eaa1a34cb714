//! Canonical Huffman coding.
//!
//! The tree is rebuilt from the quantized frequency table on both sides of
//! the wire, so construction must be bit-for-bit reproducible. All ordering
//! decisions go through one heap key; see [`CodeTree::from_frequencies`].

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::bitio::BitReader;
use crate::code::{CodeTable, CodeWord};
use crate::coder::EntropyCoder;
use crate::error::{CofferError, Result};
use crate::freq::FrequencyTable;

const LEAF_RANK: u8 = 0;
const INTERNAL_RANK: u8 = 1;

/// Min-heap key: weight, then leaves before internal nodes, then the leaf
/// symbol, then arena index. The arena index doubles as creation order, so
/// equal-rank internal nodes combine in insertion order. Changing any part
/// of this ordering changes every emitted code table.
type HeapKey = (u64, u8, u8, usize);

#[derive(Debug, Clone, Copy)]
struct Node {
    weight: u64,
    symbol: Option<u8>,
    left: Option<usize>,
    right: Option<usize>,
}

/// Huffman prefix-code tree over an index arena.
///
/// Internal nodes carry only a combined weight; each leaf carries exactly
/// one symbol. Children are arena indices, never owned pointers.
#[derive(Debug, Clone)]
pub struct CodeTree {
    nodes: Vec<Node>,
    root: usize,
}

impl CodeTree {
    /// Build the tree for `freq`, or `None` when every frequency is zero.
    ///
    /// Leaves are seeded in ascending symbol order, then the two
    /// lowest-ranked nodes are combined (first popped becomes the left
    /// child) until one root remains.
    pub fn from_frequencies(freq: &FrequencyTable) -> Option<Self> {
        let mut nodes = Vec::new();
        let mut heap: BinaryHeap<Reverse<HeapKey>> = BinaryHeap::new();

        for (symbol, weight) in freq.symbols() {
            let id = nodes.len();
            nodes.push(Node {
                weight,
                symbol: Some(symbol),
                left: None,
                right: None,
            });
            heap.push(Reverse((weight, LEAF_RANK, symbol, id)));
        }

        if nodes.is_empty() {
            return None;
        }

        // A lone symbol still needs a one-bit code, so it hangs off an
        // artificial parent instead of becoming the root itself.
        if nodes.len() == 1 {
            let weight = nodes[0].weight;
            nodes.push(Node {
                weight,
                symbol: None,
                left: Some(0),
                right: None,
            });
            return Some(Self { nodes, root: 1 });
        }

        while heap.len() > 1 {
            if let (Some(Reverse((left_weight, _, _, left))), Some(Reverse((right_weight, _, _, right)))) =
                (heap.pop(), heap.pop())
            {
                let weight = left_weight + right_weight;
                let id = nodes.len();
                nodes.push(Node {
                    weight,
                    symbol: None,
                    left: Some(left),
                    right: Some(right),
                });
                heap.push(Reverse((weight, INTERNAL_RANK, 0, id)));
            }
        }

        let Reverse((_, _, _, root)) = heap.pop()?;
        Some(Self { nodes, root })
    }

    /// Depth-first code assignment: 0 per left edge, 1 per right edge.
    pub fn code_table(&self) -> CodeTable {
        let mut table = CodeTable::new();
        let mut stack = vec![(self.root, CodeWord::new())];
        while let Some((id, prefix)) = stack.pop() {
            let node = &self.nodes[id];
            if let Some(symbol) = node.symbol {
                table.set(symbol, prefix);
                continue;
            }
            if let Some(right) = node.right {
                let mut code = prefix.clone();
                code.push(true);
                stack.push((right, code));
            }
            if let Some(left) = node.left {
                let mut code = prefix;
                code.push(false);
                stack.push((left, code));
            }
        }
        table
    }

    fn root(&self) -> usize {
        self.root
    }

    fn symbol_at(&self, id: usize) -> Option<u8> {
        self.nodes[id].symbol
    }

    fn child(&self, id: usize, bit: bool) -> Option<usize> {
        let node = &self.nodes[id];
        if bit {
            node.right
        } else {
            node.left
        }
    }
}

/// Static Huffman coder (algorithm id 1).
#[derive(Debug, Clone, Copy)]
pub struct HuffmanCoder;

impl EntropyCoder for HuffmanCoder {
    fn build_codes(&self, freq: &FrequencyTable) -> CodeTable {
        match CodeTree::from_frequencies(freq) {
            Some(tree) => tree.code_table(),
            None => CodeTable::new(),
        }
    }

    fn decode(&self, freq: &FrequencyTable, payload: &[u8], original_len: u64) -> Result<Vec<u8>> {
        if original_len == 0 {
            return Ok(Vec::new());
        }
        let tree = CodeTree::from_frequencies(freq).ok_or(CofferError::CorruptStream(
            "empty frequency table for a non-empty payload",
        ))?;

        // Every symbol costs at least one bit, which caps what a crafted
        // length field can make this allocate.
        let max_symbols = payload.len() as u64 * 8;
        let mut out = Vec::with_capacity(original_len.min(max_symbols) as usize);
        let mut reader = BitReader::new(payload);

        while (out.len() as u64) < original_len {
            let mut node = tree.root();
            loop {
                if let Some(symbol) = tree.symbol_at(node) {
                    out.push(symbol);
                    break;
                }
                let bit = reader.read_bit().ok_or(CofferError::Truncated(
                    "bit stream ended before the declared symbol count",
                ))?;
                node = tree
                    .child(node, bit)
                    .ok_or(CofferError::CorruptStream("bit walk reached a missing branch"))?;
            }
        }
        Ok(out)
    }
}
