//! Entropy coders and the static algorithm registry.
//!
//! Archive headers carry a one-byte algorithm id. Decoding routes the id
//! through the closed [`Algorithm`] enumeration to a compile-time-known
//! coder; there is no pluggable or runtime-loaded code path.

pub mod huffman;
pub mod shannon;

pub use huffman::{CodeTree, HuffmanCoder};
pub use shannon::ShannonFanoCoder;

use std::fmt;

use serde::Serialize;

use crate::bitio::BitWriter;
use crate::code::CodeTable;
use crate::error::{CofferError, Result};
use crate::freq::{FrequencyTable, WIRE_WEIGHT_MAX};

/// Algorithm identifiers carried in archive headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Algorithm {
    /// Passthrough; payload bytes are stored verbatim.
    Store = 0,
    Huffman = 1,
    ShannonFano = 2,
}

impl Algorithm {
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Store),
            1 => Ok(Self::Huffman),
            2 => Ok(Self::ShannonFano),
            _ => Err(CofferError::UnknownAlgorithm(id)),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// The registered coder for this id; `None` for the raw profile.
    pub fn coder(self) -> Option<&'static dyn EntropyCoder> {
        match self {
            Self::Store => None,
            Self::Huffman => Some(&HuffmanCoder),
            Self::ShannonFano => Some(&ShannonFanoCoder),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Store => "store",
            Self::Huffman => "huffman",
            Self::ShannonFano => "shannon-fano",
        };
        f.write_str(name)
    }
}

/// Common capability of the static coders.
///
/// Code construction is deterministic: both sides of the wire run it on the
/// same quantized table and must derive the same codes.
pub trait EntropyCoder {
    /// Build the prefix-code table for `freq`. Empty tables yield an empty
    /// code table rather than an error.
    fn build_codes(&self, freq: &FrequencyTable) -> CodeTable;

    /// Rebuild the code structure from `freq` and decode exactly
    /// `original_len` symbols out of `payload`. Surplus pad bits are
    /// ignored; running out of bits early is a truncation error.
    fn decode(&self, freq: &FrequencyTable, payload: &[u8], original_len: u64) -> Result<Vec<u8>>;
}

/// Count, quantize, and pack `data` with `coder`. Returns the quantized
/// table (the archive's on-wire model of the data) and the packed stream.
pub fn encode_payload(coder: &dyn EntropyCoder, data: &[u8]) -> Result<(FrequencyTable, Vec<u8>)> {
    let quantized = FrequencyTable::count(data).normalize(WIRE_WEIGHT_MAX);
    let codes = coder.build_codes(&quantized);

    let mut writer = BitWriter::new();
    for &byte in data {
        // Normalization keeps every present symbol, so a missing code here
        // is a coder bug, not bad input.
        let code = codes
            .get(byte)
            .ok_or_else(|| CofferError::Internal(format!("no code for symbol {byte:#04x}")))?;
        for bit in code.iter() {
            writer.write_bit(bit);
        }
    }
    Ok((quantized, writer.finish()))
}
