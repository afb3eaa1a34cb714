//! Coffer: a self-describing archive container with pluggable entropy coding.
//!
//! Three archive profiles share one decoder entry point:
//! - a raw single-file profile that stores the payload verbatim,
//! - coded single-file profiles (canonical Huffman, Shannon-Fano) built on
//!   a quantized byte-frequency table,
//! - a hierarchical container that packs whole directory trees behind a
//!   table of contents and an 8-byte-aligned data pool.
//!
//! Encoding picks the smallest profile by estimating each candidate's exact
//! output size first, so an archive is never larger than storing the input
//! raw would be.
//!
//! # Example
//!
//! ```no_run
//! use coffer::{decode_file, encode_file};
//!
//! let used = encode_file("notes.txt", "notes.cof", None)?;
//! println!("encoded with {used}");
//! decode_file("notes.cof", "notes.out")?;
//! # Ok::<(), coffer::CofferError>(())
//! ```

// Core modules
pub mod archive;
pub mod bitio;
pub mod code;
pub mod coder;
pub mod error;
pub mod freq;
pub mod fs_scan;
pub mod select;
pub mod stream;

// Re-export commonly used types
pub use archive::{pack, unpack, ContainerHeader, ContainerReader, EntryKind, TocEntry};
pub use coder::{Algorithm, EntropyCoder};
pub use error::{CofferError, Result};
pub use freq::FrequencyTable;
pub use select::{estimated_size, select, size_report, SizeReport};
pub use stream::{
    decode_file, decode_from_slice, dispatch_header, encode_file, encode_to_vec, StreamHeader,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Ensure core types are accessible
        let _algorithm = Algorithm::Huffman;
        let _header = ContainerHeader::new();
    }
}
