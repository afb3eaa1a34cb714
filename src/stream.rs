//! Single-file archive profiles and the universal decoder dispatch.
//!
//! Both profiles open with the same 16-byte little-endian header:
//!
//! | bytes | raw profile           | coded profile                     |
//! |-------|-----------------------|-----------------------------------|
//! | 0..6  | signature `COFFER`    | signature `COFFER`                |
//! | 6..8  | version (0)           | version (0)                       |
//! | 8..16 | original length (u64) | algorithm id (u8), length (56 bit)|
//!
//! The raw profile is followed by exactly `original length` payload bytes.
//! The coded profiles append the 256-byte quantized frequency table and the
//! MSB-first packed bitstream.
//!
//! Raw archives predate the algorithm byte, so the decoder cannot read
//! byte 8 blindly. Dispatch runs in fixed phases: read the header, validate
//! signature and version, apply the legacy raw rule (total size equals
//! header size plus the u64 at bytes 8..16), and only then trust byte 8 as
//! an algorithm id.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::coder::{encode_payload, Algorithm};
use crate::error::{CofferError, Result};
use crate::freq::{FrequencyTable, ALPHABET_SIZE};
use crate::select;

/// Signature opening every single-file archive.
pub const STREAM_SIGNATURE: [u8; 6] = *b"COFFER";

/// Single-file profile version.
pub const STREAM_VERSION: u16 = 0;

/// Size of the fixed header shared by both single-file profiles.
pub const STREAM_HEADER_SIZE: usize = 16;

/// Largest payload length the coded profiles can declare (56 bits).
pub const MAX_CODED_LEN: u64 = (1 << 56) - 1;

/// Raw payload copies stream through this much memory at a time.
pub(crate) const COPY_CHUNK: usize = 1024 * 1024;

/// The dispatched content of a single-file archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub algorithm: Algorithm,
    pub original_len: u64,
}

/// Validate a 16-byte header and route it to an algorithm.
///
/// `total_size` is the size of the whole archive; the legacy raw rule
/// needs it. For [`Algorithm::Store`] the returned length is the full u64
/// at bytes 8..16 (the raw profile has no algorithm byte); for the coded
/// algorithms it is the 56-bit field after the id.
pub fn dispatch_header(
    header: &[u8; STREAM_HEADER_SIZE],
    total_size: u64,
) -> Result<StreamHeader> {
    if header[..6] != STREAM_SIGNATURE {
        return Err(CofferError::BadSignature);
    }
    let version = u16::from_le_bytes([header[6], header[7]]);
    if version != STREAM_VERSION {
        return Err(CofferError::UnsupportedVersion(version));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[8..16]);
    let raw_len = u64::from_le_bytes(len_bytes);
    if total_size == STREAM_HEADER_SIZE as u64 + raw_len {
        return Ok(StreamHeader {
            algorithm: Algorithm::Store,
            original_len: raw_len,
        });
    }

    let algorithm = Algorithm::from_id(header[8])?;
    let original_len = match algorithm {
        // An explicit store id is only reachable once the size rule above
        // has failed; keep the raw interpretation of the length so the
        // size check reports the mismatch the header actually declares.
        Algorithm::Store => raw_len,
        _ => {
            let mut coded = [0u8; 8];
            coded[..7].copy_from_slice(&header[9..16]);
            u64::from_le_bytes(coded)
        }
    };
    Ok(StreamHeader {
        algorithm,
        original_len,
    })
}

fn raw_header(original_len: u64) -> [u8; STREAM_HEADER_SIZE] {
    let mut header = [0u8; STREAM_HEADER_SIZE];
    header[..6].copy_from_slice(&STREAM_SIGNATURE);
    header[6..8].copy_from_slice(&STREAM_VERSION.to_le_bytes());
    header[8..16].copy_from_slice(&original_len.to_le_bytes());
    header
}

fn coded_header(algorithm: Algorithm, original_len: u64) -> Result<[u8; STREAM_HEADER_SIZE]> {
    if original_len > MAX_CODED_LEN {
        return Err(CofferError::LengthOverflow(original_len));
    }
    let mut header = [0u8; STREAM_HEADER_SIZE];
    header[..6].copy_from_slice(&STREAM_SIGNATURE);
    header[6..8].copy_from_slice(&STREAM_VERSION.to_le_bytes());
    header[8] = algorithm.id();
    header[9..16].copy_from_slice(&original_len.to_le_bytes()[..7]);
    Ok(header)
}

/// Encode `data` into an in-memory single-file archive.
///
/// With `algorithm` unset the selector picks the smallest estimated
/// profile; store is always among the candidates.
pub fn encode_to_vec(data: &[u8], algorithm: Option<Algorithm>) -> Result<Vec<u8>> {
    let algorithm = algorithm.unwrap_or_else(|| select::select(data));
    match algorithm.coder() {
        None => {
            let mut archive = Vec::with_capacity(STREAM_HEADER_SIZE + data.len());
            archive.extend_from_slice(&raw_header(data.len() as u64));
            archive.extend_from_slice(data);
            Ok(archive)
        }
        Some(coder) => {
            let header = coded_header(algorithm, data.len() as u64)?;
            let (quantized, payload) = encode_payload(coder, data)?;
            let mut archive =
                Vec::with_capacity(STREAM_HEADER_SIZE + ALPHABET_SIZE + payload.len() + 1);
            archive.extend_from_slice(&header);
            archive.extend_from_slice(&quantized.wire_bytes());
            archive.extend_from_slice(&payload);
            if collides_with_legacy_raw(algorithm, data.len() as u64, archive.len() as u64) {
                archive.push(0);
            }
            Ok(archive)
        }
    }
}

/// True when a coded archive of `total` bytes declaring `original_len`
/// symbols under `algorithm` would satisfy the legacy raw size rule and be
/// dispatched as raw. The encoder breaks the equality with one extra pad
/// byte; decoders stop at the declared symbol count and never read it. The
/// selector consults the same predicate so its estimates stay exact.
pub(crate) fn collides_with_legacy_raw(
    algorithm: Algorithm,
    original_len: u64,
    total: u64,
) -> bool {
    if original_len > MAX_CODED_LEN {
        return false;
    }
    let legacy_len = (original_len << 8) | u64::from(algorithm.id());
    total == STREAM_HEADER_SIZE as u64 + legacy_len
}

/// Decode an in-memory single-file archive.
pub fn decode_from_slice(archive: &[u8]) -> Result<Vec<u8>> {
    let header: &[u8; STREAM_HEADER_SIZE] = archive
        .get(..STREAM_HEADER_SIZE)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(CofferError::Truncated("archive shorter than its header"))?;
    let parsed = dispatch_header(header, archive.len() as u64)?;
    debug!(
        algorithm = %parsed.algorithm,
        original_len = parsed.original_len,
        "decoding archive"
    );

    let body = &archive[STREAM_HEADER_SIZE..];
    match parsed.algorithm.coder() {
        None => {
            let expected = STREAM_HEADER_SIZE as u64 + parsed.original_len;
            if archive.len() as u64 != expected {
                return Err(CofferError::SizeMismatch {
                    expected,
                    actual: archive.len() as u64,
                });
            }
            Ok(body.to_vec())
        }
        Some(coder) => {
            let table: &[u8; ALPHABET_SIZE] = body
                .get(..ALPHABET_SIZE)
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or(CofferError::Truncated("short frequency table"))?;
            let freq = FrequencyTable::from_wire(table);
            coder.decode(&freq, &body[ALPHABET_SIZE..], parsed.original_len)
        }
    }
}

/// Encode the file at `input` into a single-file archive at `output`,
/// returning the algorithm used.
///
/// An explicit store request streams the payload in bounded chunks; the
/// coded profiles (and auto selection) materialize the input in memory.
pub fn encode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    algorithm: Option<Algorithm>,
) -> Result<Algorithm> {
    let input = input.as_ref();
    let output = output.as_ref();

    if algorithm == Some(Algorithm::Store) {
        copy_raw_into_archive(input, output)?;
        return Ok(Algorithm::Store);
    }

    let data = std::fs::read(input)?;
    let algorithm = algorithm.unwrap_or_else(|| select::select(&data));
    debug!(algorithm = %algorithm, original_len = data.len(), "encoding file");
    let archive = encode_to_vec(&data, Some(algorithm))?;

    let mut writer = BufWriter::new(File::create(output)?);
    writer.write_all(&archive)?;
    writer.flush()?;
    Ok(algorithm)
}

fn copy_raw_into_archive(input: &Path, output: &Path) -> Result<()> {
    let mut reader = File::open(input)?;
    let original_len = reader.metadata()?.len();
    let mut writer = BufWriter::new(File::create(output)?);
    writer.write_all(&raw_header(original_len))?;

    let mut buf = vec![0u8; COPY_CHUNK];
    let mut copied = 0u64;
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
        copied += read as u64;
    }
    // The header already went out with the length captured at open time.
    if copied != original_len {
        return Err(CofferError::SizeMismatch {
            expected: original_len,
            actual: copied,
        });
    }
    writer.flush()?;
    Ok(())
}

/// Decode the archive at `input` into the file at `output`, returning the
/// algorithm the header dispatched to.
pub fn decode_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<Algorithm> {
    let input = input.as_ref();
    let output = output.as_ref();

    let mut reader = File::open(input)?;
    let total_size = reader.metadata()?.len();
    if total_size < STREAM_HEADER_SIZE as u64 {
        return Err(CofferError::Truncated("archive shorter than its header"));
    }
    let mut header = [0u8; STREAM_HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let parsed = dispatch_header(&header, total_size)?;
    debug!(
        algorithm = %parsed.algorithm,
        original_len = parsed.original_len,
        "decoding file"
    );

    match parsed.algorithm.coder() {
        None => {
            let expected = STREAM_HEADER_SIZE as u64 + parsed.original_len;
            if total_size != expected {
                return Err(CofferError::SizeMismatch {
                    expected,
                    actual: total_size,
                });
            }
            let mut writer = BufWriter::new(File::create(output)?);
            let mut buf = vec![0u8; COPY_CHUNK];
            let mut remaining = parsed.original_len;
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                let read = reader.read(&mut buf[..want])?;
                if read == 0 {
                    return Err(CofferError::Truncated("unexpected end of payload data"));
                }
                writer.write_all(&buf[..read])?;
                remaining -= read as u64;
            }
            writer.flush()?;
        }
        Some(coder) => {
            if total_size < (STREAM_HEADER_SIZE + ALPHABET_SIZE) as u64 {
                return Err(CofferError::Truncated("short frequency table"));
            }
            let mut table = [0u8; ALPHABET_SIZE];
            reader.read_exact(&mut table)?;
            let mut payload = Vec::new();
            reader.read_to_end(&mut payload)?;
            let decoded = coder.decode(
                &FrequencyTable::from_wire(&table),
                &payload,
                parsed.original_len,
            )?;
            let mut writer = BufWriter::new(File::create(output)?);
            writer.write_all(&decoded)?;
            writer.flush()?;
        }
    }
    Ok(parsed.algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_of(archive: &[u8]) -> [u8; STREAM_HEADER_SIZE] {
        let mut header = [0u8; STREAM_HEADER_SIZE];
        header.copy_from_slice(&archive[..STREAM_HEADER_SIZE]);
        header
    }

    #[test]
    fn test_dispatch_raw_by_size_rule() {
        let archive = encode_to_vec(b"abc", Some(Algorithm::Store)).unwrap();
        let parsed = dispatch_header(&header_of(&archive), archive.len() as u64).unwrap();
        assert_eq!(
            parsed,
            StreamHeader {
                algorithm: Algorithm::Store,
                original_len: 3,
            }
        );
    }

    #[test]
    fn test_dispatch_coded_id_and_length() {
        let archive = encode_to_vec(b"hello world", Some(Algorithm::ShannonFano)).unwrap();
        let parsed = dispatch_header(&header_of(&archive), archive.len() as u64).unwrap();
        assert_eq!(parsed.algorithm, Algorithm::ShannonFano);
        assert_eq!(parsed.original_len, 11);
    }

    #[test]
    fn test_dispatch_rejects_bad_signature() {
        let header = [0u8; STREAM_HEADER_SIZE];
        let err = dispatch_header(&header, 16).unwrap_err();
        assert!(matches!(err, CofferError::BadSignature));
    }

    #[test]
    fn test_dispatch_rejects_future_version() {
        let mut header = raw_header(0);
        header[6] = 3;
        let err = dispatch_header(&header, 16).unwrap_err();
        assert!(matches!(err, CofferError::UnsupportedVersion(3)));
    }

    #[test]
    fn test_dispatch_rejects_unknown_algorithm() {
        let mut header = coded_header(Algorithm::Huffman, 0).unwrap();
        header[8] = 9;
        let err = dispatch_header(&header, 500).unwrap_err();
        assert!(matches!(err, CofferError::UnknownAlgorithm(9)));
    }

    #[test]
    fn test_raw_roundtrip_in_memory() {
        let data = b"raw payload, byte for byte";
        let archive = encode_to_vec(data, Some(Algorithm::Store)).unwrap();
        assert_eq!(archive.len(), STREAM_HEADER_SIZE + data.len());
        assert_eq!(decode_from_slice(&archive).unwrap(), data);
    }

    #[test]
    fn test_coded_roundtrips_in_memory() {
        let data = b"the quick brown fox jumps over the lazy dog";
        for algorithm in [Algorithm::Huffman, Algorithm::ShannonFano] {
            let archive = encode_to_vec(data, Some(algorithm)).unwrap();
            assert_eq!(decode_from_slice(&archive).unwrap(), data);
        }
    }

    #[test]
    fn test_auto_selection_keeps_short_input_raw() {
        let archive = encode_to_vec(b"AAAABBBCCD", None).unwrap();
        assert_eq!(archive.len(), 26);
        assert_eq!(decode_from_slice(&archive).unwrap(), b"AAAABBBCCD");
    }

    #[test]
    fn test_empty_input_all_profiles() {
        for (algorithm, expected_len) in [
            (Algorithm::Store, 16),
            (Algorithm::Huffman, 272),
            (Algorithm::ShannonFano, 272),
        ] {
            let archive = encode_to_vec(b"", Some(algorithm)).unwrap();
            assert_eq!(archive.len(), expected_len);
            assert!(decode_from_slice(&archive).unwrap().is_empty());
        }
    }

    #[test]
    fn test_single_byte_huffman_gets_disambiguation_pad() {
        let archive = encode_to_vec(b"Q", Some(Algorithm::Huffman)).unwrap();
        // 16 + 256 + 1 payload byte would satisfy the legacy raw rule
        // (the u64 at bytes 8..16 reads 257), so one pad byte is added.
        assert_eq!(archive.len(), 274);
        let parsed = dispatch_header(&header_of(&archive), archive.len() as u64).unwrap();
        assert_eq!(parsed.algorithm, Algorithm::Huffman);
        assert_eq!(decode_from_slice(&archive).unwrap(), b"Q");
    }

    #[test]
    fn test_store_size_mismatch_reports_declared_length() {
        // 256 payload bytes put a zero in the header's byte 8, so after the
        // size rule fails the dispatcher still lands on store.
        let mut archive = encode_to_vec(&[7u8; 256], Some(Algorithm::Store)).unwrap();
        archive.push(0xEE);
        let err = decode_from_slice(&archive).unwrap_err();
        assert!(matches!(
            err,
            CofferError::SizeMismatch {
                expected: 272,
                actual: 273,
            }
        ));
    }

    #[test]
    fn test_truncated_table_is_detected() {
        let archive = encode_to_vec(b"hello world", Some(Algorithm::Huffman)).unwrap();
        let err = decode_from_slice(&archive[..100]).unwrap_err();
        assert!(matches!(err, CofferError::Truncated(_)));
    }

    #[test]
    fn test_truncated_bitstream_is_detected() {
        let data = b"a longer body so the bitstream spans several bytes";
        let archive = encode_to_vec(data, Some(Algorithm::Huffman)).unwrap();
        let cut = STREAM_HEADER_SIZE + ALPHABET_SIZE + 1;
        let err = decode_from_slice(&archive[..cut]).unwrap_err();
        assert!(matches!(err, CofferError::Truncated(_)));
    }

    #[test]
    fn test_estimate_matches_emitted_size() {
        // b"Q" exercises the disambiguation pad, the only input whose
        // coded size differs from the plain header+table+bitstream sum.
        let inputs: [&[u8]; 4] = [
            b"the quick brown fox jumps over the lazy dog",
            b"AAAABBBCCD",
            b"Q",
            b"",
        ];
        for data in inputs {
            for algorithm in [Algorithm::Store, Algorithm::Huffman, Algorithm::ShannonFano] {
                let archive = encode_to_vec(data, Some(algorithm)).unwrap();
                assert_eq!(
                    archive.len() as u64,
                    select::estimated_size(data, algorithm),
                    "input {data:?} under {algorithm}"
                );
            }
        }
    }
}
