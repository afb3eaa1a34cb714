//! Wire model of the hierarchical container profile.
//!
//! All integers are little-endian. The fixed header is 56 bytes:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 8    | signature `COFFER02` |
//! | 8      | 2    | version major |
//! | 10     | 2    | version minor |
//! | 12     | 3    | global algorithm profile (context / entropy / protection) |
//! | 15     | 1    | reserved |
//! | 16     | 4    | entry count |
//! | 20     | 8    | global metadata offset (reserved) |
//! | 28     | 4    | global metadata length (reserved) |
//! | 32     | 8    | table-of-contents offset |
//! | 40     | 8    | data pool offset |
//! | 48     | 8    | total original size |
//!
//! Each table-of-contents record is 56 fixed bytes, then its UTF-8 path,
//! then `extra length` bytes reserved for future revisions:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 2    | path length |
//! | 2      | 2    | flags (0x1 directory, 0x2 file) |
//! | 4      | 4    | mode bits |
//! | 8      | 8    | mtime (seconds since epoch) |
//! | 16     | 3    | per-entry profile overrides (0xFF = inherit) |
//! | 19     | 1    | reserved |
//! | 20     | 8    | original size |
//! | 28     | 8    | stored size |
//! | 36     | 8    | data offset |
//! | 44     | 4    | extra length |
//! | 48     | 8    | entry id (reserved) |
//!
//! The table of contents as a whole is zero-padded to the next 8-byte
//! boundary before the data pool, and each file's data offset is
//! independently 8-byte aligned.

use std::io::{Read, Write};

use crate::error::{CofferError, Result};

/// Signature opening every container archive.
pub const CONTAINER_SIGNATURE: [u8; 8] = *b"COFFER02";

/// Current container profile version.
pub const CONTAINER_VERSION_MAJOR: u16 = 2;
pub const CONTAINER_VERSION_MINOR: u16 = 0;

/// Fixed header size in bytes.
pub const CONTAINER_HEADER_SIZE: usize = 56;

/// Fixed part of a table-of-contents record, before the path bytes.
pub const TOC_ENTRY_SIZE: usize = 56;

/// Alignment of the data pool and of each file's data offset.
pub const POOL_ALIGNMENT: u64 = 8;

const FLAG_DIRECTORY: u16 = 0x1;
const FLAG_FILE: u16 = 0x2;

/// Round `n` up to the next multiple of [`POOL_ALIGNMENT`].
pub fn align_up(n: u64) -> u64 {
    n.div_ceil(POOL_ALIGNMENT) * POOL_ALIGNMENT
}

/// What a table-of-contents record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

impl EntryKind {
    pub fn from_flags(flags: u16) -> Result<Self> {
        match flags {
            FLAG_DIRECTORY => Ok(Self::Directory),
            FLAG_FILE => Ok(Self::File),
            _ => Err(CofferError::Malformed("unknown entry flags")),
        }
    }

    pub fn flags(self) -> u16 {
        match self {
            Self::Directory => FLAG_DIRECTORY,
            Self::File => FLAG_FILE,
        }
    }

    pub fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// The three algorithm slots of the container pipeline. Identifier 0 means
/// "none"; the base profile is all zeros and stores payloads verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlgorithmProfile {
    pub context_model: u8,
    pub entropy: u8,
    pub protection: u8,
}

impl AlgorithmProfile {
    /// The no-op profile: every payload stored verbatim.
    pub const NONE: Self = Self {
        context_model: 0,
        entropy: 0,
        protection: 0,
    };

    pub fn is_noop(&self) -> bool {
        *self == Self::NONE
    }
}

/// A per-entry algorithm slot: either an explicit id or "inherit from the
/// container header". 0xFF exists only on the wire, so an explicit override
/// of 0xFF is not representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlgorithmOverride {
    #[default]
    Inherit,
    Override(u8),
}

const INHERIT_WIRE: u8 = 0xFF;

impl AlgorithmOverride {
    pub fn from_wire(byte: u8) -> Self {
        if byte == INHERIT_WIRE {
            Self::Inherit
        } else {
            Self::Override(byte)
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Inherit => INHERIT_WIRE,
            Self::Override(id) => id,
        }
    }

    /// The effective id once the container-wide value is known.
    pub fn resolve(self, inherited: u8) -> u8 {
        match self {
            Self::Inherit => inherited,
            Self::Override(id) => id,
        }
    }
}

/// Per-entry overrides for the three profile slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileOverrides {
    pub context_model: AlgorithmOverride,
    pub entropy: AlgorithmOverride,
    pub protection: AlgorithmOverride,
}

impl ProfileOverrides {
    pub fn resolve(&self, global: &AlgorithmProfile) -> AlgorithmProfile {
        AlgorithmProfile {
            context_model: self.context_model.resolve(global.context_model),
            entropy: self.entropy.resolve(global.entropy),
            protection: self.protection.resolve(global.protection),
        }
    }
}

/// Fixed header at the start of a container archive.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub profile: AlgorithmProfile,
    pub entry_count: u32,
    /// Reserved for a future global-metadata block; written as zero.
    pub global_meta_offset: u64,
    pub global_meta_len: u32,
    pub toc_offset: u64,
    pub data_offset: u64,
    /// Sum of the original sizes of all file entries.
    pub total_original_size: u64,
}

impl ContainerHeader {
    pub fn new() -> Self {
        Self {
            version_major: CONTAINER_VERSION_MAJOR,
            version_minor: CONTAINER_VERSION_MINOR,
            profile: AlgorithmProfile::NONE,
            entry_count: 0,
            global_meta_offset: 0,
            global_meta_len: 0,
            toc_offset: CONTAINER_HEADER_SIZE as u64,
            data_offset: 0,
            total_original_size: 0,
        }
    }

    /// Write the header to a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&CONTAINER_SIGNATURE)?;
        writer.write_all(&self.version_major.to_le_bytes())?;
        writer.write_all(&self.version_minor.to_le_bytes())?;
        writer.write_all(&[
            self.profile.context_model,
            self.profile.entropy,
            self.profile.protection,
            0,
        ])?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&self.global_meta_offset.to_le_bytes())?;
        writer.write_all(&self.global_meta_len.to_le_bytes())?;
        writer.write_all(&self.toc_offset.to_le_bytes())?;
        writer.write_all(&self.data_offset.to_le_bytes())?;
        writer.write_all(&self.total_original_size.to_le_bytes())?;
        Ok(())
    }

    /// Read the header from a reader. The signature is verified before any
    /// other field is parsed.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut signature = [0u8; 8];
        reader.read_exact(&mut signature)?;
        if signature != CONTAINER_SIGNATURE {
            return Err(CofferError::BadSignature);
        }

        let version_major = read_u16(&mut reader)?;
        let version_minor = read_u16(&mut reader)?;

        let mut profile_bytes = [0u8; 4];
        reader.read_exact(&mut profile_bytes)?;
        let profile = AlgorithmProfile {
            context_model: profile_bytes[0],
            entropy: profile_bytes[1],
            protection: profile_bytes[2],
        };

        let entry_count = read_u32(&mut reader)?;
        let global_meta_offset = read_u64(&mut reader)?;
        let global_meta_len = read_u32(&mut reader)?;
        let toc_offset = read_u64(&mut reader)?;
        let data_offset = read_u64(&mut reader)?;
        let total_original_size = read_u64(&mut reader)?;

        Ok(Self {
            version_major,
            version_minor,
            profile,
            entry_count,
            global_meta_offset,
            global_meta_len,
            toc_offset,
            data_offset,
            total_original_size,
        })
    }

    /// Strict check of the major version. A future major revision may move
    /// fields around, so no attempt is made to parse past it; minor
    /// revisions only add reserved content and pass.
    pub fn validate_version(&self) -> Result<()> {
        if self.version_major != CONTAINER_VERSION_MAJOR {
            return Err(CofferError::UnsupportedVersion(self.version_major));
        }
        Ok(())
    }
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// One table-of-contents record.
///
/// Paths are relative, forward-slash separated UTF-8; directory paths carry
/// a trailing slash. The synthetic root entry has an empty path so the
/// extraction root itself can receive a mode and mtime.
#[derive(Debug, Clone)]
pub struct TocEntry {
    pub path: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub mtime: u64,
    pub overrides: ProfileOverrides,
    pub original_size: u64,
    pub stored_size: u64,
    pub data_offset: u64,
    pub entry_id: u64,
}

impl TocEntry {
    /// Size of this record on the wire: the fixed part plus the path.
    pub fn wire_len(&self) -> usize {
        TOC_ENTRY_SIZE + self.path.len()
    }

    /// Write the record and its path, returning the bytes written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let path_bytes = self.path.as_bytes();
        let path_len = u16::try_from(path_bytes.len()).map_err(|_| {
            CofferError::InvalidPath(format!("path too long: {} bytes", path_bytes.len()))
        })?;

        writer.write_all(&path_len.to_le_bytes())?;
        writer.write_all(&self.kind.flags().to_le_bytes())?;
        writer.write_all(&self.mode.to_le_bytes())?;
        writer.write_all(&self.mtime.to_le_bytes())?;
        writer.write_all(&[
            self.overrides.context_model.to_wire(),
            self.overrides.entropy.to_wire(),
            self.overrides.protection.to_wire(),
            0,
        ])?;
        writer.write_all(&self.original_size.to_le_bytes())?;
        writer.write_all(&self.stored_size.to_le_bytes())?;
        writer.write_all(&self.data_offset.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // extra length
        writer.write_all(&self.entry_id.to_le_bytes())?;
        writer.write_all(path_bytes)?;

        Ok(TOC_ENTRY_SIZE + path_bytes.len())
    }

    /// Read one record and its path, skipping any extra bytes a newer
    /// writer may have appended after the path.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let path_len = read_u16(&mut reader)?;
        let flags = read_u16(&mut reader)?;
        let kind = EntryKind::from_flags(flags)?;
        let mode = read_u32(&mut reader)?;
        let mtime = read_u64(&mut reader)?;

        let mut override_bytes = [0u8; 4];
        reader.read_exact(&mut override_bytes)?;
        let overrides = ProfileOverrides {
            context_model: AlgorithmOverride::from_wire(override_bytes[0]),
            entropy: AlgorithmOverride::from_wire(override_bytes[1]),
            protection: AlgorithmOverride::from_wire(override_bytes[2]),
        };

        let original_size = read_u64(&mut reader)?;
        let stored_size = read_u64(&mut reader)?;
        let data_offset = read_u64(&mut reader)?;
        let extra_len = read_u32(&mut reader)?;
        let entry_id = read_u64(&mut reader)?;

        let mut path_buf = vec![0u8; path_len as usize];
        reader.read_exact(&mut path_buf)?;
        let path = String::from_utf8(path_buf)
            .map_err(|e| CofferError::InvalidPath(format!("path is not UTF-8: {e}")))?;

        if extra_len > 0 {
            std::io::copy(&mut reader.take(extra_len as u64), &mut std::io::sink())?;
        }

        Ok(Self {
            path,
            kind,
            mode,
            mtime,
            overrides,
            original_size,
            stored_size,
            data_offset,
            entry_id,
        })
    }
}

/// Reject entry paths that could land outside the extraction root, before
/// anything touches the filesystem.
///
/// An empty path is the synthetic root entry and is only valid for a
/// directory. Everything else must be a relative forward-slash path with no
/// empty, `.` or `..` components; backslashes and NUL bytes are never valid.
pub fn validate_entry_path(path: &str, kind: EntryKind) -> Result<()> {
    if path.is_empty() {
        return match kind {
            EntryKind::Directory => Ok(()),
            EntryKind::File => Err(CofferError::InvalidPath(
                "file entry with empty path".into(),
            )),
        };
    }
    if path.contains('\0') {
        return Err(CofferError::InvalidPath("path contains a NUL byte".into()));
    }
    if path.contains('\\') {
        return Err(CofferError::InvalidPath(format!(
            "backslash in path {path:?}"
        )));
    }
    if path.starts_with('/') {
        return Err(CofferError::PathSecurity(path.to_string()));
    }

    let logical = match kind {
        EntryKind::Directory => path.strip_suffix('/').unwrap_or(path),
        EntryKind::File => path,
    };
    for component in logical.split('/') {
        match component {
            "" => {
                return Err(CofferError::InvalidPath(format!(
                    "empty component in path {path:?}"
                )))
            }
            "." => {
                return Err(CofferError::InvalidPath(format!(
                    "`.` component in path {path:?}"
                )))
            }
            ".." => return Err(CofferError::PathSecurity(path.to_string())),
            _ => {}
        }
    }
    Ok(())
}

// Helper functions for reading primitive types
fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(mut reader: R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
