//! Container reading and extraction.
//!
//! [`ContainerReader::open`] parses and validates the whole table of
//! contents up front: signature, version, offsets, per-entry extents,
//! resolved algorithm profiles, and every entry path. Extraction never
//! starts on an archive that fails any of these checks, so a hostile path
//! is rejected before a single byte lands on disk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::format::{
    validate_entry_path, ContainerHeader, TocEntry, CONTAINER_HEADER_SIZE, POOL_ALIGNMENT,
    TOC_ENTRY_SIZE,
};
use crate::error::{CofferError, Result};
use crate::fs_scan::apply_metadata;
use crate::stream::COPY_CHUNK;

/// Open container archive with a validated table of contents.
#[derive(Debug)]
pub struct ContainerReader {
    file: File,
    file_size: u64,
    header: ContainerHeader,
    entries: Vec<TocEntry>,
}

impl ContainerReader {
    /// Open an archive and validate everything ahead of extraction.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < CONTAINER_HEADER_SIZE as u64 {
            return Err(CofferError::Truncated("archive shorter than its header"));
        }

        let header = ContainerHeader::read_from(&mut file)?;
        header.validate_version()?;
        if header.toc_offset < CONTAINER_HEADER_SIZE as u64 {
            return Err(CofferError::Malformed(
                "table of contents overlaps the header",
            ));
        }
        if header.data_offset < header.toc_offset {
            return Err(CofferError::Malformed(
                "data pool precedes the table of contents",
            ));
        }
        if header.data_offset > file_size {
            return Err(CofferError::Truncated(
                "data pool offset beyond the end of the archive",
            ));
        }

        let entries = read_toc(&mut file, &header, file_size)?;
        debug!(
            entries = entries.len(),
            total_original = header.total_original_size,
            "opened container"
        );

        Ok(Self {
            file,
            file_size,
            header,
            entries,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Extract every entry under `dest`, restoring modes and mtimes.
    ///
    /// Directories are created first so every file has a parent, then file
    /// payloads are streamed out in bounded chunks. Directory metadata is
    /// applied last, deepest first, so writes inside a directory cannot
    /// disturb the mtime just restored on it. Metadata failures are logged
    /// and skipped; content failures abort.
    pub fn unpack_into<P: AsRef<Path>>(&mut self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;

        for entry in self.entries.iter().filter(|e| e.kind.is_dir()) {
            fs::create_dir_all(join_entry_path(dest, &entry.path))?;
        }

        let mut buf = vec![0u8; COPY_CHUNK];
        for entry in self.entries.iter().filter(|e| !e.kind.is_dir()) {
            let target = join_entry_path(dest, &entry.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_file_payload(&mut self.file, entry, &target, &mut buf)?;
            if let Err(err) = apply_metadata(&target, entry.mode, entry.mtime) {
                warn!(
                    path = %target.display(),
                    error = %err,
                    "could not restore file metadata"
                );
            }
        }

        let mut dirs: Vec<&TocEntry> = self.entries.iter().filter(|e| e.kind.is_dir()).collect();
        dirs.sort_by_key(|e| std::cmp::Reverse(e.path.matches('/').count()));
        for entry in dirs {
            let target = join_entry_path(dest, &entry.path);
            if let Err(err) = apply_metadata(&target, entry.mode, entry.mtime) {
                warn!(
                    path = %target.display(),
                    error = %err,
                    "could not restore directory metadata"
                );
            }
        }

        info!(
            dest = %dest.display(),
            entries = self.entries.len(),
            "unpacked container"
        );
        Ok(())
    }
}

/// Open the archive at `archive` and extract it under `dest`.
pub fn unpack<P: AsRef<Path>, Q: AsRef<Path>>(archive: P, dest: Q) -> Result<()> {
    ContainerReader::open(archive)?.unpack_into(dest)
}

fn read_toc(file: &mut File, header: &ContainerHeader, file_size: u64) -> Result<Vec<TocEntry>> {
    let toc_len = usize::try_from(header.data_offset - header.toc_offset)
        .map_err(|_| CofferError::Malformed("table of contents too large for this platform"))?;
    file.seek(SeekFrom::Start(header.toc_offset))?;
    let mut toc_bytes = vec![0u8; toc_len];
    file.read_exact(&mut toc_bytes)?;

    // Each record occupies at least its fixed size, which bounds how many
    // can fit regardless of what the header claims.
    let max_possible = toc_len / TOC_ENTRY_SIZE;
    if header.entry_count as usize > max_possible {
        return Err(CofferError::Truncated(
            "table of contents ends inside an entry",
        ));
    }
    let mut entries = Vec::with_capacity(header.entry_count as usize);

    let mut cursor = Cursor::new(&toc_bytes[..]);
    for _ in 0..header.entry_count {
        let entry = TocEntry::read_from(&mut cursor).map_err(truncated_toc)?;
        validate_entry(header, file_size, &entry)?;
        entries.push(entry);
    }
    Ok(entries)
}

fn truncated_toc(err: CofferError) -> CofferError {
    match err {
        CofferError::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
            CofferError::Truncated("table of contents ends inside an entry")
        }
        other => other,
    }
}

fn validate_entry(header: &ContainerHeader, file_size: u64, entry: &TocEntry) -> Result<()> {
    validate_entry_path(&entry.path, entry.kind)?;

    // Nothing decodes coded entry payloads yet, so any resolved non-zero
    // slot is an algorithm this reader cannot honor.
    let resolved = entry.overrides.resolve(&header.profile);
    for id in [resolved.context_model, resolved.entropy, resolved.protection] {
        if id != 0 {
            return Err(CofferError::UnknownAlgorithm(id));
        }
    }

    if entry.kind.is_dir() {
        if entry.stored_size != 0 || entry.data_offset != 0 {
            return Err(CofferError::Malformed("directory entry with a data extent"));
        }
        return Ok(());
    }

    if entry.stored_size != entry.original_size {
        return Err(CofferError::Malformed(
            "stored and original sizes differ for a verbatim entry",
        ));
    }
    if entry.data_offset % POOL_ALIGNMENT != 0 {
        return Err(CofferError::Malformed("unaligned file data offset"));
    }
    if entry.data_offset < header.data_offset {
        return Err(CofferError::Malformed("file data before the data pool"));
    }
    match entry.data_offset.checked_add(entry.stored_size) {
        Some(end) if end <= file_size => Ok(()),
        _ => Err(CofferError::Truncated(
            "file data extends past the end of the archive",
        )),
    }
}

fn copy_file_payload(file: &mut File, entry: &TocEntry, target: &Path, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(entry.data_offset))?;
    let mut writer = BufWriter::new(File::create(target)?);
    let mut remaining = entry.stored_size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = file.read(&mut buf[..want])?;
        if read == 0 {
            return Err(CofferError::Truncated("unexpected end of payload data"));
        }
        writer.write_all(&buf[..read])?;
        remaining -= read as u64;
    }
    writer.flush()?;
    Ok(())
}

/// Map a validated entry path under the destination root. The empty path
/// is the root itself.
fn join_entry_path(dest: &Path, entry_path: &str) -> PathBuf {
    let logical = entry_path.strip_suffix('/').unwrap_or(entry_path);
    if logical.is_empty() {
        dest.to_path_buf()
    } else {
        dest.join(logical)
    }
}
