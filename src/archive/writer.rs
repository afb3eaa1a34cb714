//! Container packing.
//!
//! [`pack`] scans the source tree, plans the whole layout up front (header,
//! table of contents, aligned data pool), then writes the archive in one
//! forward pass, streaming file payloads through a bounded buffer. Entry
//! order and offsets depend only on the scanned tree, so packing the same
//! tree twice produces byte-identical archives.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::archive::format::{
    align_up, ContainerHeader, EntryKind, ProfileOverrides, TocEntry, CONTAINER_HEADER_SIZE,
};
use crate::error::{CofferError, Result};
use crate::fs_scan::{scan_tree, EntryMeta};
use crate::stream::COPY_CHUNK;

/// Pack the directory tree at `root` into a container archive at `archive`.
///
/// Every entry inherits the container's base profile, which stores payloads
/// verbatim; modes and mtimes are recorded in the table of contents.
pub fn pack<P: AsRef<Path>, Q: AsRef<Path>>(root: P, archive: Q) -> Result<()> {
    let root = root.as_ref();
    let archive = archive.as_ref();

    let metas = scan_tree(root)?;
    let (header, toc) = plan_layout(&metas)?;
    debug!(
        entries = toc.len(),
        data_offset = header.data_offset,
        total_original = header.total_original_size,
        "planned container layout"
    );

    let mut writer = BufWriter::new(File::create(archive)?);
    header.write_to(&mut writer)?;
    let mut current_offset = CONTAINER_HEADER_SIZE as u64;

    for entry in &toc {
        current_offset += entry.write_to(&mut writer)? as u64;
    }
    if current_offset > header.data_offset {
        return Err(CofferError::Internal(format!(
            "table of contents overran its planned extent: {current_offset} > {}",
            header.data_offset
        )));
    }
    current_offset += write_zeros(&mut writer, header.data_offset - current_offset)?;

    let mut buf = vec![0u8; COPY_CHUNK];
    for entry in toc.iter().filter(|e| !e.kind.is_dir()) {
        if current_offset > entry.data_offset {
            return Err(CofferError::Internal(format!(
                "data pool overran the planned offset of {}: {current_offset} > {}",
                entry.path, entry.data_offset
            )));
        }
        current_offset += write_zeros(&mut writer, entry.data_offset - current_offset)?;
        copy_payload(&mut writer, root, entry, &mut buf)?;
        current_offset += entry.stored_size;
    }

    writer.flush()?;
    info!(
        archive = %archive.display(),
        entries = toc.len(),
        bytes = current_offset,
        "packed container"
    );
    Ok(())
}

/// Turn scanned entries into a table of contents with final offsets.
fn plan_layout(metas: &[EntryMeta]) -> Result<(ContainerHeader, Vec<TocEntry>)> {
    let mut toc: Vec<TocEntry> = metas
        .iter()
        .map(|meta| TocEntry {
            path: meta.path.clone(),
            kind: if meta.is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            mode: meta.mode,
            mtime: meta.mtime,
            overrides: ProfileOverrides::default(),
            original_size: meta.size,
            stored_size: 0,
            data_offset: 0,
            entry_id: 0,
        })
        .collect();

    let toc_offset = CONTAINER_HEADER_SIZE as u64;
    let toc_len: u64 = toc.iter().map(|e| e.wire_len() as u64).sum();
    let data_offset = align_up(toc_offset + toc_len);

    let mut cursor = data_offset;
    let mut total_original = 0u64;
    for entry in toc.iter_mut().filter(|e| !e.kind.is_dir()) {
        cursor = align_up(cursor);
        entry.data_offset = cursor;
        // Base profile: payloads are stored verbatim.
        entry.stored_size = entry.original_size;
        cursor += entry.stored_size;
        total_original += entry.original_size;
    }

    let mut header = ContainerHeader::new();
    header.entry_count = u32::try_from(toc.len())
        .map_err(|_| CofferError::Internal(format!("too many entries: {}", toc.len())))?;
    header.toc_offset = toc_offset;
    header.data_offset = data_offset;
    header.total_original_size = total_original;
    Ok((header, toc))
}

fn copy_payload<W: Write>(
    writer: &mut W,
    root: &Path,
    entry: &TocEntry,
    buf: &mut [u8],
) -> Result<()> {
    let path = root.join(&entry.path);
    let mut reader = File::open(&path)?;
    let mut remaining = entry.stored_size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = reader.read(&mut buf[..want])?;
        if read == 0 {
            // The file shrank between the scan and this pass.
            return Err(CofferError::SizeMismatch {
                expected: entry.stored_size,
                actual: entry.stored_size - remaining,
            });
        }
        writer.write_all(&buf[..read])?;
        remaining -= read as u64;
    }

    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        warn!(
            path = %path.display(),
            "file grew during packing; archived the scanned length"
        );
    }
    Ok(())
}

fn write_zeros<W: Write>(writer: &mut W, count: u64) -> Result<u64> {
    // Alignment gaps are at most POOL_ALIGNMENT - 1 bytes.
    const ZEROS: [u8; 16] = [0u8; 16];
    let mut remaining = count;
    while remaining > 0 {
        let chunk = remaining.min(ZEROS.len() as u64) as usize;
        writer.write_all(&ZEROS[..chunk])?;
        remaining -= chunk as u64;
    }
    Ok(count)
}
