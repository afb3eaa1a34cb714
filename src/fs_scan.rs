//! Directory scanning and filesystem metadata.
//!
//! [`scan_tree`] walks a directory depth-first with children visited in
//! name order, so two scans of the same tree always produce the same entry
//! list: the root itself first (empty path), then every directory, then
//! every file. Paths are relative to the root, forward-slash separated,
//! with a trailing slash on directories.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::warn;

use crate::error::{CofferError, Result};

/// Filesystem facts about one scanned entry, in wire-ready form.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Relative path; empty for the scan root, trailing `/` on directories.
    pub path: String,
    pub is_dir: bool,
    /// POSIX permission bits. On platforms without them a best-effort
    /// mapping is recorded (0o755 directories, 0o644/0o444 files).
    pub mode: u32,
    /// Modification time in whole seconds since the epoch; 0 when unknown
    /// or before the epoch.
    pub mtime: u64,
    /// File size in bytes; 0 for directories.
    pub size: u64,
}

/// Walk `root` and return its entries in packing order.
///
/// Symlinks are recorded as whatever they point at, but symlinked
/// directories are not descended into, so a link cycle cannot hang the
/// scan. Entries that are neither files nor directories (sockets, device
/// nodes) are skipped with a warning.
pub fn scan_tree<P: AsRef<Path>>(root: P) -> Result<Vec<EntryMeta>> {
    let root = root.as_ref();
    let root_meta = fs::metadata(root)?;
    if !root_meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        )
        .into());
    }

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    walk(root, "", &mut dirs, &mut files)?;

    let mut entries = Vec::with_capacity(1 + dirs.len() + files.len());
    entries.push(EntryMeta {
        path: String::new(),
        is_dir: true,
        mode: mode_bits(&root_meta),
        mtime: mtime_secs(&root_meta),
        size: 0,
    });
    entries.extend(dirs);
    entries.extend(files);
    Ok(entries)
}

fn walk(
    dir: &Path,
    prefix: &str,
    dirs: &mut Vec<EntryMeta>,
    files: &mut Vec<EntryMeta>,
) -> Result<()> {
    let mut children: Vec<fs::DirEntry> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let name = child.file_name();
        let Some(name) = name.to_str() else {
            return Err(CofferError::InvalidPath(format!(
                "file name is not UTF-8: {name:?}"
            )));
        };
        let child_path = child.path();
        let meta = fs::metadata(&child_path)?; // follows symlinks
        let file_type = child.file_type()?; // does not

        if meta.is_dir() {
            let rel = format!("{prefix}{name}/");
            dirs.push(EntryMeta {
                path: rel.clone(),
                is_dir: true,
                mode: mode_bits(&meta),
                mtime: mtime_secs(&meta),
                size: 0,
            });
            if !file_type.is_symlink() {
                walk(&child_path, &rel, dirs, files)?;
            }
        } else if meta.is_file() {
            files.push(EntryMeta {
                path: format!("{prefix}{name}"),
                is_dir: false,
                mode: mode_bits(&meta),
                mtime: mtime_secs(&meta),
                size: meta.len(),
            });
        } else {
            warn!(path = %child_path.display(), "skipping special file");
        }
    }
    Ok(())
}

/// Restore mode and mtime on an extracted entry. Callers treat failures as
/// non-fatal; the entry's content is already on disk when this runs.
pub fn apply_metadata(path: &Path, mode: u32, mtime: u64) -> Result<()> {
    // mtime first: the mode may remove our own write permission. The wire
    // field is wider than SystemTime on most platforms, so the addition
    // must not be allowed to overflow on a hostile value.
    let modified = SystemTime::UNIX_EPOCH
        .checked_add(Duration::from_secs(mtime))
        .ok_or(CofferError::Malformed("modification time out of range"))?;
    File::open(path)?.set_modified(modified)?;
    set_mode(path, mode)?;
    Ok(())
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    // Only the owner write bit has a portable equivalent.
    let mut perms = fs::metadata(path)?.permissions();
    let readonly = mode & 0o200 == 0;
    perms.set_readonly(readonly);
    fs::set_permissions(path, perms)?;
    Ok(())
}

fn mtime_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}
