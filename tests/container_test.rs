//! Container pack/unpack integration suite.
//!
//! Builds real directory trees, packs them, and checks both the on-disk
//! archive layout (through [`ContainerReader`]) and the extracted result.

use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use coffer::archive::{CONTAINER_HEADER_SIZE, POOL_ALIGNMENT};
use coffer::{pack, unpack, ContainerReader, EntryKind};
use tempfile::TempDir;

/// A tree with nesting, an empty directory, an empty file, and binary
/// content whose length is deliberately not a multiple of the pool
/// alignment.
fn build_source_tree(root: &Path) {
    fs::create_dir(root.join("docs")).unwrap();
    fs::create_dir(root.join("docs").join("img")).unwrap();
    fs::create_dir(root.join("empty")).unwrap();
    fs::write(root.join("readme.txt"), b"coffer container test tree\n").unwrap();
    fs::write(root.join("docs").join("guide.md"), b"# guide\n\nbody\n").unwrap();
    fs::write(root.join("docs").join("img").join("logo.bin"), binary_blob(1031)).unwrap();
    fs::write(root.join("zero.dat"), b"").unwrap();
}

fn binary_blob(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn set_mtime(path: &Path, secs: u64) {
    let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
    File::open(path).unwrap().set_modified(modified).unwrap();
}

fn mtime_secs(path: &Path) -> u64 {
    fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[test]
fn test_pack_unpack_roundtrip() {
    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.cofc");
    let dest = work.path().join("restored");

    pack(src.path(), &archive).unwrap();
    unpack(&archive, &dest).unwrap();

    assert!(dest.join("docs").is_dir());
    assert!(dest.join("docs").join("img").is_dir());
    assert!(dest.join("empty").is_dir());
    assert_eq!(
        fs::read(dest.join("readme.txt")).unwrap(),
        b"coffer container test tree\n"
    );
    assert_eq!(
        fs::read(dest.join("docs").join("guide.md")).unwrap(),
        b"# guide\n\nbody\n"
    );
    assert_eq!(
        fs::read(dest.join("docs").join("img").join("logo.bin")).unwrap(),
        binary_blob(1031)
    );
    assert_eq!(fs::read(dest.join("zero.dat")).unwrap(), b"");
}

#[test]
fn test_toc_order_and_paths() {
    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.cofc");

    pack(src.path(), &archive).unwrap();

    let reader = ContainerReader::open(&archive).unwrap();
    let paths: Vec<&str> = reader.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "",
            "docs/",
            "docs/img/",
            "empty/",
            "docs/guide.md",
            "docs/img/logo.bin",
            "readme.txt",
            "zero.dat",
        ]
    );
    assert_eq!(reader.entry_count(), 8);
    assert_eq!(reader.entries()[0].kind, EntryKind::Directory);
}

#[test]
fn test_header_totals_and_layout() {
    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.cofc");

    pack(src.path(), &archive).unwrap();

    let reader = ContainerReader::open(&archive).unwrap();
    let header = reader.header();
    assert_eq!(header.entry_count, 8);
    assert_eq!(header.toc_offset, CONTAINER_HEADER_SIZE as u64);
    assert_eq!(header.data_offset % POOL_ALIGNMENT, 0);
    // 27 + 14 + 1031 + 0 bytes of file content.
    assert_eq!(header.total_original_size, 1072);
    assert!(header.profile.is_noop());

    for entry in reader.entries() {
        match entry.kind {
            EntryKind::Directory => {
                assert_eq!(entry.stored_size, 0);
                assert_eq!(entry.data_offset, 0);
            }
            EntryKind::File => {
                assert_eq!(entry.data_offset % POOL_ALIGNMENT, 0);
                assert!(entry.data_offset >= header.data_offset);
                assert_eq!(entry.stored_size, entry.original_size);
            }
        }
    }

    // Stored verbatim: the payload bytes sit in the archive unchanged.
    let bytes = fs::read(&archive).unwrap();
    let logo = reader
        .entries()
        .iter()
        .find(|e| e.path == "docs/img/logo.bin")
        .unwrap();
    let start = logo.data_offset as usize;
    assert_eq!(&bytes[start..start + 1031], &binary_blob(1031)[..]);
}

#[test]
fn test_pack_is_deterministic() {
    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    let work = TempDir::new().unwrap();
    let first = work.path().join("first.cofc");
    let second = work.path().join("second.cofc");

    pack(src.path(), &first).unwrap();
    pack(src.path(), &second).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_mtime_roundtrip() {
    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    set_mtime(&src.path().join("readme.txt"), 1_500_000_000);
    set_mtime(&src.path().join("docs").join("guide.md"), 1_234_567_890);
    set_mtime(&src.path().join("docs"), 1_400_000_000);

    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.cofc");
    let dest = work.path().join("restored");
    pack(src.path(), &archive).unwrap();
    unpack(&archive, &dest).unwrap();

    assert_eq!(mtime_secs(&dest.join("readme.txt")), 1_500_000_000);
    assert_eq!(mtime_secs(&dest.join("docs").join("guide.md")), 1_234_567_890);
    // Directory mtimes are applied after the writes inside them.
    assert_eq!(mtime_secs(&dest.join("docs")), 1_400_000_000);
}

#[cfg(unix)]
#[test]
fn test_unix_modes_roundtrip() {
    use std::os::unix::fs::PermissionsExt;

    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    fs::set_permissions(
        src.path().join("docs"),
        fs::Permissions::from_mode(0o750),
    )
    .unwrap();
    fs::set_permissions(
        src.path().join("readme.txt"),
        fs::Permissions::from_mode(0o600),
    )
    .unwrap();
    fs::set_permissions(
        src.path().join("docs").join("guide.md"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.cofc");
    let dest = work.path().join("restored");
    pack(src.path(), &archive).unwrap();
    unpack(&archive, &dest).unwrap();

    let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode(&dest.join("docs")), 0o750);
    assert_eq!(mode(&dest.join("readme.txt")), 0o600);
    assert_eq!(mode(&dest.join("docs").join("guide.md")), 0o755);
}

#[test]
fn test_unpack_into_existing_directory() {
    let src = TempDir::new().unwrap();
    build_source_tree(src.path());
    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.cofc");
    pack(src.path(), &archive).unwrap();

    let dest = work.path().join("restored");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("preexisting.log"), b"keep me").unwrap();
    fs::write(dest.join("readme.txt"), b"stale copy to be replaced").unwrap();

    unpack(&archive, &dest).unwrap();

    assert_eq!(fs::read(dest.join("preexisting.log")).unwrap(), b"keep me");
    assert_eq!(
        fs::read(dest.join("readme.txt")).unwrap(),
        b"coffer container test tree\n"
    );
}

#[test]
fn test_empty_root_roundtrip() {
    let src = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("empty.cofc");
    let dest = work.path().join("restored");

    pack(src.path(), &archive).unwrap();

    let reader = ContainerReader::open(&archive).unwrap();
    assert_eq!(reader.entry_count(), 1);
    assert_eq!(reader.entries()[0].path, "");
    assert_eq!(reader.header().total_original_size, 0);

    unpack(&archive, &dest).unwrap();
    assert!(dest.is_dir());
    assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
}
