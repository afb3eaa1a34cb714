mod format;
mod reader;
mod writer;

pub use format::{
    align_up, validate_entry_path, AlgorithmOverride, AlgorithmProfile, ContainerHeader,
    EntryKind, ProfileOverrides, TocEntry, CONTAINER_HEADER_SIZE, CONTAINER_SIGNATURE,
    CONTAINER_VERSION_MAJOR, CONTAINER_VERSION_MINOR, POOL_ALIGNMENT, TOC_ENTRY_SIZE,
};
pub use reader::{unpack, ContainerReader};
pub use writer::pack;
