//! Attributes of a file selected on a card, as returned by `select_file`.

use crate::path::Path;

/// The kind of file-system node a [`FileInfo`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A dedicated file (directory-like node).
    Df,
    /// An elementary file.
    Ef,
    /// A working elementary file (data container).
    WorkingEf,
    /// An internal elementary file (key/cert storage, not directly readable).
    InternalEf,
}

/// How the records of an [`FileInfo`] are organized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStructure {
    /// A flat byte array, addressed by offset.
    Transparent,
    /// Fixed-length records.
    LinearFixed,
    /// Variable-length records.
    LinearVariable,
    /// A ring buffer of fixed-length records.
    Cyclic,
}

/// Attributes of a selected file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// The path that selected this file. Stamped by the façade after a
    /// successful `select_file`, not by the driver.
    pub path: Path,
    /// DF / EF / working-EF / internal-EF.
    pub file_type: FileType,
    /// Transparent / linear fixed / linear variable / cyclic.
    pub structure: FileStructure,
    /// File size in bytes (transparent) or record size (structured).
    pub size: usize,
    /// Number of records, for structured files.
    pub record_count: usize,
    /// Access control conditions, one per access mode. Card-specific
    /// encoding; the core does not interpret them.
    pub access_control: Vec<u8>,
    /// Short file identifier, if the card assigned one.
    pub short_file_id: Option<u8>,
}

impl FileInfo {
    /// A minimal transparent EF descriptor, useful as a starting point for
    /// driver implementations to fill in.
    pub fn transparent(size: usize) -> Self {
        FileInfo {
            path: Path::default(),
            file_type: FileType::WorkingEf,
            structure: FileStructure::Transparent,
            size,
            record_count: 0,
            access_control: Vec::new(),
            short_file_id: None,
        }
    }
}
