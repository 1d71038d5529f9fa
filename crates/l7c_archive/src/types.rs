//! Base types for structure of L7CA file.

use binrw::{BinRead, BinWrite};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::compression::CompressionMode;
use crate::error::{Error, Result};

/// The only version this crate knows how to read
pub const VERSION: u32 = 0x0001_0000;

/// Upper bound for the uncompressed size of one chunk
pub const MAX_CHUNK_SIZE: u32 = 0x0001_0000;

/// Number of sections the observed layout declares
pub const SECTION_COUNT: u32 = 5;

/// Payloads are aligned to this boundary, and the archive starts with one block of zeros
pub const ALIGNMENT: u32 = 0x200;

/// Serialized size of [`L7cHeader`] including the magic
pub const HEADER_SIZE: u32 = 48;

/// Serialized size of [`FilesystemEntry`]
pub const FILESYSTEM_ENTRY_SIZE: u32 = 24;

/// Serialized size of [`FileEntry`]
pub const FILE_ENTRY_SIZE: u32 = 24;

/// Serialized size of [`ChunkEntry`]
pub const CHUNK_ENTRY_SIZE: u32 = 8;

/// Filesystem entry id used for directories
pub const DIRECTORY_ID: i32 = -1;

const COMPRESSED_FLAG: u32 = 0x8000_0000;
const STORED_LEN_MASK: u32 = 0x00FF_FFFF;

/// Seconds between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_OFFSET: u64 = 11_644_473_600;

/// L7CA file header
///
/// Starts with "L7CA" and is written over the leading padding block once the rest of the
/// archive is known. All data is stored in little endian format.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"L7CA", little)]
pub struct L7cHeader {
    /// Format version, always [`VERSION`] for supported archives
    pub version: u32,

    /// Total size of the archive in bytes
    pub archive_size: u32,

    /// Offset from the beginning of the file where the metadata tables start
    pub metadata_offset: u32,

    /// Combined size of the four metadata tables
    pub metadata_size: u32,

    /// Largest uncompressed chunk size
    pub chunk_max: u32,

    /// Number of entries in the filesystem table
    pub filesystem_entries: u32,

    /// Number of filesystem entries that are directories
    pub folders: u32,

    /// Number of filesystem entries that are files, equal to the file table length
    pub files: u32,

    /// Number of entries in the chunk table
    pub chunks: u32,

    /// Size in bytes of the string table at the end of the archive
    pub string_table_size: u32,

    /// Section count, always [`SECTION_COUNT`] for supported archives
    pub sections: u32,
}

impl Default for L7cHeader {
    fn default() -> Self {
        Self {
            version: VERSION,
            archive_size: Default::default(),
            metadata_offset: Default::default(),
            metadata_size: Default::default(),
            chunk_max: MAX_CHUNK_SIZE,
            filesystem_entries: Default::default(),
            folders: Default::default(),
            files: Default::default(),
            chunks: Default::default(),
            string_table_size: Default::default(),
            sections: SECTION_COUNT,
        }
    }
}

impl L7cHeader {
    /// Check the constant fields against the one layout this crate understands.
    ///
    /// A failure here is not fatal to readers; the tables are usually still parseable.
    pub fn validate(&self) -> Result<()> {
        if self.version != VERSION {
            return Err(Error::UnsupportedVersion {
                version: self.version,
            });
        }
        if self.sections != SECTION_COUNT {
            return Err(Error::UnsupportedSectionCount {
                sections: self.sections,
            });
        }
        Ok(())
    }

    /// Check the relations between the size and count fields.
    pub fn is_consistent(&self) -> bool {
        self.metadata_offset.checked_add(self.metadata_size) == Some(self.archive_size)
            && self.folders.checked_add(self.files) == Some(self.filesystem_entries)
    }

    /// Offset of the file table, directly after the filesystem table
    pub fn file_table_offset(&self) -> u64 {
        self.metadata_offset as u64 + self.filesystem_entries as u64 * FILESYSTEM_ENTRY_SIZE as u64
    }

    /// Offset of the chunk table, directly after the file table
    pub fn chunk_table_offset(&self) -> u64 {
        self.file_table_offset() + self.files as u64 * FILE_ENTRY_SIZE as u64
    }
}

/// One directory or file in the archive's tree
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FilesystemEntry {
    /// [`DIRECTORY_ID`] for directories, otherwise the index into the file table
    pub id: i32,

    /// Vendor hash of the full `/` separated path
    pub hash: u32,

    /// String table offset of the directory path (the parent directory for files)
    pub folder_offset: u32,

    /// String table offset of the leaf name, only meaningful for files
    pub filename_offset: u32,

    /// Last write time as a Windows FILETIME
    pub timestamp: i64,
}

impl FilesystemEntry {
    /// Whether this entry describes a directory
    pub fn is_directory(&self) -> bool {
        self.id == DIRECTORY_ID
    }

    /// Index into the file table, if this entry is a file
    pub fn file_index(&self) -> Option<usize> {
        usize::try_from(self.id).ok()
    }
}

/// Location and checksum of one file's payload
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FileEntry {
    /// Size of the payload as stored, the sum of its chunks' stored lengths
    pub stored_size: u32,

    /// Size of the file once every chunk is decoded
    pub raw_size: u32,

    /// Index of the first chunk in the chunk table
    pub chunk_index: u32,

    /// Number of consecutive chunks belonging to this file
    pub chunk_count: u32,

    /// Offset from the start of the archive to the payload
    pub offset: u32,

    /// CRC-32 of the decoded file
    pub crc32: u32,
}

/// One slice of a file's payload
///
/// `info` packs the stored length in its low 24 bits and the mode byte in its high 8 bits,
/// whose top bit doubles as the compressed flag.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ChunkEntry {
    /// Packed length, compressed flag and mode
    pub info: u32,

    /// Always zero in observed archives
    pub unknown: u16,

    /// Position of this chunk within its file, starting at 0
    pub sequence: u16,
}

impl ChunkEntry {
    /// Build an entry for a chunk, compressed with `mode` or stored as is when `None`.
    pub fn new(stored_len: u32, mode: Option<CompressionMode>, sequence: u16) -> Self {
        let mode_bits = mode.map_or(0, |m| (m as u32) << 24);
        Self {
            info: (stored_len & STORED_LEN_MASK) | mode_bits,
            unknown: 0,
            sequence,
        }
    }

    /// Number of bytes this chunk occupies in the payload
    pub fn stored_len(&self) -> usize {
        (self.info & STORED_LEN_MASK) as usize
    }

    /// Whether the stored bytes need to go through a codec
    pub fn is_compressed(&self) -> bool {
        self.info & COMPRESSED_FLAG != 0
    }

    /// The raw mode byte, including the compressed flag
    pub fn mode_byte(&self) -> u8 {
        (self.info >> 24) as u8
    }

    /// The codec for this chunk, `None` when it is stored
    pub fn mode(&self) -> Option<Result<CompressionMode>> {
        self.is_compressed()
            .then(|| CompressionMode::try_from(self.mode_byte()))
    }
}

/// Convert a modification time to the Windows FILETIME stored in filesystem entries.
pub fn to_filetime(time: SystemTime) -> i64 {
    let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    let ticks = (since_epoch.as_secs() + FILETIME_UNIX_OFFSET) * 10_000_000
        + since_epoch.subsec_nanos() as u64 / 100;
    ticks as i64
}
