//! This library handles reading from and creating **L7CA** archives (`.l7z`) used by Namco
//! titles on the PlayStation Vita, along with the two chunk codecs found inside them.
//!
//! # L7CA Archive Format Documentation
//!
//! An L7CA archive holds a tree of files. Every file payload is cut into chunks of at most
//! 64 KiB, each of which is either stored as is or compressed with one of two codecs. The
//! metadata describing the tree sits after the payloads, and a header pointing at it is
//! written over the first padding block once everything else is known.
//!
//! ## File Structure
//!
//! | Section            | Description                                                         |
//! |--------------------|---------------------------------------------------------------------|
//! | Header             | 48 bytes at offset 0, inside the leading `0x200` byte padding block |
//! | Payloads           | Each file's chunks back to back, then zero padding to `0x200`       |
//! | Filesystem table   | One 24 byte entry per directory and file                            |
//! | File table         | One 24 byte entry per file                                          |
//! | Chunk table        | One 8 byte entry per chunk                                          |
//! | String table       | Length prefixed names, ending exactly at the end of the archive     |
//!
//! All integers are little endian.
//!
//! ### Header
//!
//! | Offset (bytes) | Field                  | Description                                         |
//! |----------------|------------------------|-----------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "L7CA"                                     |
//! | 0x0004         | Version                | 4 bytes: Fixed value 0x00010000                     |
//! | 0x0008         | Archive Size           | 4 bytes: Total size of the archive                  |
//! | 0x000C         | Metadata Offset        | 4 bytes: Offset to the filesystem table             |
//! | 0x0010         | Metadata Size          | 4 bytes: Size of the four metadata tables           |
//! | 0x0014         | Chunk Max              | 4 bytes: Largest chunk, 0x00010000                  |
//! | 0x0018         | Filesystem Entries     | 4 bytes: Directories plus files                     |
//! | 0x001C         | Folders                | 4 bytes: Number of directory entries                |
//! | 0x0020         | Files                  | 4 bytes: Number of file entries                     |
//! | 0x0024         | Chunks                 | 4 bytes: Number of chunk entries                    |
//! | 0x0028         | String Table Size      | 4 bytes: Size of the string table in bytes          |
//! | 0x002C         | Sections               | 4 bytes: Fixed value 5                              |
//!
//! `metadata offset + metadata size == archive size` and `folders + files == filesystem entries`.
//!
//! ### Filesystem Entry
//!
//! | Offset (bytes) | Field                  | Description                                         |
//! |----------------|------------------------|-----------------------------------------------------|
//! | 0x0000         | Id                     | 4 bytes: -1 for directories, else the file index    |
//! | 0x0004         | Hash                   | 4 bytes: Vendor hash of the full path               |
//! | 0x0008         | Folder Offset          | 4 bytes: String offset of the directory path        |
//! | 0x000C         | Filename Offset        | 4 bytes: String offset of the leaf name             |
//! | 0x0010         | Timestamp              | 8 bytes: Windows FILETIME                           |
//!
//! ### File Entry
//!
//! | Offset (bytes) | Field                  | Description                                         |
//! |----------------|------------------------|-----------------------------------------------------|
//! | 0x0000         | Stored Size            | 4 bytes: Sum of the file's stored chunk lengths     |
//! | 0x0004         | Raw Size               | 4 bytes: Size once decoded                          |
//! | 0x0008         | Chunk Index            | 4 bytes: First chunk of the file                    |
//! | 0x000C         | Chunk Count            | 4 bytes: Number of chunks                           |
//! | 0x0010         | Offset                 | 4 bytes: Offset of the payload                      |
//! | 0x0014         | CRC32                  | 4 bytes: CRC-32 of the decoded file                 |
//!
//! ### Chunk Entry
//!
//! | Offset (bytes) | Field                  | Description                                         |
//! |----------------|------------------------|-----------------------------------------------------|
//! | 0x0000         | Info                   | 4 bytes: Stored length (low 24 bits), mode byte     |
//! | 0x0004         | Unknown                | 2 bytes: Always 0                                   |
//! | 0x0006         | Sequence               | 2 bytes: Position of the chunk within its file      |
//!
//! The mode byte is the top byte of `info`. Its high bit flags a compressed chunk, so the two
//! known values are `0x80` ([`codec::byte_lz`]) and `0x81` ([`codec::tree_lz`]).
//!
//! ### String Table
//!
//! Each string is a one byte length followed by that many UTF-8 bytes. Filesystem entries
//! refer to strings by the offset of their length byte, counted from
//! `archive length - string table size`.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.l7z`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression Modes**:
//!   - `0x80`: byte oriented LZ
//!   - `0x81`: bit oriented LZ with inline prefix trees and a 32 KiB window
//!

pub mod bits;
pub mod codec;
pub mod compression;
pub mod error;
pub mod hash;
pub mod read;
pub mod string_table;
pub mod types;
pub mod write;

pub use compression::{CompressionMode, DecodeSession};
pub use hash::{NamcoHash, PathHash};
pub use read::L7cArchive;
pub use write::L7cWriter;
