//! Types for writing L7CA archives
//!

use binrw::BinWrite;
use bon::Builder;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt::Debug;
use std::io::{Cursor, Seek, SeekFrom, Write};
use tracing::{debug, instrument};

use crate::codec::byte_lz;
use crate::compression::CompressionMode;
use crate::error::{Error, Result};
use crate::hash::{crc32, NamcoHash, PathHash};
use crate::string_table::StringTableBuilder;
use crate::types::{
    ChunkEntry, FileEntry, FilesystemEntry, L7cHeader, ALIGNMENT, DIRECTORY_ID, MAX_CHUNK_SIZE,
};

/// Largest stored length a chunk entry can describe
const MAX_STORED_CHUNK: usize = 0x00FF_FFFF;

/// How each chunk's payload is written
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    /// Raw bytes with the compressed flag clear
    #[default]
    Stored,

    /// Literal-only [`CompressionMode::ByteLz`] streams
    ByteLz,
}

/// Options for how the L7CA file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct L7cWriterOptions {
    /// How chunk payloads are encoded
    #[builder(default)]
    pub chunk_mode: ChunkMode,

    /// Largest number of input bytes per chunk
    #[builder(default = MAX_CHUNK_SIZE)]
    pub max_chunk_size: u32,
}

impl Default for L7cWriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct PendingFile {
    name: String,
    data: Vec<u8>,
}

struct PreparedFile {
    stored: Vec<u8>,
    chunks: Vec<ChunkEntry>,
    raw_size: u32,
    crc32: u32,
}

/// L7CA archive generator
///
/// Files are buffered until [`L7cWriter::finish`], which lays out payloads, tables and the
/// header in one pass.
///
/// ```
/// # fn doit() -> l7c_archive::error::Result<()>
/// # {
/// use l7c_archive::write::{ChunkMode, L7cWriterOptions};
/// use l7c_archive::L7cWriter;
///
/// let mut l7c = L7cWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     L7cWriterOptions::builder().chunk_mode(ChunkMode::ByteLz).build(),
/// );
///
/// l7c.add_file("data/hello_world.txt", b"Hello, World!".to_vec(), 0)?;
/// l7c.add_directory("data/empty", 0)?;
///
/// let bytes = l7c.finish()?.into_inner();
/// assert_eq!(&bytes[..4], b"L7CA");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct L7cWriter<W: Write + Seek> {
    inner: W,
    options: L7cWriterOptions,
    hasher: Box<dyn PathHash>,
    strings: StringTableBuilder,
    entries: Vec<FilesystemEntry>,
    directories: HashSet<String>,
    files: Vec<PendingFile>,
}

impl<W: Write + Seek> Debug for L7cWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L7cWriter")
            .field("options", &self.options)
            .field("directories", &self.directories.len())
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl<W: Write + Seek> L7cWriter<W> {
    /// Initializes the archive, hashing paths with [`NamcoHash`].
    pub fn new(inner: W, options: L7cWriterOptions) -> L7cWriter<W> {
        Self::with_hasher(inner, options, NamcoHash)
    }

    /// Initializes the archive with a custom path hash.
    pub fn with_hasher(
        inner: W,
        options: L7cWriterOptions,
        hasher: impl PathHash + 'static,
    ) -> L7cWriter<W> {
        let options = L7cWriterOptions {
            max_chunk_size: match options.max_chunk_size {
                0 => MAX_CHUNK_SIZE,
                size => size,
            },
            ..options
        };

        L7cWriter {
            inner,
            options,
            hasher: Box::new(hasher),
            strings: StringTableBuilder::new(),
            entries: Vec::new(),
            directories: HashSet::new(),
            files: Vec::new(),
        }
    }

    /// Number of files added so far
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files have been added
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Record a directory, and any ancestors not yet recorded.
    ///
    /// Directories holding files are recorded by [`L7cWriter::add_file`]; this is only needed
    /// for empty ones.
    pub fn add_directory(&mut self, path: &str, timestamp: i64) -> Result<()> {
        let path = normalize(path);
        if path.is_empty() || self.directories.contains(&path) {
            return Ok(());
        }

        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_directory(parent, timestamp)?;
        }

        let folder_offset = self.strings.intern(&path)?;
        self.entries.push(FilesystemEntry {
            id: DIRECTORY_ID,
            hash: self.hasher.hash(path.as_bytes()),
            folder_offset,
            filename_offset: 0,
            timestamp,
        });
        debug!("added directory {path}");
        self.directories.insert(path);

        Ok(())
    }

    /// Add a file's complete contents under a `/` separated path.
    #[instrument(skip(self, data), fields(size = data.len()), err)]
    pub fn add_file(&mut self, path: &str, data: Vec<u8>, timestamp: i64) -> Result<()> {
        let path = normalize(path);
        let (parent, leaf) = path.rsplit_once('/').unwrap_or(("", &path));
        if leaf.is_empty() {
            return Err(Error::CustomError(format!("'{path}' has no file name")));
        }
        if u32::try_from(data.len()).is_err() {
            return Err(Error::CustomError(format!(
                "'{path}' is larger than 4 GiB"
            )));
        }

        self.add_directory(parent, timestamp)?;
        let folder_offset = self.strings.intern(parent)?;
        let filename_offset = self.strings.intern(leaf)?;

        self.entries.push(FilesystemEntry {
            id: self.files.len() as i32,
            hash: self.hasher.hash(path.as_bytes()),
            folder_offset,
            filename_offset,
            timestamp,
        });
        self.files.push(PendingFile { name: path, data });

        Ok(())
    }

    /// Encode every file and write the payloads, tables and header
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), fields(files = self.files.len()), err)]
    pub fn finish(mut self) -> Result<W> {
        let options = self.options;
        let prepared = self
            .files
            .par_iter()
            .map(|file| prepare(file, &options))
            .collect::<Result<Vec<_>>>()?;

        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(&[0u8; ALIGNMENT as usize])?;
        let mut position = ALIGNMENT as u64;

        let mut files = Vec::with_capacity(prepared.len());
        let mut chunks = Vec::new();
        for file in prepared {
            files.push(FileEntry {
                stored_size: file.stored.len() as u32,
                raw_size: file.raw_size,
                chunk_index: chunks.len() as u32,
                chunk_count: file.chunks.len() as u32,
                offset: to_offset(position)?,
                crc32: file.crc32,
            });
            chunks.extend(file.chunks);

            self.inner.write_all(&file.stored)?;
            position += file.stored.len() as u64;

            let padding = padding_after(position);
            self.inner.write_all(&vec![0u8; padding as usize])?;
            position += padding;
        }

        let mut tables = Cursor::new(Vec::new());
        for entry in &self.entries {
            entry.write(&mut tables)?;
        }
        for file in &files {
            file.write(&mut tables)?;
        }
        for chunk in &chunks {
            chunk.write(&mut tables)?;
        }
        let mut metadata = tables.into_inner();

        let string_count = self.strings.len();
        let string_table = self.strings.into_bytes();
        let strings_len = string_table.len() as u32;
        metadata.extend_from_slice(&string_table);

        let folders = self.directories.len() as u32;
        let header = L7cHeader {
            archive_size: to_offset(position + metadata.len() as u64)?,
            metadata_offset: to_offset(position)?,
            metadata_size: metadata.len() as u32,
            chunk_max: options.max_chunk_size,
            filesystem_entries: self.entries.len() as u32,
            folders,
            files: files.len() as u32,
            chunks: chunks.len() as u32,
            string_table_size: strings_len,
            ..Default::default()
        };
        debug!(?header, strings = string_count, "writing metadata");

        self.inner.write_all(&metadata)?;
        self.inner.seek(SeekFrom::Start(0))?;
        header.write(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(position + metadata.len() as u64))?;

        Ok(self.inner)
    }
}

/// Bytes of zero padding after a payload ending at `position`.
///
/// Payloads ending on a boundary still get a whole block.
fn padding_after(position: u64) -> u64 {
    let alignment = ALIGNMENT as u64;
    alignment - (position - alignment) % alignment
}

fn to_offset(position: u64) -> Result<u32> {
    u32::try_from(position)
        .map_err(|_| Error::CustomError("archive is larger than 4 GiB".to_owned()))
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_owned()
}

fn prepare(file: &PendingFile, options: &L7cWriterOptions) -> Result<PreparedFile> {
    let mut stored = Vec::with_capacity(file.data.len());
    let mut chunks = Vec::new();

    for (sequence, piece) in file
        .data
        .chunks(options.max_chunk_size as usize)
        .enumerate()
    {
        let sequence = u16::try_from(sequence).map_err(|_| {
            Error::CustomError(format!("'{}' needs more than 65536 chunks", file.name))
        })?;

        let (bytes, mode) = match options.chunk_mode {
            ChunkMode::Stored => (piece.to_vec(), None),
            ChunkMode::ByteLz => (byte_lz::compress(piece), Some(CompressionMode::ByteLz)),
        };
        if bytes.len() > MAX_STORED_CHUNK {
            return Err(Error::CustomError(format!(
                "chunk {sequence} of '{}' is {} bytes once encoded",
                file.name,
                bytes.len()
            )));
        }

        chunks.push(ChunkEntry::new(bytes.len() as u32, mode, sequence));
        stored.extend_from_slice(&bytes);
    }

    Ok(PreparedFile {
        stored,
        chunks,
        raw_size: file.data.len() as u32,
        crc32: crc32(&file.data),
    })
}

#[cfg(test)]
mod test {
    use binrw::BinRead;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    use super::{padding_after, ChunkMode, L7cWriter, L7cWriterOptions};
    use crate::error::Result;
    use crate::string_table::StringTable;
    use crate::types::{ChunkEntry, FileEntry, FilesystemEntry, L7cHeader, DIRECTORY_ID};

    #[test]
    fn padding_always_adds_a_block() {
        assert_eq!(padding_after(0x200), 0x200);
        assert_eq!(padding_after(0x201), 0x1FF);
        assert_eq!(padding_after(0x3FF), 1);
        assert_eq!(padding_after(0x400), 0x200);
    }

    #[test]
    fn options_defaults() {
        let options = L7cWriterOptions::default();
        assert_eq!(options.chunk_mode, ChunkMode::Stored);
        assert_eq!(options.max_chunk_size, 0x10000);
    }

    #[test]
    fn write_layout() -> Result<()> {
        let mut writer = L7cWriter::new(
            Cursor::new(Vec::new()),
            L7cWriterOptions::builder().max_chunk_size(4).build(),
        );
        writer.add_file("root/a/file.bin", b"0123456789".to_vec(), 7)?;
        writer.add_directory("root/empty", 9)?;
        writer.add_file("root/b.txt", b"b".to_vec(), 8)?;
        let data = writer.finish()?.into_inner();

        let mut cursor = Cursor::new(&data);
        let header = L7cHeader::read(&mut cursor)?;
        assert!(header.validate().is_ok());
        assert!(header.is_consistent());
        assert_eq!(header.archive_size as usize, data.len());
        assert_eq!(header.metadata_offset, 0x600);
        assert_eq!(header.filesystem_entries, 5);
        assert_eq!(header.folders, 3);
        assert_eq!(header.files, 2);
        assert_eq!(header.chunks, 4);
        assert_eq!(header.chunk_max, 4);

        cursor.set_position(header.metadata_offset as u64);
        let entries = (0..header.filesystem_entries)
            .map(|_| FilesystemEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        assert_eq!(
            entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![DIRECTORY_ID, DIRECTORY_ID, 0, DIRECTORY_ID, 1]
        );
        assert_eq!(entries[3].timestamp, 9);

        Ok(())
    }

    #[test]
    fn write_tables() -> Result<()> {
        let mut writer = L7cWriter::new(
            Cursor::new(Vec::new()),
            L7cWriterOptions::builder().max_chunk_size(4).build(),
        );
        writer.add_file("root/a/file.bin", b"0123456789".to_vec(), 7)?;
        writer.add_file("root/b.txt", b"b".to_vec(), 8)?;
        let data = writer.finish()?.into_inner();

        let mut cursor = Cursor::new(&data);
        let header = L7cHeader::read(&mut cursor)?;
        cursor.set_position(header.metadata_offset as u64);

        let entries = (0..header.filesystem_entries)
            .map(|_| FilesystemEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        assert_eq!(
            entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![DIRECTORY_ID, DIRECTORY_ID, 0, 1]
        );
        assert_eq!(entries[2].timestamp, 7);

        let files = (0..header.files)
            .map(|_| FileEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        assert_eq!(
            files[0],
            FileEntry {
                stored_size: 10,
                raw_size: 10,
                chunk_index: 0,
                chunk_count: 3,
                offset: 0x200,
                crc32: 0xA684_C7C6,
            }
        );
        assert_eq!(files[1].offset, 0x400);
        assert_eq!(files[1].chunk_index, 3);

        let chunks = (0..header.chunks)
            .map(|_| ChunkEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        assert_eq!(
            chunks.iter().map(|c| (c.stored_len(), c.sequence)).collect::<Vec<_>>(),
            vec![(4, 0), (4, 1), (2, 2), (1, 0)]
        );
        assert!(chunks.iter().all(|c| !c.is_compressed()));

        let strings = StringTable::read(
            &data[data.len() - header.string_table_size as usize..],
            header.string_table_size,
        )?;
        assert_eq!(strings.get(entries[0].folder_offset)?, "root");
        assert_eq!(strings.get(entries[1].folder_offset)?, "root/a");
        assert_eq!(strings.get(entries[2].filename_offset)?, "file.bin");
        assert_eq!(strings.get(entries[3].folder_offset)?, "root");

        Ok(())
    }

    #[test]
    fn byte_lz_chunks_are_flagged() -> Result<()> {
        let mut writer = L7cWriter::new(
            Cursor::new(Vec::new()),
            L7cWriterOptions::builder()
                .chunk_mode(ChunkMode::ByteLz)
                .build(),
        );
        writer.add_file("x.bin", vec![1, 2, 3], 0)?;
        let data = writer.finish()?.into_inner();

        let mut cursor = Cursor::new(&data);
        let header = L7cHeader::read(&mut cursor)?;
        cursor.set_position(header.chunk_table_offset());
        let chunk = ChunkEntry::read(&mut cursor)?;

        assert_eq!(chunk.mode_byte(), 0x80);
        // count byte, three literals, terminator
        assert_eq!(chunk.stored_len(), 7);
        assert_eq!(&data[0x200..0x207], &[3, 1, 2, 3, 0, 0, 0]);

        Ok(())
    }

    #[test]
    fn root_level_file_has_empty_folder() -> Result<()> {
        let mut writer = L7cWriter::new(Cursor::new(Vec::new()), L7cWriterOptions::default());
        writer.add_file("top.bin", vec![0], 0)?;
        assert!(writer.add_file("", vec![0], 0).is_err());
        let data = writer.finish()?.into_inner();

        let mut cursor = Cursor::new(&data);
        let header = L7cHeader::read(&mut cursor)?;
        assert_eq!(header.folders, 0);
        assert_eq!(header.filesystem_entries, 1);
        // the empty folder name then the leaf
        assert_eq!(header.string_table_size, 1 + 1 + 7);

        Ok(())
    }
}
