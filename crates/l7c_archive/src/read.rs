//! Types for reading L7CA archives
//!

use binrw::BinRead;
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Debug},
    io::{Cursor, Read, Seek, SeekFrom},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tracing::{instrument, warn};

use crate::{
    compression::{DecodeSession, DecodedFile},
    error::{Error, FileNotFoundError, Result},
    hash::{crc32, NamcoHash, PathHash},
    string_table::StringTable,
    types::{ChunkEntry, FileEntry, FilesystemEntry, L7cHeader},
};

/// A decoded file from an L7CA archive
pub struct L7cFile<'a> {
    data: Cow<'a, L7cFileData>,
    contents: Cursor<Vec<u8>>,
    integrity: Integrity,
}

impl Debug for L7cFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "L7cFile({:#?}, {:?})", self.get_metadata(), self.integrity)
    }
}

/// Methods for retrieving information on L7CA file entries
impl L7cFile<'_> {
    /// Get the name of the file
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Use [`L7cFile::enclosed_name`] instead.
    pub fn name(&self) -> &str {
        &self.get_metadata().file_name
    }

    /// The name as a relative path that stays inside the extraction directory, if it is one
    pub fn enclosed_name(&self) -> Option<PathBuf> {
        enclosed_name(self.name())
    }

    /// Get the size of the file, in bytes, in the archive
    pub fn compressed_size(&self) -> u64 {
        self.get_metadata().stored_size
    }

    /// Get the size of the file, in bytes, when uncompressed
    pub fn size(&self) -> u64 {
        self.get_metadata().raw_size
    }

    /// Get the CRC32 hash of the decoded file
    pub fn crc32(&self) -> u32 {
        self.get_metadata().crc32
    }

    /// Get the starting offset of the data of the compressed file
    pub fn data_start(&self) -> u64 {
        self.get_metadata().data_start
    }

    /// Last write time as a Windows FILETIME
    pub fn timestamp(&self) -> i64 {
        self.get_metadata().timestamp
    }

    /// What was checked while decoding the file
    pub fn integrity(&self) -> &Integrity {
        &self.integrity
    }

    /// Take the decoded contents.
    pub fn into_data(self) -> Vec<u8> {
        self.contents.into_inner()
    }

    fn get_metadata(&self) -> &L7cFileData {
        self.data.as_ref()
    }
}

impl Read for L7cFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.contents.read(buf)
    }
}

/// Structure representing an L7CA file entry.
#[derive(Debug, Clone, Default)]
pub struct L7cFileData {
    /// Index into the file and filesystem tables
    pub index: usize,
    /// CRC32 checksum of the decoded file
    pub crc32: u32,
    /// Size of the file in the archive
    pub stored_size: u64,
    /// Size of the file when extracted
    pub raw_size: u64,
    /// Full `/` separated name of the file
    pub file_name: Box<str>,
    /// Whether the stored path hash matched the name
    pub hash_matches: bool,
    /// Last write time as a Windows FILETIME
    pub timestamp: i64,
    /// Specifies where the stored data of the file starts
    pub data_start: u64,
    /// Index of the first chunk
    pub chunk_index: usize,
    /// Number of chunks
    pub chunk_count: usize,
}

/// Structure representing an L7CA directory entry.
#[derive(Debug, Clone, Default)]
pub struct L7cDirectory {
    /// Full `/` separated name of the directory
    pub name: Box<str>,
    /// Whether the stored path hash matched the name
    pub hash_matches: bool,
    /// Last write time as a Windows FILETIME
    pub timestamp: i64,
}

impl L7cDirectory {
    /// The name as a relative path that stays inside the extraction directory, if it is one
    pub fn enclosed_name(&self) -> Option<PathBuf> {
        enclosed_name(&self.name)
    }
}

/// Checks made on a decoded file. None of them stop extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Integrity {
    /// Whether the filesystem entry's hash matched its name
    pub hash_matches: bool,
    /// CRC32 recorded in the file table
    pub expected_crc32: u32,
    /// CRC32 of the decoded contents
    pub actual_crc32: u32,
    /// Size recorded in the file table
    pub expected_size: u64,
    /// Size of the decoded contents
    pub actual_size: u64,
    /// Chunks whose codec failed and whose stored bytes were kept
    pub failed_chunks: usize,
}

impl Integrity {
    /// Whether the CRC32 of the decoded file matches the recorded one
    pub fn crc_matches(&self) -> bool {
        self.expected_crc32 == self.actual_crc32
    }

    /// Whether the decoded length matches the recorded one
    pub fn size_matches(&self) -> bool {
        self.expected_size == self.actual_size
    }

    /// Whether every check passed
    pub fn is_ok(&self) -> bool {
        self.hash_matches && self.crc_matches() && self.size_matches() && self.failed_chunks == 0
    }

    fn report(&self, name: &str) {
        if !self.hash_matches {
            warn!("{name} did not match expected hash");
        }
        if self.failed_chunks > 0 {
            warn!(
                "{name} has {} chunk(s) stored undecoded",
                self.failed_chunks
            );
        }
        if !self.crc_matches() {
            warn!(
                "{name} has invalid CRC32: {:08x} vs {:08x}",
                self.actual_crc32, self.expected_crc32
            );
        }
        if !self.size_matches() {
            warn!(
                "{name} has invalid file size: {:08x} vs {:08x}",
                self.actual_size, self.expected_size
            );
        }
    }
}

fn enclosed_name(name: &str) -> Option<PathBuf> {
    if name.contains('\0') {
        return None;
    }
    let path = Path::new(name);
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| path.to_path_buf())
        .filter(|p| p.components().next().is_some())
}

/// Full `/` separated path of a filesystem entry
fn entry_name(strings: &StringTable, entry: &FilesystemEntry) -> Result<String> {
    let folder = strings.get(entry.folder_offset)?;
    if entry.file_index().is_none() {
        return Ok(folder.to_owned());
    }

    let leaf = strings.get(entry.filename_offset)?;
    if folder.is_empty() {
        Ok(leaf.to_owned())
    } else {
        Ok(format!("{folder}/{leaf}"))
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: L7cHeader,
    files: IndexMap<Box<str>, L7cFileData>,
    directories: Vec<L7cDirectory>,
    chunks: Vec<ChunkEntry>,
}

/// L7CA archive reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_l7c_contents(reader: impl Read + Seek) -> l7c_archive::error::Result<()> {
///     let mut archive = l7c_archive::L7cArchive::new(reader)?;
///
///     for i in 0..archive.len() {
///         let mut file = archive.by_index(i)?;
///         println!("Filename: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct L7cArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> L7cArchive<R> {
    /// Total size of the files in the archive, if it can be known. Doesn't include directories or
    /// metadata.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in self.shared.files.values() {
            total = total.checked_add(file.raw_size as u128)?;
        }
        Some(total)
    }
}

impl<R: Read + Seek> L7cArchive<R> {
    /// Read an L7CA archive collecting the files it contains.
    pub fn new(reader: R) -> Result<L7cArchive<R>> {
        Self::with_hasher(reader, &NamcoHash)
    }

    /// Read an L7CA archive, checking filesystem entries with a custom path hash.
    pub fn with_hasher(mut reader: R, hasher: &dyn PathHash) -> Result<L7cArchive<R>> {
        let shared = Self::get_metadata(&mut reader, hasher)?;
        Ok(L7cArchive {
            reader,
            shared: shared.into(),
        })
    }

    /// Number of files contained in this archive.
    pub fn len(&self) -> usize {
        self.shared.files.len()
    }

    /// Whether this archive contains no files
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The archive header
    pub fn header(&self) -> &L7cHeader {
        &self.shared.header
    }

    /// Returns an iterator over all the file names in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.files.keys().map(|s| s.as_ref())
    }

    /// Returns an iterator over the metadata of every file, in file table order.
    pub fn entries(&self) -> impl Iterator<Item = &L7cFileData> {
        self.shared.files.values()
    }

    /// Directories recorded in the filesystem table, including empty ones
    pub fn directories(&self) -> &[L7cDirectory] {
        &self.shared.directories
    }

    /// Get the index of a file entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.files.get_index_of(name)
    }

    /// Get the name of a file entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.shared
            .files
            .get_index(index)
            .map(|(name, _)| name.as_ref())
    }

    /// Search for a file entry by name
    pub fn by_name(&mut self, name: &str) -> Result<L7cFile<'_>> {
        let Some(index) = self.shared.files.get_index_of(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get a contained file by index, decoding all of its chunks
    ///
    /// Chunks that fail to decode are kept as stored and counted in [`L7cFile::integrity`];
    /// only I/O errors and broken table references fail the call.
    #[instrument(skip(self))]
    pub fn by_index(&mut self, file_number: usize) -> Result<L7cFile<'_>> {
        let (_, data) = self
            .shared
            .files
            .get_index(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;

        let chunks = self
            .shared
            .chunks
            .get(data.chunk_index..data.chunk_index + data.chunk_count)
            .ok_or_else(|| {
                Error::InvalidArchive(format!(
                    "{} references chunks {}..{} of {}",
                    data.file_name,
                    data.chunk_index,
                    data.chunk_index + data.chunk_count,
                    self.shared.chunks.len()
                ))
            })?;

        self.reader.seek(SeekFrom::Start(data.data_start))?;
        let mut payload = vec![0u8; data.stored_size as usize];
        self.reader.read_exact(&mut payload)?;

        let decoded: DecodedFile = DecodeSession::new().decode_file(chunks, &payload);
        let integrity = Integrity {
            hash_matches: data.hash_matches,
            expected_crc32: data.crc32,
            actual_crc32: crc32(&decoded.data),
            expected_size: data.raw_size,
            actual_size: decoded.data.len() as u64,
            failed_chunks: decoded.failed_chunks(),
        };
        integrity.report(&data.file_name);

        Ok(L7cFile {
            data: Cow::Borrowed(data),
            contents: Cursor::new(decoded.data),
            integrity,
        })
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_header(reader: &mut R) -> Result<L7cHeader> {
        reader.seek(SeekFrom::Start(0))?;
        let header = L7cHeader::read(reader).map_err(|err| match err {
            binrw::Error::BadMagic { .. } => Error::InvalidMagic,
            other => Error::from(other),
        })?;

        if let Err(err) = header.validate() {
            warn!("{err}, attempting to read anyway");
        }
        if !header.is_consistent() {
            warn!(?header, "header sizes and counts do not add up");
        }

        Ok(header)
    }

    fn read_table<T>(reader: &mut R, count: u32) -> Result<Vec<T>>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
        T: binrw::meta::ReadEndian,
    {
        (0..count)
            .map(|_| T::read(reader).map_err(Error::from))
            .collect()
    }

    fn get_strings(reader: &mut R, header: &L7cHeader) -> Result<StringTable> {
        let archive_len = reader.seek(SeekFrom::End(0))?;
        let base = archive_len
            .checked_sub(header.string_table_size as u64)
            .ok_or_else(|| {
                Error::InvalidArchive(format!(
                    "string table of {} bytes in a {archive_len} byte file",
                    header.string_table_size
                ))
            })?;

        reader.seek(SeekFrom::Start(base))?;
        StringTable::read(reader, header.string_table_size)
    }

    fn get_metadata(reader: &mut R, hasher: &dyn PathHash) -> Result<Shared> {
        let header = Self::read_header(reader)?;
        let strings = Self::get_strings(reader, &header)?;

        reader.seek(SeekFrom::Start(header.metadata_offset as u64))?;
        let entries: Vec<FilesystemEntry> = Self::read_table(reader, header.filesystem_entries)?;
        let files: Vec<FileEntry> = Self::read_table(reader, header.files)?;
        let chunks: Vec<ChunkEntry> = Self::read_table(reader, header.chunks)?;

        let mut directories = Vec::with_capacity(header.folders as usize);
        let mut names = HashMap::with_capacity(header.files as usize);
        for entry in &entries {
            let name = match entry_name(&strings, entry) {
                Ok(name) => name,
                Err(err) => {
                    warn!(id = entry.id, "{err}, entry has no usable name");
                    continue;
                }
            };

            let hash_matches = hasher.hash(name.as_bytes()) == entry.hash;
            if !hash_matches {
                warn!("{name} did not match expected hash");
            }

            match entry.file_index() {
                Some(index) => {
                    names.insert(index, (name, hash_matches, entry.timestamp));
                }
                None => directories.push(L7cDirectory {
                    name: name.into(),
                    hash_matches,
                    timestamp: entry.timestamp,
                }),
            }
        }

        let mut index_map = IndexMap::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let (name, hash_matches, timestamp) = names.remove(&index).unwrap_or_else(|| {
                warn!(index, "file has no named filesystem entry");
                (format!("__unnamed/{index:08}.bin"), false, 0)
            });

            let data = L7cFileData {
                index,
                crc32: file.crc32,
                stored_size: file.stored_size as u64,
                raw_size: file.raw_size as u64,
                file_name: name.into(),
                hash_matches,
                timestamp,
                data_start: file.offset as u64,
                chunk_index: file.chunk_index as usize,
                chunk_count: file.chunk_count as usize,
            };
            if let Some(previous) = index_map.insert(data.file_name.clone(), data) {
                warn!(
                    "{} appears more than once, only the last copy is reachable",
                    previous.file_name
                );
            }
        }

        Ok(Shared {
            header,
            files: index_map,
            directories,
            chunks,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::prelude::*;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tracing_test::traced_test;

    use crate::error::{Error, Result};
    use crate::read::{enclosed_name, L7cArchive};
    use crate::write::{ChunkMode, L7cWriter, L7cWriterOptions};

    fn build(mode: ChunkMode, files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut writer = L7cWriter::new(
            Cursor::new(Vec::new()),
            L7cWriterOptions::builder().chunk_mode(mode).build(),
        );
        for (name, data) in files {
            writer.add_file(name, data.to_vec(), 0)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    #[test]
    fn read_invalid_magic() {
        let mut input = vec![0u8; 0x200];
        input[..4].copy_from_slice(b"L7CB");

        let archive = L7cArchive::new(Cursor::new(input));
        assert!(matches!(archive, Err(Error::InvalidMagic)));
    }

    #[test]
    fn read_empty_archive() -> Result<()> {
        let input = build(ChunkMode::Stored, &[])?;

        let archive = L7cArchive::new(Cursor::new(input))?;
        assert!(archive.is_empty());
        assert!(archive.directories().is_empty());
        assert_eq!(archive.header().metadata_offset, 0x200);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn read_stored_archive_with_entries() -> Result<()> {
        let input = build(
            ChunkMode::Stored,
            &[("data/hello.txt", b"Hello World"), ("data/sub/world.txt", b"World Hello")],
        )?;

        let mut archive = L7cArchive::new(Cursor::new(input))?;
        assert_eq!(archive.len(), 2);
        assert_eq!(
            archive.file_names().collect::<Vec<_>>(),
            vec!["data/hello.txt", "data/sub/world.txt"]
        );
        assert_eq!(
            archive
                .directories()
                .iter()
                .map(|d| d.name.as_ref())
                .collect::<Vec<_>>(),
            vec!["data", "data/sub"]
        );

        let mut buffer = Vec::new();
        let mut file = archive.by_index(0)?;
        assert_eq!(file.data_start(), 0x200);
        assert_eq!(file.name(), "data/hello.txt");
        assert!(file.integrity().is_ok());
        file.read_to_end(&mut buffer)?;
        assert_eq!(buffer, b"Hello World".to_vec());
        buffer.clear();

        let mut file = archive.by_name("data/sub/world.txt")?;
        assert_eq!(file.data_start(), 0x400);
        file.read_to_end(&mut buffer)?;
        assert_eq!(buffer, b"World Hello".to_vec());

        Ok(())
    }

    #[test]
    fn read_byte_lz_archive() -> Result<()> {
        let big = (0..200_000u32).map(|i| (i % 253) as u8).collect::<Vec<_>>();
        let input = build(ChunkMode::ByteLz, &[("a/big.bin", &big), ("a/small.bin", b"x")])?;

        let mut archive = L7cArchive::new(Cursor::new(input))?;
        assert_eq!(archive.header().chunks, 5);

        let file = archive.by_index(0)?;
        assert!(file.integrity().is_ok());
        assert_eq!(file.size(), big.len() as u64);
        assert!(file.compressed_size() > file.size());
        assert_eq!(file.into_data(), big);

        Ok(())
    }

    #[test]
    fn missing_file_is_reported() -> Result<()> {
        let input = build(ChunkMode::Stored, &[("a/b.txt", b"b")])?;
        let mut archive = L7cArchive::new(Cursor::new(input))?;

        assert!(matches!(
            archive.by_index(1),
            Err(Error::FileNotFound(_))
        ));
        assert!(matches!(
            archive.by_name("a/c.txt"),
            Err(Error::FileNotFound(_))
        ));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn hash_mismatch_is_a_warning() -> Result<()> {
        let input = build(ChunkMode::Stored, &[("a/b.txt", b"b")])?;

        let mut archive =
            L7cArchive::with_hasher(Cursor::new(input), &|_: &[u8]| 0xDEAD_BEEFu32)?;
        assert!(archive.directories().iter().all(|d| !d.hash_matches));

        let file = archive.by_index(0)?;
        assert!(!file.integrity().hash_matches);
        assert!(file.integrity().crc_matches());
        assert_eq!(file.into_data(), b"b".to_vec());
        assert!(logs_contain("did not match expected hash"));

        Ok(())
    }

    #[test]
    fn unsafe_names_are_not_enclosed() {
        assert_eq!(enclosed_name("a/b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(enclosed_name("../b.txt"), None);
        assert_eq!(enclosed_name("/etc/shadow"), None);
        assert_eq!(enclosed_name(""), None);
    }
}
