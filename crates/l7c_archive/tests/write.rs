use l7c_archive::{
    error::{Error, Result},
    read::L7cArchive,
    types::to_filetime,
    write::{ChunkMode, L7cWriter, L7cWriterOptions},
};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::info;
use tracing_test::traced_test;
use walkdir::WalkDir;

fn populate(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("sub/deeper"))?;
    fs::create_dir_all(root.join("empty"))?;
    fs::write(root.join("readme.txt"), b"an archive for testing")?;
    fs::write(root.join("sub/zeros.bin"), vec![0u8; 70_000])?;
    fs::write(
        root.join("sub/deeper/pattern.bin"),
        (0..150_000u32).map(|i| (i * 7 % 251) as u8).collect::<Vec<_>>(),
    )?;
    fs::write(root.join("sub/deeper/empty.bin"), b"")?;
    Ok(())
}

/// Packs `root` the way the command line tool does, with names starting at the root's own name.
fn pack(root: &Path, options: L7cWriterOptions) -> Result<Vec<u8>> {
    let base = root
        .parent()
        .ok_or(Error::CustomError("unable to find parent".into()))?;
    let mut writer = L7cWriter::new(Cursor::new(Vec::new()), options);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::CustomError(e.to_string()))?;
        let name = entry
            .path()
            .strip_prefix(base)
            .map_err(|e| Error::CustomError(e.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        let metadata = entry
            .metadata()
            .map_err(|e| Error::CustomError(e.to_string()))?;
        let timestamp = to_filetime(metadata.modified()?);

        if entry.file_type().is_dir() {
            writer.add_directory(&name, timestamp)?;
        } else {
            info!("packing {name}");
            writer.add_file(&name, fs::read(entry.path())?, timestamp)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

fn validate_round_trip(mode: ChunkMode) -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path().join("packed");
    populate(&root)?;

    let archive = pack(&root, L7cWriterOptions::builder().chunk_mode(mode).build())?;
    let mut l7c = L7cArchive::new(Cursor::new(archive))?;

    assert!(l7c.header().is_consistent());
    assert_eq!(l7c.len(), 4);
    assert_eq!(
        l7c.directories()
            .iter()
            .map(|d| d.name.as_ref())
            .collect::<Vec<_>>(),
        vec!["packed", "packed/empty", "packed/sub", "packed/sub/deeper"]
    );
    assert!(l7c.directories().iter().all(|d| d.hash_matches));

    for i in 0..l7c.len() {
        let mut file = l7c.by_index(i)?;
        let relative = file
            .name()
            .strip_prefix("packed/")
            .ok_or(Error::CustomError(format!("{} is outside the root", file.name())))?
            .to_owned();

        let expected = fs::read(root.join(&relative))?;
        let mut actual = Vec::new();
        file.read_to_end(&mut actual)?;

        assert!(file.integrity().is_ok(), "{relative}: {:?}", file.integrity());
        assert_eq!(file.size() as usize, expected.len());
        assert_eq!(expected, actual);
    }

    Ok(())
}

#[traced_test]
#[test]
fn round_trip_stored() -> Result<()> {
    validate_round_trip(ChunkMode::Stored)
}

#[traced_test]
#[test]
fn round_trip_byte_lz() -> Result<()> {
    validate_round_trip(ChunkMode::ByteLz)
}

#[test]
fn small_chunks_round_trip() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path().join("small");
    populate(&root)?;

    let archive = pack(
        &root,
        L7cWriterOptions::builder()
            .chunk_mode(ChunkMode::ByteLz)
            .max_chunk_size(1000)
            .build(),
    )?;
    let mut l7c = L7cArchive::new(Cursor::new(archive))?;
    assert_eq!(l7c.header().chunk_max, 1000);

    let file = l7c.by_name("small/sub/deeper/pattern.bin")?;
    assert!(file.integrity().is_ok());
    assert_eq!(file.size(), 150_000);

    let empty = l7c.by_name("small/sub/deeper/empty.bin")?;
    assert!(empty.integrity().is_ok());
    assert_eq!(empty.into_data(), Vec::<u8>::new());

    Ok(())
}
