use binrw::BinRead;
use l7c_archive::{
    error::{Error, Result},
    read::L7cArchive,
    types::{L7cHeader, FILESYSTEM_ENTRY_SIZE, VERSION},
    write::{L7cWriter, L7cWriterOptions},
};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read};
use tracing_test::traced_test;

fn build(files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut writer = L7cWriter::new(Cursor::new(Vec::new()), L7cWriterOptions::default());
    for (name, data) in files {
        writer.add_file(name, data.to_vec(), 0)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn patch_u32(data: &mut [u8], offset: u64, value: u32) {
    let offset = offset as usize;
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[traced_test]
#[test]
fn corrupt_chunk_does_not_stop_extraction() -> Result<()> {
    let broken = [0xFFu8; 5];
    let mut data = build(&[
        ("game/broken.bin", &broken),
        ("game/good.txt", b"still readable"),
    ])?;

    // flag the first chunk as a bit-level stream it cannot be
    let header = L7cHeader::read(&mut Cursor::new(&data))?;
    patch_u32(&mut data, header.chunk_table_offset(), 0x8100_0000 | broken.len() as u32);

    let mut l7c = L7cArchive::new(Cursor::new(data))?;
    let mut extracted = Vec::new();
    for i in 0..l7c.len() {
        let mut file = l7c.by_index(i)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        extracted.push((file.name().to_owned(), buffer, file.integrity().clone()));
    }

    assert_eq!(extracted.len(), 2);
    assert_eq!(extracted[0].1, broken.to_vec());
    assert_eq!(extracted[0].2.failed_chunks, 1);
    assert!(!extracted[0].2.is_ok());

    assert_eq!(extracted[1].0, "game/good.txt");
    assert_eq!(extracted[1].1, b"still readable".to_vec());
    assert!(extracted[1].2.is_ok());

    assert!(logs_contain("unable to decompress chunk"));

    Ok(())
}

#[traced_test]
#[test]
fn crc_mismatch_is_reported() -> Result<()> {
    let mut data = build(&[("a/b.txt", b"payload")])?;
    data[0x200] ^= 0xFF;

    let mut l7c = L7cArchive::new(Cursor::new(data))?;
    let file = l7c.by_index(0)?;
    assert!(!file.integrity().crc_matches());
    assert!(file.integrity().size_matches());
    assert!(logs_contain("invalid CRC32"));

    Ok(())
}

#[traced_test]
#[test]
fn unsupported_version_is_read_anyway() -> Result<()> {
    let mut data = build(&[("a/b.txt", b"payload")])?;
    patch_u32(&mut data, 4, VERSION + 1);

    let mut l7c = L7cArchive::new(Cursor::new(data))?;
    assert_eq!(l7c.by_index(0)?.into_data(), b"payload".to_vec());
    assert!(logs_contain("unsupported archive version"));

    Ok(())
}

#[test]
fn bad_magic_is_fatal() {
    let data = vec![0u8; 0x400];
    assert!(matches!(
        L7cArchive::new(Cursor::new(data)),
        Err(Error::InvalidMagic)
    ));
}

#[test]
fn oversized_string_table_is_rejected() -> Result<()> {
    let mut data = build(&[("a/b.txt", b"payload")])?;
    let len = data.len() as u32;
    patch_u32(&mut data, 0x28, len + 1);

    assert!(matches!(
        L7cArchive::new(Cursor::new(data)),
        Err(Error::InvalidArchive(_))
    ));

    Ok(())
}

#[traced_test]
#[test]
fn bad_string_offset_only_loses_one_name() -> Result<()> {
    let mut data = build(&[("a/one.txt", b"one"), ("b/two.txt", b"two")])?;

    // entries are: a, a/one.txt, b, b/two.txt
    let header = L7cHeader::read(&mut Cursor::new(&data))?;
    let filename_offset = header.metadata_offset as u64 + FILESYSTEM_ENTRY_SIZE as u64 + 12;
    patch_u32(&mut data, filename_offset, 0x7777);

    let mut l7c = L7cArchive::new(Cursor::new(data))?;
    assert_eq!(l7c.len(), 2);
    assert_eq!(l7c.name_for_index(0), Some("__unnamed/00000000.bin"));

    let unnamed = l7c.by_index(0)?;
    assert!(!unnamed.integrity().hash_matches);
    assert!(unnamed.integrity().crc_matches());
    assert_eq!(unnamed.into_data(), b"one".to_vec());

    let intact = l7c.by_name("b/two.txt")?;
    assert!(intact.integrity().is_ok());
    assert_eq!(intact.into_data(), b"two".to_vec());

    assert!(logs_contain("string table has no entry at offset 30583"));

    Ok(())
}
