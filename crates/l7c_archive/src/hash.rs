//! Checksums used by the archive tables.

use crc::{Crc, CRC_32_BZIP2, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const NAMCO: Crc<u32> = Crc::<u32>::new(&CRC_32_BZIP2);

/// Standard CRC-32 over raw bytes, as stored in each [`crate::types::FileEntry`].
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Hash of a `/` separated path stored in each [`crate::types::FilesystemEntry`]
///
/// Readers only compare against it and report mismatches, so an implementation that does
/// not match the vendor's costs warnings, never data.
pub trait PathHash {
    /// Hash the path exactly as given, without changing its case
    fn hash(&self, path: &[u8]) -> u32;
}

/// The default vendor path hash: the MSB-first CRC-32 variant
#[derive(Debug, Default, Clone, Copy)]
pub struct NamcoHash;

impl PathHash for NamcoHash {
    fn hash(&self, path: &[u8]) -> u32 {
        NAMCO.checksum(path)
    }
}

impl<F: Fn(&[u8]) -> u32> PathHash for F {
    fn hash(&self, path: &[u8]) -> u32 {
        self(path)
    }
}
