//! LSB-first bit source shared by the bit-level codec and its prefix trees.

use bitstream_io::{BitRead, BitReader, LittleEndian};
use std::io::{self, Cursor};

use crate::error::{Error, Result};

/// Reads single bits and little-endian bit fields from an in-memory buffer
pub struct BitSource<'a> {
    inner: BitReader<Cursor<&'a [u8]>, LittleEndian>,
    consumed: u64,
}

impl<'a> BitSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: BitReader::endian(Cursor::new(data), LittleEndian),
            consumed: 0,
        }
    }

    /// Read one bit, `0` or `1`.
    pub fn read_bit(&mut self) -> Result<u8> {
        let bit = self.inner.read_bit().map(u8::from).map_err(map_eof)?;
        self.consumed += 1;
        Ok(bit)
    }

    /// Read an unsigned field of `count` bits, first bit read is the least significant.
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        if count == 0 {
            return Ok(0);
        }
        let value = self.inner.read::<u32>(count).map_err(map_eof)?;
        self.consumed += count as u64;
        Ok(value)
    }

    /// Number of bits read so far
    pub fn position(&self) -> u64 {
        self.consumed
    }
}

fn map_eof(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::UnexpectedEndOfInput,
        _ => Error::IOError(err),
    }
}
