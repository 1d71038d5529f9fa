//! The string table holding every directory path and file name in an archive.
//!
//! Strings are stored back to back, each prefixed by a one byte length. A string is
//! referred to by the offset of its length byte from the start of the table.

use byteorder::ReadBytesExt;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::io::Read;
use tracing::warn;

use crate::error::{Error, Result};

/// Longest string a one byte length prefix can describe
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Strings of a parsed archive, keyed by offset
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    strings: HashMap<u32, Box<str>>,
}

impl StringTable {
    /// Parse a whole table, reading until `reader` is exhausted.
    pub fn read<R: Read>(reader: R, size: u32) -> Result<Self> {
        let mut reader = reader.take(size as u64);
        let mut strings = HashMap::new();
        let mut offset = 0u32;

        loop {
            let len = match reader.read_u8() {
                Ok(len) => len,
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            };

            let mut raw = vec![0u8; len as usize];
            if let Err(err) = reader.read_exact(&mut raw) {
                warn!(offset, "string table ends inside a string");
                return match err.kind() {
                    std::io::ErrorKind::UnexpectedEof => Ok(Self { strings }),
                    _ => Err(err.into()),
                };
            }

            strings.insert(offset, String::from_utf8_lossy(&raw).into());
            offset += 1 + len as u32;
        }

        Ok(Self { strings })
    }

    /// The string starting at `offset`
    pub fn get(&self, offset: u32) -> Result<&str> {
        self.strings
            .get(&offset)
            .map(AsRef::as_ref)
            .ok_or(Error::MissingString(offset))
    }

    /// Number of strings in the table
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table holds no strings
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a string table, storing every distinct string once
#[derive(Debug, Default, Clone)]
pub struct StringTableBuilder {
    offsets: IndexMap<String, u32>,
    data: Vec<u8>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `value`, appending it if it has not been stored yet.
    pub fn intern(&mut self, value: &str) -> Result<u32> {
        if let Some(offset) = self.offsets.get(value) {
            return Ok(*offset);
        }

        let bytes = value.as_bytes();
        if bytes.len() > MAX_STRING_LEN {
            return Err(Error::CustomError(format!(
                "'{value}' is longer than {MAX_STRING_LEN} bytes"
            )));
        }

        let offset = self.data.len() as u32;
        self.data.push(bytes.len() as u8);
        self.data.extend_from_slice(bytes);
        self.offsets.insert(value.to_owned(), offset);

        Ok(offset)
    }

    /// Number of distinct strings stored so far
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no strings have been stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The serialized table
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
