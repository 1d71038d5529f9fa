//! Byte oriented back-reference codec, compression mode `0x80`.
//!
//! Every token starts with a control byte `c`:
//!
//! | `c`          | Meaning                                                                   |
//! |--------------|---------------------------------------------------------------------------|
//! | `0x00`       | Extended literal run, length in the following one or two bytes            |
//! | `0x01..0x3F` | Literal run of `c` bytes                                                  |
//! | `0x40..0x7F` | Copy `(c >> 4) - 2` bytes from `(c & 0x0F) + 1` back                      |
//! | `0x80..0xBF` | Copy `((c >> 2) & 0x1F) + 3` bytes, distance in 10 bits                   |
//! | `0xC0..0xFF` | Copy `(c - 0xBE) * 2` (+1) bytes, distance in 15 bits                     |
//!
//! An extended literal with both length bytes zero followed by a zero byte, or by the end of
//! the input, terminates the stream.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Longest literal run the encoder emits in one token
pub const MAX_LITERAL_RUN: usize = 0x3F;

/// Low byte of the size word in front of a standalone compressed buffer
pub const FRAME_MARKER: u32 = 0x19;

const FRAME_SHORT_LIMIT: usize = 0x00FF_FFFF;

struct ByteSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteSource<'a> {
    fn next(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.pos).ok_or(Error::UnexpectedEndOfInput)?;
        self.pos += 1;
        Ok(byte)
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::UnexpectedEndOfInput)?;
        let run = &self.data[self.pos..end];
        self.pos = end;
        Ok(run)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Decode `input`, using `prev` as already decoded history.
///
/// The returned buffer starts with a copy of `prev`.
pub fn decompress(input: &[u8], prev: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut output = prev.map(<[u8]>::to_vec).unwrap_or_default();
    decompress_into(input, &mut output)?;
    Ok(output)
}

/// Decode `input`, appending to `output` whose existing contents serve as history for
/// back-references.
///
/// On error `output` may hold a partially decoded tail.
pub fn decompress_into(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut src = ByteSource {
        data: input,
        pos: 0,
    };

    while !src.is_empty() {
        let c = src.next()?;
        match c {
            0x00 => {
                let flag = src.next()? as usize;
                let len = if flag & 0x80 == 0 {
                    let flag2 = src.next()? as usize;
                    if flag == 0 && flag2 == 0 && matches!(src.peek(), None | Some(0)) {
                        trace!(position = src.pos, "end of stream");
                        break;
                    }
                    0xBF + flag2 + (flag << 8)
                } else {
                    0x40 + (flag & 0x7F)
                };
                output.extend_from_slice(src.take(len)?);
            }
            0x01..=0x3F => output.extend_from_slice(src.take(c as usize)?),
            0x40..=0x7F => {
                let len = (c >> 4) as usize - 2;
                let back = (c & 0x0F) as usize + 1;
                copy_back(output, back, len, true)?;
            }
            0x80..=0xBF => {
                let mut len = ((c >> 2) & 0x1F) as usize;
                let back = (((c & 0x3) as usize) << 8) + src.next()? as usize + 1;
                // always set in this range
                if c & 0x80 != 0 {
                    len += 3;
                }
                copy_back(output, back, len, true)?;
            }
            0xC0..=0xFF => {
                let mut len = (c - 0xBE) as usize * 2;
                let flag = src.next()?;
                let back = (((flag & 0x7F) as usize) << 8) + src.next()? as usize + 1;
                if flag & 0x80 != 0 {
                    len += 1;
                }
                copy_back(output, back, len, false)?;
            }
        }
    }

    Ok(())
}

/// Append `len` bytes starting `back` bytes before the current end, one at a time so that
/// copies overlapping their own output repeat the pattern.
fn copy_back(output: &mut Vec<u8>, back: usize, len: usize, clamp: bool) -> Result<()> {
    let end = output.len();
    let start = end.checked_sub(back).ok_or(Error::BackReferenceOutOfRange {
        back,
        available: end,
    })?;

    output.reserve(len);
    for i in 0..len {
        let byte = if clamp && i > end {
            output[end - 1]
        } else {
            output[start + i]
        };
        output.push(byte);
    }

    Ok(())
}

/// Encode `input` as literal runs only, followed by the three byte terminator.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() + input.len() / MAX_LITERAL_RUN + 4);
    for run in input.chunks(MAX_LITERAL_RUN) {
        output.push(run.len() as u8);
        output.extend_from_slice(run);
    }
    output.extend_from_slice(&[0, 0, 0]);
    output
}

/// A standalone buffer decoded from the framed form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unframed {
    /// Size announced by the frame's size word
    pub declared_size: usize,
    /// Decoded contents
    pub data: Vec<u8>,
}

impl Unframed {
    /// Whether the decoded length matches the announced one
    pub fn size_matches(&self) -> bool {
        self.declared_size == self.data.len()
    }
}

/// Decode a standalone buffer: a size word followed by a mode `0x80` stream.
///
/// The word is `(size << 8) | 0x19`, or exactly `0x19` followed by the size as a second
/// word for sizes that do not fit in 24 bits.
pub fn decompress_framed(framed: &[u8]) -> Result<Unframed> {
    let mut reader = framed;
    let word = reader.read_u32::<LittleEndian>()?;
    let declared_size = if word == FRAME_MARKER {
        reader.read_u32::<LittleEndian>()?
    } else {
        (word & 0xFFFF_FF00) >> 8
    } as usize;

    let mut body = Vec::with_capacity(reader.len());
    reader.read_to_end(&mut body)?;

    let data = decompress(&body, None)?;
    let unframed = Unframed {
        declared_size,
        data,
    };
    if !unframed.size_matches() {
        warn!(
            declared = unframed.declared_size,
            actual = unframed.data.len(),
            "decoded size differs from the frame's size word"
        );
    }

    Ok(unframed)
}

/// Encode `input` in the standalone framed form read by [`decompress_framed`].
pub fn compress_framed(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() + input.len() / MAX_LITERAL_RUN + 12);
    if input.len() > FRAME_SHORT_LIMIT {
        output.write_u32::<LittleEndian>(FRAME_MARKER)?;
        let size = u32::try_from(input.len()).map_err(|_| {
            Error::CustomError(format!("{} bytes do not fit a size word", input.len()))
        })?;
        output.write_u32::<LittleEndian>(size)?;
    } else {
        output.write_u32::<LittleEndian>(((input.len() as u32) << 8) | FRAME_MARKER)?;
    }
    output.extend_from_slice(&compress(input));
    Ok(output)
}
