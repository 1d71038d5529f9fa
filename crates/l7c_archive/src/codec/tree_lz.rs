//! Bit oriented codec with inline prefix trees, compression mode `0x81`.
//!
//! A stream starts with an 8-bit filter byte, followed by three serialized
//! [`PrefixTree`]s: literal bytes (8-bit values), token indices (6-bit values) and
//! displacement indices (5-bit values). Tokens are then read until index `0`.
//!
//! - index `0` ends the stream, after running the delta filter if the filter byte is `>= 3`
//! - indices `1..0x20` copy from the window; length and distance come from the tables below
//! - indices `0x20..` are literal runs, each byte decoded through the literal tree

use tracing::trace;

use super::prefix_tree::PrefixTree;
use crate::bits::BitSource;
use crate::error::{Error, Result};

/// Size of the circular history window
pub const WINDOW_SIZE: usize = 0x8000;

const LITERAL_TOKEN: usize = 0x20;

const COUNTERS: [u32; 32] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 0xA, 0xC, 0xE, 0x10, 0x12, 0x16, 0x1A, 0x1E, 0x22, 0x2A, 0x32,
    0x3A, 0x42, 0x52, 0x62, 0x72, 0x82, 0xA2, 0xC2, 0xE2, 0x102, 0, 0,
];

const COUNTER_BIT_READS: [u32; 32] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0, 0,
    0,
];

const DISPLACEMENT_RANGES: [u32; 32] = [
    1, 2, 3, 4, 5, 7, 9, 0xD, 0x11, 0x19, 0x21, 0x31, 0x41, 0x61, 0x81, 0xC1, 0x101, 0x181,
    0x201, 0x301, 0x401, 0x601, 0x801, 0xC01, 0x1001, 0x1801, 0x2001, 0x3001, 0x4001, 0x6001, 0,
    0,
];

const DISPLACEMENT_BIT_READS: [u32; 32] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 0xA, 0xA, 0xB, 0xB, 0xC,
    0xC, 0xD, 0xD, 0, 0,
];

/// Circular history of the most recently decoded bytes
///
/// One window belongs to one file: it carries history from chunk to chunk of that file and
/// must not be reused for another.
#[derive(Clone)]
pub struct Window {
    buffer: Box<[u8]>,
    cursor: usize,
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Window {
    pub fn new() -> Self {
        Self {
            buffer: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.buffer.fill(0);
        self.cursor = 0;
    }

    /// Position the next byte will be written to
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn push(&mut self, byte: u8) {
        self.buffer[self.cursor] = byte;
        self.cursor = (self.cursor + 1) % WINDOW_SIZE;
    }

    /// Copy `count` bytes starting `displacement` bytes back, feeding each copied byte back
    /// into the window before the next one is read.
    fn copy_match(&mut self, displacement: usize, count: usize, output: &mut Vec<u8>) {
        let mut source = self.cursor + WINDOW_SIZE - displacement;
        output.reserve(count);
        for _ in 0..count {
            let byte = self.buffer[source % WINDOW_SIZE];
            source += 1;
            output.push(byte);
            self.push(byte);
        }
    }

    fn literal(&mut self, byte: u8, output: &mut Vec<u8>) {
        output.push(byte);
        self.push(byte);
    }
}

struct Trees {
    literals: PrefixTree,
    indices: PrefixTree,
    displacements: PrefixTree,
}

impl Trees {
    fn read(bits: &mut BitSource<'_>) -> Result<Self> {
        Ok(Self {
            literals: PrefixTree::build(bits, 8)?,
            indices: PrefixTree::build(bits, 6)?,
            displacements: PrefixTree::build(bits, 5)?,
        })
    }
}

fn read_counter(bits: &mut BitSource<'_>, index: usize) -> Result<usize> {
    Ok((COUNTERS[index] + bits.read_bits(COUNTER_BIT_READS[index])?) as usize)
}

fn read_displacement(bits: &mut BitSource<'_>, trees: &Trees) -> Result<usize> {
    let index = trees.displacements.lookup(bits)? as usize;
    Ok((DISPLACEMENT_RANGES[index] + bits.read_bits(DISPLACEMENT_BIT_READS[index])?) as usize)
}

/// Decode `input`, appending to `output`, with `window` holding the history of earlier
/// chunks of the same file.
///
/// Only the bytes appended by this call are touched by the delta filter. On error `output`
/// may hold a partially decoded tail.
pub fn decompress_into(input: &[u8], window: &mut Window, output: &mut Vec<u8>) -> Result<()> {
    let mut bits = BitSource::new(input);
    let filter = bits.read_bits(8)? as u8;
    let trees = Trees::read(&mut bits)?;
    let base = output.len();

    loop {
        let start = bits.position();
        let index = trees.indices.lookup(&mut bits)? as usize;

        if index == 0 {
            if filter >= 3 {
                integrate_delta(&mut output[base..], filter as usize - 2);
            }
            trace!(
                filter,
                produced = output.len() - base,
                cursor = window.cursor(),
                "end of stream"
            );
            return Ok(());
        }

        if index < LITERAL_TOKEN {
            let counter = read_counter(&mut bits, index)?;
            let displacement = read_displacement(&mut bits, &trees)?;
            if counter != 0 {
                window.copy_match(displacement, counter, output);
            }
        } else {
            let counter = read_counter(&mut bits, index - LITERAL_TOKEN)?;
            for _ in 0..counter {
                let byte = trees.literals.lookup(&mut bits)? as u8;
                window.literal(byte, output);
            }
        }

        // the same bits would decode the same token again
        if bits.position() == start {
            return Err(Error::NoProgress(start));
        }
    }
}

/// Decode `input` with a fresh window, using `prev` as already decoded output.
///
/// The returned buffer starts with a copy of `prev`. `prev` is not loaded into the window,
/// so matches cannot reach it; use [`decompress_into`] with a shared [`Window`] for that.
pub fn decompress(input: &[u8], prev: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut output = prev.map(<[u8]>::to_vec).unwrap_or_default();
    decompress_into(input, &mut Window::new(), &mut output)?;
    Ok(output)
}

/// Undo a fixed stride delta encoding in place: each byte gets the byte `stride` before it
/// added, front to back, so sums carry forward.
pub fn integrate_delta(data: &mut [u8], stride: usize) {
    if data.len() <= stride {
        return;
    }
    for position in 0..data.len() - stride {
        data[position + stride] = data[position + stride].wrapping_add(data[position]);
    }
}
