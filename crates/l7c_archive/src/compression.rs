//! Chunk codec selection and per-file decode sessions.

use std::fmt;
use tracing::{debug, instrument, warn};

use crate::codec::{byte_lz, tree_lz, Window};
use crate::error::{Error, Result};
use crate::types::ChunkEntry;

/// Identifies the codec used to compress a chunk, the high byte of [`ChunkEntry::info`]
///
/// When creating archives, [`crate::write::L7cWriterOptions::chunk_mode`] chooses between
/// storing chunks as they are and [`CompressionMode::ByteLz`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionMode {
    /// Byte oriented back-references
    ByteLz = 0x80,

    /// Bit oriented with prefix trees and a circular window
    TreeLz = 0x81,
}

impl TryFrom<u8> for CompressionMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x80 => Ok(CompressionMode::ByteLz),
            0x81 => Ok(CompressionMode::TreeLz),
            other => Err(Error::UnknownCompressionMode(other)),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMode::ByteLz => write!(f, "byte-lz"),
            CompressionMode::TreeLz => write!(f, "tree-lz"),
        }
    }
}

/// How one chunk ended up in the output
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Stored bytes were appended as they are
    Stored,

    /// The codec decoded the chunk
    Decoded(CompressionMode),

    /// The codec failed and the stored bytes were appended instead
    Fallback(Error),
}

/// The decoded contents of one file and what happened to each of its chunks
#[derive(Debug, Default)]
pub struct DecodedFile {
    /// Every chunk's output, in order
    pub data: Vec<u8>,

    /// One outcome per chunk
    pub outcomes: Vec<ChunkOutcome>,
}

impl DecodedFile {
    /// Number of chunks whose stored bytes stand in for their decoded contents
    pub fn failed_chunks(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ChunkOutcome::Fallback(_)))
            .count()
    }
}

/// State shared by the chunks of one file
///
/// Holds the bit-level codec's window, so a session must be created for each file and
/// dropped afterwards.
#[derive(Debug, Default)]
pub struct DecodeSession {
    window: Window,
}

impl DecodeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, appending to `output` whose contents are the earlier chunks' output.
    ///
    /// A codec failure discards whatever the codec appended, appends `stored` instead and is
    /// reported as [`ChunkOutcome::Fallback`].
    pub fn decode_chunk(
        &mut self,
        chunk: &ChunkEntry,
        stored: &[u8],
        output: &mut Vec<u8>,
    ) -> ChunkOutcome {
        let Some(mode) = chunk.mode() else {
            output.extend_from_slice(stored);
            return ChunkOutcome::Stored;
        };

        let start = output.len();
        let result = mode.and_then(|mode| {
            match mode {
                CompressionMode::ByteLz => byte_lz::decompress_into(stored, output)?,
                CompressionMode::TreeLz => {
                    tree_lz::decompress_into(stored, &mut self.window, output)?
                }
            }
            Ok(mode)
        });

        match result {
            Ok(mode) => {
                debug!(
                    sequence = chunk.sequence,
                    %mode,
                    stored = stored.len(),
                    decoded = output.len() - start,
                    "decoded chunk"
                );
                ChunkOutcome::Decoded(mode)
            }
            Err(err) => {
                warn!(
                    sequence = chunk.sequence,
                    mode = chunk.mode_byte(),
                    error = %err,
                    "unable to decompress chunk, keeping stored bytes"
                );
                output.truncate(start);
                output.extend_from_slice(stored);
                ChunkOutcome::Fallback(err)
            }
        }
    }

    /// Walk a file's chunk run over its stored payload.
    ///
    /// Chunks claiming more bytes than the payload has left get what remains.
    #[instrument(skip_all, fields(chunks = chunks.len(), payload = payload.len()))]
    pub fn decode_file(&mut self, chunks: &[ChunkEntry], payload: &[u8]) -> DecodedFile {
        let mut decoded = DecodedFile {
            data: Vec::with_capacity(payload.len()),
            outcomes: Vec::with_capacity(chunks.len()),
        };

        let mut remaining = payload;
        for chunk in chunks {
            let len = chunk.stored_len();
            if len > remaining.len() {
                warn!(
                    sequence = chunk.sequence,
                    wanted = len,
                    available = remaining.len(),
                    "chunk runs past the end of the payload"
                );
            }
            let (stored, rest) = remaining.split_at(len.min(remaining.len()));
            remaining = rest;

            let outcome = self.decode_chunk(chunk, stored, &mut decoded.data);
            decoded.outcomes.push(outcome);
        }

        decoded
    }
}

/// Decode one file's chunks with a fresh [`DecodeSession`].
pub fn decode_file(chunks: &[ChunkEntry], payload: &[u8]) -> DecodedFile {
    DecodeSession::new().decode_file(chunks, payload)
}
