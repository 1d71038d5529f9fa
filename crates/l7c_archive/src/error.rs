//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file does not start with the L7CA magic
    #[error("file is not an L7CA archive")]
    #[diagnostic(code(l7c::format::magic))]
    InvalidMagic,

    /// archive declares a version other than 0x00010000
    #[error("unsupported archive version {version:#010x}")]
    #[diagnostic(
        code(l7c::format::version),
        help("extraction is attempted anyway but may produce garbage")
    )]
    UnsupportedVersion {
        /// version field read from the header
        version: u32,
    },

    /// archive declares a section count other than 5
    #[error("unsupported section count {sections}")]
    #[diagnostic(
        code(l7c::format::sections),
        help("extraction is attempted anyway but may produce garbage")
    )]
    UnsupportedSectionCount {
        /// section count read from the header
        sections: u32,
    },

    /// metadata tables are inconsistent with each other
    #[error("file is an invalid l7ca archive: {0}")]
    InvalidArchive(String),

    /// a codec ran past the end of its input
    #[error("compressed stream ended unexpectedly")]
    #[diagnostic(code(l7c::codec::eof))]
    UnexpectedEndOfInput,

    /// a back-reference points before the start of the decoded history
    #[error("back-reference of {back} bytes with only {available} bytes of history")]
    #[diagnostic(code(l7c::codec::back_reference))]
    BackReferenceOutOfRange {
        /// distance requested by the token
        back: usize,
        /// bytes decoded so far
        available: usize,
    },

    /// a prefix tree in the bitstream is deeper than any valid code
    #[error("prefix tree exceeds {0} levels")]
    #[diagnostic(code(l7c::codec::tree))]
    InvalidPrefixTree(usize),

    /// a token consumed no input, so the stream can never reach its end token
    #[error("token at bit {0} consumes no input and repeats forever")]
    #[diagnostic(code(l7c::codec::no_progress))]
    NoProgress(u64),

    /// chunk is flagged compressed with a mode byte no codec handles
    #[error("unknown compression mode {0:#04x}")]
    #[diagnostic(code(l7c::codec::mode))]
    UnknownCompressionMode(u8),

    /// no string starts at the given string table offset
    #[error("string table has no entry at offset {0}")]
    MissingString(u32),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

impl Error {
    /// Whether this error describes a malformed compressed stream rather than an I/O or
    /// container problem.
    pub fn is_codec_failure(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEndOfInput
                | Error::BackReferenceOutOfRange { .. }
                | Error::InvalidPrefixTree(_)
                | Error::NoProgress(_)
                | Error::UnknownCompressionMode(_)
        )
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
