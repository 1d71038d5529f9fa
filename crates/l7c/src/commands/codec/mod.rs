pub mod compress;
pub mod decompress;

#[derive(clap::Subcommand)]
pub enum CodecCommands {
    /// Decode a size-prefixed byte-level stream
    Decompress(decompress::DecompressArgs),
    /// Encode a file as a size-prefixed byte-level stream
    Compress(compress::CompressArgs),
}

impl CodecCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            CodecCommands::Decompress(decompress) => decompress.handle(),
            CodecCommands::Compress(compress) => compress.handle(),
        }
    }
}
