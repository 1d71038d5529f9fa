use clap::Args;
use l7c_archive::codec::byte_lz;
use miette::{Context, IntoDiagnostic, Result};
use std::{io::Write, path::PathBuf};
use tracing::info;

use crate::commands::create_output;

#[derive(Args)]
pub struct DecompressArgs {
    /// A size-prefixed compressed file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Where to write the decoded bytes
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl DecompressArgs {
    pub fn handle(&self) -> Result<()> {
        let framed = std::fs::read(&self.input)
            .into_diagnostic()
            .context(format!("path: {}", self.input.display()))?;

        let unframed = byte_lz::decompress_framed(&framed)
            .context(format!("decoding {}", self.input.display()))?;
        info!(
            declared = unframed.declared_size,
            decoded = unframed.data.len(),
            "writing {}",
            self.output.display()
        );

        create_output(&self.output, self.overwrite)?
            .write_all(&unframed.data)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))
    }
}
