use clap::Args;
use l7c_archive::codec::byte_lz;
use miette::{Context, IntoDiagnostic, Result};
use std::{io::Write, path::PathBuf};
use tracing::info;

use crate::commands::create_output;

#[derive(Args)]
pub struct CompressArgs {
    /// A file to encode
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Where to write the size-prefixed stream
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl CompressArgs {
    pub fn handle(&self) -> Result<()> {
        let data = std::fs::read(&self.input)
            .into_diagnostic()
            .context(format!("path: {}", self.input.display()))?;

        let framed = byte_lz::compress_framed(&data)?;
        info!(
            raw = data.len(),
            stored = framed.len(),
            "writing {}",
            self.output.display()
        );

        create_output(&self.output, self.overwrite)?
            .write_all(&framed)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))
    }
}
