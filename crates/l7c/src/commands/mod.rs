use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, path::Path};

pub mod archive;
pub mod codec;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle L7CA archives
    Archive {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Run the byte-level codec on a single framed file
    Codec {
        #[command(subcommand)]
        command: codec::CodecCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Archive { command } => command.handle(),
            Commands::Codec { command } => command.handle(),
        }
    }
}

/// Create `path`, refusing to replace an existing file unless `overwrite` is set.
pub(crate) fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    }
    .into_diagnostic()
    .context(format!("creating {}", path.display()))
}
