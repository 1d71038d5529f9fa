pub mod create;
pub mod extract;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// Extract an L7CA file into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into an L7CA file
    Create(create::CreateArgs),
}

impl ArchiveCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArchiveCommands::Extract(extract) => extract.handle(),
            ArchiveCommands::Create(create) => create.handle(),
        }
    }
}
