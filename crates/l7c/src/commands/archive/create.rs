use clap::{Args, ValueEnum};
use l7c_archive::{
    types::to_filetime,
    write::{ChunkMode, L7cWriterOptions},
    L7cWriter,
};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::commands::create_output;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Store chunks as they are
    #[default]
    Stored,
    /// Wrap chunks in literal-only byte-level streams
    ByteLz,
}

impl From<Mode> for ChunkMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Stored => ChunkMode::Stored,
            Mode::ByteLz => ChunkMode::ByteLz,
        }
    }
}

#[derive(Args)]
pub struct CreateArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target L7CA file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// How chunks are written
    #[arg(short, long, value_enum, default_value_t = Mode::default())]
    mode: Mode,

    /// Largest chunk, in bytes
    #[arg(long, default_value_t = l7c_archive::types::MAX_CHUNK_SIZE)]
    chunk_size: u32,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl CreateArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let root = self
            .directory
            .canonicalize()
            .into_diagnostic()
            .context(format!("path: {}", self.directory.display()))?;
        let base = root.parent().unwrap_or(&root).to_path_buf();

        let entries = walk(&root);

        if !entries.iter().any(|e| !e.file_type().is_dir()) {
            return Err(miette!("directory is empty"));
        }

        let out = create_output(&self.file, self.overwrite)?;
        let mut l7c = L7cWriter::new(
            BufWriter::new(out),
            L7cWriterOptions::builder()
                .chunk_mode(self.mode.into())
                .max_chunk_size(self.chunk_size)
                .build(),
        );

        for entry in entries {
            let name = entry.path().strip_prefix(&base).into_diagnostic()?;
            let name = name
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?
                .replace('\\', "/");

            let modified = entry
                .metadata()
                .into_diagnostic()
                .and_then(|m| m.modified().into_diagnostic())
                .context(format!("reading metadata of {}", entry.path().display()))?;
            let timestamp = to_filetime(modified);

            if entry.file_type().is_dir() {
                debug!("adding directory {name}");
                l7c.add_directory(&name, timestamp)?;
                continue;
            }

            info!("packing {name}");
            let data = std::fs::read(entry.path())
                .into_diagnostic()
                .context(format!("opening {}", entry.path().display()))?;
            l7c.add_file(&name, data, timestamp)
                .context(format!("adding entry for {name}"))?;
        }

        l7c.finish()
            .context("finalizing l7ca file")?
            .flush()
            .into_diagnostic()?;

        Ok(())
    }
}

/// Every readable entry under `root`, siblings sorted by name. Unreadable entries are skipped
/// with a warning.
fn walk(root: &Path) -> Vec<DirEntry> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::fs;
    use tracing_test::traced_test;

    use super::walk;

    #[test]
    fn walk_is_sorted() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("b"))?;
        fs::write(root.join("c.txt"), b"c")?;
        fs::write(root.join("a.txt"), b"a")?;
        fs::write(root.join("b/inner.txt"), b"inner")?;

        let names = walk(&root)
            .iter()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["root", "a.txt", "b", "inner.txt", "c.txt"]);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn walk_warns_on_unreadable_entries() -> std::io::Result<()> {
        let temp = tempfile::tempdir()?;

        assert!(walk(&temp.path().join("missing")).is_empty());
        assert!(logs_contain("skipping unreadable entry"));

        Ok(())
    }
}
