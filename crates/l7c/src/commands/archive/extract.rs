use clap::Args;
use l7c_archive::L7cArchive;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::commands::create_output;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input L7CA file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

#[derive(Debug, Default)]
struct Summary {
    extracted: usize,
    warnings: usize,
    skipped: usize,
}

enum Extracted {
    Clean,
    Warned,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let mut l7c = L7cArchive::new(BufReader::new(f))?;

        for directory in l7c.directories() {
            let Some(name) = directory.enclosed_name() else {
                warn!("skipping directory with unsafe name {}", directory.name);
                continue;
            };
            let p = self.directory.join(name);
            std::fs::create_dir_all(&p)
                .into_diagnostic()
                .context(format!("creating {}", p.display()))?;
        }

        let mut summary = Summary::default();
        for i in 0..l7c.len() {
            match self.extract_one(&mut l7c, i) {
                Ok(Extracted::Clean) => summary.extracted += 1,
                Ok(Extracted::Warned) => {
                    summary.extracted += 1;
                    summary.warnings += 1;
                }
                Err(err) => {
                    warn!("{:?}", err.wrap_err(format!("skipping file {i}")));
                    summary.skipped += 1;
                }
            }
        }

        println!(
            "{} {} files, {} with warnings, {} skipped",
            "extracted".if_supports_color(Stdout, |t| t.green()),
            summary.extracted,
            summary
                .warnings
                .if_supports_color(Stdout, |t| t.yellow()),
            summary.skipped.if_supports_color(Stdout, |t| t.red()),
        );

        Ok(())
    }

    fn extract_one<R>(&self, l7c: &mut L7cArchive<R>, index: usize) -> Result<Extracted>
    where
        R: std::io::Read + std::io::Seek,
    {
        let mut file = l7c.by_index(index)?;
        let name = file
            .enclosed_name()
            .ok_or_else(|| miette!("unsafe name {}", file.name()))?;

        let p = self.directory.join(name);
        info!("writing {}", p.display());

        if let Some(parent) = p.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_parent(parent)?;
        }
        let mut out = create_output(&p, self.overwrite)?;
        std::io::copy(&mut file, &mut out)
            .into_diagnostic()
            .context(format!("writing {}", p.display()))?;

        if file.integrity().is_ok() {
            Ok(Extracted::Clean)
        } else {
            Ok(Extracted::Warned)
        }
    }
}

fn create_parent(parent: &Path) -> Result<()> {
    std::fs::create_dir_all(parent)
        .into_diagnostic()
        .context(format!("creating {}", parent.display()))
}
