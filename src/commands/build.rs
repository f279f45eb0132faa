use clap::Args;
use flowctl::utils::format::human_size;
use flowctl::{build_archive, log_status, Error};
use serde::Serialize;
use std::path::PathBuf;

use crate::commands::CmdResult;

#[derive(Args)]
pub struct BuildArgs {
    /// Job directory (or single file) to pack
    pub source: PathBuf,

    /// Output archive path (defaults to <source>.zip in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing archive
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct BuildOutput {
    pub path: String,
    pub files: usize,
    pub bytes: u64,
    pub size: String,
}

pub fn run(args: BuildArgs) -> CmdResult<BuildOutput> {
    let output = match args.output {
        Some(path) => path,
        None => {
            let name = args
                .source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    Error::validation_invalid_argument(
                        "source",
                        "cannot derive an archive name from this path",
                        None,
                    )
                })?;
            PathBuf::from(format!("{}.zip", name))
        }
    };

    let summary = build_archive(&args.source, &output, args.force)?;
    log_status!(
        "build",
        "Packed {} file(s) ({}) into {}",
        summary.files,
        human_size(summary.bytes),
        summary.path.display()
    );

    Ok((
        BuildOutput {
            path: summary.path.display().to_string(),
            files: summary.files,
            bytes: summary.bytes,
            size: human_size(summary.bytes),
        },
        0,
    ))
}
