use clap::Args;
use flowctl::{progress_handle, ErrorCode};
use serde_json::Value;
use std::path::PathBuf;

use crate::commands::{CmdResult, ConnectArgs};

#[derive(Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Project name
    pub project: String,

    /// Archive to upload
    pub archive: PathBuf,

    /// Create the project first if it does not exist
    #[arg(long)]
    pub create: bool,

    /// Description used when creating the project
    #[arg(long, default_value = "")]
    pub description: String,
}

pub fn run(args: UploadArgs) -> CmdResult<Value> {
    let mut session = args.connect.session()?;

    if args.create {
        match session.create_project(&args.project, &args.description) {
            Ok(_) => {}
            // An existing project is fine when --create was asked for.
            Err(err)
                if err.code == ErrorCode::ServerApplicationError
                    && err.message.contains("already exists") => {}
            Err(err) => return Err(err),
        }
    }

    let mut last_percent = 0u64;
    let progress = progress_handle(move |sent, total, _| {
        if total == 0 {
            return;
        }
        let percent = sent * 100 / total;
        if percent >= last_percent + 10 {
            last_percent = percent;
            flowctl::log_status!("upload", "{}% ({}/{} bytes)", percent, sent, total);
        }
    });

    let value = session.upload_archive(&args.project, &args.archive, Some(progress))?;
    Ok((value, 0))
}
