use clap::Args;
use flowctl::log_status;
use serde::Serialize;

use crate::commands::{CmdResult, ConnectArgs, RunOptionArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Project name
    pub project: String,

    /// Flow name
    pub flow: String,

    #[command(flatten)]
    pub options: RunOptionArgs,
}

#[derive(Serialize)]
pub struct RunOutput {
    pub exec_id: u64,
    pub url: String,
}

pub fn run(args: RunArgs) -> CmdResult<RunOutput> {
    let options = args.options.to_options()?;
    let mut session = args.connect.session()?;

    let exec_id = session.run_flow(&args.project, &args.flow, &options)?;
    let url = session.execution(exec_id).url();
    log_status!("run", "Started execution {} ({})", exec_id, url);

    Ok((RunOutput { exec_id, url }, 0))
}
