use clap::Args;
use serde_json::Value;

use crate::commands::{CmdResult, ConnectArgs, RunOptionArgs};

#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Project name
    pub project: String,

    /// Flow name
    pub flow: String,

    /// Cron expression (server-side time zone)
    pub cron: String,

    #[command(flatten)]
    pub options: RunOptionArgs,
}

pub fn run(args: ScheduleArgs) -> CmdResult<Value> {
    let options = args.options.to_options()?;
    let mut session = args.connect.session()?;
    let value = session.schedule_flow(&args.project, &args.flow, &args.cron, &options)?;
    Ok((value, 0))
}
