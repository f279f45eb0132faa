use clap::Args;
use flowctl::Error;
use serde_json::{json, Value};

use crate::commands::{CmdResult, ConnectArgs};

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Project name (list the jobs of PROJECT FLOW)
    #[arg(requires = "flow")]
    pub project: Option<String>,

    /// Flow name
    pub flow: Option<String>,

    /// Execution id to inspect
    #[arg(short, long, conflicts_with_all = ["project", "flow"])]
    pub execution: Option<u64>,

    /// Cancel the execution instead of reporting its status
    #[arg(long, requires = "execution")]
    pub cancel: bool,
}

pub fn run(args: InfoArgs) -> CmdResult<Value> {
    let mut session = args.connect.session()?;

    if let Some(exec_id) = args.execution {
        if args.cancel {
            session.cancel_execution(exec_id)?;
            return Ok((json!({ "execId": exec_id, "cancelled": true }), 0));
        }
        let status = session.execution_status(exec_id)?;
        let value = serde_json::to_value(status).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize execution status".into()))
        })?;
        return Ok((value, 0));
    }

    match (&args.project, &args.flow) {
        (Some(project), Some(flow)) => {
            let jobs: Vec<String> = session.flow_jobs(project, flow)?.into_iter().collect();
            Ok((
                json!({ "project": project, "flow": flow, "jobs": jobs }),
                0,
            ))
        }
        _ => Err(Error::validation_missing_argument(vec![
            "project".into(),
            "flow".into(),
        ])
        .with_hint("Pass PROJECT FLOW to list jobs, or --execution <id> for run status")),
    }
}
