use clap::Args;
use flowctl::Error;
use std::io::{self, Write};
use std::time::Duration;

use crate::commands::ConnectArgs;

#[derive(Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Execution id
    pub execution: u64,

    /// Tail one job's logs instead of the whole flow
    #[arg(short, long)]
    pub job: Option<String>,

    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

/// Streams log lines straight to stdout; no JSON envelope.
pub fn run(args: LogArgs) -> flowctl::Result<i32> {
    let mut session = args.connect.session()?;
    let mut execution = session.execution(args.execution);
    let delay = Duration::from_secs(args.interval);

    let tail = match &args.job {
        Some(job) => execution.job_logs(job, delay),
        None => execution.logs(delay),
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for line in tail {
        let line = line?;
        if let Err(e) = writeln!(handle, "{}", line) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                return Ok(0); // Exit gracefully on SIGPIPE
            }
            return Err(Error::internal_io(
                e.to_string(),
                Some("write stdout".to_string()),
            ));
        }
    }
    Ok(0)
}
