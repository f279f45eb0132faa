//! Handle on a single execution: status, cancellation, and log tailing.

use crate::error::Result;
use crate::session::{ExecutionStatus, Session, DEFAULT_LOG_CHUNK};
use std::collections::VecDeque;
use std::time::Duration;

/// Flow statuses under which more log output may still arrive.
pub const RUNNING_FLOW_STATUSES: [&str; 3] = ["PREPARING", "RUNNING", "PAUSED"];

/// Job statuses under which the job's log stream may not exist yet, so a
/// failed log fetch is not fatal.
pub const PREPARING_JOB_STATUSES: [&str; 3] = ["READY", "PREPARING", "QUEUED"];

pub struct Execution<'s> {
    session: &'s mut Session,
    exec_id: u64,
}

impl Session {
    pub fn execution(&mut self, exec_id: u64) -> Execution<'_> {
        Execution {
            session: self,
            exec_id,
        }
    }
}

impl<'s> Execution<'s> {
    pub fn id(&self) -> u64 {
        self.exec_id
    }

    /// Web UI page for this execution.
    pub fn url(&self) -> String {
        format!("{}/executor?execid={}", self.session.url(), self.exec_id)
    }

    pub fn status(&mut self) -> Result<ExecutionStatus> {
        self.session.execution_status(self.exec_id)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.session.cancel_execution(self.exec_id)
    }

    /// Tail the flow-level logs until the execution stops producing them.
    pub fn logs(&mut self, poll_delay: Duration) -> LogTail<'_> {
        LogTail::new(self.session, self.exec_id, None, poll_delay)
    }

    /// Tail one job's logs. Fetch failures are tolerated while the job is
    /// still queued, since its log stream may not exist yet.
    pub fn job_logs(&mut self, job: &str, poll_delay: Duration) -> LogTail<'_> {
        LogTail::new(self.session, self.exec_id, Some(job.to_string()), poll_delay)
    }
}

/// Iterator over log lines of a (possibly still running) execution.
///
/// Each poll sleeps, then fetches the next chunk at the current offset.
/// A non-empty chunk advances the offset by the server-reported length and
/// yields its lines. An empty chunk means the stream is drained: if the
/// execution is no longer running the tail ends, otherwise it keeps
/// polling for more output.
pub struct LogTail<'s> {
    session: &'s mut Session,
    exec_id: u64,
    job: Option<String>,
    poll_delay: Duration,
    chunk_size: u64,
    offset: u64,
    finishing: bool,
    done: bool,
    pending: VecDeque<String>,
}

impl<'s> LogTail<'s> {
    fn new(
        session: &'s mut Session,
        exec_id: u64,
        job: Option<String>,
        poll_delay: Duration,
    ) -> Self {
        Self {
            session,
            exec_id,
            job,
            poll_delay,
            chunk_size: DEFAULT_LOG_CHUNK,
            offset: 0,
            finishing: false,
            done: false,
            pending: VecDeque::new(),
        }
    }

    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    fn job_status(&mut self) -> Result<Option<String>> {
        let job = self.job.clone().unwrap_or_default();
        let status = self.session.execution_status(self.exec_id)?;
        Ok(status.node(&job).map(|n| n.status.clone()))
    }

    /// Can the stream still grow?
    fn still_running(&mut self) -> Result<bool> {
        match self.job.clone() {
            Some(_) => Ok(self.job_status()?.as_deref() == Some("RUNNING")),
            None => {
                let status = self.session.execution_status(self.exec_id)?;
                Ok(RUNNING_FLOW_STATUSES.contains(&status.status.as_str()))
            }
        }
    }

    fn poll(&mut self) -> Result<bool> {
        std::thread::sleep(self.poll_delay);

        let chunk = match &self.job {
            Some(job) => {
                let job = job.clone();
                match self
                    .session
                    .execution_job_logs(self.exec_id, &job, self.offset, self.chunk_size)
                {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        // The job may simply not have started yet.
                        let status = self.job_status()?;
                        let preparing = status
                            .as_deref()
                            .map(|s| PREPARING_JOB_STATUSES.contains(&s))
                            .unwrap_or(false);
                        if preparing {
                            return Ok(true);
                        }
                        return Err(err);
                    }
                }
            }
            None => self
                .session
                .execution_logs(self.exec_id, self.offset, self.chunk_size)?,
        };

        if chunk.length > 0 {
            self.offset += chunk.length;
            for line in chunk.data.split('\n') {
                if !line.trim().is_empty() {
                    self.pending.push_back(line.to_string());
                }
            }
            return Ok(true);
        }

        if self.finishing {
            return Ok(false);
        }
        self.finishing = !self.still_running()?;
        Ok(!self.finishing)
    }
}

impl Iterator for LogTail<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.done {
                return None;
            }
            match self.poll() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
