//! Execution options and their wire encoding.
//!
//! `RunOptions` is the typed surface; `build_run_params` validates it
//! against the flow's job graph and flattens it into the form parameters
//! the server expects. All validation happens before any request that
//! could mutate server state.

use crate::error::{Error, Result};
use crate::utils::json;
use serde_json::Value;
use std::collections::BTreeSet;

/// What the server should do with the rest of the flow when a job fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureAction {
    /// Let already-running jobs finish, start nothing new.
    #[default]
    FinishCurrent,
    /// Keep running every job whose dependencies still succeed.
    FinishPossible,
    /// Kill all running jobs immediately.
    CancelImmediately,
}

impl FailureAction {
    pub fn parse(input: &str) -> Result<Self> {
        match input {
            "finish" | "finishCurrent" | "finish-current" => Ok(Self::FinishCurrent),
            "finishPossible" | "finish-possible" => Ok(Self::FinishPossible),
            "cancel" | "cancelImmediately" | "cancel-immediately" => Ok(Self::CancelImmediately),
            other => Err(Error::validation_invalid_argument(
                "on_failure",
                format!("unknown failure action '{}'", other),
                Some(vec![
                    "finish".into(),
                    "finishPossible".into(),
                    "cancel".into(),
                ]),
            )),
        }
    }

    pub fn wire(&self) -> &'static str {
        match self {
            Self::FinishCurrent => "finishCurrent",
            Self::FinishPossible => "finishPossible",
            Self::CancelImmediately => "cancelImmediately",
        }
    }
}

/// How a new execution interacts with an already-running one of the same flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Run regardless of other executions.
    #[default]
    Concurrent,
    /// Refuse to start while another execution is running.
    SkipIfRunning,
    /// Run pipelined behind the other execution at the given level.
    Pipeline(Option<u8>),
}

impl Concurrency {
    /// Mode for a plain concurrent-or-not flag.
    pub fn from_flag(concurrent: bool) -> Self {
        if concurrent {
            Self::Concurrent
        } else {
            Self::SkipIfRunning
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        match input {
            "concurrent" => Ok(Self::Concurrent),
            "skip" => Ok(Self::SkipIfRunning),
            "pipeline" => Ok(Self::Pipeline(None)),
            other => {
                if let Some(level) = other.strip_prefix("pipeline:") {
                    match level {
                        "1" => Ok(Self::Pipeline(Some(1))),
                        "2" => Ok(Self::Pipeline(Some(2))),
                        bad => Err(Error::validation_invalid_argument(
                            "concurrency",
                            format!("pipeline level must be 1 or 2, got '{}'", bad),
                            None,
                        )),
                    }
                } else {
                    Err(Error::validation_invalid_argument(
                        "concurrency",
                        format!("unknown concurrency mode '{}'", other),
                        Some(vec![
                            "concurrent".into(),
                            "skip".into(),
                            "pipeline[:1|2]".into(),
                        ]),
                    ))
                }
            }
        }
    }

    pub fn wire(&self) -> &'static str {
        match self {
            Self::Concurrent => "concurrent",
            Self::SkipIfRunning => "skip",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

/// Notification address overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailOverrides {
    pub failure: Vec<String>,
    pub success: Vec<String>,
}

impl EmailOverrides {
    /// One list notified on both outcomes.
    pub fn same(emails: Vec<String>) -> Self {
        Self {
            failure: emails.clone(),
            success: emails,
        }
    }

    /// Independent failure and success lists.
    pub fn split(failure: Vec<String>, success: Vec<String>) -> Self {
        Self { failure, success }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only these jobs (and implicitly disable the rest). Mutually
    /// exclusive with `exclude_jobs`.
    pub include_jobs: Vec<String>,
    /// Disable exactly these jobs.
    pub exclude_jobs: Vec<String>,
    pub concurrency: Concurrency,
    pub on_failure: FailureAction,
    /// Notify failure addresses on the first failed job rather than at
    /// flow completion.
    pub notify_early: bool,
    /// Nested property overrides, dot-flattened into `flowOverride[...]`.
    pub properties: Option<Value>,
    pub emails: Option<EmailOverrides>,
}

/// Reject option combinations that are wrong independent of the job
/// graph, so callers can check before fetching it.
pub fn validate_job_lists(options: &RunOptions) -> Result<()> {
    if !options.include_jobs.is_empty() && !options.exclude_jobs.is_empty() {
        return Err(Error::validation_invalid_argument(
            "jobs",
            "include and exclude job lists are mutually exclusive",
            None,
        ));
    }
    Ok(())
}

/// Validate options against the flow's job graph and encode them as form
/// parameters. `graph` is only consulted (and only required) when
/// `include_jobs` is non-empty.
pub fn build_run_params(
    flow: &str,
    options: &RunOptions,
    graph: Option<&BTreeSet<String>>,
) -> Result<Vec<(String, String)>> {
    validate_job_lists(options)?;

    let mut params: Vec<(String, String)> = Vec::new();

    let disabled: Vec<String> = if !options.include_jobs.is_empty() {
        let graph = graph.ok_or_else(|| {
            Error::internal_unexpected("job graph required to validate an include list")
        })?;
        let missing: Vec<String> = options
            .include_jobs
            .iter()
            .filter(|job| !graph.contains(*job))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            return Err(Error::unknown_jobs(flow, missing));
        }
        let included: BTreeSet<&String> = options.include_jobs.iter().collect();
        graph
            .iter()
            .filter(|job| !included.contains(job))
            .cloned()
            .collect()
    } else {
        let mut excluded: Vec<String> = options.exclude_jobs.clone();
        excluded.sort();
        excluded.dedup();
        excluded
    };
    if !disabled.is_empty() {
        let encoded = serde_json::to_string(&disabled)
            .map_err(|e| Error::internal_json(e.to_string(), Some("encode disabled jobs".into())))?;
        params.push(("disabled".into(), encoded));
    }

    params.push(("concurrentOption".into(), options.concurrency.wire().into()));
    if let Concurrency::Pipeline(Some(level)) = options.concurrency {
        params.push(("pipelineLevel".into(), level.to_string()));
    }
    params.push(("failureAction".into(), options.on_failure.wire().into()));
    params.push((
        "notifyFailureFirst".into(),
        options.notify_early.to_string(),
    ));

    if let Some(properties) = &options.properties {
        // BTreeMap keeps override parameters in a stable order.
        for (key, value) in json::flatten(properties, ".") {
            params.push((format!("flowOverride[{}]", key), json::leaf_to_string(&value)));
        }
    }

    if let Some(emails) = &options.emails {
        params.push((
            "failureEmailsOverride".into(),
            (!emails.failure.is_empty()).to_string(),
        ));
        params.push((
            "successEmailsOverride".into(),
            (!emails.success.is_empty()).to_string(),
        ));
        if !emails.failure.is_empty() {
            params.push(("failureEmails".into(), emails.failure.join(",")));
        }
        if !emails.success.is_empty() {
            params.push(("successEmails".into(), emails.success.join(",")));
        }
    }

    Ok(params)
}
