use clap::Args;
use flowctl::{
    Concurrency, EmailOverrides, Error, FailureAction, FileStore, Result, RunOptions, Session,
    SessionOptions,
};

pub type CmdResult<T> = flowctl::Result<(T, i32)>;

pub mod build;
pub mod info;
pub mod log;
pub mod run;
pub mod schedule;
pub mod upload;

/// Server selection shared by every remote command.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Server address ([user[:password]@]http(s)://host:port)
    #[arg(short, long, conflicts_with = "alias")]
    pub url: Option<String>,

    /// Alias name from credentials.json
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Password (prompted interactively when needed and omitted)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

impl ConnectArgs {
    /// Resolve the address and open a session backed by the default
    /// credential store and an interactive password prompt.
    pub fn session(&self) -> Result<Session> {
        let store = FileStore::open_default()?;
        let mut address = match (&self.url, &self.alias) {
            (Some(url), None) => flowctl::parse_url(url)?,
            (None, Some(alias)) => {
                flowctl::parse_url(&flowctl::resolve_alias(&store, alias)?)?
            }
            _ => {
                return Err(Error::validation_missing_argument(vec![
                    "url".into(),
                    "alias".into(),
                ])
                .with_hint("Pass --url or --alias to select a server"))
            }
        };
        if let Some(password) = &self.password {
            address.password = Some(password.clone());
        }

        let mut session = Session::connect(
            address,
            Box::new(store),
            SessionOptions {
                verify_tls: !self.insecure,
                ..SessionOptions::default()
            },
        )?;
        session.set_prompt(Box::new(crate::tty::TtyPrompt));
        Ok(session)
    }
}

/// Execution-option flags shared by `run` and `schedule`.
#[derive(Args, Debug, Default)]
pub struct RunOptionArgs {
    /// Run only this job (repeatable); the rest of the flow is disabled
    #[arg(long = "job", value_name = "JOB")]
    pub jobs: Vec<String>,

    /// Disable this job (repeatable)
    #[arg(long = "skip", value_name = "JOB", conflicts_with = "jobs")]
    pub skip: Vec<String>,

    /// Concurrency mode: concurrent, skip, or pipeline[:1|2]
    #[arg(long, default_value = "concurrent")]
    pub concurrency: String,

    /// Failure action: finish, finishPossible, or cancel
    #[arg(long = "on-failure", default_value = "finish")]
    pub on_failure: String,

    /// Notify failure addresses as soon as the first job fails
    #[arg(long)]
    pub notify_early: bool,

    /// JSON property overrides (nested objects are dot-flattened)
    #[arg(long, value_name = "JSON")]
    pub properties: Option<String>,

    /// Address notified on both success and failure (repeatable)
    #[arg(long = "email", value_name = "ADDR")]
    pub emails: Vec<String>,

    /// Address notified on failure only (repeatable)
    #[arg(long = "failure-email", value_name = "ADDR", conflicts_with = "emails")]
    pub failure_emails: Vec<String>,

    /// Address notified on success only (repeatable)
    #[arg(long = "success-email", value_name = "ADDR", conflicts_with = "emails")]
    pub success_emails: Vec<String>,
}

impl RunOptionArgs {
    pub fn to_options(&self) -> Result<RunOptions> {
        let properties = match &self.properties {
            Some(raw) => Some(serde_json::from_str(raw).map_err(|e| {
                Error::validation_invalid_argument(
                    "properties",
                    format!("invalid JSON: {}", e),
                    None,
                )
            })?),
            None => None,
        };
        let emails = if !self.emails.is_empty() {
            Some(EmailOverrides::same(self.emails.clone()))
        } else if !self.failure_emails.is_empty() || !self.success_emails.is_empty() {
            Some(EmailOverrides::split(
                self.failure_emails.clone(),
                self.success_emails.clone(),
            ))
        } else {
            None
        };
        Ok(RunOptions {
            include_jobs: self.jobs.clone(),
            exclude_jobs: self.skip.clone(),
            concurrency: Concurrency::parse(&self.concurrency)?,
            on_failure: FailureAction::parse(&self.on_failure)?,
            notify_early: self.notify_early,
            properties,
            emails,
        })
    }
}
