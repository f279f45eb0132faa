//! Authenticated server session and the remote operations built on it.
//!
//! A `Session` owns the resolved address, the current token, the credential
//! store the token is cached in, and the transport requests go through.
//! Expired tokens are detected from response bodies and refreshed
//! transparently: a request whose body trips an invalid-session marker is
//! retried exactly once after a relogin.

use crate::error::{Error, ErrorCode, Result};
use crate::options::{build_run_params, validate_job_lists, RunOptions};
use crate::store::{session_key, CredentialStore};
use crate::transport::{HttpTransport, Transport, WireRequest, WireResponse};
use crate::upload::{MultipartForm, ProgressHandle};
use crate::utils::format::human_size;
use crate::ResolvedAddress;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "azkaban.browser.session.id";

/// Form field carrying the session token where the server wants it inline.
pub const SESSION_FIELD: &str = "session.id";

/// Default bytes per log fetch.
pub const DEFAULT_LOG_CHUNK: u64 = 50_000;

/// Body fragments that mark a response as "your session is invalid".
/// The server answers expired sessions with a login page or a session
/// error blob rather than an HTTP status.
pub const DEFAULT_INVALID_SESSION_MARKERS: [&str; 3] =
    ["<!-- /.login -->", "Login error", "\"error\" : \"session\""];

const INCORRECT_LOGIN_MARKER: &str = "Incorrect Login";

/// Source of passwords for interactive refresh.
pub trait PasswordPrompt {
    fn password(&mut self, label: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Login attempts before giving up.
    pub max_attempts: u32,
    pub verify_tls: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            verify_tls: true,
        }
    }
}

pub struct Session {
    address: ResolvedAddress,
    token: String,
    store: Box<dyn CredentialStore>,
    transport: Box<dyn Transport>,
    prompt: Option<Box<dyn PasswordPrompt>>,
    max_attempts: u32,
    invalid_markers: Vec<String>,
}

impl Session {
    /// Connect over HTTP(S), picking up any token cached for this
    /// `user@address` pair. No request is sent yet.
    pub fn connect(
        address: ResolvedAddress,
        store: Box<dyn CredentialStore>,
        options: SessionOptions,
    ) -> Result<Self> {
        let transport = Box::new(HttpTransport::new(options.verify_tls)?);
        Self::with_transport(address, store, transport, options.max_attempts)
    }

    /// Build a session over an explicit transport.
    pub fn with_transport(
        address: ResolvedAddress,
        store: Box<dyn CredentialStore>,
        transport: Box<dyn Transport>,
        max_attempts: u32,
    ) -> Result<Self> {
        let token = store
            .get(&session_key(&address.user, &address.url))?
            .unwrap_or_default();
        Ok(Self {
            address,
            token,
            store,
            transport,
            prompt: None,
            max_attempts,
            invalid_markers: DEFAULT_INVALID_SESSION_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        })
    }

    pub fn url(&self) -> &str {
        &self.address.url
    }

    pub fn user(&self) -> &str {
        &self.address.user
    }

    /// `user@address`, as shown in prompts and error details.
    pub fn label(&self) -> String {
        self.address.label()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn set_prompt(&mut self, prompt: Box<dyn PasswordPrompt>) {
        self.prompt = Some(prompt);
    }

    /// Override the invalid-session markers, for servers with customized
    /// login pages.
    pub fn set_invalid_markers(&mut self, markers: Vec<String>) {
        self.invalid_markers = markers;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.address.url, path)
    }

    /// Does this response body look like a rejected session?
    pub fn body_invalid(&self, body: &str) -> bool {
        self.invalid_markers.iter().any(|m| body.contains(m))
    }

    /// Probe whether the current token is still accepted, without
    /// triggering a refresh. With an already-fetched body, only marker
    /// scanning happens; otherwise a lightweight authenticated GET is sent.
    pub fn is_valid(&self, probe: Option<&str>) -> Result<bool> {
        if self.token.is_empty() {
            return Ok(false);
        }
        if let Some(body) = probe {
            return Ok(!self.body_invalid(body));
        }
        let response = self.transport.execute(
            WireRequest::get(self.endpoint("manager"))
                .cookie(SESSION_COOKIE, &self.token),
        )?;
        Ok((200..300).contains(&response.status) && !self.body_invalid(&response.body))
    }

    /// Authenticate with one password. Incorrect credentials come back as
    /// `auth.login_failed`; everything else is fatal.
    pub fn login(&mut self, password: &str) -> Result<()> {
        let response = self.transport.execute(
            WireRequest::post(&self.address.url)
                .form("action", "login")
                .form("username", &self.address.user)
                .form("password", password),
        )?;
        if response.body.contains(INCORRECT_LOGIN_MARKER) {
            return Err(Error::auth_login_failed(self.label()));
        }
        let value = extract_json(&response.body, "log in")?;
        let token = value
            .get(SESSION_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_response("log in", &response.body))?
            .to_string();
        self.store
            .set(&session_key(&self.address.user, &self.address.url), &token)?;
        self.token = token;
        Ok(())
    }

    /// Obtain a fresh token: try the supplied password, then the one
    /// embedded in the address, then prompt interactively. Only incorrect
    /// credentials consume an attempt.
    pub fn refresh(&mut self, password: Option<&str>) -> Result<()> {
        let mut pending: Option<String> = password
            .map(str::to_string)
            .or_else(|| self.address.password.clone());
        let mut attempts = self.max_attempts;
        while attempts > 0 {
            let pw = match pending.take() {
                Some(pw) => pw,
                None => match &mut self.prompt {
                    Some(prompt) => prompt.password(&self.address.label())?,
                    None => {
                        return Err(Error::auth_login_failed(self.address.label()).with_hint(
                            "No password available; pass one explicitly or run interactively",
                        ))
                    }
                },
            };
            match self.login(&pw) {
                Ok(()) => return Ok(()),
                Err(err) if err.code == ErrorCode::AuthLoginFailed => {
                    attempts -= 1;
                    if self.prompt.is_none() {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::auth_too_many_attempts(
            self.address.label(),
            self.max_attempts,
        ))
    }

    /// Send a request built against the current token, refreshing and
    /// retrying once if the server rejects the session. The builder is
    /// called again for the retry so single-use bodies can be rebuilt.
    pub fn request_with<F>(&mut self, mut build: F) -> Result<WireResponse>
    where
        F: FnMut(&str) -> Result<WireRequest>,
    {
        if self.token.is_empty() {
            // No cached token; a first send would be wasted.
            self.refresh(None)?;
            let response = self.transport.execute(build(&self.token)?)?;
            if self.body_invalid(&response.body) {
                return Err(Error::server_unavailable(&self.address.url));
            }
            return Ok(response);
        }

        let response = self.transport.execute(build(&self.token)?)?;
        if !self.body_invalid(&response.body) {
            return Ok(response);
        }
        self.refresh(None)?;
        let retried = self.transport.execute(build(&self.token)?)?;
        if self.body_invalid(&retried.body) {
            return Err(Error::server_unavailable(&self.address.url));
        }
        Ok(retried)
    }

    /// `request_with` plus JSON decoding and application-error detection.
    pub fn request_json_with<F>(&mut self, context: &str, build: F) -> Result<Value>
    where
        F: FnMut(&str) -> Result<WireRequest>,
    {
        let response = self.request_with(build)?;
        extract_json(&response.body, context)
    }

    /// Create an empty project.
    pub fn create_project(&mut self, name: &str, description: &str) -> Result<Value> {
        let url = self.endpoint("manager");
        self.request_json_with("create the project", move |token| {
            Ok(WireRequest::post(&url)
                .cookie(SESSION_COOKIE, token)
                .form("action", "create")
                .form("name", name)
                .form("description", description))
        })
    }

    /// Delete a project and everything under it. The server answers with
    /// an HTML page, so success is detected from its confirmation banner.
    pub fn delete_project(&mut self, name: &str) -> Result<()> {
        let url = self.endpoint("manager");
        let response = self.request_with(move |token| {
            Ok(WireRequest::get(&url)
                .cookie(SESSION_COOKIE, token)
                .query("project", name)
                .query("delete", "true"))
        })?;
        if response.body.contains("was successfully deleted") {
            Ok(())
        } else {
            Err(Error::application_error(format!(
                "Project '{}' was not deleted",
                name
            )))
        }
    }

    /// Names of every job in a flow. A non-JSON answer means the server
    /// fell back to an HTML page, i.e. the flow does not exist.
    pub fn flow_jobs(&mut self, project: &str, flow: &str) -> Result<BTreeSet<String>> {
        let url = self.endpoint("manager");
        let response = self.request_with(move |token| {
            Ok(WireRequest::get(&url)
                .cookie(SESSION_COOKIE, token)
                .query("ajax", "fetchflowjobs")
                .query("project", project)
                .query("flow", flow))
        })?;
        let value: Value = serde_json::from_str(&response.body)
            .map_err(|_| Error::flow_not_found(flow))?;
        check_application_error(&value)?;
        let nodes = value
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::invalid_response("list flow jobs", &response.body))?;
        Ok(nodes
            .iter()
            .filter_map(|n| n.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Validate options and encode them as form parameters, fetching the
    /// job graph only when an include list needs checking against it.
    /// Everything that can fail does so before any request that could
    /// mutate server state.
    fn run_params(
        &mut self,
        project: &str,
        flow: &str,
        options: &RunOptions,
    ) -> Result<Vec<(String, String)>> {
        validate_job_lists(options)?;
        let graph = if options.include_jobs.is_empty() {
            None
        } else {
            Some(self.flow_jobs(project, flow)?)
        };
        build_run_params(flow, options, graph.as_ref())
    }

    /// Start an execution and return its id.
    pub fn run_flow(&mut self, project: &str, flow: &str, options: &RunOptions) -> Result<u64> {
        let params = self.run_params(project, flow, options)?;

        let url = self.endpoint("executor");
        let value = self.request_json_with("start the execution", move |token| {
            let mut request = WireRequest::post(&url)
                .cookie(SESSION_COOKIE, token)
                .form("ajax", "executeFlow")
                .form(SESSION_FIELD, token)
                .form("project", project)
                .form("flow", flow);
            for (key, val) in &params {
                request = request.form(key.clone(), val.clone());
            }
            Ok(request)
        })?;
        parse_exec_id(&value)
            .ok_or_else(|| Error::invalid_response("start the execution", &value.to_string()))
    }

    /// Register a cron schedule for a flow. Options get the same
    /// validation and encoding as an immediate run.
    pub fn schedule_flow(
        &mut self,
        project: &str,
        flow: &str,
        cron: &str,
        options: &RunOptions,
    ) -> Result<Value> {
        let params = self.run_params(project, flow, options)?;
        let url = self.endpoint("schedule");
        self.request_json_with("schedule the flow", move |token| {
            let mut request = WireRequest::post(&url)
                .cookie(SESSION_COOKIE, token)
                .form("ajax", "scheduleCronFlow")
                .form(SESSION_FIELD, token)
                .form("projectName", project)
                .form("cronExpression", cron)
                .form("flow", flow);
            for (key, val) in &params {
                request = request.form(key.clone(), val.clone());
            }
            Ok(request)
        })
    }

    /// Upload a project archive. The body streams from disk; on a session
    /// retry the whole form is rebuilt from the path.
    pub fn upload_archive(
        &mut self,
        project: &str,
        path: &Path,
        progress: Option<ProgressHandle>,
    ) -> Result<Value> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(path.display().to_string()))
                .with_hint("Build the archive first")
        })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("archive.zip")
            .to_string();
        crate::log_status!(
            "upload",
            "Uploading {} ({}) to project '{}'",
            filename,
            human_size(metadata.len()),
            project
        );

        let url = self.endpoint("manager");
        self.request_json_with("upload the archive", move |token| {
            let body = MultipartForm::new()
                .param("ajax", "upload")
                .param(SESSION_FIELD, token)
                .param("project", project)
                .file("file", path, &filename, "application/zip")?
                .into_body(progress.clone())?;
            Ok(WireRequest::post(&url)
                .cookie(SESSION_COOKIE, token)
                .upload(body))
        })
    }

    /// Fetch the status of an execution and its job nodes.
    pub fn execution_status(&mut self, exec_id: u64) -> Result<ExecutionStatus> {
        let url = self.endpoint("executor");
        let value = self.request_json_with("fetch the execution status", move |token| {
            Ok(WireRequest::get(&url)
                .cookie(SESSION_COOKIE, token)
                .query("ajax", "fetchexecflow")
                .query("execid", exec_id.to_string()))
        })?;
        serde_json::from_value(value)
            .map_err(|e| Error::internal_json(e.to_string(), Some("decode execution status".into())))
    }

    /// Fetch one chunk of flow-level logs.
    pub fn execution_logs(&mut self, exec_id: u64, offset: u64, length: u64) -> Result<LogChunk> {
        let url = self.endpoint("executor");
        let value = self.request_json_with("fetch execution logs", move |token| {
            Ok(WireRequest::get(&url)
                .cookie(SESSION_COOKIE, token)
                .query("ajax", "fetchexeclogs")
                .query("execid", exec_id.to_string())
                .query("offset", offset.to_string())
                .query("length", length.to_string()))
        })?;
        serde_json::from_value(value)
            .map_err(|e| Error::internal_json(e.to_string(), Some("decode log chunk".into())))
    }

    /// Fetch one chunk of a single job's logs.
    pub fn execution_job_logs(
        &mut self,
        exec_id: u64,
        job: &str,
        offset: u64,
        length: u64,
    ) -> Result<LogChunk> {
        let url = self.endpoint("executor");
        let value = self.request_json_with("fetch job logs", move |token| {
            Ok(WireRequest::get(&url)
                .cookie(SESSION_COOKIE, token)
                .query("ajax", "fetchExecJobLogs")
                .query("execid", exec_id.to_string())
                .query("jobId", job)
                .query("offset", offset.to_string())
                .query("length", length.to_string()))
        })?;
        serde_json::from_value(value)
            .map_err(|e| Error::internal_json(e.to_string(), Some("decode log chunk".into())))
    }

    /// Cancel a running execution. The server reports "not running" as an
    /// error key, which is mapped to its own code here.
    pub fn cancel_execution(&mut self, exec_id: u64) -> Result<()> {
        let url = self.endpoint("executor");
        let response = self.request_with(move |token| {
            Ok(WireRequest::get(&url)
                .cookie(SESSION_COOKIE, token)
                .query("ajax", "cancelFlow")
                .query("execid", exec_id.to_string()))
        })?;
        if let Ok(value) = serde_json::from_str::<Value>(&response.body) {
            if value.get("error").is_some() {
                return Err(Error::execution_not_running(exec_id));
            }
        }
        Ok(())
    }
}

/// Parse a response body as JSON and surface server-reported failures.
/// An `error` key or `status == "error"` becomes `server.application_error`
/// with the server's message verbatim.
pub fn extract_json(body: &str, context: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| Error::invalid_response(context, body))?;
    check_application_error(&value)?;
    Ok(value)
}

fn check_application_error(value: &Value) -> Result<()> {
    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(Error::application_error(message));
    }
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Server reported an error");
        return Err(Error::application_error(message));
    }
    Ok(())
}

fn parse_exec_id(value: &Value) -> Option<u64> {
    match value.get("execid")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Status of one job node within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNode {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Status of a whole execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub nodes: Vec<JobNode>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ExecutionStatus {
    pub fn node(&self, job: &str) -> Option<&JobNode> {
        self.nodes.iter().find(|n| n.id == job)
    }
}

/// One fetched slice of a log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogChunk {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_passes_clean_payloads() {
        let value = extract_json(r#"{"execid": 42}"#, "test").unwrap();
        assert_eq!(value["execid"], 42);
    }

    #[test]
    fn extract_json_surfaces_error_key_verbatim() {
        let err = extract_json(r#"{"error": "Project already exists"}"#, "test").unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerApplicationError);
        assert_eq!(err.message, "Project already exists");
    }

    #[test]
    fn extract_json_surfaces_error_status() {
        let err =
            extract_json(r#"{"status": "error", "message": "bad cron"}"#, "test").unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerApplicationError);
        assert_eq!(err.message, "bad cron");
    }

    #[test]
    fn extract_json_rejects_html() {
        let err = extract_json("<html><body>login</body></html>", "probe").unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerInvalidResponse);
    }

    #[test]
    fn exec_id_parses_both_encodings() {
        assert_eq!(parse_exec_id(&serde_json::json!({"execid": 7})), Some(7));
        assert_eq!(parse_exec_id(&serde_json::json!({"execid": "7"})), Some(7));
        assert_eq!(parse_exec_id(&serde_json::json!({"other": 7})), None);
    }
}
