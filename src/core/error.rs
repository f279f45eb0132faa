use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AddressMalformed,
    AddressInvalidScheme,
    AliasNotFound,

    AuthLoginFailed,
    AuthTooManyAttempts,

    ServerUnavailable,
    ServerApplicationError,
    ServerInvalidResponse,

    FlowNotFound,
    FlowUnknownJobs,

    ExecutionNotRunning,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    ConfigInvalidJson,

    InternalIoError,
    InternalJsonError,
    InternalHttpError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AddressMalformed => "address.malformed",
            ErrorCode::AddressInvalidScheme => "address.invalid_scheme",
            ErrorCode::AliasNotFound => "alias.not_found",

            ErrorCode::AuthLoginFailed => "auth.login_failed",
            ErrorCode::AuthTooManyAttempts => "auth.too_many_attempts",

            ErrorCode::ServerUnavailable => "server.unavailable",
            ErrorCode::ServerApplicationError => "server.application_error",
            ErrorCode::ServerInvalidResponse => "server.invalid_response",

            ErrorCode::FlowNotFound => "flow.not_found",
            ErrorCode::FlowUnknownJobs => "flow.unknown_jobs",

            ErrorCode::ExecutionNotRunning => "execution.not_running",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ConfigInvalidJson => "config.invalid_json",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalHttpError => "internal.http_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddressDetails {
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheme: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginDetails {
    session: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnknownJobsDetails {
    flow: String,
    jobs: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvalidArgumentDetails {
    field: String,
    problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InternalDetails {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn details_value<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn address_malformed(input: impl Into<String>) -> Self {
        let input = input.into();
        Self::new(
            ErrorCode::AddressMalformed,
            format!("Malformed server address: '{}'", input),
            details_value(AddressDetails {
                input,
                scheme: None,
            }),
        )
        .with_hint("Expected [user[:password]@]http://host:port")
    }

    pub fn address_invalid_scheme(scheme: impl Into<String>, input: impl Into<String>) -> Self {
        let scheme = scheme.into();
        Self::new(
            ErrorCode::AddressInvalidScheme,
            format!("Unsupported scheme '{}'", scheme),
            details_value(AddressDetails {
                input: input.into(),
                scheme: Some(scheme),
            }),
        )
        .with_hint("Only http and https are supported")
    }

    pub fn alias_not_found(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(
            ErrorCode::AliasNotFound,
            format!("Alias '{}' not found", alias),
            serde_json::json!({ "alias": alias }),
        )
        .with_hint("Add an 'alias.<name>' entry to credentials.json or pass --url")
    }

    pub fn auth_login_failed(session: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::AuthLoginFailed,
            "Login failed: incorrect credentials",
            details_value(LoginDetails {
                session: session.into(),
                attempts: None,
            }),
        )
    }

    pub fn auth_too_many_attempts(session: impl Into<String>, attempts: u32) -> Self {
        Self::new(
            ErrorCode::AuthTooManyAttempts,
            "Too many unsuccessful login attempts",
            details_value(LoginDetails {
                session: session.into(),
                attempts: Some(attempts),
            }),
        )
    }

    pub fn server_unavailable(url: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ServerUnavailable,
            "Server rejected a freshly refreshed session",
            serde_json::json!({ "url": url.into() }),
        )
        .with_hint("The session was just renewed; this points at a server-side problem")
    }

    pub fn application_error(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ServerApplicationError,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn invalid_response(context: impl Into<String>, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        Self::new(
            ErrorCode::ServerInvalidResponse,
            format!(
                "Unexpected server response while trying to {}",
                context.into()
            ),
            serde_json::json!({ "body": snippet }),
        )
    }

    pub fn flow_not_found(flow: impl Into<String>) -> Self {
        let flow = flow.into();
        Self::new(
            ErrorCode::FlowNotFound,
            format!("Flow '{}' not found", flow),
            serde_json::json!({ "flow": flow }),
        )
    }

    pub fn unknown_jobs(flow: impl Into<String>, jobs: Vec<String>) -> Self {
        let flow = flow.into();
        Self::new(
            ErrorCode::FlowUnknownJobs,
            format!("Jobs not found in flow '{}': {}", flow, jobs.join(", ")),
            details_value(UnknownJobsDetails { flow, jobs }),
        )
    }

    pub fn execution_not_running(exec_id: u64) -> Self {
        Self::new(
            ErrorCode::ExecutionNotRunning,
            format!("Execution {} is not running", exec_id),
            serde_json::json!({ "execId": exec_id }),
        )
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            serde_json::json!({ "args": args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details_value(InvalidArgumentDetails {
                field: field.into(),
                problem: problem.into(),
                tried,
            }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in credentials file",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            details_value(InternalDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            details_value(InternalDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_http(error: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalHttpError,
            "HTTP request failed",
            details_value(InternalDetails {
                error: error.into(),
                context: Some(url.into()),
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
