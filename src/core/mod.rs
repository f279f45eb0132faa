pub mod address;
pub mod archive;
pub mod error;
pub mod execution;
pub mod options;
pub mod paths;
pub mod session;
pub mod store;
pub mod transport;
pub mod upload;

pub use address::{parse_url, resolve, resolve_alias, ResolvedAddress};
pub use archive::{build_archive, ArchiveSummary};
pub use error::{Error, ErrorCode, Hint, Result};
pub use execution::{Execution, LogTail};
pub use options::{
    build_run_params, validate_job_lists, Concurrency, EmailOverrides, FailureAction, RunOptions,
};
pub use session::{
    extract_json, ExecutionStatus, JobNode, LogChunk, PasswordPrompt, Session, SessionOptions,
};
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use transport::{HttpTransport, Method, Transport, UploadBody, WireRequest, WireResponse};
pub use upload::{progress_handle, MultipartForm, ProgressHandle};
