use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base flowctl config directory (universal ~/.config/flowctl/ on all platforms)
pub fn flowctl() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows")
        })?;
        Ok(PathBuf::from(appdata).join("flowctl"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected("HOME environment variable not set on Unix-like system")
        })?;
        Ok(PathBuf::from(home).join(".config").join("flowctl"))
    }
}

/// Persisted alias and session-token store
pub fn credentials_json() -> Result<PathBuf> {
    Ok(flowctl()?.join("credentials.json"))
}
