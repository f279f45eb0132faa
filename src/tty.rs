//! Terminal I/O utilities for the CLI.
//!
//! Provides TTY detection and user prompting.

use flowctl::PasswordPrompt;
use std::io::{self, BufRead, IsTerminal, Write};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn prompt(message: &str) -> flowctl::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        flowctl::Error::internal_io(
            format!("Failed to read input: {}", e),
            Some("stdin".to_string()),
        )
    })?;

    Ok(line.trim().to_string())
}

/// Interactive password source. Refuses to prompt when stdin is not a
/// terminal, so piped invocations fail fast instead of hanging on a read.
pub struct TtyPrompt;

impl PasswordPrompt for TtyPrompt {
    fn password(&mut self, label: &str) -> flowctl::Result<String> {
        if !is_stdin_tty() {
            return Err(flowctl::Error::auth_login_failed(label)
                .with_hint("Not a terminal; pass the password with --password"));
        }
        prompt(&format!("Password for {}: ", label))
    }
}

// Status logging goes through flowctl::log_status! (#[macro_export]ed by the library).
