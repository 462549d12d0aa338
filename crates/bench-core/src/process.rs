//! External command boundary.
//!
//! Drivers that control hardware through command-line tools (and the OpenSSH
//! session manager) run them through a [`CommandRunner`], so the exact
//! argument vector can be observed in tests without spawning processes.

use crate::error::{BenchError, BenchResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Runs an argument vector and returns its stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` (program first). Fails with [`BenchError::CommandFailed`]
    /// if the program cannot be started or exits non-zero.
    async fn check_output(&self, argv: &[String]) -> BenchResult<Vec<u8>>;
}

/// [`CommandRunner`] that spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn check_output(&self, argv: &[String]) -> BenchResult<Vec<u8>> {
        let (program, args) = argv.split_first().ok_or_else(|| BenchError::CommandFailed {
            command: String::new(),
            reason: "empty command line".to_string(),
        })?;

        tracing::trace!(command = %format_command(argv), "spawning");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BenchError::CommandFailed {
                command: format_command(argv),
                reason: format!("failed to start: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BenchError::CommandFailed {
                command: format_command(argv),
                reason: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        Ok(output.stdout)
    }
}

/// Render an argument vector for logs and error messages.
pub fn format_command(argv: &[String]) -> String {
    argv.join(" ")
}
