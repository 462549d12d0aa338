//! Remote execution boundary.
//!
//! Remote staging needs exactly two primitives from a connection to the
//! provider host: run a command and fail on non-zero exit, and push a file.
//! [`SessionManager`] hands out one [`RemoteSession`] per host.
//!
//! The default [`SshManager`] drives the OpenSSH client tools through a
//! [`CommandRunner`], so connection multiplexing, keys and host aliases come
//! from the user's ssh configuration.

use async_trait::async_trait;
use bench_core::{BenchError, BenchResult, CommandRunner, ProcessRunner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A connection to one remote host.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Host this session talks to.
    fn host(&self) -> &str;

    /// Run `command` through the remote shell; returns stdout lines.
    ///
    /// Fails with `BenchError::CommandFailed` on non-zero exit.
    async fn run_check(&self, command: &str) -> BenchResult<Vec<String>>;

    /// Copy `local` to `remote` on the host.
    async fn put_file(&self, local: &Path, remote: &Path) -> BenchResult<()>;
}

/// Opens (or reuses) sessions by host name.
pub trait SessionManager: Send + Sync {
    /// Session for `host`.
    fn open(&self, host: &str) -> BenchResult<Arc<dyn RemoteSession>>;
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// =============================================================================
// OpenSSH implementation
// =============================================================================

/// Tool names and options for the OpenSSH client.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// `ssh` binary
    pub ssh: String,
    /// `scp` binary
    pub scp: String,
    /// Extra `-o`/flag arguments passed to both tools
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            ssh: "ssh".to_string(),
            scp: "scp".to_string(),
            options: Vec::new(),
        }
    }
}

/// [`SessionManager`] backed by the OpenSSH command-line client.
pub struct SshManager {
    config: SshConfig,
    runner: Arc<dyn CommandRunner>,
    sessions: Mutex<HashMap<String, Arc<SshSession>>>,
}

impl SshManager {
    /// Manager spawning real `ssh`/`scp` processes.
    pub fn new(config: SshConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Manager using a custom command runner.
    pub fn with_runner(config: SshConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl SessionManager for SshManager {
    fn open(&self, host: &str) -> BenchResult<Arc<dyn RemoteSession>> {
        if host.is_empty() {
            return Err(BenchError::Configuration(
                "cannot open a remote session without a host".to_string(),
            ));
        }

        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(host.to_string())
            .or_insert_with(|| {
                tracing::debug!(host, "opening ssh session");
                Arc::new(SshSession {
                    host: host.to_string(),
                    config: self.config.clone(),
                    runner: self.runner.clone(),
                })
            })
            .clone();
        Ok(session)
    }
}

/// One host reached through `ssh`/`scp`.
pub struct SshSession {
    host: String,
    config: SshConfig,
    runner: Arc<dyn CommandRunner>,
}

impl SshSession {
    fn base_args(&self, tool: &str) -> Vec<String> {
        let mut argv = vec![tool.to_string()];
        argv.extend(self.config.options.iter().cloned());
        argv.push("-o".to_string());
        argv.push("BatchMode=yes".to_string());
        argv
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn run_check(&self, command: &str) -> BenchResult<Vec<String>> {
        let mut argv = self.base_args(&self.config.ssh);
        argv.push(self.host.clone());
        argv.push("--".to_string());
        argv.push(command.to_string());

        let stdout = self.runner.check_output(&argv).await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    async fn put_file(&self, local: &Path, remote: &Path) -> BenchResult<()> {
        let mut argv = self.base_args(&self.config.scp);
        argv.push("-q".to_string());
        argv.push(local.display().to_string());
        argv.push(format!("{}:{}", self.host, remote.display()));

        self.runner.check_output(&argv).await?;
        Ok(())
    }
}
