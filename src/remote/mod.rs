//! One-shot command execution on a remote host over the remote-shell transport.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::DuplexConfig;
use crate::error::{Error, Result};
use crate::util::run_captured;

/// Runs a shell command string on a host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Raw stdout, leading whitespace intact (porcelain output is column-based).
    async fn run_raw(&self, host: &str, command: &str) -> Result<String>;

    /// Trimmed stdout.
    async fn run(&self, host: &str, command: &str) -> Result<String> {
        Ok(self.run_raw(host, command).await?.trim().to_string())
    }
}

/// Executor backed by the `ssh` client: `ssh <host> sh -lc <command>`.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    transport: String,
    remote_shell: String,
    max_output_bytes: usize,
}

impl SshExecutor {
    pub fn new(transport: impl Into<String>, remote_shell: impl Into<String>, max_output_bytes: usize) -> Self {
        Self {
            transport: transport.into(),
            remote_shell: remote_shell.into(),
            max_output_bytes,
        }
    }

    pub fn from_config(config: &DuplexConfig) -> Self {
        Self::new(
            config.transport.clone(),
            config.remote_shell.clone(),
            config.max_remote_output_bytes,
        )
    }

    fn command(&self, host: &str, command: &str) -> Command {
        let mut cmd = Command::new(&self.transport);
        cmd.arg(host).arg(&self.remote_shell).arg("-lc").arg(command);
        cmd
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run_raw(&self, host: &str, command: &str) -> Result<String> {
        debug!(host = %host, transport = %self.transport, "running remote command");

        let output = match run_captured(self.command(host, command), self.max_output_bytes).await {
            Ok(output) => output,
            Err(Error::Io(message)) => {
                return Err(Error::RemoteExecution {
                    host: host.to_string(),
                    status: None,
                    message: format!("failed to launch {}: {}", self.transport, message),
                });
            }
            Err(err) => return Err(err),
        };

        if !output.status.success() {
            let message = output.diagnostic();
            warn!(host = %host, status = ?output.status.code(), error = %message, "remote command failed");
            return Err(Error::RemoteExecution {
                host: host.to_string(),
                status: output.status.code(),
                message,
            });
        }

        Ok(output.stdout)
    }
}
