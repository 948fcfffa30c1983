use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::DuplexConfig;
use crate::error::{Error, Result};
use crate::location::{quote, ProjectLocation};
use crate::remote::RemoteExecutor;
use crate::util::run_captured;

/// Runs the version-control binary inside a project location.
///
/// Returns raw stdout; callers trim what they need. Porcelain output depends
/// on leading columns, so nothing is trimmed here.
#[async_trait]
pub trait VcsRunner: Send + Sync {
    async fn run(&self, location: &ProjectLocation, args: &[&str]) -> Result<String>;
}

pub struct GitRunner {
    binary: String,
    max_output_bytes: usize,
    remote: Arc<dyn RemoteExecutor>,
}

impl GitRunner {
    pub fn new(binary: impl Into<String>, max_output_bytes: usize, remote: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            binary: binary.into(),
            max_output_bytes,
            remote,
        }
    }

    pub fn from_config(config: &DuplexConfig, remote: Arc<dyn RemoteExecutor>) -> Self {
        Self::new(config.vcs_binary.clone(), config.max_local_output_bytes, remote)
    }
}

/// `cd <dir> && <binary> <args...>` with every argument quoted.
pub fn remote_command(binary: &str, dir: &str, args: &[&str]) -> String {
    let quoted: Vec<String> = args.iter().map(|arg| quote(arg)).collect();
    format!("cd {} && {} {}", quote(dir), binary, quoted.join(" "))
}

#[async_trait]
impl VcsRunner for GitRunner {
    async fn run(&self, location: &ProjectLocation, args: &[&str]) -> Result<String> {
        match location {
            ProjectLocation::Local { path } => {
                debug!(cwd = %path.display(), args = ?args, "git");
                let mut cmd = Command::new(&self.binary);
                cmd.args(args).current_dir(path);

                let output = run_captured(cmd, self.max_output_bytes).await?;
                if !output.status.success() {
                    return Err(Error::Git {
                        command: args.join(" "),
                        message: output.diagnostic(),
                    });
                }
                Ok(output.stdout)
            }
            ProjectLocation::Remote { host, remote_path } => {
                let command = remote_command(&self.binary, remote_path, args);
                self.remote.run_raw(host, &command).await
            }
        }
    }
}
