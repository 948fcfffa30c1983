use std::fs;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Atomically write content to a file.
///
/// Writes to a temporary file first, then renames to the target path.
/// This ensures the file is never in a partially-written state.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Output of a finished non-interactive subprocess.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Trimmed stderr, or trimmed stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Run a command to completion with stdin closed, capturing at most `limit`
/// bytes on each of stdout and stderr.
///
/// Exceeding the limit kills the child and fails with
/// [`Error::OutputLimitExceeded`]; output is never silently truncated.
pub async fn run_captured(mut command: Command, limit: usize) -> Result<CapturedOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Io("child stdout was not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Io("child stderr was not captured".into()))?;

    let read = tokio::try_join!(read_bounded(stdout, limit), read_bounded(stderr, limit));
    let (stdout, stderr) = match read {
        Ok(streams) => streams,
        Err(err) => {
            let _ = child.kill().await;
            return Err(err);
        }
    };

    let status = child.wait().await?;
    Ok(CapturedOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
    })
}

async fn read_bounded<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if collected.len() + n > limit {
            return Err(Error::OutputLimitExceeded { limit });
        }
        collected.extend_from_slice(&chunk[..n]);
    }
    Ok(collected)
}
