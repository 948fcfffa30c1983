use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use portable_pty::{ChildKiller, CommandBuilder, MasterPty, NativePtySystem, PtySize, PtySystem};
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Everything needed to start one interactive process.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub cols: u16,
    pub rows: u16,
}

/// Control side of a running interactive process.
pub trait PtyProcess: Send + Sync {
    fn write(&self, data: &[u8]) -> Result<()>;
    fn resize(&self, cols: u16, rows: u16) -> Result<()>;
    fn kill(&self) -> Result<()>;
}

/// A started process: its control handle, its output stream and a blocking
/// wait for the exit code. The output stream ends when the process goes away.
pub struct Spawned {
    pub process: std::sync::Arc<dyn PtyProcess>,
    pub output: Box<dyn Read + Send>,
    pub wait: Box<dyn FnOnce() -> i32 + Send>,
}

pub trait ProcessFactory: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> Result<Spawned>;
}

/// Pseudo-terminal processes on the host, via `portable-pty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtyFactory;

struct NativePtyProcess {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

impl ProcessFactory for NativePtyFactory {
    fn spawn(&self, request: &SpawnRequest) -> Result<Spawned> {
        let pty_system = NativePtySystem::default();
        let pair = pty_system
            .openpty(pty_size(request.cols, request.rows))
            .map_err(|e| {
                error!(error = %e, "failed to open PTY");
                Error::Terminal(e.to_string())
            })?;

        let mut cmd = CommandBuilder::new(&request.program);
        cmd.args(&request.args);
        cmd.cwd(&request.cwd);
        cmd.env_clear();
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!(program = %request.program.display(), error = %e, "failed to spawn command");
            Error::Terminal(e.to_string())
        })?;

        // The child holds its own slave handle; ours would keep the stream open
        drop(pair.slave);

        let output = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::Terminal(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::Terminal(e.to_string()))?;
        let killer = child.clone_killer();

        let mut child = child;
        let wait = Box::new(move || match child.wait() {
            Ok(status) => i32::try_from(status.exit_code()).unwrap_or(i32::MAX),
            Err(e) => {
                debug!(error = %e, "wait on child failed");
                -1
            }
        });

        Ok(Spawned {
            process: std::sync::Arc::new(NativePtyProcess {
                master: Mutex::new(pair.master),
                writer: Mutex::new(writer),
                killer: Mutex::new(killer),
            }),
            output,
            wait,
        })
    }
}

impl PtyProcess for NativePtyProcess {
    fn write(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer
            .write_all(data)
            .map_err(|e| Error::Terminal(e.to_string()))?;
        writer.flush().map_err(|e| Error::Terminal(e.to_string()))?;
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .lock()
            .resize(pty_size(cols, rows))
            .map_err(|e| Error::Terminal(e.to_string()))
    }

    fn kill(&self) -> Result<()> {
        self.killer
            .lock()
            .kill()
            .map_err(|e| Error::Terminal(e.to_string()))
    }
}
