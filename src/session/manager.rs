use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::bootstrap::{BootstrapPlan, PhaseTracker};
use super::env::build_session_env;
use super::process::{ProcessFactory, PtyProcess, SpawnRequest, Spawned};
use super::shell::ShellConfig;
use super::{SessionEvent, SessionPhase};
use crate::config::DuplexConfig;
use crate::error::{Error, Result};
use crate::location::ProjectLocation;

/// Buffer is large enough for high-throughput terminals
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Session settings taken from the runtime configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub shell_override: Option<String>,
    pub transport: String,
    /// Wait before the remote bootstrap line is written
    pub remote_settle: Duration,
    /// Wait before a local auto-launch command is written
    pub launch_settle: Duration,
    pub cols: u16,
    pub rows: u16,
}

impl From<&DuplexConfig> for SessionConfig {
    fn from(config: &DuplexConfig) -> Self {
        Self {
            shell_override: config.shell_override.clone(),
            transport: config.transport.clone(),
            remote_settle: config.remote_settle(),
            launch_settle: config.launch_settle(),
            cols: config.default_cols,
            rows: config.default_rows,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&DuplexConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub location: ProjectLocation,
    pub cwd: PathBuf,
    pub auto_launch: Option<String>,
    pub cols: u16,
    pub rows: u16,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
}

struct SessionEntry {
    /// Distinguishes this process from later ones created under the same id
    generation: u64,
    location: ProjectLocation,
    cwd: PathBuf,
    auto_launch: Option<String>,
    process: Arc<dyn PtyProcess>,
    phase: Arc<Mutex<PhaseTracker>>,
    /// Set before an explicit kill so the exit goes unreported
    killed: Arc<AtomicBool>,
    cols: u16,
    rows: u16,
    created_at: DateTime<Utc>,
}

impl SessionEntry {
    fn info(&self, id: &str) -> SessionInfo {
        SessionInfo {
            id: id.to_string(),
            location: self.location.clone(),
            cwd: self.cwd.clone(),
            auto_launch: self.auto_launch.clone(),
            cols: self.cols,
            rows: self.rows,
            phase: self.phase.lock().phase(),
            created_at: self.created_at,
        }
    }
}

/// Registry of live interactive sessions keyed by caller-supplied id.
///
/// At most one process per id. `create` and `kill` are serialized so two
/// concurrent creates for one id cannot both end up owning a process.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    lifecycle: Arc<Mutex<()>>,
    next_generation: Arc<AtomicU64>,
    event_tx: broadcast::Sender<SessionEvent>,
    factory: Arc<dyn ProcessFactory>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn ProcessFactory>, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lifecycle: Arc::new(Mutex::new(())),
            next_generation: Arc::new(AtomicU64::new(0)),
            event_tx,
            factory,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a shell for `id`, replacing any live process under that id.
    ///
    /// Remote locations spawn in the user's home directory and bootstrap the
    /// remote shell by typing a transport command. On spawn failure a
    /// synthetic error line and an exit with code 1 are broadcast, nothing is
    /// registered, and the error is returned.
    pub fn create(
        &self,
        id: &str,
        location: &ProjectLocation,
        auto_launch: Option<&str>,
    ) -> Result<SessionInfo> {
        let _lifecycle = self.lifecycle.lock();
        self.remove_and_kill(id);

        let cwd = spawn_dir(location);
        let shell = ShellConfig::detect(self.config.shell_override.clone());
        let request = SpawnRequest {
            program: shell.path.clone(),
            args: shell.login_args.clone(),
            cwd: cwd.clone(),
            env: build_session_env(&shell, id),
            cols: self.config.cols,
            rows: self.config.rows,
        };

        info!(
            session_id = %id,
            location = %location,
            shell = %shell.path.display(),
            cwd = %cwd.display(),
            "Creating session"
        );

        let Spawned { process, output, wait } = match self.spawn_checked(&request) {
            Ok(spawned) => spawned,
            Err(err) => return Err(self.report_spawn_failure(id, err)),
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let phase = Arc::new(Mutex::new(PhaseTracker::new(SessionPhase::LocalShellReady)));
        let killed = Arc::new(AtomicBool::new(false));
        let entry = SessionEntry {
            generation,
            location: location.clone(),
            cwd,
            auto_launch: auto_launch.map(String::from),
            process: process.clone(),
            phase: phase.clone(),
            killed: killed.clone(),
            cols: request.cols,
            rows: request.rows,
            created_at: Utc::now(),
        };
        let info = entry.info(id);

        // Registered before the reader starts so an instant exit still finds its entry
        self.sessions.write().insert(id.to_string(), entry);

        if let Err(e) = self.spawn_reader(id, generation, output, wait, phase, killed) {
            self.remove_generation(id, generation);
            let _ = process.kill();
            return Err(self.report_spawn_failure(id, Error::Terminal(e.to_string())));
        }

        if let Some(plan) = BootstrapPlan::for_location(location, auto_launch, &self.config) {
            self.spawn_bootstrap(id, generation, plan);
        }

        Ok(info)
    }

    fn spawn_checked(&self, request: &SpawnRequest) -> Result<Spawned> {
        if !request.cwd.is_dir() {
            return Err(Error::Terminal(format!(
                "Working directory does not exist: {}",
                request.cwd.display()
            )));
        }
        self.factory.spawn(request)
    }

    fn report_spawn_failure(&self, id: &str, err: Error) -> Error {
        let message = match err {
            Error::Terminal(message) | Error::SessionSpawn(message) => message,
            other => other.to_string(),
        };
        error!(session_id = %id, error = %message, "Failed to start session");

        let _ = self.event_tx.send(SessionEvent::Output {
            session_id: id.to_string(),
            data: format!("\r\n[Failed to start terminal: {message}]\r\n").into_bytes(),
        });
        let _ = self.event_tx.send(SessionEvent::Exit {
            session_id: id.to_string(),
            exit_code: 1,
        });
        Error::SessionSpawn(message)
    }

    fn spawn_reader(
        &self,
        id: &str,
        generation: u64,
        mut output: Box<dyn Read + Send>,
        wait: Box<dyn FnOnce() -> i32 + Send>,
        phase: Arc<Mutex<PhaseTracker>>,
        killed: Arc<AtomicBool>,
    ) -> std::io::Result<()> {
        let session_id = id.to_string();
        let sessions = self.sessions.clone();
        let event_tx = self.event_tx.clone();

        thread::Builder::new()
            .name(format!("pty-reader-{id}"))
            .spawn(move || {
                let mut buffer = [0u8; 4096];
                loop {
                    match output.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => {
                            phase.lock().observe(&buffer[..n]);
                            // Never blocks; a lagging subscriber loses old events
                            let _ = event_tx.send(SessionEvent::Output {
                                session_id: session_id.clone(),
                                data: buffer[..n].to_vec(),
                            });
                        }
                        Err(e) => {
                            debug!(session_id = %session_id, error = %e, "pty-reader: read ended");
                            break;
                        }
                    }
                }

                let exit_code = wait();
                {
                    let mut sessions = sessions.write();
                    if sessions
                        .get(&session_id)
                        .is_some_and(|entry| entry.generation == generation)
                    {
                        sessions.remove(&session_id);
                    }
                }

                if killed.load(Ordering::SeqCst) {
                    debug!(session_id = %session_id, exit_code, "Killed session exited");
                    return;
                }
                info!(session_id = %session_id, exit_code, "Session exited");
                let _ = event_tx.send(SessionEvent::Exit {
                    session_id,
                    exit_code,
                });
            })
            .map(|_| ())
    }

    fn spawn_bootstrap(&self, id: &str, generation: u64, plan: BootstrapPlan) {
        let session_id = id.to_string();
        let sessions = self.sessions.clone();

        let spawned = thread::Builder::new()
            .name(format!("session-bootstrap-{id}"))
            .spawn(move || {
                thread::sleep(plan.delay);

                let target = sessions
                    .read()
                    .get(&session_id)
                    .filter(|entry| entry.generation == generation)
                    .map(|entry| (entry.process.clone(), entry.phase.clone()));
                let Some((process, phase)) = target else {
                    debug!(session_id = %session_id, "Session gone before bootstrap");
                    return;
                };

                phase.lock().enter(plan.next_phase);
                if let Err(e) = process.write(plan.line.as_bytes()) {
                    warn!(session_id = %session_id, error = %e, "Failed to write bootstrap line");
                }
            });

        if let Err(e) = spawned {
            warn!(session_id = %id, error = %e, "Failed to schedule session bootstrap");
        }
    }

    /// Forward input; a no-op when the id has no live process.
    pub fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        // Clone the handle under a short read lock, then release before I/O
        let process = self.sessions.read().get(id).map(|entry| entry.process.clone());
        match process {
            Some(process) => process.write(data),
            None => {
                debug!(session_id = %id, "write to absent session ignored");
                Ok(())
            }
        }
    }

    /// Resize the terminal; a no-op when the id has no live process.
    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        let process = self.sessions.read().get(id).map(|entry| entry.process.clone());
        let Some(process) = process else {
            return Ok(());
        };
        process.resize(cols, rows)?;

        if let Some(entry) = self.sessions.write().get_mut(id) {
            entry.cols = cols;
            entry.rows = rows;
        }
        Ok(())
    }

    /// Terminate the process for `id`, if any. Idempotent.
    pub fn kill(&self, id: &str) {
        let _lifecycle = self.lifecycle.lock();
        self.remove_and_kill(id);
    }

    /// Terminate every session; used at shutdown.
    pub fn kill_all(&self) {
        let _lifecycle = self.lifecycle.lock();
        let entries: Vec<(String, SessionEntry)> = self.sessions.write().drain().collect();
        for (id, entry) in entries {
            terminate(&id, &entry);
        }
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    pub fn phase(&self, id: &str) -> Option<SessionPhase> {
        self.sessions.read().get(id).map(|entry| entry.phase.lock().phase())
    }

    pub fn get(&self, id: &str) -> Option<SessionInfo> {
        self.sessions.read().get(id).map(|entry| entry.info(id))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| entry.info(id))
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    // Caller holds the lifecycle lock
    fn remove_and_kill(&self, id: &str) {
        let entry = self.sessions.write().remove(id);
        if let Some(entry) = entry {
            terminate(id, &entry);
        }
    }

    fn remove_generation(&self, id: &str, generation: u64) {
        let mut sessions = self.sessions.write();
        if sessions.get(id).is_some_and(|entry| entry.generation == generation) {
            sessions.remove(id);
        }
    }
}

fn terminate(id: &str, entry: &SessionEntry) {
    entry.killed.store(true, Ordering::SeqCst);
    if let Err(e) = entry.process.kill() {
        debug!(session_id = %id, error = %e, "kill failed, process likely gone");
    }
    info!(session_id = %id, "Session killed");
}

/// Local sessions start in the project; remote ones in the local home directory.
fn spawn_dir(location: &ProjectLocation) -> PathBuf {
    match location {
        ProjectLocation::Local { path } => path.clone(),
        ProjectLocation::Remote { .. } => dirs::home_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/")),
    }
}
