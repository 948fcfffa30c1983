//! Scripted stand-ins for the command seams, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::git::VcsRunner;
use crate::location::ProjectLocation;
use crate::remote::RemoteExecutor;
use crate::session::{ProcessFactory, PtyProcess, SessionEvent, SpawnRequest, Spawned};

type RunnerFn = dyn Fn(&ProjectLocation, &[&str]) -> Result<String> + Send + Sync;
type RemoteFn = dyn Fn(&str, &str) -> Result<String> + Send + Sync;

/// Version-control runner that records every invocation and answers from a closure.
pub struct ScriptedRunner {
    calls: Mutex<Vec<Vec<String>>>,
    respond: Box<RunnerFn>,
}

impl ScriptedRunner {
    pub fn new(
        respond: impl Fn(&ProjectLocation, &[&str]) -> Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl VcsRunner for ScriptedRunner {
    async fn run(&self, location: &ProjectLocation, args: &[&str]) -> Result<String> {
        self.calls
            .lock()
            .push(args.iter().map(|a| a.to_string()).collect());
        (self.respond)(location, args)
    }
}

/// Remote executor that records `(host, command)` pairs.
pub struct ScriptedRemote {
    commands: Mutex<Vec<(String, String)>>,
    respond: Box<RemoteFn>,
}

impl ScriptedRemote {
    pub fn new(respond: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedRemote {
    async fn run_raw(&self, host: &str, command: &str) -> Result<String> {
        self.commands
            .lock()
            .push((host.to_string(), command.to_string()));
        (self.respond)(host, command)
    }
}

pub fn git_failure(args: &[&str], message: &str) -> Error {
    Error::Git {
        command: args.join(" "),
        message: message.to_string(),
    }
}

/// Blocking-read end of a channel; ends when every sender is gone.
struct ChannelReader {
    rx: std::sync::mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl std::io::Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Spawn and kill calls seen by a [`FakeFactory`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Spawned(usize),
    Killed(usize),
}

type Journal = Arc<Mutex<Vec<Lifecycle>>>;

/// In-memory interactive process driven from the test.
pub struct FakeProcess {
    pub request: SpawnRequest,
    index: usize,
    journal: Journal,
    written: Mutex<Vec<u8>>,
    size: Mutex<(u16, u16)>,
    killed: AtomicBool,
    output: Mutex<Option<std::sync::mpsc::Sender<Vec<u8>>>>,
    exit_code: Arc<AtomicI32>,
}

impl FakeProcess {
    pub fn emit(&self, data: &[u8]) {
        if let Some(tx) = self.output.lock().as_ref() {
            let _ = tx.send(data.to_vec());
        }
    }

    pub fn exit(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
        self.output.lock().take();
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn size(&self) -> (u16, u16) {
        *self.size.lock()
    }
}

impl PtyProcess for FakeProcess {
    fn write(&self, data: &[u8]) -> Result<()> {
        self.written.lock().extend_from_slice(data);
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        *self.size.lock() = (cols, rows);
        Ok(())
    }

    fn kill(&self) -> Result<()> {
        self.journal.lock().push(Lifecycle::Killed(self.index));
        self.killed.store(true, Ordering::SeqCst);
        self.exit(137);
        Ok(())
    }
}

/// Process factory that hands out [`FakeProcess`]es, or always fails.
pub struct FakeFactory {
    processes: Mutex<Vec<Arc<FakeProcess>>>,
    journal: Journal,
    failure: Option<String>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            processes: Mutex::new(Vec::new()),
            journal: Arc::default(),
            failure: None,
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            processes: Mutex::new(Vec::new()),
            journal: Arc::default(),
            failure: Some(message.to_string()),
        })
    }

    pub fn processes(&self) -> Vec<Arc<FakeProcess>> {
        self.processes.lock().clone()
    }

    pub fn journal(&self) -> Vec<Lifecycle> {
        self.journal.lock().clone()
    }
}

impl ProcessFactory for FakeFactory {
    fn spawn(&self, request: &SpawnRequest) -> Result<Spawned> {
        if let Some(message) = &self.failure {
            return Err(Error::Terminal(message.clone()));
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let exit_code = Arc::new(AtomicI32::new(0));
        let mut processes = self.processes.lock();
        let index = processes.len();
        self.journal.lock().push(Lifecycle::Spawned(index));
        let process = Arc::new(FakeProcess {
            request: request.clone(),
            index,
            journal: self.journal.clone(),
            written: Mutex::new(Vec::new()),
            size: Mutex::new((request.cols, request.rows)),
            killed: AtomicBool::new(false),
            output: Mutex::new(Some(tx)),
            exit_code: exit_code.clone(),
        });
        processes.push(process.clone());
        drop(processes);

        Ok(Spawned {
            process,
            output: Box::new(ChannelReader {
                rx,
                pending: Vec::new(),
            }),
            wait: Box::new(move || exit_code.load(Ordering::SeqCst)),
        })
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Poll until `condition` holds; panics after a few seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        match rx.try_recv() {
            Ok(event) => return event,
            Err(broadcast::error::TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "no session event in time");
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => panic!("event channel failed: {e}"),
        }
    }
}
