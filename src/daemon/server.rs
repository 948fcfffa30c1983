use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::cli::paths;
use crate::config::DuplexConfig;
use crate::daemon::logging::{env_flag, init_daemon_logging};
use crate::daemon::pid;
use crate::daemon::protocol::{DaemonEvent, DaemonMessage, DaemonRequest, DaemonResponse};
use crate::error::{Error, Result};
use crate::launchers;
use crate::location::ProjectLocation;
use crate::state::AppState;

/// Delay between answering a shutdown request and stopping the accept loop,
/// so the response reaches the client first
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Directories one daemon instance owns.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub data_dir: PathBuf,
    pub home_dir: PathBuf,
}

impl DaemonPaths {
    pub fn resolve(dev_mode: bool) -> Result<Self> {
        let data_dir = paths::data_dir(dev_mode)
            .ok_or_else(|| Error::Config("Could not find data directory".into()))?;
        let home_dir = paths::home_dir(dev_mode)
            .ok_or_else(|| Error::Config("Could not find home directory".into()))?;
        Ok(Self { data_dir, home_dir })
    }

    pub fn daemon_dir(&self) -> PathBuf {
        self.data_dir.join("daemon")
    }
}

/// Daemon entry point. Blocks until a shutdown request or a termination signal.
///
/// Dev mode is selected with `DUPLEX_DEV_MODE`, which the CLI sets for `--dev`.
pub fn run_daemon() -> Result<()> {
    let paths = DaemonPaths::resolve(env_flag("DUPLEX_DEV_MODE"))?;
    let _log_guard = init_daemon_logging(&paths.home_dir);
    info!(
        data_dir = %paths.data_dir.display(),
        duplex_home = %paths.home_dir.display(),
        "daemon starting"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run_daemon_async(&paths));
    if let Err(e) = &result {
        error!(error = %e, "daemon error");
    }
    result
}

async fn run_daemon_async(paths: &DaemonPaths) -> Result<()> {
    std::fs::create_dir_all(&paths.home_dir)?;
    let config = DuplexConfig::load(&paths.home_dir);
    let state = Arc::new(AppState::new(config, &paths.data_dir)?);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    info!(daemon_port = addr.port(), "daemon listening");

    let daemon_dir = paths.daemon_dir();
    if let Err(e) = pid::write_pid(&daemon_dir) {
        warn!(error = %e, "failed to write PID file");
    }
    pid::write_port(&daemon_dir, addr.port())?;

    let result = serve(listener, state, terminate_signal()).await;
    pid::remove_files(&daemon_dir);
    info!("daemon stopped");
    result
}

async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

struct Daemon {
    state: Arc<AppState>,
    start_time: Instant,
    port: u16,
    shutdown: Arc<Notify>,
}

/// Accept IPC connections until a shutdown request or `stop` completes,
/// then kill every session.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    let port = listener.local_addr()?.port();
    let shutdown = Arc::new(Notify::new());
    let daemon = Arc::new(Daemon {
        state,
        start_time: Instant::now(),
        port,
        shutdown: shutdown.clone(),
    });

    tokio::pin!(stop);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(daemon.clone(), stream, peer));
                    }
                    Err(e) => warn!(error = %e, "ipc accept failed"),
                }
            }
            _ = shutdown.notified() => {
                info!("shutdown requested");
                break;
            }
            _ = &mut stop => {
                info!("termination signal received");
                break;
            }
        }
    }

    daemon.state.sessions.kill_all();
    Ok(())
}

async fn handle_connection(daemon: Arc<Daemon>, stream: TcpStream, peer: SocketAddr) {
    info!(peer = %peer, "ipc connection accepted");
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader).lines();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let write_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = out_rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    // Forward session events to this client
    let mut event_rx = daemon.state.sessions.subscribe();
    let out_tx_events = out_tx.clone();
    let event_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let message = DaemonMessage::Event {
                        event: DaemonEvent::from(event),
                    };
                    if let Ok(json) = serde_json::to_string(&message) {
                        if out_tx_events.send(json).is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "IPC client lagged, some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Ok(Some(line)) = reader.next_line().await {
        let message: DaemonMessage = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(error = %err, "ipc message parse failed");
                continue;
            }
        };

        let (id, request) = match message {
            DaemonMessage::Request { id, request } => (id, request),
            _ => continue,
        };

        debug!(request = request.kind(), request_id = %id, "ipc request");
        if request.runs_inline() {
            let response = handle_request(&daemon, request).await;
            send_response(&out_tx, id, response);
        } else {
            let daemon = daemon.clone();
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                let response = handle_request(&daemon, request).await;
                send_response(&out_tx, id, response);
            });
        }
    }

    event_task.abort();
    // Let queued and in-flight responses drain; the writer ends once every
    // sender is gone
    drop(out_tx);
    let _ = write_task.await;
    info!(peer = %peer, "ipc connection closed");
}

fn send_response(out_tx: &mpsc::UnboundedSender<String>, id: String, response: DaemonResponse) {
    let message = DaemonMessage::Response { id, response };
    if let Ok(json) = serde_json::to_string(&message) {
        let _ = out_tx.send(json);
    }
}

/// Run synchronous state work (PTY spawn, settings file writes, PATH lookups)
/// on the blocking pool.
async fn blocking<T, F>(state: &Arc<AppState>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| Error::Io(format!("blocking task failed: {e}")))?
}

async fn handle_request(daemon: &Daemon, request: DaemonRequest) -> DaemonResponse {
    let kind = request.kind();
    match dispatch(daemon, request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(request = kind, error = %err, "ipc request failed");
            DaemonResponse::Error {
                message: err.to_string(),
            }
        }
    }
}

async fn dispatch(daemon: &Daemon, request: DaemonRequest) -> Result<DaemonResponse> {
    let state = &daemon.state;
    let git = &state.git;

    Ok(match request {
        DaemonRequest::Ping => DaemonResponse::Pong,
        DaemonRequest::Status => DaemonResponse::DaemonStatus {
            pid: std::process::id(),
            port: daemon.port,
            uptime_secs: daemon.start_time.elapsed().as_secs(),
            session_count: state.sessions.list().len(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },

        DaemonRequest::OpenLocalProject { path } => DaemonResponse::Project {
            project: state.projects.open_local_project(&path).await?,
        },
        DaemonRequest::ConnectRemoteProject { host, remote_path } => {
            let project = state.projects.connect_remote_project(&host, &remote_path).await?;
            if let ProjectLocation::Remote { host, remote_path } = project.location.clone() {
                let touched = blocking(state, move |state| {
                    state.settings.touch_recent_remote(&host, &remote_path)
                })
                .await;
                if let Err(e) = touched {
                    warn!(error = %e, "failed to record recent remote project");
                }
            }
            DaemonResponse::Project { project }
        }
        DaemonRequest::OpenBranch { source, branch } => DaemonResponse::Workspace {
            location: state.workspaces.materialize(&source, &branch).await?,
        },
        DaemonRequest::ListWorkspaces { source } => DaemonResponse::Workspaces {
            entries: state.workspaces.list(&source).await?,
        },
        DaemonRequest::DeleteWorkspace { location } => {
            state.projects.delete_workspace(&location).await?;
            DaemonResponse::Ok
        }

        DaemonRequest::GitStatus { location } => DaemonResponse::GitStatus {
            status: git.status(&location).await?,
        },
        DaemonRequest::GitBranch { location } => DaemonResponse::Branch {
            branch: git.current_branch(&location).await?,
        },
        DaemonRequest::GitBranches { location } => DaemonResponse::Branches {
            branches: git.list_branches(&location).await?,
        },
        DaemonRequest::GitRemote { location } => DaemonResponse::Remote {
            url: git.remote_url(&location).await?,
        },
        DaemonRequest::GitDiff {
            location,
            file,
            staged,
        } => DaemonResponse::Diff {
            diff: git.file_diff(&location, &file, staged).await?,
        },
        DaemonRequest::GitStage { location, file } => {
            git.stage_file(&location, &file).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitUnstage { location, file } => {
            git.unstage_file(&location, &file).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitStageAll { location } => {
            git.stage_all(&location).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitUnstageAll { location } => {
            git.unstage_all(&location).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitCommit { location, message } => {
            git.commit(&location, &message).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitAmend { location, message } => {
            git.amend(&location, message.as_deref()).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitPush { location } => {
            git.push(&location).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitPublish { location } => {
            git.publish(&location).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitDiscardFile { location, file } => {
            git.discard_file(&location, &file).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::GitDiscardAll { location } => {
            git.discard_all(&location).await?;
            DaemonResponse::Ok
        }

        DaemonRequest::CreateSession {
            session_id,
            location,
            auto_launch,
        } => {
            let command = launchers::resolve(auto_launch.as_deref())?;
            DaemonResponse::Session {
                session: blocking(state, move |state| {
                    state.sessions.create(&session_id, &location, command.as_deref())
                })
                .await?,
            }
        }
        DaemonRequest::WriteSession { session_id, data } => {
            state.sessions.write(&session_id, data.as_bytes())?;
            DaemonResponse::Ok
        }
        DaemonRequest::ResizeSession {
            session_id,
            cols,
            rows,
        } => {
            state.sessions.resize(&session_id, cols, rows)?;
            DaemonResponse::Ok
        }
        DaemonRequest::KillSession { session_id } => {
            state.sessions.kill(&session_id);
            DaemonResponse::Ok
        }
        DaemonRequest::ListSessions => DaemonResponse::Sessions {
            sessions: state.sessions.list(),
        },
        DaemonRequest::ListLaunchers => DaemonResponse::Launchers {
            launchers: blocking(state, |_| Ok(launchers::detect_installed())).await?,
        },

        DaemonRequest::SettingsGet { key } => DaemonResponse::Setting {
            value: state.settings.get(&key).unwrap_or(Value::Null),
            key,
        },
        DaemonRequest::SettingsSet { key, value } => {
            blocking(state, move |state| state.settings.set(&key, value)).await?;
            DaemonResponse::Ok
        }
        DaemonRequest::RecentRemoteList => DaemonResponse::RecentRemote {
            projects: state.settings.recent_remote(),
        },
        DaemonRequest::RecentRemoteTouch { host, remote_path } => DaemonResponse::RecentRemote {
            projects: blocking(state, move |state| {
                state.settings.touch_recent_remote(&host, &remote_path)
            })
            .await?,
        },

        DaemonRequest::Shutdown => {
            info!("Shutdown request received");
            let shutdown = daemon.shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(SHUTDOWN_GRACE).await;
                shutdown.notify_one();
            });
            DaemonResponse::Ok
        }
    })
}
