use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cli::paths;
use crate::daemon::pid;
use crate::daemon::protocol::{DaemonEvent, DaemonMessage, DaemonRequest, DaemonResponse};
use crate::error::{Error, Result};
use crate::location::ProjectLocation;
use crate::session::SessionInfo;
use crate::workspace::BranchEntry;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<DaemonResponse>>>>;

/// Snapshot returned by the `status` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatusInfo {
    pub pid: u32,
    pub port: u16,
    pub uptime_secs: u64,
    pub session_count: usize,
    pub version: String,
}

/// Connection to a running daemon.
///
/// Responses are matched to requests by id; events arrive on the channel
/// returned from [`DaemonClient::connect`].
pub struct DaemonClient {
    out_tx: mpsc::UnboundedSender<String>,
    pending: Pending,
}

impl DaemonClient {
    pub async fn connect(port: u16) -> Result<(Self, mpsc::UnboundedReceiver<DaemonEvent>)> {
        let addr = format!("127.0.0.1:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Daemon(format!("cannot connect to {addr}: {e}")))?;
        info!(addr = %addr, "daemon client connected");

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader).lines();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<DaemonEvent>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let pending_for_read = pending.clone();

        tokio::spawn(async move {
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

        tokio::spawn(async move {
            while let Ok(Some(line)) = reader.next_line().await {
                let message: DaemonMessage = match serde_json::from_str(&line) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(error = %err, "daemon message parse failed");
                        continue;
                    }
                };

                match message {
                    DaemonMessage::Response { id, response } => {
                        let sender = pending_for_read.lock().remove(&id);
                        if let Some(sender) = sender {
                            let _ = sender.send(response);
                        }
                    }
                    DaemonMessage::Event { event } => {
                        let _ = event_tx.send(event);
                    }
                    DaemonMessage::Request { .. } => {}
                }
            }

            // Outstanding requests fail instead of waiting forever
            pending_for_read.lock().clear();
            warn!("daemon connection closed");
        });

        Ok((Self { out_tx, pending }, event_rx))
    }

    /// Connect to the daemon recorded in the port file.
    pub async fn connect_running(dev_mode: bool) -> Result<(Self, mpsc::UnboundedReceiver<DaemonEvent>)> {
        let daemon_dir = paths::daemon_dir(dev_mode)
            .ok_or_else(|| Error::Config("Could not find data directory".into()))?;
        let port = pid::read_port(&daemon_dir)
            .ok_or_else(|| Error::Daemon("daemon is not running".into()))?;
        Self::connect(port).await
    }

    pub async fn send_request(&self, request: DaemonRequest) -> Result<DaemonResponse> {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);

        debug!(request_id = %id, request = request.kind(), "daemon request");
        let message = DaemonMessage::Request {
            id: id.clone(),
            request,
        };
        let json = serde_json::to_string(&message)?;

        if self.out_tx.send(json).is_err() {
            self.pending.lock().remove(&id);
            return Err(Error::Daemon("Daemon connection closed".into()));
        }

        match rx.await {
            Ok(DaemonResponse::Error { message }) => Err(Error::Daemon(message)),
            Ok(response) => Ok(response),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::Daemon("Daemon response dropped".into()))
            }
        }
    }

    async fn expect_ok(&self, request: DaemonRequest) -> Result<()> {
        match self.send_request(request).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match self.send_request(DaemonRequest::Ping).await? {
            DaemonResponse::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<DaemonStatusInfo> {
        match self.send_request(DaemonRequest::Status).await? {
            DaemonResponse::DaemonStatus {
                pid,
                port,
                uptime_secs,
                session_count,
                version,
            } => Ok(DaemonStatusInfo {
                pid,
                port,
                uptime_secs,
                session_count,
                version,
            }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn open_branch(&self, source: &ProjectLocation, branch: &str) -> Result<ProjectLocation> {
        match self
            .send_request(DaemonRequest::OpenBranch {
                source: source.clone(),
                branch: branch.to_string(),
            })
            .await?
        {
            DaemonResponse::Workspace { location } => Ok(location),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_workspaces(&self, source: &ProjectLocation) -> Result<Vec<BranchEntry>> {
        match self
            .send_request(DaemonRequest::ListWorkspaces {
                source: source.clone(),
            })
            .await?
        {
            DaemonResponse::Workspaces { entries } => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    pub async fn git_branch(&self, location: &ProjectLocation) -> Result<String> {
        match self
            .send_request(DaemonRequest::GitBranch {
                location: location.clone(),
            })
            .await?
        {
            DaemonResponse::Branch { branch } => Ok(branch),
            other => Err(unexpected(other)),
        }
    }

    pub async fn create_session(
        &self,
        session_id: &str,
        location: &ProjectLocation,
        auto_launch: Option<&str>,
    ) -> Result<SessionInfo> {
        match self
            .send_request(DaemonRequest::CreateSession {
                session_id: session_id.to_string(),
                location: location.clone(),
                auto_launch: auto_launch.map(String::from),
            })
            .await?
        {
            DaemonResponse::Session { session } => Ok(session),
            other => Err(unexpected(other)),
        }
    }

    pub async fn write_session(&self, session_id: &str, data: &str) -> Result<()> {
        self.expect_ok(DaemonRequest::WriteSession {
            session_id: session_id.to_string(),
            data: data.to_string(),
        })
        .await
    }

    pub async fn resize_session(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        self.expect_ok(DaemonRequest::ResizeSession {
            session_id: session_id.to_string(),
            cols,
            rows,
        })
        .await
    }

    pub async fn kill_session(&self, session_id: &str) -> Result<()> {
        self.expect_ok(DaemonRequest::KillSession {
            session_id: session_id.to_string(),
        })
        .await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        match self.send_request(DaemonRequest::ListSessions).await? {
            DaemonResponse::Sessions { sessions } => Ok(sessions),
            other => Err(unexpected(other)),
        }
    }

    pub async fn settings_get(&self, key: &str) -> Result<Value> {
        match self
            .send_request(DaemonRequest::SettingsGet {
                key: key.to_string(),
            })
            .await?
        {
            DaemonResponse::Setting { value, .. } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    pub async fn settings_set(&self, key: &str, value: Value) -> Result<()> {
        self.expect_ok(DaemonRequest::SettingsSet {
            key: key.to_string(),
            value,
        })
        .await
    }

    /// Ask the daemon to exit. It kills every session first.
    pub async fn shutdown(&self) -> Result<()> {
        self.expect_ok(DaemonRequest::Shutdown).await
    }
}

fn unexpected(response: DaemonResponse) -> Error {
    Error::Daemon(format!("Unexpected daemon response: {response:?}"))
}
