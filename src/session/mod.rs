//! Interactive terminal sessions bound to project locations.

mod bootstrap;
mod buffer;
mod env;
mod manager;
mod multiplexer;
mod process;
mod shell;

use serde::{Deserialize, Serialize};

pub use bootstrap::{remote_bootstrap_line, BootstrapPlan, PhaseTracker, REMOTE_READY_MARKER};
pub use buffer::OutputBuffer;
pub use env::build_session_env;
pub use manager::{SessionConfig, SessionInfo, SessionManager};
pub use multiplexer::{exit_notice, Multiplexer};
pub use process::{NativePtyFactory, ProcessFactory, PtyProcess, SpawnRequest, Spawned};
pub use shell::ShellConfig;

/// Session output and lifecycle notifications, in production order per id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Raw bytes from the terminal, unmodified
    Output { session_id: String, data: Vec<u8> },
    /// The process ended on its own; explicit kills are not reported
    Exit { session_id: String, exit_code: i32 },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Output { session_id, .. } | SessionEvent::Exit { session_id, .. } => session_id,
        }
    }
}

/// Where a session is in its two-hop bootstrap.
///
/// Local sessions stay in `LocalShellReady`. Remote sessions move to
/// `RemoteConnecting` once the transport line is written and to
/// `RemoteShellActive` when the remote command prints [`REMOTE_READY_MARKER`]
/// just before it execs. A transport that hangs or fails leaves the session in
/// `RemoteConnecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    LocalShellReady,
    RemoteConnecting,
    RemoteShellActive,
}
