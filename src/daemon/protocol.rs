use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::git::GitStatus;
use crate::launchers::Launcher;
use crate::location::ProjectLocation;
use crate::project::ProjectInfo;
use crate::session::{SessionEvent, SessionInfo};
use crate::settings::RecentRemoteProject;
use crate::workspace::BranchEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonRequest {
    /// Health check - daemon responds with Pong
    Ping,
    /// Get daemon status information
    Status,

    OpenLocalProject { path: PathBuf },
    ConnectRemoteProject { host: String, remote_path: String },
    /// Materialize (or reuse) the workspace for a branch of `source`
    OpenBranch { source: ProjectLocation, branch: String },
    ListWorkspaces { source: ProjectLocation },
    DeleteWorkspace { location: ProjectLocation },

    GitStatus { location: ProjectLocation },
    GitBranch { location: ProjectLocation },
    GitBranches { location: ProjectLocation },
    GitRemote { location: ProjectLocation },
    GitDiff {
        location: ProjectLocation,
        file: String,
        #[serde(default)]
        staged: bool,
    },
    GitStage { location: ProjectLocation, file: String },
    GitUnstage { location: ProjectLocation, file: String },
    GitStageAll { location: ProjectLocation },
    GitUnstageAll { location: ProjectLocation },
    GitCommit { location: ProjectLocation, message: String },
    GitAmend {
        location: ProjectLocation,
        #[serde(default)]
        message: Option<String>,
    },
    GitPush { location: ProjectLocation },
    GitPublish { location: ProjectLocation },
    GitDiscardFile { location: ProjectLocation, file: String },
    GitDiscardAll { location: ProjectLocation },

    CreateSession {
        session_id: String,
        location: ProjectLocation,
        /// Launcher id or bare command typed once the shell is up
        #[serde(default)]
        auto_launch: Option<String>,
    },
    WriteSession { session_id: String, data: String },
    ResizeSession { session_id: String, cols: u16, rows: u16 },
    KillSession { session_id: String },
    ListSessions,
    ListLaunchers,

    SettingsGet { key: String },
    SettingsSet { key: String, value: Value },
    RecentRemoteList,
    RecentRemoteTouch { host: String, remote_path: String },

    /// Kill every session and exit
    Shutdown,
}

impl DaemonRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            DaemonRequest::Ping => "ping",
            DaemonRequest::Status => "status",
            DaemonRequest::OpenLocalProject { .. } => "open_local_project",
            DaemonRequest::ConnectRemoteProject { .. } => "connect_remote_project",
            DaemonRequest::OpenBranch { .. } => "open_branch",
            DaemonRequest::ListWorkspaces { .. } => "list_workspaces",
            DaemonRequest::DeleteWorkspace { .. } => "delete_workspace",
            DaemonRequest::GitStatus { .. } => "git_status",
            DaemonRequest::GitBranch { .. } => "git_branch",
            DaemonRequest::GitBranches { .. } => "git_branches",
            DaemonRequest::GitRemote { .. } => "git_remote",
            DaemonRequest::GitDiff { .. } => "git_diff",
            DaemonRequest::GitStage { .. } => "git_stage",
            DaemonRequest::GitUnstage { .. } => "git_unstage",
            DaemonRequest::GitStageAll { .. } => "git_stage_all",
            DaemonRequest::GitUnstageAll { .. } => "git_unstage_all",
            DaemonRequest::GitCommit { .. } => "git_commit",
            DaemonRequest::GitAmend { .. } => "git_amend",
            DaemonRequest::GitPush { .. } => "git_push",
            DaemonRequest::GitPublish { .. } => "git_publish",
            DaemonRequest::GitDiscardFile { .. } => "git_discard_file",
            DaemonRequest::GitDiscardAll { .. } => "git_discard_all",
            DaemonRequest::CreateSession { .. } => "create_session",
            DaemonRequest::WriteSession { .. } => "write_session",
            DaemonRequest::ResizeSession { .. } => "resize_session",
            DaemonRequest::KillSession { .. } => "kill_session",
            DaemonRequest::ListSessions => "list_sessions",
            DaemonRequest::ListLaunchers => "list_launchers",
            DaemonRequest::SettingsGet { .. } => "settings_get",
            DaemonRequest::SettingsSet { .. } => "settings_set",
            DaemonRequest::RecentRemoteList => "recent_remote_list",
            DaemonRequest::RecentRemoteTouch { .. } => "recent_remote_touch",
            DaemonRequest::Shutdown => "shutdown",
        }
    }

    /// Answered in arrival order on the connection's read loop. Session input
    /// keeps its order this way; everything else runs on its own task.
    pub fn runs_inline(&self) -> bool {
        matches!(
            self,
            DaemonRequest::Ping
                | DaemonRequest::Status
                | DaemonRequest::WriteSession { .. }
                | DaemonRequest::ResizeSession { .. }
                | DaemonRequest::KillSession { .. }
                | DaemonRequest::ListSessions
                | DaemonRequest::SettingsGet { .. }
                | DaemonRequest::RecentRemoteList
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonResponse {
    Ok,
    /// Response to Ping request
    Pong,
    Error { message: String },
    DaemonStatus {
        pid: u32,
        port: u16,
        uptime_secs: u64,
        session_count: usize,
        version: String,
    },
    Project { project: ProjectInfo },
    Workspace { location: ProjectLocation },
    Workspaces { entries: Vec<BranchEntry> },
    GitStatus { status: GitStatus },
    Branch { branch: String },
    Branches { branches: Vec<String> },
    Remote { url: Option<String> },
    Diff { diff: String },
    Session { session: SessionInfo },
    Sessions { sessions: Vec<SessionInfo> },
    Launchers { launchers: Vec<Launcher> },
    Setting { key: String, value: Value },
    RecentRemote { projects: Vec<RecentRemoteProject> },
}

/// Pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// Raw PTY bytes, sent as a JSON array of numbers
    SessionOutput { session_id: String, data: Vec<u8> },
    SessionExit { session_id: String, exit_code: i32 },
}

impl From<SessionEvent> for DaemonEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Output { session_id, data } => DaemonEvent::SessionOutput { session_id, data },
            SessionEvent::Exit {
                session_id,
                exit_code,
            } => DaemonEvent::SessionExit {
                session_id,
                exit_code,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    Request { id: String, request: DaemonRequest },
    Response { id: String, response: DaemonResponse },
    Event { event: DaemonEvent },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let raw = json!({
            "type": "request",
            "id": "7",
            "request": {
                "type": "open_branch",
                "source": "ssh://box:/srv/app",
                "branch": "feature/x"
            }
        });
        let message: DaemonMessage = serde_json::from_value(raw).unwrap();
        let DaemonMessage::Request { id, request } = message else {
            panic!("expected a request");
        };
        assert_eq!(id, "7");
        assert_eq!(request.kind(), "open_branch");
        match request {
            DaemonRequest::OpenBranch { source, branch } => {
                assert!(source.is_remote());
                assert_eq!(branch, "feature/x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn optional_fields_default() {
        let request: DaemonRequest = serde_json::from_value(json!({
            "type": "git_diff",
            "location": "/repo",
            "file": "a.txt"
        }))
        .unwrap();
        assert!(matches!(request, DaemonRequest::GitDiff { staged: false, .. }));

        let request: DaemonRequest = serde_json::from_value(json!({
            "type": "create_session",
            "session_id": "s1",
            "location": "/repo"
        }))
        .unwrap();
        assert!(matches!(request, DaemonRequest::CreateSession { auto_launch: None, .. }));
    }

    #[test]
    fn only_cheap_requests_run_inline() {
        let location = ProjectLocation::local("/repo");
        assert!(DaemonRequest::WriteSession {
            session_id: "s1".into(),
            data: "x".into(),
        }
        .runs_inline());
        assert!(DaemonRequest::ResizeSession {
            session_id: "s1".into(),
            cols: 80,
            rows: 24,
        }
        .runs_inline());
        assert!(!DaemonRequest::OpenBranch {
            source: location.clone(),
            branch: "x".into(),
        }
        .runs_inline());
        assert!(!DaemonRequest::GitStatus { location }.runs_inline());
        assert!(!DaemonRequest::ConnectRemoteProject {
            host: "box".into(),
            remote_path: "/srv".into(),
        }
        .runs_inline());
    }

    #[test]
    fn output_event_carries_bytes() {
        let event = DaemonEvent::from(SessionEvent::Output {
            session_id: "s1".into(),
            data: vec![27, b'[', b'm'],
        });
        let value = serde_json::to_value(DaemonMessage::Event { event }).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "event",
                "event": { "type": "session_output", "session_id": "s1", "data": [27, 91, 109] }
            })
        );
    }

    #[test]
    fn error_response_shape() {
        let value = serde_json::to_value(DaemonResponse::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "error", "message": "boom" }));
    }
}
