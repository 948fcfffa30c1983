//! Application constants
//!
//! Centralized values shared by the location model, the materializer and the
//! session layer.

/// Prefix marking a project location as remote (`ssh://host:/path`)
pub const REMOTE_PREFIX: &str = "ssh://";

/// Directory name that marks a repository root
pub const REPO_MARKER: &str = ".git";

/// Path segments never copied into a branch workspace, at any depth
pub const COPY_EXCLUDED_SEGMENTS: &[&str] = &["node_modules", "dist", "dist-electron", "out"];

/// Packaged-archive extension never copied into a branch workspace
pub const COPY_EXCLUDED_EXTENSION: &str = ".asar";

/// Upper bound on captured output of a remote command
pub const MAX_REMOTE_OUTPUT_BYTES: usize = 20 * 1024 * 1024;

/// Upper bound on captured output of a local git command
pub const MAX_LOCAL_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default terminal geometry for new sessions
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 30;

/// Delay before the remote-shell bootstrap line is written into a new session
pub const REMOTE_SETTLE_MS: u64 = 250;

/// Delay before an auto-launch command is written into a new local session
pub const LAUNCH_SETTLE_MS: u64 = 500;

/// Maximum number of remembered remote projects
pub const MAX_RECENT_REMOTE_PROJECTS: usize = 8;
