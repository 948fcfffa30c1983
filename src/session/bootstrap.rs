use std::time::Duration;

use super::{SessionConfig, SessionPhase};
use crate::location::{quote, ProjectLocation};

/// A line typed into a fresh session once its shell has had time to start,
/// and the phase the session enters when the line is written.
///
/// The delays are heuristics: nothing reports when a shell is ready for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub delay: Duration,
    pub line: String,
    pub next_phase: SessionPhase,
}

impl BootstrapPlan {
    /// Remote targets always get a transport line; local targets only when
    /// an auto-launch command is given.
    pub fn for_location(
        location: &ProjectLocation,
        auto_launch: Option<&str>,
        config: &SessionConfig,
    ) -> Option<Self> {
        let auto_launch = auto_launch.map(str::trim).filter(|cmd| !cmd.is_empty());
        match location {
            ProjectLocation::Remote { host, remote_path } => Some(Self {
                delay: config.remote_settle,
                line: remote_bootstrap_line(&config.transport, host, remote_path, auto_launch),
                next_phase: SessionPhase::RemoteConnecting,
            }),
            ProjectLocation::Local { .. } => auto_launch.map(|cmd| Self {
                delay: config.launch_settle,
                line: format!("{cmd}\r"),
                next_phase: SessionPhase::LocalShellReady,
            }),
        }
    }
}

/// OSC sequence the remote command prints once the transport is up. Terminals
/// ignore it. The local shell's echo of the typed line only contains its
/// escaped `printf` form, never these bytes.
pub const REMOTE_READY_MARKER: &[u8] = b"\x1b]777;duplex-ready\x07";

const READY_PRINTF: &str = r#"printf "\033]777;duplex-ready\007""#;

/// `ssh -t <host> 'cd <path> && printf <marker> && exec <cmd>'`, terminated
/// with a carriage return.
pub fn remote_bootstrap_line(
    transport: &str,
    host: &str,
    remote_path: &str,
    auto_launch: Option<&str>,
) -> String {
    let exec = match auto_launch {
        Some(cmd) => format!("exec {}", quote(cmd)),
        None => "exec ${SHELL:-/bin/bash} -l".to_string(),
    };
    let remote_command = format!("cd {} && {READY_PRINTF} && {exec}", quote(remote_path));
    format!("{} -t {} {}\r", transport, quote(host), quote(&remote_command))
}

/// Session phase plus enough trailing output to spot a readiness marker
/// split across reads.
#[derive(Debug)]
pub struct PhaseTracker {
    phase: SessionPhase,
    tail: Vec<u8>,
}

impl PhaseTracker {
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            phase,
            tail: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn enter(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.tail.clear();
    }

    /// Feed terminal output; only `RemoteConnecting` looks for the marker.
    pub fn observe(&mut self, data: &[u8]) {
        if self.phase != SessionPhase::RemoteConnecting {
            return;
        }
        self.tail.extend_from_slice(data);
        if self
            .tail
            .windows(REMOTE_READY_MARKER.len())
            .any(|window| window == REMOTE_READY_MARKER)
        {
            self.enter(SessionPhase::RemoteShellActive);
            return;
        }
        let keep = REMOTE_READY_MARKER.len() - 1;
        if self.tail.len() > keep {
            self.tail.drain(..self.tail.len() - keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_line_with_login_shell() {
        assert_eq!(
            remote_bootstrap_line("ssh", "box", "/srv/app", None),
            r#"ssh -t 'box' 'cd '\''/srv/app'\'' && printf "\033]777;duplex-ready\007" && exec ${SHELL:-/bin/bash} -l'"#.to_string() + "\r"
        );
    }

    #[test]
    fn remote_line_with_auto_launch() {
        assert_eq!(
            remote_bootstrap_line("ssh", "dev@box", "/srv/my app", Some("claude")),
            r#"ssh -t 'dev@box' 'cd '\''/srv/my app'\'' && printf "\033]777;duplex-ready\007" && exec '\''claude'\'''"#.to_string() + "\r"
        );
    }

    #[test]
    fn plans_per_location_kind() {
        let config = SessionConfig::default();
        let remote = ProjectLocation::parse("ssh://box:/srv/app").unwrap();
        let plan = BootstrapPlan::for_location(&remote, None, &config).unwrap();
        assert_eq!(plan.delay, config.remote_settle);
        assert_eq!(plan.next_phase, SessionPhase::RemoteConnecting);

        let local = ProjectLocation::local("/work/app");
        assert_eq!(BootstrapPlan::for_location(&local, None, &config), None);
        assert_eq!(BootstrapPlan::for_location(&local, Some("  "), &config), None);

        let plan = BootstrapPlan::for_location(&local, Some("codex"), &config).unwrap();
        assert_eq!(plan.line, "codex\r");
        assert_eq!(plan.delay, config.launch_settle);
        assert_eq!(plan.next_phase, SessionPhase::LocalShellReady);
    }

    #[test]
    fn echoed_bootstrap_line_does_not_count_as_ready() {
        let mut tracker = PhaseTracker::new(SessionPhase::RemoteConnecting);
        let line = remote_bootstrap_line("ssh", "box", "/srv/app", None);
        tracker.observe(line.as_bytes());
        tracker.observe(b"\r\nssh: connect to host box port 22: Connection refused\r\n");
        assert_eq!(tracker.phase(), SessionPhase::RemoteConnecting);
    }

    #[test]
    fn marker_split_across_reads_is_found() {
        let mut tracker = PhaseTracker::new(SessionPhase::RemoteConnecting);
        let (head, rest) = REMOTE_READY_MARKER.split_at(5);
        tracker.observe(b"Last login: today\r\n");
        tracker.observe(head);
        assert_eq!(tracker.phase(), SessionPhase::RemoteConnecting);
        tracker.observe(rest);
        assert_eq!(tracker.phase(), SessionPhase::RemoteShellActive);
    }

    #[test]
    fn marker_is_ignored_outside_connecting() {
        let mut tracker = PhaseTracker::new(SessionPhase::LocalShellReady);
        tracker.observe(REMOTE_READY_MARKER);
        assert_eq!(tracker.phase(), SessionPhase::LocalShellReady);
    }
}
