//! Front-end side of sessions: one persistent scrollback per session id.
//!
//! A surface survives being hidden and re-shown. Its process is created
//! lazily, when the surface first becomes visible or receives a keystroke,
//! and recreated by the next keystroke after it exits. Whether a process is
//! running is always read from the [`SessionManager`] registry, so input that
//! arrives before the exit event is processed still restarts the process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{OutputBuffer, SessionEvent, SessionManager};
use crate::error::Result;
use crate::location::ProjectLocation;

const ESC: u8 = 0x1b;

/// Line appended to a surface when its process ends on its own.
pub fn exit_notice(code: i32) -> String {
    format!("\r\n[Process exited with code {code}. Press any key to restart.]\r\n")
}

struct Surface {
    location: ProjectLocation,
    auto_launch: Option<String>,
    buffer: Arc<OutputBuffer>,
}

pub struct Multiplexer {
    sessions: SessionManager,
    surfaces: RwLock<HashMap<String, Surface>>,
}

impl Multiplexer {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            surfaces: RwLock::new(HashMap::new()),
        }
    }

    /// Register a surface, keeping the scrollback of an earlier mount.
    pub fn mount(&self, id: &str, location: ProjectLocation, auto_launch: Option<String>) {
        let mut surfaces = self.surfaces.write();
        match surfaces.get_mut(id) {
            Some(surface) => {
                surface.location = location;
                surface.auto_launch = auto_launch;
            }
            None => {
                surfaces.insert(
                    id.to_string(),
                    Surface {
                        location,
                        auto_launch,
                        buffer: Arc::new(OutputBuffer::new()),
                    },
                );
            }
        }
    }

    /// Becoming visible starts the process if none is running.
    pub fn set_visible(&self, id: &str, visible: bool) -> Result<()> {
        if visible {
            self.ensure_process(id)?;
        }
        Ok(())
    }

    /// Keystrokes from the surface.
    ///
    /// Without a process, terminal control responses (ESC-prefixed) are
    /// dropped; anything else starts the process and is replayed into it.
    pub fn input(&self, id: &str, data: &[u8]) -> Result<()> {
        if !self.surfaces.read().contains_key(id) {
            return Ok(());
        }

        if !self.sessions.is_live(id) {
            if data.first() == Some(&ESC) {
                debug!(session_id = %id, "dropping control sequence with no process");
                return Ok(());
            }
            self.ensure_process(id)?;
        }
        self.sessions.write(id, data)
    }

    /// Degenerate sizes (hidden or collapsed surfaces) are ignored.
    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        if cols < 2 || rows < 2 {
            return Ok(());
        }
        self.sessions.resize(id, cols, rows)
    }

    // The surfaces lock is held across `create` so two callers cannot both
    // start a process for one surface.
    fn ensure_process(&self, id: &str) -> Result<()> {
        let surfaces = self.surfaces.write();
        let Some(surface) = surfaces.get(id) else {
            return Ok(());
        };
        if self.sessions.is_live(id) {
            return Ok(());
        }
        self.sessions
            .create(id, &surface.location, surface.auto_launch.as_deref())
            .map(|_| ())
    }

    pub fn handle_event(&self, event: &SessionEvent) {
        let mut surfaces = self.surfaces.write();
        let Some(surface) = surfaces.get_mut(event.session_id()) else {
            return;
        };
        match event {
            SessionEvent::Output { data, .. } => surface.buffer.append(data),
            SessionEvent::Exit { exit_code, .. } => {
                surface.buffer.append(exit_notice(*exit_code).as_bytes());
            }
        }
    }

    /// Feed session events into the surfaces until the manager goes away.
    pub fn spawn_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let mux = Arc::clone(self);
        let mut events = self.sessions.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => mux.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "multiplexer lagged behind session output");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stop the process but keep the scrollback for the next mount.
    pub fn unmount(&self, id: &str) {
        self.sessions.kill(id);
    }

    /// Stop the process and forget the surface entirely.
    pub fn dispose(&self, id: &str) {
        self.sessions.kill(id);
        self.surfaces.write().remove(id);
    }

    pub fn scrollback(&self, id: &str) -> Option<Vec<u8>> {
        self.surfaces.read().get(id).map(|s| s.buffer.contents())
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.surfaces.read().contains_key(id) && self.sessions.is_live(id)
    }
}
