use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DuplexConfig;
use crate::error::Result;
use crate::git::{GitRunner, GitService, VcsRunner};
use crate::project::ProjectService;
use crate::remote::{RemoteExecutor, SshExecutor};
use crate::session::{NativePtyFactory, ProcessFactory, SessionConfig, SessionManager};
use crate::settings::SettingsStore;
use crate::workspace::{LocalTreeCopier, TreeCopier, WorkspaceManager};

/// Everything a request handler needs, wired once per process.
pub struct AppState {
    pub config: DuplexConfig,
    pub data_dir: PathBuf,
    pub git: GitService,
    pub workspaces: WorkspaceManager,
    pub projects: ProjectService,
    pub sessions: SessionManager,
    pub settings: SettingsStore,
}

/// The replaceable edges of [`AppState`].
pub struct Backends {
    pub remote: Arc<dyn RemoteExecutor>,
    pub runner: Arc<dyn VcsRunner>,
    pub copier: Arc<dyn TreeCopier>,
    pub factory: Arc<dyn ProcessFactory>,
}

impl Backends {
    /// Real processes: the configured transport, git binary and native PTYs.
    pub fn native(config: &DuplexConfig) -> Self {
        let remote: Arc<dyn RemoteExecutor> = Arc::new(SshExecutor::from_config(config));
        Self {
            runner: Arc::new(GitRunner::from_config(config, remote.clone())),
            remote,
            copier: Arc::new(LocalTreeCopier),
            factory: Arc::new(NativePtyFactory),
        }
    }
}

impl AppState {
    pub fn new(config: DuplexConfig, data_dir: &Path) -> Result<Self> {
        let backends = Backends::native(&config);
        Self::with_backends(config, data_dir, backends)
    }

    pub fn with_backends(config: DuplexConfig, data_dir: &Path, backends: Backends) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let git = GitService::new(backends.runner);
        let workspaces = WorkspaceManager::new(git.clone(), backends.remote.clone(), backends.copier);
        let projects = ProjectService::new(git.clone(), backends.remote, config.vcs_binary.clone());
        let sessions = SessionManager::new(backends.factory, SessionConfig::from(&config));
        let settings = SettingsStore::open(&data_dir.join("settings.json"))?;

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            git,
            workspaces,
            projects,
            sessions,
            settings,
        })
    }
}
