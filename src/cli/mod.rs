//! Command-line interface: daemon management plus in-process one-shots.

pub mod commands;
pub mod daemon;
pub mod paths;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::daemon::logging::init_cli_logging;

/// Duplex - branch workspaces and terminals for local and remote repositories
#[derive(Parser)]
#[command(name = "duplex", version, about = "Duplex CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use development mode (separate data directory from production)
    #[arg(long, global = true)]
    pub dev: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the Duplex daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Materialize (or reuse) the workspace for a branch and print its location
    OpenBranch {
        /// Source repository: a path or ssh://host:/path
        source: String,
        branch: String,
    },
    /// List branches and their workspaces next to a repository
    Workspaces { source: String },
    /// Show branch, ahead/behind and changed files
    Status { location: String },
    /// Delete a branch workspace
    DeleteWorkspace {
        location: String,
        /// Also delete directories that do not look like a workspace
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
    /// Restart the daemon
    Restart,
    /// View daemon logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Run the CLI
pub fn run() {
    let cli = Cli::parse();
    let dev = cli.dev;

    let result = match cli.command {
        Commands::Daemon { action } => match action {
            DaemonAction::Start { foreground } => daemon::start(dev, foreground),
            DaemonAction::Stop => daemon::stop(dev),
            DaemonAction::Status => daemon::status(dev),
            DaemonAction::Restart => daemon::restart(dev),
            DaemonAction::Logs { follow, lines } => daemon::logs(dev, follow, lines),
        },
        Commands::OpenBranch { source, branch } => {
            init_cli_logging();
            commands::open_branch(dev, &source, &branch)
        }
        Commands::Workspaces { source } => {
            init_cli_logging();
            commands::workspaces(dev, &source)
        }
        Commands::Status { location } => {
            init_cli_logging();
            commands::status(dev, &location)
        }
        Commands::DeleteWorkspace { location, force } => {
            init_cli_logging();
            commands::delete_workspace(dev, &location, force)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Resolve a relative local argument against the working directory.
pub(crate) fn absolute_arg(value: &str) -> String {
    if crate::location::is_remote(value) {
        return value.to_string();
    }
    let path = PathBuf::from(value.trim());
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(path).to_string_lossy().to_string();
        }
    }
    value.to_string()
}
