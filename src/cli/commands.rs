//! One-shot commands that run in-process, without the daemon.

use std::future::Future;

use crate::cli::{absolute_arg, paths};
use crate::config::DuplexConfig;
use crate::git::GitStatus;
use crate::location::ProjectLocation;
use crate::state::AppState;
use crate::workspace::BranchEntry;

fn with_state<F, Fut>(dev_mode: bool, f: F) -> Result<(), String>
where
    F: FnOnce(AppState) -> Fut,
    Fut: Future<Output = crate::Result<()>>,
{
    let data_dir = paths::data_dir(dev_mode).ok_or("Could not determine data directory")?;
    let home_dir = paths::home_dir(dev_mode).ok_or("Could not determine home directory")?;
    let config = DuplexConfig::load(&home_dir);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    runtime.block_on(async {
        let state = AppState::new(config, &data_dir)?;
        f(state).await
    })
    .map_err(|e| e.to_string())
}

fn parse_location(value: &str) -> Result<ProjectLocation, String> {
    ProjectLocation::parse(&absolute_arg(value)).map_err(|e| e.to_string())
}

pub fn open_branch(dev_mode: bool, source: &str, branch: &str) -> Result<(), String> {
    let source = parse_location(source)?;
    with_state(dev_mode, |state| async move {
        let workspace = state.workspaces.materialize(&source, branch).await?;
        println!("{}", workspace);
        Ok(())
    })
}

pub fn workspaces(dev_mode: bool, source: &str) -> Result<(), String> {
    let source = parse_location(source)?;
    with_state(dev_mode, |state| async move {
        let entries = state.workspaces.list(&source).await?;
        if entries.is_empty() {
            println!("No branches found");
        }
        for entry in &entries {
            println!("{}", format_entry(entry));
        }
        Ok(())
    })
}

pub fn status(dev_mode: bool, location: &str) -> Result<(), String> {
    let location = parse_location(location)?;
    with_state(dev_mode, |state| async move {
        let status = state.git.status(&location).await?;
        print!("{}", format_status(&status));
        Ok(())
    })
}

pub fn delete_workspace(dev_mode: bool, location: &str, force: bool) -> Result<(), String> {
    let location = parse_location(location)?;
    with_state(dev_mode, |state| async move {
        if !force && !state.git.is_work_tree(&location).await? {
            return Err(crate::Error::InvalidRequest(format!(
                "{location} is not a workspace; pass --force to delete it anyway"
            )));
        }
        state.projects.delete_workspace(&location).await?;
        println!("Deleted {}", location);
        Ok(())
    })
}

fn format_entry(entry: &BranchEntry) -> String {
    let workspace = entry
        .workspace
        .as_ref()
        .map(|w| w.to_string())
        .unwrap_or_else(|| "-".into());
    let marker = if entry.in_repository { "" } else { "  (workspace only)" };
    format!("{}\t{}{}", entry.branch, workspace, marker)
}

fn format_status(status: &GitStatus) -> String {
    let mut out = format!("On branch {}", status.branch);
    if status.ahead > 0 || status.behind > 0 {
        out.push_str(&format!(" [ahead {}, behind {}]", status.ahead, status.behind));
    }
    out.push('\n');
    if status.changes.is_empty() {
        out.push_str("Working tree clean\n");
    }
    for change in &status.changes {
        let area = if change.staged { "staged" } else { "unstaged" };
        out.push_str(&format!("  {} {:<8} {}\n", change.status.code(), area, change.file));
    }
    out
}
