//! High-level git operations used by the git panel and the workspace layer.
//!
//! Queries that hit an expected empty state (no upstream, no commits, not a
//! repository) return empty/zero values. Mutations surface their failures.

use std::sync::Arc;

use tracing::{debug, warn};

use super::outcome::{classify, EmptyState, Outcome};
use super::status::{parse_ahead_behind, parse_porcelain, GitStatus};
use super::VcsRunner;
use crate::error::{Error, Result};
use crate::location::ProjectLocation;

/// Branch name reported when the current branch cannot be determined.
pub const UNKNOWN_BRANCH: &str = "unknown";

#[derive(Clone)]
pub struct GitService {
    runner: Arc<dyn VcsRunner>,
}

impl GitService {
    pub fn new(runner: Arc<dyn VcsRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<dyn VcsRunner> {
        &self.runner
    }

    pub async fn run(&self, location: &ProjectLocation, args: &[&str]) -> Result<String> {
        self.runner.run(location, args).await
    }

    /// Run a query, turning recognized empty states into [`Outcome::Empty`].
    pub async fn query(&self, location: &ProjectLocation, args: &[&str]) -> Result<Outcome<String>> {
        match self.runner.run(location, args).await {
            Ok(output) => Ok(Outcome::Value(output)),
            Err(err) => match classify(&err) {
                Some(state) => {
                    debug!(location = %location, args = ?args, state = ?state, "git empty state");
                    Ok(Outcome::Empty(state))
                }
                None => Err(err),
            },
        }
    }

    // First attempt that succeeds wins; otherwise the last failure is returned
    async fn first_success(&self, location: &ProjectLocation, attempts: &[&[&str]]) -> Result<String> {
        let mut last_err = None;
        for args in attempts {
            match self.runner.run(location, args).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    debug!(args = ?args, error = %err, "git attempt failed, trying fallback");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::InvalidRequest("no git command given".into())))
    }

    pub async fn is_work_tree(&self, location: &ProjectLocation) -> Result<bool> {
        let outcome = self
            .query(location, &["rev-parse", "--is-inside-work-tree"])
            .await?;
        Ok(matches!(outcome, Outcome::Value(out) if out.trim() == "true"))
    }

    pub async fn current_branch(&self, location: &ProjectLocation) -> Result<String> {
        match self.query(location, &["rev-parse", "--abbrev-ref", "HEAD"]).await? {
            Outcome::Value(out) => Ok(out.trim().to_string()),
            // An unborn branch still has a name
            Outcome::Empty(EmptyState::NoCommits) => {
                match self.query(location, &["symbolic-ref", "--short", "HEAD"]).await? {
                    Outcome::Value(out) => Ok(out.trim().to_string()),
                    Outcome::Empty(_) => Ok(UNKNOWN_BRANCH.to_string()),
                }
            }
            Outcome::Empty(_) => Ok(UNKNOWN_BRANCH.to_string()),
        }
    }

    /// URL of `origin`, or `None` when there is no such remote.
    pub async fn remote_url(&self, location: &ProjectLocation) -> Result<Option<String>> {
        let outcome = self.query(location, &["remote", "get-url", "origin"]).await?;
        Ok(match outcome {
            Outcome::Value(out) if !out.trim().is_empty() => Some(out.trim().to_string()),
            _ => None,
        })
    }

    pub async fn list_branches(&self, location: &ProjectLocation) -> Result<Vec<String>> {
        let outcome = self
            .query(location, &["branch", "--format=%(refname:short)"])
            .await?;
        Ok(outcome
            .map(|out| {
                out.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect()
            })
            .value_or(Vec::new()))
    }

    pub async fn ahead_behind(&self, location: &ProjectLocation) -> Result<(u32, u32)> {
        let outcome = self
            .query(location, &["rev-list", "--left-right", "--count", "HEAD...@{upstream}"])
            .await?;
        Ok(outcome.map(|out| parse_ahead_behind(&out)).value_or((0, 0)))
    }

    pub async fn status(&self, location: &ProjectLocation) -> Result<GitStatus> {
        let branch = self.current_branch(location).await?;
        let (ahead, behind) = self.ahead_behind(location).await?;
        let changes = self
            .query(location, &["status", "--porcelain=v1"])
            .await?
            .map(|out| parse_porcelain(&out))
            .value_or(Vec::new());

        Ok(GitStatus {
            branch,
            ahead,
            behind,
            changes,
        })
    }

    pub async fn file_diff(&self, location: &ProjectLocation, file: &str, staged: bool) -> Result<String> {
        let outcome = if staged {
            self.query(location, &["diff", "--cached", "--", file]).await?
        } else {
            self.query(location, &["diff", "--", file]).await?
        };
        Ok(outcome.value_or(String::new()))
    }

    pub async fn checkout_branch(&self, location: &ProjectLocation, branch: &str) -> Result<()> {
        self.run(location, &["checkout", branch]).await?;
        Ok(())
    }

    pub async fn checkout_new_branch(&self, location: &ProjectLocation, branch: &str) -> Result<()> {
        self.run(location, &["checkout", "-b", branch]).await?;
        Ok(())
    }

    pub async fn stage_file(&self, location: &ProjectLocation, file: &str) -> Result<()> {
        self.run(location, &["add", "--", file]).await?;
        Ok(())
    }

    pub async fn stage_all(&self, location: &ProjectLocation) -> Result<()> {
        self.run(location, &["add", "-A"]).await?;
        Ok(())
    }

    pub async fn unstage_file(&self, location: &ProjectLocation, file: &str) -> Result<()> {
        self.unstage(location, file).await
    }

    pub async fn unstage_all(&self, location: &ProjectLocation) -> Result<()> {
        self.unstage(location, ".").await
    }

    async fn unstage(&self, location: &ProjectLocation, pathspec: &str) -> Result<()> {
        let attempts: [&[&str]; 2] = [
            &["restore", "--staged", "--", pathspec],
            &["reset", "HEAD", "--", pathspec],
        ];
        match self.first_success(location, &attempts).await {
            Ok(_) => Ok(()),
            // Before the first commit there is no HEAD to reset to; drop the index entries instead
            Err(err) if classify(&err) == Some(EmptyState::NoCommits) => {
                self.run(
                    location,
                    &["rm", "--cached", "-r", "-q", "--ignore-unmatch", "--", pathspec],
                )
                .await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn commit(&self, location: &ProjectLocation, message: &str) -> Result<()> {
        self.run(location, &["commit", "-m", message]).await?;
        Ok(())
    }

    /// Amend the last commit; a blank message keeps the existing one.
    pub async fn amend(&self, location: &ProjectLocation, message: Option<&str>) -> Result<()> {
        match message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(message) => self.run(location, &["commit", "--amend", "-m", message]).await?,
            None => self.run(location, &["commit", "--amend", "--no-edit"]).await?,
        };
        Ok(())
    }

    pub async fn push(&self, location: &ProjectLocation) -> Result<()> {
        self.run(location, &["push"]).await?;
        Ok(())
    }

    /// Push the current branch to `origin` and set it as upstream.
    pub async fn publish(&self, location: &ProjectLocation) -> Result<()> {
        let branch = self.current_branch(location).await?;
        if branch == UNKNOWN_BRANCH || branch == "HEAD" {
            return Err(Error::InvalidRequest(
                "cannot publish: no branch is checked out".into(),
            ));
        }
        self.run(location, &["push", "-u", "origin", &branch]).await?;
        Ok(())
    }

    /// Revert one file's worktree changes, deleting it if it is untracked.
    pub async fn discard_file(&self, location: &ProjectLocation, file: &str) -> Result<()> {
        let attempts: [&[&str]; 3] = [
            &["restore", "--worktree", "--", file],
            &["checkout", "--", file],
            &["clean", "-f", "--", file],
        ];
        self.first_success(location, &attempts).await?;
        Ok(())
    }

    /// Revert all worktree changes and remove untracked files and directories.
    pub async fn discard_all(&self, location: &ProjectLocation) -> Result<()> {
        let attempts: [&[&str]; 2] = [&["restore", "--worktree", "."], &["checkout", "--", "."]];
        self.first_success(location, &attempts).await?;

        if let Err(err) = self.run(location, &["clean", "-fd"]).await {
            warn!(location = %location, error = %err, "git clean after discard failed");
        }
        Ok(())
    }
}
