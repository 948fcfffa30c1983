//! Explicit results for git queries whose failure is an expected empty state.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Anticipated "nothing here" conditions that are not errors to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    NoUpstream,
    NotARepository,
    NoCommits,
    NoRemote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Value(T),
    Empty(EmptyState),
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(value) => Outcome::Value(f(value)),
            Outcome::Empty(state) => Outcome::Empty(state),
        }
    }

    pub fn value_or(self, default: T) -> T {
        match self {
            Outcome::Value(value) => value,
            Outcome::Empty(_) => default,
        }
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Empty(state) => Some(*state),
        }
    }
}

/// Recognize an expected empty state from a failed git command's diagnostics.
///
/// Transport failures and anything unrecognized return `None` and stay errors.
pub fn classify(err: &Error) -> Option<EmptyState> {
    match err {
        Error::Git { .. } => {}
        // Without an exit status the command never ran remotely
        Error::RemoteExecution { status: Some(_), .. } => {}
        _ => return None,
    }
    let text = err.diagnostic()?.to_lowercase();

    if text.contains("not a git repository") {
        Some(EmptyState::NotARepository)
    } else if text.contains("no upstream configured")
        || text.contains("no such branch")
        || text.contains("does not point to a branch")
    {
        Some(EmptyState::NoUpstream)
    } else if text.contains("does not have any commits yet")
        || text.contains("bad default revision 'head'")
        || text.contains("ambiguous argument 'head")
        || text.contains("bad revision 'head")
        || text.contains("unknown revision or path not in the working tree")
        || text.contains("needed a single revision")
        || text.contains("could not resolve head")
    {
        Some(EmptyState::NoCommits)
    } else if text.contains("no such remote") {
        Some(EmptyState::NoRemote)
    } else {
        None
    }
}
