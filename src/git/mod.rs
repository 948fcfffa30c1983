//! Version-control access for local and remote locations.

mod ops;
mod outcome;
mod runner;
mod status;

pub use ops::{GitService, UNKNOWN_BRANCH};
pub use outcome::{classify, EmptyState, Outcome};
pub use runner::{remote_command, GitRunner, VcsRunner};
pub use status::{parse_ahead_behind, parse_porcelain, FileStatus, GitFileChange, GitStatus};
