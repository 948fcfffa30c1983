pub mod cli;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod error;
pub mod git;
pub mod launchers;
pub mod location;
pub mod project;
pub mod remote;
pub mod session;
pub mod settings;
pub mod state;
pub mod util;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
