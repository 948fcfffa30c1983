//! Background daemon owning sessions and serving the front end over
//! newline-delimited JSON on a loopback TCP port.

pub mod client;
pub mod logging;
pub mod pid;
pub mod protocol;
pub mod server;

pub use server::{run_daemon, serve, DaemonPaths};
