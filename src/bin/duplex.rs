//! Duplex CLI
//!
//! Usage:
//!   duplex daemon start [--foreground] [--dev]
//!   duplex daemon stop|status|restart [--dev]
//!   duplex daemon logs [-f] [-n 50] [--dev]
//!   duplex open-branch <source> <branch>
//!   duplex workspaces <source>
//!   duplex status <location>
//!   duplex delete-workspace <location> [--force]

fn main() {
    duplex_lib::cli::run();
}
