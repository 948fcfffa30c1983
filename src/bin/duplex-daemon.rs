//! Duplex daemon: serves sessions, workspaces and git over local IPC.

fn main() {
    if let Err(e) = duplex_lib::daemon::run_daemon() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
