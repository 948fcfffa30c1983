use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Remote command on {host} failed{}: {message}", status_suffix(.status))]
    RemoteExecution {
        host: String,
        status: Option<i32>,
        message: String,
    },

    #[error("Command output exceeded {limit} bytes")]
    OutputLimitExceeded { limit: usize },

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Materialization error: {0}")]
    Materialize(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Failed to start terminal: {0}")]
    SessionSpawn(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn status_suffix(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" (exit {code})"),
        None => String::new(),
    }
}

impl Error {
    /// The diagnostic text carried by command failures, without the wrapper prefix.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Error::RemoteExecution { message, .. } | Error::Git { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// Errors cross the IPC boundary as their display string
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_keeps_diagnostic_text() {
        let err = Error::RemoteExecution {
            host: "build-box".into(),
            status: Some(255),
            message: "ssh: Could not resolve hostname build-box".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote command on build-box failed (exit 255): ssh: Could not resolve hostname build-box"
        );
        assert_eq!(err.diagnostic(), Some("ssh: Could not resolve hostname build-box"));
    }

    #[test]
    fn serializes_as_display_string() {
        let err = Error::InvalidRequest("missing branch".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invalid request: missing branch\"");
    }
}
