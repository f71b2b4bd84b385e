use thiserror::Error;

/// Command-level errors surfaced to the client.
///
/// Every variant renders to the exact message that crosses the wire in a
/// `Error: <command>: <message>` reply line. Session-fatal conditions
/// (broken sockets, oversized lines) are `std::io::Error`s instead and
/// never reach this enum.
#[derive(Debug, Error)]
pub enum GrassError {
    #[error("Access denied")]
    AccessDenied,
    #[error("The path is too long")]
    PathTooLong,
    #[error("Not a directory")]
    NotADirectory,
    #[error("Not a file")]
    NotAFile,
    #[error("No such file or directory")]
    NoSuchEntry,
    #[error("Directory already exists")]
    AlreadyExists,
    #[error("Invalid directory name")]
    InvalidName,
    #[error("Invalid hostname")]
    InvalidHostname,
    #[error("Invalid command")]
    InvalidCommand,
    #[error("Invalid size")]
    InvalidSize,
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("{0}")]
    Io(String),
}

impl GrassError {
    /// Wire form of a failed command, without the reply terminator.
    pub fn to_wire(&self, command: &str) -> String {
        format!("Error: {}: {}", command, self)
    }
}
