use std::io::ErrorKind;

use regex::Regex;
use tokio::fs;

use crate::constants::DIRECTORY_NAME_REGEX;
use crate::core_fs::sandbox::PathSandbox;
use crate::error::GrassError;

/// Creates a directory in the working directory. The name must be a
/// single segment of `[A-Za-z0-9_-]` characters.
pub async fn handle_mkdir(sandbox: &PathSandbox, name: &str) -> Result<String, GrassError> {
    let valid = Regex::new(DIRECTORY_NAME_REGEX).unwrap();
    if !valid.is_match(name) {
        return Err(GrassError::InvalidName);
    }

    let path = sandbox.resolve(name)?;
    match fs::create_dir(&path).await {
        Ok(()) => Ok(String::new()),
        Err(e) => Err(match e.kind() {
            ErrorKind::NotFound => GrassError::NoSuchEntry,
            ErrorKind::AlreadyExists => GrassError::AlreadyExists,
            _ => GrassError::Io("mkdir() failed".to_string()),
        }),
    }
}
