use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;

use crate::core_fs::sandbox::PathSandbox;
use crate::core_fs::walk;
use crate::error::GrassError;

/// Recursively removes a path inside the sandbox. Removal is
/// best-effort: unreadable entries are skipped silently. The literal
/// arguments `.` and `..` are refused outright.
pub async fn handle_rm(sandbox: &PathSandbox, arg: &str) -> Result<String, GrassError> {
    if arg == "." || arg == ".." {
        return Err(GrassError::AccessDenied);
    }

    let path = sandbox.resolve(arg)?;

    // The target must exist; anything after that is best-effort.
    fs::symlink_metadata(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => GrassError::NoSuchEntry,
        _ => GrassError::Io("stat() failed".to_string()),
    })?;

    walk::remove_recursively(PathBuf::from(path)).await;
    Ok(String::new())
}
