use std::io::ErrorKind;

use tokio::fs;

use crate::core_fs::sandbox::PathSandbox;
use crate::error::GrassError;

/// Changes the working directory. The target must resolve inside the
/// sandbox and be an existing directory; the working directory is only
/// replaced once both checks pass.
pub async fn handle_cd(sandbox: &mut PathSandbox, arg: &str) -> Result<String, GrassError> {
    let segments = sandbox.tokenize(arg)?;
    let path = sandbox.join(&segments)?;

    let metadata = fs::metadata(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => GrassError::NoSuchEntry,
        _ => GrassError::Io("stat() failed".to_string()),
    })?;
    if !metadata.is_dir() {
        return Err(GrassError::NotADirectory);
    }

    sandbox.update(segments);
    Ok(String::new())
}
