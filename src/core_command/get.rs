use std::io::ErrorKind;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Semaphore;

use crate::core_fs::sandbox::PathSandbox;
use crate::core_network::transfer;
use crate::error::GrassError;

/// Starts a download. The target must be a regular file; the reply
/// names the ephemeral data port and the file size.
pub async fn handle_get(
    sandbox: &PathSandbox,
    arg: &str,
    slots: &Arc<Semaphore>,
) -> Result<String, GrassError> {
    let path = sandbox.resolve(arg)?;

    let metadata = fs::metadata(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => GrassError::NoSuchEntry,
        _ => GrassError::Io("stat() failed".to_string()),
    })?;
    if !metadata.is_file() {
        return Err(GrassError::NotAFile);
    }

    let ticket = transfer::start_get(&path, slots).await?;
    Ok(format!("get port: {} size: {}", ticket.port, ticket.size))
}
