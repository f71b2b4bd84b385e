use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::constants::MAX_PATH_LENGTH;
use crate::core_fs::sandbox::{extract_filename, PathSandbox};
use crate::core_network::transfer;
use crate::error::GrassError;

/// Starts an upload of `<size>` bytes. The file is stored under its
/// basename in the working directory regardless of any directory
/// prefix the client supplied; the reply names the ephemeral data
/// port.
pub async fn handle_put(
    sandbox: &PathSandbox,
    args: &[&str],
    slots: &Arc<Semaphore>,
) -> Result<String, GrassError> {
    if args.len() < 3 {
        return Err(GrassError::Missing("arguments"));
    }
    if args[1].len() > MAX_PATH_LENGTH {
        return Err(GrassError::PathTooLong);
    }

    let size: u64 = args[2].parse().map_err(|_| GrassError::InvalidSize)?;
    if size == 0 {
        return Err(GrassError::InvalidSize);
    }

    let path = sandbox.resolve(extract_filename(args[1]))?;
    let ticket = transfer::start_put(&path, size, slots).await?;
    Ok(format!("put port: {}", ticket.port))
}
