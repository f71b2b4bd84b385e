use regex::Regex;
use tokio::process::Command;

use crate::constants::HOSTNAME_REGEX;
use crate::error::GrassError;

/// Pings a host once and returns the combined output. Hostnames may
/// contain lowercase letters, digits, dots, dashes and (for IPv6
/// addresses) colons; anything else is refused before a process is
/// spawned. The host is passed as a positional argument, never through
/// a shell.
pub async fn handle_ping(host: &str) -> Result<String, GrassError> {
    let valid = Regex::new(HOSTNAME_REGEX).unwrap();
    if !valid.is_match(host) {
        return Err(GrassError::InvalidHostname);
    }

    let output = Command::new("ping")
        .args(["-c", "1", host])
        .output()
        .await
        .map_err(|_| GrassError::Io("ping() failed".to_string()))?;

    let mut reply = String::from_utf8_lossy(&output.stdout).into_owned();
    reply.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(reply)
}
