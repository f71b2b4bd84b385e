use std::fs::Metadata;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;

use chrono::{DateTime, Local};
use tokio::fs;

use crate::constants::LS_TIME_FORMAT;
use crate::error::GrassError;

/// Lists the working directory in long form: mode string, size,
/// modification time and name, one entry per line, sorted by name.
pub async fn handle_ls(path: &str) -> Result<String, GrassError> {
    let mut entries = fs::read_dir(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => GrassError::NoSuchEntry,
        _ => GrassError::Io("ls() failed".to_string()),
    })?;

    let mut rows: Vec<(String, Metadata)> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|_| GrassError::Io("ls() failed".to_string()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        // Entries that vanish mid-listing are skipped.
        if let Ok(metadata) = entry.metadata().await {
            rows.push((name, metadata));
        }
    }

    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut listing = String::new();
    for (name, metadata) in &rows {
        let mtime: DateTime<Local> = metadata
            .modified()
            .map(Into::into)
            .unwrap_or_else(|_| Local::now());
        listing.push_str(&format!(
            "{} {:>10} {} {}\n",
            format_mode(metadata),
            metadata.len(),
            mtime.format(LS_TIME_FORMAT),
            name
        ));
    }

    Ok(listing)
}

/// Renders the Unix mode string (`drwxr-xr-x` style) of an entry.
fn format_mode(metadata: &Metadata) -> String {
    let kind = if metadata.is_dir() {
        'd'
    } else if metadata.file_type().is_symlink() {
        'l'
    } else {
        '-'
    };

    let bits = metadata.permissions().mode();
    let mut mode = String::with_capacity(10);
    mode.push(kind);
    for shift in [6, 3, 0] {
        let triplet = (bits >> shift) & 0o7;
        mode.push(if triplet & 0o4 != 0 { 'r' } else { '-' });
        mode.push(if triplet & 0o2 != 0 { 'w' } else { '-' });
        mode.push(if triplet & 0o1 != 0 { 'x' } else { '-' });
    }
    mode
}
