use std::path::Path;

use regex::bytes::Regex;

use crate::core_fs::sandbox::PathSandbox;
use crate::core_fs::walk;
use crate::error::GrassError;

/// Searches the working directory recursively for files with at least
/// one line matching `pattern`. The reply lists matching paths relative
/// to the working directory, sorted ascending, one per line.
pub async fn handle_grep(sandbox: &PathSandbox, pattern: &str) -> Result<String, GrassError> {
    let regex =
        Regex::new(pattern).map_err(|_| GrassError::Io("Failed to compile pattern".to_string()))?;

    let root = sandbox.current_dir()?;
    let files = walk::search_directory(Path::new(&root), &regex).await;

    let mut reply = String::new();
    for file in &files {
        reply.push_str(file);
        reply.push('\n');
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_matches_relative_to_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a/one.txt"), "foo\n").unwrap();
        std::fs::write(dir.path().join("b/two.txt"), "bar\n").unwrap();
        std::fs::write(dir.path().join("c.txt"), "foo\n").unwrap();
        let sandbox = PathSandbox::new(dir.path().to_str().unwrap());

        let reply = handle_grep(&sandbox, "foo").await.unwrap();
        assert_eq!(reply, "a/one.txt\nc.txt\n");
    }

    #[tokio::test]
    async fn no_match_yields_an_empty_reply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.txt"), "bar\n").unwrap();
        let sandbox = PathSandbox::new(dir.path().to_str().unwrap());

        assert_eq!(handle_grep(&sandbox, "foo").await.unwrap(), "");
    }

    #[tokio::test]
    async fn a_broken_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = PathSandbox::new(dir.path().to_str().unwrap());

        assert!(matches!(
            handle_grep(&sandbox, "(unclosed").await,
            Err(GrassError::Io(_))
        ));
    }
}
