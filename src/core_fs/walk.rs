use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use regex::bytes::Regex;
use tokio::fs;

/// Recursively collects the files under `root` with at least one line
/// matching `pattern`, as `/`-separated paths relative to `root`,
/// sorted ascending. Unreadable entries and directories are skipped
/// silently, matching the usual grep behavior for inaccessible files.
pub async fn search_directory(root: &Path, pattern: &Regex) -> Vec<String> {
    let mut matches = Vec::new();
    collect_matches(root.to_path_buf(), String::new(), pattern, &mut matches).await;
    matches.sort();
    matches
}

fn collect_matches<'a>(
    dir: PathBuf,
    prefix: String,
    pattern: &'a Regex,
    out: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                collect_matches(entry.path(), relative, pattern, &mut *out).await;
            } else if file_matches(&entry.path(), pattern).await {
                out.push(relative);
            }
        }
    })
}

/// A file matches if any of its newline-separated lines matches. Files
/// that cannot be read do not match.
async fn file_matches(path: &Path, pattern: &Regex) -> bool {
    match fs::read(path).await {
        Ok(contents) => contents.split(|&byte| byte == b'\n').any(|line| pattern.is_match(line)),
        Err(_) => false,
    }
}

/// Depth-first best-effort removal of `path`. Entries that cannot be
/// read or removed are skipped; symbolic links are removed, never
/// followed.
pub fn remove_recursively(path: PathBuf) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => return,
        };

        if metadata.is_dir() {
            if let Ok(mut entries) = fs::read_dir(&path).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    remove_recursively(entry.path()).await;
                }
            }
            let _ = fs::remove_dir(&path).await;
        } else {
            let _ = fs::remove_file(&path).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    #[tokio::test]
    async fn finds_matching_files_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::create_dir(dir.path().join("a")).unwrap();
        std_fs::create_dir(dir.path().join("b")).unwrap();
        std_fs::write(dir.path().join("a/one.txt"), "foo\n").unwrap();
        std_fs::write(dir.path().join("b/two.txt"), "bar\n").unwrap();
        std_fs::write(dir.path().join("c.txt"), "also foo here\n").unwrap();

        let pattern = Regex::new("foo").unwrap();
        let found = search_directory(dir.path(), &pattern).await;

        assert_eq!(found, vec!["a/one.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn matches_are_per_line() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("split.txt"), "fo\no\n").unwrap();

        let pattern = Regex::new("foo").unwrap();
        assert!(search_directory(dir.path(), &pattern).await.is_empty());
    }

    #[tokio::test]
    async fn non_utf8_contents_are_searchable() {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("blob.bin"), b"\xff\xfe needle \xff\n").unwrap();

        let pattern = Regex::new("needle").unwrap();
        assert_eq!(
            search_directory(dir.path(), &pattern).await,
            vec!["blob.bin"]
        );
    }

    #[tokio::test]
    async fn removes_a_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("victim");
        std_fs::create_dir_all(root.join("nested")).unwrap();
        std_fs::write(root.join("nested/file.txt"), "data").unwrap();
        std_fs::write(root.join("top.txt"), "data").unwrap();

        remove_recursively(root.clone()).await;

        assert!(!root.exists());
    }

    #[tokio::test]
    async fn removing_a_missing_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        remove_recursively(dir.path().join("absent")).await;
    }
}
