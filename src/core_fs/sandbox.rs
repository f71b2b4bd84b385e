use crate::constants::MAX_PATH_LENGTH;
use crate::error::GrassError;

/// Per-session working directory, confined to a base directory.
///
/// The working directory is a vector of path segments relative to the
/// base; segments never contain `/`, `.` or `..`. Because the only way
/// to change it is `tokenize` (which refuses absolute paths and never
/// pops past the base) followed by `update`, every path built through
/// `join` is a descendant of the base directory.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: String,
    cwd: Vec<String>,
}

impl PathSandbox {
    pub fn new(root: &str) -> Self {
        PathSandbox {
            root: root.trim_end_matches('/').to_string(),
            cwd: Vec::new(),
        }
    }

    /// Resolves `relative` against the working directory into a segment
    /// vector. Empty and `.` segments are skipped, `..` pops one
    /// segment. Absolute paths and `..` applied at the base are denied.
    pub fn tokenize(&self, relative: &str) -> Result<Vec<String>, GrassError> {
        if relative.starts_with('/') {
            return Err(GrassError::AccessDenied);
        }

        let mut segments = self.cwd.clone();
        for token in relative.split('/') {
            match token {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(GrassError::AccessDenied);
                    }
                }
                segment => segments.push(segment.to_string()),
            }
        }

        Ok(segments)
    }

    /// Concatenates the base directory and `segments` into an absolute
    /// path string.
    pub fn join(&self, segments: &[String]) -> Result<String, GrassError> {
        let mut path = self.root.clone();
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }

        if path.len() > MAX_PATH_LENGTH {
            return Err(GrassError::PathTooLong);
        }

        Ok(path)
    }

    /// `tokenize` followed by `join`, for commands that address a path
    /// without changing the working directory.
    pub fn resolve(&self, relative: &str) -> Result<String, GrassError> {
        self.join(&self.tokenize(relative)?)
    }

    /// Absolute path of the current working directory.
    pub fn current_dir(&self) -> Result<String, GrassError> {
        self.join(&self.cwd)
    }

    /// Replaces the working directory. Only called after the target has
    /// been verified to be a directory.
    pub fn update(&mut self, segments: Vec<String>) {
        self.cwd = segments;
    }
}

/// The substring after the final `/`, or the whole path if there is
/// none. `put` stores uploads under this name in the working directory
/// no matter which directory prefix the client supplied.
pub fn extract_filename(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}
