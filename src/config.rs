use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("Missing or out-of-range `port` directive")]
    InvalidPort,
    #[error("Missing `base` directive")]
    MissingBase,
    #[error("`base` must be an absolute path")]
    RelativeBase,
}

/// Server configuration, immutable after load.
///
/// The file format is one directive per line; `#` starts a comment that
/// runs to the end of the line. Recognized directives:
///
/// ```text
/// base <absolute path>
/// port <0..65535>
/// user <name> <password>
/// ```
///
/// `base` and `port` are required; later occurrences override earlier
/// ones. A `user` line whose password contains whitespace is ignored,
/// as are unrecognized lines.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub base_dir: String,
    credentials: HashMap<String, String>,
}

impl Config {
    pub fn parse_from_file(path: &str) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let mut base_dir: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut credentials = HashMap::new();

        for raw in text.lines() {
            let line = match raw.find('#') {
                Some(index) => &raw[..index],
                None => raw,
            };

            if let Some(rest) = line.strip_prefix("base ") {
                base_dir = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("port ") {
                port = rest.trim().parse().ok();
            } else if let Some(rest) = line.strip_prefix("user ") {
                // Exactly two fields separated by a single space; anything
                // else (including whitespace in the password) is ignored.
                let fields: Vec<&str> = rest.split(' ').collect();
                if fields.len() == 2 && !fields[0].is_empty() && !fields[1].is_empty() {
                    credentials.insert(fields[0].to_string(), fields[1].to_string());
                }
            }
        }

        let port = port.ok_or(ConfigError::InvalidPort)?;
        let base_dir = base_dir.ok_or(ConfigError::MissingBase)?;
        if !base_dir.starts_with('/') {
            return Err(ConfigError::RelativeBase);
        }

        Ok(Config {
            port,
            base_dir,
            credentials,
        })
    }

    pub fn check_login(&self, username: &str, password: &str) -> bool {
        self.credentials
            .get(username)
            .map_or(false, |expected| expected.as_str() == password)
    }
}
