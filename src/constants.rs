// src/constants.rs

/// Capacity of the per-connection line reassembly ring. At most
/// `LINE_BUFFER_SIZE - 1` bytes are buffered at any time so that a full
/// buffer can be told apart from an empty one.
pub const LINE_BUFFER_SIZE: usize = 4096;

/// Longest absolute path (base directory included) a command may address.
pub const MAX_PATH_LENGTH: usize = 128;

/// Upper bound on concurrently running `get`/`put` side-channel workers.
pub const MAX_ACTIVE_TRANSFERS: usize = 32;

pub const DIRECTORY_NAME_REGEX: &str = r"^[A-Za-z0-9_-]+$";
pub const HOSTNAME_REGEX: &str = r"^[a-z0-9.\-:]+$";

/// Format of the `date` reply.
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Z %Y";

/// Modification-time column format in `ls` listings.
pub const LS_TIME_FORMAT: &str = "%b %e %H:%M";
