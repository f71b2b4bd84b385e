use chrono::Local;

use crate::constants::DATE_FORMAT;

/// Server local time.
pub fn handle_date() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}
