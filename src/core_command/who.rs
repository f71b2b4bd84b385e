use crate::server::Shared;

/// The usernames authenticated on any live session, sorted ascending,
/// each followed by a space.
pub fn handle_w(shared: &Shared) -> String {
    shared.logged_users()
}
