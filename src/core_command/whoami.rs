/// The authenticated username. Reachable only from an authenticated
/// session, so the reply is never empty in practice.
pub fn handle_whoami(username: &str) -> String {
    username.to_string()
}
