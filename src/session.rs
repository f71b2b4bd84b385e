use std::io;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::constants::MAX_PATH_LENGTH;
use crate::core_command::command::GrassCommand;
use crate::core_command::{cd, date, get, grep, ls, mkdir, ping, put, rm, who, whoami};
use crate::core_fs::sandbox::PathSandbox;
use crate::core_network::line_buffer::LineBuffer;
use crate::error::GrassError;
use crate::server::Shared;

#[derive(Clone, Debug)]
enum AuthState {
    Anonymous,
    AwaitingPassword(String),
    Authenticated(String),
}

/// Per-connection protocol state: the peer socket, the inbound line
/// buffer, the authentication state and the sandboxed working
/// directory. The session owns its socket exclusively; dropping the
/// session closes it.
pub struct Session {
    id: u64,
    stream: TcpStream,
    buffer: LineBuffer,
    auth: AuthState,
    sandbox: PathSandbox,
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(id: u64, stream: TcpStream, shared: Arc<Shared>) -> Session {
        Session {
            id,
            stream,
            buffer: LineBuffer::new(),
            auth: AuthState::Anonymous,
            sandbox: PathSandbox::new(&shared.config.base_dir),
            shared,
        }
    }

    /// Drives the session until the peer closes, sends `exit`, or a
    /// fatal error occurs. Always deregisters the session on the way
    /// out.
    pub async fn serve(mut self) {
        loop {
            if let Err(e) = self.stream.readable().await {
                debug!("session {}: readiness lost: {}", self.id, e);
                break;
            }

            match self.on_new_data().await {
                Ok(false) => {}
                Ok(true) => break,
                Err(e) => {
                    warn!("session {}: {}", self.id, e);
                    let message = format!("Error: {}\n", e);
                    let _ = self.stream.write_all(message.as_bytes()).await;
                    break;
                }
            }
        }

        self.shared.set_logged(self.id, None);
    }

    /// Drains and executes every complete line currently buffered.
    /// Returns true when the session should terminate (peer closed or
    /// `exit` received).
    pub async fn on_new_data(&mut self) -> io::Result<bool> {
        loop {
            match self.buffer.next_line(&mut self.stream)? {
                (Some(line), _) => {
                    if self.dispatch(&line).await? {
                        return Ok(true);
                    }
                }
                (None, closed) => return Ok(closed),
            }
        }
    }

    /// Executes one command line and writes the framed reply. Returns
    /// true for `exit`, which yields no reply at all.
    async fn dispatch(&mut self, line: &str) -> io::Result<bool> {
        let args: Vec<&str> = line.split_ascii_whitespace().collect();

        if args.first() == Some(&"exit") {
            debug!("session {}: exit", self.id);
            return Ok(true);
        }

        let reply = match self.execute(&args).await {
            Ok(reply) => reply,
            Err(e) => {
                let command = args.first().copied().unwrap_or("");
                info!("session {}: {}: {}", self.id, command, e);
                e.to_wire(command)
            }
        };

        self.send_reply(&reply).await?;
        Ok(false)
    }

    /// Runs one tokenized command through the state machine and returns
    /// the reply payload (without framing).
    pub async fn execute(&mut self, args: &[&str]) -> Result<String, GrassError> {
        let Some(&command) = args.first() else {
            return Ok(String::new());
        };

        // An in-flight login must be completed or abandoned before
        // anything else.
        if let AuthState::AwaitingPassword(user) = self.auth.clone() {
            if command != "pass" {
                self.auth = AuthState::Anonymous;
                return Ok("Login interrupted".to_string());
            }
            let Some(password) = args.get(1) else {
                // Not an attempt yet; the login stays pending.
                return Err(GrassError::Missing("password"));
            };
            return Ok(self.finish_login(user, password));
        }

        match GrassCommand::from_str(command) {
            Some(GrassCommand::Login) => {
                let Some(user) = args.get(1) else {
                    return Err(GrassError::Missing("username"));
                };
                self.start_login(user);
                Ok(String::new())
            }
            Some(GrassCommand::Pass) => Err(GrassError::InvalidCommand),
            Some(GrassCommand::Ping) => {
                let Some(host) = args.get(1) else {
                    return Err(GrassError::Missing("host"));
                };
                ping::handle_ping(host).await
            }
            Some(command) => {
                debug_assert!(command.is_privileged());
                if let AuthState::Authenticated(_) = self.auth {
                    self.execute_privileged(command, args).await
                } else {
                    Err(GrassError::AccessDenied)
                }
            }
            None => Err(GrassError::InvalidCommand),
        }
    }

    async fn execute_privileged(
        &mut self,
        command: GrassCommand,
        args: &[&str],
    ) -> Result<String, GrassError> {
        match command {
            GrassCommand::Ls => ls::handle_ls(&self.sandbox.current_dir()?).await,
            GrassCommand::Cd => cd::handle_cd(&mut self.sandbox, validate_path_arg(args)?).await,
            GrassCommand::Mkdir => {
                mkdir::handle_mkdir(&self.sandbox, validate_path_arg(args)?).await
            }
            GrassCommand::Rm => rm::handle_rm(&self.sandbox, validate_path_arg(args)?).await,
            GrassCommand::Get => {
                get::handle_get(
                    &self.sandbox,
                    validate_path_arg(args)?,
                    &self.shared.transfers,
                )
                .await
            }
            GrassCommand::Put => put::handle_put(&self.sandbox, args, &self.shared.transfers).await,
            GrassCommand::Grep => {
                let Some(pattern) = args.get(1) else {
                    return Err(GrassError::Missing("pattern"));
                };
                grep::handle_grep(&self.sandbox, pattern).await
            }
            GrassCommand::Date => Ok(date::handle_date()),
            GrassCommand::Whoami => Ok(whoami::handle_whoami(self.username())),
            GrassCommand::W => Ok(who::handle_w(&self.shared)),
            GrassCommand::Logout => {
                self.logout();
                Ok(String::new())
            }
            // login/pass/ping never reach this point.
            _ => Err(GrassError::InvalidCommand),
        }
    }

    /// Starting a new login drops any prior authentication, so a failed
    /// attempt always lands in the anonymous state.
    fn start_login(&mut self, user: &str) {
        if matches!(self.auth, AuthState::Authenticated(_)) {
            self.shared.set_logged(self.id, None);
        }
        self.auth = AuthState::AwaitingPassword(user.to_string());
    }

    fn finish_login(&mut self, user: String, password: &str) -> String {
        if self.shared.check_login(&user, password) {
            info!("session {}: {} logged in", self.id, user);
            self.shared.set_logged(self.id, Some(user.clone()));
            self.auth = AuthState::Authenticated(user);
            String::new()
        } else {
            info!("session {}: failed login attempt as {}", self.id, user);
            self.auth = AuthState::Anonymous;
            "Wrong credentials".to_string()
        }
    }

    fn logout(&mut self) {
        info!("session {}: {} logged out", self.id, self.username());
        self.shared.set_logged(self.id, None);
        self.auth = AuthState::Anonymous;
    }

    pub fn username(&self) -> &str {
        match &self.auth {
            AuthState::Authenticated(user) => user,
            _ => "",
        }
    }

    /// Frames and writes one reply: the payload gains a trailing
    /// newline if it lacks one, then the empty-line terminator follows.
    /// An empty payload is just the terminator.
    async fn send_reply(&mut self, reply: &str) -> io::Result<()> {
        let mut framed = String::with_capacity(reply.len() + 2);
        framed.push_str(reply);
        if !framed.is_empty() && !framed.ends_with('\n') {
            framed.push('\n');
        }
        framed.push('\n');
        self.stream.write_all(framed.as_bytes()).await
    }
}

fn validate_path_arg<'a>(args: &[&'a str]) -> Result<&'a str, GrassError> {
    let Some(&arg) = args.get(1) else {
        return Err(GrassError::Missing("argument"));
    };
    if arg.len() > MAX_PATH_LENGTH {
        return Err(GrassError::PathTooLong);
    }
    Ok(arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::Path;
    use tokio::net::TcpListener;

    async fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        (accepted.unwrap().0, connected.unwrap())
    }

    fn shared_for(base: &Path) -> Arc<Shared> {
        let config = Config::parse(&format!(
            "base {}\nport 0\nuser alice secret\nuser bob qwerty\n",
            base.display()
        ))
        .unwrap();
        Arc::new(Shared::new(config))
    }

    async fn session_with(shared: &Arc<Shared>, id: u64) -> (Session, TcpStream) {
        let (server_half, client_half) = stream_pair().await;
        (Session::new(id, server_half, Arc::clone(shared)), client_half)
    }

    #[tokio::test]
    async fn login_then_pass_then_whoami() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        assert_eq!(session.execute(&["login", "alice"]).await.unwrap(), "");
        assert_eq!(session.execute(&["pass", "secret"]).await.unwrap(), "");
        assert_eq!(session.execute(&["whoami"]).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn wrong_credentials_reset_to_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        session.execute(&["login", "alice"]).await.unwrap();
        assert_eq!(
            session.execute(&["pass", "wrong"]).await.unwrap(),
            "Wrong credentials"
        );
        // The single attempt is spent: `pass` is now an invalid command
        // and privileged commands are still refused.
        assert!(matches!(
            session.execute(&["pass", "secret"]).await,
            Err(GrassError::InvalidCommand)
        ));
        assert!(matches!(
            session.execute(&["ls"]).await,
            Err(GrassError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn non_pass_command_interrupts_a_login() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        session.execute(&["login", "alice"]).await.unwrap();
        assert_eq!(
            session.execute(&["ls"]).await.unwrap(),
            "Login interrupted"
        );
        assert!(matches!(
            session.execute(&["ls"]).await,
            Err(GrassError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn a_missing_password_keeps_the_login_pending() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        session.execute(&["login", "alice"]).await.unwrap();
        assert!(matches!(
            session.execute(&["pass"]).await,
            Err(GrassError::Missing("password"))
        ));
        assert_eq!(session.execute(&["pass", "secret"]).await.unwrap(), "");
        assert_eq!(session.username(), "alice");
    }

    #[tokio::test]
    async fn privileged_commands_require_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        for command in ["ls", "cd", "mkdir", "rm", "get", "put", "grep", "date", "whoami", "w", "logout"] {
            assert!(
                matches!(
                    session.execute(&[command, "x", "1"]).await,
                    Err(GrassError::AccessDenied)
                ),
                "{} should be refused",
                command
            );
        }
    }

    #[tokio::test]
    async fn ping_is_available_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        // Invalid hostname proves the command was dispatched rather
        // than refused outright.
        assert!(matches!(
            session.execute(&["ping", "BAD HOST"]).await,
            Err(GrassError::InvalidHostname)
        ));
    }

    #[tokio::test]
    async fn empty_lines_yield_an_empty_reply() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        assert_eq!(session.execute(&[]).await.unwrap(), "");
    }

    #[tokio::test]
    async fn unknown_commands_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        assert!(matches!(
            session.execute(&["frobnicate"]).await,
            Err(GrassError::InvalidCommand)
        ));
    }

    #[tokio::test]
    async fn w_lists_users_across_sessions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut a, _peer_a) = session_with(&shared, 0).await;
        let (mut b, _peer_b) = session_with(&shared, 1).await;

        b.execute(&["login", "bob"]).await.unwrap();
        b.execute(&["pass", "qwerty"]).await.unwrap();
        a.execute(&["login", "alice"]).await.unwrap();
        a.execute(&["pass", "secret"]).await.unwrap();

        assert_eq!(a.execute(&["w"]).await.unwrap(), "alice bob ");
    }

    #[tokio::test]
    async fn logout_returns_to_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        session.execute(&["login", "alice"]).await.unwrap();
        session.execute(&["pass", "secret"]).await.unwrap();
        assert_eq!(session.execute(&["logout"]).await.unwrap(), "");
        assert!(matches!(
            session.execute(&["whoami"]).await,
            Err(GrassError::AccessDenied)
        ));
        assert_eq!(shared.logged_users(), "");
    }

    #[tokio::test]
    async fn a_fresh_login_drops_the_previous_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        session.execute(&["login", "alice"]).await.unwrap();
        session.execute(&["pass", "secret"]).await.unwrap();
        session.execute(&["login", "bob"]).await.unwrap();

        // Already deregistered while the new attempt is pending.
        assert_eq!(shared.logged_users(), "");
        assert_eq!(
            session.execute(&["pass", "wrong"]).await.unwrap(),
            "Wrong credentials"
        );
        assert!(matches!(
            session.execute(&["ls"]).await,
            Err(GrassError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn overlong_path_arguments_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared_for(dir.path());
        let (mut session, _peer) = session_with(&shared, 0).await;

        session.execute(&["login", "alice"]).await.unwrap();
        session.execute(&["pass", "secret"]).await.unwrap();

        let long = "x".repeat(MAX_PATH_LENGTH + 1);
        assert!(matches!(
            session.execute(&["cd", &long]).await,
            Err(GrassError::PathTooLong)
        ));
    }
}
