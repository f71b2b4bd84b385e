/// The GRASS command vocabulary.
///
/// `login`, `pass` and `ping` are available to anonymous sessions;
/// everything else requires authentication. `exit` is not a command:
/// the session short-circuits it before dispatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrassCommand {
    Login,
    Pass,
    Ping,
    Ls,
    Cd,
    Mkdir,
    Rm,
    Get,
    Put,
    Grep,
    Date,
    Whoami,
    W,
    Logout,
}

impl GrassCommand {
    pub fn from_str(command: &str) -> Option<GrassCommand> {
        match command {
            "login" => Some(GrassCommand::Login),
            "pass" => Some(GrassCommand::Pass),
            "ping" => Some(GrassCommand::Ping),
            "ls" => Some(GrassCommand::Ls),
            "cd" => Some(GrassCommand::Cd),
            "mkdir" => Some(GrassCommand::Mkdir),
            "rm" => Some(GrassCommand::Rm),
            "get" => Some(GrassCommand::Get),
            "put" => Some(GrassCommand::Put),
            "grep" => Some(GrassCommand::Grep),
            "date" => Some(GrassCommand::Date),
            "whoami" => Some(GrassCommand::Whoami),
            "w" => Some(GrassCommand::W),
            "logout" => Some(GrassCommand::Logout),
            _ => None,
        }
    }

    /// Commands that require an authenticated session.
    pub fn is_privileged(self) -> bool {
        !matches!(
            self,
            GrassCommand::Login | GrassCommand::Pass | GrassCommand::Ping
        )
    }
}
