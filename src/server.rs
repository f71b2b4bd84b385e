use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::constants::MAX_ACTIVE_TRANSFERS;
use crate::session::Session;

/// Server-wide state handed to every session: the configuration, the
/// registry of authenticated users (for `w`) and the transfer-slot
/// pool. Sessions can check credentials, flip their own registry entry
/// and list logged users, nothing else.
pub struct Shared {
    pub config: Config,
    logged: Mutex<HashMap<u64, String>>,
    pub transfers: Arc<Semaphore>,
}

impl Shared {
    pub fn new(config: Config) -> Shared {
        Shared {
            config,
            logged: Mutex::new(HashMap::new()),
            transfers: Arc::new(Semaphore::new(MAX_ACTIVE_TRANSFERS)),
        }
    }

    pub fn check_login(&self, username: &str, password: &str) -> bool {
        self.config.check_login(username, password)
    }

    /// Records or clears the authenticated username of a session.
    pub fn set_logged(&self, id: u64, username: Option<String>) {
        let mut logged = self.logged.lock().unwrap();
        match username {
            Some(username) => {
                logged.insert(id, username);
            }
            None => {
                logged.remove(&id);
            }
        }
    }

    /// The usernames of all authenticated sessions, sorted ascending,
    /// each followed by a space. A user logged in on two sessions
    /// appears twice.
    pub fn logged_users(&self) -> String {
        let mut users: Vec<String> = self.logged.lock().unwrap().values().cloned().collect();
        users.sort();

        let mut reply = String::new();
        for user in &users {
            reply.push_str(user);
            reply.push(' ');
        }
        reply
    }
}

/// Binds the configured port and serves forever. Bind and accept
/// failures are fatal to the server.
pub async fn run(config: Config) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Server listening on port {}", config.port);
    info!("Serving base directory {}", config.base_dir);

    serve(listener, Arc::new(Shared::new(config))).await
}

/// Accept loop: one spawned session task per connection. The tasks
/// cooperate on the runtime thread; each owns its socket exclusively
/// and deregisters itself when it ends.
pub async fn serve(listener: TcpListener, shared: Arc<Shared>) -> Result<()> {
    let mut next_id: u64 = 0;

    loop {
        let (stream, addr) = listener.accept().await.context("accept() failed")?;
        info!("New connection from {}", addr);

        let session = Session::new(next_id, stream, Arc::clone(&shared));
        next_id += 1;

        tokio::spawn(async move {
            session.serve().await;
            info!("Connection closed for {}", addr);
        });
    }
}
